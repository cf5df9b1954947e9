//! Shader programs, their locations and the shader-set registry.
//!
//! Build order at startup:
//! 1. [`ShaderRegistry::register_default_set`]
//! 2. [`ShaderRegistry::register_set`] for each additional style
//!
//! Per frame, the draw layer picks [`ShaderRegistry::active_set`] and reads a
//! variant's program and [`LocationTable`].

mod compiler;
pub mod diagnostics;
mod error;
mod locations;
mod manifest;
mod registry;

pub use compiler::{build_program, compile, link, CompiledStage, ShaderProgram};
pub use error::{CompileError, ErrorContext, LinkError, PreconditionViolation, ShaderError};
pub use locations::{
    resolve, Attribute, LocationTable, TextureTechnique, TextureUnit, Uniform,
};
pub use manifest::{ShaderManifest, StagePaths};
pub use registry::{
    ShaderRegistry, ShaderSet, StageSources, TechniqueSources, TechniqueVariant, DEFAULT_SET,
};
