//! Trigon engine crate.
//!
//! GPU resource layer of the trigon renderer: shader programs and their
//! location tables, the shader-set registry, and triangle mesh packing.

pub mod config;
pub mod gpu;
pub mod logging;
pub mod mesh;
pub mod shader;

pub use config::EngineConfig;
pub use gpu::GpuDevice;
