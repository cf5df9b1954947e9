//! Graphics device seam.
//!
//! Everything above this module talks to the GPU through [`GpuDevice`]:
//! - [`GlowDevice`] drives a real OpenGL / WebGL2 context (feature `backend_glow`)
//! - [`HeadlessDevice`] records objects and traffic without a context

mod device;
#[cfg(feature = "backend_glow")]
mod glow_device;
pub mod headless;

pub use device::{AttributeLayout, BufferTarget, GpuDevice, ShaderStage};
#[cfg(feature = "backend_glow")]
pub use glow_device::GlowDevice;
pub use headless::HeadlessDevice;
