//! Triangle packing and its GPU mirror.
//!
//! [`MeshPacker`] turns a triangle list into flat arrays; [`GpuMesh`] keeps a
//! set of GPU buffers in step with them.

mod color;
mod packer;
mod triangle;
mod upload;

pub use color::{parse_color_key, ColorCache, FALLBACK_RGB};
pub use packer::{MeshPacker, PackStats, PackedGeometry, VertexStream, INDEX_STRIDE};
pub use triangle::{Triangle, TriangleTexture};
pub use upload::GpuMesh;
