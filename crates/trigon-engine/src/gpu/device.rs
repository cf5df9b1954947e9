use std::fmt;
use std::hash::Hash;

/// Programmable pipeline stage of a shader object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binding point a buffer is uploaded through.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferTarget {
    /// Per-vertex attribute data.
    Vertex,
    /// Element (index) data.
    Index,
}

/// Description of one float vertex attribute stream for `GpuDevice::bind_attribute`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeLayout {
    pub location: u32,
    /// Float components per vertex (1..=4).
    pub components: i32,
}

/// The graphics API surface used by the shader and mesh layers.
///
/// The trait mirrors the subset of an OpenGL-style API this crate needs:
/// stage objects compiled from source, linked programs, name-based location
/// lookup and plain buffer objects. Implementations are used from a single
/// thread (the one that owns the context); methods take `&self` the way
/// `glow::HasContext` does.
///
/// Callers must never pass a location that resolved to `None` back into the
/// device: absent locations are skipped before reaching this trait.
pub trait GpuDevice {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + Eq + Hash + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    // ── shader objects ────────────────────────────────────────────────────

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;

    /// Uploads `source` and compiles it. Returns the compile status.
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool;

    fn shader_info_log(&self, shader: Self::Shader) -> String;

    fn delete_shader(&self, shader: Self::Shader);

    // ── programs ──────────────────────────────────────────────────────────

    fn create_program(&self) -> Result<Self::Program, String>;

    /// Attaches both stages and links. Returns the link status.
    fn link_program(
        &self,
        program: Self::Program,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> bool;

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);

    fn program_info_log(&self, program: Self::Program) -> String;

    fn delete_program(&self, program: Self::Program);

    fn use_program(&self, program: Option<Self::Program>);

    // ── locations ─────────────────────────────────────────────────────────

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn uniform_location(&self, program: Self::Program, name: &str)
    -> Option<Self::UniformLocation>;

    /// Sets an integer uniform on the currently bound program.
    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32);

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<Self::Buffer, String>;

    /// Binds `buffer` and (re-)declares its whole store as `size` bytes.
    fn declare_buffer(&self, target: BufferTarget, buffer: Self::Buffer, size: usize);

    /// Binds `buffer` and overwrites its store from offset 0 with `data`.
    fn update_buffer(&self, target: BufferTarget, buffer: Self::Buffer, data: &[u8]);

    fn delete_buffer(&self, buffer: Self::Buffer);

    /// Binds `buffer` as the source of a tightly packed float attribute.
    fn bind_attribute(&self, buffer: Self::Buffer, layout: AttributeLayout);

    /// Draws `count` `u32` indices from `indices` as a triangle list.
    fn draw_indexed_triangles(&self, indices: Self::Buffer, count: usize);
}
