use glow::HasContext;

use super::device::{AttributeLayout, BufferTarget, GpuDevice, ShaderStage};

/// `GpuDevice` over an OpenGL 3.3 / GLES 3.0 / WebGL2 context via `glow`.
///
/// The wrapped context must be current on the thread that owns this value for
/// as long as the value is used. All GL calls are issued synchronously; no
/// error polling (`glGetError`) happens here, compile and link status are
/// queried explicitly instead.
pub struct GlowDevice {
    gl: glow::Context,
}

impl GlowDevice {
    pub fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Raw context, for the draw layer's own state (blend, depth, viewport).
    #[inline]
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    #[inline]
    fn target(target: BufferTarget) -> u32 {
        match target {
            BufferTarget::Vertex => glow::ARRAY_BUFFER,
            BufferTarget::Index => glow::ELEMENT_ARRAY_BUFFER,
        }
    }
}

/// Converts a size for GL, clamping to `i32::MAX`. Clamping means later writes
/// or draws will not match the request, so it is reported.
fn gl_size(value: usize, what: &str) -> i32 {
    match i32::try_from(value) {
        Ok(v) => v,
        Err(_) => {
            log::error!("{what} {value} exceeds the GL limit; clamped to {}", i32::MAX);
            i32::MAX
        }
    }
}

// SAFETY (all blocks below): `GlowDevice` is only constructed around a context
// the caller keeps current, every handle passed in was produced by this same
// context, and buffer sizes are bounded by `i32::MAX` before reaching GL.
impl GpuDevice for GlowDevice {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(kind) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool {
        unsafe {
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            self.gl.get_shader_compile_status(shader)
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn link_program(
        &self,
        program: Self::Program,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> bool {
        unsafe {
            self.gl.attach_shader(program, vertex);
            self.gl.attach_shader(program, fragment);
            self.gl.link_program(program);
            self.gl.get_program_link_status(program)
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.detach_shader(program, shader) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), value) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn declare_buffer(&self, target: BufferTarget, buffer: Self::Buffer, size: usize) {
        let target = Self::target(target);
        let size = gl_size(size, "buffer store size");
        unsafe {
            self.gl.bind_buffer(target, Some(buffer));
            self.gl.buffer_data_size(target, size, glow::DYNAMIC_DRAW);
        }
    }

    fn update_buffer(&self, target: BufferTarget, buffer: Self::Buffer, data: &[u8]) {
        let target = Self::target(target);
        unsafe {
            self.gl.bind_buffer(target, Some(buffer));
            self.gl.buffer_sub_data_u8_slice(target, 0, data);
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn bind_attribute(&self, buffer: Self::Buffer, layout: AttributeLayout) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.enable_vertex_attrib_array(layout.location);
            self.gl.vertex_attrib_pointer_f32(
                layout.location,
                layout.components,
                glow::FLOAT,
                false,
                0,
                0,
            );
        }
    }

    fn draw_indexed_triangles(&self, indices: Self::Buffer, count: usize) {
        let count = gl_size(count, "index count");
        unsafe {
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices));
            self.gl.draw_elements(glow::TRIANGLES, count, glow::UNSIGNED_INT, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_within_range_pass_through() {
        assert_eq!(gl_size(0, "size"), 0);
        assert_eq!(gl_size(4096, "size"), 4096);
        assert_eq!(gl_size(i32::MAX as usize, "size"), i32::MAX);
    }

    #[test]
    fn oversized_values_clamp() {
        assert_eq!(gl_size(i32::MAX as usize + 1, "size"), i32::MAX);
        assert_eq!(gl_size(usize::MAX, "size"), i32::MAX);
    }
}
