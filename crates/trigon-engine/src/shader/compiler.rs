use crate::gpu::{GpuDevice, ShaderStage};

use super::diagnostics::{annotate_source, locate};
use super::error::{CompileError, LinkError, ShaderError};

/// A successfully compiled stage awaiting [`link`].
///
/// Holds a live device object; pass it to `link` or [`CompiledStage::release`].
#[derive(Debug)]
pub struct CompiledStage<'s, D: GpuDevice> {
    shader: D::Shader,
    stage: ShaderStage,
    source: &'s str,
}

impl<'s, D: GpuDevice> CompiledStage<'s, D> {
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Deletes the stage object without linking it.
    pub fn release(self, device: &D) {
        device.delete_shader(self.shader);
    }
}

/// A linked program. Immutable once created.
#[derive(Debug)]
pub struct ShaderProgram<D: GpuDevice> {
    handle: D::Program,
    label: String,
}

impl<D: GpuDevice> ShaderProgram<D> {
    #[inline]
    pub fn handle(&self) -> D::Program {
        self.handle
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Compiles one stage. Failures are logged with line-numbered source and,
/// when the driver log names a line, a context window around it.
pub fn compile<'s, D: GpuDevice>(
    device: &D,
    stage: ShaderStage,
    source: &'s str,
    label: &str,
) -> Result<CompiledStage<'s, D>, ShaderError> {
    let shader = device.create_shader(stage).map_err(ShaderError::Device)?;

    if device.compile_shader(shader, source) {
        return Ok(CompiledStage { shader, stage, source });
    }

    let log = device.shader_info_log(shader);
    device.delete_shader(shader);

    let err = CompileError {
        label: label.to_owned(),
        stage,
        context: locate(source, &log),
        annotated_source: annotate_source(source),
        log,
    };
    log::error!("{err}");
    Err(err.into())
}

/// Links two compiled stages into a program.
///
/// Stage objects are consumed: on success they are detached and deleted right
/// away; on failure the program and both sources are logged and every object
/// is released.
pub fn link<D: GpuDevice>(
    device: &D,
    vertex: CompiledStage<'_, D>,
    fragment: CompiledStage<'_, D>,
    label: &str,
) -> Result<ShaderProgram<D>, ShaderError> {
    debug_assert_eq!(vertex.stage, ShaderStage::Vertex);
    debug_assert_eq!(fragment.stage, ShaderStage::Fragment);

    let program = match device.create_program() {
        Ok(p) => p,
        Err(msg) => {
            vertex.release(device);
            fragment.release(device);
            return Err(ShaderError::Device(msg));
        }
    };

    let linked = device.link_program(program, vertex.shader, fragment.shader);
    device.detach_shader(program, vertex.shader);
    device.detach_shader(program, fragment.shader);

    if linked {
        device.delete_shader(vertex.shader);
        device.delete_shader(fragment.shader);
        log::debug!("linked program `{label}` ({program:?})");
        return Ok(ShaderProgram { handle: program, label: label.to_owned() });
    }

    let err = LinkError {
        label: label.to_owned(),
        log: device.program_info_log(program),
        program: format!("{program:?}"),
        vertex_source: annotate_source(vertex.source),
        fragment_source: annotate_source(fragment.source),
    };
    log::error!("{err}");

    device.delete_shader(vertex.shader);
    device.delete_shader(fragment.shader);
    device.delete_program(program);
    Err(err.into())
}

/// Compiles both stages and links them.
///
/// Both stages are always compiled so a broken vertex shader does not hide a
/// broken fragment shader; the vertex error wins when both fail.
pub fn build_program<D: GpuDevice>(
    device: &D,
    label: &str,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ShaderProgram<D>, ShaderError> {
    let vertex = compile(device, ShaderStage::Vertex, vertex_source, label);
    let fragment = compile(device, ShaderStage::Fragment, fragment_source, label);

    match (vertex, fragment) {
        (Ok(vs), Ok(fs)) => link(device, vs, fs, label),
        (Err(e), Ok(fs)) => {
            fs.release(device);
            Err(e)
        }
        (Ok(vs), Err(e)) => {
            vs.release(device);
            Err(e)
        }
        (Err(e), Err(_)) => Err(e),
    }
}
