//! In-process `GpuDevice` with no graphics context.
//!
//! `HeadlessDevice` keeps every object it hands out in plain maps and counts
//! what happened to them, so registry and packer behaviour can be observed
//! without a driver. Its "compiler" is deliberately small:
//!
//! - a `#error` directive fails compilation at that line,
//! - unbalanced braces fail at the offending line (or the last line),
//! - a source without `main(` fails with no usable line number.
//!
//! Diagnostics follow the common `ERROR: 0:<line>: ...` driver format.
//! Locations are derived from `in`/`attribute` (vertex stage) and `uniform`
//! declarations, in declaration order.

use std::cell::RefCell;
use std::collections::HashMap;

use super::device::{AttributeLayout, BufferTarget, GpuDevice, ShaderStage};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HeadlessShader(u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HeadlessProgram(u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HeadlessBuffer(u32);

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct HeadlessUniform {
    program: u32,
    index: i32,
}

/// Object and traffic counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub shaders_created: usize,
    pub shaders_deleted: usize,
    pub programs_created: usize,
    pub programs_deleted: usize,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    /// Full-store declarations (`declare_buffer`).
    pub declarations: usize,
    /// Prefix uploads (`update_buffer`).
    pub partial_updates: usize,
    pub bytes_uploaded: usize,
    pub draws: usize,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramObject {
    linked: bool,
    log: String,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    uniform_values: HashMap<i32, i32>,
}

#[derive(Debug, Default)]
struct BufferObject {
    target: Option<BufferTarget>,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    buffers: HashMap<u32, BufferObject>,
    bound_program: Option<u32>,
    enabled_attributes: HashMap<u32, (u32, i32)>,
    stats: DeviceStats,
    errors: Vec<String>,
}

impl State {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn error(&mut self, message: String) {
        log::error!("headless device: {message}");
        self.errors.push(message);
    }
}

/// Recording device used by tests and context-less tooling.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    state: RefCell<State>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DeviceStats {
        self.state.borrow().stats.clone()
    }

    /// API misuse recorded so far (invalid handles, overflowing uploads,
    /// uniforms set on an unbound program).
    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn is_program_live(&self, program: HeadlessProgram) -> bool {
        self.state.borrow().programs.contains_key(&program.0)
    }

    /// Full store of `buffer`, or `None` if it was never created or is deleted.
    pub fn buffer_contents(&self, buffer: HeadlessBuffer) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer.0).map(|b| b.data.clone())
    }

    /// Last value written to the integer uniform `name` of `program`.
    pub fn uniform_value(&self, program: HeadlessProgram, name: &str) -> Option<i32> {
        let state = self.state.borrow();
        let object = state.programs.get(&program.0)?;
        let index = object.uniforms.iter().position(|u| u == name)? as i32;
        object.uniform_values.get(&index).copied()
    }

    /// `(buffer, components)` currently feeding attribute `location`.
    pub fn attribute_binding(&self, location: u32) -> Option<(HeadlessBuffer, i32)> {
        self.state
            .borrow()
            .enabled_attributes
            .get(&location)
            .map(|&(buffer, components)| (HeadlessBuffer(buffer), components))
    }
}

impl GpuDevice for HeadlessDevice {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;
    type UniformLocation = HeadlessUniform;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.shaders.insert(
            id,
            ShaderObject { stage, source: String::new(), compiled: false, log: String::new() },
        );
        state.stats.shaders_created += 1;
        Ok(HeadlessShader(id))
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool {
        let verdict = check_source(source);
        let mut state = self.state.borrow_mut();
        match state.shaders.get_mut(&shader.0) {
            Some(object) => {
                object.source = source.to_owned();
                object.compiled = verdict.is_ok();
                object.log = verdict.err().unwrap_or_default();
                object.compiled
            }
            None => {
                state.error(format!("compile of unknown shader {}", shader.0));
                false
            }
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader.0)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader.0).is_some() {
            state.stats.shaders_deleted += 1;
        } else {
            state.error(format!("delete of unknown shader {}", shader.0));
        }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.programs.insert(id, ProgramObject::default());
        state.stats.programs_created += 1;
        Ok(HeadlessProgram(id))
    }

    fn link_program(
        &self,
        program: Self::Program,
        vertex: Self::Shader,
        fragment: Self::Shader,
    ) -> bool {
        let mut state = self.state.borrow_mut();
        let result = match (state.shaders.get(&vertex.0), state.shaders.get(&fragment.0)) {
            (Some(vs), Some(fs)) => link_check(vs, fs),
            _ => {
                state.error(format!("link of program {} with unknown shaders", program.0));
                return false;
            }
        };

        let object = match state.programs.get_mut(&program.0) {
            Some(object) => object,
            None => {
                state.error(format!("link of unknown program {}", program.0));
                return false;
            }
        };
        match result {
            Ok((attributes, uniforms)) => {
                *object = ProgramObject { linked: true, attributes, uniforms, ..Default::default() };
                true
            }
            Err(log) => {
                *object = ProgramObject { log, ..Default::default() };
                false
            }
        }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        let mut state = self.state.borrow_mut();
        if !state.programs.contains_key(&program.0) || !state.shaders.contains_key(&shader.0) {
            state.error(format!("detach of shader {} from program {}", shader.0, program.0));
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        self.state
            .borrow()
            .programs
            .get(&program.0)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: Self::Program) {
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&program.0).is_some() {
            state.stats.programs_deleted += 1;
            if state.bound_program == Some(program.0) {
                state.bound_program = None;
            }
        } else {
            state.error(format!("delete of unknown program {}", program.0));
        }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        let mut state = self.state.borrow_mut();
        match program {
            Some(p) if !state.programs.get(&p.0).is_some_and(|o| o.linked) => {
                state.error(format!("use of unlinked program {}", p.0));
            }
            _ => state.bound_program = program.map(|p| p.0),
        }
    }

    fn attribute_location(&self, program: Self::Program, name: &str) -> Option<u32> {
        let state = self.state.borrow();
        let object = state.programs.get(&program.0).filter(|p| p.linked)?;
        object.attributes.iter().position(|a| a == name).map(|i| i as u32)
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let state = self.state.borrow();
        let object = state.programs.get(&program.0).filter(|p| p.linked)?;
        let index = object.uniforms.iter().position(|u| u == name)?;
        Some(HeadlessUniform { program: program.0, index: index as i32 })
    }

    fn set_uniform_i32(&self, location: &Self::UniformLocation, value: i32) {
        let mut state = self.state.borrow_mut();
        if state.bound_program != Some(location.program) {
            state.error(format!(
                "uniform {} set while program {} is not bound",
                location.index, location.program
            ));
            return;
        }
        if let Some(object) = state.programs.get_mut(&location.program) {
            object.uniform_values.insert(location.index, value);
        }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.buffers.insert(id, BufferObject::default());
        state.stats.buffers_created += 1;
        Ok(HeadlessBuffer(id))
    }

    fn declare_buffer(&self, target: BufferTarget, buffer: Self::Buffer, size: usize) {
        let mut state = self.state.borrow_mut();
        match state.buffers.get_mut(&buffer.0) {
            Some(object) => {
                object.target = Some(target);
                object.data = vec![0; size];
                state.stats.declarations += 1;
            }
            None => state.error(format!("declare of unknown buffer {}", buffer.0)),
        }
    }

    fn update_buffer(&self, target: BufferTarget, buffer: Self::Buffer, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let problem = match state.buffers.get_mut(&buffer.0) {
            None => Some(format!("update of unknown buffer {}", buffer.0)),
            Some(object) if object.target != Some(target) => {
                Some(format!("update of buffer {} through the wrong target", buffer.0))
            }
            Some(object) if data.len() > object.data.len() => Some(format!(
                "update of {} bytes overflows buffer {} ({} bytes)",
                data.len(),
                buffer.0,
                object.data.len()
            )),
            Some(object) => {
                object.data[..data.len()].copy_from_slice(data);
                None
            }
        };
        match problem {
            Some(message) => state.error(message),
            None => {
                state.stats.partial_updates += 1;
                state.stats.bytes_uploaded += data.len();
            }
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        let mut state = self.state.borrow_mut();
        if state.buffers.remove(&buffer.0).is_some() {
            state.stats.buffers_deleted += 1;
            state.enabled_attributes.retain(|_, (b, _)| *b != buffer.0);
        } else {
            state.error(format!("delete of unknown buffer {}", buffer.0));
        }
    }

    fn bind_attribute(&self, buffer: Self::Buffer, layout: AttributeLayout) {
        let mut state = self.state.borrow_mut();
        if !state.buffers.contains_key(&buffer.0) {
            state.error(format!("attribute bound to unknown buffer {}", buffer.0));
            return;
        }
        state.enabled_attributes.insert(layout.location, (buffer.0, layout.components));
    }

    fn draw_indexed_triangles(&self, indices: Self::Buffer, count: usize) {
        let mut state = self.state.borrow_mut();
        let available = state
            .buffers
            .get(&indices.0)
            .filter(|b| b.target == Some(BufferTarget::Index))
            .map(|b| b.data.len() / std::mem::size_of::<u32>());
        match available {
            Some(n) if count <= n => state.stats.draws += 1,
            Some(n) => state.error(format!("draw of {count} indices from a {n}-index buffer")),
            None => state.error(format!("draw from non-index buffer {}", indices.0)),
        }
    }
}

// ── tiny front end ────────────────────────────────────────────────────────

fn check_source(source: &str) -> Result<(), String> {
    let mut depth = 0i32;
    let mut last_line = 0;

    for (i, raw) in source.lines().enumerate() {
        let line_no = i + 1;
        last_line = line_no;
        let line = strip_comment(raw);

        if let Some(rest) = line.trim_start().strip_prefix("#error") {
            return Err(format!("ERROR: 0:{line_no}: '#error' : {}", rest.trim()));
        }
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("ERROR: 0:{line_no}: '}}' : syntax error"));
                    }
                }
                _ => {}
            }
        }
    }

    if depth > 0 {
        return Err(format!("ERROR: 0:{last_line}: '' : unexpected end of file, missing '}}'"));
    }
    if !source.contains("main(") {
        return Err("ERROR: 0:0: 'main' : function not defined".to_owned());
    }
    Ok(())
}

fn link_check(
    vs: &ShaderObject,
    fs: &ShaderObject,
) -> Result<(Vec<String>, Vec<String>), String> {
    if vs.stage != ShaderStage::Vertex || fs.stage != ShaderStage::Fragment {
        return Err("ERROR: attached shaders have mismatched stages".to_owned());
    }
    if !vs.compiled || !fs.compiled {
        return Err("ERROR: one or more attached shaders not successfully compiled".to_owned());
    }
    if !vs.source.contains("gl_Position") {
        return Err("ERROR: vertex shader does not write gl_Position".to_owned());
    }
    let attributes = declarations(&vs.source, &["in", "attribute"]);
    let mut uniforms = declarations(&vs.source, &["uniform"]);
    for name in declarations(&fs.source, &["uniform"]) {
        if !uniforms.contains(&name) {
            uniforms.push(name);
        }
    }
    Ok((attributes, uniforms))
}

fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or("")
}

/// Names declared with any of `qualifiers` at global scope, in order.
fn declarations(source: &str, qualifiers: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    for line in source.lines() {
        for statement in strip_comment(line).split(';') {
            let tokens: Vec<&str> = statement.split_whitespace().collect();
            let declares = tokens.iter().any(|t| qualifiers.contains(t));
            let is_call = statement.contains('(') && !statement.contains("layout");
            if !declares || is_call {
                continue;
            }
            let Some(last) = tokens.last() else { continue };
            let name = last.split('[').next().unwrap_or(last);
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
    }
    names
}
