//! Headless device for testing and tooling.
//!
//! This device doesn't rasterize anything but keeps the complete object
//! state a GL implementation would: buffer contents, compiled shader
//! interfaces, linked programs with their active uniforms, vertex array
//! bindings, texture images and the value of every uniform. Every state
//! change and draw call is recorded so tests can assert on exactly what
//! reached the device.

mod preprocessor;
mod reflection;

use std::collections::{BTreeMap, HashMap};

use crate::backend::traits::{BackendError, BackendResult, Device};
use crate::backend::types::*;

pub use preprocessor::Diagnostic;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Raw object name.
            pub fn id(&self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Handle to a headless buffer
    HeadlessBuffer
);
handle!(
    /// Handle to a headless shader object
    HeadlessShader
);
handle!(
    /// Handle to a headless program object
    HeadlessProgram
);
handle!(
    /// Handle to a headless vertex array
    HeadlessVertexArray
);
handle!(
    /// Handle to a headless texture
    HeadlessTexture
);

/// Location of a uniform (or one element of a uniform array) in a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessUniformLocation {
    program: HeadlessProgram,
    uniform: usize,
    element: u32,
}

/// Value last written to a uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformData {
    Float(Vec<f32>),
    Int(Vec<i32>),
    UInt(Vec<u32>),
}

impl UniformData {
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            UniformData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            UniformData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match self {
            UniformData::UInt(v) => Some(v),
            _ => None,
        }
    }
}

/// One enabled vertex attribute of a vertex array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub location: u32,
    pub buffer: Option<HeadlessBuffer>,
    pub size: i32,
    pub stride: i32,
    pub offset: i32,
}

/// State captured by a vertex array object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexArrayState {
    enabled: Vec<u32>,
    pointers: BTreeMap<u32, AttributeBinding>,
    pub element_buffer: Option<HeadlessBuffer>,
}

impl VertexArrayState {
    /// Enabled attributes that have a pointer set up, ordered by location.
    pub fn attributes(&self) -> Vec<AttributeBinding> {
        self.pointers
            .values()
            .filter(|b| self.enabled.contains(&b.location))
            .copied()
            .collect()
    }

    pub fn attribute(&self, location: u32) -> Option<AttributeBinding> {
        self.attributes().into_iter().find(|b| b.location == location)
    }
}

/// A texture bound to a unit at draw time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundTexture {
    pub unit: u32,
    pub target: TextureTarget,
    pub texture: HeadlessTexture,
}

/// A draw call as seen by the device
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: Option<HeadlessProgram>,
    pub vertex_array: Option<HeadlessVertexArray>,
    pub topology: PrimitiveTopology,
    pub count: i32,
    pub index_format: IndexFormat,
    pub offset: i32,
    pub attributes: Vec<AttributeBinding>,
    pub element_buffer: Option<HeadlessBuffer>,
    pub textures: Vec<BoundTexture>,
}

/// One image level-0 upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub internal_format: InternalFormat,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub ty: PixelType,
    pub data: Vec<u8>,
}

/// Texture object state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureState {
    pub target: Option<TextureTarget>,
    pub images: HashMap<TexImageTarget, TextureImage>,
    pub parameters: Vec<TextureParameter>,
    pub mipmapped: bool,
}

/// Entry of the command log
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateBuffer(HeadlessBuffer),
    BindBuffer(BufferTarget, Option<HeadlessBuffer>),
    BufferData(BufferTarget, usize),
    DeleteBuffer(HeadlessBuffer),
    CreateShader(HeadlessShader, ShaderStage),
    CompileShader(HeadlessShader, bool),
    DeleteShader(HeadlessShader),
    CreateProgram(HeadlessProgram),
    AttachShader(HeadlessProgram, HeadlessShader),
    DetachShader(HeadlessProgram, HeadlessShader),
    LinkProgram(HeadlessProgram, bool),
    DeleteProgram(HeadlessProgram),
    UseProgram(Option<HeadlessProgram>),
    CreateVertexArray(HeadlessVertexArray),
    BindVertexArray(Option<HeadlessVertexArray>),
    DeleteVertexArray(HeadlessVertexArray),
    EnableVertexAttribArray(u32),
    VertexAttribPointer(AttributeBinding),
    CreateTexture(HeadlessTexture),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<HeadlessTexture>),
    TexImage2D(TexImageTarget, u32, u32),
    TexParameter(TextureTarget, TextureParameter),
    GenerateMipmap(TextureTarget),
    DeleteTexture(HeadlessTexture),
    Uniform(HeadlessUniformLocation, UniformData),
    Draw(usize),
    Clear(ClearMask),
    ClearColor([f32; 4]),
    Viewport(i32, i32, i32, i32),
    SetCapability(Capability, bool),
    CullFace(CullMode),
}

#[derive(Debug, Clone)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    interface: Option<reflection::ShaderInterface>,
}

#[derive(Debug, Clone)]
struct LinkedProgram {
    uniforms: Vec<ActiveUniform>,
    attributes: HashMap<String, u32>,
}

#[derive(Debug, Clone, Default)]
struct ProgramObject {
    attached: Vec<HeadlessShader>,
    linked: Option<LinkedProgram>,
}

/// Headless device.
#[derive(Debug)]
pub struct HeadlessDevice {
    capabilities: DeviceCapabilities,
    next_name: u32,
    fail_allocations: bool,

    buffers: HashMap<HeadlessBuffer, Vec<u8>>,
    shaders: HashMap<HeadlessShader, ShaderObject>,
    programs: HashMap<HeadlessProgram, ProgramObject>,
    vertex_arrays: HashMap<HeadlessVertexArray, VertexArrayState>,
    default_vertex_array: VertexArrayState,
    textures: HashMap<HeadlessTexture, TextureState>,

    array_buffer: Option<HeadlessBuffer>,
    bound_vertex_array: Option<HeadlessVertexArray>,
    current_program: Option<HeadlessProgram>,
    active_unit: u32,
    texture_units: BTreeMap<(u32, TextureTarget), HeadlessTexture>,
    uniform_values: HashMap<(HeadlessProgram, String), UniformData>,

    viewport: [i32; 4],
    clear_color: [f32; 4],
    depth_test: bool,
    culling: bool,
    cull_mode: CullMode,

    commands: Vec<DeviceCommand>,
    draws: Vec<RecordedDraw>,
    errors: Vec<String>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Create a new headless device with default capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            next_name: 1,
            fail_allocations: false,
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            default_vertex_array: VertexArrayState::default(),
            textures: HashMap::new(),
            array_buffer: None,
            bound_vertex_array: None,
            current_program: None,
            active_unit: 0,
            texture_units: BTreeMap::new(),
            uniform_values: HashMap::new(),
            viewport: [
                0,
                0,
                capabilities.drawing_buffer_width as i32,
                capabilities.drawing_buffer_height as i32,
            ],
            clear_color: [0.0, 0.0, 0.0, 0.0],
            depth_test: false,
            culling: false,
            cull_mode: CullMode::Back,
            commands: Vec::new(),
            draws: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Make every subsequent object creation fail, as an exhausted driver would.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Change the reported drawing buffer size (a canvas or window resize).
    pub fn set_drawing_buffer_size(&mut self, width: u32, height: u32) {
        self.capabilities.drawing_buffer_width = width;
        self.capabilities.drawing_buffer_height = height;
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// GL errors raised by invalid calls (wrong program, mismatched setter...).
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Forget recorded commands and draws; object state is kept.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn buffer_contents(&self, buffer: HeadlessBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn vertex_array_count(&self) -> usize {
        self.vertex_arrays.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Source last given to a shader object.
    pub fn shader_source_text(&self, shader: HeadlessShader) -> Option<&str> {
        self.shaders.get(&shader).map(|s| s.source.as_str())
    }

    pub fn vertex_array(&self, vertex_array: HeadlessVertexArray) -> Option<&VertexArrayState> {
        self.vertex_arrays.get(&vertex_array)
    }

    pub fn texture_state(&self, texture: HeadlessTexture) -> Option<&TextureState> {
        self.textures.get(&texture)
    }

    /// Value last uploaded to `name` in `program`. Array elements are
    /// addressed as `name[i]`.
    pub fn uniform_value(&self, program: HeadlessProgram, name: &str) -> Option<&UniformData> {
        self.uniform_values.get(&(program, name.to_string()))
    }

    pub fn viewport_rect(&self) -> [i32; 4] {
        self.viewport
    }

    pub fn clear_color_value(&self) -> [f32; 4] {
        self.clear_color
    }

    pub fn depth_test_enabled(&self) -> bool {
        self.depth_test
    }

    /// Cull mode when face culling is enabled.
    pub fn culling(&self) -> Option<CullMode> {
        self.culling.then_some(self.cull_mode)
    }

    fn allocate(&mut self, what: &str) -> BackendResult<u32> {
        if self.fail_allocations {
            log::trace!("HeadlessDevice: refusing to allocate {what}");
            return Err(match what {
                "buffer" => BackendError::BufferCreationFailed("allocation refused".into()),
                "shader" => BackendError::ShaderCreationFailed("allocation refused".into()),
                "program" => BackendError::ProgramCreationFailed("allocation refused".into()),
                "vertex array" => {
                    BackendError::VertexArrayCreationFailed("allocation refused".into())
                }
                _ => BackendError::TextureCreationFailed("allocation refused".into()),
            });
        }
        let name = self.next_name;
        self.next_name += 1;
        log::trace!("HeadlessDevice: creating {what} {name}");
        Ok(name)
    }

    fn raise(&mut self, message: String) {
        log::trace!("HeadlessDevice: GL error: {message}");
        self.errors.push(message);
    }

    fn current_vertex_array_mut(&mut self) -> Option<&mut VertexArrayState> {
        match self.bound_vertex_array {
            Some(vao) => self.vertex_arrays.get_mut(&vao),
            None => Some(&mut self.default_vertex_array),
        }
    }

    fn current_vertex_array(&self) -> Option<&VertexArrayState> {
        match self.bound_vertex_array {
            Some(vao) => self.vertex_arrays.get(&vao),
            None => Some(&self.default_vertex_array),
        }
    }

    fn link(&self, program: &ProgramObject) -> Result<LinkedProgram, String> {
        let mut vertex = None;
        let mut fragment = None;
        for shader in &program.attached {
            let object = self
                .shaders
                .get(shader)
                .ok_or_else(|| "attached shader was deleted".to_string())?;
            let interface = object
                .interface
                .as_ref()
                .ok_or_else(|| format!("attached {} shader is not compiled", object.stage))?;
            let slot = match object.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.is_some() {
                return Err(format!("more than one {} shader attached", object.stage));
            }
            *slot = Some(interface);
        }
        let vertex = vertex.ok_or("Missing vertex shader")?;
        let fragment = fragment.ok_or("Missing fragment shader")?;

        for input in &fragment.inputs {
            if !fragment.uses(&input.name) {
                continue;
            }
            let output = vertex
                .outputs
                .iter()
                .find(|o| o.name == input.name)
                .ok_or_else(|| {
                    format!(
                        "Input '{}' of the fragment shader is not written by the vertex shader",
                        input.name
                    )
                })?;
            if output.ty != input.ty || output.array != input.array {
                return Err(format!(
                    "Types of varying '{}' differ between vertex and fragment shaders",
                    input.name
                ));
            }
        }

        let mut uniforms = Vec::new();
        let mut declared: HashMap<&str, String> = HashMap::new();
        for interface in [vertex, fragment] {
            for variable in &interface.uniforms {
                let signature = format!(
                    "{}{:?}",
                    reflection::type_signature(interface, &variable.ty),
                    variable.array
                );
                match declared.get(variable.name.as_str()) {
                    Some(existing) if *existing != signature => {
                        return Err(format!(
                            "Types of uniform '{}' differ between shaders",
                            variable.name
                        ));
                    }
                    Some(_) => continue,
                    None => {
                        declared.insert(variable.name.as_str(), signature);
                        reflection::flatten_uniform(interface, variable, &mut uniforms);
                    }
                }
            }
        }

        let mut attributes = HashMap::new();
        let mut used_slots: Vec<u32> = vertex.inputs.iter().filter_map(|i| i.location).collect();
        let mut next_slot = 0;
        for input in &vertex.inputs {
            let location = match input.location {
                Some(location) => location,
                None => {
                    while used_slots.contains(&next_slot) {
                        next_slot += 1;
                    }
                    let location = next_slot;
                    let slots = reflection::attribute_slots(&input.ty);
                    used_slots.extend(location..location + slots);
                    location
                }
            };
            if location >= 16 {
                return Err(format!("Too many vertex attributes ('{}')", input.name));
            }
            attributes.insert(input.name.clone(), location);
        }

        Ok(LinkedProgram {
            uniforms,
            attributes,
        })
    }

    /// Resolve `name` to (uniform index, element) in a linked program.
    fn find_uniform(linked: &LinkedProgram, name: &str) -> Option<(usize, u32)> {
        if let Some(index) = linked.uniforms.iter().position(|u| u.name == name) {
            return Some((index, 0));
        }
        let (base, element) = match name.strip_suffix(']').and_then(|n| n.rsplit_once('[')) {
            Some((base, element)) => (base, element.parse::<u32>().ok()?),
            None => (name, 0),
        };
        let array_name = format!("{base}[0]");
        linked
            .uniforms
            .iter()
            .position(|u| u.name == array_name && (element as i32) < u.size)
            .map(|index| (index, element))
    }

    fn set_uniform(
        &mut self,
        location: &HeadlessUniformLocation,
        data: UniformData,
        accepts: impl Fn(UniformKind) -> bool,
    ) {
        if self.current_program != Some(location.program) {
            self.raise(format!(
                "uniform location of program {} used while program {:?} is current",
                location.program.0, self.current_program
            ));
            return;
        }
        let Some(linked) = self
            .programs
            .get(&location.program)
            .and_then(|p| p.linked.as_ref())
        else {
            self.raise("uniform set on a program that is not linked".to_string());
            return;
        };
        let Some(uniform) = linked.uniforms.get(location.uniform) else {
            self.raise("invalid uniform location".to_string());
            return;
        };
        if !accepts(uniform.kind) {
            let message = format!(
                "setter {:?} does not match the type {:?} of uniform '{}'",
                data, uniform.kind, uniform.name
            );
            self.raise(message);
            return;
        }
        let key = if uniform.size > 1 || uniform.name.ends_with("[0]") {
            let base = uniform.name.trim_end_matches("[0]");
            format!("{base}[{}]", location.element)
        } else {
            uniform.name.clone()
        };
        log::trace!("HeadlessDevice: uniform {key} = {data:?}");
        self.commands
            .push(DeviceCommand::Uniform(*location, data.clone()));
        self.uniform_values.insert((location.program, key), data);
    }
}

fn is_bool(kind: UniformKind) -> bool {
    kind == UniformKind::Bool
}

impl Device for HeadlessDevice {
    type Buffer = HeadlessBuffer;
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type VertexArray = HeadlessVertexArray;
    type Texture = HeadlessTexture;
    type UniformLocation = HeadlessUniformLocation;

    fn name(&self) -> &'static str {
        "Headless Device"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&mut self) -> BackendResult<HeadlessBuffer> {
        let buffer = HeadlessBuffer(self.allocate("buffer")?);
        self.buffers.insert(buffer, Vec::new());
        self.commands.push(DeviceCommand::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<HeadlessBuffer>) {
        self.commands.push(DeviceCommand::BindBuffer(target, buffer));
        match target {
            BufferTarget::Array => self.array_buffer = buffer,
            BufferTarget::ElementArray => {
                if let Some(vao) = self.current_vertex_array_mut() {
                    vao.element_buffer = buffer;
                }
            }
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.commands.push(DeviceCommand::BufferData(target, data.len()));
        let bound = match target {
            BufferTarget::Array => self.array_buffer,
            BufferTarget::ElementArray => {
                self.current_vertex_array().and_then(|v| v.element_buffer)
            }
        };
        match bound.and_then(|b| self.buffers.get_mut(&b)) {
            Some(store) => {
                store.clear();
                store.extend_from_slice(data);
            }
            None => self.raise(format!("buffer_data with no buffer bound to {target:?}")),
        }
    }

    fn delete_buffer(&mut self, buffer: HeadlessBuffer) {
        self.commands.push(DeviceCommand::DeleteBuffer(buffer));
        if self.buffers.remove(&buffer).is_none() {
            return;
        }
        if self.array_buffer == Some(buffer) {
            self.array_buffer = None;
        }
        // Deleting a buffer unbinds it from the current vertex array only.
        if let Some(vao) = self.current_vertex_array_mut() {
            if vao.element_buffer == Some(buffer) {
                vao.element_buffer = None;
            }
        }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> BackendResult<HeadlessShader> {
        let shader = HeadlessShader(self.allocate("shader")?);
        self.shaders.insert(
            shader,
            ShaderObject {
                stage,
                source: String::new(),
                interface: None,
            },
        );
        self.commands.push(DeviceCommand::CreateShader(shader, stage));
        Ok(shader)
    }

    fn shader_source(&mut self, shader: HeadlessShader, source: &str) {
        match self.shaders.get_mut(&shader) {
            Some(object) => object.source = source.to_string(),
            None => self.raise(format!("shader_source on unknown shader {}", shader.0)),
        }
    }

    fn compile_shader(&mut self, shader: HeadlessShader) -> Result<(), String> {
        let Some(object) = self.shaders.get_mut(&shader) else {
            return Err(format!("unknown shader {}", shader.0));
        };
        let stage = object.stage;
        let result = preprocessor::preprocess(&object.source).and_then(|p| {
            log::trace!("HeadlessDevice: compiling {stage} shader (GLSL {})", p.version);
            reflection::reflect(&p.text, stage)
        });
        let success = result.is_ok();
        let outcome = match result {
            Ok(interface) => {
                object.interface = Some(interface);
                Ok(())
            }
            Err(diagnostic) => {
                object.interface = None;
                Err(diagnostic.to_string())
            }
        };
        self.commands.push(DeviceCommand::CompileShader(shader, success));
        outcome
    }

    fn delete_shader(&mut self, shader: HeadlessShader) {
        self.commands.push(DeviceCommand::DeleteShader(shader));
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self) -> BackendResult<HeadlessProgram> {
        let program = HeadlessProgram(self.allocate("program")?);
        self.programs.insert(program, ProgramObject::default());
        self.commands.push(DeviceCommand::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&mut self, program: HeadlessProgram, shader: HeadlessShader) {
        self.commands.push(DeviceCommand::AttachShader(program, shader));
        match self.programs.get_mut(&program) {
            Some(object) if !object.attached.contains(&shader) => object.attached.push(shader),
            Some(_) => self.raise(format!("shader {} already attached", shader.0)),
            None => self.raise(format!("attach_shader on unknown program {}", program.0)),
        }
    }

    fn detach_shader(&mut self, program: HeadlessProgram, shader: HeadlessShader) {
        self.commands.push(DeviceCommand::DetachShader(program, shader));
        if let Some(object) = self.programs.get_mut(&program) {
            object.attached.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: HeadlessProgram) -> Result<(), String> {
        let Some(object) = self.programs.get(&program) else {
            return Err(format!("unknown program {}", program.0));
        };
        let result = self.link(object);
        let success = result.is_ok();
        self.commands.push(DeviceCommand::LinkProgram(program, success));
        self.uniform_values.retain(|(p, _), _| *p != program);
        let linked = match result {
            Ok(linked) => Some(linked),
            Err(log) => {
                if let Some(object) = self.programs.get_mut(&program) {
                    object.linked = None;
                }
                return Err(format!("error: {log}"));
            }
        };
        if let Some(object) = self.programs.get_mut(&program) {
            object.linked = linked;
        }
        Ok(())
    }

    fn delete_program(&mut self, program: HeadlessProgram) {
        self.commands.push(DeviceCommand::DeleteProgram(program));
        self.programs.remove(&program);
        self.uniform_values.retain(|(p, _), _| *p != program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, program: Option<HeadlessProgram>) {
        self.commands.push(DeviceCommand::UseProgram(program));
        if let Some(p) = program {
            let linked = self.programs.get(&p).is_some_and(|o| o.linked.is_some());
            if !linked {
                self.raise(format!("use_program on unlinked program {}", p.0));
                return;
            }
        }
        self.current_program = program;
    }

    fn active_uniforms(&mut self, program: HeadlessProgram) -> Vec<ActiveUniform> {
        self.programs
            .get(&program)
            .and_then(|p| p.linked.as_ref())
            .map(|l| l.uniforms.clone())
            .unwrap_or_default()
    }

    fn uniform_location(
        &mut self,
        program: HeadlessProgram,
        name: &str,
    ) -> Option<HeadlessUniformLocation> {
        let linked = self.programs.get(&program)?.linked.as_ref()?;
        let (uniform, element) = Self::find_uniform(linked, name)?;
        Some(HeadlessUniformLocation {
            program,
            uniform,
            element,
        })
    }

    fn attrib_location(&mut self, program: HeadlessProgram, name: &str) -> Option<u32> {
        self.programs
            .get(&program)?
            .linked
            .as_ref()?
            .attributes
            .get(name)
            .copied()
    }

    fn create_vertex_array(&mut self) -> BackendResult<HeadlessVertexArray> {
        let vao = HeadlessVertexArray(self.allocate("vertex array")?);
        self.vertex_arrays.insert(vao, VertexArrayState::default());
        self.commands.push(DeviceCommand::CreateVertexArray(vao));
        Ok(vao)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<HeadlessVertexArray>) {
        self.commands.push(DeviceCommand::BindVertexArray(vertex_array));
        if let Some(vao) = vertex_array {
            if !self.vertex_arrays.contains_key(&vao) {
                self.raise(format!("bind_vertex_array on unknown vertex array {}", vao.0));
                return;
            }
        }
        self.bound_vertex_array = vertex_array;
    }

    fn delete_vertex_array(&mut self, vertex_array: HeadlessVertexArray) {
        self.commands.push(DeviceCommand::DeleteVertexArray(vertex_array));
        self.vertex_arrays.remove(&vertex_array);
        if self.bound_vertex_array == Some(vertex_array) {
            self.bound_vertex_array = None;
        }
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        self.commands.push(DeviceCommand::EnableVertexAttribArray(location));
        if let Some(vao) = self.current_vertex_array_mut() {
            if !vao.enabled.contains(&location) {
                vao.enabled.push(location);
            }
        }
    }

    fn vertex_attrib_pointer_f32(&mut self, location: u32, size: i32, stride: i32, offset: i32) {
        let binding = AttributeBinding {
            location,
            buffer: self.array_buffer,
            size,
            stride,
            offset,
        };
        self.commands.push(DeviceCommand::VertexAttribPointer(binding));
        if binding.buffer.is_none() {
            self.raise(format!(
                "vertex_attrib_pointer for location {location} with no array buffer"
            ));
            return;
        }
        if let Some(vao) = self.current_vertex_array_mut() {
            vao.pointers.insert(location, binding);
        }
    }

    fn create_texture(&mut self) -> BackendResult<HeadlessTexture> {
        let texture = HeadlessTexture(self.allocate("texture")?);
        self.textures.insert(texture, TextureState::default());
        self.commands.push(DeviceCommand::CreateTexture(texture));
        Ok(texture)
    }

    fn active_texture(&mut self, unit: u32) {
        self.commands.push(DeviceCommand::ActiveTexture(unit));
        if unit >= self.capabilities.max_texture_units {
            self.raise(format!("texture unit {unit} out of range"));
            return;
        }
        self.active_unit = unit;
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<HeadlessTexture>) {
        self.commands.push(DeviceCommand::BindTexture(target, texture));
        let key = (self.active_unit, target);
        let Some(texture) = texture else {
            self.texture_units.remove(&key);
            return;
        };
        match self.textures.get_mut(&texture) {
            Some(state) => match state.target {
                Some(existing) if existing != target => {
                    let message =
                        format!("texture {} bound to {target:?} but is a {existing:?}", texture.0);
                    self.raise(message);
                }
                _ => {
                    state.target = Some(target);
                    self.texture_units.insert(key, texture);
                }
            },
            None => self.raise(format!("bind_texture on unknown texture {}", texture.0)),
        }
    }

    fn tex_image_2d(
        &mut self,
        target: TexImageTarget,
        internal_format: InternalFormat,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: &[u8],
    ) {
        self.commands.push(DeviceCommand::TexImage2D(target, width, height));
        let expected = width as usize * height as usize * format.components() * ty.size();
        if pixels.len() < expected {
            self.raise(format!(
                "tex_image_2d needs {expected} bytes, {} supplied",
                pixels.len()
            ));
            return;
        }
        let key = (self.active_unit, target.bind_target());
        let Some(texture) = self.texture_units.get(&key).copied() else {
            self.raise(format!("tex_image_2d with no texture bound to {:?}", target.bind_target()));
            return;
        };
        if let Some(state) = self.textures.get_mut(&texture) {
            state.images.insert(
                target,
                TextureImage {
                    internal_format,
                    width,
                    height,
                    format,
                    ty,
                    data: pixels[..expected].to_vec(),
                },
            );
        }
    }

    fn tex_parameter(&mut self, target: TextureTarget, parameter: TextureParameter) {
        self.commands.push(DeviceCommand::TexParameter(target, parameter));
        let bound = self.texture_units.get(&(self.active_unit, target)).copied();
        match bound.and_then(|t| self.textures.get_mut(&t)) {
            Some(state) => state.parameters.push(parameter),
            None => self.raise(format!("tex_parameter with no texture bound to {target:?}")),
        }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.commands.push(DeviceCommand::GenerateMipmap(target));
        let bound = self.texture_units.get(&(self.active_unit, target)).copied();
        if let Some(state) = bound.and_then(|t| self.textures.get_mut(&t)) {
            state.mipmapped = true;
        }
    }

    fn delete_texture(&mut self, texture: HeadlessTexture) {
        self.commands.push(DeviceCommand::DeleteTexture(texture));
        self.textures.remove(&texture);
        self.texture_units.retain(|_, t| *t != texture);
    }

    fn uniform_1_f32(&mut self, location: &HeadlessUniformLocation, x: f32) {
        self.set_uniform(location, UniformData::Float(vec![x]), |k| {
            k == UniformKind::Float || is_bool(k)
        });
    }

    fn uniform_2_f32(&mut self, location: &HeadlessUniformLocation, v: [f32; 2]) {
        self.set_uniform(location, UniformData::Float(v.to_vec()), |k| k == UniformKind::Vec2);
    }

    fn uniform_3_f32(&mut self, location: &HeadlessUniformLocation, v: [f32; 3]) {
        self.set_uniform(location, UniformData::Float(v.to_vec()), |k| k == UniformKind::Vec3);
    }

    fn uniform_4_f32(&mut self, location: &HeadlessUniformLocation, v: [f32; 4]) {
        self.set_uniform(location, UniformData::Float(v.to_vec()), |k| k == UniformKind::Vec4);
    }

    fn uniform_1_i32(&mut self, location: &HeadlessUniformLocation, x: i32) {
        self.set_uniform(location, UniformData::Int(vec![x]), |k| {
            k == UniformKind::Int || k.is_sampler() || is_bool(k)
        });
    }

    fn uniform_2_i32(&mut self, location: &HeadlessUniformLocation, v: [i32; 2]) {
        self.set_uniform(location, UniformData::Int(v.to_vec()), |k| k == UniformKind::IVec2);
    }

    fn uniform_3_i32(&mut self, location: &HeadlessUniformLocation, v: [i32; 3]) {
        self.set_uniform(location, UniformData::Int(v.to_vec()), |k| k == UniformKind::IVec3);
    }

    fn uniform_4_i32(&mut self, location: &HeadlessUniformLocation, v: [i32; 4]) {
        self.set_uniform(location, UniformData::Int(v.to_vec()), |k| k == UniformKind::IVec4);
    }

    fn uniform_1_u32(&mut self, location: &HeadlessUniformLocation, x: u32) {
        self.set_uniform(location, UniformData::UInt(vec![x]), |k| {
            k == UniformKind::UInt || is_bool(k)
        });
    }

    fn uniform_matrix_2_f32(&mut self, location: &HeadlessUniformLocation, m: &[f32; 4]) {
        self.set_uniform(location, UniformData::Float(m.to_vec()), |k| k == UniformKind::Mat2);
    }

    fn uniform_matrix_3_f32(&mut self, location: &HeadlessUniformLocation, m: &[f32; 9]) {
        self.set_uniform(location, UniformData::Float(m.to_vec()), |k| k == UniformKind::Mat3);
    }

    fn uniform_matrix_4_f32(&mut self, location: &HeadlessUniformLocation, m: &[f32; 16]) {
        self.set_uniform(location, UniformData::Float(m.to_vec()), |k| k == UniformKind::Mat4);
    }

    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: i32,
        format: IndexFormat,
        offset: i32,
    ) {
        let Some(vao) = self.current_vertex_array() else {
            self.raise("draw_elements with a deleted vertex array bound".to_string());
            return;
        };
        let attributes = vao.attributes();
        let element_buffer = vao.element_buffer;
        if self.current_program.is_none() {
            self.raise("draw_elements with no program in use".to_string());
            return;
        }
        let Some(elements) = element_buffer.and_then(|b| self.buffers.get(&b)) else {
            self.raise("draw_elements with no element array buffer".to_string());
            return;
        };
        let needed = offset as usize + count as usize * format.size();
        if elements.len() < needed {
            let message = format!(
                "draw_elements reads {needed} bytes from a {} byte element buffer",
                elements.len()
            );
            self.raise(message);
            return;
        }
        let textures = self
            .texture_units
            .iter()
            .map(|(&(unit, target), &texture)| BoundTexture {
                unit,
                target,
                texture,
            })
            .collect();
        let draw = RecordedDraw {
            program: self.current_program,
            vertex_array: self.bound_vertex_array,
            topology,
            count,
            index_format: format,
            offset,
            attributes,
            element_buffer,
            textures,
        };
        log::trace!(
            "HeadlessDevice: draw {:?} x{} ({:?})",
            draw.topology,
            draw.count,
            draw.index_format
        );
        self.commands.push(DeviceCommand::Draw(self.draws.len()));
        self.draws.push(draw);
    }

    fn clear(&mut self, mask: ClearMask) {
        self.commands.push(DeviceCommand::Clear(mask));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.commands.push(DeviceCommand::ClearColor(color));
        self.clear_color = color;
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.commands.push(DeviceCommand::Viewport(x, y, width, height));
        self.viewport = [x, y, width, height];
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.commands.push(DeviceCommand::SetCapability(capability, enabled));
        match capability {
            Capability::DepthTest => self.depth_test = enabled,
            Capability::CullFace => self.culling = enabled,
        }
    }

    fn cull_face(&mut self, mode: CullMode) {
        self.commands.push(DeviceCommand::CullFace(mode));
        self.cull_mode = mode;
    }
}
