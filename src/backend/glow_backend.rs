//! OpenGL / OpenGL ES / WebGL2 device built on `glow`.
//!
//! Every call forwards to the wrapped [`glow::Context`]. The context must
//! be current on the calling thread for the lifetime of the device.

use glow::HasContext;

use crate::backend::traits::{BackendError, BackendResult, Device};
use crate::backend::types::*;

/// Device backed by a live GL context.
pub struct GlowDevice {
    gl: glow::Context,
    capabilities: DeviceCapabilities,
}

impl GlowDevice {
    /// Wrap a GL context whose default framebuffer is `width` x `height`.
    pub fn new(gl: glow::Context, width: u32, height: u32) -> Self {
        let max_units = unsafe { gl.get_parameter_i32(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS) };
        let capabilities = DeviceCapabilities {
            max_texture_units: max_units.max(1) as u32,
            drawing_buffer_width: width,
            drawing_buffer_height: height,
        };
        log::info!(
            "GlowDevice: {} texture units, drawing buffer {}x{}",
            capabilities.max_texture_units,
            width,
            height
        );
        Self { gl, capabilities }
    }

    /// Update the drawing buffer size after the surface was resized.
    pub fn set_drawing_buffer_size(&mut self, width: u32, height: u32) {
        self.capabilities.drawing_buffer_width = width;
        self.capabilities.drawing_buffer_height = height;
    }

    /// Access the raw context for work outside of this crate.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
    }
}

fn tex_image_target(target: TexImageTarget) -> u32 {
    match target {
        TexImageTarget::Texture2D => glow::TEXTURE_2D,
        TexImageTarget::CubeFace(face) => match face {
            CubeFace::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
            CubeFace::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
            CubeFace::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
            CubeFace::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            CubeFace::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
            CubeFace::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        },
    }
}

fn internal_format(format: InternalFormat) -> u32 {
    match format {
        InternalFormat::R8 => glow::R8,
        InternalFormat::Rg8 => glow::RG8,
        InternalFormat::Rgb8 => glow::RGB8,
        InternalFormat::Rgba8 => glow::RGBA8,
        InternalFormat::Srgb8Alpha8 => glow::SRGB8_ALPHA8,
        InternalFormat::R16F => glow::R16F,
        InternalFormat::Rg16F => glow::RG16F,
        InternalFormat::Rgba16F => glow::RGBA16F,
        InternalFormat::R32F => glow::R32F,
        InternalFormat::Rgb32F => glow::RGB32F,
        InternalFormat::Rgba32F => glow::RGBA32F,
    }
}

fn pixel_format(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::Red => glow::RED,
        PixelFormat::Rg => glow::RG,
        PixelFormat::Rgb => glow::RGB,
        PixelFormat::Rgba => glow::RGBA,
    }
}

fn pixel_type(ty: PixelType) -> u32 {
    match ty {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::HalfFloat => glow::HALF_FLOAT,
        PixelType::Float => glow::FLOAT,
    }
}

fn filter(mode: FilterMode) -> u32 {
    match mode {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
    }
}

fn min_filter(mode: FilterMode, mipmap: Option<FilterMode>) -> u32 {
    match (mode, mipmap) {
        (mode, None) => filter(mode),
        (FilterMode::Nearest, Some(FilterMode::Nearest)) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Nearest, Some(FilterMode::Linear)) => glow::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, Some(FilterMode::Nearest)) => glow::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Linear, Some(FilterMode::Linear)) => glow::LINEAR_MIPMAP_LINEAR,
    }
}

fn wrap(mode: AddressMode) -> u32 {
    match mode {
        AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        AddressMode::Repeat => glow::REPEAT,
        AddressMode::MirrorRepeat => glow::MIRRORED_REPEAT,
    }
}

fn topology(mode: PrimitiveTopology) -> u32 {
    match mode {
        PrimitiveTopology::PointList => glow::POINTS,
        PrimitiveTopology::LineList => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::TriangleList => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::Uint8 => glow::UNSIGNED_BYTE,
        IndexFormat::Uint16 => glow::UNSIGNED_SHORT,
        IndexFormat::Uint32 => glow::UNSIGNED_INT,
    }
}

/// Map a GL uniform type enum to the kinds the uploader table supports.
fn uniform_kind(utype: u32) -> UniformKind {
    match utype {
        glow::FLOAT => UniformKind::Float,
        glow::FLOAT_VEC2 => UniformKind::Vec2,
        glow::FLOAT_VEC3 => UniformKind::Vec3,
        glow::FLOAT_VEC4 => UniformKind::Vec4,
        glow::INT => UniformKind::Int,
        glow::INT_VEC2 => UniformKind::IVec2,
        glow::INT_VEC3 => UniformKind::IVec3,
        glow::INT_VEC4 => UniformKind::IVec4,
        glow::UNSIGNED_INT => UniformKind::UInt,
        glow::BOOL => UniformKind::Bool,
        glow::FLOAT_MAT2 => UniformKind::Mat2,
        glow::FLOAT_MAT3 => UniformKind::Mat3,
        glow::FLOAT_MAT4 => UniformKind::Mat4,
        glow::SAMPLER_2D => UniformKind::Sampler2D,
        glow::SAMPLER_CUBE => UniformKind::SamplerCube,
        _ => UniformKind::Unsupported,
    }
}

impl Device for GlowDevice {
    type Buffer = glow::Buffer;
    type Shader = glow::Shader;
    type Program = glow::Program;
    type VertexArray = glow::VertexArray;
    type Texture = glow::Texture;
    type UniformLocation = glow::UniformLocation;

    fn name(&self) -> &'static str {
        "OpenGL (glow)"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_buffer(&mut self) -> BackendResult<glow::Buffer> {
        unsafe { self.gl.create_buffer() }.map_err(BackendError::BufferCreationFailed)
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<glow::Buffer>) {
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer) }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_data_u8_slice(buffer_target(target), data, glow::STATIC_DRAW)
        }
    }

    fn delete_buffer(&mut self, buffer: glow::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> BackendResult<glow::Shader> {
        unsafe { self.gl.create_shader(shader_type(stage)) }
            .map_err(BackendError::ShaderCreationFailed)
    }

    fn shader_source(&mut self, shader: glow::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }

    fn compile_shader(&mut self, shader: glow::Shader) -> Result<(), String> {
        unsafe {
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(shader))
            }
        }
    }

    fn delete_shader(&mut self, shader: glow::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&mut self) -> BackendResult<glow::Program> {
        unsafe { self.gl.create_program() }.map_err(BackendError::ProgramCreationFailed)
    }

    fn attach_shader(&mut self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn detach_shader(&mut self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.detach_shader(program, shader) }
    }

    fn link_program(&mut self, program: glow::Program) -> Result<(), String> {
        unsafe {
            self.gl.link_program(program);
            if self.gl.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(program))
            }
        }
    }

    fn delete_program(&mut self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&mut self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn active_uniforms(&mut self, program: glow::Program) -> Vec<ActiveUniform> {
        unsafe {
            let count = self.gl.get_active_uniforms(program);
            (0..count)
                .filter_map(|index| self.gl.get_active_uniform(program, index))
                .map(|info| ActiveUniform {
                    kind: uniform_kind(info.utype),
                    size: info.size,
                    name: info.name,
                })
                .collect()
        }
    }

    fn uniform_location(
        &mut self,
        program: glow::Program,
        name: &str,
    ) -> Option<glow::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn attrib_location(&mut self, program: glow::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn create_vertex_array(&mut self) -> BackendResult<glow::VertexArray> {
        unsafe { self.gl.create_vertex_array() }.map_err(BackendError::VertexArrayCreationFailed)
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<glow::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) }
    }

    fn delete_vertex_array(&mut self, vertex_array: glow::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) }
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(location) }
    }

    fn vertex_attrib_pointer_f32(&mut self, location: u32, size: i32, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(location, size, glow::FLOAT, false, stride, offset)
        }
    }

    fn create_texture(&mut self) -> BackendResult<glow::Texture> {
        unsafe { self.gl.create_texture() }.map_err(BackendError::TextureCreationFailed)
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<glow::Texture>) {
        unsafe { self.gl.bind_texture(texture_target(target), texture) }
    }

    fn tex_image_2d(
        &mut self,
        target: TexImageTarget,
        internal: InternalFormat,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: &[u8],
    ) {
        unsafe {
            self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            self.gl.tex_image_2d(
                tex_image_target(target),
                0,
                internal_format(internal) as i32,
                width as i32,
                height as i32,
                0,
                pixel_format(format),
                pixel_type(ty),
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn tex_parameter(&mut self, target: TextureTarget, parameter: TextureParameter) {
        let target = texture_target(target);
        let (name, value) = match parameter {
            TextureParameter::MinFilter { filter, mipmap } => {
                (glow::TEXTURE_MIN_FILTER, min_filter(filter, mipmap))
            }
            TextureParameter::MagFilter(mode) => (glow::TEXTURE_MAG_FILTER, filter(mode)),
            TextureParameter::WrapS(mode) => (glow::TEXTURE_WRAP_S, wrap(mode)),
            TextureParameter::WrapT(mode) => (glow::TEXTURE_WRAP_T, wrap(mode)),
            TextureParameter::WrapR(mode) => (glow::TEXTURE_WRAP_R, wrap(mode)),
        };
        unsafe { self.gl.tex_parameter_i32(target, name, value as i32) }
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        unsafe { self.gl.generate_mipmap(texture_target(target)) }
    }

    fn delete_texture(&mut self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn uniform_1_f32(&mut self, location: &glow::UniformLocation, x: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), x) }
    }

    fn uniform_2_f32(&mut self, location: &glow::UniformLocation, v: [f32; 2]) {
        unsafe { self.gl.uniform_2_f32_slice(Some(location), &v) }
    }

    fn uniform_3_f32(&mut self, location: &glow::UniformLocation, v: [f32; 3]) {
        unsafe { self.gl.uniform_3_f32_slice(Some(location), &v) }
    }

    fn uniform_4_f32(&mut self, location: &glow::UniformLocation, v: [f32; 4]) {
        unsafe { self.gl.uniform_4_f32_slice(Some(location), &v) }
    }

    fn uniform_1_i32(&mut self, location: &glow::UniformLocation, x: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), x) }
    }

    fn uniform_2_i32(&mut self, location: &glow::UniformLocation, v: [i32; 2]) {
        unsafe { self.gl.uniform_2_i32_slice(Some(location), &v) }
    }

    fn uniform_3_i32(&mut self, location: &glow::UniformLocation, v: [i32; 3]) {
        unsafe { self.gl.uniform_3_i32_slice(Some(location), &v) }
    }

    fn uniform_4_i32(&mut self, location: &glow::UniformLocation, v: [i32; 4]) {
        unsafe { self.gl.uniform_4_i32_slice(Some(location), &v) }
    }

    fn uniform_1_u32(&mut self, location: &glow::UniformLocation, x: u32) {
        unsafe { self.gl.uniform_1_u32(Some(location), x) }
    }

    fn uniform_matrix_2_f32(&mut self, location: &glow::UniformLocation, m: &[f32; 4]) {
        unsafe { self.gl.uniform_matrix_2_f32_slice(Some(location), false, m) }
    }

    fn uniform_matrix_3_f32(&mut self, location: &glow::UniformLocation, m: &[f32; 9]) {
        unsafe { self.gl.uniform_matrix_3_f32_slice(Some(location), false, m) }
    }

    fn uniform_matrix_4_f32(&mut self, location: &glow::UniformLocation, m: &[f32; 16]) {
        unsafe { self.gl.uniform_matrix_4_f32_slice(Some(location), false, m) }
    }

    fn draw_elements(
        &mut self,
        mode: PrimitiveTopology,
        count: i32,
        format: IndexFormat,
        offset: i32,
    ) {
        unsafe {
            self.gl
                .draw_elements(topology(mode), count, index_type(format), offset)
        }
    }

    fn clear(&mut self, mask: ClearMask) {
        let mut bits = 0;
        if mask.contains(ClearMask::COLOR) {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.contains(ClearMask::DEPTH) {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if mask.contains(ClearMask::STENCIL) {
            bits |= glow::STENCIL_BUFFER_BIT;
        }
        unsafe { self.gl.clear(bits) }
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        unsafe { self.gl.clear_color(color[0], color[1], color[2], color[3]) }
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        let cap = match capability {
            Capability::DepthTest => glow::DEPTH_TEST,
            Capability::CullFace => glow::CULL_FACE,
        };
        unsafe {
            if enabled {
                self.gl.enable(cap);
            } else {
                self.gl.disable(cap);
            }
        }
    }

    fn cull_face(&mut self, mode: CullMode) {
        let mode = match mode {
            CullMode::Front => glow::FRONT,
            CullMode::Back => glow::BACK,
            CullMode::FrontAndBack => glow::FRONT_AND_BACK,
        };
        unsafe { self.gl.cull_face(mode) }
    }
}
