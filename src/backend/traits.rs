//! Core device abstraction trait
//!
//! `Device` is a retained-mode, GL-shaped command interface. The resource
//! cache and draw dispatcher only talk to the GPU through it, so the same
//! code drives a real GL context and the recording headless device.

use crate::backend::types::*;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Device error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create program: {0}")]
    ProgramCreationFailed(String),
    #[error("Failed to create vertex array: {0}")]
    VertexArrayCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// A GPU context the resource cache can allocate objects on and draw with.
///
/// Calls mirror the GL object model: objects are created empty, bound to a
/// target and then filled. State set through one call (bound buffer, bound
/// vertex array, active texture unit) is visible to the following calls.
pub trait Device {
    type Buffer: Copy + Eq + Hash + Debug;
    type Shader: Copy + Eq + Hash + Debug;
    type Program: Copy + Eq + Hash + Debug;
    type VertexArray: Copy + Eq + Hash + Debug;
    type Texture: Copy + Eq + Hash + Debug;
    type UniformLocation: Clone + Debug;

    /// Get the device name.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> DeviceCapabilities;

    // Buffers

    fn create_buffer(&mut self) -> BackendResult<Self::Buffer>;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<Self::Buffer>);
    /// Replace the whole store of the buffer bound to `target`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    // Shaders and programs

    fn create_shader(&mut self, stage: ShaderStage) -> BackendResult<Self::Shader>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    /// Compile the shader; `Err` carries the driver info log.
    fn compile_shader(&mut self, shader: Self::Shader) -> Result<(), String>;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> BackendResult<Self::Program>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    /// Link the program; `Err` carries the driver info log.
    fn link_program(&mut self, program: Self::Program) -> Result<(), String>;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<Self::Program>);

    fn active_uniforms(&mut self, program: Self::Program) -> Vec<ActiveUniform>;
    fn uniform_location(
        &mut self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn attrib_location(&mut self, program: Self::Program, name: &str) -> Option<u32>;

    // Vertex arrays

    fn create_vertex_array(&mut self) -> BackendResult<Self::VertexArray>;
    fn bind_vertex_array(&mut self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&mut self, vertex_array: Self::VertexArray);
    fn enable_vertex_attrib_array(&mut self, location: u32);
    /// Point `location` at the buffer bound to [`BufferTarget::Array`].
    /// `stride` and `offset` are in bytes.
    fn vertex_attrib_pointer_f32(&mut self, location: u32, size: i32, stride: i32, offset: i32);

    // Textures

    fn create_texture(&mut self) -> BackendResult<Self::Texture>;
    /// Select texture unit `unit` (0-based) for subsequent binds.
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: TextureTarget, texture: Option<Self::Texture>);
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        target: TexImageTarget,
        internal_format: InternalFormat,
        width: u32,
        height: u32,
        format: PixelFormat,
        ty: PixelType,
        pixels: &[u8],
    );
    fn tex_parameter(&mut self, target: TextureTarget, parameter: TextureParameter);
    fn generate_mipmap(&mut self, target: TextureTarget);
    fn delete_texture(&mut self, texture: Self::Texture);

    // Uniforms, applied to the program in use

    fn uniform_1_f32(&mut self, location: &Self::UniformLocation, x: f32);
    fn uniform_2_f32(&mut self, location: &Self::UniformLocation, v: [f32; 2]);
    fn uniform_3_f32(&mut self, location: &Self::UniformLocation, v: [f32; 3]);
    fn uniform_4_f32(&mut self, location: &Self::UniformLocation, v: [f32; 4]);
    fn uniform_1_i32(&mut self, location: &Self::UniformLocation, x: i32);
    fn uniform_2_i32(&mut self, location: &Self::UniformLocation, v: [i32; 2]);
    fn uniform_3_i32(&mut self, location: &Self::UniformLocation, v: [i32; 3]);
    fn uniform_4_i32(&mut self, location: &Self::UniformLocation, v: [i32; 4]);
    fn uniform_1_u32(&mut self, location: &Self::UniformLocation, x: u32);
    /// Column-major matrices.
    fn uniform_matrix_2_f32(&mut self, location: &Self::UniformLocation, m: &[f32; 4]);
    fn uniform_matrix_3_f32(&mut self, location: &Self::UniformLocation, m: &[f32; 9]);
    fn uniform_matrix_4_f32(&mut self, location: &Self::UniformLocation, m: &[f32; 16]);

    // Drawing and global state

    /// Draw `count` indices from the element buffer of the bound vertex array.
    fn draw_elements(
        &mut self,
        topology: PrimitiveTopology,
        count: i32,
        format: IndexFormat,
        offset: i32,
    );
    fn clear(&mut self, mask: ClearMask);
    fn clear_color(&mut self, color: [f32; 4]);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn set_capability(&mut self, capability: Capability, enabled: bool);
    fn cull_face(&mut self, mode: CullMode);
}
