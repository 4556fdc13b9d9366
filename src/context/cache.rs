//! GPU-side handles owned by the render context.

use crate::backend::{
    BackendResult, BufferTarget, Device, IndexFormat, PrimitiveTopology, ShaderStage, TextureTarget,
};
use crate::resources::{GeometryDescriptor, SamplerParams};

use super::uniform::UniformTable;

/// Attribute names the vertex shaders are expected to declare.
pub const POSITION_ATTRIBUTE: &str = "in_position";
pub const NORMAL_ATTRIBUTE: &str = "in_normal";
pub const UV_ATTRIBUTE: &str = "in_uv";
pub const TANGENT_ATTRIBUTE: &str = "in_tangent";

/// Device buffers of one uploaded geometry.
pub struct GpuGeometry<D: Device> {
    pub position: D::Buffer,
    pub normal: Option<D::Buffer>,
    pub uv: Option<D::Buffer>,
    pub tangent: Option<D::Buffer>,
    pub index: D::Buffer,
    pub index_format: IndexFormat,
    pub index_count: usize,
    pub vertex_count: usize,
    pub topology: PrimitiveTopology,
}

impl<D: Device> GpuGeometry<D> {
    /// Allocate buffers for `geometry` and fill them.
    pub(crate) fn create(device: &mut D, geometry: &GeometryDescriptor) -> BackendResult<Self> {
        let position = device.create_buffer()?;
        let index = match device.create_buffer() {
            Ok(index) => index,
            Err(err) => {
                device.delete_buffer(position);
                return Err(err);
            }
        };
        let mut gpu = Self {
            position,
            normal: None,
            uv: None,
            tangent: None,
            index,
            index_format: geometry.index_format(),
            index_count: geometry.index_count(),
            vertex_count: geometry.vertex_count(),
            topology: geometry.topology(),
        };
        if let Err(err) = gpu.fill(device, geometry) {
            gpu.release(device);
            return Err(err);
        }
        Ok(gpu)
    }

    /// Write the descriptor's current content into the existing buffers.
    ///
    /// Optional streams that appeared or disappeared get their buffer
    /// created or deleted. Returns whether the set of streams changed, in
    /// which case vertex arrays built for this geometry are stale.
    pub(crate) fn fill(
        &mut self,
        device: &mut D,
        geometry: &GeometryDescriptor,
    ) -> BackendResult<bool> {
        // The element array binding belongs to the bound vertex array.
        device.bind_vertex_array(None);

        write_buffer(
            device,
            BufferTarget::Array,
            self.position,
            bytemuck::cast_slice(geometry.positions()),
        );
        let mut layout_changed = false;
        layout_changed |= sync_stream(
            device,
            &mut self.normal,
            geometry.normals().map(|n| bytemuck::cast_slice::<_, u8>(n)),
        )?;
        layout_changed |= sync_stream(
            device,
            &mut self.uv,
            geometry.uvs().map(|uv| bytemuck::cast_slice::<_, u8>(uv)),
        )?;
        layout_changed |= sync_stream(
            device,
            &mut self.tangent,
            geometry.tangents().map(|t| bytemuck::cast_slice::<_, u8>(t)),
        )?;
        device.bind_buffer(BufferTarget::Array, None);

        write_buffer(device, BufferTarget::ElementArray, self.index, geometry.indices().as_bytes());
        device.bind_buffer(BufferTarget::ElementArray, None);

        self.index_format = geometry.index_format();
        self.index_count = geometry.index_count();
        self.vertex_count = geometry.vertex_count();
        self.topology = geometry.topology();
        Ok(layout_changed)
    }

    pub(crate) fn release(self, device: &mut D) {
        device.delete_buffer(self.position);
        for buffer in [self.normal, self.uv, self.tangent].into_iter().flatten() {
            device.delete_buffer(buffer);
        }
        device.delete_buffer(self.index);
    }
}

fn write_buffer<D: Device>(device: &mut D, target: BufferTarget, buffer: D::Buffer, data: &[u8]) {
    device.bind_buffer(target, Some(buffer));
    device.buffer_data(target, data);
}

fn sync_stream<D: Device>(
    device: &mut D,
    slot: &mut Option<D::Buffer>,
    data: Option<&[u8]>,
) -> BackendResult<bool> {
    match (slot.as_ref().copied(), data) {
        (Some(buffer), Some(data)) => {
            write_buffer(device, BufferTarget::Array, buffer, data);
            Ok(false)
        }
        (None, Some(data)) => {
            let buffer = device.create_buffer()?;
            *slot = Some(buffer);
            write_buffer(device, BufferTarget::Array, buffer, data);
            Ok(true)
        }
        (Some(buffer), None) => {
            device.delete_buffer(buffer);
            *slot = None;
            Ok(true)
        }
        (None, None) => Ok(false),
    }
}

/// Attribute locations of a linked program, resolved once at link time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeLocations {
    pub position: Option<u32>,
    pub normal: Option<u32>,
    pub uv: Option<u32>,
    pub tangent: Option<u32>,
}

impl AttributeLocations {
    pub(crate) fn query<D: Device>(device: &mut D, program: D::Program) -> Self {
        Self {
            position: device.attrib_location(program, POSITION_ATTRIBUTE),
            normal: device.attrib_location(program, NORMAL_ATTRIBUTE),
            uv: device.attrib_location(program, UV_ATTRIBUTE),
            tangent: device.attrib_location(program, TANGENT_ATTRIBUTE),
        }
    }
}

/// A successfully linked program.
pub struct GpuProgram<D: Device> {
    pub program: D::Program,
    pub vertex: D::Shader,
    pub fragment: D::Shader,
    pub uniforms: UniformTable<D>,
    pub attributes: AttributeLocations,
}

impl<D: Device> GpuProgram<D> {
    pub(crate) fn release(self, device: &mut D) {
        device.detach_shader(self.program, self.vertex);
        device.detach_shader(self.program, self.fragment);
        device.delete_shader(self.vertex);
        device.delete_shader(self.fragment);
        device.delete_program(self.program);
    }
}

/// Why a program is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramFailure {
    /// Stage that failed to compile, `None` for link failures.
    pub stage: Option<ShaderStage>,
    pub log: String,
}

/// Program cache entry: linked, or a tombstone left by a failed compile.
pub enum ProgramEntry<D: Device> {
    Linked(GpuProgram<D>),
    Failed(ProgramFailure),
}

/// Public summary of a program cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Linked,
    Failed,
}

/// A device texture plus the state it was uploaded with.
pub struct GpuTexture<D: Device> {
    pub texture: D::Texture,
    pub target: TextureTarget,
    pub sampler: SamplerParams,
    pub width: u32,
    pub height: u32,
}

/// Counters since the context was created or last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub draw_calls: u64,
    pub draws_skipped: u64,
    pub uniforms_uploaded: u64,
    pub uniforms_rejected: u64,
    pub textures_bound: u64,
    pub linkages_created: u64,
}
