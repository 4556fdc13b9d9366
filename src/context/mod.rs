//! Resource cache and draw dispatcher
//!
//! [`RenderContext`] realizes CPU-side descriptors as device objects and
//! issues draw calls with them:
//! - geometries become vertex and index buffers
//! - shaders become linked programs with an introspected uniform table
//! - textures become device textures with their sampling state
//!
//! All caches are keyed by descriptor identity. Vertex arrays linking a
//! geometry to a program are created lazily by the first draw of the pair.
//!
//! Failures are logged where they happen and returned; none of them leave a
//! half-built object reachable from a later draw.

mod cache;
mod draw;
mod error;
mod uniform;

use std::collections::HashMap;

use crate::backend::{
    Capability, ClearMask, CullMode, Device, FilterMode, TextureParameter, TextureTarget,
};
use crate::resources::{
    GeometryDescriptor, GeometryId, ShaderDescriptor, ShaderId, TextureDescriptor, TextureId,
};
use crate::shader::preprocess_shader;

pub use cache::*;
pub use error::GraphicsError;
pub use uniform::*;

/// Initial global render state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextConfig {
    pub clear_color: [f32; 4],
    pub depth_test: bool,
    pub culling: Option<CullMode>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            depth_test: true,
            culling: None,
        }
    }
}

/// Owns every GPU object created from descriptors.
pub struct RenderContext<D: Device> {
    device: D,
    geometries: HashMap<GeometryId, GpuGeometry<D>>,
    programs: HashMap<ShaderId, ProgramEntry<D>>,
    textures: HashMap<TextureId, GpuTexture<D>>,
    linkages: HashMap<(ShaderId, GeometryId), D::VertexArray>,
    viewport: (u32, u32),
    stats: ContextStats,
}

impl<D: Device> RenderContext<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, ContextConfig::default())
    }

    pub fn with_config(device: D, config: ContextConfig) -> Self {
        let capabilities = device.capabilities();
        let mut context = Self {
            device,
            geometries: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            linkages: HashMap::new(),
            viewport: (0, 0),
            stats: ContextStats::default(),
        };
        context.set_clear_color(config.clear_color);
        context.set_depth_test(config.depth_test);
        context.set_culling(config.culling);
        context.resize(
            capabilities.drawing_buffer_width,
            capabilities.drawing_buffer_height,
        );
        log::info!(
            "Render context created on {} ({} texture units)",
            context.device.name(),
            capabilities.max_texture_units
        );
        context
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Upload a geometry, or refresh the buffers of one uploaded before.
    ///
    /// Re-uploading keeps the existing handle and writes the descriptor's
    /// current content into it. If that refresh fails the geometry is
    /// released and must be uploaded again before it can be drawn.
    pub fn upload_geometry(
        &mut self,
        geometry: &GeometryDescriptor,
    ) -> Result<(), GraphicsError> {
        let id = geometry.id();
        if let Some(gpu) = self.geometries.get_mut(&id) {
            return match gpu.fill(&mut self.device, geometry) {
                Ok(false) => Ok(()),
                Ok(true) => {
                    self.delete_linkages(|_, g| g == id);
                    Ok(())
                }
                Err(err) => {
                    // A partial refill pairs new vertices with stale indices.
                    log::error!("Failed to refresh geometry {id:?}, dropping it: {err}");
                    self.delete_linkages(|_, g| g == id);
                    if let Some(gpu) = self.geometries.remove(&id) {
                        gpu.release(&mut self.device);
                    }
                    Err(err.into())
                }
            };
        }

        let gpu = GpuGeometry::create(&mut self.device, geometry).map_err(|err| {
            log::error!("Failed to upload geometry {id:?}: {err}");
            GraphicsError::from(err)
        })?;
        log::debug!(
            "Uploaded geometry {:?} ({} vertices, {} {:?} indices)",
            geometry.label().unwrap_or("unnamed"),
            gpu.vertex_count,
            gpu.index_count,
            gpu.index_format
        );
        self.geometries.insert(id, gpu);
        Ok(())
    }

    /// Release the buffers of a geometry and every vertex array built for
    /// it. No-op if the geometry is not uploaded.
    pub fn destroy_geometry(&mut self, geometry: &GeometryDescriptor) {
        let id = geometry.id();
        if let Some(gpu) = self.geometries.remove(&id) {
            self.delete_linkages(|_, g| g == id);
            gpu.release(&mut self.device);
            log::debug!("Destroyed geometry {id:?}");
        }
    }

    // =========================================================================
    // Programs
    // =========================================================================

    /// Compile and link a shader, replacing any previous program for it.
    ///
    /// The defines are expanded on every call. On failure the previous
    /// objects are gone and the entry becomes a tombstone: draws with this
    /// shader are skipped until it is compiled again successfully.
    pub fn compile_program(&mut self, shader: &ShaderDescriptor) -> Result<(), GraphicsError> {
        let id = shader.id();
        self.release_program(id);

        let vertex_source = preprocess_shader(shader.vertex_source(), &shader.defines);
        let fragment_source = preprocess_shader(shader.fragment_source(), &shader.defines);

        match build_program(&mut self.device, &vertex_source, &fragment_source) {
            Ok(program) => {
                log::debug!(
                    "Compiled program {:?} ({} uniforms)",
                    shader.label().unwrap_or("unnamed"),
                    program.uniforms.len()
                );
                self.programs.insert(id, ProgramEntry::Linked(program));
                Ok(())
            }
            Err(BuildError::Backend(err)) => {
                log::error!("Failed to create program objects for {id:?}: {err}");
                Err(err.into())
            }
            Err(BuildError::Compile(failure)) => {
                let label = shader.label().unwrap_or("unnamed");
                let err = match failure.stage {
                    Some(stage) => {
                        log::error!(
                            "Failed to compile {stage} shader of {label:?}:\n{}",
                            failure.log
                        );
                        GraphicsError::ShaderCompilation {
                            stage,
                            log: failure.log.clone(),
                        }
                    }
                    None => {
                        log::error!("Failed to link program {label:?}:\n{}", failure.log);
                        GraphicsError::ProgramLink {
                            log: failure.log.clone(),
                        }
                    }
                };
                self.programs.insert(id, ProgramEntry::Failed(failure));
                Err(err)
            }
        }
    }

    /// Delete the program of a shader and the vertex arrays built for it.
    /// Safe on tombstoned or never-compiled shaders.
    pub fn destroy_program(&mut self, shader: &ShaderDescriptor) {
        self.release_program(shader.id());
        self.programs.remove(&shader.id());
    }

    fn release_program(&mut self, id: ShaderId) {
        self.delete_linkages(|s, _| s == id);
        if let Some(ProgramEntry::Linked(program)) = self.programs.remove(&id) {
            program.release(&mut self.device);
            log::debug!("Released program {id:?}");
        }
    }

    // =========================================================================
    // Textures
    // =========================================================================

    /// Upload a texture. Uploading the same descriptor again releases the
    /// previous device texture first.
    pub fn upload_texture(&mut self, texture: &TextureDescriptor) -> Result<(), GraphicsError> {
        let id = texture.id();
        if let Some(previous) = self.textures.remove(&id) {
            log::debug!("Replacing texture {id:?}");
            self.device.delete_texture(previous.texture);
        }

        let handle = self.device.create_texture().map_err(|err| {
            log::error!("Failed to create texture {id:?}: {err}");
            GraphicsError::from(err)
        })?;
        let target = texture.target();
        let sampler = texture.sampler;

        self.device.active_texture(0);
        self.device.bind_texture(target, Some(handle));
        for image in texture.images() {
            self.device.tex_image_2d(
                image.target,
                texture.internal_format(),
                image.width,
                image.height,
                texture.format(),
                texture.pixel_type(),
                &image.pixels,
            );
        }
        self.device.tex_parameter(
            target,
            TextureParameter::MinFilter {
                filter: sampler.min_filter,
                mipmap: sampler.mipmaps.then_some(FilterMode::Linear),
            },
        );
        self.device
            .tex_parameter(target, TextureParameter::MagFilter(sampler.mag_filter));
        self.device
            .tex_parameter(target, TextureParameter::WrapS(sampler.wrap_s));
        self.device
            .tex_parameter(target, TextureParameter::WrapT(sampler.wrap_t));
        if target == TextureTarget::CubeMap {
            self.device
                .tex_parameter(target, TextureParameter::WrapR(sampler.wrap_t));
        }
        if sampler.mipmaps {
            self.device.generate_mipmap(target);
        }
        self.device.bind_texture(target, None);

        log::debug!(
            "Uploaded {:?} texture {:?} ({}x{})",
            target,
            texture.label().unwrap_or("unnamed"),
            texture.width(),
            texture.height()
        );
        self.textures.insert(
            id,
            GpuTexture {
                texture: handle,
                target,
                sampler,
                width: texture.width(),
                height: texture.height(),
            },
        );
        Ok(())
    }

    /// Release the device texture of a descriptor, if any.
    pub fn destroy_texture(&mut self, texture: &TextureDescriptor) {
        if let Some(gpu) = self.textures.remove(&texture.id()) {
            self.device.delete_texture(gpu.texture);
            log::debug!("Destroyed texture {:?}", texture.id());
        }
    }

    // =========================================================================
    // Global state
    // =========================================================================

    /// Update the viewport. Cached resources are untouched.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.device.viewport(0, 0, width as i32, height as i32);
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// Clear color and depth.
    pub fn clear(&mut self) {
        self.device.clear(ClearMask::COLOR | ClearMask::DEPTH);
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.device.clear_color(color);
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.device.set_capability(Capability::DepthTest, enabled);
    }

    /// `None` disables face culling.
    pub fn set_culling(&mut self, mode: Option<CullMode>) {
        match mode {
            Some(mode) => {
                self.device.cull_face(mode);
                self.device.set_capability(Capability::CullFace, true);
            }
            None => self.device.set_capability(Capability::CullFace, false),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&GpuGeometry<D>> {
        self.geometries.get(&id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&GpuTexture<D>> {
        self.textures.get(&id)
    }

    pub fn program(&self, id: ShaderId) -> Option<&GpuProgram<D>> {
        match self.programs.get(&id) {
            Some(ProgramEntry::Linked(program)) => Some(program),
            _ => None,
        }
    }

    /// `None` if the shader was never compiled or has been destroyed.
    pub fn program_state(&self, id: ShaderId) -> Option<ProgramState> {
        self.programs.get(&id).map(|entry| match entry {
            ProgramEntry::Linked(_) => ProgramState::Linked,
            ProgramEntry::Failed(_) => ProgramState::Failed,
        })
    }

    /// Compile or link log of a tombstoned program.
    pub fn program_failure(&self, id: ShaderId) -> Option<&ProgramFailure> {
        match self.programs.get(&id) {
            Some(ProgramEntry::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    pub fn uniform_table(&self, id: ShaderId) -> Option<&UniformTable<D>> {
        self.program(id).map(|p| &p.uniforms)
    }

    pub fn linkage(&self, shader: ShaderId, geometry: GeometryId) -> Option<D::VertexArray> {
        self.linkages.get(&(shader, geometry)).copied()
    }

    pub fn linkage_count(&self) -> usize {
        self.linkages.len()
    }

    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ContextStats::default();
    }

    fn delete_linkages(&mut self, mut matches: impl FnMut(ShaderId, GeometryId) -> bool) {
        let device = &mut self.device;
        self.linkages.retain(|&(shader, geometry), vertex_array| {
            if matches(shader, geometry) {
                device.delete_vertex_array(*vertex_array);
                false
            } else {
                true
            }
        });
    }
}

enum BuildError {
    Backend(crate::backend::BackendError),
    Compile(ProgramFailure),
}

impl From<crate::backend::BackendError> for BuildError {
    fn from(err: crate::backend::BackendError) -> Self {
        BuildError::Backend(err)
    }
}

/// Compile both stages, link them and introspect the result. Every object
/// created here is deleted again on failure.
fn build_program<D: Device>(
    device: &mut D,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<GpuProgram<D>, BuildError> {
    use crate::backend::ShaderStage;

    let vertex = compile_stage(device, ShaderStage::Vertex, vertex_source)?;
    let fragment = match compile_stage(device, ShaderStage::Fragment, fragment_source) {
        Ok(fragment) => fragment,
        Err(err) => {
            device.delete_shader(vertex);
            return Err(err);
        }
    };
    let program = match device.create_program() {
        Ok(program) => program,
        Err(err) => {
            device.delete_shader(vertex);
            device.delete_shader(fragment);
            return Err(err.into());
        }
    };
    device.attach_shader(program, vertex);
    device.attach_shader(program, fragment);

    if let Err(log) = device.link_program(program) {
        device.detach_shader(program, vertex);
        device.detach_shader(program, fragment);
        device.delete_shader(vertex);
        device.delete_shader(fragment);
        device.delete_program(program);
        return Err(BuildError::Compile(ProgramFailure { stage: None, log }));
    }

    let uniforms = introspect_uniforms(device, program);
    let attributes = AttributeLocations::query(device, program);
    Ok(GpuProgram {
        program,
        vertex,
        fragment,
        uniforms,
        attributes,
    })
}

fn compile_stage<D: Device>(
    device: &mut D,
    stage: crate::backend::ShaderStage,
    source: &str,
) -> Result<D::Shader, BuildError> {
    let shader = device.create_shader(stage)?;
    device.shader_source(shader, source);
    if let Err(log) = device.compile_shader(shader) {
        device.delete_shader(shader);
        return Err(BuildError::Compile(ProgramFailure {
            stage: Some(stage),
            log,
        }));
    }
    Ok(shader)
}

/// Build the uniform table of a linked program.
///
/// Arrays of basic types are reported as `name[0]`; every element gets its
/// own entry and the bare name aliases element 0. Uniforms without a valid
/// location or without an uploader for their kind are dropped.
fn introspect_uniforms<D: Device>(device: &mut D, program: D::Program) -> UniformTable<D> {
    let mut table = UniformTable::default();
    for active in device.active_uniforms(program) {
        let Some(upload) = uploader_for::<D>(active.kind) else {
            log::debug!("Skipping uniform {} of unsupported type", active.name);
            continue;
        };
        let mut names = vec![active.name.clone()];
        if let Some(base) = active.name.strip_suffix("[0]") {
            names.push(base.to_string());
            names.extend((1..active.size).map(|i| format!("{base}[{i}]")));
        }
        for name in names {
            match device.uniform_location(program, &name) {
                Some(location) => {
                    table.insert(name, UniformEntry::new(location, active.kind, upload))
                }
                None => log::debug!("Uniform {name} has no location"),
            }
        }
    }
    table
}
