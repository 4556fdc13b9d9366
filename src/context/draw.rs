//! Draw dispatch
//!
//! One call to [`RenderContext::draw`] resolves the cached geometry and
//! program, creates the vertex array of the pair on first use, uploads the
//! uniform map and issues a single indexed draw.

use std::collections::HashMap;

use crate::backend::{BufferTarget, Device};
use crate::resources::{GeometryDescriptor, ShaderDescriptor, ShaderId, TextureId};

use super::cache::{AttributeLocations, GpuGeometry, GpuTexture, ProgramEntry};
use super::uniform::{UniformEntry, UniformMap, UniformValue};
use super::{GraphicsError, RenderContext};

impl<D: Device> RenderContext<D> {
    /// Draw `geometry` with the program compiled from `shader`.
    ///
    /// Nothing reaches the device unless both the geometry and the program
    /// resolve. Uniforms the program does not declare are ignored; uniforms
    /// whose value does not fit the declared type are skipped with a warning.
    pub fn draw(
        &mut self,
        geometry: &GeometryDescriptor,
        shader: &ShaderDescriptor,
        uniforms: &UniformMap,
    ) -> Result<(), GraphicsError> {
        let geometry_id = geometry.id();
        let shader_id = shader.id();

        let Some(gpu_geometry) = self.geometries.get(&geometry_id) else {
            log::error!(
                "Draw of geometry {:?} ({geometry_id:?}) before it was uploaded",
                geometry.label().unwrap_or("unnamed")
            );
            self.stats.draws_skipped += 1;
            return Err(GraphicsError::GeometryNotUploaded(geometry_id));
        };
        let program = match self.programs.get(&shader_id) {
            Some(ProgramEntry::Linked(program)) => program,
            Some(ProgramEntry::Failed(_)) => {
                self.stats.draws_skipped += 1;
                return Err(GraphicsError::ProgramUnavailable(shader_id));
            }
            None => {
                log::error!(
                    "Draw with shader {:?} ({shader_id:?}) before it was compiled",
                    shader.label().unwrap_or("unnamed")
                );
                self.stats.draws_skipped += 1;
                return Err(GraphicsError::ProgramNotCompiled(shader_id));
            }
        };

        let key = (shader_id, geometry_id);
        let vertex_array = match self.linkages.get(&key) {
            Some(&vertex_array) => vertex_array,
            None => {
                let linkage = create_linkage(&mut self.device, gpu_geometry, &program.attributes);
                let vertex_array = match linkage {
                    Ok(vertex_array) => vertex_array,
                    Err(err) => {
                        log::error!("Failed to create vertex array for {key:?}: {err}");
                        self.stats.draws_skipped += 1;
                        return Err(err.into());
                    }
                };
                log::debug!(
                    "Created vertex array for shader {shader_id:?} and geometry {geometry_id:?}"
                );
                self.stats.linkages_created += 1;
                self.linkages.insert(key, vertex_array);
                vertex_array
            }
        };

        self.device.use_program(Some(program.program));
        self.device.bind_vertex_array(Some(vertex_array));

        let max_units = self.device.capabilities().max_texture_units;
        let mut next_unit = 0u32;
        for (name, value) in uniforms.iter() {
            let Some(entry) = program.uniforms.get(name) else {
                log::trace!("Uniform {name} is not used by shader {shader_id:?}");
                continue;
            };
            let uploaded = match value {
                UniformValue::Texture(texture) => {
                    let binding = bind_texture_unit(
                        &mut self.device,
                        &self.textures,
                        entry,
                        *texture,
                        next_unit,
                        max_units,
                    );
                    match binding {
                        TextureBinding::Bound => {
                            next_unit += 1;
                            self.stats.textures_bound += 1;
                            true
                        }
                        TextureBinding::Missing => {
                            log::debug!("Texture {texture:?} for {name} is not uploaded yet");
                            continue;
                        }
                        TextureBinding::Rejected(reason) => {
                            log::warn!("Skipping uniform {name} of shader {shader_id:?}: {reason}");
                            false
                        }
                    }
                }
                value => {
                    let uploaded = entry.upload(&mut self.device, value);
                    if !uploaded {
                        log::warn!(
                            "Skipping uniform {name} of shader {shader_id:?}: {} does not fit {:?}",
                            value.type_name(),
                            entry.kind
                        );
                    }
                    uploaded
                }
            };
            if uploaded {
                self.stats.uniforms_uploaded += 1;
            } else {
                self.stats.uniforms_rejected += 1;
            }
        }

        self.device.draw_elements(
            gpu_geometry.topology,
            gpu_geometry.index_count as i32,
            gpu_geometry.index_format,
            0,
        );
        self.device.bind_vertex_array(None);
        self.stats.draw_calls += 1;
        Ok(())
    }

    /// Whether a draw of this pair would reach the device.
    pub fn is_drawable(&self, geometry: &GeometryDescriptor, shader_id: ShaderId) -> bool {
        self.geometries.contains_key(&geometry.id())
            && matches!(self.programs.get(&shader_id), Some(ProgramEntry::Linked(_)))
    }
}

enum TextureBinding {
    Bound,
    Missing,
    Rejected(String),
}

fn bind_texture_unit<D: Device>(
    device: &mut D,
    textures: &HashMap<TextureId, GpuTexture<D>>,
    entry: &UniformEntry<D>,
    texture: TextureId,
    unit: u32,
    max_units: u32,
) -> TextureBinding {
    let Some(target) = entry.kind.sampler_target() else {
        return TextureBinding::Rejected(format!("texture given for a {:?} uniform", entry.kind));
    };
    let Some(gpu) = textures.get(&texture) else {
        return TextureBinding::Missing;
    };
    if gpu.target != target {
        return TextureBinding::Rejected(format!(
            "{:?} texture given for a {:?} sampler",
            gpu.target, entry.kind
        ));
    }
    if unit >= max_units {
        return TextureBinding::Rejected(format!("out of texture units ({max_units} available)"));
    }
    device.active_texture(unit);
    device.bind_texture(target, Some(gpu.texture));
    entry.upload(device, &UniformValue::Int(unit as i32));
    TextureBinding::Bound
}

/// Build the vertex array binding `geometry`'s streams to the program.
///
/// An optional stream is bound only if the program has a location for it
/// and the geometry provides it. Each stream lives in its own tightly
/// packed buffer.
fn create_linkage<D: Device>(
    device: &mut D,
    geometry: &GpuGeometry<D>,
    attributes: &AttributeLocations,
) -> crate::backend::BackendResult<D::VertexArray> {
    let vertex_array = device.create_vertex_array()?;
    device.bind_vertex_array(Some(vertex_array));

    let streams = [
        (attributes.position, Some(geometry.position), 3),
        (attributes.normal, geometry.normal, 3),
        (attributes.uv, geometry.uv, 2),
        (attributes.tangent, geometry.tangent, 4),
    ];
    for (location, buffer, size) in streams {
        let (Some(location), Some(buffer)) = (location, buffer) else {
            continue;
        };
        device.bind_buffer(BufferTarget::Array, Some(buffer));
        device.enable_vertex_attrib_array(location);
        device.vertex_attrib_pointer_f32(location, size, size * 4, 0);
    }
    device.bind_buffer(BufferTarget::Array, None);
    device.bind_buffer(BufferTarget::ElementArray, Some(geometry.index));

    device.bind_vertex_array(None);
    Ok(vertex_array)
}
