//! Built-in shaders.
//!
//! The GLSL ES 3.00 sources are stored in `shaders/` and embedded at
//! compile time:
//! - `pbr.vert` / `pbr.frag` - Cook-Torrance shading with point,
//!   directional and image-based lights
//! - `cubemap.vert` / `cubemap.frag` - Skybox
//!
//! # PBR defines
//!
//! | Define | Effect |
//! |--------|--------|
//! | `POINT_LIGHT_COUNT` | Size of the `lights[]` uniform array |
//! | `DIRECTIONAL_LIGHT_COUNT` | Size of the `directionalLights[]` uniform array |
//! | `LIGHT_PROBE` | Diffuse/specular IBL and the BRDF lookup table |
//! | `USE_UV` | `in_uv` attribute and `vUv` varying |
//! | `USE_TANGENT` | `in_tangent` attribute, enables normal mapping |
//! | `USE_MATERIAL_MAPS` | Albedo, roughness and normal maps (needs `USE_UV`) |

use crate::resources::ShaderDescriptor;

// =============================================================================
// Shader Sources (loaded from files at compile time)
// =============================================================================

pub const PBR_VERTEX_SOURCE: &str = include_str!("../../shaders/pbr.vert");

pub const PBR_FRAGMENT_SOURCE: &str = include_str!("../../shaders/pbr.frag");

pub const CUBEMAP_VERTEX_SOURCE: &str = include_str!("../../shaders/cubemap.vert");

pub const CUBEMAP_FRAGMENT_SOURCE: &str = include_str!("../../shaders/cubemap.frag");

// =============================================================================
// PbrShaderOptions
// =============================================================================

/// Typed front-end for the PBR shader defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PbrShaderOptions {
    pub point_light_count: u32,
    pub directional_light_count: u32,
    pub light_probe: bool,
    pub use_uv: bool,
    pub use_tangent: bool,
    pub use_material_maps: bool,
}

impl Default for PbrShaderOptions {
    fn default() -> Self {
        Self {
            point_light_count: 4,
            directional_light_count: 0,
            light_probe: false,
            use_uv: false,
            use_tangent: false,
            use_material_maps: false,
        }
    }
}

impl PbrShaderOptions {
    /// Write the options into a descriptor's define map. Takes effect on
    /// the next compile of that descriptor.
    pub fn apply(&self, shader: &mut ShaderDescriptor) {
        let defines = &mut shader.defines;
        defines.set("POINT_LIGHT_COUNT", self.point_light_count);
        defines.set("DIRECTIONAL_LIGHT_COUNT", self.directional_light_count);
        defines.set("LIGHT_PROBE", self.light_probe);
        defines.set("USE_UV", self.use_uv || self.use_material_maps);
        defines.set("USE_TANGENT", self.use_tangent);
        defines.set("USE_MATERIAL_MAPS", self.use_material_maps);
    }
}

/// PBR shader configured with `options`.
pub fn pbr_shader(options: PbrShaderOptions) -> ShaderDescriptor {
    let mut shader =
        ShaderDescriptor::new(PBR_VERTEX_SOURCE, PBR_FRAGMENT_SOURCE).with_label("pbr");
    options.apply(&mut shader);
    shader
}

/// Skybox shader sampling the `skybox` cube map.
pub fn cubemap_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(CUBEMAP_VERTEX_SOURCE, CUBEMAP_FRAGMENT_SOURCE).with_label("cubemap")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ShaderDef;

    #[test]
    fn test_pbr_defaults() {
        let shader = pbr_shader(PbrShaderOptions::default());
        assert_eq!(shader.label(), Some("pbr"));
        assert_eq!(shader.defines.get("POINT_LIGHT_COUNT"), Some(ShaderDef::UInt(4)));
        assert_eq!(shader.defines.get("LIGHT_PROBE"), Some(ShaderDef::Bool(false)));
    }

    #[test]
    fn test_material_maps_imply_uv() {
        let shader = pbr_shader(PbrShaderOptions {
            use_material_maps: true,
            ..Default::default()
        });
        assert_eq!(shader.defines.get("USE_UV"), Some(ShaderDef::Bool(true)));
    }

    #[test]
    fn test_sources_have_no_version_line() {
        for source in [
            PBR_VERTEX_SOURCE,
            PBR_FRAGMENT_SOURCE,
            CUBEMAP_VERTEX_SOURCE,
            CUBEMAP_FRAGMENT_SOURCE,
        ] {
            assert!(!source.contains("#version"));
            assert!(source.contains("void\nmain()"));
        }
    }
}
