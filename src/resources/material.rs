//! Material definitions for PBR rendering

use std::sync::Arc;

use glam::Vec3;

use super::texture::TextureDescriptor;
use crate::context::UniformMap;

/// PBR material properties
#[derive(Debug, Clone)]
pub struct PbrMaterial {
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,

    /// Maps are only sampled by shaders compiled with `USE_MATERIAL_MAPS`.
    pub albedo_map: Option<Arc<TextureDescriptor>>,
    pub roughness_map: Option<Arc<TextureDescriptor>>,
    pub normal_map: Option<Arc<TextureDescriptor>>,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            roughness: 0.5,
            metallic: 0.0,
            albedo_map: None,
            roughness_map: None,
            normal_map: None,
        }
    }
}

impl PbrMaterial {
    pub fn new(albedo: Vec3, roughness: f32, metallic: f32) -> Self {
        Self {
            albedo,
            roughness,
            metallic,
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, albedo: Vec3) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_maps(
        mut self,
        albedo: Arc<TextureDescriptor>,
        roughness: Arc<TextureDescriptor>,
        normal: Arc<TextureDescriptor>,
    ) -> Self {
        self.albedo_map = Some(albedo);
        self.roughness_map = Some(roughness);
        self.normal_map = Some(normal);
        self
    }

    pub fn has_maps(&self) -> bool {
        self.albedo_map.is_some() || self.roughness_map.is_some() || self.normal_map.is_some()
    }

    /// Write the `uMaterial` uniforms. Missing maps are simply left out.
    pub fn write_uniforms(&self, uniforms: &mut UniformMap) {
        uniforms.set("uMaterial.albedo", self.albedo);
        uniforms.set("uMaterial.roughness", self.roughness);
        uniforms.set("uMaterial.metallic", self.metallic);
        if let Some(map) = &self.albedo_map {
            uniforms.set_texture("uMaterial.texAlbedo", map);
        }
        if let Some(map) = &self.roughness_map {
            uniforms.set_texture("uMaterial.texRoughness", map);
        }
        if let Some(map) = &self.normal_map {
            uniforms.set_texture("uMaterial.texNormal", map);
        }
    }

    // Preset materials

    pub fn plastic(color: Vec3) -> Self {
        Self::new(color, 0.4, 0.0)
    }

    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self::new(color, roughness, 1.0)
    }

    pub fn gold() -> Self {
        Self::metal(Vec3::new(1.0, 0.766, 0.336), 0.3)
    }

    pub fn silver() -> Self {
        Self::metal(Vec3::new(0.972, 0.960, 0.915), 0.2)
    }

    pub fn copper() -> Self {
        Self::metal(Vec3::new(0.955, 0.637, 0.538), 0.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UniformValue;

    #[test]
    fn test_scalar_uniforms() {
        let mut uniforms = UniformMap::new();
        PbrMaterial::gold().write_uniforms(&mut uniforms);
        assert_eq!(uniforms.get("uMaterial.metallic"), Some(&UniformValue::Float(1.0)));
        assert_eq!(
            uniforms.get("uMaterial.albedo"),
            Some(&UniformValue::Vec3([1.0, 0.766, 0.336]))
        );
        assert!(uniforms.get("uMaterial.texAlbedo").is_none());
    }

    #[test]
    fn test_maps_become_texture_references() {
        let albedo = Arc::new(TextureDescriptor::white());
        let material = PbrMaterial::default().with_maps(
            albedo.clone(),
            Arc::new(TextureDescriptor::white()),
            Arc::new(TextureDescriptor::default_normal()),
        );
        assert!(material.has_maps());
        let mut uniforms = UniformMap::new();
        material.write_uniforms(&mut uniforms);
        assert_eq!(
            uniforms.get("uMaterial.texAlbedo"),
            Some(&UniformValue::Texture(albedo.id()))
        );
    }
}
