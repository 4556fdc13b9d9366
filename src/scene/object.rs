//! Renderable scene objects

use std::sync::Arc;

use glam::Mat4;

use super::Transform;
use crate::context::UniformMap;
use crate::resources::{GeometryDescriptor, PbrMaterial};

/// A geometry placed in the world with a material.
///
/// Objects share geometry: every sphere of the grid points at the same
/// descriptor and therefore the same device buffers.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub geometry: Arc<GeometryDescriptor>,
    pub transform: Transform,
    pub material: PbrMaterial,
}

impl SceneObject {
    pub fn new(geometry: Arc<GeometryDescriptor>, material: PbrMaterial) -> Self {
        Self {
            geometry,
            transform: Transform::default(),
            material,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Write the `uModel` block and the material.
    pub fn write_uniforms(&self, view_projection: Mat4, uniforms: &mut UniformMap) {
        let model = self.transform.matrix();
        uniforms
            .set("uModel.localToProjection", view_projection * model)
            .set("uModel.localToWorld", model)
            .set("uModel.normalMatrix", self.transform.normal_matrix());
        self.material.write_uniforms(uniforms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UniformValue;
    use crate::resources::primitives;
    use glam::Vec3;

    #[test]
    fn test_model_uniforms() {
        let geometry = Arc::new(GeometryDescriptor::new(primitives::triangle()).unwrap());
        let object = SceneObject::new(geometry, PbrMaterial::default())
            .with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0)));

        let mut uniforms = UniformMap::new();
        object.write_uniforms(Mat4::IDENTITY, &mut uniforms);

        let Some(UniformValue::Mat4(m)) = uniforms.get("uModel.localToWorld") else {
            panic!("missing model matrix");
        };
        assert_eq!(m[12], 1.0);
        assert!(matches!(uniforms.get("uModel.normalMatrix"), Some(UniformValue::Mat3(_))));
        assert!(uniforms.get("uMaterial.roughness").is_some());
    }
}
