//! Default scene: a grid of spheres lit by four point lights

use std::sync::Arc;

use glam::Vec3;

use super::{PointLight, SceneObject, Transform};
use crate::resources::{GeometryDescriptor, PbrMaterial};

/// Spheres per row and per column
pub const GRID_SIZE: usize = 5;
/// Distance between the first and last sphere of a row
pub const GRID_EXTENT: f32 = 5.0;
/// Depth of the grid plane; the orbit focus sits at its center
pub const GRID_DEPTH: f32 = -7.0;

const GRID_ALBEDO: Vec3 = Vec3::splat(0.7);
const LIGHT_INTENSITY: f32 = 20.0;

/// 5x5 grid of spheres sharing `geometry`.
///
/// Metallic rises from 0 to 1 along X, roughness from 0 to 1 along Y.
pub fn sphere_grid(geometry: Arc<GeometryDescriptor>) -> Vec<SceneObject> {
    let step = 1.0 / (GRID_SIZE - 1) as f32;
    let spacing = GRID_EXTENT * step;
    let start = Vec3::new(-GRID_EXTENT / 2.0, -GRID_EXTENT / 2.0, GRID_DEPTH);

    let mut objects = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    for column in 0..GRID_SIZE {
        for row in 0..GRID_SIZE {
            let position = start + Vec3::new(spacing * column as f32, spacing * row as f32, 0.0);
            let material = PbrMaterial::new(GRID_ALBEDO, step * row as f32, step * column as f32);
            objects.push(
                SceneObject::new(Arc::clone(&geometry), material)
                    .with_transform(Transform::from_position(position)),
            );
        }
    }
    objects
}

/// Four white point lights in front of the grid.
pub fn default_point_lights() -> Vec<PointLight> {
    [
        Vec3::new(-2.0, -2.0, 1.0),
        Vec3::new(-2.0, 2.0, 1.0),
        Vec3::new(2.0, -2.0, 0.0),
        Vec3::new(2.0, 2.0, 0.0),
    ]
    .into_iter()
    .map(|position| PointLight::new(position).with_intensity(LIGHT_INTENSITY))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::primitives;

    #[test]
    fn test_sphere_grid_ramps() {
        let geometry = Arc::new(GeometryDescriptor::new(primitives::sphere(0.5, 8, 8)).unwrap());
        let objects = sphere_grid(Arc::clone(&geometry));

        assert_eq!(objects.len(), 25);
        assert!(objects.iter().all(|o| Arc::ptr_eq(&o.geometry, &geometry)));

        let first = &objects[0];
        assert_eq!(first.transform.position, Vec3::new(-2.5, -2.5, -7.0));
        assert_eq!((first.material.metallic, first.material.roughness), (0.0, 0.0));

        let last = &objects[24];
        assert_eq!(last.transform.position, Vec3::new(2.5, 2.5, -7.0));
        assert_eq!((last.material.metallic, last.material.roughness), (1.0, 1.0));

        // Row index drives roughness
        assert_eq!(objects[1].material.roughness, 0.25);
        assert_eq!(objects[1].material.metallic, 0.0);
    }

    #[test]
    fn test_default_lights_are_distinct() {
        let lights = default_point_lights();
        assert_eq!(lights.len(), 4);
        for (i, a) in lights.iter().enumerate() {
            for b in &lights[i + 1..] {
                assert_ne!(a.position, b.position);
            }
        }
    }
}
