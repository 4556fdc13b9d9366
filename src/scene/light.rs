//! Light types for the scene
//!
//! Lights write themselves into the `lights[i]` and `directionalLights[i]`
//! struct arrays of the PBR shader.

use glam::Vec3;

use crate::context::UniformMap;

/// Light emitting in all directions from a point, attenuated with distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// World space
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// Write `lights[index].*`.
    pub fn write_uniforms(&self, index: usize, active: bool, uniforms: &mut UniformMap) {
        uniforms
            .set(format!("lights[{index}].position"), self.position)
            .set(format!("lights[{index}].color"), self.color)
            .set(format!("lights[{index}].intensity"), self.intensity)
            .set(format!("lights[{index}].isActive"), active);
    }
}

/// Light arriving from a single direction with no attenuation, like sunlight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::Z,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        let mut light = Self {
            color,
            intensity,
            ..Default::default()
        };
        light.set_direction(direction);
        light
    }

    /// Normalized, world space
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// A zero vector keeps the previous direction.
    pub fn set_direction(&mut self, direction: Vec3) {
        if let Some(direction) = direction.try_normalize() {
            self.direction = direction;
        }
    }

    /// Write `directionalLights[index].*`.
    pub fn write_uniforms(&self, index: usize, uniforms: &mut UniformMap) {
        uniforms
            .set(format!("directionalLights[{index}].direction"), self.direction)
            .set(format!("directionalLights[{index}].color"), self.color)
            .set(format!("directionalLights[{index}].intensity"), self.intensity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UniformValue;

    #[test]
    fn test_point_light_uniforms() {
        let mut uniforms = UniformMap::new();
        PointLight::new(Vec3::new(1.0, 2.0, 3.0))
            .with_intensity(20.0)
            .write_uniforms(2, false, &mut uniforms);

        assert_eq!(
            uniforms.get("lights[2].position"),
            Some(&UniformValue::Vec3([1.0, 2.0, 3.0]))
        );
        assert_eq!(uniforms.get("lights[2].intensity"), Some(&UniformValue::Float(20.0)));
        assert_eq!(uniforms.get("lights[2].isActive"), Some(&UniformValue::Bool(false)));
        assert_eq!(uniforms.len(), 4);
    }

    #[test]
    fn test_directional_light_normalized() {
        let mut light = DirectionalLight::new(Vec3::new(0.0, -3.0, 0.0), Vec3::ONE, 1.0);
        assert_eq!(light.direction(), -Vec3::Y);

        light.set_direction(Vec3::ZERO);
        assert_eq!(light.direction(), -Vec3::Y);
    }
}
