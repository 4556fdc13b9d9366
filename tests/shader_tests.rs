//! Integration tests for the built-in shaders on the headless device.
//!
//! # Test Categories
//!
//! - **Variant Tests**: uniform tables of the PBR define combinations
//! - **Scene Tests**: full object uniform sets drawn without rejections
//! - **Skybox Tests**: cube map sampling

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3};
use rstest::rstest;

use common::{context, cube_texture};
use glint::backend::{ShaderStage, UniformKind};
use glint::resources::primitives;
use glint::scene::{setup, Camera, DirectionalLight, SceneObject};
use glint::shader::{cubemap_shader, pbr_shader, PbrShaderOptions};
use glint::{GeometryDescriptor, GraphicsError, PbrMaterial, TextureDescriptor, UniformMap};

// ============================================================================
// Variant Tests
// ============================================================================

#[rstest]
#[case::single(1)]
#[case::default_grid(4)]
#[case::many(8)]
fn test_point_light_array_matches_count(#[case] count: u32) {
    let mut context = context();
    let shader = pbr_shader(PbrShaderOptions {
        point_light_count: count,
        ..Default::default()
    });
    context.compile_program(&shader).unwrap();

    let table = context.uniform_table(shader.id()).unwrap();
    for i in 0..count {
        assert_eq!(table.kind(&format!("lights[{i}].position")), Some(UniformKind::Vec3));
        assert_eq!(table.kind(&format!("lights[{i}].color")), Some(UniformKind::Vec3));
        assert_eq!(table.kind(&format!("lights[{i}].intensity")), Some(UniformKind::Float));
        assert_eq!(table.kind(&format!("lights[{i}].isActive")), Some(UniformKind::Bool));
    }
    assert!(!table.contains(&format!("lights[{count}].position")));
}

#[test]
fn test_zero_point_lights_drop_the_array() {
    let mut context = context();
    let shader = pbr_shader(PbrShaderOptions {
        point_light_count: 0,
        directional_light_count: 2,
        ..Default::default()
    });
    context.compile_program(&shader).unwrap();

    let table = context.uniform_table(shader.id()).unwrap();
    assert!(!table.contains("lights[0].position"));
    assert!(table.contains("directionalLights[1].direction"));
    assert!(!table.contains("directionalLights[2].direction"));
}

#[rstest]
#[case::with_probe(true)]
#[case::without_probe(false)]
fn test_light_probe_samplers(#[case] light_probe: bool) {
    let mut context = context();
    let shader = pbr_shader(PbrShaderOptions {
        light_probe,
        ..Default::default()
    });
    context.compile_program(&shader).unwrap();

    let table = context.uniform_table(shader.id()).unwrap();
    for name in ["diffuse_IBL", "specular_IBL", "BRDFIntegrationMap"] {
        let expected = light_probe.then_some(UniformKind::Sampler2D);
        assert_eq!(table.kind(name), expected, "{name}");
    }
    assert_eq!(table.contains("enableIBLDiffuse"), light_probe);
}

#[test]
fn test_material_maps_need_uvs() {
    let mut context = context();
    let mut shader = pbr_shader(PbrShaderOptions {
        use_material_maps: true,
        ..Default::default()
    });
    shader.defines.remove("USE_UV");

    let err = context.compile_program(&shader).unwrap_err();

    match err {
        GraphicsError::ShaderCompilation { stage, log } => {
            assert_eq!(stage, ShaderStage::Fragment);
            assert!(log.contains("USE_MATERIAL_MAPS requires USE_UV"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_options_take_effect_on_recompile() {
    let mut context = context();
    let mut shader = pbr_shader(PbrShaderOptions::default());
    context.compile_program(&shader).unwrap();
    assert!(context.program(shader.id()).unwrap().attributes.uv.is_none());

    PbrShaderOptions {
        use_uv: true,
        use_tangent: true,
        ..Default::default()
    }
    .apply(&mut shader);
    context.compile_program(&shader).unwrap();

    let attributes = context.program(shader.id()).unwrap().attributes;
    assert!(attributes.uv.is_some());
    assert!(attributes.tangent.is_some());
}

// ============================================================================
// Scene Tests
// ============================================================================

#[test]
fn test_grid_object_uniforms_all_fit() {
    let mut context = context();
    let shader = pbr_shader(PbrShaderOptions {
        directional_light_count: 1,
        ..Default::default()
    });
    let sphere = Arc::new(GeometryDescriptor::new(primitives::sphere(0.5, 16, 16)).unwrap());
    context.upload_geometry(&sphere).unwrap();
    context.compile_program(&shader).unwrap();

    let camera = Camera::default();
    let lights = setup::default_point_lights();
    let sun = DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE, 2.0);
    for object in setup::sphere_grid(Arc::clone(&sphere)) {
        let mut uniforms = UniformMap::new();
        camera.write_uniforms(&mut uniforms);
        for (i, light) in lights.iter().enumerate() {
            light.write_uniforms(i, true, &mut uniforms);
        }
        sun.write_uniforms(0, &mut uniforms);
        uniforms.set("enableDiffuse", true).set("enableSpecular", true);
        object.write_uniforms(camera.view_projection_matrix(), &mut uniforms);
        context.draw(&sphere, &shader, &uniforms).unwrap();
    }

    let stats = context.stats();
    assert_eq!(stats.draw_calls, 25);
    assert_eq!(stats.uniforms_rejected, 0);
    assert_eq!(stats.linkages_created, 1);
    assert!(context.device().errors().is_empty());

    let program = context.program(shader.id()).unwrap().program;
    let device = context.device();
    assert_eq!(
        device.uniform_value(program, "lights[3].position").unwrap().as_f32(),
        Some(&[2.0f32, 2.0, 0.0][..])
    );
    assert_eq!(
        device.uniform_value(program, "lights[0].isActive").unwrap().as_u32(),
        Some(&[1u32][..])
    );
    // The last object drawn is the top-right sphere: fully metallic.
    assert_eq!(
        device.uniform_value(program, "uMaterial.metallic").unwrap().as_f32(),
        Some(&[1.0f32][..])
    );
}

#[test]
fn test_material_maps_with_tangents() {
    let mut context = context();
    let shader = pbr_shader(PbrShaderOptions {
        use_tangent: true,
        use_material_maps: true,
        ..Default::default()
    });
    let data = primitives::sphere(1.0, 12, 12).with_generated_tangents().unwrap();
    let sphere = Arc::new(GeometryDescriptor::new(data).unwrap());
    let albedo = Arc::new(TextureDescriptor::white());
    let roughness = Arc::new(TextureDescriptor::white());
    let normal = Arc::new(TextureDescriptor::default_normal());
    context.upload_geometry(&sphere).unwrap();
    context.compile_program(&shader).unwrap();
    for texture in [&albedo, &roughness, &normal] {
        context.upload_texture(texture).unwrap();
    }

    let material = PbrMaterial::plastic(Vec3::ONE).with_maps(albedo, roughness, normal);
    let object = SceneObject::new(Arc::clone(&sphere), material);
    let mut uniforms = UniformMap::new();
    object.write_uniforms(Mat4::IDENTITY, &mut uniforms);
    context.draw(&sphere, &shader, &uniforms).unwrap();

    let draw = &context.device().draws()[0];
    assert_eq!(draw.attributes.len(), 4);
    assert!(draw.attributes.iter().any(|a| a.size == 4));
    assert_eq!(context.stats().textures_bound, 3);
    assert_eq!(context.stats().uniforms_rejected, 0);
}

// ============================================================================
// Skybox Tests
// ============================================================================

#[test]
fn test_skybox_samples_cube_map() {
    let mut context = context();
    let shader = cubemap_shader();
    let cube = GeometryDescriptor::new(primitives::cube(2.0)).unwrap();
    let sky = cube_texture();
    context.upload_geometry(&cube).unwrap();
    context.compile_program(&shader).unwrap();
    context.upload_texture(&sky).unwrap();

    let mut uniforms = UniformMap::new();
    uniforms
        .set("uSkyboxViewProjection", Camera::default().view_projection_matrix())
        .set_texture("skybox", &sky);
    context.draw(&cube, &shader, &uniforms).unwrap();

    assert_eq!(
        context.uniform_table(shader.id()).unwrap().kind("skybox"),
        Some(UniformKind::SamplerCube)
    );
    assert_eq!(context.stats().textures_bound, 1);
    // Only the position stream is declared.
    assert_eq!(context.device().draws()[0].attributes.len(), 1);
}
