//! Integration tests for the render context.
//!
//! # Test Categories
//!
//! - **Geometry Tests**: upload, refresh and destruction of vertex data
//! - **Program Tests**: compilation, tombstones, defines and the uniform table
//! - **Draw Tests**: linkage creation, uniform dispatch, texture units
//! - **Texture Tests**: upload paths and sampling state
//! - **State Tests**: viewport, clear color, depth test and culling

mod common;

use rstest::rstest;

use common::*;
use glint::backend::headless::{BoundTexture, DeviceCommand, UniformData};
use glint::backend::{
    AddressMode, CullMode, IndexFormat, PrimitiveTopology, TextureParameter, TextureTarget,
    UniformKind,
};
use glint::context::ProgramState;
use glint::resources::{primitives, GeometryData, SamplerParams};
use glint::{
    GeometryDescriptor, GraphicsError, ShaderDescriptor, TextureDescriptor, UniformMap,
    UniformValue,
};

// ============================================================================
// Geometry Tests
// ============================================================================

#[test]
fn test_upload_geometry_is_idempotent() {
    let geometry = triangle();
    let shader = full_shader();

    let mut once = context();
    prepare(&mut once, &geometry, &shader);
    once.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    let mut twice = context();
    prepare(&mut twice, &geometry, &shader);
    twice.upload_geometry(&geometry).unwrap();
    twice.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    assert_eq!(once.device().buffer_count(), twice.device().buffer_count());
    let (a, b) = (&once.device().draws()[0], &twice.device().draws()[0]);
    assert_eq!(
        (a.topology, a.count, a.index_format, a.offset),
        (b.topology, b.count, b.index_format, b.offset)
    );
    assert_eq!(a.attributes.len(), b.attributes.len());
}

#[test]
fn test_reupload_uses_new_data_with_same_handles() {
    let mut context = context();
    let mut geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    let before = context.geometry(geometry.id()).unwrap().position;
    let linkage = context.linkage(shader.id(), geometry.id());

    let moved = primitives::triangle();
    let positions: Vec<[f32; 3]> = geometry
        .positions()
        .iter()
        .map(|p| [p[0] + 1.0, p[1], p[2]])
        .collect();
    geometry
        .update(GeometryData { positions: positions.clone(), ..moved })
        .unwrap();
    context.upload_geometry(&geometry).unwrap();
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    let gpu = context.geometry(geometry.id()).unwrap();
    assert_eq!(gpu.position, before);
    assert_eq!(
        context.device().buffer_contents(gpu.position).unwrap(),
        bytemuck::cast_slice::<_, u8>(&positions)
    );
    // Same streams, so the vertex array survives.
    assert_eq!(context.linkage(shader.id(), geometry.id()), linkage);
    assert_eq!(context.device().draws()[1].attributes[0].buffer, Some(before));
}

#[test]
fn test_reupload_with_new_streams_rebuilds_linkage() {
    let mut context = context();
    let mut geometry = triangle_without_uvs();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().draws()[0].attributes.len(), 2);

    geometry.update(primitives::triangle()).unwrap();
    context.upload_geometry(&geometry).unwrap();
    assert_eq!(context.linkage_count(), 0);

    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().draws()[1].attributes.len(), 3);
    assert_eq!(context.stats().linkages_created, 2);
}

#[test]
fn test_destroy_geometry_releases_buffers_and_linkages() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().vertex_array_count(), 1);

    context.destroy_geometry(&geometry);

    assert_eq!(context.linkage_count(), 0);
    assert_eq!(context.device().vertex_array_count(), 0);
    assert_eq!(context.device().buffer_count(), 0);
    assert!(context.geometry(geometry.id()).is_none());
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::GeometryNotUploaded(_))
    ));

    // Destroying twice is a no-op.
    context.destroy_geometry(&geometry);
}

#[test]
fn test_upload_geometry_allocation_failure_leaks_nothing() {
    let mut context = context();
    let geometry = triangle();
    context.device_mut().set_fail_allocations(true);

    assert!(matches!(
        context.upload_geometry(&geometry),
        Err(GraphicsError::Backend(_))
    ));
    assert!(context.geometry(geometry.id()).is_none());
    assert_eq!(context.device().buffer_count(), 0);
}

#[test]
fn test_failed_refresh_drops_geometry() {
    let mut context = context();
    let positions: Vec<[f32; 3]> = (0..300).map(|i| [i as f32, 0.0, 0.0]).collect();
    let indices: Vec<u32> = (0..900).map(|i| i % 300).collect();
    let data = GeometryData::new(positions, indices).with_normals(vec![[0.0, 0.0, 1.0]; 300]);
    let mut geometry = GeometryDescriptor::new(data).unwrap();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().draws()[0].index_format, IndexFormat::Uint16);

    // The uv stream is new, so the refresh needs a buffer it cannot get.
    geometry.update(primitives::triangle()).unwrap();
    context.device_mut().set_fail_allocations(true);
    assert!(matches!(
        context.upload_geometry(&geometry),
        Err(GraphicsError::Backend(_))
    ));
    context.device_mut().set_fail_allocations(false);

    assert!(context.geometry(geometry.id()).is_none());
    assert_eq!(context.linkage_count(), 0);
    assert_eq!(context.device().buffer_count(), 0);
    assert_eq!(context.device().vertex_array_count(), 0);
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::GeometryNotUploaded(_))
    ));
    assert_eq!(context.device().draws().len(), 1);

    context.upload_geometry(&geometry).unwrap();
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    let draw = &context.device().draws()[1];
    assert_eq!(draw.count, 3);
    assert_eq!(draw.index_format, IndexFormat::Uint8);
}

#[rstest]
#[case::cube(primitives::cube(1.0), IndexFormat::Uint8, PrimitiveTopology::TriangleList, 36)]
#[case::sphere(
    primitives::sphere(0.5, 20, 20),
    IndexFormat::Uint16,
    PrimitiveTopology::TriangleStrip,
    20 * 21 * 2
)]
#[case::plane(primitives::plane(2.0, 2.0), IndexFormat::Uint8, PrimitiveTopology::TriangleList, 6)]
fn test_draw_uses_narrowest_index_format(
    #[case] data: GeometryData,
    #[case] format: IndexFormat,
    #[case] topology: PrimitiveTopology,
    #[case] count: i32,
) {
    let mut context = context();
    let geometry = GeometryDescriptor::new(data).unwrap();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);

    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    let draw = &context.device().draws()[0];
    assert_eq!(draw.index_format, format);
    assert_eq!(draw.topology, topology);
    assert_eq!(draw.count, count);
    assert!(context.device().errors().is_empty());
}

// ============================================================================
// Program Tests
// ============================================================================

#[test]
fn test_uniform_table_is_introspected() {
    let mut context = context();
    let shader = full_shader();
    context.compile_program(&shader).unwrap();

    let table = context.uniform_table(shader.id()).unwrap();
    assert_eq!(table.kind("uMvp"), Some(UniformKind::Mat4));
    assert_eq!(table.kind("uColor"), Some(UniformKind::Vec3));
    assert_eq!(table.kind("uFlag"), Some(UniformKind::Bool));
    assert_eq!(table.kind("uSky"), Some(UniformKind::SamplerCube));
    // Arrays: every element plus the bare name.
    assert_eq!(table.kind("weights"), Some(UniformKind::Float));
    assert_eq!(table.kind("weights[0]"), Some(UniformKind::Float));
    assert_eq!(table.kind("weights[2]"), Some(UniformKind::Float));
    assert!(!table.contains("weights[3]"));

    let program = context.program(shader.id()).unwrap();
    assert_eq!(program.attributes.position, Some(0));
    assert_eq!(program.attributes.normal, Some(1));
    assert_eq!(program.attributes.uv, Some(2));
    assert_eq!(program.attributes.tangent, None);
}

#[test]
fn test_compile_failure_tombstones_program() {
    let mut context = context();
    let geometry = triangle();
    let mut shader = ShaderDescriptor::new(VERTEX, BROKEN_FRAGMENT);
    context.upload_geometry(&geometry).unwrap();

    let err = context.compile_program(&shader).unwrap_err();
    assert!(matches!(err, GraphicsError::ShaderCompilation { .. }));
    assert!(err.to_string().contains("vec5"));
    assert_eq!(context.program_state(shader.id()), Some(ProgramState::Failed));
    assert_eq!(context.device().shader_count(), 0);
    assert_eq!(context.device().program_count(), 0);

    let commands = context.device().commands().len();
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::ProgramUnavailable(_))
    ));
    assert!(context.device().draws().is_empty());
    assert_eq!(context.device().commands().len(), commands);
    assert_eq!(context.stats().draws_skipped, 1);

    // An explicit recompile brings it back.
    shader.set_sources(VERTEX, FRAGMENT);
    context.compile_program(&shader).unwrap();
    assert_eq!(context.program_state(shader.id()), Some(ProgramState::Linked));
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().draws().len(), 1);
}

#[test]
fn test_link_failure_is_reported() {
    let mut context = context();
    let shader = ShaderDescriptor::new(POSITION_ONLY_VERTEX, UNLINKABLE_FRAGMENT);

    let err = context.compile_program(&shader).unwrap_err();

    assert!(matches!(err, GraphicsError::ProgramLink { .. }));
    let failure = context.program_failure(shader.id()).unwrap();
    assert_eq!(failure.stage, None);
    assert!(failure.log.contains("vTangent"));
    assert_eq!(context.device().program_count(), 0);
}

#[test]
fn test_recompile_reexpands_defines() {
    let mut context = context();
    let geometry = triangle();
    let mut shader =
        ShaderDescriptor::new(POSITION_ONLY_VERTEX, COUNTED_FRAGMENT).with_define("COUNT", 2u32);
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert!(!context.uniform_table(shader.id()).unwrap().contains("weights[3]"));
    assert_eq!(context.linkage_count(), 1);

    shader.defines.set("COUNT", 4u32);
    context.compile_program(&shader).unwrap();

    let table = context.uniform_table(shader.id()).unwrap();
    assert!(table.contains("weights[3]"));
    // The old program's vertex array went with it.
    assert_eq!(context.linkage_count(), 0);
    assert_eq!(context.device().program_count(), 1);
    assert_eq!(context.device().vertex_array_count(), 0);
}

#[test]
fn test_destroy_program() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    context.destroy_program(&shader);

    assert_eq!(context.program_state(shader.id()), None);
    assert_eq!(context.linkage_count(), 0);
    assert_eq!(context.device().program_count(), 0);
    assert_eq!(context.device().shader_count(), 0);
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::ProgramNotCompiled(_))
    ));
}

#[test]
fn test_failed_recompile_releases_previous_program() {
    let mut context = context();
    let geometry = triangle();
    let mut shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.device().vertex_array_count(), 1);

    shader.set_sources(VERTEX, BROKEN_FRAGMENT);
    let err = context.compile_program(&shader).unwrap_err();

    assert!(matches!(err, GraphicsError::ShaderCompilation { .. }));
    assert_eq!(context.program_state(shader.id()), Some(ProgramState::Failed));
    assert_eq!(context.device().program_count(), 0);
    assert_eq!(context.device().shader_count(), 0);
    assert_eq!(context.device().vertex_array_count(), 0);
    assert_eq!(context.linkage_count(), 0);
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::ProgramUnavailable(_))
    ));
    assert_eq!(context.device().draws().len(), 1);
}

#[rstest]
#[case::tombstoned(true)]
#[case::never_compiled(false)]
fn test_destroy_program_without_live_program(#[case] compile: bool) {
    let mut context = context();
    let geometry = triangle();
    let shader = ShaderDescriptor::new(VERTEX, BROKEN_FRAGMENT);
    context.upload_geometry(&geometry).unwrap();
    if compile {
        assert!(context.compile_program(&shader).is_err());
    }

    context.destroy_program(&shader);
    context.destroy_program(&shader);

    assert_eq!(context.program_state(shader.id()), None);
    assert!(context.program_failure(shader.id()).is_none());
    assert_eq!(context.device().program_count(), 0);
    assert_eq!(context.device().shader_count(), 0);
    assert!(context.device().errors().is_empty());
    assert!(matches!(
        context.draw(&geometry, &shader, &UniformMap::new()),
        Err(GraphicsError::ProgramNotCompiled(_))
    ));
}

// ============================================================================
// Draw Tests
// ============================================================================

#[test]
fn test_draw_without_geometry_touches_nothing() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    context.compile_program(&shader).unwrap();
    let commands = context.device().commands().len();

    let result = context.draw(&geometry, &shader, &UniformMap::new());

    assert!(matches!(result, Err(GraphicsError::GeometryNotUploaded(id)) if id == geometry.id()));
    assert_eq!(context.device().commands().len(), commands);
    assert!(context.device().draws().is_empty());
    assert_eq!(context.linkage_count(), 0);
}

#[test]
fn test_draw_without_program() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    context.upload_geometry(&geometry).unwrap();
    let commands = context.device().commands().len();

    let result = context.draw(&geometry, &shader, &UniformMap::new());

    assert!(matches!(result, Err(GraphicsError::ProgramNotCompiled(_))));
    assert_eq!(context.device().commands().len(), commands);
}

#[test]
fn test_linkage_is_shared_per_pair() {
    let mut context = context();
    let a = triangle();
    let b = triangle();
    let full = full_shader();
    let flat = flat_shader();
    for geometry in [&a, &b] {
        context.upload_geometry(geometry).unwrap();
    }
    context.compile_program(&full).unwrap();
    context.compile_program(&flat).unwrap();

    for _ in 0..3 {
        for geometry in [&a, &b] {
            for shader in [&full, &flat] {
                context.draw(geometry, shader, &UniformMap::new()).unwrap();
            }
        }
    }

    assert_eq!(context.linkage_count(), 4);
    assert_eq!(context.stats().linkages_created, 4);
    assert_eq!(context.stats().draw_calls, 12);
    assert_ne!(context.linkage(full.id(), a.id()), context.linkage(flat.id(), a.id()));
}

#[rstest]
#[case::all_streams(full_shader(), triangle(), &[0, 1, 2])]
#[case::program_without_normals(flat_shader(), triangle(), &[0])]
#[case::geometry_without_uvs(full_shader(), triangle_without_uvs(), &[0, 1])]
fn test_attributes_need_program_and_geometry(
    #[case] shader: ShaderDescriptor,
    #[case] geometry: GeometryDescriptor,
    #[case] expected: &[u32],
) {
    let mut context = context();
    prepare(&mut context, &geometry, &shader);

    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    let draw = &context.device().draws()[0];
    let locations: Vec<u32> = draw.attributes.iter().map(|a| a.location).collect();
    assert_eq!(locations, expected);
    for attribute in &draw.attributes {
        // One tightly packed buffer per stream.
        assert_eq!(attribute.offset, 0);
        assert_eq!(attribute.stride, attribute.size * 4);
    }
    let gpu = context.geometry(geometry.id()).unwrap();
    assert_eq!(draw.element_buffer, Some(gpu.index));
}

#[test]
fn test_unknown_uniforms_are_ignored() {
    let mut context = context();
    let geometry = triangle();
    let shader = flat_shader();
    prepare(&mut context, &geometry, &shader);

    let mut uniforms = UniformMap::new();
    uniforms
        .set("uColor", [0.25f32, 0.5, 1.0])
        .set("lights[0].position", [1.0f32, 2.0, 3.0])
        .set("enableIBLDiffuse", true);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    assert_eq!(context.device().draws().len(), 1);
    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(
        context.device().uniform_value(program, "uColor"),
        Some(&UniformData::Float(vec![0.25, 0.5, 1.0]))
    );
    assert_eq!(context.stats().uniforms_uploaded, 1);
    assert_eq!(context.stats().uniforms_rejected, 0);
}

#[rstest]
#[case::bool_true(UniformValue::Bool(true), UniformData::UInt(vec![1]))]
#[case::bool_false(UniformValue::Bool(false), UniformData::UInt(vec![0]))]
#[case::int_as_bool(UniformValue::Int(7), UniformData::UInt(vec![1]))]
fn test_bool_uploads_as_unsigned(#[case] value: UniformValue, #[case] expected: UniformData) {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);

    let mut uniforms = UniformMap::new();
    uniforms.set("uFlag", value);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(context.device().uniform_value(program, "uFlag"), Some(&expected));
    assert!(context.device().errors().is_empty());
}

#[test]
fn test_scalar_coercion_and_mismatch() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);

    let mut uniforms = UniformMap::new();
    uniforms
        .set("uStrength", 2i32)
        .set("uColor", glam::Mat4::IDENTITY)
        .set("uMvp", [1.0f32, 0.0, 0.0]);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(
        context.device().uniform_value(program, "uStrength"),
        Some(&UniformData::Float(vec![2.0]))
    );
    assert_eq!(context.device().uniform_value(program, "uColor"), None);
    assert_eq!(context.stats().uniforms_rejected, 2);
    assert_eq!(context.device().draws().len(), 1);
    assert!(context.device().errors().is_empty());
}

#[test]
fn test_array_uniform_elements() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);

    let mut uniforms = UniformMap::new();
    uniforms.set("weights", 1.0f32).set("weights[2]", 3.0f32);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    let device = context.device();
    assert_eq!(device.uniform_value(program, "weights[0]"), Some(&UniformData::Float(vec![1.0])));
    assert_eq!(device.uniform_value(program, "weights[1]"), None);
    assert_eq!(device.uniform_value(program, "weights[2]"), Some(&UniformData::Float(vec![3.0])));
}

#[test]
fn test_texture_units_are_draw_local() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    let red = TextureDescriptor::solid_color([255, 0, 0, 255]);
    let blue = TextureDescriptor::solid_color([0, 0, 255, 255]);
    context.upload_texture(&red).unwrap();
    context.upload_texture(&blue).unwrap();

    for texture in [&red, &blue] {
        let mut uniforms = UniformMap::new();
        uniforms.set_texture("uAlbedo", texture);
        context.draw(&geometry, &shader, &uniforms).unwrap();
    }

    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(
        context.device().uniform_value(program, "uAlbedo"),
        Some(&UniformData::Int(vec![0]))
    );
    for (draw, texture) in context.device().draws().iter().zip([&red, &blue]) {
        let expected = BoundTexture {
            unit: 0,
            target: TextureTarget::Texture2D,
            texture: context.texture(texture.id()).unwrap().texture,
        };
        assert!(draw.textures.contains(&expected));
    }
    let units: Vec<u32> = context
        .device()
        .commands()
        .iter()
        .filter_map(|c| match c {
            DeviceCommand::ActiveTexture(unit) => Some(*unit),
            _ => None,
        })
        .collect();
    assert!(units.iter().all(|&unit| unit == 0));
}

#[test]
fn test_textures_take_sequential_units() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    let albedo = TextureDescriptor::white();
    let detail = TextureDescriptor::default_normal();
    let sky = cube_texture();
    for texture in [&albedo, &detail, &sky] {
        context.upload_texture(texture).unwrap();
    }

    let mut uniforms = UniformMap::new();
    uniforms
        .set_texture("uAlbedo", &albedo)
        .set_texture("uDetail", &detail)
        .set_texture("uSky", &sky);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    let device = context.device();
    let mut units: Vec<i32> = ["uAlbedo", "uDetail", "uSky"]
        .iter()
        .map(|name| device.uniform_value(program, name).unwrap().as_i32().unwrap()[0])
        .collect();
    units.sort();
    assert_eq!(units, vec![0, 1, 2]);
    assert_eq!(context.stats().textures_bound, 3);

    let draw = &device.draws()[0];
    let sky_binding = draw.textures.iter().find(|b| b.target == TextureTarget::CubeMap).unwrap();
    assert_eq!(sky_binding.texture, context.texture(sky.id()).unwrap().texture);
}

#[test]
fn test_missing_texture_does_not_consume_unit() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    let pending = TextureDescriptor::white();
    let detail = TextureDescriptor::white();
    context.upload_texture(&detail).unwrap();

    let mut uniforms = UniformMap::new();
    uniforms.set_texture("uAlbedo", &pending).set_texture("uDetail", &detail);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(context.device().uniform_value(program, "uAlbedo"), None);
    assert_eq!(
        context.device().uniform_value(program, "uDetail"),
        Some(&UniformData::Int(vec![0]))
    );
    assert_eq!(context.stats().uniforms_rejected, 0);
}

#[test]
fn test_texture_unit_limit() {
    let mut context = context_with_units(1);
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    let albedo = TextureDescriptor::white();
    let detail = TextureDescriptor::white();
    context.upload_texture(&albedo).unwrap();
    context.upload_texture(&detail).unwrap();

    let mut uniforms = UniformMap::new();
    uniforms.set_texture("uAlbedo", &albedo).set_texture("uDetail", &detail);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    // Name order decides who gets the only unit.
    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(
        context.device().uniform_value(program, "uAlbedo"),
        Some(&UniformData::Int(vec![0]))
    );
    assert_eq!(context.device().uniform_value(program, "uDetail"), None);
    assert_eq!(context.stats().uniforms_rejected, 1);
    assert_eq!(context.device().draws().len(), 1);
    assert!(context.device().errors().is_empty());
}

#[rstest]
#[case::cube_for_2d_sampler("uAlbedo", true)]
#[case::flat_for_cube_sampler("uSky", false)]
#[case::texture_for_vector("uColor", false)]
fn test_texture_target_mismatch_is_skipped(#[case] name: &str, #[case] cube: bool) {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    let texture = if cube { cube_texture() } else { TextureDescriptor::white() };
    context.upload_texture(&texture).unwrap();

    let mut uniforms = UniformMap::new();
    uniforms.set_texture(name, &texture);
    context.draw(&geometry, &shader, &uniforms).unwrap();

    let program = context.program(shader.id()).unwrap().program;
    assert_eq!(context.device().uniform_value(program, name), None);
    assert_eq!(context.stats().uniforms_rejected, 1);
    assert_eq!(context.stats().textures_bound, 0);
    assert!(context.device().errors().is_empty());
}

// ============================================================================
// Texture Tests
// ============================================================================

#[test]
fn test_texture_reupload_releases_previous() {
    let mut context = context();
    let texture = TextureDescriptor::white();

    context.upload_texture(&texture).unwrap();
    let first = context.texture(texture.id()).unwrap().texture;
    context.upload_texture(&texture).unwrap();

    assert_eq!(context.device().texture_count(), 1);
    assert_ne!(context.texture(texture.id()).unwrap().texture, first);

    context.destroy_texture(&texture);
    assert_eq!(context.device().texture_count(), 0);
    assert!(context.texture(texture.id()).is_none());
}

#[test]
fn test_texture_sampling_state() {
    let mut context = context();
    let texture = TextureDescriptor::white().with_sampler(SamplerParams {
        wrap_s: AddressMode::Repeat,
        wrap_t: AddressMode::MirrorRepeat,
        mipmaps: true,
        ..Default::default()
    });
    context.upload_texture(&texture).unwrap();

    let gpu = context.texture(texture.id()).unwrap();
    let state = context.device().texture_state(gpu.texture).unwrap();
    assert_eq!(state.target, Some(TextureTarget::Texture2D));
    assert!(state.mipmapped);
    assert!(state.parameters.contains(&TextureParameter::WrapS(AddressMode::Repeat)));
    assert!(state.parameters.contains(&TextureParameter::WrapT(AddressMode::MirrorRepeat)));
    assert_eq!(state.images.len(), 1);
}

#[test]
fn test_cube_texture_upload() {
    let mut context = context();
    let texture = cube_texture();
    context.upload_texture(&texture).unwrap();

    let gpu = context.texture(texture.id()).unwrap();
    assert_eq!(gpu.target, TextureTarget::CubeMap);
    assert_eq!((gpu.width, gpu.height), (4, 4));
    let state = context.device().texture_state(gpu.texture).unwrap();
    assert_eq!(state.images.len(), 6);
    assert!(state
        .parameters
        .iter()
        .any(|p| matches!(p, TextureParameter::WrapR(_))));
    assert!(context.device().errors().is_empty());
}

#[test]
fn test_decoded_image_is_flipped() {
    let mut context = context();
    let mut image = image::RgbaImage::new(1, 2);
    image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
    let texture = TextureDescriptor::from_image(image::DynamicImage::ImageRgba8(image)).unwrap();

    context.upload_texture(&texture).unwrap();

    let gpu = context.texture(texture.id()).unwrap();
    let state = context.device().texture_state(gpu.texture).unwrap();
    let data = &state.images.values().next().unwrap().data;
    // Bottom row first.
    assert_eq!(&data[..4], &[0, 0, 255, 255]);
}

// ============================================================================
// State Tests
// ============================================================================

#[test]
fn test_global_state() {
    let mut context = context();

    context.resize(800, 600);
    context.set_clear_color([0.1, 0.2, 0.3, 1.0]);
    context.set_depth_test(false);
    context.set_culling(Some(CullMode::Back));
    context.clear();

    let device = context.device();
    assert_eq!(device.viewport_rect(), [0, 0, 800, 600]);
    assert_eq!(device.clear_color_value(), [0.1, 0.2, 0.3, 1.0]);
    assert!(!device.depth_test_enabled());
    assert_eq!(device.culling(), Some(CullMode::Back));
    assert_eq!(context.viewport(), (800, 600));

    context.set_culling(None);
    assert_eq!(context.device().culling(), None);
}

#[test]
fn test_resize_keeps_resources() {
    let mut context = context();
    let geometry = triangle();
    let shader = full_shader();
    prepare(&mut context, &geometry, &shader);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();

    context.resize(320, 240);

    assert!(context.geometry(geometry.id()).is_some());
    assert_eq!(context.linkage_count(), 1);
    context.draw(&geometry, &shader, &UniformMap::new()).unwrap();
    assert_eq!(context.stats().linkages_created, 1);
}
