//! Shared fixtures for the render context integration tests.
//!
//! Every test runs against `HeadlessDevice`, which compiles and reflects
//! the GLSL it is given and records every command and draw call.

#![allow(dead_code)]

use glint::backend::{DeviceCapabilities, HeadlessDevice, InternalFormat, PixelFormat, PixelType};
use glint::resources::{primitives, GeometryData};
use glint::{GeometryDescriptor, RenderContext, ShaderDescriptor, TextureDescriptor};

// ============================================================================
// Shader sources
// ============================================================================

/// Position, normal and uv attributes at locations 0, 1 and 2.
pub const VERTEX: &str = "in vec3 in_position;
in vec3 in_normal;
in vec2 in_uv;

uniform mat4 uMvp;

out vec3 vNormal;
out vec2 vUv;

void
main()
{
  vNormal = in_normal;
  vUv = in_uv;
  gl_Position = uMvp * vec4(in_position, 1.0);
}
";

pub const FRAGMENT: &str = "precision highp float;

in vec3 vNormal;
in vec2 vUv;

uniform vec3 uColor;
uniform float uStrength;
uniform bool uFlag;
uniform float weights[3];
uniform sampler2D uAlbedo;
uniform sampler2D uDetail;
uniform samplerCube uSky;

out vec4 outColor;

void
main()
{
  vec3 sky = texture(uSky, normalize(vNormal)).rgb;
  vec3 albedo = texture(uAlbedo, vUv).rgb * texture(uDetail, vUv).rgb;
  float w = weights[0] + weights[1] + weights[2];
  outColor = vec4(albedo * uColor * uStrength * w + sky * float(uFlag), 1.0);
}
";

pub const POSITION_ONLY_VERTEX: &str = "in vec3 in_position;

uniform mat4 uMvp;

void
main()
{
  gl_Position = uMvp * vec4(in_position, 1.0);
}
";

pub const FLAT_FRAGMENT: &str = "precision mediump float;

uniform vec3 uColor;

out vec4 outColor;

void
main()
{
  outColor = vec4(uColor, 1.0);
}
";

/// Array size comes from the `COUNT` define.
pub const COUNTED_FRAGMENT: &str = "precision mediump float;

uniform float weights[COUNT];

out vec4 outColor;

void
main()
{
  outColor = vec4(weights[0]);
}
";

/// Not valid GLSL: `vec5` does not exist.
pub const BROKEN_FRAGMENT: &str = "precision mediump float;

uniform vec5 uColor;

out vec4 outColor;

void
main()
{
  outColor = vec4(1.0);
}
";

/// Reads a varying the vertex shaders above never write.
pub const UNLINKABLE_FRAGMENT: &str = "precision mediump float;

in vec3 vTangent;

out vec4 outColor;

void
main()
{
  outColor = vec4(vTangent, 1.0);
}
";

// ============================================================================
// Fixtures
// ============================================================================

pub fn context() -> RenderContext<HeadlessDevice> {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
    RenderContext::new(HeadlessDevice::new())
}

pub fn context_with_units(max_texture_units: u32) -> RenderContext<HeadlessDevice> {
    RenderContext::new(HeadlessDevice::with_capabilities(DeviceCapabilities {
        max_texture_units,
        ..Default::default()
    }))
}

pub fn full_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(VERTEX, FRAGMENT).with_label("full")
}

pub fn flat_shader() -> ShaderDescriptor {
    ShaderDescriptor::new(POSITION_ONLY_VERTEX, FLAT_FRAGMENT).with_label("flat")
}

pub fn triangle() -> GeometryDescriptor {
    GeometryDescriptor::new(primitives::triangle())
        .unwrap()
        .with_label("triangle")
}

/// Triangle with positions and normals only.
pub fn triangle_without_uvs() -> GeometryDescriptor {
    let data = GeometryData::new(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![0, 1, 2],
    )
    .with_normals(vec![[0.0, 0.0, 1.0]; 3]);
    GeometryDescriptor::new(data).unwrap()
}

pub fn cube_texture() -> TextureDescriptor {
    let face = vec![255u8; 4 * 4 * 4];
    TextureDescriptor::cube(
        4,
        std::array::from_fn(|_| face.clone()),
        PixelFormat::Rgba,
        InternalFormat::Rgba8,
        PixelType::UnsignedByte,
    )
    .unwrap()
}

/// Upload `geometry` and compile `shader`, panicking on failure.
pub fn prepare(
    context: &mut RenderContext<HeadlessDevice>,
    geometry: &GeometryDescriptor,
    shader: &ShaderDescriptor,
) {
    context.upload_geometry(geometry).unwrap();
    context.compile_program(shader).unwrap();
}
