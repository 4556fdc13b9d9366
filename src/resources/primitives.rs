//! Procedural geometry: cube, UV sphere, plane and triangle.

use std::f32::consts::PI;

use crate::backend::types::PrimitiveTopology;

use super::geometry::GeometryData;

/// Axis-aligned cube centered at the origin, 4 vertices per face.
pub fn cube(size: f32) -> GeometryData {
    let h = size * 0.5;
    // (normal, tangent u axis, tangent v axis)
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut uvs = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, (n, u, v)) in faces.iter().enumerate() {
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            positions.push([
                (n[0] + u[0] * su + v[0] * sv) * h,
                (n[1] + u[1] * su + v[1] * sv) * h,
                (n[2] + u[2] * su + v[2] * sv) * h,
            ]);
            normals.push(*n);
            uvs.push([(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
        }
        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    GeometryData::new(positions, indices)
        .with_normals(normals)
        .with_uvs(uvs)
}

/// UV sphere laid out as one serpentine triangle strip.
///
/// Rows of the strip alternate direction so consecutive rows share their
/// turning vertex. `v` runs from 1 at the north pole to 0 at the south pole.
pub fn sphere(radius: f32, horizontal_segments: u32, vertical_segments: u32) -> GeometryData {
    let h = horizontal_segments.max(3);
    let v = vertical_segments.max(2);
    let row = h + 1;
    let vertex_count = (row * (v + 1)) as usize;

    let mut positions = Vec::with_capacity(vertex_count);
    let mut normals = Vec::with_capacity(vertex_count);
    let mut uvs = Vec::with_capacity(vertex_count);

    for y in 0..=v {
        let fv = y as f32 / v as f32;
        let theta = fv * PI;
        for x in 0..=h {
            let fu = x as f32 / h as f32;
            let phi = fu * 2.0 * PI;
            let normal = [phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin()];
            positions.push([normal[0] * radius, normal[1] * radius, normal[2] * radius]);
            normals.push(normal);
            uvs.push([fu, 1.0 - fv]);
        }
    }

    let mut indices = Vec::with_capacity((v * row * 2) as usize);
    for y in 0..v {
        if y % 2 == 0 {
            for x in 0..=h {
                indices.push(y * row + x);
                indices.push((y + 1) * row + x);
            }
        } else {
            for x in (0..=h).rev() {
                indices.push((y + 1) * row + x);
                indices.push(y * row + x);
            }
        }
    }

    GeometryData::new(positions, indices)
        .with_normals(normals)
        .with_uvs(uvs)
        .with_topology(PrimitiveTopology::TriangleStrip)
}

/// Unit quad in the XY plane facing -Z, scaled to `width` x `height`.
pub fn plane(width: f32, height: f32) -> GeometryData {
    let (w, h) = (width * 0.5, height * 0.5);
    GeometryData::new(
        vec![[-w, -h, 0.0], [w, -h, 0.0], [-w, h, 0.0], [w, h, 0.0]],
        vec![0, 1, 2, 1, 3, 2],
    )
    .with_normals(vec![[0.0, 0.0, -1.0]; 4])
    .with_uvs(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])
}

/// Single triangle in the XY plane.
pub fn triangle() -> GeometryData {
    GeometryData::new(
        vec![[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [-0.5, 0.5, 0.0]],
        vec![0, 1, 2],
    )
    .with_normals(vec![[0.0, 0.0, -1.0]; 3])
    .with_uvs(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::IndexFormat;
    use crate::resources::geometry::GeometryDescriptor;

    #[test]
    fn test_cube_layout() {
        let cube = GeometryDescriptor::new(cube(1.0)).unwrap();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.index_count(), 36);
        assert_eq!(cube.index_format(), IndexFormat::Uint8);
        for p in cube.positions() {
            assert!(p.iter().all(|c| (c.abs() - 0.5).abs() < 1e-6));
        }
    }

    #[test]
    fn test_cube_faces_wind_outward() {
        let data = cube(2.0);
        for tri in data.indices.chunks(3) {
            let [a, b, c] =
                [tri[0], tri[1], tri[2]].map(|i| glam::Vec3::from(data.positions[i as usize]));
            let face_normal = (b - a).cross(c - a).normalize();
            let n = glam::Vec3::from(data.normals.as_ref().unwrap()[tri[0] as usize]);
            assert!(face_normal.dot(n) > 0.99);
        }
    }

    #[test]
    fn test_sphere_layout() {
        let data = sphere(2.0, 32, 16);
        assert_eq!(data.vertex_count(), 33 * 17);
        assert_eq!(data.indices.len(), 16 * 33 * 2);
        assert_eq!(data.topology, PrimitiveTopology::TriangleStrip);
        for p in &data.positions {
            let len = glam::Vec3::from(*p).length();
            assert!((len - 2.0).abs() < 1e-4);
        }
        let uvs = data.uvs.as_ref().unwrap();
        assert_eq!(uvs[0][1], 1.0);
        assert_eq!(uvs[uvs.len() - 1][1], 0.0);

        let geometry = GeometryDescriptor::new(data).unwrap();
        assert_eq!(geometry.index_format(), IndexFormat::Uint16);
    }

    #[test]
    fn test_small_shapes_are_valid() {
        assert!(GeometryDescriptor::new(plane(1.0, 1.0)).is_ok());
        assert!(GeometryDescriptor::new(triangle()).is_ok());
        assert!(GeometryDescriptor::new(sphere(1.0, 4, 4)).is_ok());
    }
}
