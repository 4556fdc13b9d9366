//! Per-vertex tangent generation.

use glam::{Vec2, Vec3};

use crate::backend::types::PrimitiveTopology;

/// Expand an index list into triangles, honoring strip and fan winding.
/// Degenerate triangles (repeated indices) are dropped. Non-triangle
/// topologies yield nothing.
pub fn triangles(indices: &[u32], topology: PrimitiveTopology) -> Vec<[u32; 3]> {
    let mut out = Vec::new();
    match topology {
        PrimitiveTopology::TriangleList => {
            out.extend(indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]));
        }
        PrimitiveTopology::TriangleStrip => {
            for (i, w) in indices.windows(3).enumerate() {
                // Odd triangles of a strip have reversed winding.
                if i % 2 == 0 {
                    out.push([w[0], w[1], w[2]]);
                } else {
                    out.push([w[1], w[0], w[2]]);
                }
            }
        }
        PrimitiveTopology::TriangleFan => {
            if let Some((&first, rest)) = indices.split_first() {
                out.extend(rest.windows(2).map(|w| [first, w[0], w[1]]));
            }
        }
        _ => {}
    }
    out.retain(|[a, b, c]| a != b && b != c && a != c);
    out
}

/// Compute tangents for every vertex.
///
/// The tangent of a vertex accumulates the uv-space tangent of every
/// triangle sharing it, then is orthogonalized against the vertex normal.
/// `w` stores the bitangent handedness. Vertices without usable uv
/// gradients get an arbitrary unit vector perpendicular to their normal.
pub fn compute_tangents(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
    topology: PrimitiveTopology,
) -> Vec<[f32; 4]> {
    let count = positions.len();
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for [a, b, c] in triangles(indices, topology) {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        if a >= count || b >= count || c >= count {
            continue;
        }
        let p0 = Vec3::from(positions[a]);
        let e1 = Vec3::from(positions[b]) - p0;
        let e2 = Vec3::from(positions[c]) - p0;
        let uv0 = Vec2::from(uvs[a]);
        let d1 = Vec2::from(uvs[b]) - uv0;
        let d2 = Vec2::from(uvs[c]) - uv0;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (e1 * d2.y - e2 * d1.y) * r;
        let bitangent = (e2 * d1.x - e1 * d2.x) * r;
        for v in [a, b, c] {
            tangents[v] += tangent;
            bitangents[v] += bitangent;
        }
    }

    (0..count)
        .map(|v| {
            let n = Vec3::from(normals[v]).normalize_or_zero();
            let t = tangents[v] - n * n.dot(tangents[v]);
            let t = if t.length_squared() > 1e-12 {
                t.normalize()
            } else {
                fallback_perpendicular(n)
            };
            let handedness = if n.cross(t).dot(bitangents[v]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            [t.x, t.y, t.z, handedness]
        })
        .collect()
}

fn fallback_perpendicular(n: Vec3) -> Vec3 {
    if n == Vec3::ZERO {
        return Vec3::X;
    }
    n.any_orthonormal_vector()
}
