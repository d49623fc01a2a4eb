//! Per-vertex normals and tangents for indexed triangle lists.

use terragen_shared::{Vec2, Vec3};

/// Smooth normals and UV-aligned tangents.
///
/// Every triangle contributes its area-weighted face normal to its three
/// corners; tangents follow the U direction of `uvs` and are
/// re-orthogonalised against the normal. Vertices not referenced by any
/// triangle get `UP` / `X`.
#[must_use]
pub fn compute_normals_and_tangents(
    positions: &[Vec3],
    indices: &[u32],
    uvs: &[Vec2],
) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    let mut tangents = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (a, b, c) = (positions[ia], positions[ib], positions[ic]);
        let e1 = b - a;
        let e2 = c - a;

        let face = e2.cross(e1);
        for &i in &[ia, ib, ic] {
            normals[i] += face;
        }

        if let (Some(&ua), Some(&ub), Some(&uc)) = (uvs.get(ia), uvs.get(ib), uvs.get(ic)) {
            let d1 = ub - ua;
            let d2 = uc - ua;
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() > f32::EPSILON {
                let tangent = (e1 * d2.y - e2 * d1.y) * (1.0 / det);
                for &i in &[ia, ib, ic] {
                    tangents[i] += tangent;
                }
            }
        }
    }

    for (n, t) in normals.iter_mut().zip(tangents.iter_mut()) {
        *n = n.normalize_or_zero();
        if *n == Vec3::ZERO {
            *n = Vec3::UP;
        }
        // Gram-Schmidt
        let projected = (*t - *n * n.dot(*t)).normalize_or_zero();
        *t = if projected == Vec3::ZERO { Vec3::X } else { projected };
    }

    (normals, tangents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(z: [f32; 4]) -> (Vec<Vec3>, Vec<u32>, Vec<Vec2>) {
        // 2x2 grid, row stride 2
        let positions = vec![
            Vec3::new(0.0, 0.0, z[0]),
            Vec3::new(100.0, 0.0, z[1]),
            Vec3::new(0.0, 100.0, z[2]),
            Vec3::new(100.0, 100.0, z[3]),
        ];
        let indices = vec![0, 2, 1, 2, 3, 1];
        let uvs = positions.iter().map(|p| p.xy() * 0.01).collect();
        (positions, indices, uvs)
    }

    #[test]
    fn test_flat_quad_faces_up() {
        let (p, i, uv) = quad([0.0; 4]);
        let (normals, tangents) = compute_normals_and_tangents(&p, &i, &uv);
        for n in normals {
            assert!((n - Vec3::UP).length() < 1e-6, "normal {n:?}");
        }
        for t in tangents {
            assert!((t - Vec3::X).length() < 1e-6, "tangent {t:?}");
        }
    }

    #[test]
    fn test_slope_tilts_normal_away_from_rise() {
        // Rises along +X
        let (p, i, uv) = quad([0.0, 100.0, 0.0, 100.0]);
        let (normals, tangents) = compute_normals_and_tangents(&p, &i, &uv);
        for (n, t) in normals.iter().zip(&tangents) {
            assert!(n.x < 0.0 && n.z > 0.0);
            assert!((n.slope_degrees() - 45.0).abs() < 1e-3);
            assert!(n.dot(*t).abs() < 1e-5, "tangent must be orthogonal");
        }
    }

    #[test]
    fn test_unreferenced_vertex_defaults() {
        let (mut p, i, mut uv) = quad([0.0; 4]);
        p.push(Vec3::new(500.0, 500.0, 0.0));
        uv.push(Vec2::ZERO);
        let (normals, tangents) = compute_normals_and_tangents(&p, &i, &uv);
        assert_eq!(normals[4], Vec3::UP);
        assert_eq!(tangents[4], Vec3::X);
    }
}
