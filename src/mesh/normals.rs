//! Normal computation and final-mesh normal bookkeeping.
//!
//! Face normals use Newell's method so n-gons get a stable result; vertex
//! normals accumulate adjacent face normals; corner ("split") normals honor
//! the auto-smooth angle. Face-normal computation parallelizes across faces
//! under the `rayon` feature and falls back to a serial loop otherwise.

use crate::attr::{AttrData, AttrDomain, AttrKind, AttrLayer, AttrMask};
use crate::mesh::Mesh;
use itertools::izip;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[inline]
fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

#[inline]
fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Newell normal of one face; `[0, 0, 1]` for degenerate faces.
pub(crate) fn face_normal_of(mesh: &Mesh, f: usize) -> [f32; 3] {
    let (Ok(positions), Ok(corner_verts), Ok(range)) =
        (mesh.positions(), mesh.corner_verts(), mesh.face_range(f))
    else {
        return [0.0, 0.0, 1.0];
    };
    let corners = &corner_verts[range];
    let mut n = [0.0f32; 3];
    for (i, &cv) in corners.iter().enumerate() {
        let a = positions[cv as usize];
        let b = positions[corners[(i + 1) % corners.len()] as usize];
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    normalize(n).unwrap_or([0.0, 0.0, 1.0])
}

/// Per-face normals.
pub fn compute_face_normals(mesh: &Mesh) -> Vec<[f32; 3]> {
    let n = mesh.faces_num();
    #[cfg(feature = "rayon")]
    {
        (0..n)
            .into_par_iter()
            .map(|f| face_normal_of(mesh, f))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..n).map(|f| face_normal_of(mesh, f)).collect()
    }
}

/// Per-vertex normals: accumulated adjacent face normals, normalized.
/// Loose vertices fall back to their normalized position, then to z-up.
pub fn compute_vert_normals(mesh: &Mesh) -> Vec<[f32; 3]> {
    let points = mesh.points_num();
    let mut acc = vec![[0.0f32; 3]; points];
    if let (Ok(corner_verts), face_normals) = (mesh.corner_verts(), mesh.face_normals()) {
        for f in 0..mesh.faces_num() {
            let Ok(range) = mesh.face_range(f) else {
                continue;
            };
            let fno = face_normals[f];
            for &cv in &corner_verts[range] {
                let a = &mut acc[cv as usize];
                a[0] += fno[0];
                a[1] += fno[1];
                a[2] += fno[2];
            }
        }
    }
    let positions = mesh.positions().unwrap_or(&[]);
    let mut out = vec![[0.0f32; 3]; points];
    for (o, a, p) in izip!(out.iter_mut(), acc.iter(), positions.iter()) {
        *o = normalize(*a)
            .or_else(|| normalize(*p))
            .unwrap_or([0.0, 0.0, 1.0]);
    }
    out
}

/// Per-corner ("split") normals.
///
/// With no auto-smooth angle, every corner uses its vertex normal. With an
/// angle, a corner is smooth iff every face sharing its vertex has a normal
/// within the angle of this corner's face normal; sharp corners use the
/// face normal.
pub fn compute_corner_normals(mesh: &Mesh, auto_smooth_angle: Option<f32>) -> Vec<[f32; 3]> {
    let corners = mesh.corners_num();
    let vert_normals = mesh.vert_normals();
    let face_normals = mesh.face_normals();
    let Ok(corner_verts) = mesh.corner_verts() else {
        return vec![[0.0, 0.0, 1.0]; corners];
    };

    let Some(angle) = auto_smooth_angle else {
        return corner_verts
            .iter()
            .map(|&cv| vert_normals[cv as usize])
            .collect();
    };
    let cos_angle = angle.cos();

    // vert -> adjacent faces
    let mut adjacent: Vec<Vec<u32>> = vec![Vec::new(); mesh.points_num()];
    for f in 0..mesh.faces_num() {
        let Ok(range) = mesh.face_range(f) else {
            continue;
        };
        for &cv in &corner_verts[range] {
            adjacent[cv as usize].push(f as u32);
        }
    }

    let mut out = vec![[0.0f32; 3]; corners];
    for f in 0..mesh.faces_num() {
        let Ok(range) = mesh.face_range(f) else {
            continue;
        };
        let fno = face_normals[f];
        for c in range {
            let v = corner_verts[c] as usize;
            let smooth = adjacent[v]
                .iter()
                .all(|&af| dot(face_normals[af as usize], fno) >= cos_angle);
            out[c] = if smooth { vert_normals[v] } else { fno };
        }
    }
    out
}

/// Final normal bookkeeping for an owned evaluated mesh (pipeline step
/// after all modifiers ran).
///
/// If the requested mask needs corner normals, or auto-smooth is on, split
/// normals are computed and stored (vertex and face normals come along as a
/// side effect). Otherwise vertex/face normals are ensured and any stray
/// corner-normal layer a modifier left behind is discarded so display stays
/// consistent with the smoothing setting.
pub fn finalize_eval_mesh(mesh: &mut Mesh, mask: &AttrMask, auto_smooth: Option<f32>) {
    let want_corner = mask.corner.contains(AttrKind::CornerNormal) || auto_smooth.is_some();
    if want_corner {
        let corner_normals = compute_corner_normals(mesh, auto_smooth);
        mesh.table_mut(AttrDomain::Corner).add_layer(AttrLayer {
            kind: AttrKind::CornerNormal,
            name: ".corner_normal".into(),
            temporary: false,
            data: AttrData::Vec3(corner_normals),
        });
    } else if mesh.table(AttrDomain::Corner).has(AttrKind::CornerNormal) {
        mesh.table_mut(AttrDomain::Corner).free(AttrKind::CornerNormal);
    }
    let _ = mesh.face_normals();
    let _ = mesh.vert_normals();
    let _ = mesh.bounds();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Mesh {
        Mesh::from_arrays(
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            vec![[0, 1], [1, 2], [2, 3], [3, 0]],
            vec![0, 1, 2, 3],
            vec![0],
        )
        .unwrap()
    }

    #[test]
    fn planar_quad_normals_point_up() {
        let m = quad();
        assert_eq!(m.face_normals(), &[[0.0, 0.0, 1.0]]);
        for n in m.vert_normals() {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn corner_normals_smooth_without_angle() {
        let m = quad();
        let cn = compute_corner_normals(&m, None);
        assert_eq!(cn.len(), 4);
        for n in cn {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn finalize_strips_stray_corner_normals() {
        let mut m = quad();
        m.table_mut(AttrDomain::Corner).add_layer(AttrLayer {
            kind: AttrKind::CornerNormal,
            name: ".corner_normal".into(),
            temporary: false,
            data: AttrData::Vec3(vec![[1.0, 0.0, 0.0]; 4]),
        });
        finalize_eval_mesh(&mut m, &AttrMask::BARE, None);
        assert!(!m.table(AttrDomain::Corner).has(AttrKind::CornerNormal));
    }

    #[test]
    fn finalize_keeps_corner_normals_when_requested() {
        let mut m = quad();
        let mask = AttrMask::with(AttrDomain::Corner, AttrKind::CornerNormal);
        finalize_eval_mesh(&mut m, &mask, None);
        assert!(m.table(AttrDomain::Corner).has(AttrKind::CornerNormal));
    }

    #[test]
    fn loose_vertex_falls_back_to_position_direction() {
        let m = Mesh::from_arrays(vec![[0.0, 0.0, 2.0]], vec![], vec![], vec![]).unwrap();
        assert_eq!(m.vert_normals(), &[[0.0, 0.0, 1.0]]);
    }
}
