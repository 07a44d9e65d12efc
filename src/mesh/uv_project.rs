//! Reference "original UV space" generation.
//!
//! Some modifiers need a per-corner reference frame that is stable under
//! later deformation. The layer is generated deterministically: triangles
//! and quads get fixed corners of the unit square in winding order; other
//! n-gons are projected onto their dominant axis-aligned plane (picked from
//! the face normal) and min/max-normalized into `[0, 1]²`. A zero-extent
//! projection span is nudged by a tiny epsilon instead of dividing by zero.

use crate::attr::{AttrData, AttrDomain, AttrKind, AttrLayer};
use crate::eval_error::EvalError;
use crate::mesh::{normals, Mesh};
use itertools::Itertools;

const QUAD_CORNERS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
const SPAN_EPSILON: f32 = 1e-9;

/// Create and populate the reference-UV layer if it does not exist yet.
///
/// Also clears the triangulation cache: topology for rendering is stale
/// once the layer lands.
pub fn ensure_uv_orig(mesh: &mut Mesh) -> Result<(), EvalError> {
    if mesh.table(AttrDomain::Corner).has(AttrKind::UvOrig) {
        return Ok(());
    }
    let mut uvs = vec![[0.0f32; 2]; mesh.corners_num()];
    for f in 0..mesh.faces_num() {
        let range = mesh.face_range(f)?;
        let n = range.len();
        if n == 3 || n == 4 {
            for (slot, c) in range.enumerate() {
                uvs[c] = QUAD_CORNERS[slot];
            }
        } else if n > 4 {
            project_ngon(mesh, f, &mut uvs)?;
        }
        // faces with fewer than 3 corners are degenerate; left at zero
    }
    mesh.table_mut(AttrDomain::Corner).add_layer(AttrLayer {
        kind: AttrKind::UvOrig,
        name: ".uv_orig".into(),
        temporary: false,
        data: AttrData::Vec2(uvs),
    });
    mesh.invalidate_triangulation();
    Ok(())
}

/// Project one n-gon onto its dominant plane and normalize into `[0,1]²`.
fn project_ngon(mesh: &Mesh, f: usize, uvs: &mut [[f32; 2]]) -> Result<(), EvalError> {
    let positions = mesh.positions()?;
    let corner_verts = mesh.corner_verts()?;
    let range = mesh.face_range(f)?;

    let normal = normals::face_normal_of(mesh, f);
    // dominant axis: largest normal component gets dropped
    let axis = if normal[0].abs() >= normal[1].abs() && normal[0].abs() >= normal[2].abs() {
        0
    } else if normal[1].abs() >= normal[2].abs() {
        1
    } else {
        2
    };
    let (u_axis, v_axis) = match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };

    let projected: Vec<[f32; 2]> = range
        .clone()
        .map(|c| {
            let p = positions[corner_verts[c] as usize];
            [p[u_axis], p[v_axis]]
        })
        .collect();

    for comp in 0..2 {
        let (min, max) = match projected.iter().map(|p| p[comp]).minmax().into_option() {
            Some(pair) => pair,
            None => continue,
        };
        let span = (max - min).max(SPAN_EPSILON);
        for (slot, c) in range.clone().enumerate() {
            uvs[c][comp] = (projected[slot][comp] - min) / span;
        }
    }
    Ok(())
}
