//! Mapped traversal: visit evaluated elements under their *original*
//! indices.
//!
//! Selection tools and overlays work in original-element terms; these
//! helpers walk an evaluated mesh and hand each element to the callback
//! with the index it maps back to. Without an origin-index layer the
//! mapping is the identity. Wrapper-backed meshes are walked through their
//! edit representation, whose stable indices are the originals by
//! definition.

use crate::attr::AttrDomain;
use crate::eval_error::EvalError;
use crate::mesh::{Mesh, MeshWrapper};
use crate::origindex::{self, ORIGINDEX_NONE};

/// Which elements a mapped traversal yields.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VisitOrigin {
    /// Skip elements with no original ([`ORIGINDEX_NONE`]); the callback
    /// only ever sees valid original indices.
    MappedOnly,
    /// Visit every element; unmapped ones are passed as `None`.
    All,
}

fn mapped(index: usize, origins: Option<&[i32]>) -> Option<Option<usize>> {
    match origins {
        None => Some(Some(index)),
        Some(o) => match o[index] {
            ORIGINDEX_NONE => Some(None),
            i => Some(Some(i as usize)),
        },
    }
}

/// Visit vertices as `(original_index, position)`.
pub fn foreach_mapped_vert<F>(mesh: &Mesh, visit: VisitOrigin, mut f: F) -> Result<(), EvalError>
where
    F: FnMut(Option<usize>, &[f32; 3]),
{
    if mesh.wrapper() == MeshWrapper::EditData {
        let edit = mesh.edit().ok_or(EvalError::MissingEditData)?;
        for (i, p) in edit.iter_verts() {
            f(Some(i), p);
        }
        return Ok(());
    }
    let positions = mesh.positions()?;
    let origins = origindex::origindex(mesh, AttrDomain::Point);
    for (i, p) in positions.iter().enumerate() {
        match mapped(i, origins) {
            Some(Some(orig)) => f(Some(orig), p),
            Some(None) if visit == VisitOrigin::All => f(None, p),
            _ => {}
        }
    }
    Ok(())
}

/// Visit edges as `(original_index, endpoint_a, endpoint_b)`.
pub fn foreach_mapped_edge<F>(mesh: &Mesh, visit: VisitOrigin, mut f: F) -> Result<(), EvalError>
where
    F: FnMut(Option<usize>, &[f32; 3], &[f32; 3]),
{
    if mesh.wrapper() == MeshWrapper::EditData {
        let edit = mesh.edit().ok_or(EvalError::MissingEditData)?;
        let positions = edit.positions();
        for (i, [a, b]) in edit.edges().iter().enumerate() {
            f(Some(i), &positions[*a as usize], &positions[*b as usize]);
        }
        return Ok(());
    }
    let positions = mesh.positions()?;
    let edges = mesh.edge_verts()?;
    let origins = origindex::origindex(mesh, AttrDomain::Edge);
    for (i, [a, b]) in edges.iter().enumerate() {
        let (pa, pb) = (&positions[*a as usize], &positions[*b as usize]);
        match mapped(i, origins) {
            Some(Some(orig)) => f(Some(orig), pa, pb),
            Some(None) if visit == VisitOrigin::All => f(None, pa, pb),
            _ => {}
        }
    }
    Ok(())
}

/// Visit corners as `(original_face_index, corner, position)`.
///
/// Corner origins are derived from the owning face, since no corner-domain
/// origin layer is kept.
pub fn foreach_mapped_corner<F>(mesh: &Mesh, visit: VisitOrigin, mut f: F) -> Result<(), EvalError>
where
    F: FnMut(Option<usize>, usize, &[f32; 3]),
{
    if mesh.wrapper() == MeshWrapper::EditData {
        let edit = mesh.edit().ok_or(EvalError::MissingEditData)?;
        let positions = edit.positions();
        for face in 0..edit.faces_num() {
            for c in edit.face_range(face) {
                f(Some(face), c, &positions[edit.corner_verts()[c] as usize]);
            }
        }
        return Ok(());
    }
    let positions = mesh.positions()?;
    let corner_verts = mesh.corner_verts()?;
    let origins = origindex::origindex(mesh, AttrDomain::Face);
    for face in 0..mesh.faces_num() {
        let orig = match mapped(face, origins) {
            Some(Some(o)) => Some(o),
            Some(None) if visit == VisitOrigin::All => None,
            _ => continue,
        };
        for c in mesh.face_range(face)? {
            f(orig, c, &positions[corner_verts[c] as usize]);
        }
    }
    Ok(())
}

/// Visit faces as `(original_index, center)`.
pub fn foreach_mapped_face_center<F>(
    mesh: &Mesh,
    visit: VisitOrigin,
    mut f: F,
) -> Result<(), EvalError>
where
    F: FnMut(Option<usize>, [f32; 3]),
{
    if mesh.wrapper() == MeshWrapper::EditData {
        let edit = mesh.edit().ok_or(EvalError::MissingEditData)?;
        let positions = edit.positions();
        for face in 0..edit.faces_num() {
            let range = edit.face_range(face);
            let center = center_of(positions, &edit.corner_verts()[range]);
            f(Some(face), center);
        }
        return Ok(());
    }
    let positions = mesh.positions()?;
    let corner_verts = mesh.corner_verts()?;
    let origins = origindex::origindex(mesh, AttrDomain::Face);
    for face in 0..mesh.faces_num() {
        let orig = match mapped(face, origins) {
            Some(Some(o)) => Some(o),
            Some(None) if visit == VisitOrigin::All => None,
            _ => continue,
        };
        let range = mesh.face_range(face)?;
        let center = center_of(positions, &corner_verts[range]);
        f(orig, center);
    }
    Ok(())
}

fn center_of(positions: &[[f32; 3]], corners: &[u32]) -> [f32; 3] {
    let mut c = [0.0f32; 3];
    for &v in corners {
        for axis in 0..3 {
            c[axis] += positions[v as usize][axis];
        }
    }
    let n = corners.len().max(1) as f32;
    c.map(|x| x / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrKind;
    use crate::editmesh::EditMesh;
    use std::sync::Arc;

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
    fn identity_without_origin_layer() {
        let m = quad();
        let mut seen = Vec::new();
        foreach_mapped_vert(&m, VisitOrigin::MappedOnly, |orig, _| {
            seen.push(orig.unwrap());
        })
        .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unmapped_elements_skipped_or_passed() {
        let mut m = quad();
        origindex::ensure_origindex(&mut m, AttrDomain::Point);
        m.table_mut(AttrDomain::Point)
            .ints_mut(AttrKind::OrigIndex)
            .unwrap()[2] = ORIGINDEX_NONE;

        let mut mapped_only = 0;
        foreach_mapped_vert(&m, VisitOrigin::MappedOnly, |orig, _| {
            assert!(orig.is_some());
            mapped_only += 1;
        })
        .unwrap();
        assert_eq!(mapped_only, 3);

        let mut all = Vec::new();
        foreach_mapped_vert(&m, VisitOrigin::All, |orig, _| all.push(orig)).unwrap();
        assert_eq!(all, vec![Some(0), Some(1), None, Some(3)]);
    }

    #[test]
    fn remapped_origins_are_reported() {
        let mut m = quad();
        origindex::ensure_origindex(&mut m, AttrDomain::Edge);
        m.table_mut(AttrDomain::Edge)
            .ints_mut(AttrKind::OrigIndex)
            .unwrap()
            .copy_from_slice(&[3, 2, 1, 0]);
        let mut seen = Vec::new();
        foreach_mapped_edge(&m, VisitOrigin::MappedOnly, |orig, _, _| {
            seen.push(orig.unwrap());
        })
        .unwrap();
        assert_eq!(seen, vec![3, 2, 1, 0]);
    }

    #[test]
    fn face_center_of_unit_quad() {
        let m = quad();
        let mut centers = Vec::new();
        foreach_mapped_face_center(&m, VisitOrigin::MappedOnly, |orig, c| {
            centers.push((orig.unwrap(), c));
        })
        .unwrap();
        assert_eq!(centers, vec![(0, [0.5, 0.5, 0.0])]);
    }

    #[test]
    fn corners_carry_their_face_origin() {
        let mut m = quad();
        origindex::ensure_origindex(&mut m, AttrDomain::Face);
        m.table_mut(AttrDomain::Face)
            .ints_mut(AttrKind::OrigIndex)
            .unwrap()[0] = 7;
        let mut faces = Vec::new();
        foreach_mapped_corner(&m, VisitOrigin::MappedOnly, |orig, _, _| {
            faces.push(orig.unwrap());
        })
        .unwrap();
        assert_eq!(faces, vec![7; 4]);
    }

    #[test]
    fn wrapper_backed_mesh_walks_edit_data() {
        let em = Arc::new(EditMesh::new(
            vec![[0.0; 3], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![0, 1, 2],
            vec![0],
        ));
        let wrapped = Mesh::wrap_edit(em);
        let mut count = 0;
        foreach_mapped_vert(&wrapped, VisitOrigin::MappedOnly, |orig, _| {
            assert_eq!(orig, Some(count));
            count += 1;
        })
        .unwrap();
        assert_eq!(count, 3);
        let mut centers = Vec::new();
        foreach_mapped_face_center(&wrapped, VisitOrigin::MappedOnly, |_, c| centers.push(c))
            .unwrap();
        assert!((centers[0][0] - 2.0 / 3.0).abs() < 1e-6);
    }
}
