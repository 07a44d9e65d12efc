//! Edit-representation wrapper: the editable-mesh collaborator.
//!
//! This is the in-process contract the evaluator consumes from the editable
//! mesh subsystem: per-domain counts, stable-index element access and
//! conversion to the plain-array [`Mesh`](crate::mesh::Mesh) representation.
//! Instances are shared via `Arc`; a cage snapshot duplicates only the
//! shallow reference.

use crate::mesh::Mesh;
use std::sync::Arc;

/// Editable mesh with stable element indices.
///
/// Element indices are stable for the lifetime of one evaluation; the
/// evaluator treats them as the "original" indices of edit-mode geometry.
#[derive(Clone, Debug, Default)]
pub struct EditMesh {
    positions: Vec<[f32; 3]>,
    edges: Vec<[u32; 2]>,
    corner_verts: Vec<u32>,
    face_offsets: Vec<u32>,
}

impl EditMesh {
    pub fn new(
        positions: Vec<[f32; 3]>,
        edges: Vec<[u32; 2]>,
        corner_verts: Vec<u32>,
        face_offsets: Vec<u32>,
    ) -> EditMesh {
        EditMesh {
            positions,
            edges,
            corner_verts,
            face_offsets,
        }
    }

    #[inline]
    pub fn points_num(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn edges_num(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn corners_num(&self) -> usize {
        self.corner_verts.len()
    }

    #[inline]
    pub fn faces_num(&self) -> usize {
        self.face_offsets.len()
    }

    #[inline]
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    #[inline]
    pub fn edges(&self) -> &[[u32; 2]] {
        &self.edges
    }

    #[inline]
    pub fn corner_verts(&self) -> &[u32] {
        &self.corner_verts
    }

    #[inline]
    pub fn face_offsets(&self) -> &[u32] {
        &self.face_offsets
    }

    /// Corner range of face `f`.
    pub fn face_range(&self, f: usize) -> std::ops::Range<usize> {
        let start = self.face_offsets[f] as usize;
        let end = if f + 1 < self.face_offsets.len() {
            self.face_offsets[f + 1] as usize
        } else {
            self.corner_verts.len()
        };
        start..end
    }

    /// Iterate vertices with their stable indices.
    pub fn iter_verts(&self) -> impl Iterator<Item = (usize, &[f32; 3])> {
        self.positions.iter().enumerate().map(|(i, p)| (i, p))
    }

    /// Materialize a plain-array mesh from this edit representation, keeping
    /// a shallow link back to `self`.
    pub fn to_mesh(self: &Arc<Self>) -> Mesh {
        let mut mesh = Mesh::wrap_edit(self.clone());
        // wrap_edit defers materialization; force it here
        mesh.ensure_mdata()
            .expect("wrap_edit always carries an edit link");
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshWrapper;

    fn tri() -> Arc<EditMesh> {
        Arc::new(EditMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![0, 1, 2],
            vec![0],
        ))
    }

    #[test]
    fn wrap_defers_materialization() {
        let em = tri();
        let wrapped = Mesh::wrap_edit(em.clone());
        assert_eq!(wrapped.wrapper(), MeshWrapper::EditData);
        assert_eq!(wrapped.points_num(), 3);
        assert!(wrapped.positions().is_err());
    }

    #[test]
    fn to_mesh_materializes() {
        let em = tri();
        let mesh = em.to_mesh();
        assert_eq!(mesh.wrapper(), MeshWrapper::MeshData);
        assert_eq!(mesh.positions().unwrap(), em.positions());
        assert!(mesh.edit().is_some());
    }

    #[test]
    fn cage_snapshot_shares_edit_link() {
        let em = tri();
        let mesh = em.to_mesh();
        let snapshot = mesh.clone();
        assert!(Arc::ptr_eq(snapshot.edit().unwrap(), &em));
    }
}
