//! `Mesh`: the immutable-by-convention geometry bundle flowing through the
//! modifier pipeline.
//!
//! A mesh is four element counts plus four attribute-layer tables, a couple
//! of optional links (edit representation, shape key) and a runtime block of
//! lazily computed derived data. The pristine input mesh of an object is
//! never mutated by the evaluator; working copies are made with
//! [`Mesh::copy_for_eval`], which is also where the pending copy mask set by
//! [`AttrMask::restrict_copy_to`](crate::attr::AttrMask::restrict_copy_to)
//! takes effect.

use crate::attr::{AttrData, AttrDomain, AttrKind, AttrLayer, AttrMask, AttrTable};
use crate::debug_invariants::DebugInvariants;
use crate::editmesh::EditMesh;
use crate::eval_error::EvalError;
use crate::mesh::bounds::BoundBox;
use crate::mesh::{normals, InvalidateCache};
use once_cell::sync::OnceCell;
use std::num::NonZeroU64;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a mesh data block. Fresh per allocation; the shared
/// finalization gate and cache validity checks key off it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MeshDataId(NonZeroU64);

static NEXT_DATA_ID: AtomicU64 = AtomicU64::new(1);

impl MeshDataId {
    /// Allocate a fresh, process-unique id.
    pub fn fresh() -> MeshDataId {
        let raw = NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed);
        // fetch_add starts at 1 and u64 does not wrap in practice
        MeshDataId(NonZeroU64::new(raw).expect("mesh data id overflow"))
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// Which representation backs the mesh's element arrays.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum MeshWrapper {
    /// Plain per-element arrays are materialized in the layer tables.
    MeshData,
    /// Data still lives in the linked edit representation; plain arrays are
    /// materialized on demand via [`Mesh::ensure_mdata`].
    EditData,
}

/// Lazily computed derived data. Cleared wholesale by
/// [`InvalidateCache::invalidate_cache`]; never copied between meshes.
#[derive(Debug, Default)]
pub(crate) struct MeshRuntime {
    pub(crate) bounds: OnceCell<BoundBox>,
    pub(crate) triangulation: OnceCell<Vec<[u32; 3]>>,
    pub(crate) vert_normals: OnceCell<Vec<[f32; 3]>>,
    pub(crate) face_normals: OnceCell<Vec<[f32; 3]>>,
}

/// The evaluated mesh value.
#[derive(Debug)]
pub struct Mesh {
    /// Element counts, indexed by [`AttrDomain::index`].
    counts: [usize; 4],
    /// Attribute layer tables, indexed by [`AttrDomain::index`].
    tables: [AttrTable; 4],
    wrapper: MeshWrapper,
    /// Non-owning link to the edit representation, when one exists.
    edit: Option<Arc<EditMesh>>,
    shape_key: Option<MeshDataId>,
    /// False once any constructive modifier has replaced this mesh.
    pub deformed_only: bool,
    /// Pending copy-time layer filter; consumed by the next structural copy.
    copy_mask: Option<AttrMask>,
    data_id: MeshDataId,
    pub(crate) runtime: MeshRuntime,
}

impl Clone for Mesh {
    fn clone(&self) -> Self {
        Mesh {
            counts: self.counts,
            tables: self.tables.clone(),
            wrapper: self.wrapper,
            edit: self.edit.clone(),
            shape_key: self.shape_key,
            deformed_only: self.deformed_only,
            copy_mask: None,
            data_id: MeshDataId::fresh(),
            // derived caches are not carried across copies
            runtime: MeshRuntime::default(),
        }
    }
}

impl Mesh {
    /// A mesh with zero elements everywhere.
    pub fn empty() -> Mesh {
        Mesh::with_counts(0, 0, 0, 0)
    }

    /// A mesh with the given element counts and empty layer tables.
    pub fn with_counts(points: usize, edges: usize, corners: usize, faces: usize) -> Mesh {
        Mesh {
            counts: [points, edges, corners, faces],
            tables: Default::default(),
            wrapper: MeshWrapper::MeshData,
            edit: None,
            shape_key: None,
            deformed_only: true,
            copy_mask: None,
            data_id: MeshDataId::fresh(),
            runtime: MeshRuntime::default(),
        }
    }

    /// Build a mesh from the bare geometry arrays.
    ///
    /// `face_offsets[f]` is the first corner of face `f`; faces must be
    /// stored in corner order, so face `f` spans
    /// `face_offsets[f]..face_offsets[f + 1]` (or the corner count for the
    /// last face).
    pub fn from_arrays(
        positions: Vec<[f32; 3]>,
        edges: Vec<[u32; 2]>,
        corner_verts: Vec<u32>,
        face_offsets: Vec<u32>,
    ) -> Result<Mesh, EvalError> {
        let mut mesh = Mesh::with_counts(
            positions.len(),
            edges.len(),
            corner_verts.len(),
            face_offsets.len(),
        );
        mesh.table_mut(AttrDomain::Point).add_layer(AttrLayer {
            kind: AttrKind::Position,
            name: "position".into(),
            temporary: false,
            data: AttrData::Vec3(positions),
        });
        mesh.table_mut(AttrDomain::Edge).add_layer(AttrLayer {
            kind: AttrKind::EdgeVerts,
            name: ".edge_verts".into(),
            temporary: false,
            data: AttrData::EdgePair(edges),
        });
        mesh.table_mut(AttrDomain::Corner).add_layer(AttrLayer {
            kind: AttrKind::CornerVert,
            name: ".corner_vert".into(),
            temporary: false,
            data: AttrData::Index(corner_verts),
        });
        mesh.table_mut(AttrDomain::Face).add_layer(AttrLayer {
            kind: AttrKind::FaceOffset,
            name: ".face_offset".into(),
            temporary: false,
            data: AttrData::Index(face_offsets),
        });
        mesh.validate_invariants()?;
        Ok(mesh)
    }

    // --- counts ----------------------------------------------------------

    #[inline]
    pub fn domain_num(&self, domain: AttrDomain) -> usize {
        self.counts[domain.index()]
    }

    #[inline]
    pub fn points_num(&self) -> usize {
        self.counts[AttrDomain::Point.index()]
    }

    #[inline]
    pub fn edges_num(&self) -> usize {
        self.counts[AttrDomain::Edge.index()]
    }

    #[inline]
    pub fn corners_num(&self) -> usize {
        self.counts[AttrDomain::Corner.index()]
    }

    #[inline]
    pub fn faces_num(&self) -> usize {
        self.counts[AttrDomain::Face.index()]
    }

    // --- tables and typed accessors --------------------------------------

    #[inline]
    pub fn table(&self, domain: AttrDomain) -> &AttrTable {
        &self.tables[domain.index()]
    }

    /// Mutable table access. Derived caches are invalidated conservatively.
    pub fn table_mut(&mut self, domain: AttrDomain) -> &mut AttrTable {
        self.invalidate_cache();
        &mut self.tables[domain.index()]
    }

    pub fn positions(&self) -> Result<&[[f32; 3]], EvalError> {
        self.table(AttrDomain::Point).vec3(AttrKind::Position)
    }

    /// Flat `f32` view of the position layer.
    pub fn positions_flat(&self) -> Result<&[f32], EvalError> {
        Ok(bytemuck::cast_slice(self.positions()?))
    }

    /// Replace the position layer wholesale.
    pub fn set_positions(&mut self, positions: Vec<[f32; 3]>) {
        self.table_mut(AttrDomain::Point).add_layer(AttrLayer {
            kind: AttrKind::Position,
            name: "position".into(),
            temporary: false,
            data: AttrData::Vec3(positions),
        });
    }

    pub fn edge_verts(&self) -> Result<&[[u32; 2]], EvalError> {
        self.table(AttrDomain::Edge).edge_pairs(AttrKind::EdgeVerts)
    }

    pub fn corner_verts(&self) -> Result<&[u32], EvalError> {
        self.table(AttrDomain::Corner).indices(AttrKind::CornerVert)
    }

    pub fn face_offsets(&self) -> Result<&[u32], EvalError> {
        self.table(AttrDomain::Face).indices(AttrKind::FaceOffset)
    }

    /// Corner range of face `f`.
    pub fn face_range(&self, f: usize) -> Result<Range<usize>, EvalError> {
        let offsets = self.face_offsets()?;
        let start = offsets[f] as usize;
        let end = if f + 1 < offsets.len() {
            offsets[f + 1] as usize
        } else {
            self.corners_num()
        };
        if start > end || end > self.corners_num() {
            return Err(EvalError::FaceOffsetsInvalid { face: f });
        }
        Ok(start..end)
    }

    // --- links and identity ----------------------------------------------

    #[inline]
    pub fn data_id(&self) -> MeshDataId {
        self.data_id
    }

    #[inline]
    pub fn wrapper(&self) -> MeshWrapper {
        self.wrapper
    }

    #[inline]
    pub fn edit(&self) -> Option<&Arc<EditMesh>> {
        self.edit.as_ref()
    }

    #[inline]
    pub fn shape_key(&self) -> Option<MeshDataId> {
        self.shape_key
    }

    pub fn set_shape_key(&mut self, key: Option<MeshDataId>) {
        self.shape_key = key;
    }

    /// Wrap an edit representation without materializing plain arrays.
    pub fn wrap_edit(edit: Arc<EditMesh>) -> Mesh {
        let mut mesh = Mesh::with_counts(
            edit.points_num(),
            edit.edges_num(),
            edit.corners_num(),
            edit.faces_num(),
        );
        mesh.wrapper = MeshWrapper::EditData;
        mesh.edit = Some(edit);
        mesh
    }

    /// Materialize plain arrays from the edit representation, once.
    ///
    /// A deformed position layer already stored on the wrapper survives; all
    /// other skeleton arrays are copied out of the edit data.
    pub fn ensure_mdata(&mut self) -> Result<(), EvalError> {
        if self.wrapper == MeshWrapper::MeshData {
            return Ok(());
        }
        let edit = self.edit.clone().ok_or(EvalError::MissingEditData)?;
        if !self.table(AttrDomain::Point).has(AttrKind::Position) {
            self.set_positions(edit.positions().to_vec());
        }
        self.table_mut(AttrDomain::Edge).add_layer(AttrLayer {
            kind: AttrKind::EdgeVerts,
            name: ".edge_verts".into(),
            temporary: false,
            data: AttrData::EdgePair(edit.edges().to_vec()),
        });
        self.table_mut(AttrDomain::Corner).add_layer(AttrLayer {
            kind: AttrKind::CornerVert,
            name: ".corner_vert".into(),
            temporary: false,
            data: AttrData::Index(edit.corner_verts().to_vec()),
        });
        self.table_mut(AttrDomain::Face).add_layer(AttrLayer {
            kind: AttrKind::FaceOffset,
            name: ".face_offset".into(),
            temporary: false,
            data: AttrData::Index(edit.face_offsets().to_vec()),
        });
        self.wrapper = MeshWrapper::MeshData;
        Ok(())
    }

    // --- copies and masks -------------------------------------------------

    /// Record the copy-time layer filter for this mesh's next structural
    /// copy.
    pub fn set_copy_mask(&mut self, mask: AttrMask) {
        self.copy_mask = Some(mask);
    }

    #[inline]
    pub fn copy_mask(&self) -> Option<&AttrMask> {
        self.copy_mask.as_ref()
    }

    /// Copy for pipeline evaluation.
    ///
    /// Applies the pending copy mask (widened by [`AttrMask::BARE`] so the
    /// geometry skeleton always survives) and starts with fresh derived
    /// caches and a fresh data id. The source is left untouched.
    #[must_use]
    pub fn copy_for_eval(&self) -> Mesh {
        let mut out = self.clone();
        if let Some(mask) = self.copy_mask {
            out.apply_copy_mask(&mask);
        }
        out
    }

    /// Drop layers not named in `mask` (beyond the bare skeleton). Used when
    /// adopting a constructive modifier's output copy.
    pub fn apply_copy_mask(&mut self, mask: &AttrMask) {
        let effective = mask.merged(&AttrMask::BARE);
        for domain in AttrDomain::ALL {
            self.tables[domain.index()].retain_kinds(effective.domain(domain));
        }
        self.invalidate_cache();
    }

    /// Drop every layer marked temporary, on every domain.
    pub fn free_temporary_layers(&mut self) {
        for domain in AttrDomain::ALL {
            self.tables[domain.index()].free_temporary();
        }
    }

    // --- derived data -----------------------------------------------------

    /// Lazily computed bounding box.
    pub fn bounds(&self) -> &BoundBox {
        self.runtime.bounds.get_or_init(|| {
            BoundBox::from_positions(self.positions().unwrap_or(&[]))
        })
    }

    /// Lazily computed per-vertex normals.
    pub fn vert_normals(&self) -> &[[f32; 3]] {
        self.runtime
            .vert_normals
            .get_or_init(|| normals::compute_vert_normals(self))
    }

    /// Lazily computed per-face normals.
    pub fn face_normals(&self) -> &[[f32; 3]] {
        self.runtime
            .face_normals
            .get_or_init(|| normals::compute_face_normals(self))
    }

    /// Lazily computed fan triangulation, one `[corner; 3]` triple per
    /// triangle, as corner indices.
    pub fn triangulation(&self) -> &[[u32; 3]] {
        self.runtime.triangulation.get_or_init(|| {
            let mut tris = Vec::new();
            for f in 0..self.faces_num() {
                let Ok(range) = self.face_range(f) else {
                    continue;
                };
                let (start, end) = (range.start as u32, range.end as u32);
                for c in start + 1..end.saturating_sub(1) {
                    tris.push([start, c, c + 1]);
                }
            }
            tris
        })
    }

    /// Drop only the triangulation cache; used when a layer write makes the
    /// render topology stale without touching positions.
    pub fn invalidate_triangulation(&mut self) {
        self.runtime.triangulation.take();
    }
}

impl InvalidateCache for Mesh {
    fn invalidate_cache(&mut self) {
        self.runtime.bounds.take();
        self.runtime.triangulation.take();
        self.runtime.vert_normals.take();
        self.runtime.face_normals.take();
    }
}

impl DebugInvariants for Mesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Mesh invalid");
    }

    fn validate_invariants(&self) -> Result<(), EvalError> {
        // Wrapper-backed meshes may have empty tables; counts come from the
        // edit representation.
        for domain in AttrDomain::ALL {
            self.tables[domain.index()].validate_counts(domain, self.domain_num(domain))?;
        }
        if self.table(AttrDomain::Face).has(AttrKind::FaceOffset) {
            let offsets = self.face_offsets()?;
            let mut prev = 0u32;
            for (f, &off) in offsets.iter().enumerate() {
                if off < prev || off as usize > self.corners_num() {
                    return Err(EvalError::FaceOffsetsInvalid { face: f });
                }
                prev = off;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn quad() -> Mesh {
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
    fn from_arrays_counts() {
        let m = quad();
        assert_eq!(m.points_num(), 4);
        assert_eq!(m.edges_num(), 4);
        assert_eq!(m.corners_num(), 4);
        assert_eq!(m.faces_num(), 1);
        assert_eq!(m.face_range(0).unwrap(), 0..4);
    }

    #[test]
    fn copy_applies_pending_mask() {
        let mut m = quad();
        m.table_mut(AttrDomain::Point).add_layer(AttrLayer {
            kind: AttrKind::Weight,
            name: "weight".into(),
            temporary: false,
            data: AttrData::Float(vec![0.5; 4]),
        });
        AttrMask::BARE.restrict_copy_to(&mut m);
        let copy = m.copy_for_eval();
        assert!(!copy.table(AttrDomain::Point).has(AttrKind::Weight));
        // skeleton always survives
        assert!(copy.positions().is_ok());
        // source keeps its layer; the filter acts at copy time only
        assert!(m.table(AttrDomain::Point).has(AttrKind::Weight));
    }

    #[test]
    fn copies_get_fresh_identity_and_caches() {
        let m = quad();
        let _ = m.bounds();
        let copy = m.copy_for_eval();
        assert_ne!(copy.data_id(), m.data_id());
        assert!(copy.runtime.bounds.get().is_none());
    }

    #[test]
    fn triangulation_is_a_fan() {
        let m = quad();
        assert_eq!(m.triangulation(), &[[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn invalid_face_offsets_rejected() {
        let e = Mesh::from_arrays(
            vec![[0.0; 3]; 3],
            vec![],
            vec![0, 1, 2],
            vec![0, 9], // second face starts past the corner count
        )
        .unwrap_err();
        assert!(matches!(e, EvalError::FaceOffsetsInvalid { face: 1 }));
    }

    #[test]
    fn positions_flat_view() {
        let m = quad();
        let flat = m.positions_flat().unwrap();
        assert_eq!(flat.len(), 12);
        assert_eq!(flat[3], 1.0);
    }
}
