//! Attribute kinds and requirement masks.
//!
//! [`AttrKind`] is the closed set of layer kinds this evaluator knows about;
//! [`KindSet`] is a bit-set over them; [`AttrMask`] holds one `KindSet` per
//! domain and is the "what must survive downstream" value threaded through
//! the pipeline.
//!
//! Merging masks is bitwise OR per domain, so it is commutative, associative
//! and idempotent; the property tests at the bottom pin that down.

use crate::attr::AttrDomain;

/// A kind of attribute layer. The discriminant is the bit position inside a
/// [`KindSet`].
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum AttrKind {
    /// Vertex positions (`[f32; 3]`).
    Position = 0,
    /// Edge endpoint vertex indices (`[u32; 2]`).
    EdgeVerts = 1,
    /// Corner vertex index (`u32`).
    CornerVert = 2,
    /// Face start offset into the corner array (`u32`).
    FaceOffset = 3,
    /// Maps-to-original-element index (`i32`, `-1` means no origin).
    OrigIndex = 4,
    /// Undeformed coordinates for texture projection (`[f32; 3]`).
    Orco = 5,
    /// Cloth rest-shape companion coordinates (`[f32; 3]`).
    ClothOrco = 6,
    /// UV coordinates (`[f32; 2]`).
    Uv = 7,
    /// Original UV space reference coordinates (`[f32; 2]`).
    UvOrig = 8,
    /// Color (`[f32; 4]`).
    Color = 9,
    /// Paint-preview color (`[f32; 4]`).
    PreviewColor = 10,
    /// Vertex-group weight (`f32`).
    Weight = 11,
    /// Crease (`f32`).
    Crease = 12,
    /// Sculpt mask (`f32`).
    SculptMask = 13,
    /// Pre-deform position snapshot (`[f32; 3]`).
    RestPosition = 14,
    /// Per-corner ("split") normals (`[f32; 3]`).
    CornerNormal = 15,
    /// Shape-key deltas (`[f32; 3]`).
    ShapeKey = 16,
}

impl AttrKind {
    /// Bit representing this kind inside a [`KindSet`].
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// Bit-set of [`AttrKind`]s.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct KindSet(u32);

impl KindSet {
    /// The empty set.
    pub const EMPTY: KindSet = KindSet(0);

    /// Build a set from a list of kinds.
    pub const fn of(kinds: &[AttrKind]) -> KindSet {
        let mut bits = 0u32;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        KindSet(bits)
    }

    #[inline]
    pub const fn contains(self, kind: AttrKind) -> bool {
        self.0 & kind.bit() != 0
    }

    #[inline]
    pub fn insert(&mut self, kind: AttrKind) {
        self.0 |= kind.bit();
    }

    #[inline]
    pub fn remove(&mut self, kind: AttrKind) {
        self.0 &= !kind.bit();
    }

    /// Union of two sets.
    #[inline]
    pub const fn union(self, other: KindSet) -> KindSet {
        KindSet(self.0 | other.0)
    }

    /// True iff every kind in `self` is also in `other`.
    #[inline]
    pub const fn is_subset_of(self, other: KindSet) -> bool {
        self.0 & !other.0 == 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Debug for KindSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KindSet({:#x})", self.0)
    }
}

/// Per-domain attribute requirement mask: one [`KindSet`] for each of the
/// four element domains.
///
/// # Invariants
/// - [`merge_from`](Self::merge_from) is commutative, associative and
///   idempotent (bitwise OR per domain).
/// - Restricting a copy to a mask is a *filter applied at copy time*: layers
///   not named in the mask are dropped when the next structural copy
///   happens, never live-deleted.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize,
)]
pub struct AttrMask {
    pub point: KindSet,
    pub edge: KindSet,
    pub corner: KindSet,
    pub face: KindSet,
}

impl AttrMask {
    /// Nothing required.
    pub const EMPTY: AttrMask = AttrMask {
        point: KindSet::EMPTY,
        edge: KindSet::EMPTY,
        corner: KindSet::EMPTY,
        face: KindSet::EMPTY,
    };

    /// The bare geometry skeleton every mesh keeps through every copy:
    /// positions, edge verts, corner verts and face offsets.
    pub const BARE: AttrMask = AttrMask {
        point: KindSet::of(&[AttrKind::Position]),
        edge: KindSet::of(&[AttrKind::EdgeVerts]),
        corner: KindSet::of(&[AttrKind::CornerVert]),
        face: KindSet::of(&[AttrKind::FaceOffset]),
    };

    /// Every kind on every domain.
    pub const EVERYTHING: AttrMask = AttrMask {
        point: KindSet(u32::MAX),
        edge: KindSet(u32::MAX),
        corner: KindSet(u32::MAX),
        face: KindSet(u32::MAX),
    };

    /// The kind set for one domain.
    #[inline]
    pub fn domain(&self, domain: AttrDomain) -> KindSet {
        match domain {
            AttrDomain::Point => self.point,
            AttrDomain::Edge => self.edge,
            AttrDomain::Corner => self.corner,
            AttrDomain::Face => self.face,
        }
    }

    /// Mutable kind set for one domain.
    #[inline]
    pub fn domain_mut(&mut self, domain: AttrDomain) -> &mut KindSet {
        match domain {
            AttrDomain::Point => &mut self.point,
            AttrDomain::Edge => &mut self.edge,
            AttrDomain::Corner => &mut self.corner,
            AttrDomain::Face => &mut self.face,
        }
    }

    /// Union each domain's kinds from `other` into `self`.
    pub fn merge_from(&mut self, other: &AttrMask) {
        self.point = self.point.union(other.point);
        self.edge = self.edge.union(other.edge);
        self.corner = self.corner.union(other.corner);
        self.face = self.face.union(other.face);
    }

    /// Union of two masks.
    #[must_use]
    pub fn merged(&self, other: &AttrMask) -> AttrMask {
        let mut out = *self;
        out.merge_from(other);
        out
    }

    /// True iff `other` is a per-domain subset of `self`: a cache entry
    /// built with `self` can serve a request for `other`.
    pub fn contains(&self, other: &AttrMask) -> bool {
        other.point.is_subset_of(self.point)
            && other.edge.is_subset_of(self.edge)
            && other.corner.is_subset_of(self.corner)
            && other.face.is_subset_of(self.face)
    }

    /// Convenience builder: mask requiring `kind` on `domain` only.
    pub fn with(domain: AttrDomain, kind: AttrKind) -> AttrMask {
        let mut m = AttrMask::EMPTY;
        m.domain_mut(domain).insert(kind);
        m
    }

    /// Record this mask as the copy-time filter for `mesh`'s next
    /// structural copy. Layers not named here (beyond the bare skeleton)
    /// will be dropped by that copy.
    pub fn restrict_copy_to(&self, mesh: &mut crate::mesh::Mesh) {
        mesh.set_copy_mask(*self);
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    // A KindSet must stay a bare u32; masks are copied around freely.
    assert_eq_size!(KindSet, u32);
    assert_eq_size!(AttrMask, [u32; 4]);
}
