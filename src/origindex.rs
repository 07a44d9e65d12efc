//! Origin-index tracking: per-domain "maps-to-original-element" layers.
//!
//! The layer is created lazily, the first time a constructive step needs
//! it, and is identity-filled at creation ("not yet remapped"). From then
//! on every constructive modifier is obliged to propagate entries for
//! elements it keeps and to stamp [`ORIGINDEX_NONE`] on elements it
//! creates; that obligation is documented for modifier implementations, not
//! enforced here. Deform-only runs never create these layers.

use crate::attr::{AttrData, AttrDomain, AttrKind, AttrLayer};
use crate::eval_error::EvalError;
use crate::mesh::Mesh;

/// Sentinel: this element has no corresponding original element.
pub const ORIGINDEX_NONE: i32 = -1;

/// Domains constructive modifiers remap. Corner origins are derived from
/// faces, so no corner layer is kept.
pub const TRACKED_DOMAINS: [AttrDomain; 3] =
    [AttrDomain::Point, AttrDomain::Edge, AttrDomain::Face];

/// Lazily create the origin-index layer for `domain`, identity-filled.
/// Calling twice is a no-op the second time.
pub fn ensure_origindex(mesh: &mut Mesh, domain: AttrDomain) {
    if mesh.table(domain).has(AttrKind::OrigIndex) {
        return;
    }
    let count = mesh.domain_num(domain);
    mesh.table_mut(domain).add_layer(AttrLayer {
        kind: AttrKind::OrigIndex,
        name: ".origindex".into(),
        temporary: false,
        data: AttrData::Int((0..count as i32).collect()),
    });
}

/// Ensure origin layers on every tracked domain.
pub fn ensure_all(mesh: &mut Mesh) {
    for domain in TRACKED_DOMAINS {
        ensure_origindex(mesh, domain);
    }
}

/// The origin-index layer for `domain`, if present.
pub fn origindex(mesh: &Mesh, domain: AttrDomain) -> Option<&[i32]> {
    mesh.table(domain).ints(AttrKind::OrigIndex).ok()
}

/// Validate that every entry is either [`ORIGINDEX_NONE`] or a valid index
/// into a pristine input with `orig_count` elements.
pub fn validate(mesh: &Mesh, domain: AttrDomain, orig_count: usize) -> Result<(), EvalError> {
    let Some(indices) = origindex(mesh, domain) else {
        return Ok(());
    };
    for &i in indices {
        if i != ORIGINDEX_NONE && !(0..orig_count as i32).contains(&i) {
            return Err(EvalError::OrigIndexOutOfRange {
                domain,
                index: i,
                count: orig_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_fill_on_creation() {
        let mut m = Mesh::with_counts(4, 0, 0, 0);
        ensure_origindex(&mut m, AttrDomain::Point);
        assert_eq!(origindex(&m, AttrDomain::Point).unwrap(), &[0, 1, 2, 3]);
    }

    #[test]
    fn idempotent() {
        let mut m = Mesh::with_counts(3, 0, 0, 0);
        ensure_origindex(&mut m, AttrDomain::Point);
        m.table_mut(AttrDomain::Point)
            .ints_mut(AttrKind::OrigIndex)
            .unwrap()[0] = ORIGINDEX_NONE;
        // second call must not reset the remapped layer
        ensure_origindex(&mut m, AttrDomain::Point);
        assert_eq!(
            origindex(&m, AttrDomain::Point).unwrap(),
            &[ORIGINDEX_NONE, 1, 2]
        );
    }

    #[test]
    fn absent_layer_validates_vacuously() {
        let m = Mesh::with_counts(5, 0, 0, 0);
        assert!(validate(&m, AttrDomain::Point, 5).is_ok());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut m = Mesh::with_counts(2, 0, 0, 0);
        ensure_origindex(&mut m, AttrDomain::Point);
        m.table_mut(AttrDomain::Point)
            .ints_mut(AttrKind::OrigIndex)
            .unwrap()[1] = 7;
        let e = validate(&m, AttrDomain::Point, 2).unwrap_err();
        assert!(matches!(
            e,
            EvalError::OrigIndexOutOfRange { index: 7, count: 2, .. }
        ));
    }
}
