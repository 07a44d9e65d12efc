//! `AttrDomain`: the four per-element domains of an evaluated mesh.

use std::fmt;

/// Element domain an attribute layer is attached to.
///
/// Every layer belongs to exactly one domain and has one entry per element
/// of that domain. The discriminants double as array indices into the
/// per-domain tables a mesh carries.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(u8)]
pub enum AttrDomain {
    /// Vertices.
    Point = 0,
    /// Edges.
    Edge = 1,
    /// Face corners ("loops").
    Corner = 2,
    /// Faces.
    Face = 3,
}

impl AttrDomain {
    /// All domains, in index order.
    pub const ALL: [AttrDomain; 4] = [
        AttrDomain::Point,
        AttrDomain::Edge,
        AttrDomain::Corner,
        AttrDomain::Face,
    ];

    /// Number of domains.
    pub const COUNT: usize = 4;

    /// Index of this domain into per-domain arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Debug for AttrDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttrDomain::Point => "Point",
            AttrDomain::Edge => "Edge",
            AttrDomain::Corner => "Corner",
            AttrDomain::Face => "Face",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_dense() {
        for (i, d) in AttrDomain::ALL.iter().enumerate() {
            assert_eq!(d.index(), i);
        }
        assert_eq!(AttrDomain::ALL.len(), AttrDomain::COUNT);
    }

    #[test]
    fn serde_roundtrip() {
        for d in AttrDomain::ALL {
            let s = serde_json::to_string(&d).unwrap();
            let back: AttrDomain = serde_json::from_str(&s).unwrap();
            assert_eq!(back, d);
        }
    }
}
