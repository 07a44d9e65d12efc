//! Named, typed attribute layers and the per-domain tables that hold them.
//!
//! An [`AttrTable`] owns the layers of one element domain. Layers are kept
//! in insertion order for deterministic iteration; a name index backed by
//! `hashbrown` gives O(1) lookup by layer name.

use crate::attr::{AttrDomain, AttrKind, KindSet};
use crate::eval_error::EvalError;
use hashbrown::HashMap;

/// Homogeneous per-element value storage; a closed set of value shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrData {
    Vec3(Vec<[f32; 3]>),
    Vec2(Vec<[f32; 2]>),
    Float(Vec<f32>),
    Int(Vec<i32>),
    EdgePair(Vec<[u32; 2]>),
    Index(Vec<u32>),
    Color(Vec<[f32; 4]>),
}

impl AttrData {
    /// Entry count.
    pub fn len(&self) -> usize {
        match self {
            AttrData::Vec3(v) => v.len(),
            AttrData::Vec2(v) => v.len(),
            AttrData::Float(v) => v.len(),
            AttrData::Int(v) => v.len(),
            AttrData::EdgePair(v) => v.len(),
            AttrData::Index(v) => v.len(),
            AttrData::Color(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One attribute layer: a kind, a name, a temporariness marker and the data.
///
/// `temporary` marks layers that exist only to support modifier evaluation
/// (e.g. cloth-rest orco); they are dropped at defined pipeline checkpoints
/// rather than via ambient global flags.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrLayer {
    pub kind: AttrKind,
    pub name: String,
    pub temporary: bool,
    pub data: AttrData,
}

/// Ordered layer table for a single domain.
#[derive(Clone, Debug, Default)]
pub struct AttrTable {
    layers: Vec<AttrLayer>,
    by_name: HashMap<String, usize>,
}

impl PartialEq for AttrTable {
    fn eq(&self, other: &Self) -> bool {
        self.layers == other.layers
    }
}

impl AttrTable {
    /// Add a layer. Replaces an existing layer of the same kind and name.
    pub fn add_layer(&mut self, layer: AttrLayer) {
        if let Some(&i) = self.by_name.get(&layer.name) {
            if self.layers[i].kind == layer.kind {
                self.layers[i] = layer;
                return;
            }
        }
        self.by_name.insert(layer.name.clone(), self.layers.len());
        self.layers.push(layer);
    }

    /// First layer of `kind`, if any.
    pub fn get(&self, kind: AttrKind) -> Option<&AttrLayer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    /// Mutable first layer of `kind`, if any.
    pub fn get_mut(&mut self, kind: AttrKind) -> Option<&mut AttrLayer> {
        self.layers.iter_mut().find(|l| l.kind == kind)
    }

    /// Layer by name.
    pub fn get_named(&self, name: &str) -> Option<&AttrLayer> {
        self.by_name.get(name).map(|&i| &self.layers[i])
    }

    /// True iff a layer of `kind` exists.
    pub fn has(&self, kind: AttrKind) -> bool {
        self.get(kind).is_some()
    }

    /// Remove every layer of `kind`.
    pub fn free(&mut self, kind: AttrKind) {
        self.layers.retain(|l| l.kind != kind);
        self.rebuild_index();
    }

    /// Remove every layer marked temporary.
    pub fn free_temporary(&mut self) {
        self.layers.retain(|l| !l.temporary);
        self.rebuild_index();
    }

    /// Keep only layers whose kind is in `mask`.
    pub fn retain_kinds(&mut self, mask: KindSet) {
        self.layers.retain(|l| mask.contains(l.kind));
        self.rebuild_index();
    }

    /// Copy of this table keeping only layers whose kind is in `mask`.
    #[must_use]
    pub fn copy_with_mask(&self, mask: KindSet) -> AttrTable {
        let mut out = AttrTable::default();
        for l in self.layers.iter().filter(|l| mask.contains(l.kind)) {
            out.add_layer(l.clone());
        }
        out
    }

    /// Set of kinds present.
    pub fn kinds(&self) -> KindSet {
        let mut set = KindSet::EMPTY;
        for l in &self.layers {
            set.insert(l.kind);
        }
        set
    }

    /// Layers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AttrLayer> {
        self.layers.iter()
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Validate that every layer has exactly `count` entries.
    pub fn validate_counts(&self, domain: AttrDomain, count: usize) -> Result<(), EvalError> {
        for l in &self.layers {
            if l.data.len() != count {
                return Err(EvalError::LayerLengthMismatch {
                    domain,
                    name: l.name.clone(),
                    expected: count,
                    found: l.data.len(),
                });
            }
        }
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.by_name.clear();
        for (i, l) in self.layers.iter().enumerate() {
            self.by_name.insert(l.name.clone(), i);
        }
    }
}

/// Typed accessors; each returns `LayerTypeMismatch` when the stored shape
/// differs from the requested one.
impl AttrTable {
    pub fn vec3(&self, kind: AttrKind) -> Result<&[[f32; 3]], EvalError> {
        match &self.must(kind)?.data {
            AttrData::Vec3(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Vec3",
            }),
        }
    }

    pub fn vec3_mut(&mut self, kind: AttrKind) -> Result<&mut Vec<[f32; 3]>, EvalError> {
        match &mut self.must_mut(kind)?.data {
            AttrData::Vec3(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Vec3",
            }),
        }
    }

    pub fn vec2(&self, kind: AttrKind) -> Result<&[[f32; 2]], EvalError> {
        match &self.must(kind)?.data {
            AttrData::Vec2(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Vec2",
            }),
        }
    }

    pub fn ints(&self, kind: AttrKind) -> Result<&[i32], EvalError> {
        match &self.must(kind)?.data {
            AttrData::Int(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Int",
            }),
        }
    }

    pub fn ints_mut(&mut self, kind: AttrKind) -> Result<&mut Vec<i32>, EvalError> {
        match &mut self.must_mut(kind)?.data {
            AttrData::Int(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Int",
            }),
        }
    }

    pub fn indices(&self, kind: AttrKind) -> Result<&[u32], EvalError> {
        match &self.must(kind)?.data {
            AttrData::Index(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "Index",
            }),
        }
    }

    pub fn edge_pairs(&self, kind: AttrKind) -> Result<&[[u32; 2]], EvalError> {
        match &self.must(kind)?.data {
            AttrData::EdgePair(v) => Ok(v),
            _ => Err(EvalError::LayerTypeMismatch {
                kind,
                expected: "EdgePair",
            }),
        }
    }

    fn must(&self, kind: AttrKind) -> Result<&AttrLayer, EvalError> {
        self.get(kind).ok_or(EvalError::MissingLayer {
            // Domain is unknown at table level; Point is the conventional
            // report domain for typed access misses.
            domain: AttrDomain::Point,
            kind,
        })
    }

    fn must_mut(&mut self, kind: AttrKind) -> Result<&mut AttrLayer, EvalError> {
        if self.get(kind).is_none() {
            return Err(EvalError::MissingLayer {
                domain: AttrDomain::Point,
                kind,
            });
        }
        Ok(self.get_mut(kind).unwrap())
    }
}
