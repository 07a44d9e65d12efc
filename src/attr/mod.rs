//! Per-element attribute machinery: domains, layer kinds, requirement masks
//! and the named layer tables a [`Mesh`](crate::mesh::Mesh) carries per
//! domain.
//!
//! The requirement mask ([`AttrMask`]) is the currency of the whole
//! evaluator: callers declare what they need, modifiers declare what they
//! need from upstream, and the pipeline narrows each mesh copy to the union
//! of everything still required downstream.

pub mod domain;
pub mod layer;
pub mod mask;

pub use domain::AttrDomain;
pub use layer::{AttrData, AttrLayer, AttrTable};
pub use mask::{AttrKind, AttrMask, KindSet};
