#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-modstack
//!
//! mesh-modstack is a modular Rust library for evaluating modifier stacks
//! over polygon meshes. It provides the evaluated-mesh value type with
//! per-domain attribute-layer tables, a capability-tagged modifier contract,
//! the object-mode and edit-mode evaluation pipelines, origin-index tracking
//! from evaluated elements back to original ones, and a per-object result
//! cache keyed on attribute requirement masks.
//!
//! ## Features
//! - `Mesh` with point/edge/corner/face attribute tables and lazily
//!   computed derived data (bounds, normals, triangulation)
//! - Attribute requirement masks with copy-time layer filtering, so only
//!   the layers somebody downstream asked for survive between modifiers
//! - A two-phase stack walker: a leading deform-only run over a bare
//!   positions array, then the general constructive run
//! - Orco / cloth-rest companion meshes carrying undeformed coordinates
//!   through constructive modifiers
//! - Edit-mode evaluation against a wrapper-backed mesh, with cage capture
//!   and deferred normal finalization
//! - Race-free finalization of meshes shared between evaluations
//! - Optional `rayon` parallelism for normal computation
//!
//! ## Determinism
//!
//! Evaluation is deterministic: modifiers run strictly in stack order,
//! layer tables preserve insertion order, and traversal helpers visit
//! elements in index order.
//!
//! ## Usage
//! Add `mesh-modstack` as a dependency in your `Cargo.toml` and enable
//! features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-modstack = "0.3"
//! # Optional features:
//! # features = ["rayon", "check-invariants"]
//! ```

pub mod attr;
pub mod cache;
pub mod debug_invariants;
pub mod editmesh;
pub mod eval_error;
pub mod foreach;
pub mod mesh;
pub mod modifier;
pub mod origindex;
pub mod pipeline;

pub use debug_invariants::DebugInvariants;
pub use eval_error::EvalError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::attr::{AttrDomain, AttrKind, AttrLayer, AttrMask, AttrTable, KindSet};
    pub use crate::cache::{Object, ObjectEval};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::editmesh::EditMesh;
    pub use crate::eval_error::EvalError;
    pub use crate::foreach::{
        foreach_mapped_corner, foreach_mapped_edge, foreach_mapped_face_center,
        foreach_mapped_vert, VisitOrigin,
    };
    pub use crate::mesh::{BoundBox, InvalidateCache, Mesh, MeshDataId, MeshHandle, MeshWrapper};
    pub use crate::modifier::{
        EvalPurpose, ModeMask, Modifier, ModifierCaps, ModifierContext, ModifierOutput,
        ModifierWarning, ObjectMode, SculptOptions, ShapeKeyDeform, SkipReason, VirtualModifiers,
    };
    pub use crate::origindex::ORIGINDEX_NONE;
    pub use crate::pipeline::{
        evaluate, evaluate_edit, EvalOutput, EvalParams, GeometryBundle, GeometryComponent,
    };
}
