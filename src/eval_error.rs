//! EvalError: unified error type for mesh-modstack public APIs.
//!
//! Every public fallible API in this crate returns this error type so callers
//! get robust, non-panicking error handling. Per-modifier failures during a
//! pipeline run are deliberately *not* represented here: they degrade to
//! recorded [`ModifierWarning`](crate::modifier::ModifierWarning)s and the
//! run keeps going.

use crate::attr::{AttrDomain, AttrKind};
use thiserror::Error;

/// Unified error type for mesh-modstack operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// A deform-only result was requested for an object in edit mode; there
    /// is no such concept there.
    #[error("deform-only evaluation is not defined in edit mode")]
    DeformOnlyInEditMode,
    /// An edit-cage result was requested for an object not in edit mode.
    #[error("edit cage requested for an object that is not in edit mode")]
    NotInEditMode,
    /// A wrapper-backed mesh cannot be materialized because its edit link is
    /// gone.
    #[error("wrapper-backed mesh has no edit representation to materialize from")]
    MissingEditData,
    /// A required attribute layer is absent.
    #[error("missing `{kind:?}` layer on {domain:?} domain")]
    MissingLayer { domain: AttrDomain, kind: AttrKind },
    /// A layer's element count disagrees with its domain's element count.
    #[error("{domain:?} layer `{name}` has {found} entries, domain has {expected}")]
    LayerLengthMismatch {
        domain: AttrDomain,
        name: String,
        expected: usize,
        found: usize,
    },
    /// A layer holds a different value type than the access expected.
    #[error("`{kind:?}` layer holds a different value type (expected {expected})")]
    LayerTypeMismatch {
        kind: AttrKind,
        expected: &'static str,
    },
    /// An origin-index entry is neither the no-origin sentinel nor a valid
    /// index into the pristine input.
    #[error("{domain:?} origin index {index} out of range (original count {count})")]
    OrigIndexOutOfRange {
        domain: AttrDomain,
        index: i32,
        count: usize,
    },
    /// Face offsets are not monotonically increasing, or run past the
    /// corner count.
    #[error("face {face} has an invalid corner offset")]
    FaceOffsetsInvalid { face: usize },
}
