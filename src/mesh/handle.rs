//! `MeshHandle`: tagged owned-or-shared mesh ownership.
//!
//! The pipeline's working result "might be the pristine input, might be a
//! mesh we own". Modeling that as a tagged handle makes it impossible to
//! free a borrowed input: dropping a `Shared` handle only drops an `Arc`
//! reference.

use crate::mesh::Mesh;
use std::ops::Deref;
use std::sync::Arc;

/// Owned or shared (read-only) mesh.
#[derive(Debug, Clone)]
pub enum MeshHandle {
    /// Uniquely owned; may be mutated freely.
    Owned(Box<Mesh>),
    /// Shared, read-only. Typically the pristine input when no modifier
    /// produced a mesh, or a cage aliasing the final result.
    Shared(Arc<Mesh>),
}

impl MeshHandle {
    pub fn owned(mesh: Mesh) -> MeshHandle {
        MeshHandle::Owned(Box::new(mesh))
    }

    pub fn shared(mesh: Arc<Mesh>) -> MeshHandle {
        MeshHandle::Shared(mesh)
    }

    /// True iff this handle aliases shared data.
    pub fn is_shared(&self) -> bool {
        matches!(self, MeshHandle::Shared(_))
    }

    /// The shared `Arc`, when this handle is shared.
    pub fn share(&self) -> Option<Arc<Mesh>> {
        match self {
            MeshHandle::Owned(_) => None,
            MeshHandle::Shared(m) => Some(m.clone()),
        }
    }

    /// Mutable access, copying shared data first.
    pub fn make_owned(&mut self) -> &mut Mesh {
        if let MeshHandle::Shared(shared) = self {
            let copy = shared.copy_for_eval();
            *self = MeshHandle::Owned(Box::new(copy));
        }
        match self {
            MeshHandle::Owned(m) => m,
            MeshHandle::Shared(_) => unreachable!("just converted to owned"),
        }
    }

    /// Consume the handle, copying shared data if necessary.
    pub fn into_owned(self) -> Mesh {
        match self {
            MeshHandle::Owned(m) => *m,
            MeshHandle::Shared(m) => m.copy_for_eval(),
        }
    }

    /// Convert into an `Arc` for multi-consumer sharing without copying.
    pub fn into_arc(self) -> Arc<Mesh> {
        match self {
            MeshHandle::Owned(m) => Arc::new(*m),
            MeshHandle::Shared(m) => m,
        }
    }
}

impl Deref for MeshHandle {
    type Target = Mesh;

    fn deref(&self) -> &Mesh {
        match self {
            MeshHandle::Owned(m) => m,
            MeshHandle::Shared(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_handle_never_clones_until_mutated() {
        let input = Arc::new(Mesh::with_counts(0, 0, 0, 0));
        let h = MeshHandle::shared(input.clone());
        assert!(h.is_shared());
        assert_eq!(h.data_id(), input.data_id());
        assert_eq!(Arc::strong_count(&input), 2);
    }

    #[test]
    fn make_owned_copies_shared() {
        let input = Arc::new(Mesh::with_counts(3, 0, 0, 0));
        let mut h = MeshHandle::shared(input.clone());
        let owned = h.make_owned();
        assert_ne!(owned.data_id(), input.data_id());
        assert!(!h.is_shared());
        // the pristine input was not consumed
        assert_eq!(Arc::strong_count(&input), 1);
    }

    #[test]
    fn into_arc_keeps_shared_identity() {
        let input = Arc::new(Mesh::with_counts(1, 0, 0, 0));
        let id = input.data_id();
        let arc = MeshHandle::shared(input).into_arc();
        assert_eq!(arc.data_id(), id);
    }
}
