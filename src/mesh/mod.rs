//! The evaluated mesh value and its derived-data machinery: bounds,
//! normals, triangulation, the owned/shared handle, and the shared
//! finalization gate.

pub mod bounds;
pub mod core;
pub mod finalize;
pub mod handle;
pub mod normals;
pub mod uv_project;

pub use bounds::BoundBox;
pub use core::{Mesh, MeshDataId, MeshWrapper};
pub use handle::MeshHandle;

/// Anything that caches derived mesh data (bounds, normals, triangulation, …)
/// should implement this.
pub trait InvalidateCache {
    /// Invalidate *all* internal caches so future queries recompute correctly.
    fn invalidate_cache(&mut self);
}

// Blanket impl for Box<T>
impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}
