//! One-time finalization of shared, modifier-less evaluated meshes.
//!
//! The same pristine input mesh can be instanced, without modifiers, by many
//! object instances at once, including from worker threads. First-time
//! finalization (normals + bounds) must then run exactly once. The guard is
//! a per-input-mesh gate with an explicit atomic state enum
//! (`Unstarted -> InProgress -> Done`) and a condition variable, a
//! double-checked pattern that leaves the invariant auditable: racers
//! observe either "not yet done" (and wait) or "fully done", never a partial
//! result.
//!
//! The finalization closure itself may dispatch nested parallel work (the
//! normal loops are rayon-parallel under that feature); it runs *outside*
//! the gate mutex, so holding the gate cannot deadlock against an outer
//! scheduler.

use crate::mesh::{Mesh, MeshDataId};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const UNSTARTED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

#[derive(Default)]
struct FinalizeGate {
    state: AtomicU8,
    lock: Mutex<()>,
    cond: Condvar,
}

static GATES: Lazy<DashMap<MeshDataId, Arc<FinalizeGate>>> = Lazy::new(DashMap::new);

/// Run `f` exactly once per `id` across all threads; concurrent callers
/// block until the winner finishes. Returns true iff this call ran `f`.
pub fn finalize_once<F: FnOnce()>(id: MeshDataId, f: F) -> bool {
    let gate = GATES.entry(id).or_default().clone();

    // fast path, no lock
    if gate.state.load(Ordering::Acquire) == DONE {
        return false;
    }
    let mut guard = gate.lock.lock();
    loop {
        match gate.state.load(Ordering::Acquire) {
            DONE => return false,
            IN_PROGRESS => {
                gate.cond.wait(&mut guard);
            }
            _ => {
                gate.state.store(IN_PROGRESS, Ordering::Release);
                // run the expensive work without holding the gate; nested
                // parallel dispatch inside `f` must not block other gates
                drop(guard);
                f();
                let _guard = gate.lock.lock();
                gate.state.store(DONE, Ordering::Release);
                gate.cond.notify_all();
                return true;
            }
        }
    }
}

/// Finalize a shared, modifier-less evaluated mesh: normals and bounds,
/// computed once, published through the mesh's lazy runtime cells.
pub fn finalize_shared_mesh(mesh: &Arc<Mesh>) {
    finalize_once(mesh.data_id(), || {
        let _ = mesh.face_normals();
        let _ = mesh.vert_normals();
        let _ = mesh.bounds();
    });
}

/// Drop the gate for `id`, typically when the mesh data block goes away.
pub fn discard_gate(id: MeshDataId) {
    GATES.remove(&id);
}
