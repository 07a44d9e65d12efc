//! Edit-mode pipeline: wrapper-backed evaluation with cage capture.
//!
//! Edit-mode evaluation differs from object mode in three ways. The working
//! mesh starts as a wrapper around the edit representation and is only
//! materialized into plain arrays when a modifier actually needs them; a
//! second "cage" result is captured partway through the stack so tools can
//! snap to a chosen intermediate state; and when the wrapper never leaves
//! edit backing, normal computation is deferred to the draw code that
//! consumes the edit representation directly. The general phase itself is
//! the same state machine the object pipeline runs: companions, sticky
//! requirements, origin-index stamping and reference-UV generation all
//! behave identically here.

use crate::attr::{AttrKind, AttrMask};
use crate::debug_invariants::DebugInvariants;
use crate::editmesh::EditMesh;
use crate::eval_error::EvalError;
use crate::mesh::{normals, Mesh, MeshHandle, MeshWrapper};
use crate::modifier::walker::{self, WalkParams};
use crate::modifier::{Modifier, ModifierCaps, ModifierContext, ObjectMode};
use crate::pipeline::geometry::{self, EvalOutput, EvalParams, GeneralState};
use crate::pipeline::GeometryBundle;
use log::{debug, trace};
use std::sync::Arc;

/// Evaluate `mods` over the edit representation `em`.
///
/// `cage_index` is the number of leading stack entries included in the cage
/// result: `0` means the unmodified edit geometry, `mods.len()` (or more)
/// means the cage aliases the final result.
///
/// # Errors
///
/// A deform-only snapshot cannot be produced from edit data; requesting one
/// is [`EvalError::DeformOnlyInEditMode`].
pub fn evaluate_edit(
    em: &Arc<EditMesh>,
    mods: &[Arc<dyn Modifier>],
    params: &EvalParams,
    cage_index: usize,
) -> Result<EvalOutput, EvalError> {
    if params.deform_only_copy {
        return Err(EvalError::DeformOnlyInEditMode);
    }

    let walk = WalkParams {
        purpose: params.purpose,
        mode: ObjectMode::Edit,
        sculpt: params.sculpt,
        need_mapping: params.need_mapping,
        apply_deform: params.apply_deform,
    };
    let plan = walker::plan(mods, &params.mask, &walk);
    debug!(
        "edit pipeline: {} steps admitted of {} modifiers, cage at {}",
        plan.steps.len(),
        mods.len(),
        cage_index
    );

    // pristine materialized source for companions and the orco stamp
    let source = em.to_mesh();
    let mut state = GeneralState::new(&source);
    let mut working = Mesh::wrap_edit(em.clone());
    let mut cage: Option<Mesh> = None;

    if cage_index == 0 {
        // cage is the untouched edit geometry
        cage = Some(working.clone());
    }

    for step in &plan.steps {
        if cage.is_none() && step.index >= cage_index {
            // everything before the cage point has been applied
            cage = Some(working.clone());
        }
        let m = &mods[step.index];
        let ctx = ModifierContext {
            purpose: params.purpose,
            mode: ObjectMode::Edit,
            companion_pass: false,
        };
        match step.caps {
            ModifierCaps::OnlyDeform => {
                if working.wrapper() == MeshWrapper::EditData && m.supports_edit_deform() {
                    trace!("edit pipeline: wrapper deform `{}`", m.name());
                    let _ = state.prepare(&mut working, m.as_ref(), step, params.need_mapping);
                    // prior deform results live in the wrapper's position
                    // layer; fall back to the pristine edit coordinates
                    let mut pos = match working.positions() {
                        Ok(p) => p.to_vec(),
                        Err(_) => em.positions().to_vec(),
                    };
                    m.deform_edit(&ctx, em, &mut pos);
                    working.set_positions(pos);
                } else {
                    trace!("edit pipeline: materialized deform `{}`", m.name());
                    working.ensure_mdata()?;
                    let _ = state.prepare(&mut working, m.as_ref(), step, params.need_mapping);
                    let mut pos = working.positions()?.to_vec();
                    m.deform(&ctx, &working, &mut pos);
                    working.set_positions(pos);
                }
            }
            ModifierCaps::Constructive => {
                working.ensure_mdata()?;
                let narrow = state.prepare(&mut working, m.as_ref(), step, params.need_mapping);
                state.run_constructive(&mut working, m.as_ref(), &ctx, &narrow);
            }
        }
        state.finish_step(m.as_ref());
    }
    plan.free_scratch(mods);

    // never finalized here: wrapper-backed results keep their data in the
    // edit representation and the draw code computes normals from it
    let deferred_finalize = working.wrapper() == MeshWrapper::EditData;
    if !deferred_finalize {
        if params.mask.point.contains(AttrKind::Orco) {
            if let Some(orco) = state.orco_positions() {
                let texspace = *source.bounds();
                geometry::stamp_orco(&mut working, &orco, &texspace);
            }
        }
        working.free_temporary_layers();
        normals::finalize_eval_mesh(&mut working, &params.mask, params.auto_smooth);
        working.debug_assert_invariants();
    }
    if let Some(c) = cage.as_mut() {
        if c.wrapper() == MeshWrapper::MeshData {
            normals::finalize_eval_mesh(c, &AttrMask::BARE, params.auto_smooth);
        }
    }

    let (final_mesh, cage_mesh) = match cage {
        Some(c) => (MeshHandle::owned(working), MeshHandle::owned(c)),
        None => {
            // cage point at or past the end of the stack: both results are
            // one mesh, expressed as two handles on a shared allocation
            let shared = Arc::new(working);
            (
                MeshHandle::shared(shared.clone()),
                MeshHandle::shared(shared),
            )
        }
    };

    Ok(EvalOutput {
        bundle: GeometryBundle {
            mesh: final_mesh,
            extra: state.extra,
        },
        deform_mesh: None,
        warnings: plan.warnings,
        cage_mesh: Some(cage_mesh),
        deferred_finalize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{ModeMask, ModifierOutput};

    struct Nudge {
        dz: f32,
        wrapper_native: bool,
    }

    impl Modifier for Nudge {
        fn name(&self) -> &str {
            "nudge"
        }
        fn caps(&self) -> ModifierCaps {
            ModifierCaps::OnlyDeform
        }
        fn required_mode(&self) -> ModeMask {
            ModeMask::DEFAULT | ModeMask::EDITMODE
        }
        fn supports_edit_deform(&self) -> bool {
            self.wrapper_native
        }
        fn deform(&self, _ctx: &ModifierContext, _mesh: &Mesh, positions: &mut [[f32; 3]]) {
            for p in positions {
                p[2] += self.dz;
            }
        }
        fn deform_edit(
            &self,
            _ctx: &ModifierContext,
            _edit: &EditMesh,
            positions: &mut [[f32; 3]],
        ) {
            for p in positions {
                p[2] += self.dz;
            }
        }
    }

    struct AppendPoint;

    impl Modifier for AppendPoint {
        fn name(&self) -> &str {
            "append-point"
        }
        fn caps(&self) -> ModifierCaps {
            ModifierCaps::Constructive
        }
        fn required_mode(&self) -> ModeMask {
            ModeMask::DEFAULT | ModeMask::EDITMODE
        }
        fn modify(&self, _ctx: &ModifierContext, mesh: &mut Mesh) -> ModifierOutput {
            let mut pos = mesh.positions().unwrap().to_vec();
            pos.push([9.0, 9.0, 9.0]);
            let next = Mesh::from_arrays(pos, vec![], vec![], vec![]).unwrap();
            ModifierOutput {
                replacement: Some(next),
                extra: Vec::new(),
            }
        }
    }

    fn tri() -> Arc<EditMesh> {
        Arc::new(EditMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![0, 1, 2],
            vec![0],
        ))
    }

    fn params() -> EvalParams {
        EvalParams {
            mode: ObjectMode::Edit,
            ..EvalParams::viewport(AttrMask::BARE)
        }
    }

    #[test]
    fn deform_only_request_is_rejected() {
        let mut p = params();
        p.deform_only_copy = true;
        let e = evaluate_edit(&tri(), &[], &p, 0).unwrap_err();
        assert!(matches!(e, EvalError::DeformOnlyInEditMode));
    }

    #[test]
    fn wrapper_deform_defers_finalization() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(Nudge {
            dz: 1.0,
            wrapper_native: true,
        })];
        let out = evaluate_edit(&tri(), &mods, &params(), mods.len()).unwrap();
        assert!(out.deferred_finalize);
        assert_eq!(out.final_mesh().wrapper(), MeshWrapper::EditData);
        assert_eq!(out.final_mesh().positions().unwrap()[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn non_native_deform_materializes() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(Nudge {
            dz: 2.0,
            wrapper_native: false,
        })];
        let out = evaluate_edit(&tri(), &mods, &params(), mods.len()).unwrap();
        assert!(!out.deferred_finalize);
        assert_eq!(out.final_mesh().wrapper(), MeshWrapper::MeshData);
        assert_eq!(out.final_mesh().positions().unwrap()[1], [1.0, 0.0, 2.0]);
    }

    #[test]
    fn cage_zero_is_the_unmodified_geometry() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(Nudge {
            dz: 5.0,
            wrapper_native: true,
        })];
        let out = evaluate_edit(&tri(), &mods, &params(), 0).unwrap();
        let cage = out.cage_mesh.as_ref().unwrap();
        assert!(cage.positions().is_err()); // untouched wrapper, no layer yet
        assert_eq!(out.final_mesh().positions().unwrap()[0][2], 5.0);
    }

    #[test]
    fn cage_excludes_later_modifiers() {
        let mods: Vec<Arc<dyn Modifier>> = vec![
            Arc::new(Nudge {
                dz: 1.0,
                wrapper_native: true,
            }),
            Arc::new(Nudge {
                dz: 10.0,
                wrapper_native: true,
            }),
        ];
        let out = evaluate_edit(&tri(), &mods, &params(), 1).unwrap();
        let cage = out.cage_mesh.as_ref().unwrap();
        assert_eq!(cage.positions().unwrap()[0][2], 1.0);
        assert_eq!(out.final_mesh().positions().unwrap()[0][2], 11.0);
    }

    #[test]
    fn cage_past_the_end_aliases_the_result() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(Nudge {
            dz: 1.0,
            wrapper_native: true,
        })];
        let out = evaluate_edit(&tri(), &mods, &params(), mods.len()).unwrap();
        let cage = out.cage_mesh.as_ref().unwrap();
        assert!(cage.is_shared());
        assert_eq!(cage.data_id(), out.final_mesh().data_id());
    }

    #[test]
    fn constructive_forces_materialization() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(AppendPoint)];
        let out = evaluate_edit(&tri(), &mods, &params(), 0).unwrap();
        assert!(!out.deferred_finalize);
        assert_eq!(out.final_mesh().points_num(), 4);
        assert!(!out.final_mesh().deformed_only);
    }

    #[test]
    fn materialized_result_carries_requested_orco() {
        let mods: Vec<Arc<dyn Modifier>> = vec![Arc::new(AppendPoint)];
        let mut p = params();
        p.mask.point.insert(AttrKind::Orco);
        let out = evaluate_edit(&tri(), &mods, &p, 0).unwrap();
        // companion tracked the constructive step, so counts line up
        let orco = out
            .final_mesh()
            .table(crate::attr::AttrDomain::Point)
            .vec3(AttrKind::Orco)
            .unwrap();
        assert_eq!(orco.len(), 4);
    }
}
