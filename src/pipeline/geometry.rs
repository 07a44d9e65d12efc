//! GeometryPipeline: the central orchestrator for object-mode evaluation.
//!
//! For a given input mesh and target attribute mask, this walks the enabled
//! modifier stack, invokes each modifier through its declared contract,
//! accumulates non-mesh side outputs, manages orco / cloth-rest companion
//! meshes, trims the attribute payload between steps, and finalizes
//! normals. No step may abort the run: per-modifier problems degrade to
//! recorded warnings and the pipeline always yields a valid mesh, at
//! minimum a copy of (or alias to) the pristine input.

use crate::attr::{AttrData, AttrDomain, AttrKind, AttrLayer, AttrMask};
use crate::debug_invariants::DebugInvariants;
use crate::mesh::{finalize, normals, uv_project, BoundBox, Mesh, MeshHandle};
use crate::modifier::walker::{self, Phase, WalkStep, WalkParams};
use crate::modifier::{
    EvalPurpose, Modifier, ModifierCaps, ModifierContext, ModifierWarning, ObjectMode,
    SculptOptions,
};
use crate::origindex;
use crate::pipeline::{GeometryBundle, GeometryComponent};
use log::{debug, trace};
use std::sync::Arc;

/// Inputs of one pipeline run.
#[derive(Clone, Debug)]
pub struct EvalParams {
    /// Attribute layers the caller needs on the result.
    pub mask: AttrMask,
    /// Caller needs original-index mapping through the whole stack.
    pub need_mapping: bool,
    /// Apply the leading deform phase at all.
    pub apply_deform: bool,
    /// Snapshot the standalone deform-only mesh after the leading phase.
    pub deform_only_copy: bool,
    /// Permit aliasing the pristine input when no modifier produced a mesh.
    pub allow_shared: bool,
    pub purpose: EvalPurpose,
    pub mode: ObjectMode,
    pub sculpt: SculptOptions,
    /// Snapshot positions into a rest-position attribute before deforming.
    pub add_rest_position: bool,
    /// Auto-smooth angle in radians; `None` means flat vertex smoothing.
    pub auto_smooth: Option<f32>,
}

impl EvalParams {
    /// Viewport defaults for the given mask.
    pub fn viewport(mask: AttrMask) -> EvalParams {
        EvalParams {
            mask,
            need_mapping: false,
            apply_deform: true,
            deform_only_copy: false,
            allow_shared: true,
            purpose: EvalPurpose::Viewport,
            mode: ObjectMode::Object,
            sculpt: SculptOptions::default(),
            add_rest_position: false,
            auto_smooth: None,
        }
    }
}

/// Everything one pipeline run produced.
#[derive(Debug)]
pub struct EvalOutput {
    pub bundle: GeometryBundle,
    /// The standalone deform-only mesh, when requested.
    pub deform_mesh: Option<Mesh>,
    /// Recorded per-modifier skips of this run.
    pub warnings: Vec<ModifierWarning>,
    /// Edit-mode cage; populated only by the edit pipeline.
    pub cage_mesh: Option<MeshHandle>,
    /// Final normal computation was left to the draw collaborator because
    /// the working mesh never left wrapper mode (edit pipeline only).
    pub deferred_finalize: bool,
}

impl EvalOutput {
    /// The primary evaluated mesh.
    #[inline]
    pub fn final_mesh(&self) -> &MeshHandle {
        &self.bundle.mesh
    }
}

/// Shared general-phase bookkeeping: companions, sticky requirements and
/// origin-index stamping. The edit pipeline drives the same state machine
/// over its wrapper-backed working mesh.
pub(crate) struct GeneralState<'a> {
    /// Pristine, undeformed source the companions spawn from.
    source: &'a Mesh,
    pub(crate) extra: Vec<GeometryComponent>,
    orco: Option<Mesh>,
    cloth: Option<Mesh>,
    /// Pipeline-scoped sticky requirements, grown by per-modifier
    /// exceptions; merged into every later narrowing mask.
    append_mask: AttrMask,
    origindex_stamped: bool,
}

impl<'a> GeneralState<'a> {
    pub(crate) fn new(source: &'a Mesh) -> GeneralState<'a> {
        GeneralState {
            source,
            extra: Vec::new(),
            orco: None,
            cloth: None,
            append_mask: AttrMask::EMPTY,
            origindex_stamped: false,
        }
    }

    /// Pre-invocation bookkeeping for one general-phase step: companion
    /// upkeep, lazy origin-index stamping, reference-UV generation and the
    /// copy-time narrowing mask (which is also recorded on `w`).
    pub(crate) fn prepare(
        &mut self,
        w: &mut Mesh,
        m: &dyn Modifier,
        step: &WalkStep,
        need_mapping: bool,
    ) -> AttrMask {
        let own_mask = m.required_data_mask();

        // Companions exist from the first step whose tail still needs them,
        // so their topology tracks the working mesh through constructive
        // steps ahead of the actual consumer. The positions are copied onto
        // the working mesh only when this step itself asks.
        if step.tail_mask.point.contains(AttrKind::Orco)
            || own_mask.point.contains(AttrKind::Orco)
        {
            let companion = self.orco.get_or_insert_with(|| bare_companion_of(self.source));
            if own_mask.point.contains(AttrKind::Orco) {
                copy_companion_positions(w, companion, AttrKind::Orco, false);
            }
        }
        if step.tail_mask.point.contains(AttrKind::ClothOrco)
            || own_mask.point.contains(AttrKind::ClothOrco)
        {
            let companion = self.cloth.get_or_insert_with(|| bare_companion_of(self.source));
            if own_mask.point.contains(AttrKind::ClothOrco) {
                copy_companion_positions(w, companion, AttrKind::ClothOrco, true);
            }
        }

        if step.caps == ModifierCaps::Constructive && !self.origindex_stamped {
            let tail_wants_mapping = origindex::TRACKED_DOMAINS
                .iter()
                .any(|&d| step.tail_mask.domain(d).contains(AttrKind::OrigIndex));
            if need_mapping || tail_wants_mapping {
                origindex::ensure_all(w);
                self.origindex_stamped = true;
                for d in origindex::TRACKED_DOMAINS {
                    self.append_mask.domain_mut(d).insert(AttrKind::OrigIndex);
                }
            }
        }

        if own_mask.corner.contains(AttrKind::UvOrig) {
            if let Err(e) = uv_project::ensure_uv_orig(w) {
                debug!("pipeline: reference UV generation failed: {e}");
            }
        }

        // narrow the payload surviving this step; a copy-time filter
        let narrow = step
            .tail_mask
            .merged(&own_mask)
            .merged(&self.append_mask)
            .merged(&AttrMask::BARE);
        narrow.restrict_copy_to(w);
        narrow
    }

    /// Invoke a constructive modifier against the working mesh and advance
    /// every live companion through it in its own evaluation context.
    pub(crate) fn run_constructive(
        &mut self,
        w: &mut Mesh,
        m: &dyn Modifier,
        ctx: &ModifierContext,
        narrow: &AttrMask,
    ) {
        trace!("pipeline: constructive `{}`", m.name());
        let out = m.modify(ctx, w);
        if let Some(mut next) = out.replacement {
            next.apply_copy_mask(narrow);
            // the old working mesh is owned here, never the pristine
            // input; dropping it is safe
            *w = next;
        }
        w.deformed_only = false;
        self.extra.extend(out.extra);

        let companion_ctx = ModifierContext {
            companion_pass: true,
            ..*ctx
        };
        let stamped = self.origindex_stamped;
        if let Some(companion) = self.orco.as_mut() {
            run_companion(m, &companion_ctx, companion, stamped);
        }
        if let Some(companion) = self.cloth.as_mut() {
            run_companion(m, &companion_ctx, companion, stamped);
        }
    }

    /// Post-invocation bookkeeping: fold sticky requirements in.
    pub(crate) fn finish_step(&mut self, m: &dyn Modifier) {
        self.append_mask.merge_from(&m.sticky_mask());
    }

    /// Undeformed coordinates for the final orco layer: the companion's
    /// positions when one tracked the stack, the pristine source otherwise.
    pub(crate) fn orco_positions(&self) -> Option<Vec<[f32; 3]>> {
        match &self.orco {
            Some(c) => c.positions().map(<[_]>::to_vec).ok(),
            None => self.source.positions().map(<[_]>::to_vec).ok(),
        }
    }
}

/// Evaluate `mods` over `input` under `params`.
pub fn evaluate(
    input: &Arc<Mesh>,
    mods: &[Arc<dyn Modifier>],
    params: &EvalParams,
) -> EvalOutput {
    let walk = WalkParams {
        purpose: params.purpose,
        mode: params.mode,
        sculpt: params.sculpt,
        need_mapping: params.need_mapping,
        apply_deform: params.apply_deform,
    };
    let plan = walker::plan(mods, &params.mask, &walk);
    debug!(
        "pipeline: {} steps admitted of {} modifiers ({} skips)",
        plan.steps.len(),
        mods.len(),
        plan.warnings.len()
    );

    let mut state = GeneralState::new(input);
    let mut deformed: Option<Vec<[f32; 3]>> = None;
    let mut working: Option<Mesh> = None;
    let mut deform_mesh: Option<Mesh> = None;

    for step in &plan.steps {
        let m = &mods[step.index];
        let ctx = ModifierContext {
            purpose: params.purpose,
            mode: params.mode,
            companion_pass: false,
        };
        match step.phase {
            Phase::Deform => {
                trace!("pipeline: deform `{}`", m.name());
                let pos = deformed.get_or_insert_with(|| {
                    input.positions().map(<[_]>::to_vec).unwrap_or_default()
                });
                m.deform(&ctx, input, pos);
            }
            Phase::General => {
                // the leading phase is over; snapshot its result once
                if deform_mesh.is_none() && params.deform_only_copy && params.apply_deform {
                    deform_mesh = Some(deform_snapshot(input, deformed.as_deref(), params));
                }
                if working.is_none() {
                    working = Some(materialize_working(input, deformed.take(), params));
                }
                let w = working.as_mut().expect("materialized above");
                let narrow = state.prepare(w, m.as_ref(), step, params.need_mapping);
                match step.caps {
                    ModifierCaps::OnlyDeform => {
                        trace!("pipeline: late deform `{}`", m.name());
                        let Ok(mut pos) = w.positions().map(<[_]>::to_vec) else {
                            continue;
                        };
                        m.deform(&ctx, w, &mut pos);
                        w.set_positions(pos);
                    }
                    ModifierCaps::Constructive => {
                        state.run_constructive(w, m.as_ref(), &ctx, &narrow);
                    }
                }
                state.finish_step(m.as_ref());
            }
        }
    }

    // a stack of pure deform still yields the snapshot
    if deform_mesh.is_none() && params.deform_only_copy && params.apply_deform {
        deform_mesh = Some(deform_snapshot(input, deformed.as_deref(), params));
    }

    // requests an aliased, immutable input cannot satisfy: a corner-normal
    // layer (explicit or via auto-smooth) and the orco layer both have to
    // be written onto the result
    let needs_owned_result = params.mask.corner.contains(AttrKind::CornerNormal)
        || params.auto_smooth.is_some()
        || params.mask.point.contains(AttrKind::Orco);

    // no modifier produced a mesh: alias the input or copy it once
    let mut final_mesh = if let Some(w) = working.take() {
        MeshHandle::owned(w)
    } else if deformed.is_some() {
        MeshHandle::owned(materialize_working(input, deformed.take(), params))
    } else if params.allow_shared && !needs_owned_result {
        debug!("pipeline: aliasing pristine input");
        MeshHandle::shared(input.clone())
    } else {
        MeshHandle::owned(input.copy_for_eval())
    };

    // top-level orco request: stamp undeformed coordinates, normalized to
    // the input's local texture space, onto the results
    if params.mask.point.contains(AttrKind::Orco) && !final_mesh.is_shared() {
        if let Some(orco) = state.orco_positions() {
            let texspace = *input.bounds();
            let owned = final_mesh.make_owned();
            stamp_orco(owned, &orco, &texspace);
            if let Some(dm) = deform_mesh.as_mut() {
                stamp_orco(dm, &orco, &texspace);
            }
        }
    }

    match &mut final_mesh {
        MeshHandle::Owned(m) => {
            // strictly-temporary support layers must not reach later stages
            m.free_temporary_layers();
            normals::finalize_eval_mesh(m, &params.mask, params.auto_smooth);
            m.debug_assert_invariants();
        }
        MeshHandle::Shared(m) => {
            finalize::finalize_shared_mesh(m);
        }
    }
    if let Some(dm) = deform_mesh.as_mut() {
        normals::finalize_eval_mesh(dm, &AttrMask::BARE, params.auto_smooth);
    }

    plan.free_scratch(mods);

    EvalOutput {
        bundle: GeometryBundle {
            mesh: final_mesh,
            extra: state.extra,
        },
        deform_mesh,
        warnings: plan.warnings,
        cage_mesh: None,
        deferred_finalize: false,
    }
}

/// Copy of the input carrying the leading-deform result, marked
/// deform-only.
fn deform_snapshot(input: &Mesh, deformed: Option<&[[f32; 3]]>, params: &EvalParams) -> Mesh {
    let mut mesh = materialize_working(input, deformed.map(<[_]>::to_vec), params);
    mesh.deformed_only = true;
    mesh
}

/// Copy-for-eval of the input, with deformed positions written in and the
/// rest-position snapshot added exactly once, before any modifier ran.
fn materialize_working(
    input: &Mesh,
    deformed: Option<Vec<[f32; 3]>>,
    params: &EvalParams,
) -> Mesh {
    let mut mesh = input.copy_for_eval();
    if params.add_rest_position && params.apply_deform {
        if let Ok(rest) = input.positions().map(<[_]>::to_vec) {
            mesh.table_mut(AttrDomain::Point).add_layer(AttrLayer {
                kind: AttrKind::RestPosition,
                name: "rest_position".into(),
                temporary: false,
                data: AttrData::Vec3(rest),
            });
        }
    }
    if let Some(pos) = deformed {
        mesh.set_positions(pos);
    }
    mesh
}

/// Positions-only companion copy of the pristine source.
fn bare_companion_of(source: &Mesh) -> Mesh {
    let mut companion = source.copy_for_eval();
    companion.apply_copy_mask(&AttrMask::EMPTY); // bare skeleton only
    companion
}

/// Copy the companion's current positions onto `mesh` as `kind`.
fn copy_companion_positions(mesh: &mut Mesh, companion: &Mesh, kind: AttrKind, temporary: bool) {
    let Ok(positions) = companion.positions() else {
        return;
    };
    if positions.len() != mesh.points_num() {
        debug!(
            "pipeline: companion {}-vert mesh out of sync with working {}-vert mesh",
            positions.len(),
            mesh.points_num()
        );
        return;
    }
    let data = positions.to_vec();
    mesh.table_mut(AttrDomain::Point).add_layer(AttrLayer {
        kind,
        name: match kind {
            AttrKind::ClothOrco => ".cloth_orco".into(),
            _ => ".orco".into(),
        },
        temporary,
        data: AttrData::Vec3(data),
    });
}

/// Run a constructive modifier against a companion mesh in its own
/// evaluation context so texture-space coordinates stay undeformed.
fn run_companion(
    m: &dyn Modifier,
    ctx: &ModifierContext,
    companion: &mut Mesh,
    origindex_stamped: bool,
) {
    if origindex_stamped {
        origindex::ensure_all(companion);
    }
    let mut narrow = AttrMask::BARE;
    if origindex_stamped {
        for d in origindex::TRACKED_DOMAINS {
            narrow.domain_mut(d).insert(AttrKind::OrigIndex);
        }
    }
    narrow.restrict_copy_to(companion);
    let out = m.modify(ctx, companion);
    if let Some(mut next) = out.replacement {
        next.apply_copy_mask(&narrow);
        *companion = next;
    }
    companion.deformed_only = false;
}

/// Minimum half-extent of a texture-space axis; flat axes map to zero.
const TEXSPACE_MIN_HALF: f32 = 1e-5;

/// Stamp orco coordinates onto an evaluated mesh, normalized into the
/// source's local texture space (center at the origin, half extents
/// scaled to one).
pub(crate) fn stamp_orco(mesh: &mut Mesh, orco: &[[f32; 3]], texspace: &BoundBox) {
    if orco.len() != mesh.points_num() {
        debug!(
            "pipeline: orco source has {} verts, result has {}; skipped",
            orco.len(),
            mesh.points_num()
        );
        return;
    }
    let loc = texspace.center();
    let data = orco
        .iter()
        .map(|p| {
            let mut q = [0.0f32; 3];
            for axis in 0..3 {
                let half = ((texspace.max[axis] - texspace.min[axis]) * 0.5)
                    .max(TEXSPACE_MIN_HALF);
                q[axis] = (p[axis] - loc[axis]) / half;
            }
            q
        })
        .collect();
    mesh.table_mut(AttrDomain::Point).add_layer(AttrLayer {
        kind: AttrKind::Orco,
        name: ".orco".into(),
        temporary: false,
        data: AttrData::Vec3(data),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_bounds() -> BoundBox {
        BoundBox {
            min: [0.0, 0.0, 0.0],
            max: [2.0, 1.0, 0.0],
        }
    }

    #[test]
    fn orco_normalizes_against_the_texture_space() {
        let mut m = Mesh::from_arrays(
            vec![[0.0, 0.0, 0.0], [2.0, 1.0, 0.0]],
            vec![[0, 1]],
            vec![],
            vec![],
        )
        .unwrap();
        let orco = m.positions().unwrap().to_vec();
        stamp_orco(&mut m, &orco, &quad_bounds());
        let layer = m.table(AttrDomain::Point).vec3(AttrKind::Orco).unwrap();
        assert_eq!(layer[0], [-1.0, -1.0, 0.0]);
        assert_eq!(layer[1], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn orco_stamp_skips_on_count_mismatch() {
        let mut m = Mesh::with_counts(3, 0, 0, 0);
        stamp_orco(&mut m, &[[0.0; 3]; 2], &quad_bounds());
        assert!(!m.table(AttrDomain::Point).has(AttrKind::Orco));
    }
}
