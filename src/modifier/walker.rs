//! The modifier-stack walker: admission predicates and the
//! `LeadingDeform -> General` state machine.
//!
//! Walking is a planning pass: it yields the ordered, admitted steps with
//! their phases and precomputed tail masks, plus the recorded skips. The
//! pipeline then executes the plan strictly in order; later modifiers may
//! depend on layers only a prior one created, so there is no reordering.

use crate::attr::AttrMask;
use crate::modifier::{
    EvalPurpose, ModeMask, Modifier, ModifierCaps, ModifierWarning, ObjectMode, SculptOptions,
    SkipReason,
};
use log::{trace, warn};
use std::sync::Arc;

/// Caller-side inputs deciding which modifiers are admitted.
#[derive(Copy, Clone, Debug)]
pub struct WalkParams {
    pub purpose: EvalPurpose,
    pub mode: ObjectMode,
    /// Only consulted when `mode == Sculpt`.
    pub sculpt: SculptOptions,
    /// Caller needs original-index mapping through the whole stack.
    pub need_mapping: bool,
    /// Deform application was requested; without it, deform-only modifiers
    /// are left out entirely.
    pub apply_deform: bool,
}

/// Which contract the pipeline invokes for a step.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Leading run: mutate the positions array in place, no count changes.
    Deform,
    /// Anything after the leading run; topology may change.
    General,
}

/// One admitted modifier, in stack order.
#[derive(Clone, Debug)]
pub struct WalkStep {
    /// Index into the walked modifier list.
    pub index: usize,
    pub phase: Phase,
    pub caps: ModifierCaps,
    /// Union of the caller's requested mask and every later admitted
    /// modifier's declared requirement: what must survive past this step.
    pub tail_mask: AttrMask,
}

/// The ordered plan plus the skips recorded while building it.
#[derive(Default)]
pub struct WalkPlan {
    pub steps: Vec<WalkStep>,
    pub warnings: Vec<ModifierWarning>,
}

impl WalkPlan {
    /// True iff any admitted step can change topology.
    pub fn has_constructive(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.caps == ModifierCaps::Constructive)
    }

    /// Free every visited modifier's transient scratch data. Called after
    /// the pass completes, success or not.
    pub fn free_scratch(&self, mods: &[Arc<dyn Modifier>]) {
        for step in &self.steps {
            mods[step.index].free_scratch();
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum WalkState {
    LeadingDeform,
    General,
}

/// Build the evaluation plan for `mods` under `params`.
///
/// Any previously recorded skip state is implicitly cleared: the returned
/// warnings are exactly this pass's skips.
pub fn plan(mods: &[Arc<dyn Modifier>], requested: &AttrMask, params: &WalkParams) -> WalkPlan {
    let mut out = WalkPlan::default();
    let mut state = WalkState::LeadingDeform;
    let mut constructive_seen = false;

    let mut mode_bits = match params.purpose {
        EvalPurpose::Render => ModeMask::RENDER,
        EvalPurpose::Viewport => ModeMask::REALTIME,
    };
    if params.mode == ObjectMode::Edit {
        mode_bits = mode_bits | ModeMask::EDITMODE;
    }

    for (index, m) in mods.iter().enumerate() {
        // plain user toggle: invisible, no warning, no state flip
        if !m.enabled(params.purpose) {
            trace!("walker: `{}` disabled, skipped", m.name());
            continue;
        }

        if !m.required_mode().contains(mode_bits) {
            out.record(m.as_ref(), SkipReason::DisabledInMode);
            state = WalkState::General;
            continue;
        }

        if params.mode == ObjectMode::Sculpt {
            if let Some(level) = m.multires_level() {
                // sculpt applies multires itself. At level zero the user
                // sees geometry with no subdivision at all, which deserves
                // a visible warning; higher levels are routine.
                if level == 0 {
                    out.record(m.as_ref(), SkipReason::MultiresPreSculpt);
                } else {
                    trace!("walker: `{}` suppressed pre-sculpt", m.name());
                }
                state = WalkState::General;
                continue;
            }
            if params.sculpt.dyntopo && m.caps() != ModifierCaps::OnlyDeform {
                out.record(m.as_ref(), SkipReason::UnsupportedInDyntopo);
                state = WalkState::General;
                continue;
            }
            if params.sculpt.only_deform && m.caps() != ModifierCaps::OnlyDeform {
                out.record(m.as_ref(), SkipReason::SculptOnlyDeform);
                state = WalkState::General;
                continue;
            }
        }

        if params.need_mapping && !m.supports_mapping() {
            trace!("walker: `{}` skipped, no mapping support", m.name());
            continue;
        }

        if m.requires_original_data() && constructive_seen {
            out.record(m.as_ref(), SkipReason::RequiresOriginalData);
            continue;
        }

        if m.caps() == ModifierCaps::OnlyDeform && !params.apply_deform {
            trace!("walker: `{}` skipped, deform not requested", m.name());
            continue;
        }

        let phase = if state == WalkState::LeadingDeform
            && m.caps() == ModifierCaps::OnlyDeform
            && params.apply_deform
        {
            Phase::Deform
        } else {
            state = WalkState::General;
            if m.caps() == ModifierCaps::Constructive {
                constructive_seen = true;
            }
            Phase::General
        };
        out.steps.push(WalkStep {
            index,
            phase,
            caps: m.caps(),
            tail_mask: AttrMask::EMPTY, // filled below
        });
    }

    // tail masks, back to front: what the request plus every later admitted
    // modifier still needs after each step
    let mut running = *requested;
    for step in out.steps.iter_mut().rev() {
        step.tail_mask = running;
        running.merge_from(&mods[step.index].required_data_mask());
    }

    out
}

impl WalkPlan {
    fn record(&mut self, m: &dyn Modifier, reason: SkipReason) {
        let warning = ModifierWarning {
            modifier: m.name().to_owned(),
            reason,
        };
        warn!("{warning}");
        self.warnings.push(warning);
    }
}
