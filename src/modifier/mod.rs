//! Modifier contracts: the capability tag, the vtable-like `Modifier`
//! trait, evaluation purpose/mode types and virtually-prepended deform
//! entries.
//!
//! Modifier algorithms live outside this crate; the evaluator consults each
//! instance only through this contract. The walker matches on the
//! capability tag, never on concrete type identity.

pub mod walker;

use crate::attr::AttrMask;
use crate::editmesh::EditMesh;
use crate::mesh::Mesh;
use crate::pipeline::GeometryComponent;
use std::fmt;
use std::sync::Arc;

/// Closed capability tag.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ModifierCaps {
    /// Only moves existing element positions; never changes counts.
    OnlyDeform,
    /// May change element counts and topology (and may also deform).
    Constructive,
}

/// What the evaluation is for.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EvalPurpose {
    Viewport,
    Render,
}

/// Mode of the object owning the stack.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjectMode {
    Object,
    Edit,
    Sculpt,
}

/// Sculpt-mode evaluation options; further narrow the admitted modifiers.
#[derive(Copy, Clone, Default, Debug)]
pub struct SculptOptions {
    /// Dynamic-topology sculpting: forbids all but deform-capable modifiers.
    pub dyntopo: bool,
    /// Scene setting: admit only deform modifiers while sculpting.
    pub only_deform: bool,
}

/// Required-mode bitmask: in which evaluation modes a modifier may run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ModeMask(u8);

impl ModeMask {
    pub const REALTIME: ModeMask = ModeMask(1);
    pub const RENDER: ModeMask = ModeMask(2);
    pub const EDITMODE: ModeMask = ModeMask(4);

    /// Realtime + render, the common default.
    pub const DEFAULT: ModeMask = ModeMask(1 | 2);

    #[inline]
    pub const fn contains(self, other: ModeMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ModeMask {
    type Output = ModeMask;

    fn bitor(self, rhs: ModeMask) -> ModeMask {
        ModeMask(self.0 | rhs.0)
    }
}

/// Per-invocation context handed to a modifier.
#[derive(Copy, Clone, Debug)]
pub struct ModifierContext {
    pub purpose: EvalPurpose,
    pub mode: ObjectMode,
    /// True while running against an orco/cloth-rest companion mesh; the
    /// modifier must not apply purpose-dependent deformation there.
    pub companion_pass: bool,
}

/// Result of a constructive invocation.
#[derive(Default)]
pub struct ModifierOutput {
    /// `Some` replaces the working mesh (the pipeline adopts it and
    /// releases the old one); `None` means the input was modified in place.
    pub replacement: Option<Mesh>,
    /// Non-mesh side outputs, appended to the run's geometry bundle.
    pub extra: Vec<GeometryComponent>,
}

/// The per-modifier evaluation contract.
///
/// Implementations declare capabilities and requirements; the pipeline
/// decides when and against what to invoke them. `deform` is only called
/// for `OnlyDeform`-capable modifiers, `modify` only for `Constructive`
/// ones.
pub trait Modifier: Send + Sync {
    fn name(&self) -> &str;

    fn caps(&self) -> ModifierCaps;

    /// Whether the user has this modifier enabled for `purpose`. A false
    /// here is an ordinary toggle, not a recorded skip.
    fn enabled(&self, _purpose: EvalPurpose) -> bool {
        true
    }

    /// Evaluation modes this modifier supports.
    fn required_mode(&self) -> ModeMask {
        ModeMask::DEFAULT
    }

    /// Extra attribute layers this modifier needs from upstream.
    fn required_data_mask(&self) -> AttrMask {
        AttrMask::EMPTY
    }

    /// Pipeline-scoped sticky requirements: layers this modifier forces to
    /// persist for all subsequent steps (e.g. a paint-preview color layer).
    fn sticky_mask(&self) -> AttrMask {
        AttrMask::EMPTY
    }

    /// Whether evaluated elements can be traced back to original ones
    /// through this modifier's output.
    fn supports_mapping(&self) -> bool {
        self.caps() == ModifierCaps::OnlyDeform
    }

    /// Requires the pristine input ordering; running after any constructive
    /// modifier is a recorded error.
    fn requires_original_data(&self) -> bool {
        false
    }

    /// Wrapper-native deform contract available (edit-mode fast path).
    fn supports_edit_deform(&self) -> bool {
        false
    }

    /// Multires modifiers report their subdivision level; sculpt mode
    /// handles them itself and the walker suppresses them silently.
    fn multires_level(&self) -> Option<u32> {
        None
    }

    /// Deform-only contract: mutate `positions` in place. `mesh` is the
    /// working mesh for topology/attribute reads only.
    fn deform(&self, _ctx: &ModifierContext, _mesh: &Mesh, _positions: &mut [[f32; 3]]) {}

    /// Wrapper-native deform contract, operating against the edit
    /// representation without forcing materialization.
    fn deform_edit(&self, _ctx: &ModifierContext, _edit: &EditMesh, _positions: &mut [[f32; 3]]) {}

    /// Constructive contract.
    fn modify(&self, _ctx: &ModifierContext, _mesh: &mut Mesh) -> ModifierOutput {
        ModifierOutput::default()
    }

    /// Free transient scratch data after a pass, success or not.
    fn free_scratch(&self) {}
}

/// Why a modifier was left out of a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Not supported in the current evaluation mode.
    DisabledInMode,
    /// Needs original input data but ran after a constructive modifier.
    RequiresOriginalData,
    /// Dynamic-topology sculpting admits only deform-capable modifiers.
    UnsupportedInDyntopo,
    /// Scene restricts sculpt-mode evaluation to deform modifiers.
    SculptOnlyDeform,
    /// Multires is handled by sculpt itself; suppressed pre-sculpt.
    MultiresPreSculpt,
    /// Caller needs original-index mapping this modifier cannot produce.
    NoMappingSupport,
}

/// A recorded, user-visible per-modifier skip. Never fatal to the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModifierWarning {
    pub modifier: String,
    pub reason: SkipReason,
}

impl fmt::Display for ModifierWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.reason {
            SkipReason::DisabledInMode => "not supported in this mode",
            SkipReason::RequiresOriginalData => {
                "requires original data, cannot run after a constructive modifier"
            }
            SkipReason::UnsupportedInDyntopo => "not supported in dyntopo sculpting",
            SkipReason::SculptOnlyDeform => "sculpt mode admits only deform modifiers",
            SkipReason::MultiresPreSculpt => "multires is applied by sculpt itself",
            SkipReason::NoMappingSupport => "cannot produce an original-index mapping",
        };
        write!(f, "modifier \"{}\" skipped: {}", self.modifier, what)
    }
}

/// Virtually-prepended deform entries derived from object state (shape-key
/// and armature-parent deform). They walk before the real list and follow
/// the same admission rules.
#[derive(Clone, Default)]
pub struct VirtualModifiers {
    mods: Vec<Arc<dyn Modifier>>,
}

impl VirtualModifiers {
    pub fn new() -> VirtualModifiers {
        VirtualModifiers::default()
    }

    pub fn push(&mut self, m: Arc<dyn Modifier>) {
        debug_assert_eq!(m.caps(), ModifierCaps::OnlyDeform);
        self.mods.push(m);
    }

    /// The prepended entries followed by the object's own list.
    pub fn chain(&self, real: &[Arc<dyn Modifier>]) -> Vec<Arc<dyn Modifier>> {
        self.mods.iter().chain(real.iter()).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }
}

/// Shape-key deform: blends vertex positions toward the key shape. The one
/// virtual modifier this crate ships, since its "algorithm" is a plain
/// interpolation owned by the evaluator.
pub struct ShapeKeyDeform {
    pub key_positions: Vec<[f32; 3]>,
    pub factor: f32,
}

impl Modifier for ShapeKeyDeform {
    fn name(&self) -> &str {
        "shape-key"
    }

    fn caps(&self) -> ModifierCaps {
        ModifierCaps::OnlyDeform
    }

    fn required_mode(&self) -> ModeMask {
        ModeMask::DEFAULT | ModeMask::EDITMODE
    }

    fn deform(&self, _ctx: &ModifierContext, _mesh: &Mesh, positions: &mut [[f32; 3]]) {
        if self.key_positions.len() != positions.len() {
            // count mismatch means the key is stale; leave positions alone
            return;
        }
        for (p, k) in positions.iter_mut().zip(&self.key_positions) {
            for axis in 0..3 {
                p[axis] += (k[axis] - p[axis]) * self.factor;
            }
        }
    }
}
