//! Per-object evaluation cache.
//!
//! An object owns a pristine mesh, a modifier stack, and the cached result
//! of the last pipeline run. Requests are served from the cache when the
//! cached attribute mask is a superset of the requested one; a miss reruns
//! the whole pipeline with the union of the old and new masks, so the
//! cached mask only ever grows until [`ObjectEval::invalidate`] resets it.

use crate::attr::AttrMask;
use crate::editmesh::EditMesh;
use crate::eval_error::EvalError;
use crate::mesh::Mesh;
use crate::modifier::{
    EvalPurpose, Modifier, ModifierWarning, ObjectMode, SculptOptions, VirtualModifiers,
};
use crate::pipeline::geometry::{self, EvalOutput, EvalParams};
use crate::pipeline::{editmode, GeometryComponent};
use log::debug;
use std::sync::Arc;

/// An object with a modifier stack, as the evaluator sees it.
pub struct Object {
    pub name: String,
    /// Pristine mesh data; never mutated by evaluation.
    pub data: Arc<Mesh>,
    /// Edit representation, present while the object is in edit mode.
    pub edit: Option<Arc<EditMesh>>,
    pub modifiers: Vec<Arc<dyn Modifier>>,
    /// Deform entries prepended ahead of the real stack (shape key etc.).
    pub virtual_modifiers: VirtualModifiers,
    pub mode: ObjectMode,
    pub sculpt: SculptOptions,
    /// Snapshot rest positions into an attribute before deforming.
    pub add_rest_position: bool,
    pub auto_smooth: Option<f32>,
    /// Number of leading stack entries included in the edit cage.
    pub cage_index: usize,
}

impl Object {
    pub fn new(name: impl Into<String>, data: Arc<Mesh>) -> Object {
        Object {
            name: name.into(),
            data,
            edit: None,
            modifiers: Vec::new(),
            virtual_modifiers: VirtualModifiers::new(),
            mode: ObjectMode::Object,
            sculpt: SculptOptions::default(),
            add_rest_position: false,
            auto_smooth: None,
            cage_index: 0,
        }
    }

    /// Virtual entries followed by the real stack.
    fn full_stack(&self) -> Vec<Arc<dyn Modifier>> {
        self.virtual_modifiers.chain(&self.modifiers)
    }
}

/// Cached artifacts of the last pipeline run.
struct MeshEvalCache {
    valid: bool,
    last_mask: AttrMask,
    /// Cage requests carry their own mask: a wide final request must not
    /// hide a cage layer that was never asked for, and a wide cage request
    /// must not inflate every later final rebuild.
    last_mask_edit: AttrMask,
    last_need_mapping: bool,
    last_deform_copy: bool,
    final_mesh: Option<Arc<Mesh>>,
    deform_mesh: Option<Arc<Mesh>>,
    cage_mesh: Option<Arc<Mesh>>,
    extra: Vec<GeometryComponent>,
    warnings: Vec<ModifierWarning>,
    deferred_finalize: bool,
    runs: u64,
}

impl MeshEvalCache {
    fn new() -> MeshEvalCache {
        MeshEvalCache {
            valid: false,
            last_mask: AttrMask::EMPTY,
            last_mask_edit: AttrMask::EMPTY,
            last_need_mapping: false,
            last_deform_copy: false,
            final_mesh: None,
            deform_mesh: None,
            cage_mesh: None,
            extra: Vec::new(),
            warnings: Vec::new(),
            deferred_finalize: false,
            runs: 0,
        }
    }

    /// Can the cached run serve this final/deform request?
    fn satisfies(&self, mask: &AttrMask, need_mapping: bool, deform_copy: bool) -> bool {
        self.valid
            && self.last_mask.contains(mask)
            && (!need_mapping || self.last_need_mapping)
            && (!deform_copy || self.last_deform_copy)
    }

    /// Can the cached run serve this cage request?
    fn satisfies_cage(&self, mask: &AttrMask) -> bool {
        self.valid && self.last_mask_edit.contains(mask)
    }
}

/// An object plus its evaluation cache. The `get_*` accessors serve from
/// the cache; the `create_eval_*` constructors always run the pipeline and
/// leave the cache untouched.
pub struct ObjectEval {
    pub object: Object,
    cache: MeshEvalCache,
}

impl ObjectEval {
    pub fn new(object: Object) -> ObjectEval {
        ObjectEval {
            object,
            cache: MeshEvalCache::new(),
        }
    }

    fn params(&self, mask: AttrMask, need_mapping: bool, deform_copy: bool) -> EvalParams {
        EvalParams {
            mask,
            need_mapping,
            apply_deform: true,
            deform_only_copy: deform_copy,
            allow_shared: true,
            purpose: EvalPurpose::Viewport,
            mode: self.object.mode,
            sculpt: self.object.sculpt,
            add_rest_position: self.object.add_rest_position,
            auto_smooth: self.object.auto_smooth,
        }
    }

    /// Rerun the pipeline so the cache covers `mask` (and the flags), with
    /// the cached mask growing monotonically across misses.
    fn ensure(
        &mut self,
        mask: &AttrMask,
        need_mapping: bool,
        deform_copy: bool,
    ) -> Result<(), EvalError> {
        if self.cache.satisfies(mask, need_mapping, deform_copy) {
            return Ok(());
        }
        let mut full_mask = *mask;
        let mut edit_mask = AttrMask::EMPTY;
        let mut full_mapping = need_mapping;
        let mut full_deform = deform_copy;
        if self.cache.valid {
            // a miss widens, never narrows, what the cache holds
            full_mask.merge_from(&self.cache.last_mask);
            edit_mask = self.cache.last_mask_edit;
            full_mapping |= self.cache.last_need_mapping;
            full_deform |= self.cache.last_deform_copy;
        }
        self.rebuild(full_mask, edit_mask, full_mapping, full_deform)
    }

    /// Like [`ObjectEval::ensure`], but for the cage's own mask; the final
    /// mask and flags of the cached run are carried over unchanged.
    fn ensure_cage(&mut self, mask: &AttrMask) -> Result<(), EvalError> {
        if self.cache.satisfies_cage(mask) {
            return Ok(());
        }
        let mut edit_mask = *mask;
        let mut full_mask = AttrMask::BARE;
        let mut full_mapping = false;
        let mut full_deform = false;
        if self.cache.valid {
            edit_mask.merge_from(&self.cache.last_mask_edit);
            full_mask = self.cache.last_mask;
            full_mapping = self.cache.last_need_mapping;
            full_deform = self.cache.last_deform_copy;
        }
        self.rebuild(full_mask, edit_mask, full_mapping, full_deform)
    }

    /// One pipeline run covering both the final and the cage mask; the
    /// artifacts replace the cache atomically.
    fn rebuild(
        &mut self,
        full_mask: AttrMask,
        edit_mask: AttrMask,
        full_mapping: bool,
        full_deform: bool,
    ) -> Result<(), EvalError> {
        debug!(
            "object `{}`: cache miss, rebuilding (run {})",
            self.object.name,
            self.cache.runs + 1
        );

        let mods = self.object.full_stack();
        let run_mask = full_mask.merged(&edit_mask);
        let params = self.params(run_mask, full_mapping, full_deform);
        let out = if self.object.mode == ObjectMode::Edit {
            let edit = self.object.edit.clone().ok_or(EvalError::MissingEditData)?;
            editmode::evaluate_edit(&edit, &mods, &params, self.object.cage_index)?
        } else {
            geometry::evaluate(&self.object.data, &mods, &params)
        };

        let EvalOutput {
            bundle,
            deform_mesh,
            warnings,
            cage_mesh,
            deferred_finalize,
        } = out;
        self.cache.final_mesh = Some(bundle.mesh.into_arc());
        self.cache.extra = bundle.extra;
        self.cache.deform_mesh = deform_mesh.map(Arc::new);
        self.cache.cage_mesh = cage_mesh.map(|h| h.into_arc());
        self.cache.warnings = warnings;
        self.cache.deferred_finalize = deferred_finalize;
        self.cache.last_mask = full_mask;
        self.cache.last_mask_edit = edit_mask;
        self.cache.last_need_mapping = full_mapping;
        self.cache.last_deform_copy = full_deform;
        self.cache.valid = true;
        self.cache.runs += 1;
        Ok(())
    }

    /// The fully evaluated mesh, carrying at least the layers in `mask`.
    ///
    /// # Errors
    ///
    /// In edit mode, [`EvalError::MissingEditData`] when the object has no
    /// edit representation.
    pub fn get_final(
        &mut self,
        mask: &AttrMask,
        need_mapping: bool,
    ) -> Result<Arc<Mesh>, EvalError> {
        self.ensure(mask, need_mapping, false)?;
        Ok(self
            .cache
            .final_mesh
            .clone()
            .expect("ensure populated the cache"))
    }

    /// The deform-only mesh: leading deform applied, topology untouched.
    ///
    /// # Errors
    ///
    /// [`EvalError::DeformOnlyInEditMode`] while the object is in edit mode.
    pub fn get_deform_only(&mut self, mask: &AttrMask) -> Result<Arc<Mesh>, EvalError> {
        if self.object.mode == ObjectMode::Edit {
            return Err(EvalError::DeformOnlyInEditMode);
        }
        self.ensure(mask, false, true)?;
        Ok(self
            .cache
            .deform_mesh
            .clone()
            .expect("deform copy was requested from the pipeline"))
    }

    /// The edit cage: the stack applied up to the object's cage point.
    ///
    /// # Errors
    ///
    /// [`EvalError::NotInEditMode`] outside edit mode,
    /// [`EvalError::MissingEditData`] without an edit representation.
    pub fn get_edit_cage(&mut self, mask: &AttrMask) -> Result<Arc<Mesh>, EvalError> {
        if self.object.mode != ObjectMode::Edit {
            return Err(EvalError::NotInEditMode);
        }
        self.ensure_cage(mask)?;
        Ok(self
            .cache
            .cage_mesh
            .clone()
            .expect("edit evaluation always produces a cage"))
    }

    /// One-off full evaluation, bypassing and never touching the cache.
    pub fn create_eval_final(
        &self,
        mask: &AttrMask,
        purpose: EvalPurpose,
    ) -> Result<EvalOutput, EvalError> {
        let mods = self.object.full_stack();
        let mut params = self.params(*mask, false, false);
        params.purpose = purpose;
        params.allow_shared = false;
        if self.object.mode == ObjectMode::Edit {
            let edit = self.object.edit.clone().ok_or(EvalError::MissingEditData)?;
            return editmode::evaluate_edit(&edit, &mods, &params, self.object.cage_index);
        }
        Ok(geometry::evaluate(&self.object.data, &mods, &params))
    }

    /// One-off evaluation with the deform phase left out entirely, as used
    /// when exporting the undeformed result of a constructive stack.
    pub fn create_eval_no_deform(&self, mask: &AttrMask, purpose: EvalPurpose) -> EvalOutput {
        let mods = self.object.full_stack();
        let mut params = self.params(*mask, false, false);
        params.purpose = purpose;
        params.apply_deform = false;
        params.allow_shared = false;
        geometry::evaluate(&self.object.data, &mods, &params)
    }

    /// Drop every cached artifact; the next request reruns the pipeline
    /// with exactly its own mask.
    pub fn invalidate(&mut self) {
        self.cache = MeshEvalCache::new();
    }

    /// Number of pipeline runs this cache has performed.
    pub fn pipeline_runs(&self) -> u64 {
        self.cache.runs
    }

    /// Recorded skips of the cached run.
    pub fn warnings(&self) -> &[ModifierWarning] {
        &self.cache.warnings
    }

    /// Non-mesh outputs of the cached run.
    pub fn extra_geometry(&self) -> &[GeometryComponent] {
        &self.cache.extra
    }

    /// Whether the cached edit result deferred normal computation.
    pub fn deferred_finalize(&self) -> bool {
        self.cache.deferred_finalize
    }
}
