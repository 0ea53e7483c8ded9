//! The blend stack - ordered rig instances with lifecycle and
//! composition
//!
//! Index 0 is the oldest entry; the last entry is the active rig. The
//! per-frame protocol is resolve (refresh each entry's staged context
//! result), evaluate (run each live entry's subtree), then composite
//! bottom to top.

use std::sync::{Arc, Weak};

use log::warn;
use rig_graph::{
    EvaluationResult, NodeInitParams, NodeTeardownParams, OperationParams, OwnerId, RigDefinition,
    RigLayer, RigOperation,
};
use rig_memory::EvaluatorArena;

use crate::blend::{BlendConfig, BlendStatus};
use crate::context::{DataCondition, EvaluationContext};
use crate::entry::{EntryFlags, EntryId, RigEntry};
use crate::error::{StackError, StackResult};
use crate::resolver::EvaluationParams;

/// What happened to an entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackEventKind {
    Pushed,
    Popped,
}

/// Lifecycle notification broadcast to subscribed handlers
#[derive(Clone)]
pub struct StackEvent {
    pub kind: StackEventKind,
    pub id: EntryId,
    pub definition: Arc<RigDefinition>,
}

/// Handle for unsubscribing an event handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type EventHandler = Box<dyn FnMut(&StackEvent)>;

/// Observer view of one rig instance
#[derive(Clone)]
pub struct RigInfo {
    pub id: EntryId,
    pub definition: Arc<RigDefinition>,
    pub context: Weak<EvaluationContext>,
    pub result: EvaluationResult,
}

/// An ordered stack of rig instances evaluated and composited together.
pub struct BlendStack {
    pub(crate) layer: RigLayer,
    pub(crate) owner: OwnerId,
    pub(crate) entries: Vec<RigEntry>,
    next_entry_id: u64,
    handlers: Vec<(HandlerId, EventHandler)>,
    next_handler_id: u64,
    #[cfg(feature = "hot-reload")]
    pub(crate) listened_sources: std::collections::BTreeMap<rig_graph::SourceKey, usize>,
    #[cfg(feature = "hot-reload")]
    pub(crate) live_edit: Option<Arc<dyn crate::reload::LiveEditListener>>,
}

impl BlendStack {
    /// Create an empty stack for the given layer and owner
    pub fn new(layer: RigLayer, owner: OwnerId) -> Self {
        Self {
            layer,
            owner,
            entries: Vec::new(),
            next_entry_id: 0,
            handlers: Vec::new(),
            next_handler_id: 0,
            #[cfg(feature = "hot-reload")]
            listened_sources: std::collections::BTreeMap::new(),
            #[cfg(feature = "hot-reload")]
            live_edit: None,
        }
    }

    pub fn layer(&self) -> RigLayer {
        self.layer
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in stack order, index 0 oldest
    pub fn entries(&self) -> &[RigEntry] {
        &self.entries
    }

    /// The topmost entry, if any
    pub fn active_entry(&self) -> Option<&RigEntry> {
        self.entries.last()
    }

    pub fn entry(&self, id: EntryId) -> Option<&RigEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub(crate) fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Admit a rig instance on top of the stack.
    ///
    /// Builds the evaluator tree into an exactly-sized arena, stages the
    /// context's current result (wholesale), applies the active-only
    /// overlay, initializes the subtree, fills schema defaults into
    /// still-unset rows, and seeds the entry's own result. The new entry
    /// becomes the active rig.
    pub fn push(
        &mut self,
        definition: Arc<RigDefinition>,
        context: &Arc<EvaluationContext>,
        blend_in: Option<BlendConfig>,
    ) -> EntryId {
        let mut arena = EvaluatorArena::new(definition.allocation().evaluators);
        let root = definition
            .root()
            .and_then(|node| node.build_evaluator(&mut arena));
        if definition.root().is_some() && root.is_none() {
            warn!(
                "rig '{}': allocation descriptor does not fit its evaluator tree",
                definition.name()
            );
        }

        let mut context_result = EvaluationResult::from_descriptor(definition.allocation());
        context_result.override_all(&context.initial());
        let context_was_valid = context_result.is_valid;
        // The active-only overlay supplies table rows, not a pose or
        // validity; the initial result stays authoritative for those.
        if let Some(overlay) = context.conditional(DataCondition::ActiveRig) {
            context_result.variables.override_all(&overlay.variables);
            context_result.context_data.override_all(&overlay.context_data);
        }

        let init_params = NodeInitParams {
            owner: self.owner,
            layer: self.layer,
        };
        if let Some(mut root_ptr) = root {
            // Safety: just built into `arena`, which the entry will own.
            unsafe { root_ptr.as_mut() }.initialize(&init_params, &mut context_result);
        }

        context_result
            .variables
            .apply_defaults(&definition.allocation().variable_schema);
        context_result
            .context_data
            .apply_defaults(&definition.allocation().data_schema);

        let mut result = EvaluationResult::from_descriptor(definition.allocation());
        result.override_all(&context_result);

        let id = EntryId(self.next_entry_id);
        self.next_entry_id += 1;

        let mut flags = EntryFlags::FIRST_FRAME | EntryFlags::WARN_ON_INVALID_CONTEXT;
        if context_was_valid {
            flags |= EntryFlags::CONTEXT_WAS_VALID;
        }

        let blend = blend_in.map(BlendConfig::build);
        let blend_status = if blend.is_some() {
            BlendStatus::BlendingIn
        } else {
            BlendStatus::None
        };

        #[cfg(feature = "hot-reload")]
        self.listen_definition(&definition);

        let event_definition = definition.clone();
        self.entries.push(RigEntry {
            id,
            definition,
            context: Arc::downgrade(context),
            arena,
            root,
            blend,
            blend_status,
            context_result,
            result,
            flags,
        });

        self.emit(StackEvent {
            kind: StackEventKind::Pushed,
            id,
            definition: event_definition,
        });
        id
    }

    /// Freeze an entry in place: its blend holds its current factor, its
    /// evaluator tree is torn down and the arena released, and its
    /// context binding is dropped. The stale result keeps compositing
    /// until the entry is popped. Idempotent.
    pub fn freeze_entry(&mut self, id: EntryId) -> StackResult<()> {
        let index = self.index_of(id).ok_or(StackError::EntryNotFound(id))?;
        self.freeze_index(index);
        Ok(())
    }

    pub(crate) fn freeze_index(&mut self, index: usize) {
        let teardown = NodeTeardownParams {
            owner: self.owner,
            layer: self.layer,
        };
        {
            let entry = &mut self.entries[index];
            if entry.flags.contains(EntryFlags::FROZEN) {
                return;
            }
            if let Some(blend) = entry.blend.as_mut() {
                blend.freeze();
            }
            if let Some(root) = entry.root_evaluator_mut() {
                root.teardown(&teardown);
            }
            entry.root = None;
            entry.arena = EvaluatorArena::empty();
            entry.context = Weak::new();
            entry.flags.insert(EntryFlags::FROZEN);
        }
        #[cfg(feature = "hot-reload")]
        {
            let definition = self.entries[index].definition.clone();
            self.unlisten_definition(&definition);
        }
    }

    /// Remove every entry below `first_index_to_keep`, oldest first.
    /// Each removal emits a `Popped` event before the entry goes away.
    pub fn pop_entries(&mut self, first_index_to_keep: usize) {
        let count = first_index_to_keep.min(self.entries.len());
        for index in 0..count {
            self.retire_index(index);
        }
        self.entries.drain(0..count);
    }

    /// Remove one entry out of order
    pub fn pop_entry(&mut self, id: EntryId) -> StackResult<()> {
        let index = self.index_of(id).ok_or(StackError::EntryNotFound(id))?;
        self.pop_entry_at(index);
        Ok(())
    }

    /// Remove the entry at `index` out of order. No-op past the end.
    pub fn pop_entry_at(&mut self, index: usize) {
        if index >= self.entries.len() {
            return;
        }
        self.retire_index(index);
        self.entries.remove(index);
    }

    fn retire_index(&mut self, index: usize) {
        let (id, definition, frozen) = {
            let entry = &self.entries[index];
            (entry.id, entry.definition.clone(), entry.is_frozen())
        };
        self.emit(StackEvent {
            kind: StackEventKind::Popped,
            id,
            definition: definition.clone(),
        });
        // Frozen entries were torn down (and deregistered) at freeze time.
        if !frozen {
            let teardown = NodeTeardownParams {
                owner: self.owner,
                layer: self.layer,
            };
            {
                let entry = &mut self.entries[index];
                if let Some(root) = entry.root_evaluator_mut() {
                    root.teardown(&teardown);
                }
                entry.root = None;
            }
            #[cfg(feature = "hot-reload")]
            self.unlisten_definition(&definition);
        }
    }

    /// Start blending an entry out. If the entry was still blending in,
    /// the new blend takes over at the interrupted factor so the
    /// composite stays continuous.
    pub fn set_blending_out(&mut self, id: EntryId, config: BlendConfig) -> StackResult<()> {
        let index = self.index_of(id).ok_or(StackError::EntryNotFound(id))?;
        let entry = &mut self.entries[index];
        if entry.blend_status == BlendStatus::BlendingOut {
            return Ok(());
        }

        let snapshot = entry.blend.as_ref().map(|blend| blend.blend_factor());
        let mut blend = config.build();
        blend.set_reversed(true);
        if let Some(factor) = snapshot {
            blend.initialize_from_interruption(factor);
        }
        entry.blend = Some(blend);
        entry.blend_status = BlendStatus::BlendingOut;
        Ok(())
    }

    /// Whether an entry's blend-out has run its course
    pub fn is_ready_to_pop(&self, id: EntryId) -> bool {
        self.entry(id).is_some_and(|entry| {
            entry.blend_status == BlendStatus::BlendingOut
                && entry
                    .blend
                    .as_ref()
                    .map_or(true, |blend| blend.is_finished())
        })
    }

    /// Whether any entry is still bound to `context`. Frozen entries
    /// dropped their binding and never match.
    pub fn has_running_rig(&self, context: &Arc<EvaluationContext>) -> bool {
        self.entries.iter().any(|entry| {
            entry
                .context
                .upgrade()
                .is_some_and(|bound| Arc::ptr_eq(&bound, context))
        })
    }

    /// Observer view of the active rig
    pub fn active_rig_info(&self) -> Option<RigInfo> {
        self.entries.last().map(Self::info_of)
    }

    /// Observer view of one rig instance
    pub fn rig_info(&self, id: EntryId) -> Option<RigInfo> {
        self.entry(id).map(Self::info_of)
    }

    fn info_of(entry: &RigEntry) -> RigInfo {
        RigInfo {
            id: entry.id,
            definition: entry.definition.clone(),
            context: entry.context.clone(),
            result: entry.result.clone(),
        }
    }

    /// Route a transient-state operation top to bottom until some
    /// evaluator claims it. Frozen entries have no evaluators and are
    /// skipped.
    pub fn execute_operation(&mut self, params: &OperationParams, op: &mut RigOperation) -> bool {
        debug_assert_eq!(params.owner, self.owner);
        for entry in self.entries.iter_mut().rev() {
            if entry.flags.contains(EntryFlags::FROZEN) {
                continue;
            }
            if let Some(root) = entry.root_evaluator_mut() {
                if root.execute_operation(params, op) {
                    return true;
                }
            }
        }
        false
    }

    /// Evaluate one frame: resolve contexts, run each live entry's
    /// subtree, then fold results bottom to top. Entries with a blend
    /// contribute by weight; entries without one hard-override the
    /// running output.
    pub fn run(&mut self, params: &EvaluationParams) -> EvaluationResult {
        debug_assert_eq!(params.owner, self.owner);
        let resolved = self.resolve_entries(params);

        for resolved_entry in &resolved {
            let entry = &mut self.entries[resolved_entry.index];
            if entry.flags.contains(EntryFlags::FROZEN) {
                continue;
            }
            let run_params = rig_graph::NodeRunParams {
                owner: self.owner,
                layer: self.layer,
                delta_time: params.delta_time,
                is_first_frame: entry.flags.contains(EntryFlags::FIRST_FRAME),
                force_cut: entry.flags.contains(EntryFlags::FORCE_CUT),
            };
            let RigEntry {
                root,
                result,
                context_result,
                ..
            } = entry;
            result.override_all(context_result);
            // The upstream cut carries through; a forced cut adds to it.
            if run_params.force_cut {
                result.is_cut = true;
            }
            if let Some(ptr) = root {
                // Safety: the pointer targets this entry's live arena.
                unsafe { ptr.as_mut() }.run(&run_params, result);
            }
        }

        let mut output = EvaluationResult::new();
        for entry in &mut self.entries {
            let mut promote = false;
            if let Some(blend) = entry.blend.as_mut() {
                // Frozen-in-place blends ignore the advance and hold.
                blend.advance(params.delta_time);
                output.blend_apply(&entry.result, blend.blend_factor());
                promote = entry.blend_status == BlendStatus::BlendingIn
                    && blend.is_full()
                    && blend.is_finished();
            } else {
                output.override_all(&entry.result);
            }
            if promote {
                entry.blend_status = BlendStatus::None;
                entry.blend = None;
            }
            entry
                .flags
                .remove(EntryFlags::FIRST_FRAME | EntryFlags::FORCE_CUT);
        }
        output
    }

    /// Subscribe to push/pop notifications
    pub fn subscribe(&mut self, handler: impl FnMut(&StackEvent) + 'static) -> HandlerId {
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a previously subscribed handler
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    fn emit(&mut self, event: StackEvent) {
        for (_, handler) in &mut self.handlers {
            handler(&event);
        }
    }
}

impl Drop for BlendStack {
    fn drop(&mut self) {
        // Pop everything so teardown and Popped events still fire.
        self.pop_entries(self.entries.len());
    }
}
