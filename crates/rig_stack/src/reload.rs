//! Live-edit support - rebuilding entries when their sources rebuild
//!
//! The stack does not watch content itself. An external manager owns
//! change detection; the stack tells it which sources matter through
//! [`LiveEditListener`], keeping a refcount per source so the manager
//! hears about each distinct source exactly once no matter how many
//! entries share it. When the manager rebuilds a definition it calls
//! [`BlendStack::handle_definition_built`] on the same thread.

use std::sync::Arc;

use rig_graph::{
    EvaluationResult, NodeInitParams, NodeTeardownParams, RigDefinition, SourceKey,
};
use rig_memory::EvaluatorArena;

use crate::blend::PopBlend;
use crate::entry::EntryFlags;
use crate::stack::BlendStack;

/// Implemented by the external live-edit manager
pub trait LiveEditListener {
    /// The stack now cares about rebuilds of `source`
    fn add_listener(&self, source: &SourceKey);
    /// The stack no longer cares about `source`
    fn remove_listener(&self, source: &SourceKey);
}

/// A source was rebuilt into a fresh definition
#[derive(Clone)]
pub struct DefinitionBuiltEvent {
    pub source: SourceKey,
    pub definition: Arc<RigDefinition>,
}

impl BlendStack {
    /// Attach the live-edit manager. Sources already listened to are
    /// registered immediately.
    pub fn set_live_edit_listener(&mut self, listener: Arc<dyn LiveEditListener>) {
        for source in self.listened_sources.keys() {
            listener.add_listener(source);
        }
        self.live_edit = Some(listener);
    }

    pub(crate) fn listen_definition(&mut self, definition: &RigDefinition) {
        for source in definition.sources().to_vec() {
            self.listen_source(source);
        }
    }

    pub(crate) fn unlisten_definition(&mut self, definition: &RigDefinition) {
        for source in definition.sources().to_vec() {
            self.unlisten_source(&source);
        }
    }

    fn listen_source(&mut self, source: SourceKey) {
        let count = self.listened_sources.entry(source.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            if let Some(listener) = &self.live_edit {
                listener.add_listener(&source);
            }
        }
    }

    fn unlisten_source(&mut self, source: &SourceKey) {
        let Some(count) = self.listened_sources.get_mut(source) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.listened_sources.remove(source);
            if let Some(listener) = &self.live_edit {
                listener.remove_listener(source);
            }
        }
    }

    /// React to a rebuilt definition. Every entry depending on the
    /// source is rebuilt in place: same id, same stack position, new
    /// evaluator tree and tables, blend reset to a hard cut. Frozen
    /// entries have nothing to rebuild; their stale table rows are
    /// cleared instead so they stop contributing outdated values.
    pub fn handle_definition_built(&mut self, event: &DefinitionBuiltEvent) {
        for index in 0..self.entries.len() {
            if !self.entries[index]
                .definition
                .sources()
                .contains(&event.source)
            {
                continue;
            }
            if self.entries[index].flags.contains(EntryFlags::FROZEN) {
                let entry = &mut self.entries[index];
                entry.result.variables.unset_all();
                entry.result.context_data.unset_all();
                continue;
            }
            self.rebuild_entry(index, event.definition.clone());
        }
    }

    fn rebuild_entry(&mut self, index: usize, definition: Arc<RigDefinition>) {
        let owner = self.owner;
        let layer = self.layer;

        // Keep shared sources alive across the swap.
        self.listen_definition(&definition);

        let old_definition;
        {
            let entry = &mut self.entries[index];
            let teardown = NodeTeardownParams { owner, layer };
            if let Some(root) = entry.root_evaluator_mut() {
                root.teardown(&teardown);
            }
            entry.root = None;

            let descriptor = definition.allocation();
            let mut arena = EvaluatorArena::new(descriptor.evaluators);
            let root = definition
                .root()
                .and_then(|node| node.build_evaluator(&mut arena));
            entry.arena = arena;
            entry.root = root;

            let mut context_result = EvaluationResult::from_descriptor(descriptor);
            if let Some(context) = entry.context.upgrade() {
                context_result.override_all(&context.initial());
            }
            if let Some(mut root_ptr) = entry.root {
                // Safety: just built into the entry's new arena.
                unsafe { root_ptr.as_mut() }
                    .initialize(&NodeInitParams { owner, layer }, &mut context_result);
            }
            context_result
                .variables
                .apply_defaults(&descriptor.variable_schema);
            context_result
                .context_data
                .apply_defaults(&descriptor.data_schema);

            let mut result = EvaluationResult::from_descriptor(descriptor);
            result.override_all(&context_result);
            entry.context_result = context_result;
            entry.result = result;

            // The old evaluator tree is gone; an in-progress blend over
            // it cannot continue smoothly. Cut instead.
            if entry.blend.is_some() {
                entry.blend = Some(Box::new(PopBlend::default()));
            }
            entry.flags.insert(EntryFlags::FORCE_CUT);

            old_definition = std::mem::replace(&mut entry.definition, definition);
        }
        self.unlisten_definition(&old_definition);
    }
}
