//! Per-frame context resolution
//!
//! Before evaluation, every live entry's staged context result is
//! refreshed from its bound context. The refresh is changed-only: it
//! copies the pose fields and table rows the context flagged, never
//! clobbering rows the context did not touch this frame. Degraded
//! contexts degrade the entry, never the frame: a dead binding freezes
//! the entry, an invalid result skips the refresh, and both warn once.

use log::warn;
use rig_graph::OwnerId;

use crate::context::DataCondition;
use crate::entry::EntryFlags;
use crate::stack::BlendStack;

/// Whether a frame may mutate stack structure
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Normal frame: unresolvable contexts freeze their entries
    #[default]
    Stateful,
    /// Side evaluation (e.g. debug preview): never mutates the stack
    Stateless,
}

/// Parameters for one frame of stack evaluation
#[derive(Clone, Copy, Debug)]
pub struct EvaluationParams {
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub mode: EvaluationMode,
    pub owner: OwnerId,
}

/// One entry's resolution outcome, in stack order
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResolvedEntry {
    pub index: usize,
}

impl BlendStack {
    pub(crate) fn resolve_entries(&mut self, params: &EvaluationParams) -> Vec<ResolvedEntry> {
        let count = self.entries.len();
        let mut resolved = Vec::with_capacity(count);

        for index in 0..count {
            let is_active = index + 1 == count;
            resolved.push(ResolvedEntry { index });

            if self.entries[index].flags.contains(EntryFlags::FROZEN) {
                continue;
            }

            let context = self.entries[index].context.upgrade();
            let Some(context) = context else {
                if params.mode == EvaluationMode::Stateful {
                    let entry = &mut self.entries[index];
                    if entry.flags.contains(EntryFlags::WARN_ON_INVALID_CONTEXT) {
                        warn!(
                            "{} ('{}'): context binding is gone, freezing",
                            entry.id,
                            entry.definition.name()
                        );
                        entry.flags.remove(EntryFlags::WARN_ON_INVALID_CONTEXT);
                    }
                    self.freeze_index(index);
                }
                continue;
            };

            let entry = &mut self.entries[index];
            let initial = context.initial();
            if !initial.is_valid {
                if entry.flags.contains(EntryFlags::WARN_ON_INVALID_CONTEXT) {
                    warn!(
                        "{} ('{}'): context has no valid result, keeping stale input",
                        entry.id,
                        entry.definition.name()
                    );
                    entry.flags.remove(EntryFlags::WARN_ON_INVALID_CONTEXT);
                }
                entry.flags.remove(EntryFlags::CONTEXT_WAS_VALID);
                continue;
            }

            // A cut hides the invalid-to-valid discontinuity; the first
            // frame has nothing to be discontinuous with.
            let was_valid = entry.flags.contains(EntryFlags::CONTEXT_WAS_VALID);
            let first_frame = entry.flags.contains(EntryFlags::FIRST_FRAME);
            if !was_valid && !first_frame {
                entry.flags.insert(EntryFlags::FORCE_CUT);
            }

            entry.context_result.clear_changed();
            // A cut is one frame of input, not a latched state.
            entry.context_result.reset_frame_flags();
            entry.context_result.override_changed(&initial);
            drop(initial);
            if is_active {
                if let Some(overlay) = context.conditional(DataCondition::ActiveRig) {
                    entry.context_result.override_changed(&overlay);
                }
            }

            entry.flags.insert(EntryFlags::CONTEXT_WAS_VALID);
            // Valid again: re-arm the one-shot warning.
            entry.flags.insert(EntryFlags::WARN_ON_INVALID_CONTEXT);
        }

        resolved
    }
}
