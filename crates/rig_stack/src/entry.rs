//! Stack entries - one live rig instance each

use std::fmt;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use rig_graph::{EvaluationResult, NodeEvaluator, RigDefinition};
use rig_memory::EvaluatorArena;
use serde::{Deserialize, Serialize};

use crate::blend::{BlendEvaluator, BlendStatus};
use crate::context::EvaluationContext;

/// Identity of one rig instance on a stack. Monotonically increasing,
/// never reused, so two admissions of the same definition are
/// distinguishable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

bitflags! {
    /// Per-entry lifecycle and per-frame flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        /// Evaluators torn down; the entry only finishes its blend
        const FROZEN = 1 << 0;
        /// The entry has not been evaluated yet
        const FIRST_FRAME = 1 << 1;
        /// This frame is a discontinuity
        const FORCE_CUT = 1 << 2;
        /// The context supplied a valid result last frame
        const CONTEXT_WAS_VALID = 1 << 3;
        /// Armed to warn once when the context goes bad
        const WARN_ON_INVALID_CONTEXT = 1 << 4;
    }
}

/// One rig instance on the stack: its definition, its weak binding to
/// the activating context, the arena-built evaluator tree, blend state,
/// and its two result buffers.
///
/// The root pointer targets the entry's own arena, so entries are not
/// sendable; a stack lives and dies on one thread.
pub struct RigEntry {
    pub(crate) id: EntryId,
    pub(crate) definition: Arc<RigDefinition>,
    pub(crate) context: Weak<EvaluationContext>,
    pub(crate) arena: EvaluatorArena,
    pub(crate) root: Option<NonNull<dyn NodeEvaluator>>,
    pub(crate) blend: Option<Box<dyn BlendEvaluator>>,
    pub(crate) blend_status: BlendStatus,
    /// Staged copy of the context's result, refreshed changed-only
    pub(crate) context_result: EvaluationResult,
    /// This entry's own output from the last evaluation
    pub(crate) result: EvaluationResult,
    pub(crate) flags: EntryFlags,
}

impl RigEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn definition(&self) -> &Arc<RigDefinition> {
        &self.definition
    }

    pub fn blend_status(&self) -> BlendStatus {
        self.blend_status
    }

    pub fn is_frozen(&self) -> bool {
        self.flags.contains(EntryFlags::FROZEN)
    }

    /// Last evaluation output
    pub fn result(&self) -> &EvaluationResult {
        &self.result
    }

    pub(crate) fn root_evaluator_mut(&mut self) -> Option<&mut dyn NodeEvaluator> {
        // Safety: the pointer targets this entry's own arena and is
        // cleared before the arena is released.
        self.root.map(|mut ptr| unsafe { ptr.as_mut() })
    }
}
