//! State snapshots - persist entry values, never stack shape
//!
//! A snapshot carries each entry's two result buffers and its flag bits,
//! in stack order. Loading writes values into entries that already
//! exist; it never creates, removes, or reorders them. A count mismatch
//! means the caller rebuilt a different stack shape than it saved, so
//! the overlap is restored and the rest warned about.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::entry::EntryFlags;
use crate::error::{StackError, StackResult};
use crate::stack::BlendStack;

#[derive(Serialize, Deserialize)]
struct EntryState {
    context_result: rig_graph::EvaluationResult,
    result: rig_graph::EvaluationResult,
    flags: u8,
}

#[derive(Serialize, Deserialize)]
struct StackState {
    entries: Vec<EntryState>,
}

impl BlendStack {
    /// Snapshot every entry's state, in stack order
    pub fn save_state(&self) -> StackResult<Vec<u8>> {
        let state = StackState {
            entries: self
                .entries
                .iter()
                .map(|entry| EntryState {
                    context_result: entry.context_result.clone(),
                    result: entry.result.clone(),
                    flags: entry.flags.bits(),
                })
                .collect(),
        };
        bincode::serialize(&state).map_err(|err| StackError::StateEncode(err.to_string()))
    }

    /// Restore entry state from a snapshot taken on a stack of the same
    /// shape. On a count mismatch, the first `min(saved, present)`
    /// entries are restored and the rest left alone.
    pub fn load_state(&mut self, bytes: &[u8]) -> StackResult<()> {
        let state: StackState =
            bincode::deserialize(bytes).map_err(|err| StackError::StateDecode(err.to_string()))?;

        if state.entries.len() != self.entries.len() {
            warn!(
                "stack state carries {} entries but the stack has {}; restoring the overlap",
                state.entries.len(),
                self.entries.len()
            );
        }

        for (entry, loaded) in self.entries.iter_mut().zip(state.entries) {
            entry.context_result = loaded.context_result;
            entry.result = loaded.result;
            // Frozen-ness is structural; keep the live bit.
            let frozen = entry.flags.contains(EntryFlags::FROZEN);
            entry.flags = EntryFlags::from_bits_truncate(loaded.flags);
            entry.flags.set(EntryFlags::FROZEN, frozen);
        }
        Ok(())
    }
}
