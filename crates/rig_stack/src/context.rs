//! Evaluation contexts - external per-activation-site result suppliers
//!
//! A context is owned by whatever activated a rig (an `Arc` upstream);
//! the stack only ever holds a `Weak` to it. Upstream refreshes the
//! initial result every frame with changed-bits set on what it touched;
//! the stack copies out and never writes back.

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rig_graph::EvaluationResult;

/// Condition under which a conditional result applies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataCondition {
    /// Applies only to the entry currently on top of the stack
    ActiveRig,
}

/// Externally-owned supplier of per-frame evaluation input.
#[derive(Default)]
pub struct EvaluationContext {
    initial: RwLock<EvaluationResult>,
    active_only: RwLock<Option<EvaluationResult>>,
}

impl EvaluationContext {
    /// Create a context with an empty, invalid initial result
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with an initial result
    pub fn with_initial(result: EvaluationResult) -> Self {
        Self {
            initial: RwLock::new(result),
            active_only: RwLock::new(None),
        }
    }

    /// Read the initial result
    pub fn initial(&self) -> RwLockReadGuard<'_, EvaluationResult> {
        self.initial.read()
    }

    /// Write the initial result. Upstream refresh path; callers are
    /// expected to set values through the changed-tracking setters.
    pub fn initial_mut(&self) -> RwLockWriteGuard<'_, EvaluationResult> {
        self.initial.write()
    }

    /// Read the conditional result for `condition`, if one is supplied
    pub fn conditional(
        &self,
        condition: DataCondition,
    ) -> Option<MappedRwLockReadGuard<'_, EvaluationResult>> {
        match condition {
            DataCondition::ActiveRig => {
                RwLockReadGuard::try_map(self.active_only.read(), Option::as_ref).ok()
            }
        }
    }

    /// Supply or clear the conditional result for `condition`
    pub fn set_conditional(&self, condition: DataCondition, result: Option<EvaluationResult>) {
        match condition {
            DataCondition::ActiveRig => *self.active_only.write() = result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_graph::{Value, VariableId};

    #[test]
    fn test_conditional_roundtrip() {
        let context = EvaluationContext::new();
        assert!(context.conditional(DataCondition::ActiveRig).is_none());

        let mut overlay = EvaluationResult::new();
        overlay
            .variables
            .set(VariableId::from_name("boost"), Value::Float(2.0));
        context.set_conditional(DataCondition::ActiveRig, Some(overlay));

        let guard = context.conditional(DataCondition::ActiveRig).unwrap();
        assert_eq!(
            guard.variables.get(VariableId::from_name("boost")),
            Some(&Value::Float(2.0))
        );
    }

    #[test]
    fn test_initial_refresh_marks_changes() {
        let context = EvaluationContext::new();
        {
            let mut initial = context.initial_mut();
            initial.is_valid = true;
            initial.pose.set_position(glam::Vec3::X);
        }
        let initial = context.initial();
        assert!(initial.is_valid);
        assert!(!initial.pose.changed().is_empty());
    }
}
