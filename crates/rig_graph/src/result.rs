//! Evaluation result - the pose + tables + validity bundle

use serde::{Deserialize, Serialize};

use crate::definition::AllocationDescriptor;
use crate::pose::Pose;
use crate::table::{ContextDataTable, ValueTable, VariableTable};

/// One evaluation's worth of output: a pose, a variable table, a context
/// data table, and two frame flags.
///
/// Contexts refresh one of these upstream every frame; every entry keeps
/// two (the staged context copy and its own post-evaluation output); the
/// compositor folds them all into a final one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The blendable transform
    pub pose: Pose,
    /// Blendable rig-interface parameters
    pub variables: VariableTable,
    /// Non-blendable contextual data
    pub context_data: ContextDataTable,
    /// Whether upstream considers this result usable yet
    pub is_valid: bool,
    /// One-frame discontinuity signal: do not interpolate across it
    pub is_cut: bool,
}

impl EvaluationResult {
    /// Create an empty, invalid result
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a result with tables shaped from a rig definition's
    /// allocation descriptor.
    pub fn from_descriptor(descriptor: &AllocationDescriptor) -> Self {
        Self {
            pose: Pose::identity(),
            variables: ValueTable::from_schema(&descriptor.variable_schema),
            context_data: ValueTable::from_schema(&descriptor.data_schema),
            is_valid: false,
            is_cut: false,
        }
    }

    /// Wholesale copy from `other`: pose, written table rows, and flags.
    pub fn override_all(&mut self, other: &EvaluationResult) {
        self.pose.override_all(&other.pose);
        self.variables.override_all(&other.variables);
        self.context_data.override_all(&other.context_data);
        self.is_valid = other.is_valid;
        self.is_cut = other.is_cut;
    }

    /// Copy only what `other` has flagged as changed: masked pose fields
    /// and changed table rows. Unrelated rows keep their local values.
    pub fn override_changed(&mut self, other: &EvaluationResult) {
        self.pose.override_changed(&other.pose);
        self.variables.override_changed(&other.variables);
        self.context_data.override_changed(&other.context_data);
        self.is_valid |= other.is_valid;
        self.is_cut |= other.is_cut;
    }

    /// Clear single-frame flags ahead of evaluation
    pub fn reset_frame_flags(&mut self) {
        self.is_cut = false;
    }

    /// Clear all changed tracking (pose mask and table changed bits)
    pub fn clear_changed(&mut self) {
        self.pose.clear_changed();
        self.variables.clear_changed();
        self.context_data.clear_changed();
    }

    /// Blend `top` onto this result with the given weight.
    ///
    /// The pose and variables interpolate; context data is not blendable
    /// and switches wholesale once the weight reaches 0.5.
    pub fn blend_apply(&mut self, top: &EvaluationResult, alpha: f32) {
        self.pose.blend_apply(&top.pose, alpha);
        self.variables.blend_apply(&top.variables, alpha);
        if alpha >= 0.5 {
            self.context_data.override_all(&top.context_data);
        }
        self.is_valid |= top.is_valid;
        self.is_cut |= top.is_cut;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::VariableId;
    use crate::value::Value;
    use glam::Vec3;

    #[test]
    fn test_override_all_copies_flags() {
        let mut source = EvaluationResult::new();
        source.is_valid = true;
        source.is_cut = true;
        source.pose.set_position(Vec3::X);

        let mut dest = EvaluationResult::new();
        dest.override_all(&source);

        assert!(dest.is_valid);
        assert!(dest.is_cut);
        assert_eq!(dest.pose.position(), Vec3::X);
    }

    #[test]
    fn test_blend_keeps_context_data_discrete() {
        let key = VariableId::from_name("target");

        let mut bottom = EvaluationResult::new();
        bottom.context_data.set(key, Value::Int(1));

        let mut top = EvaluationResult::new();
        top.context_data.set(key, Value::Int(2));

        let mut out = bottom.clone();
        out.blend_apply(&top, 0.25);
        assert_eq!(out.context_data.get(key), Some(&Value::Int(1)));

        let mut out = bottom.clone();
        out.blend_apply(&top, 0.75);
        assert_eq!(out.context_data.get(key), Some(&Value::Int(2)));
    }
}
