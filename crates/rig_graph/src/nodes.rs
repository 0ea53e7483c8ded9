//! Built-in node kinds
//!
//! The node set is open; these are the kinds the runtime ships with.

use std::ptr::NonNull;
use std::sync::Arc;

use glam::Vec3;
use rig_memory::{AllocationLayout, EvaluatorArena};

use crate::node::{
    NodeEvaluator, NodeInitParams, NodeRunParams, OperationParams, RigNode, RigOperation,
};
use crate::result::EvaluationResult;
use crate::table::VariableId;
use crate::value::Value;

/// Adds a constant offset to the pose position.
#[derive(Clone, Debug)]
pub struct OffsetNode {
    pub offset: Vec3,
}

struct OffsetEvaluator {
    offset: Vec3,
}

impl NodeEvaluator for OffsetEvaluator {
    fn run(&mut self, _params: &NodeRunParams, result: &mut EvaluationResult) {
        let position = result.pose.position() + self.offset;
        result.pose.set_position(position);
    }
}

impl RigNode for OffsetNode {
    fn evaluator_layout(&self) -> AllocationLayout {
        AllocationLayout::of::<OffsetEvaluator>()
    }

    fn build_evaluator(&self, arena: &mut EvaluatorArena) -> Option<NonNull<dyn NodeEvaluator>> {
        let evaluator = arena.alloc_value(OffsetEvaluator {
            offset: self.offset,
        })?;
        let evaluator: NonNull<dyn NodeEvaluator> = evaluator;
        Some(evaluator)
    }
}

/// Writes a rig-interface variable every frame. The written value can be
/// driven at runtime through an operation targeting the same variable.
#[derive(Clone, Debug)]
pub struct SetVariableNode {
    pub target: VariableId,
    pub value: Value,
}

struct SetVariableEvaluator {
    target: VariableId,
    value: Value,
}

impl NodeEvaluator for SetVariableEvaluator {
    fn run(&mut self, _params: &NodeRunParams, result: &mut EvaluationResult) {
        result.variables.set(self.target, self.value.clone());
    }

    fn execute_operation(&mut self, _params: &OperationParams, op: &mut RigOperation) -> bool {
        if op.target == self.target {
            self.value = op.value.clone();
            true
        } else {
            false
        }
    }
}

impl RigNode for SetVariableNode {
    fn evaluator_layout(&self) -> AllocationLayout {
        AllocationLayout::of::<SetVariableEvaluator>()
    }

    fn build_evaluator(&self, arena: &mut EvaluatorArena) -> Option<NonNull<dyn NodeEvaluator>> {
        let evaluator = arena.alloc_value(SetVariableEvaluator {
            target: self.target,
            value: self.value.clone(),
        })?;
        let evaluator: NonNull<dyn NodeEvaluator> = evaluator;
        Some(evaluator)
    }
}

/// Runs its children in authored order.
#[derive(Clone)]
pub struct SequenceNode {
    children: Vec<Arc<dyn RigNode>>,
}

impl SequenceNode {
    pub fn new(children: Vec<Arc<dyn RigNode>>) -> Self {
        Self { children }
    }
}

struct SequenceEvaluator {
    children: Vec<NonNull<dyn NodeEvaluator>>,
}

impl SequenceEvaluator {
    fn children_mut(&mut self) -> impl Iterator<Item = &mut dyn NodeEvaluator> {
        // Safety: the child pointers were placement-built into the same
        // arena as this evaluator and live exactly as long as it does.
        self.children
            .iter_mut()
            .map(|child| unsafe { child.as_mut() })
    }
}

impl NodeEvaluator for SequenceEvaluator {
    fn initialize(&mut self, params: &NodeInitParams, result: &mut EvaluationResult) {
        for child in self.children_mut() {
            child.initialize(params, result);
        }
    }

    fn run(&mut self, params: &NodeRunParams, result: &mut EvaluationResult) {
        for child in self.children_mut() {
            child.run(params, result);
        }
    }

    fn execute_operation(&mut self, params: &OperationParams, op: &mut RigOperation) -> bool {
        for child in self.children_mut() {
            if child.execute_operation(params, op) {
                return true;
            }
        }
        false
    }

    fn teardown(&mut self, params: &crate::node::NodeTeardownParams) {
        for child in self.children_mut() {
            child.teardown(params);
        }
    }
}

impl RigNode for SequenceNode {
    fn evaluator_layout(&self) -> AllocationLayout {
        AllocationLayout::of::<SequenceEvaluator>()
    }

    fn build_evaluator(&self, arena: &mut EvaluatorArena) -> Option<NonNull<dyn NodeEvaluator>> {
        let mut child_evaluators = Vec::with_capacity(self.children.len());
        for child in &self.children {
            child_evaluators.push(child.build_evaluator(arena)?);
        }
        let evaluator = arena.alloc_value(SequenceEvaluator {
            children: child_evaluators,
        })?;
        let evaluator: NonNull<dyn NodeEvaluator> = evaluator;
        Some(evaluator)
    }

    fn children(&self) -> &[Arc<dyn RigNode>] {
        &self.children
    }
}
