//! Rig nodes and their evaluators
//!
//! A rig definition is a tree of authored nodes. At admission time each
//! node placement-constructs its evaluator into the owning entry's arena;
//! the set of node kinds is open, so dispatch goes through trait objects
//! on both sides.

use std::ptr::NonNull;
use std::sync::Arc;

use rig_memory::{AllocationLayout, EvaluatorArena};

use crate::result::EvaluationResult;
use crate::table::VariableId;
use crate::value::Value;

/// Identity of the evaluator that owns a blend stack. Threaded through
/// every operation for downstream identity checks; never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/// Which layer of the layered evaluation a stack sits on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RigLayer {
    #[default]
    None,
    Base,
    Main,
    Global,
    Visual,
}

/// Parameters for subtree initialization
#[derive(Clone, Copy, Debug)]
pub struct NodeInitParams {
    pub owner: OwnerId,
    pub layer: RigLayer,
}

/// Parameters for one evaluation of a subtree
#[derive(Clone, Copy, Debug)]
pub struct NodeRunParams {
    pub owner: OwnerId,
    pub layer: RigLayer,
    /// Seconds since the previous frame
    pub delta_time: f32,
    /// True on the entry's first evaluated frame
    pub is_first_frame: bool,
    /// True when this frame is a discontinuity
    pub force_cut: bool,
}

/// Parameters for subtree teardown
#[derive(Clone, Copy, Debug)]
pub struct NodeTeardownParams {
    pub owner: OwnerId,
    pub layer: RigLayer,
}

/// Parameters for transient-state operations
#[derive(Clone, Copy, Debug)]
pub struct OperationParams {
    pub owner: OwnerId,
}

/// A transient-state mutation routed across the stack, top to bottom,
/// until some evaluator claims it.
#[derive(Clone, Debug, PartialEq)]
pub struct RigOperation {
    /// The rig-interface parameter being driven
    pub target: VariableId,
    /// The value to apply
    pub value: Value,
}

/// One evaluator node, placement-constructed in an entry's arena.
pub trait NodeEvaluator {
    /// Called once after the subtree is built, with the entry's staged
    /// context result as input.
    fn initialize(&mut self, _params: &NodeInitParams, _result: &mut EvaluationResult) {}

    /// Evaluate for one frame
    fn run(&mut self, params: &NodeRunParams, result: &mut EvaluationResult);

    /// Apply a transient-state operation. Return true if claimed.
    fn execute_operation(&mut self, _params: &OperationParams, _op: &mut RigOperation) -> bool {
        false
    }

    /// Called once before the arena tears the subtree down
    fn teardown(&mut self, _params: &NodeTeardownParams) {}
}

/// One authored node in a rig definition's graph.
pub trait RigNode: Send + Sync {
    /// Layout of this node's evaluator alone, excluding children
    fn evaluator_layout(&self) -> AllocationLayout;

    /// Placement-construct this node's evaluator subtree into the arena.
    ///
    /// Nodes with children build them first (post-order), matching the
    /// walk [`tree_layout`] uses to precompute the arena size. Returns
    /// `None` only if the arena cannot fit the subtree, which means the
    /// definition's descriptor is stale.
    fn build_evaluator(&self, arena: &mut EvaluatorArena) -> Option<NonNull<dyn NodeEvaluator>>;

    /// Child nodes, in build order
    fn children(&self) -> &[Arc<dyn RigNode>] {
        &[]
    }
}

/// Compute the combined arena layout for a whole node subtree.
///
/// Walks post-order (children before self) so the offsets match what
/// [`RigNode::build_evaluator`] will allocate.
pub fn tree_layout(node: &dyn RigNode) -> AllocationLayout {
    let mut layout = AllocationLayout::EMPTY;
    for child in node.children() {
        layout = layout.combined(tree_layout(child.as_ref()));
    }
    layout.combined(node.evaluator_layout())
}
