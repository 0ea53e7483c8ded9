//! # rig_graph - Rig Data Model
//!
//! The authored side of the blend stack:
//! - Value: runtime values flowing through variable and data tables
//! - ValueTable: id-keyed storage with per-row written/changed tracking
//! - Pose: blendable transform with a changed-mask
//! - EvaluationResult: the pose + tables + validity bundle passed between
//!   contexts, entries, and the compositor
//! - RigNode / NodeEvaluator: the authored node graph and the evaluators
//!   placement-built from it
//! - RigDefinition: an immutable node graph plus its precomputed
//!   allocation descriptor

pub mod definition;
pub mod node;
pub mod nodes;
pub mod pose;
pub mod result;
pub mod table;
pub mod value;

pub use definition::{AllocationDescriptor, RigDefinition, RigDefinitionBuilder, SourceKey};
pub use node::{
    tree_layout, NodeEvaluator, NodeInitParams, NodeRunParams, NodeTeardownParams,
    OperationParams, OwnerId, RigLayer, RigNode, RigOperation,
};
pub use pose::{Pose, PoseMask};
pub use result::EvaluationResult;
pub use table::{ContextDataTable, DataId, TableSchema, ValueTable, VariableId, VariableTable};
pub use value::{Value, ValueType};

pub mod prelude {
    pub use crate::definition::{
        AllocationDescriptor, RigDefinition, RigDefinitionBuilder, SourceKey,
    };
    pub use crate::node::{
        NodeEvaluator, NodeInitParams, NodeRunParams, NodeTeardownParams, OperationParams,
        OwnerId, RigLayer, RigNode, RigOperation,
    };
    pub use crate::pose::{Pose, PoseMask};
    pub use crate::result::EvaluationResult;
    pub use crate::table::{ContextDataTable, DataId, TableSchema, ValueTable, VariableId, VariableTable};
    pub use crate::value::{Value, ValueType};
}
