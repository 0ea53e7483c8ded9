//! Rig definitions - immutable authored graphs plus their allocation
//! descriptors
//!
//! A definition is built once by the authoring layer and shared by `Arc`
//! between the asset side and every stack entry instantiated from it. The
//! allocation descriptor is precomputed at build time so admission can
//! size an entry's arena and tables in one shot, without walking the
//! graph again.

use std::fmt;
use std::sync::Arc;

use rig_memory::AllocationLayout;

use crate::node::{tree_layout, RigNode};
use crate::table::TableSchema;
use crate::value::Value;

/// Identity of the authored source a definition was built from. Hot
/// reload keys its listener registrations on these.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceKey(Arc<str>);

impl SourceKey {
    pub fn new(key: &str) -> Self {
        Self(Arc::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything an entry needs to size its storage up front: the combined
/// evaluator layout for the whole graph and the schemas of both tables.
#[derive(Clone, Debug, Default)]
pub struct AllocationDescriptor {
    /// Exact layout of the graph's evaluator subtree
    pub evaluators: AllocationLayout,
    /// Schema for the blendable variable table
    pub variable_schema: TableSchema,
    /// Schema for the non-blendable context data table
    pub data_schema: TableSchema,
}

impl AllocationDescriptor {
    /// Create an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold another descriptor into this one. Used when a definition
    /// embeds sub-rigs: evaluator layouts combine in build order and the
    /// schemas merge, keeping the first row for duplicate ids.
    pub fn combined(mut self, other: &AllocationDescriptor) -> Self {
        self.evaluators = self.evaluators.combined(other.evaluators);
        self.variable_schema.combine(&other.variable_schema);
        self.data_schema.combine(&other.data_schema);
        self
    }
}

/// An immutable authored rig: a name, the sources it was built from, the
/// node graph, and the precomputed allocation descriptor.
pub struct RigDefinition {
    name: String,
    sources: Vec<SourceKey>,
    root: Option<Arc<dyn RigNode>>,
    allocation: AllocationDescriptor,
}

impl RigDefinition {
    /// Get the authored name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the sources this definition was built from, primary first
    pub fn sources(&self) -> &[SourceKey] {
        &self.sources
    }

    /// Get the root node, if the graph is non-empty
    pub fn root(&self) -> Option<&Arc<dyn RigNode>> {
        self.root.as_ref()
    }

    /// Get the precomputed allocation descriptor
    pub fn allocation(&self) -> &AllocationDescriptor {
        &self.allocation
    }
}

impl fmt::Debug for RigDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RigDefinition")
            .field("name", &self.name)
            .field("sources", &self.sources)
            .field("has_root", &self.root.is_some())
            .field("allocation", &self.allocation)
            .finish()
    }
}

/// Builder for [`RigDefinition`]. Computes the allocation descriptor at
/// [`build`](Self::build) time from the graph and the declared schemas.
pub struct RigDefinitionBuilder {
    name: String,
    sources: Vec<SourceKey>,
    root: Option<Arc<dyn RigNode>>,
    variable_schema: TableSchema,
    data_schema: TableSchema,
}

impl RigDefinitionBuilder {
    /// Start a definition with its name and primary source
    pub fn new(name: &str, source: impl Into<SourceKey>) -> Self {
        Self {
            name: name.to_string(),
            sources: vec![source.into()],
            root: None,
            variable_schema: TableSchema::new(),
            data_schema: TableSchema::new(),
        }
    }

    /// Set the root node of the graph
    pub fn root(mut self, node: Arc<dyn RigNode>) -> Self {
        self.root = Some(node);
        self
    }

    /// Declare a blendable rig-interface variable
    pub fn variable(mut self, name: &str, default: Value) -> Self {
        self.variable_schema.add(name, default);
        self
    }

    /// Declare a non-blendable context data row
    pub fn data(mut self, name: &str, default: Value) -> Self {
        self.data_schema.add(name, default);
        self
    }

    /// Record an additional contributing source, e.g. an embedded sub-rig
    pub fn source(mut self, key: impl Into<SourceKey>) -> Self {
        let key = key.into();
        if !self.sources.contains(&key) {
            self.sources.push(key);
        }
        self
    }

    /// Finish the definition, computing its allocation descriptor
    pub fn build(self) -> Arc<RigDefinition> {
        let evaluators = match &self.root {
            Some(root) => tree_layout(root.as_ref()),
            None => AllocationLayout::EMPTY,
        };
        Arc::new(RigDefinition {
            name: self.name,
            sources: self.sources,
            root: self.root,
            allocation: AllocationDescriptor {
                evaluators,
                variable_schema: self.variable_schema,
                data_schema: self.data_schema,
            },
        })
    }
}
