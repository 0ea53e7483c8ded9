//! # rig_stack - Layered Blend-Stack Evaluator
//!
//! An ordered stack of rig instances, each admitted with an
//! exactly-sized evaluator arena, refreshed every frame from an
//! externally-owned context, evaluated, and composited bottom to top
//! with per-entry blends.
//!
//! Lifecycle per entry: admitted (optionally blending in), live,
//! optionally frozen in place (evaluators gone, stale result keeps
//! compositing), blending out, popped. Index 0 is the oldest entry; the
//! last is the active rig.
//!
//! The `hot-reload` feature (default on) adds live-edit support:
//! entries rebuild themselves in place when an external manager reports
//! their source was rebuilt.

pub mod blend;
pub mod context;
pub mod entry;
pub mod error;
#[cfg(feature = "hot-reload")]
pub mod reload;
pub mod resolver;
pub mod serialize;
pub mod stack;

pub use blend::{BlendConfig, BlendCurve, BlendEvaluator, BlendStatus, PopBlend, SimpleBlend};
pub use context::{DataCondition, EvaluationContext};
pub use entry::{EntryFlags, EntryId, RigEntry};
pub use error::{StackError, StackResult};
#[cfg(feature = "hot-reload")]
pub use reload::{DefinitionBuiltEvent, LiveEditListener};
pub use resolver::{EvaluationMode, EvaluationParams};
pub use stack::{BlendStack, HandlerId, RigInfo, StackEvent, StackEventKind};

pub mod prelude {
    pub use crate::blend::{BlendConfig, BlendCurve, BlendStatus};
    pub use crate::context::{DataCondition, EvaluationContext};
    pub use crate::entry::{EntryFlags, EntryId, RigEntry};
    pub use crate::error::{StackError, StackResult};
    #[cfg(feature = "hot-reload")]
    pub use crate::reload::{DefinitionBuiltEvent, LiveEditListener};
    pub use crate::resolver::{EvaluationMode, EvaluationParams};
    pub use crate::stack::{BlendStack, RigInfo, StackEvent, StackEventKind};
    pub use rig_graph::prelude::*;
}
