//! Live-edit scenarios: listener refcounting and in-place rebuilds.

#![cfg(feature = "hot-reload")]

use std::cell::RefCell;
use std::sync::Arc;

use glam::Vec3;
use rig_graph::nodes::{OffsetNode, SetVariableNode};
use rig_graph::{
    OwnerId, RigDefinition, RigDefinitionBuilder, RigLayer, SourceKey, Value, VariableId,
};
use rig_stack::{
    BlendConfig, BlendStack, BlendStatus, DefinitionBuiltEvent, EvaluationContext, EvaluationMode,
    EvaluationParams, LiveEditListener,
};

const OWNER: OwnerId = OwnerId(7);

#[derive(Default)]
struct RecordingManager {
    added: RefCell<Vec<SourceKey>>,
    removed: RefCell<Vec<SourceKey>>,
}

impl LiveEditListener for RecordingManager {
    fn add_listener(&self, source: &SourceKey) {
        self.added.borrow_mut().push(source.clone());
    }

    fn remove_listener(&self, source: &SourceKey) {
        self.removed.borrow_mut().push(source.clone());
    }
}

fn offset_rig(name: &str, source: &str, offset: Vec3) -> Arc<RigDefinition> {
    RigDefinitionBuilder::new(name, source)
        .root(Arc::new(OffsetNode { offset }))
        .build()
}

fn valid_context() -> Arc<EvaluationContext> {
    let context = EvaluationContext::new();
    context.initial_mut().is_valid = true;
    Arc::new(context)
}

fn stateful(delta_time: f32) -> EvaluationParams {
    EvaluationParams {
        delta_time,
        mode: EvaluationMode::Stateful,
        owner: OWNER,
    }
}

#[test]
fn test_one_listener_per_distinct_source() {
    let manager = Arc::new(RecordingManager::default());
    let mut stack = BlendStack::new(RigLayer::Main, OWNER);
    stack.set_live_edit_listener(manager.clone());

    let context = valid_context();
    let definition = offset_rig("a", "rigs/a.rig", Vec3::ZERO);
    let first = stack.push(definition.clone(), &context, None);
    let second = stack.push(definition, &context, None);

    assert_eq!(manager.added.borrow().len(), 1);
    assert_eq!(manager.added.borrow()[0], SourceKey::from("rigs/a.rig"));

    stack.pop_entry(first).unwrap();
    assert!(manager.removed.borrow().is_empty());

    stack.pop_entry(second).unwrap();
    assert_eq!(manager.removed.borrow().len(), 1);
}

#[test]
fn test_rebuild_swaps_behavior_and_cuts() {
    let mut stack = BlendStack::new(RigLayer::Main, OWNER);
    let context = valid_context();

    stack.push(
        offset_rig("a", "rigs/a.rig", Vec3::new(1.0, 0.0, 0.0)),
        &context,
        None,
    );
    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.pose.position(), Vec3::new(1.0, 0.0, 0.0));

    stack.handle_definition_built(&DefinitionBuiltEvent {
        source: SourceKey::from("rigs/a.rig"),
        definition: offset_rig("a", "rigs/a.rig", Vec3::new(5.0, 0.0, 0.0)),
    });

    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.pose.position(), Vec3::new(5.0, 0.0, 0.0));
    assert!(output.is_cut);

    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(!output.is_cut);
}

#[test]
fn test_rebuild_resets_in_progress_blend_to_hard_cut() {
    let mut stack = BlendStack::new(RigLayer::Main, OWNER);
    let context = valid_context();

    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    let b = stack.push(
        offset_rig("b", "rigs/b.rig", Vec3::new(10.0, 0.0, 0.0)),
        &context,
        Some(BlendConfig::linear(10.0)),
    );
    stack.run(&stateful(1.0));

    stack.handle_definition_built(&DefinitionBuiltEvent {
        source: SourceKey::from("rigs/b.rig"),
        definition: offset_rig("b", "rigs/b.rig", Vec3::new(20.0, 0.0, 0.0)),
    });

    // The replacement blend is a hard cut; the rebuilt entry wins
    // outright and immediately settles.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.pose.position(), Vec3::new(20.0, 0.0, 0.0));
    assert_eq!(stack.entry(b).unwrap().blend_status(), BlendStatus::None);
}

#[test]
fn test_frozen_entry_drops_stale_rows_instead_of_rebuilding() {
    let zoom = VariableId::from_name("zoom");
    let definition = RigDefinitionBuilder::new("a", "rigs/a.rig")
        .root(Arc::new(SetVariableNode {
            target: zoom,
            value: Value::Float(3.0),
        }))
        .variable("zoom", Value::Float(0.0))
        .build();

    let mut stack = BlendStack::new(RigLayer::Main, OWNER);
    let context = valid_context();
    let id = stack.push(definition.clone(), &context, None);
    stack.run(&stateful(1.0 / 60.0));
    assert_eq!(
        stack.entry(id).unwrap().result().variables.get(zoom),
        Some(&Value::Float(3.0))
    );

    stack.freeze_entry(id).unwrap();
    stack.handle_definition_built(&DefinitionBuiltEvent {
        source: SourceKey::from("rigs/a.rig"),
        definition,
    });

    let entry = stack.entry(id).unwrap();
    assert!(entry.is_frozen());
    assert_eq!(entry.result().variables.get(zoom), None);
}
