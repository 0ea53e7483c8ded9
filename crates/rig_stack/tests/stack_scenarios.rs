//! Cross-module scenarios: admission, resolution, composition,
//! freezing, state snapshots, and live edit.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;
use rig_graph::nodes::{OffsetNode, SetVariableNode};
use rig_graph::{
    OperationParams, OwnerId, RigDefinition, RigDefinitionBuilder, RigLayer, RigOperation, Value,
    VariableId,
};
use rig_stack::{
    BlendConfig, BlendStack, BlendStatus, DataCondition, EvaluationContext, EvaluationMode,
    EvaluationParams, StackEventKind,
};

const OWNER: OwnerId = OwnerId(7);

fn offset_rig(name: &str, source: &str, offset: Vec3) -> Arc<RigDefinition> {
    RigDefinitionBuilder::new(name, source)
        .root(Arc::new(OffsetNode { offset }))
        .build()
}

fn new_stack() -> BlendStack {
    BlendStack::new(RigLayer::Main, OWNER)
}

fn valid_context() -> Arc<EvaluationContext> {
    let context = EvaluationContext::new();
    context.initial_mut().is_valid = true;
    Arc::new(context)
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn stateful(delta_time: f32) -> EvaluationParams {
    EvaluationParams {
        delta_time,
        mode: EvaluationMode::Stateful,
        owner: OWNER,
    }
}

#[test]
fn test_push_order_and_active_entry() {
    let mut stack = new_stack();
    let context = valid_context();

    let a = stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    let b = stack.push(offset_rig("b", "rigs/b.rig", Vec3::ZERO), &context, None);
    let c = stack.push(offset_rig("c", "rigs/c.rig", Vec3::ZERO), &context, None);

    let ids: Vec<_> = stack.entries().iter().map(|entry| entry.id()).collect();
    assert_eq!(ids, vec![a, b, c]);
    assert_eq!(stack.active_entry().unwrap().id(), c);
    assert!(a < b && b < c);
}

#[test]
fn test_top_entry_without_blend_overrides() {
    let mut stack = new_stack();
    let context = valid_context();

    stack.push(
        offset_rig("a", "rigs/a.rig", Vec3::new(1.0, 0.0, 0.0)),
        &context,
        None,
    );
    stack.push(
        offset_rig("b", "rigs/b.rig", Vec3::new(10.0, 0.0, 0.0)),
        &context,
        None,
    );

    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(output.is_valid);
    assert_eq!(output.pose.position(), Vec3::new(10.0, 0.0, 0.0));
}

#[test]
fn test_half_blend_lerps_between_entries() {
    let mut stack = new_stack();
    let context = valid_context();

    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    stack.push(
        offset_rig("b", "rigs/b.rig", Vec3::new(10.0, 0.0, 0.0)),
        &context,
        Some(BlendConfig::linear(1.0)),
    );

    // Halfway through a one-second linear blend.
    let output = stack.run(&stateful(0.5));
    assert_eq!(output.pose.position(), Vec3::new(5.0, 0.0, 0.0));

    // Blend completes and the entry promotes out of BlendingIn.
    let output = stack.run(&stateful(0.5));
    assert_eq!(output.pose.position(), Vec3::new(10.0, 0.0, 0.0));
    assert_eq!(
        stack.active_entry().unwrap().blend_status(),
        BlendStatus::None
    );
}

#[test]
fn test_unresolvable_context_freezes_entry() {
    init_logs();
    let mut stack = new_stack();
    let context = valid_context();

    let id = stack.push(
        offset_rig("a", "rigs/a.rig", Vec3::new(3.0, 0.0, 0.0)),
        &context,
        None,
    );
    let before = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(before.pose.position(), Vec3::new(3.0, 0.0, 0.0));

    drop(context);
    let after = stack.run(&stateful(1.0 / 60.0));

    let entry = stack.entry(id).unwrap();
    assert!(entry.is_frozen());
    // The stale result keeps compositing.
    assert_eq!(after.pose.position(), Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn test_stateless_mode_never_freezes() {
    let mut stack = new_stack();
    let context = valid_context();

    let id = stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    drop(context);

    stack.run(&EvaluationParams {
        delta_time: 1.0 / 60.0,
        mode: EvaluationMode::Stateless,
        owner: OWNER,
    });
    assert!(!stack.entry(id).unwrap().is_frozen());
}

#[test]
fn test_freeze_is_idempotent() {
    let mut stack = new_stack();
    let context = valid_context();
    let id = stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);

    stack.freeze_entry(id).unwrap();
    stack.freeze_entry(id).unwrap();

    assert!(stack.entry(id).unwrap().is_frozen());
    assert!(!stack.has_running_rig(&context));
}

#[test]
fn test_pop_frozen_entry() {
    let mut stack = new_stack();
    let context = valid_context();
    let id = stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);

    stack.freeze_entry(id).unwrap();
    stack.pop_entry(id).unwrap();
    assert!(stack.is_empty());
}

#[test]
fn test_has_running_rig_matches_context_binding() {
    let mut stack = new_stack();
    let bound = valid_context();
    let other = valid_context();

    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &bound, None);
    assert!(stack.has_running_rig(&bound));
    assert!(!stack.has_running_rig(&other));
}

#[test]
fn test_changed_only_refresh_keeps_untouched_rows() {
    let fov = VariableId::from_name("fov");
    let boost = VariableId::from_name("boost");

    let context = EvaluationContext::new();
    {
        let mut initial = context.initial_mut();
        initial.is_valid = true;
        initial.variables.set(fov, Value::Float(60.0));
    }
    let context = Arc::new(context);

    let mut stack = new_stack();
    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);

    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.variables.get(fov), Some(&Value::Float(60.0)));

    // Upstream now touches only "boost"; "fov" must survive untouched.
    {
        let mut initial = context.initial_mut();
        initial.clear_changed();
        initial.variables.set(boost, Value::Float(2.0));
    }
    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.variables.get(fov), Some(&Value::Float(60.0)));
    assert_eq!(output.variables.get(boost), Some(&Value::Float(2.0)));
}

#[test]
fn test_admission_overlay_supplies_tables_only() {
    let boost = VariableId::from_name("boost");

    let context = EvaluationContext::new();
    {
        let mut initial = context.initial_mut();
        initial.is_valid = true;
        initial.pose.set_position(Vec3::new(3.0, 0.0, 0.0));
        initial.clear_changed();
    }
    let mut overlay = rig_graph::EvaluationResult::new();
    overlay.variables.set(boost, Value::Float(2.0));
    context.set_conditional(DataCondition::ActiveRig, Some(overlay));
    let context = Arc::new(context);

    let mut stack = new_stack();
    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);

    // The overlay's variables land without clobbering the seeded pose.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.pose.position(), Vec3::new(3.0, 0.0, 0.0));
    assert_eq!(output.variables.get(boost), Some(&Value::Float(2.0)));

    // Admission recorded a valid context, so no fabricated cut.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(!output.is_cut);
    assert_eq!(output.pose.position(), Vec3::new(3.0, 0.0, 0.0));
}

#[test]
fn test_upstream_cut_reaches_output() {
    let mut stack = new_stack();
    let context = valid_context();
    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    stack.run(&stateful(1.0 / 60.0));

    context.initial_mut().is_cut = true;
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(output.is_cut);

    context.initial_mut().is_cut = false;
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(!output.is_cut);
}

#[test]
fn test_invalid_to_valid_transition_forces_cut() {
    let mut stack = new_stack();
    let context = valid_context();
    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);

    // First frame consumes FIRST_FRAME.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(!output.is_cut);

    context.initial_mut().is_valid = false;
    stack.run(&stateful(1.0 / 60.0));

    context.initial_mut().is_valid = true;
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(output.is_cut);

    // One frame only.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert!(!output.is_cut);
}

#[test]
fn test_blend_out_takes_over_at_interrupted_factor() {
    let mut stack = new_stack();
    let context = valid_context();

    stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    let b = stack.push(
        offset_rig("b", "rigs/b.rig", Vec3::new(10.0, 0.0, 0.0)),
        &context,
        Some(BlendConfig::linear(2.0)),
    );

    let output = stack.run(&stateful(1.0));
    assert_eq!(output.pose.position(), Vec3::new(5.0, 0.0, 0.0));

    // Interrupt the blend-in halfway; the blend-out starts where it was.
    stack.set_blending_out(b, BlendConfig::linear(1.0)).unwrap();
    let output = stack.run(&stateful(0.0));
    assert_eq!(output.pose.position(), Vec3::new(5.0, 0.0, 0.0));

    let output = stack.run(&stateful(0.5));
    assert_eq!(output.pose.position(), Vec3::new(2.5, 0.0, 0.0));
    assert!(!stack.is_ready_to_pop(b));

    stack.run(&stateful(0.5));
    assert!(stack.is_ready_to_pop(b));
    stack.pop_entry(b).unwrap();
    assert_eq!(stack.len(), 1);
}

#[test]
fn test_operation_routes_to_top_claimant() {
    let zoom = VariableId::from_name("zoom");
    let rig = |name: &str, source: &str, value: f32| {
        RigDefinitionBuilder::new(name, source)
            .root(Arc::new(SetVariableNode {
                target: zoom,
                value: Value::Float(value),
            }))
            .variable("zoom", Value::Float(0.0))
            .build()
    };

    let mut stack = new_stack();
    let context = valid_context();
    stack.push(rig("a", "rigs/a.rig", 1.0), &context, None);
    stack.push(rig("b", "rigs/b.rig", 2.0), &context, None);

    let mut op = RigOperation {
        target: zoom,
        value: Value::Float(9.0),
    };
    assert!(stack.execute_operation(&OperationParams { owner: OWNER }, &mut op));

    // The topmost claimant took it; the active entry wins composition.
    let output = stack.run(&stateful(1.0 / 60.0));
    assert_eq!(output.variables.get(zoom), Some(&Value::Float(9.0)));
}

#[test]
fn test_lifecycle_events() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();

    let mut stack = new_stack();
    stack.subscribe(move |event| {
        sink.borrow_mut().push((event.kind, event.id));
    });

    let context = valid_context();
    let a = stack.push(offset_rig("a", "rigs/a.rig", Vec3::ZERO), &context, None);
    let b = stack.push(offset_rig("b", "rigs/b.rig", Vec3::ZERO), &context, None);
    stack.pop_entries(1);
    drop(stack);

    assert_eq!(
        *log.borrow(),
        vec![
            (StackEventKind::Pushed, a),
            (StackEventKind::Pushed, b),
            (StackEventKind::Popped, a),
            (StackEventKind::Popped, b),
        ]
    );
}

#[test]
fn test_state_snapshot_round_trips() {
    let build = |stack: &mut BlendStack, context: &Arc<EvaluationContext>| {
        stack.push(
            offset_rig("a", "rigs/a.rig", Vec3::new(1.0, 0.0, 0.0)),
            context,
            None,
        );
        stack.push(
            offset_rig("b", "rigs/b.rig", Vec3::new(2.0, 0.0, 0.0)),
            context,
            Some(BlendConfig::linear(1.0)),
        );
    };

    let context = valid_context();
    let mut saved = new_stack();
    build(&mut saved, &context);
    saved.run(&stateful(0.25));
    let bytes = saved.save_state().unwrap();

    // Same shape, different history.
    let mut restored = new_stack();
    build(&mut restored, &context);
    restored.load_state(&bytes).unwrap();

    assert_eq!(restored.save_state().unwrap(), bytes);
    assert_eq!(
        restored.entries()[0].result(),
        saved.entries()[0].result()
    );
}

#[test]
fn test_state_snapshot_count_mismatch_restores_overlap() {
    init_logs();
    let context = valid_context();

    let mut saved = new_stack();
    saved.push(
        offset_rig("a", "rigs/a.rig", Vec3::new(1.0, 0.0, 0.0)),
        &context,
        None,
    );
    saved.push(
        offset_rig("b", "rigs/b.rig", Vec3::new(2.0, 0.0, 0.0)),
        &context,
        None,
    );
    saved.run(&stateful(0.25));
    let bytes = saved.save_state().unwrap();

    let mut shorter = new_stack();
    shorter.push(
        offset_rig("a", "rigs/a.rig", Vec3::new(1.0, 0.0, 0.0)),
        &context,
        None,
    );
    shorter.load_state(&bytes).unwrap();

    assert_eq!(shorter.entries()[0].result(), saved.entries()[0].result());
}
