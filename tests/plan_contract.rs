//! End-to-end plan contract: rejection, normalization, autofill, and the
//! rejected-plan-to-fallback handoff, exercised through the public API.

use planc::codegen::{generate, SceneIdRegistry};
use planc::errors::{SCHEMA_VIOLATION, UNSAFE_CONTENT};
use planc::fallback::build_fallback;
use planc::schema::{RawAction, RawObject, RawPlan};
use planc::validator::validate;
use serde_json::{json, Map, Value};

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn object(id: &str, kind: &str, p: Map<String, Value>) -> RawObject {
    RawObject {
        id: Some(id.to_owned()),
        kind: Some(kind.to_owned()),
        params: p,
    }
}

fn action(kind: &str, target: &str, p: Map<String, Value>) -> RawAction {
    RawAction {
        kind: Some(kind.to_owned()),
        target: Some(target.to_owned()),
        targets: Vec::new(),
        params: p,
    }
}

#[test]
fn rejected_empty_plan_hands_its_hints_to_the_fallback() {
    // An enhancer response with hints but no scene content.
    let raw = RawPlan {
        title: None,
        objects: Vec::new(),
        actions: Vec::new(),
        hints: vec!["parabolic".to_owned()],
    };
    let failure = validate(&raw).expect_err("empty plan must be rejected");
    assert_eq!(failure.to_coded().code, SCHEMA_VIOLATION);

    let fallback = build_fallback(&raw.hints, "");
    assert_eq!(fallback.title.as_deref(), Some("Projectile Motion"));
    let plan = validate(&fallback).expect("fallback plan must validate");

    let registry = SceneIdRegistry::new();
    let generated = generate(&plan, &registry).expect("fallback plan must generate");
    assert!(generated.source.contains("ParametricFunction"));
    assert!(generated.source.contains("MoveAlongPath"));
}

#[test]
fn unknown_action_kind_is_rejected_not_guessed() {
    let raw = RawPlan {
        title: Some("Demo".to_owned()),
        objects: vec![object("ball", "Dot", Map::new())],
        actions: vec![action("Explode", "ball", Map::new())],
        hints: Vec::new(),
    };
    let failure = validate(&raw).expect_err("unknown action kind must be rejected");
    assert!(failure
        .violations
        .iter()
        .any(|violation| violation.path == "actions[0].type"));
}

#[test]
fn out_of_range_values_clamp_and_missing_values_default() {
    let raw = RawPlan {
        title: Some("Demo".to_owned()),
        objects: vec![object("c", "Circle", params(json!({"radius": 99.0})))],
        actions: vec![action("FadeIn", "c", Map::new())],
        hints: Vec::new(),
    };
    let plan = validate(&raw).expect("plan should validate with clamping");

    assert_eq!(plan.objects[0].params["radius"].as_f64(), Some(5.0));
    assert_eq!(plan.objects[0].params["color"].as_str(), Some("WHITE"));
    assert_eq!(plan.actions[0].params["run_time"].as_f64(), Some(0.8));
    assert_eq!(plan.actions[0].params["easing"].as_str(), Some("linear"));
}

#[test]
fn move_along_path_autofills_the_only_traversable_object() {
    let raw = RawPlan {
        title: Some("Trace".to_owned()),
        objects: vec![
            object("curve", "ParametricCurve", Map::new()),
            object("tracer", "Dot", Map::new()),
        ],
        actions: vec![
            action("Create", "curve", Map::new()),
            action("MoveAlongPath", "tracer", Map::new()),
        ],
        hints: Vec::new(),
    };
    let plan = validate(&raw).expect("plan should validate with autofill");
    assert_eq!(plan.actions[1].params["path"].as_str(), Some("curve"));
}

#[test]
fn move_along_path_with_two_traversables_is_ambiguous() {
    let raw = RawPlan {
        title: Some("Trace".to_owned()),
        objects: vec![
            object("a", "Path", Map::new()),
            object("b", "ParametricCurve", Map::new()),
            object("tracer", "Dot", Map::new()),
        ],
        actions: vec![action("MoveAlongPath", "tracer", Map::new())],
        hints: Vec::new(),
    };
    let failure = validate(&raw).expect_err("ambiguous path must be rejected");
    assert_eq!(failure.to_coded().code, SCHEMA_VIOLATION);
}

#[test]
fn unresolved_action_target_is_rejected() {
    let raw = RawPlan {
        title: Some("Demo".to_owned()),
        objects: vec![object("ball", "Dot", Map::new())],
        actions: vec![action("FadeIn", "ghost", Map::new())],
        hints: Vec::new(),
    };
    let failure = validate(&raw).expect_err("dangling target must be rejected");
    assert!(failure
        .violations
        .iter()
        .any(|violation| violation.path == "actions[0].target"));
}

#[test]
fn plan_of_only_stripped_garbage_reports_unsafe_content() {
    let raw = RawPlan {
        title: Some("$$$ ///".to_owned()),
        objects: vec![object("ball", "Dot", Map::new())],
        actions: vec![action("FadeIn", "ball", Map::new())],
        hints: Vec::new(),
    };
    let failure = validate(&raw).expect_err("all-garbage title must be rejected");
    assert_eq!(failure.to_coded().code, UNSAFE_CONTENT);
}

#[test]
fn separator_only_request_still_compiles_offline() {
    // A request with no identifier-bearing characters must still flow
    // through fallback, validation, and generation.
    let plan = validate(&build_fallback(&[], "___")).expect("fallback plan must validate");
    assert_eq!(plan.title, "Generated Scene");
    let registry = SceneIdRegistry::new();
    let generated = generate(&plan, &registry).expect("fallback plan must generate");
    assert!(generated.source.contains("class Generated_Scene(Scene):"));
}

#[test]
fn validation_is_a_fixed_point_over_every_template() {
    let probes = ["projectile", "wave", "orbit", "sort", "plain request", "___"];
    for probe in probes {
        let plan = validate(&build_fallback(&[], probe)).expect("template must validate");
        let again = validate(&plan.to_raw()).expect("re-validation must succeed");
        assert_eq!(plan, again, "template for '{probe}' should be a fixed point");
    }
}
