use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn write_plan(path: &Path, json: &str) {
    fs::write(path, json).expect("plan should write");
}

fn run_planc(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_planc"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("planc command should run")
}

const VALID_PLAN: &str = r#"{
  "title": "Bouncing Ball",
  "objects": [
    {"id": "ball", "type": "Dot", "params": {"color": "RED"}}
  ],
  "actions": [
    {"type": "FadeIn", "target": "ball", "params": {}},
    {"type": "FadeOut", "target": "ball", "params": {"run_time": 1.5}}
  ]
}"#;

#[test]
fn check_accepts_a_valid_plan() {
    let dir = tempdir().expect("tempdir should create");
    write_plan(&dir.path().join("plan.json"), VALID_PLAN);

    let output = run_planc(dir.path(), &["check", "plan.json"]);
    assert!(output.status.success(), "check should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OK: Bouncing Ball"), "stdout: {stdout}");
    assert!(stdout.contains("1 objects, 2 actions"), "stdout: {stdout}");
}

#[test]
fn check_rejects_unknown_object_kind_with_schema_violation_envelope() {
    let dir = tempdir().expect("tempdir should create");
    write_plan(
        &dir.path().join("plan.json"),
        r#"{
  "title": "Boom",
  "objects": [{"id": "x", "type": "Explosion", "params": {}}],
  "actions": [{"type": "FadeIn", "target": "x", "params": {}}]
}"#,
    );

    let output = run_planc(dir.path(), &["--agent-json", "check", "plan.json"]);
    assert!(!output.status.success(), "check should fail");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let envelope: Value = serde_json::from_str(stdout.trim()).expect("envelope should be JSON");
    assert_eq!(envelope["ok"], Value::Bool(false));
    assert_eq!(envelope["error"]["code"], "SCHEMA_VIOLATION");
    let violations = envelope["error"]["details"]["violations"]
        .as_array()
        .expect("violations array");
    assert!(violations
        .iter()
        .any(|violation| violation["path"] == "objects[0].type"));
}

#[test]
fn missing_plan_file_is_a_usage_error_with_exit_code_two() {
    let dir = tempdir().expect("tempdir should create");

    let output = run_planc(dir.path(), &["--agent-json", "check", "no_such_plan.json"]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let envelope: Value = serde_json::from_str(stdout.trim()).expect("envelope should be JSON");
    assert_eq!(envelope["error"]["code"], "USAGE");
}

#[test]
fn gen_writes_a_scene_script() {
    let dir = tempdir().expect("tempdir should create");
    write_plan(&dir.path().join("plan.json"), VALID_PLAN);

    let output = run_planc(dir.path(), &["gen", "plan.json", "-o", "out"]);
    assert!(output.status.success(), "gen should succeed");

    let script_path = dir.path().join("out").join("Bouncing_Ball.py");
    assert!(script_path.exists(), "script should exist");
    let script = fs::read_to_string(&script_path).expect("script should read");
    assert!(script.contains("from manim import *"));
    assert!(script.contains("class Bouncing_Ball(Scene):"));
    assert!(script.contains("self.wait(0.5)"));
}

#[test]
fn fallback_prints_a_validated_plan() {
    let dir = tempdir().expect("tempdir should create");

    let output = run_planc(dir.path(), &["fallback", "show", "a", "sine", "wave"]);
    assert!(output.status.success(), "fallback should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let plan: Value = serde_json::from_str(stdout.trim()).expect("plan should be JSON");
    assert_eq!(plan["title"], "Sine Wave");
    assert!(plan["objects"].as_array().is_some_and(|objects| !objects.is_empty()));
}

#[test]
fn run_without_text_is_a_usage_error() {
    let dir = tempdir().expect("tempdir should create");

    let output = run_planc(dir.path(), &["--agent-json", "run"]);
    assert_eq!(output.status.code(), Some(2));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let envelope: Value = serde_json::from_str(stdout.trim()).expect("envelope should be JSON");
    assert_eq!(envelope["error"]["code"], "USAGE");
}
