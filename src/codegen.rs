//! Lowers a validated plan into Manim CE source.
//!
//! Generation is a pure function of the plan plus the injected identifier
//! registry: no clocks, no randomness, no map-order dependence. The same
//! validated plan always produces byte-identical source. Untrusted text only
//! ever appears inside Python string literals, already sanitized by the
//! validator and escaped again here.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};

use crate::errors::CodedError;
use crate::sanitize::{object_variable, python_string_literal, scene_identifier};
use crate::schema::{
    ActionKind, Easing, ObjectKind, SceneAction, SceneObject, ValidatedPlan, DEFAULT_COLOR,
    DEFAULT_GRAVITY, DEFAULT_LAUNCH_ANGLE_DEGREES, DEFAULT_LAUNCH_SPEED, DEFAULT_RUN_TIME,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    pub scene_id: String,
    pub source: String,
}

/// Process-wide set of issued scene identifiers. Owned by the orchestrator
/// and passed into `generate` so collision avoidance works across
/// concurrent requests without ambient global state.
#[derive(Debug, Default)]
pub struct SceneIdRegistry {
    issued: Mutex<HashSet<String>>,
}

impl SceneIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserves a unique identifier derived from `base`:
    /// `base`, then `base_2`, `base_3`, ...
    pub fn issue(&self, base: &str) -> String {
        let mut issued = self
            .issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if issued.insert(base.to_owned()) {
            return base.to_owned();
        }
        let mut suffix = 2u64;
        loop {
            let candidate = format!("{base}_{suffix}");
            if issued.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

/// Intermediate representation: one node per plan entry, in plan order.
enum Node<'a> {
    Construct(&'a SceneObject),
    Play(&'a SceneAction),
}

pub fn generate(plan: &ValidatedPlan, registry: &SceneIdRegistry) -> Result<GeneratedSource> {
    let base = scene_identifier(&plan.title).ok_or_else(|| {
        anyhow!(CodedError::codegen_inconsistency(
            "validated plan has no derivable scene identifier",
        ))
    })?;
    let scene_id = registry.issue(&base);

    let nodes: Vec<Node> = plan
        .objects
        .iter()
        .map(Node::Construct)
        .chain(plan.actions.iter().map(Node::Play))
        .collect();

    let constructed: HashMap<&str, &SceneObject> = plan
        .objects
        .iter()
        .map(|object| (object.id.as_str(), object))
        .collect();

    let mut lines = Vec::with_capacity(nodes.len() + 8);
    lines.push("from manim import *".to_owned());
    lines.push("import numpy as np".to_owned());
    lines.push(String::new());
    lines.push(String::new());
    lines.push(format!("class {scene_id}(Scene):"));
    lines.push("    def construct(self):".to_owned());

    for node in &nodes {
        match node {
            Node::Construct(object) => lines.push(emit_construct(object)),
            Node::Play(action) => lines.push(emit_play(action, &constructed)?),
        }
    }
    lines.push("        self.wait(0.5)".to_owned());

    let mut source = lines.join("\n");
    source.push('\n');

    Ok(GeneratedSource { scene_id, source })
}

/// One construction statement per object kind. The match is exhaustive over
/// the shared enum, so a new kind without an emitter arm fails to compile
/// rather than drifting out of sync with the validator.
fn emit_construct(object: &SceneObject) -> String {
    let var = object_variable(&object.id);
    let params = &object.params;
    let expr = match object.kind {
        ObjectKind::Dot => format!(
            "Dot(color={}).move_to({})",
            color(params),
            point(params, "x", "y")
        ),
        ObjectKind::Text => format!(
            "Text({}, font_size={}, color={})",
            python_string_literal(text(params)),
            py_float(num(params, "font_size", 36.0)),
            color(params)
        ),
        ObjectKind::Axes => format!(
            "Axes(x_range=[{}, {}], y_range=[{}, {}])",
            py_float(num(params, "x_min", 0.0)),
            py_float(num(params, "x_max", 10.0)),
            py_float(num(params, "y_min", 0.0)),
            py_float(num(params, "y_max", 6.0))
        ),
        ObjectKind::Circle => format!(
            "Circle(radius={}, color={}).move_to({})",
            py_float(num(params, "radius", 0.7)),
            color(params),
            point(params, "x", "y")
        ),
        ObjectKind::Square => format!(
            "Square(side_length={}, color={}).move_to({})",
            py_float(num(params, "side", 1.0)),
            color(params),
            point(params, "x", "y")
        ),
        ObjectKind::Path => {
            let (expr, t_end) = projectile_parametric(params);
            format!("ParametricFunction({expr}, t_range=[0.0, {}])", py_float(t_end))
        }
        ObjectKind::ParametricCurve => {
            let amplitude = py_float(num(params, "amplitude", 1.0));
            let frequency = py_float(num(params, "frequency", 1.0));
            let t_max = py_float(num(params, "t_max", 6.283185));
            format!(
                "ParametricFunction(lambda t: np.array([t, {amplitude}*np.sin({frequency}*t), 0.0]), t_range=[0.0, {t_max}])"
            )
        }
    };
    format!("        {var} = {expr}")
}

fn emit_play(action: &SceneAction, constructed: &HashMap<&str, &SceneObject>) -> Result<String> {
    let run_time = py_float(num(&action.params, "run_time", DEFAULT_RUN_TIME));
    let rate_func = rate_function(&action.params);

    let calls: Vec<String> = match action.kind {
        ActionKind::FadeIn => target_calls(action, "FadeIn"),
        ActionKind::Create => target_calls(action, "Create"),
        ActionKind::FadeOut => target_calls(action, "FadeOut"),
        ActionKind::MoveAlongPath => {
            let path_id = action
                .params
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| inconsistency("MoveAlongPath action without a path reference"))?;
            let path_object = constructed
                .get(path_id)
                .ok_or_else(|| inconsistency("MoveAlongPath path is not a constructed object"))?;
            if !path_object.kind.is_traversable() {
                return Err(inconsistency("MoveAlongPath path object is not traversable"));
            }
            let path_var = object_variable(path_id);
            action
                .targets
                .iter()
                .map(|target| format!("MoveAlongPath({}, {path_var})", object_variable(target)))
                .collect()
        }
        ActionKind::Animate => action
            .targets
            .iter()
            .map(|target| animate_call(target, &action.params))
            .collect(),
    };

    Ok(format!(
        "        self.play({}, run_time={run_time}, rate_func={rate_func})",
        calls.join(", ")
    ))
}

fn target_calls(action: &SceneAction, constructor: &str) -> Vec<String> {
    action
        .targets
        .iter()
        .map(|target| format!("{constructor}({})", object_variable(target)))
        .collect()
}

fn animate_call(target: &str, params: &Map<String, Value>) -> String {
    let var = object_variable(target);
    let mut call = format!("{var}.animate");
    if let Some(scale) = params.get("scale").and_then(Value::as_f64) {
        call.push_str(&format!(".scale({})", py_float(scale)));
    }
    let shift_x = params.get("shift_x").and_then(Value::as_f64);
    let shift_y = params.get("shift_y").and_then(Value::as_f64);
    if shift_x.is_some() || shift_y.is_some() {
        call.push_str(&format!(
            ".shift(np.array([{}, {}, 0.0]))",
            py_float(shift_x.unwrap_or(0.0)),
            py_float(shift_y.unwrap_or(0.0))
        ));
    }
    call
}

/// Closed-form projectile trajectory: x(t) = vx*t, y(t) = vy*t - g*t^2/2,
/// with flight time 2*vy/g (floored at half a second so degenerate launches
/// still animate).
fn projectile_parametric(params: &Map<String, Value>) -> (String, f64) {
    let v0 = num(params, "v0", DEFAULT_LAUNCH_SPEED);
    let angle_degrees = num(params, "angle_degrees", DEFAULT_LAUNCH_ANGLE_DEGREES);
    let g = num(params, "g", DEFAULT_GRAVITY);

    let theta = angle_degrees.to_radians();
    let vx = v0 * theta.cos();
    let vy = v0 * theta.sin();
    let t_end = (2.0 * vy / g).max(0.5);

    let expr = format!(
        "lambda t: np.array([{vx}*t, {vy}*t - 0.5*{g}*t**2, 0.0])",
        vx = py_float(vx),
        vy = py_float(vy),
        g = py_float(g)
    );
    (expr, t_end)
}

fn rate_function(params: &Map<String, Value>) -> &'static str {
    let easing = params
        .get("easing")
        .and_then(Value::as_str)
        .and_then(Easing::from_keyword)
        .unwrap_or_default();
    match easing {
        Easing::Linear => "linear",
        Easing::EaseIn => "rate_functions.ease_in_quad",
        Easing::EaseOut => "rate_functions.ease_out_quad",
        Easing::EaseInOut => "rate_functions.ease_in_out_quad",
    }
}

fn color(params: &Map<String, Value>) -> &str {
    params
        .get("color")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_COLOR)
}

fn text(params: &Map<String, Value>) -> &str {
    params.get("text").and_then(Value::as_str).unwrap_or("")
}

fn num(params: &Map<String, Value>, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn point(params: &Map<String, Value>, x_key: &str, y_key: &str) -> String {
    format!(
        "np.array([{}, {}, 0.0])",
        py_float(num(params, x_key, 0.0)),
        py_float(num(params, y_key, 0.0))
    )
}

/// Fixed six-decimal formatting with trailing zeros trimmed; keeps emitted
/// floats stable across platforms and plans.
fn py_float(value: f64) -> String {
    let mut rendered = format!("{value:.6}");
    while rendered.ends_with('0') {
        rendered.pop();
    }
    if rendered.ends_with('.') {
        rendered.push('0');
    }
    rendered
}

fn inconsistency(message: &str) -> anyhow::Error {
    anyhow!(CodedError::codegen_inconsistency(message))
}
