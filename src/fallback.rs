//! Deterministic fallback planner.
//!
//! When the enhancer is unavailable or its plan fails validation, the
//! pipeline builds a plan from a finite keyword → template table instead.
//! Templates are consulted in declaration order and the first template with
//! a matching keyword wins; when several hints match different templates the
//! earliest table entry decides. Identical inputs always produce
//! bit-identical plans.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::sanitize::{sanitize_text, scene_identifier};
use crate::schema::{RawAction, RawObject, RawPlan};

const MAX_TITLE_CHARS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateKind {
    Projectile,
    Wave,
    Orbit,
    Sorting,
}

struct Template {
    kind: TemplateKind,
    keywords: &'static [&'static str],
}

/// Declaration order is the precedence order.
const TEMPLATES: &[Template] = &[
    Template {
        kind: TemplateKind::Projectile,
        keywords: &["projectile", "parabolic", "parabola", "trajectory", "launch"],
    },
    Template {
        kind: TemplateKind::Wave,
        keywords: &["sine", "wave", "oscillation", "oscillate"],
    },
    Template {
        kind: TemplateKind::Orbit,
        keywords: &["orbit", "circular", "circle", "planet"],
    },
    Template {
        kind: TemplateKind::Sorting,
        keywords: &["sort", "algorithm", "array", "bubble"],
    },
];

/// Physics values recovered from the request text, when present.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LaunchHints {
    v0: Option<f64>,
    angle_degrees: Option<f64>,
}

pub fn build_fallback(hints: &[String], original_text: &str) -> RawPlan {
    let mut needle = hints
        .iter()
        .map(|hint| hint.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    needle.push(' ');
    needle.push_str(&original_text.to_lowercase());

    let matched = TEMPLATES.iter().find(|template| {
        template
            .keywords
            .iter()
            .any(|keyword| needle.contains(keyword))
    });

    match matched.map(|template| template.kind) {
        Some(TemplateKind::Projectile) => projectile_plan(hints, original_text),
        Some(TemplateKind::Wave) => wave_plan(hints),
        Some(TemplateKind::Orbit) => orbit_plan(hints),
        Some(TemplateKind::Sorting) => sorting_plan(hints),
        None => default_plan(hints, original_text),
    }
}

fn projectile_plan(hints: &[String], original_text: &str) -> RawPlan {
    let launch = extract_launch_hints(original_text);
    let mut path_params = Map::new();
    if let Some(v0) = launch.v0 {
        path_params.insert("v0".to_owned(), json!(v0));
    }
    if let Some(angle) = launch.angle_degrees {
        path_params.insert("angle_degrees".to_owned(), json!(angle));
    }

    RawPlan {
        title: Some("Projectile Motion".to_owned()),
        objects: vec![
            object("axes", "Axes", Map::new()),
            object("arc", "Path", path_params),
            object("ball", "Dot", object_params(json!({"color": "YELLOW"}))),
        ],
        actions: vec![
            action("Create", &["axes"], Map::new()),
            action("FadeIn", &["ball"], Map::new()),
            action(
                "MoveAlongPath",
                &["ball"],
                object_params(json!({"path": "arc", "run_time": 3.0})),
            ),
            action("FadeOut", &["ball"], Map::new()),
        ],
        hints: hints.to_vec(),
    }
}

fn wave_plan(hints: &[String]) -> RawPlan {
    RawPlan {
        title: Some("Sine Wave".to_owned()),
        objects: vec![
            object("axes", "Axes", Map::new()),
            object("curve", "ParametricCurve", Map::new()),
            object("tracer", "Dot", object_params(json!({"color": "YELLOW"}))),
        ],
        actions: vec![
            action("Create", &["axes"], Map::new()),
            action("Create", &["curve"], Map::new()),
            action(
                "MoveAlongPath",
                &["tracer"],
                object_params(json!({"path": "curve", "run_time": 4.0})),
            ),
            action("FadeOut", &["tracer"], Map::new()),
        ],
        hints: hints.to_vec(),
    }
}

fn orbit_plan(hints: &[String]) -> RawPlan {
    RawPlan {
        title: Some("Circular Motion".to_owned()),
        objects: vec![
            object("orbit", "Circle", object_params(json!({"radius": 2.0}))),
            object("body", "Dot", object_params(json!({"color": "BLUE"}))),
        ],
        actions: vec![
            action("Create", &["orbit"], Map::new()),
            action("FadeIn", &["body"], Map::new()),
            action(
                "Animate",
                &["body"],
                object_params(json!({"scale": 1.5, "run_time": 2.0})),
            ),
            action("FadeOut", &["body"], Map::new()),
        ],
        hints: hints.to_vec(),
    }
}

fn sorting_plan(hints: &[String]) -> RawPlan {
    let positions = [-3.0, -1.0, 1.0, 3.0];
    let mut objects = Vec::with_capacity(positions.len() + 1);
    for (index, x) in positions.iter().enumerate() {
        objects.push(object(
            &format!("bar{}", index + 1),
            "Square",
            object_params(json!({"side": 0.8, "x": x})),
        ));
    }
    objects.push(object(
        "caption",
        "Text",
        object_params(json!({"text": "Compare and swap"})),
    ));

    let mut actions = Vec::with_capacity(positions.len() + 3);
    for index in 0..positions.len() {
        let id = format!("bar{}", index + 1);
        actions.push(action("Create", &[id.as_str()], Map::new()));
    }
    actions.push(action("FadeIn", &["caption"], Map::new()));
    actions.push(action(
        "Animate",
        &["bar1"],
        object_params(json!({"shift_x": 2.0, "run_time": 1.5})),
    ));
    actions.push(action("FadeOut", &["caption"], Map::new()));

    RawPlan {
        title: Some("Sorting Steps".to_owned()),
        objects,
        actions,
        hints: hints.to_vec(),
    }
}

fn default_plan(hints: &[String], original_text: &str) -> RawPlan {
    let cleaned = sanitize_text(original_text);
    let mut title: String = cleaned.chars().take(MAX_TITLE_CHARS).collect();
    if cleaned.chars().count() > MAX_TITLE_CHARS {
        // Cut at the last word boundary rather than mid-word.
        if let Some(boundary) = title.rfind(' ') {
            title.truncate(boundary);
        }
    }
    let title = title.trim().to_owned();
    // Separator-only requests have no identifier to offer; title the scene
    // generically so it always validates and generates.
    let title = if scene_identifier(&title).is_none() {
        "Generated Scene".to_owned()
    } else {
        title
    };
    let label = title.clone();

    RawPlan {
        title: Some(title),
        objects: vec![object(
            "label",
            "Text",
            object_params(json!({"text": label})),
        )],
        actions: vec![
            action("Create", &["label"], Map::new()),
            action("FadeOut", &["label"], object_params(json!({"run_time": 1.0}))),
        ],
        hints: hints.to_vec(),
    }
}

fn extract_launch_hints(text: &str) -> LaunchHints {
    static ANGLE: OnceLock<Regex> = OnceLock::new();
    static SPEED: OnceLock<Regex> = OnceLock::new();
    let angle_re = ANGLE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(?:degrees|degree|deg\b)").expect("static regex")
    });
    let speed_re = SPEED.get_or_init(|| {
        Regex::new(r"(?:v0\s*=?\s*|at\s+)?(\d+(?:\.\d+)?)\s*m/s").expect("static regex")
    });

    let lower = text.to_lowercase();
    let angle_degrees = angle_re
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());
    let v0 = speed_re
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok());

    LaunchHints { v0, angle_degrees }
}

fn object(id: &str, kind: &str, params: Map<String, Value>) -> RawObject {
    RawObject {
        id: Some(id.to_owned()),
        kind: Some(kind.to_owned()),
        params,
    }
}

fn action(kind: &str, targets: &[&str], params: Map<String, Value>) -> RawAction {
    RawAction {
        kind: Some(kind.to_owned()),
        target: None,
        targets: targets.iter().map(|target| (*target).to_owned()).collect(),
        params,
    }
}

fn object_params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::validate;

    fn hint(value: &str) -> Vec<String> {
        vec![value.to_owned()]
    }

    #[test]
    fn projectile_hint_selects_projectile_template() {
        let plan = build_fallback(&hint("parabolic trajectory"), "");
        assert_eq!(plan.title.as_deref(), Some("Projectile Motion"));
        let kinds: Vec<_> = plan
            .objects
            .iter()
            .filter_map(|object| object.kind.as_deref())
            .collect();
        assert_eq!(kinds, ["Axes", "Path", "Dot"]);
        assert!(plan
            .actions
            .iter()
            .any(|action| action.kind.as_deref() == Some("MoveAlongPath")));
    }

    #[test]
    fn keyword_in_original_text_matches_too() {
        let plan = build_fallback(&[], "show a ball launch into the air");
        assert_eq!(plan.title.as_deref(), Some("Projectile Motion"));
    }

    #[test]
    fn first_matching_template_wins_on_ambiguity() {
        // "projectile" (table entry 0) beats "wave" (entry 1) regardless of
        // hint order.
        let hints = vec!["wave packet".to_owned(), "projectile".to_owned()];
        let plan = build_fallback(&hints, "");
        assert_eq!(plan.title.as_deref(), Some("Projectile Motion"));
    }

    #[test]
    fn unmatched_hints_fall_through_to_default_template() {
        let plan = build_fallback(&hint("history of rome"), "The fall of Rome");
        assert_eq!(plan.objects.len(), 1);
        assert_eq!(plan.objects[0].kind.as_deref(), Some("Text"));
        let action_kinds: Vec<_> = plan
            .actions
            .iter()
            .filter_map(|action| action.kind.as_deref())
            .collect();
        assert_eq!(action_kinds, ["Create", "FadeOut"]);
    }

    #[test]
    fn empty_input_still_yields_a_valid_plan() {
        let plan = build_fallback(&[], "");
        assert_eq!(plan.title.as_deref(), Some("Generated Scene"));
        validate(&plan).expect("default template must validate");
    }

    #[test]
    fn separator_only_input_gets_the_generic_title() {
        for text in ["___", "_ _ _", "!!!"] {
            let plan = build_fallback(&[], text);
            assert_eq!(plan.title.as_deref(), Some("Generated Scene"));
            validate(&plan).unwrap_or_else(|failure| {
                panic!("plan for {text:?} must validate: {failure}")
            });
        }
    }

    #[test]
    fn long_requests_truncate_at_a_word_boundary() {
        let text = "visualize the quick brown fox jumping over the lazy dog repeatedly forever";
        let plan = build_fallback(&[], text);
        let title = plan.title.expect("default template has a title");
        assert!(title.chars().count() <= MAX_TITLE_CHARS);
        assert!(text.starts_with(&title), "title not a prefix: {title:?}");
        assert_eq!(text.as_bytes()[title.len()], b' ', "cut mid-word: {title:?}");
    }

    #[test]
    fn launch_parameters_extracted_from_text() {
        let plan = build_fallback(&[], "launch a ball at 30 degrees with v0 = 8 m/s");
        let arc = plan
            .objects
            .iter()
            .find(|object| object.id.as_deref() == Some("arc"))
            .expect("projectile template has an arc");
        assert_eq!(arc.params["angle_degrees"].as_f64(), Some(30.0));
        assert_eq!(arc.params["v0"].as_f64(), Some(8.0));
    }

    #[test]
    fn identical_inputs_are_bit_identical() {
        let hints = hint("projectile motion");
        let text = "throw a ball at 45 degrees";
        let first = serde_json::to_string(&build_fallback(&hints, text)).unwrap();
        let second = serde_json::to_string(&build_fallback(&hints, text)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn every_template_validates_with_zero_violations() {
        let probes = [
            "projectile",
            "sine",
            "orbit",
            "sort",
            "something unmatched entirely",
        ];
        for probe in probes {
            let plan = build_fallback(&hint(probe), probe);
            validate(&plan).unwrap_or_else(|failure| {
                panic!("template for '{probe}' must validate: {failure}")
            });
        }
    }
}
