//! Plan validation: structural checks, closed-enum checks, reference
//! resolution, range clamping, and string sanitization.
//!
//! `validate` is a pure function of its input and the static rule tables in
//! [`crate::schema`]. It either returns a fully autofilled [`ValidatedPlan`]
//! or a [`ValidationFailure`] listing every violation found; never a partial
//! result. Autofill is a fixed point: validating the re-projection of a
//! validated plan reproduces it byte for byte.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::{json, Map, Value};

use crate::errors::CodedError;
use crate::sanitize::{object_variable, sanitize_text, scene_identifier};
use crate::schema::{
    normalize_color, ActionKind, Easing, NumericRange, ObjectKind, RawAction, RawObject, RawPlan,
    SceneAction, SceneObject, ValidatedPlan, DEFAULT_COLOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Schema,
    UnsafeContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
    pub kind: ViolationKind,
}

impl Violation {
    fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            kind: ViolationKind::Schema,
        }
    }

    fn unsafe_content(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            kind: ViolationKind::UnsafeContent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    /// Folds the violation list into the pipeline error taxonomy. A plan
    /// whose only problems are sanitization failures reports as unsafe
    /// content; anything structural reports as a schema violation.
    pub fn to_coded(&self) -> CodedError {
        let details = json!({
            "violations": self
                .violations
                .iter()
                .map(|violation| json!({"path": violation.path, "reason": violation.reason}))
                .collect::<Vec<_>>()
        });
        let all_unsafe = self
            .violations
            .iter()
            .all(|violation| violation.kind == ViolationKind::UnsafeContent);
        let summary = format!("plan rejected with {} violation(s)", self.violations.len());
        if all_unsafe && !self.violations.is_empty() {
            CodedError::unsafe_content(summary).with_details(details)
        } else {
            CodedError::schema_violation(summary).with_details(details)
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan rejected: ")?;
        for (index, violation) in self.violations.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", violation.path, violation.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

pub fn validate(raw: &RawPlan) -> Result<ValidatedPlan, ValidationFailure> {
    let mut violations = Vec::new();

    let title = check_title(raw, &mut violations);
    let objects = check_objects(&raw.objects, &mut violations);

    // References resolve against the full object set, so forward
    // declarations in the JSON are fine; output ordering is always
    // objects-then-actions.
    let kinds_by_id: HashMap<&str, ObjectKind> = objects
        .iter()
        .map(|object| (object.id.as_str(), object.kind))
        .collect();
    let actions = check_actions(&raw.actions, &kinds_by_id, &mut violations);

    if !violations.is_empty() {
        return Err(ValidationFailure { violations });
    }

    let hints = raw
        .hints
        .iter()
        .map(|hint| sanitize_text(hint))
        .filter(|hint| !hint.is_empty())
        .collect();

    Ok(ValidatedPlan {
        title,
        objects,
        actions,
        hints,
    })
}

fn check_title(raw: &RawPlan, violations: &mut Vec<Violation>) -> String {
    match raw.title.as_deref() {
        None => {
            violations.push(Violation::schema("title", "missing required field"));
            String::new()
        }
        Some(value) if value.trim().is_empty() => {
            violations.push(Violation::schema("title", "must be a non-empty string"));
            String::new()
        }
        Some(value) => {
            let cleaned = sanitize_text(value);
            if cleaned.is_empty() {
                violations.push(Violation::unsafe_content(
                    "title",
                    "empty after removing disallowed characters",
                ));
            } else if scene_identifier(&cleaned).is_none() {
                // Separators alone survive sanitization but cannot name a
                // scene class; rejecting here keeps codegen total over
                // validated plans.
                violations.push(Violation::unsafe_content(
                    "title",
                    "no identifier characters survive sanitization",
                ));
            }
            cleaned
        }
    }
}

fn check_objects(raw_objects: &[RawObject], violations: &mut Vec<Violation>) -> Vec<SceneObject> {
    if raw_objects.is_empty() {
        violations.push(Violation::schema("objects", "must contain at least one object"));
    }

    let mut objects = Vec::with_capacity(raw_objects.len());
    // Two distinct ids that sanitize to the same variable name would alias
    // in generated source, so variable collisions are rejected too.
    let mut variables_seen: BTreeMap<String, String> = BTreeMap::new();

    for (index, raw) in raw_objects.iter().enumerate() {
        let path = format!("objects[{index}]");

        let id = match raw.id.as_deref().map(str::trim) {
            None | Some("") => {
                violations.push(Violation::schema(format!("{path}.id"), "missing required field"));
                continue;
            }
            Some(id) => id.to_owned(),
        };

        let variable = object_variable(&id);
        match variables_seen.get(&variable) {
            Some(existing) if existing == &id => {
                violations.push(Violation::schema(
                    format!("{path}.id"),
                    format!("duplicate id '{id}'"),
                ));
                continue;
            }
            Some(existing) => {
                violations.push(Violation::schema(
                    format!("{path}.id"),
                    format!("id '{id}' collides with '{existing}' after sanitization"),
                ));
                continue;
            }
            None => {
                variables_seen.insert(variable, id.clone());
            }
        }

        let kind = match raw.kind.as_deref() {
            None | Some("") => {
                violations.push(Violation::schema(
                    format!("{path}.type"),
                    "missing required field",
                ));
                continue;
            }
            Some(keyword) => match ObjectKind::from_keyword(keyword) {
                Some(kind) => kind,
                None => {
                    // Unknown types are a hard rejection; substituting one
                    // would silently change the scene's meaning.
                    violations.push(Violation::schema(
                        format!("{path}.type"),
                        format!("unknown object type '{keyword}'"),
                    ));
                    continue;
                }
            },
        };

        let params = check_object_params(&id, kind, &raw.params, &path, violations);
        objects.push(SceneObject { id, kind, params });
    }

    objects
}

fn check_object_params(
    id: &str,
    kind: ObjectKind,
    raw_params: &Map<String, Value>,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Map<String, Value> {
    let mut params = Map::new();

    for range in kind.numeric_ranges() {
        check_numeric(raw_params, range, path, &mut params, violations);
    }

    for key in kind.string_params() {
        let param_path = format!("{path}.params.{key}");
        match raw_params.get(*key) {
            None => {
                let fallback = match *key {
                    "color" => DEFAULT_COLOR.to_owned(),
                    // A label with no text shows its own id; an id that
                    // sanitizes to nothing gets a generic label so the
                    // autofilled value is itself valid.
                    "text" => {
                        let derived = sanitize_text(id);
                        if derived.is_empty() {
                            "Label".to_owned()
                        } else {
                            derived
                        }
                    }
                    other => {
                        violations.push(Violation::schema(
                            param_path,
                            format!("no default declared for '{other}'"),
                        ));
                        continue;
                    }
                };
                params.insert((*key).to_owned(), Value::String(fallback));
            }
            Some(Value::String(value)) => {
                let cleaned = match *key {
                    "color" => normalize_color(value).unwrap_or(DEFAULT_COLOR).to_owned(),
                    _ => sanitize_text(value),
                };
                if cleaned.is_empty() {
                    violations.push(Violation::unsafe_content(
                        param_path,
                        "empty after removing disallowed characters",
                    ));
                    continue;
                }
                params.insert((*key).to_owned(), Value::String(cleaned));
            }
            Some(other) => {
                violations.push(Violation::schema(
                    param_path,
                    format!("expected string, got {}", json_type_name(other)),
                ));
            }
        }
    }

    if kind == ObjectKind::Axes {
        fix_axis_window(&mut params, "x_min", "x_max", 0.0, 10.0);
        fix_axis_window(&mut params, "y_min", "y_max", 0.0, 6.0);
    }

    params
}

/// Clamping can collapse an axis window (min == max); reset a degenerate
/// window to its declared defaults so emitted Axes ranges stay well formed.
fn fix_axis_window(params: &mut Map<String, Value>, min_key: &str, max_key: &str, lo: f64, hi: f64) {
    let min = params.get(min_key).and_then(Value::as_f64);
    let max = params.get(max_key).and_then(Value::as_f64);
    if let (Some(min), Some(max)) = (min, max) {
        if min >= max {
            params.insert(min_key.to_owned(), json_number(lo));
            params.insert(max_key.to_owned(), json_number(hi));
        }
    }
}

fn check_actions(
    raw_actions: &[RawAction],
    kinds_by_id: &HashMap<&str, ObjectKind>,
    violations: &mut Vec<Violation>,
) -> Vec<SceneAction> {
    if raw_actions.is_empty() {
        violations.push(Violation::schema("actions", "must contain at least one action"));
    }

    let mut actions = Vec::with_capacity(raw_actions.len());

    for (index, raw) in raw_actions.iter().enumerate() {
        let path = format!("actions[{index}]");

        let kind = match raw.kind.as_deref() {
            None | Some("") => {
                violations.push(Violation::schema(
                    format!("{path}.type"),
                    "missing required field",
                ));
                continue;
            }
            Some(keyword) => match ActionKind::from_keyword(keyword) {
                Some(kind) => kind,
                None => {
                    violations.push(Violation::schema(
                        format!("{path}.type"),
                        format!("unknown action type '{keyword}'"),
                    ));
                    continue;
                }
            },
        };

        let mut targets: Vec<String> = Vec::new();
        if let Some(target) = raw.target.as_deref() {
            if !target.trim().is_empty() {
                targets.push(target.trim().to_owned());
            }
        }
        targets.extend(
            raw.targets
                .iter()
                .map(|target| target.trim().to_owned())
                .filter(|target| !target.is_empty()),
        );

        if targets.is_empty() {
            violations.push(Violation::schema(
                format!("{path}.target"),
                "missing object reference",
            ));
            continue;
        }

        let mut resolved = true;
        for target in &targets {
            if !kinds_by_id.contains_key(target.as_str()) {
                violations.push(Violation::schema(
                    format!("{path}.target"),
                    format!("unresolved reference '{target}'"),
                ));
                resolved = false;
            }
        }
        if !resolved {
            continue;
        }

        let params = check_action_params(kind, &raw.params, &path, kinds_by_id, violations);
        actions.push(SceneAction {
            kind,
            targets,
            params,
        });
    }

    actions
}

fn check_action_params(
    kind: ActionKind,
    raw_params: &Map<String, Value>,
    path: &str,
    kinds_by_id: &HashMap<&str, ObjectKind>,
    violations: &mut Vec<Violation>,
) -> Map<String, Value> {
    let mut params = Map::new();

    for range in kind.numeric_ranges() {
        check_numeric(raw_params, range, path, &mut params, violations);
    }

    match raw_params.get("easing") {
        None => {
            params.insert(
                "easing".to_owned(),
                Value::String(Easing::default().as_str().to_owned()),
            );
        }
        Some(Value::String(value)) => match Easing::from_keyword(value) {
            Some(easing) => {
                params.insert("easing".to_owned(), Value::String(easing.as_str().to_owned()));
            }
            None => {
                violations.push(Violation::schema(
                    format!("{path}.params.easing"),
                    format!("unknown easing '{value}'"),
                ));
            }
        },
        Some(other) => {
            violations.push(Violation::schema(
                format!("{path}.params.easing"),
                format!("expected string, got {}", json_type_name(other)),
            ));
        }
    }

    if kind.requires_path() {
        check_path_reference(raw_params, path, kinds_by_id, &mut params, violations);
    }

    // A bare Animate has nothing to animate; give it the declared default
    // emphasis so it stays meaningful and idempotent.
    if kind == ActionKind::Animate
        && !params.contains_key("scale")
        && !params.contains_key("shift_x")
        && !params.contains_key("shift_y")
    {
        params.insert("scale".to_owned(), json_number(1.5));
    }

    params
}

fn check_path_reference(
    raw_params: &Map<String, Value>,
    path: &str,
    kinds_by_id: &HashMap<&str, ObjectKind>,
    params: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    match raw_params.get("path") {
        Some(Value::String(reference)) => {
            let reference = reference.trim();
            match kinds_by_id.get(reference) {
                Some(kind) if kind.is_traversable() => {
                    params.insert("path".to_owned(), Value::String(reference.to_owned()));
                }
                Some(kind) => {
                    violations.push(Violation::schema(
                        format!("{path}.params.path"),
                        format!(
                            "'{reference}' is a {}, expected Path or ParametricCurve",
                            kind.as_str()
                        ),
                    ));
                }
                None => {
                    violations.push(Violation::schema(
                        format!("{path}.params.path"),
                        format!("unresolved reference '{reference}'"),
                    ));
                }
            }
        }
        Some(other) => {
            violations.push(Violation::schema(
                format!("{path}.params.path"),
                format!("expected string, got {}", json_type_name(other)),
            ));
        }
        None => {
            // When exactly one traversable object exists the intent is
            // unambiguous and the reference autofills.
            let mut traversable = kinds_by_id
                .iter()
                .filter(|(_, kind)| kind.is_traversable())
                .map(|(id, _)| (*id).to_owned())
                .collect::<Vec<_>>();
            traversable.sort();
            if traversable.len() == 1 {
                params.insert(
                    "path".to_owned(),
                    Value::String(traversable.into_iter().next().unwrap_or_default()),
                );
            } else {
                violations.push(Violation::schema(
                    format!("{path}.params.path"),
                    "missing path reference",
                ));
            }
        }
    }
}

fn check_numeric(
    raw_params: &Map<String, Value>,
    range: &NumericRange,
    path: &str,
    params: &mut Map<String, Value>,
    violations: &mut Vec<Violation>,
) {
    let param_path = format!("{path}.params.{}", range.key);
    match raw_params.get(range.key) {
        None => {
            if let Some(default) = range.default {
                params.insert(range.key.to_owned(), json_number(default));
            }
        }
        Some(value) => match value.as_f64() {
            Some(number) if number.is_finite() => {
                params.insert(range.key.to_owned(), json_number(range.clamp(number)));
            }
            Some(_) => {
                violations.push(Violation::schema(param_path, "must be a finite number"));
            }
            None => {
                violations.push(Violation::schema(
                    param_path,
                    format!("expected number, got {}", json_type_name(value)),
                ));
            }
        },
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
