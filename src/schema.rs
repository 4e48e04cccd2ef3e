use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard gravity used whenever a projectile plan omits `g`.
pub const DEFAULT_GRAVITY: f64 = 9.81;
pub const DEFAULT_LAUNCH_SPEED: f64 = 12.0;
pub const DEFAULT_LAUNCH_ANGLE_DEGREES: f64 = 45.0;
pub const DEFAULT_RUN_TIME: f64 = 0.8;

/// Untrusted decode target for enhancer output. Every field is optional or
/// defaulted so a partially formed document still decodes; the validator is
/// the component that decides what is acceptable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPlan {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub objects: Vec<RawObject>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// Closed set of constructible objects. This enum is the single source of
/// truth shared by the validator and the code generator; adding a variant
/// without an emitter arm is a compile error, not a runtime drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Dot,
    Text,
    Axes,
    Circle,
    Square,
    Path,
    ParametricCurve,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 7] = [
        Self::Dot,
        Self::Text,
        Self::Axes,
        Self::Circle,
        Self::Square,
        Self::Path,
        Self::ParametricCurve,
    ];

    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim() {
            "Dot" => Some(Self::Dot),
            "Text" => Some(Self::Text),
            "Axes" => Some(Self::Axes),
            "Circle" => Some(Self::Circle),
            "Square" => Some(Self::Square),
            "Path" => Some(Self::Path),
            "ParametricCurve" => Some(Self::ParametricCurve),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dot => "Dot",
            Self::Text => "Text",
            Self::Axes => "Axes",
            Self::Circle => "Circle",
            Self::Square => "Square",
            Self::Path => "Path",
            Self::ParametricCurve => "ParametricCurve",
        }
    }

    /// True for kinds that can serve as the `path` of a MoveAlongPath action.
    pub fn is_traversable(self) -> bool {
        matches!(self, Self::Path | Self::ParametricCurve)
    }
}

/// Closed set of animation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    FadeIn,
    Create,
    MoveAlongPath,
    FadeOut,
    Animate,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        Self::FadeIn,
        Self::Create,
        Self::MoveAlongPath,
        Self::FadeOut,
        Self::Animate,
    ];

    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim() {
            "FadeIn" => Some(Self::FadeIn),
            "Create" => Some(Self::Create),
            "MoveAlongPath" => Some(Self::MoveAlongPath),
            "FadeOut" => Some(Self::FadeOut),
            "Animate" => Some(Self::Animate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FadeIn => "FadeIn",
            Self::Create => "Create",
            Self::MoveAlongPath => "MoveAlongPath",
            Self::FadeOut => "FadeOut",
            Self::Animate => "Animate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "ease_in" => Some(Self::EaseIn),
            "ease_out" => Some(Self::EaseOut),
            "ease_in_out" => Some(Self::EaseInOut),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseIn => "ease_in",
            Self::EaseOut => "ease_out",
            Self::EaseInOut => "ease_in_out",
        }
    }
}

/// One row of the declared numeric range table. Finite out-of-range values
/// clamp; missing values take the default when one is declared; non-finite
/// values are always a violation.
#[derive(Debug, Clone, Copy)]
pub struct NumericRange {
    pub key: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: Option<f64>,
}

impl NumericRange {
    const fn new(key: &'static str, min: f64, max: f64, default: Option<f64>) -> Self {
        Self {
            key,
            min,
            max,
            default,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

const DOT_RANGES: &[NumericRange] = &[
    NumericRange::new("x", -8.0, 8.0, Some(0.0)),
    NumericRange::new("y", -5.0, 5.0, Some(0.0)),
];

const TEXT_RANGES: &[NumericRange] = &[NumericRange::new("font_size", 8.0, 96.0, Some(36.0))];

const AXES_RANGES: &[NumericRange] = &[
    NumericRange::new("x_min", -50.0, 50.0, Some(0.0)),
    NumericRange::new("x_max", -50.0, 50.0, Some(10.0)),
    NumericRange::new("y_min", -50.0, 50.0, Some(0.0)),
    NumericRange::new("y_max", -50.0, 50.0, Some(6.0)),
];

const CIRCLE_RANGES: &[NumericRange] = &[
    NumericRange::new("radius", 0.05, 5.0, Some(0.7)),
    NumericRange::new("x", -8.0, 8.0, Some(0.0)),
    NumericRange::new("y", -5.0, 5.0, Some(0.0)),
];

const SQUARE_RANGES: &[NumericRange] = &[
    NumericRange::new("side", 0.05, 5.0, Some(1.0)),
    NumericRange::new("x", -8.0, 8.0, Some(0.0)),
    NumericRange::new("y", -5.0, 5.0, Some(0.0)),
];

const PATH_RANGES: &[NumericRange] = &[
    NumericRange::new("v0", 0.1, 50.0, Some(DEFAULT_LAUNCH_SPEED)),
    NumericRange::new(
        "angle_degrees",
        1.0,
        89.0,
        Some(DEFAULT_LAUNCH_ANGLE_DEGREES),
    ),
    NumericRange::new("g", 0.1, 30.0, Some(DEFAULT_GRAVITY)),
];

const PARAMETRIC_CURVE_RANGES: &[NumericRange] = &[
    NumericRange::new("amplitude", 0.1, 4.0, Some(1.0)),
    NumericRange::new("frequency", 0.1, 10.0, Some(1.0)),
    NumericRange::new("t_max", 0.5, 20.0, Some(6.283185)),
];

const ACTION_RANGES: &[NumericRange] = &[
    NumericRange::new("run_time", 0.1, 30.0, Some(DEFAULT_RUN_TIME)),
    NumericRange::new("scale", 0.1, 10.0, None),
    NumericRange::new("shift_x", -8.0, 8.0, None),
    NumericRange::new("shift_y", -5.0, 5.0, None),
];

impl ObjectKind {
    pub fn numeric_ranges(self) -> &'static [NumericRange] {
        match self {
            Self::Dot => DOT_RANGES,
            Self::Text => TEXT_RANGES,
            Self::Axes => AXES_RANGES,
            Self::Circle => CIRCLE_RANGES,
            Self::Square => SQUARE_RANGES,
            Self::Path => PATH_RANGES,
            Self::ParametricCurve => PARAMETRIC_CURVE_RANGES,
        }
    }

    /// String parameters destined for code emission. These pass through the
    /// sanitizer and only ever land in string-literal positions.
    pub fn string_params(self) -> &'static [&'static str] {
        match self {
            Self::Dot | Self::Circle | Self::Square => &["color"],
            Self::Text => &["text", "color"],
            Self::Axes | Self::Path | Self::ParametricCurve => &[],
        }
    }
}

impl ActionKind {
    pub fn numeric_ranges(self) -> &'static [NumericRange] {
        ACTION_RANGES
    }

    /// MoveAlongPath carries a `path` reference that must resolve to a
    /// traversable object.
    pub fn requires_path(self) -> bool {
        matches!(self, Self::MoveAlongPath)
    }
}

/// Manim color keywords accepted for `color` params. Anything else autofills
/// to WHITE rather than reaching generated source.
pub const ALLOWED_COLORS: &[&str] = &[
    "WHITE", "YELLOW", "BLUE", "RED", "GREEN", "ORANGE", "PURPLE", "GRAY",
];

pub const DEFAULT_COLOR: &str = "WHITE";

pub fn normalize_color(value: &str) -> Option<&'static str> {
    let upper = value.trim().to_ascii_uppercase();
    ALLOWED_COLORS.iter().find(|c| **c == upper).copied()
}

/// A plan that has passed the validator: ids unique, kinds closed, ranges
/// clamped, strings sanitized. The code generator never mutates one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedPlan {
    pub title: String,
    pub objects: Vec<SceneObject>,
    pub actions: Vec<SceneAction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub targets: Vec<String>,
    pub params: Map<String, Value>,
}

impl ValidatedPlan {
    /// Re-projects into the untrusted shape. Used to assert that autofill is
    /// a fixed point: validating the projection reproduces this plan.
    pub fn to_raw(&self) -> RawPlan {
        RawPlan {
            title: Some(self.title.clone()),
            objects: self
                .objects
                .iter()
                .map(|object| RawObject {
                    id: Some(object.id.clone()),
                    kind: Some(object.kind.as_str().to_owned()),
                    params: object.params.clone(),
                })
                .collect(),
            actions: self
                .actions
                .iter()
                .map(|action| RawAction {
                    kind: Some(action.kind.as_str().to_owned()),
                    target: None,
                    targets: action.targets.clone(),
                    params: action.params.clone(),
                })
                .collect(),
            hints: self.hints.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_kind_keywords_round_trip() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_keyword(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::from_keyword("Explode"), None);
        assert_eq!(ObjectKind::from_keyword("dot"), None);
    }

    #[test]
    fn action_kind_keywords_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_keyword(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::from_keyword("Explode"), None);
    }

    #[test]
    fn easing_defaults_to_linear() {
        assert_eq!(Easing::default(), Easing::Linear);
        assert_eq!(Easing::from_keyword("EASE_IN"), Some(Easing::EaseIn));
        assert_eq!(Easing::from_keyword("bounce"), None);
    }

    #[test]
    fn range_clamp_is_inclusive() {
        let range = NumericRange::new("radius", 0.05, 5.0, Some(0.7));
        assert_eq!(range.clamp(10.0), 5.0);
        assert_eq!(range.clamp(-1.0), 0.05);
        assert_eq!(range.clamp(0.7), 0.7);
    }

    #[test]
    fn color_normalization_is_case_insensitive() {
        assert_eq!(normalize_color("yellow"), Some("YELLOW"));
        assert_eq!(normalize_color(" WHITE "), Some("WHITE"));
        assert_eq!(normalize_color("chartreuse"), None);
    }

    #[test]
    fn raw_plan_decodes_partial_documents() {
        let raw: RawPlan = serde_json::from_str(r#"{"title": "X"}"#).unwrap();
        assert_eq!(raw.title.as_deref(), Some("X"));
        assert!(raw.objects.is_empty());

        let raw: RawPlan =
            serde_json::from_str(r#"{"objects": [{"id": "a"}], "actions": [{}]}"#).unwrap();
        assert!(raw.title.is_none());
        assert_eq!(raw.objects.len(), 1);
        assert!(raw.objects[0].kind.is_none());
    }
}
