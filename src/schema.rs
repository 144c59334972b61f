//! Declarative validation of untrusted game state.
//!
//! A [`ValidationSchema`] is an ordered list of fields, each either a leaf
//! [`ValidationRule`] or a nested schema. [`validate`] walks the schema and
//! produces a sanitized copy of the data shaped like the schema.
//!
//! Two failure classes are treated differently. Missing required fields,
//! wrong types and failed custom predicates are structural corruption: the
//! field is dropped and an error is reported. Numbers drifting outside
//! `min`/`max` and values outside `allowed_values` are repaired in place and
//! are *not* reported as errors; each repair is listed in
//! [`ValidationResult::corrections`] instead.
//!
//! ```rust
//! use idle_save_core::schema::{validate, ValidationRule, ValidationSchema};
//! use serde_json::json;
//!
//! let schema = ValidationSchema::new().nested(
//!     "resources",
//!     ValidationSchema::new().rule("primary", ValidationRule::number().required().min(0.0)),
//! );
//! let result = validate(&json!({"resources": {"primary": -5}}), &schema);
//! assert!(result.is_valid);
//! assert_eq!(result.sanitized["resources"]["primary"], json!(0));
//! ```

use std::fmt;
use std::sync::Arc;

use log::warn;
use serde_json::{Map, Value};

use crate::sanitize::number_value;

/// JSON type a rule can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Object => "object",
            ValueType::Array => "array",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Number => value.is_number(),
            ValueType::Boolean => value.is_boolean(),
            ValueType::Object => value.is_object(),
            ValueType::Array => value.is_array(),
        }
    }
}

/// Name of a JSON value's type, for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub type CustomValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Constraints on a single field. Absent attributes impose nothing.
#[derive(Clone, Default)]
pub struct ValidationRule {
    pub required: bool,
    pub value_type: Option<ValueType>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub allowed_values: Option<Vec<Value>>,
    pub custom_validator: Option<CustomValidator>,
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("required", &self.required)
            .field("value_type", &self.value_type)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("allowed_values", &self.allowed_values)
            .field("custom_validator", &self.custom_validator.is_some())
            .finish()
    }
}

impl ValidationRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(value_type: ValueType) -> Self {
        Self {
            value_type: Some(value_type),
            ..Self::default()
        }
    }

    pub fn number() -> Self {
        Self::of_type(ValueType::Number)
    }

    pub fn string() -> Self {
        Self::of_type(ValueType::String)
    }

    pub fn boolean() -> Self {
        Self::of_type(ValueType::Boolean)
    }

    pub fn object() -> Self {
        Self::of_type(ValueType::Object)
    }

    pub fn array() -> Self {
        Self::of_type(ValueType::Array)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn allowed_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.custom_validator = Some(Arc::new(predicate));
        self
    }
}

/// A schema entry: a leaf rule or a nested subtree.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Rule(ValidationRule),
    Nested(ValidationSchema),
}

/// Ordered field definitions. Validation visits fields in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ValidationSchema {
    fields: Vec<(String, SchemaNode)>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, key: impl Into<String>, rule: ValidationRule) -> Self {
        self.fields.push((key.into(), SchemaNode::Rule(rule)));
        self
    }

    pub fn nested(mut self, key: impl Into<String>, schema: ValidationSchema) -> Self {
        self.fields.push((key.into(), SchemaNode::Nested(schema)));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Schema for the standard idle-game state: resources, upgrades, game
    /// timing and player settings.
    pub fn game_state() -> Self {
        Self::new()
            .nested(
                "resources",
                Self::new()
                    .rule("primary", ValidationRule::number().required().min(0.0))
                    .rule("generationRate", ValidationRule::number().required().min(0.0))
                    .rule("clickPower", ValidationRule::number().required().min(1.0))
                    .rule("totalEarned", ValidationRule::number().required().min(0.0)),
            )
            .nested(
                "upgrades",
                Self::new()
                    .rule("owned", ValidationRule::object().required())
                    .rule("unlocked", ValidationRule::object().required())
                    .rule("costs", ValidationRule::object().required()),
            )
            .nested(
                "game",
                Self::new()
                    .rule("gameStartTime", ValidationRule::number().required().min(0.0))
                    .rule("lastSaveTime", ValidationRule::number().required().min(0.0))
                    .rule("totalPlayTime", ValidationRule::number().required().min(0.0))
                    .rule("isOffline", ValidationRule::boolean()),
            )
            .nested(
                "settings",
                Self::new()
                    .rule("audioEnabled", ValidationRule::boolean())
                    .rule("hapticEnabled", ValidationRule::boolean())
                    .rule("reducedMotion", ValidationRule::boolean())
                    .rule(
                        "theme",
                        ValidationRule::string().allowed_values(["light", "dark", "auto"]),
                    ),
            )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Path-qualified hard failures.
    pub errors: Vec<String>,
    /// Path-qualified notes for values that were silently repaired.
    pub corrections: Vec<String>,
    pub sanitized: Value,
}

/// Validate `data` against `schema`. Never stops at the first failure.
pub fn validate(data: &Value, schema: &ValidationSchema) -> ValidationResult {
    let mut report = Report::default();
    let sanitized = sanitize_object(data, schema, "", &mut report);

    ValidationResult {
        is_valid: report.errors.is_empty(),
        errors: report.errors,
        corrections: report.corrections,
        sanitized: Value::Object(sanitized),
    }
}

static NULL: Value = Value::Null;

#[derive(Default)]
struct Report {
    errors: Vec<String>,
    corrections: Vec<String>,
}

fn sanitize_object(data: &Value, schema: &ValidationSchema, path: &str, report: &mut Report) -> Map<String, Value> {
    let mut sanitized = Map::new();

    let Some(object) = data.as_object() else {
        let location = if path.is_empty() { "<root>" } else { path };
        report
            .errors
            .push(format!("{location}: expected object, got {}", type_name(data)));
        return sanitized;
    };

    for (key, node) in schema.fields() {
        let current_path = if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}.{key}")
        };
        let value = object.get(key).unwrap_or(&NULL);

        match node {
            SchemaNode::Rule(rule) => {
                if let Some(checked) = validate_value(value, rule, &current_path, report) {
                    sanitized.insert(key.to_string(), checked);
                }
            }
            SchemaNode::Nested(nested) => {
                let subtree = sanitize_object(value, nested, &current_path, report);
                sanitized.insert(key.to_string(), Value::Object(subtree));
            }
        }
    }

    sanitized
}

fn validate_value(value: &Value, rule: &ValidationRule, path: &str, report: &mut Report) -> Option<Value> {
    if value.is_null() {
        if rule.required {
            report.errors.push(format!("{path}: required field is missing"));
        }
        return None;
    }

    if let Some(expected) = rule.value_type {
        if !expected.matches(value) {
            report.errors.push(format!(
                "{path}: type mismatch, expected {}, got {}",
                expected.as_str(),
                type_name(value)
            ));
            return None;
        }
    }

    if rule.value_type == Some(ValueType::Number) {
        if let Some(number) = value.as_f64() {
            if let Some(min) = rule.min.filter(|min| number < *min) {
                return Some(correct(report, path, value, number_value(min), "below minimum"));
            }
            if let Some(max) = rule.max.filter(|max| number > *max) {
                return Some(correct(report, path, value, number_value(max), "above maximum"));
            }
        }
    }

    if let Some(allowed) = rule.allowed_values.as_ref().filter(|allowed| !allowed.is_empty()) {
        if !allowed.iter().any(|candidate| same_value(candidate, value)) {
            let replacement = allowed[0].clone();
            return Some(correct(report, path, value, replacement, "not an allowed value"));
        }
    }

    if let Some(predicate) = &rule.custom_validator {
        if !predicate(value) {
            report.errors.push(format!("{path}: custom validation failed"));
            return None;
        }
    }

    Some(value.clone())
}

/// JSON equality, except numbers compare by value so `1` matches `1.0`.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn correct(report: &mut Report, path: &str, original: &Value, replacement: Value, reason: &str) -> Value {
    warn!("Auto-corrected {path}: {original} -> {replacement} ({reason})");
    report
        .corrections
        .push(format!("{path}: {original} -> {replacement} ({reason})"));
    replacement
}
