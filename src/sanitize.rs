//! Clamping and coercion of untrusted numbers and strings.
//!
//! All functions are pure and total: NaN, infinities and values of the wrong
//! JSON type map to a defined fallback instead of propagating.

use std::collections::BTreeMap;

use log::warn;
use serde_json::{Map, Value};

/// Largest integer an `f64` (and a JavaScript number) represents exactly.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Default maximum age accepted by [`validate_timestamp`]: one year.
pub const DEFAULT_MAX_TIMESTAMP_AGE_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Floor `value` and clamp it into `[min, max]`; `min` for non-finite input.
pub fn sanitize_number(value: f64, min: i64, max: i64) -> i64 {
    if !value.is_finite() {
        return min;
    }
    let floored = value.floor();
    if floored <= min as f64 {
        min
    } else if floored >= max as f64 {
        max
    } else {
        floored as i64
    }
}

/// [`sanitize_number`] over `0..=MAX_SAFE_INTEGER`.
pub fn sanitize_number_default(value: f64) -> i64 {
    sanitize_number(value, 0, MAX_SAFE_INTEGER)
}

/// [`sanitize_number`] for a JSON value; anything but a number yields `min`.
pub fn sanitize_value(value: &Value, min: i64, max: i64) -> i64 {
    match value.as_f64() {
        Some(number) => sanitize_number(number, min, max),
        None => min,
    }
}

/// Saturating add that never exceeds `max`.
pub fn safe_increment(current: f64, delta: f64, max: f64) -> f64 {
    let result = current + delta;
    if result.is_nan() || result > max {
        max
    } else {
        result
    }
}

/// Saturating subtract that never drops below `min`.
pub fn safe_decrement(current: f64, delta: f64, min: f64) -> f64 {
    let result = current - delta;
    if result.is_nan() || result < min {
        min
    } else {
        result
    }
}

/// Per-field bounds for [`sanitize_numbers`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericLimits {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericLimits {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

/// Clamp named numeric fields of `object` in place. Fields that are missing
/// or not numbers are left alone. Returns how many fields were changed.
pub fn sanitize_numbers(object: &mut Map<String, Value>, limits: &BTreeMap<String, NumericLimits>) -> usize {
    let mut changed = 0;
    for (key, limit) in limits {
        let Some(current) = object.get(key).and_then(Value::as_f64) else {
            continue;
        };
        let mut clamped = current;
        if let Some(min) = limit.min {
            if clamped < min {
                warn!("Sanitized {key}: {current} -> {min} (below minimum)");
                clamped = min;
            }
        }
        if let Some(max) = limit.max {
            if clamped > max {
                warn!("Sanitized {key}: {current} -> {max} (above maximum)");
                clamped = max;
            }
        }
        if clamped != current {
            object.insert(key.clone(), number_value(clamped));
            changed += 1;
        }
    }
    changed
}

/// Copy of `data` restricted to `allowed_keys`. Non-objects give an empty map.
pub fn strip_unknown_properties(data: &Value, allowed_keys: &[&str]) -> Map<String, Value> {
    let Some(object) = data.as_object() else {
        return Map::new();
    };
    allowed_keys
        .iter()
        .filter_map(|key| object.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

/// True when `0 < timestamp <= now` and the timestamp is at most
/// `max_age_ms` old.
pub fn validate_timestamp(timestamp: i64, now: i64, max_age_ms: i64) -> bool {
    timestamp > 0 && timestamp <= now && now - timestamp <= max_age_ms
}

/// Clamp a percentage into `[0, 100]`; NaN becomes 0.
pub fn validate_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        return 0.0;
    }
    progress.clamp(0.0, 100.0)
}

/// Coerce an untrusted value to a bounded string.
///
/// Non-strings become empty. The result holds at most `max_len` characters;
/// with `alphanumeric_only` everything but ASCII letters, digits and
/// whitespace is removed.
pub fn validate_string(value: &Value, max_len: usize, alphanumeric_only: bool) -> String {
    let Some(text) = value.as_str() else {
        return String::new();
    };
    text.chars()
        .take(max_len)
        .filter(|c| !alphanumeric_only || c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect()
}

/// JSON number for `value`, as an integer when it is integral and exactly
/// representable so that `0.0` round-trips as `0`.
pub(crate) fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER as f64 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
