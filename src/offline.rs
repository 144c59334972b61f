use serde::{Deserialize, Serialize};

pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Resources credited for time spent away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineProgressResult {
    /// Elapsed milliseconds after capping.
    pub time_offline: i64,
    pub resources_gained: u64,
    /// True when the raw gap exceeded the cap.
    pub capped_at: bool,
}

/// Capped offline gain for a gap of `elapsed_ms` at `resources_per_second`.
///
/// A negative gap (clock moved backwards) counts as no time at all. A rate
/// or cap that is negative or not finite credits nothing.
pub fn calculate(elapsed_ms: i64, resources_per_second: f64, cap_hours: f64) -> OfflineProgressResult {
    let cap_ms = if cap_hours.is_finite() && cap_hours > 0.0 {
        cap_hours * MS_PER_HOUR
    } else {
        0.0
    };

    let elapsed = elapsed_ms.max(0) as f64;
    let effective = elapsed.min(cap_ms);

    let resources_gained = if resources_per_second.is_finite() && resources_per_second > 0.0 {
        // Float to int casts saturate, so absurd rates clamp to u64::MAX.
        ((effective / 1000.0) * resources_per_second).floor() as u64
    } else {
        0
    };

    OfflineProgressResult {
        time_offline: effective as i64,
        resources_gained,
        capped_at: elapsed > cap_ms,
    }
}
