use crate::clock::millis_between;
use crate::tracker::AccessPattern;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

const FREQUENCY_WEIGHT: f64 = 0.4;
const RECENCY_WEIGHT: f64 = 0.3;
const COUNT_WEIGHT: f64 = 0.3;

/// Accesses per second at which the frequency component saturates
const FREQUENCY_SATURATION: f64 = 10.0;
/// Access count at which the count component saturates
const COUNT_SATURATION: f64 = 100.0;
const RECENCY_WINDOW_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Priority of a key in `[0, 1]`, blending frequency, recency and access count.
pub fn priority_score(pattern: &AccessPattern, now: DateTime<Utc>) -> f64 {
    let frequency_score = unit(pattern.frequency / FREQUENCY_SATURATION);

    let age_ms = millis_between(pattern.last_access_time, now) as f64;
    let recency_score = unit(1.0 - age_ms / RECENCY_WINDOW_MS);

    let count_score = unit(pattern.access_count as f64 / COUNT_SATURATION);

    unit(
        FREQUENCY_WEIGHT * frequency_score
            + RECENCY_WEIGHT * recency_score
            + COUNT_WEIGHT * count_score,
    )
}

/// Score every pattern and keep the `limit` best, highest first.
pub fn top_candidates(
    patterns: Vec<AccessPattern>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<(AccessPattern, f64)> {
    let mut scored: Vec<(AccessPattern, f64)> = patterns
        .into_iter()
        .map(|pattern| {
            let score = priority_score(&pattern, now);
            (pattern, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit);
    scored
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
