//! Common utilities for clamping, time arithmetic and logging setup.

use chrono::{DateTime, Utc};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Clamp a score to [0, 1]. NaN maps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Clamp a valence to [-1, 1]. NaN maps to 0.
pub fn clamp_valence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Fractional days from `from` to `to`, floored at zero
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds();
    if millis <= 0 {
        0.0
    } else {
        millis as f64 / 1000.0 / SECONDS_PER_DAY
    }
}

/// Convert fractional days to a chrono duration, saturating at `TimeDelta::MAX`/`MIN`
pub fn days_to_duration(days: f64) -> chrono::Duration {
    let millis = (days * SECONDS_PER_DAY * 1000.0).round() as i64;
    chrono::TimeDelta::try_milliseconds(millis).unwrap_or(if millis < 0 {
        chrono::TimeDelta::MIN
    } else {
        chrono::TimeDelta::MAX
    })
}

/// Take the first `max_chars` characters of `text`, appending an ellipsis when cut
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Install a `tracing` subscriber for binaries and integration harnesses.
///
/// `RUST_LOG` wins over `default_directive`. Calling this more than once is a no-op.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
