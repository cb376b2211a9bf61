//! Time utilities
//!
//! The toon shading model animates from one clock shared by every
//! multi-material in the process. Its epoch is taken the first time any
//! instance asks for it and never changes afterwards.

use std::sync::OnceLock;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
pub use web_time::{Duration, Instant};

static TOON_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Process-wide toon animation epoch.
#[must_use]
pub fn toon_epoch() -> Instant {
    *TOON_EPOCH.get_or_init(Instant::now)
}

/// Seconds elapsed between `epoch` and `now`, truncated to whole milliseconds.
///
/// The truncation happens in integer microseconds before the float
/// conversion, so the result carries no sub-millisecond rounding noise.
/// A `now` earlier than `epoch` yields `0.0`.
#[must_use]
pub fn elapsed_millis_as_seconds(epoch: Instant, now: Instant) -> f32 {
    let micros = now.saturating_duration_since(epoch).as_micros();
    let millis = micros / 1000;
    (millis as f64 / 1000.0) as f32
}
