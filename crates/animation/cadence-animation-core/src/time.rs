//! Integer tick time base.
//!
//! All scheduling happens in whole ticks (1 tick = 1 ms) so long sessions do not
//! drift. Seconds only appear at the edges.

/// Engine time unit, one millisecond.
pub type Tick = i64;

pub const TICKS_PER_SECOND: f64 = 1000.0;

#[inline]
pub fn ticks_to_seconds(ticks: Tick) -> f64 {
    ticks as f64 / TICKS_PER_SECOND
}

/// Rounds to the nearest tick.
#[inline]
pub fn seconds_to_ticks(seconds: f64) -> Tick {
    (seconds * TICKS_PER_SECOND).round() as Tick
}
