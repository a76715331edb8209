//! Interval search and keyframe sampling.
//!
//! Model:
//! - A curve is an ordered run of contiguous intervals `[start, end)`, each naming two key groups.
//! - `find_next_interval` walks forward from the interval used last frame. Sample times per
//!   curve are non-decreasing between frames, so the search is O(1) amortized.
//! - `Step` holds key0; `Linear` lerps (or slerps for rotations) between key0 and key1.
//! - Velocity curves are scaled per lane after interpolation.
//! - Inactive curves (no intervals) get their idle value and a zero sample count.

use serde::{Deserialize, Serialize};

use crate::data::{AnimResource, Curve, CurveKind, Interval};
use crate::interp::functions::{lerp_vec4, mul_vec4, slerp_quat};
use crate::mix::SampleBuffer;
use crate::time::Tick;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    /// Hold the interval's first key.
    Step,
    #[default]
    Linear,
}

/// Index of the interval containing `time`, searching forward from `hint`.
///
/// Restarts at 0 when `time` precedes the hinted interval. Times before the
/// first interval return 0, times past the last return the last index.
/// An empty slice returns 0; callers skip inactive curves before searching.
pub fn find_next_interval(intervals: &[Interval], time: Tick, hint: usize) -> usize {
    let n = intervals.len();
    if n == 0 {
        return 0;
    }
    let mut i = match intervals.get(hint) {
        Some(iv) if time >= iv.start => hint,
        _ => 0,
    };
    while i + 1 < n && time >= intervals[i].end {
        i += 1;
    }
    i
}

/// Per-curve search hints for one job.
#[derive(Clone, Debug, Default)]
pub struct IntervalCursor {
    hints: Vec<usize>,
}

impl IntervalCursor {
    pub fn new(num_curves: usize) -> Self {
        Self {
            hints: vec![0; num_curves],
        }
    }

    #[inline]
    pub fn hint(&self, curve: usize) -> usize {
        self.hints.get(curve).copied().unwrap_or(0)
    }

    #[inline]
    fn store(&mut self, curve: usize, index: usize) {
        if curve >= self.hints.len() {
            self.hints.resize(curve + 1, 0);
        }
        self.hints[curve] = index;
    }

    pub fn reset(&mut self) {
        self.hints.fill(0);
    }
}

/// Fraction of `interval` elapsed at `time`, clamped to `[0, 1]`.
#[inline]
pub fn interval_weight(interval: &Interval, time: Tick) -> f32 {
    let span = interval.end - interval.start;
    if span <= 0 || time >= interval.end {
        1.0
    } else if time <= interval.start {
        0.0
    } else {
        (time - interval.start) as f32 / span as f32
    }
}

/// Sample one active curve. Returns the value and the interval index used.
pub fn sample_curve(
    resource: &AnimResource,
    curve: &Curve,
    time: Tick,
    sample_type: SampleType,
    velocity_scale: [f32; 4],
    hint: usize,
) -> ([f32; 4], usize) {
    let intervals = resource.curve_intervals(curve);
    let index = find_next_interval(intervals, time, hint);
    let Some(interval) = intervals.get(index) else {
        return (curve.idle_value, 0);
    };
    let width = curve.kind.key_width();
    let key0 = resource.key_group(interval.key0, width);

    let mut value = match sample_type {
        SampleType::Step => key0,
        SampleType::Linear => {
            let key1 = resource.key_group(interval.key1, width);
            let t = interval_weight(interval, time);
            match curve.kind {
                CurveKind::Rotation => slerp_quat(key0, key1, t),
                _ => lerp_vec4(key0, key1, t),
            }
        }
    };
    if curve.kind == CurveKind::Velocity {
        value = mul_vec4(value, velocity_scale);
    }
    (value, index)
}

/// Sample every curve of `clip` at clip-relative `time` into `out`.
pub fn sample_clip(
    resource: &AnimResource,
    clip: usize,
    time: Tick,
    sample_type: SampleType,
    velocity_scale: [f32; 4],
    cursor: &mut IntervalCursor,
    out: &mut SampleBuffer,
) {
    for (ci, curve) in resource.curves(clip).iter().enumerate() {
        if !curve.is_active() {
            out.set(ci, curve.idle_value, 0);
            continue;
        }
        let (value, index) = sample_curve(
            resource,
            curve,
            time,
            sample_type,
            velocity_scale,
            cursor.hint(ci),
        );
        cursor.store(ci, index);
        out.set(ci, value, 1);
    }
}
