use serde::Deserialize;

use crate::data::{AnimEvent, AnimResource, Clip, Curve, CurveKind, InfinityType, Interval};
use crate::error::ResourceError;
use crate::time::Tick;

/// Public API: parse a JSON keyframe resource into the flat [`AnimResource`] layout.
///
/// Notes:
/// - Intervals are authored per curve and flattened into one interval buffer here.
/// - `key0`/`key1` are float offsets into the top-level `keys` array.
/// - All clips must animate the same number of curves.
/// - Validation failures are reported as [`ResourceError`]; a resource that loads
///   never fails later during sampling.
pub fn parse_anim_resource_json(s: &str) -> Result<AnimResource, ResourceError> {
    let stored: StoredResource = serde_json::from_str(s)?;
    build_resource(stored)
}

fn build_resource(stored: StoredResource) -> Result<AnimResource, ResourceError> {
    let key_len = stored.keys.len();
    let expected_curves = stored.clips.first().map(|c| c.curves.len());

    let mut intervals: Vec<Interval> = Vec::new();
    let mut clips: Vec<Clip> = Vec::with_capacity(stored.clips.len());

    for sc in stored.clips {
        if sc.duration <= 0 {
            return Err(ResourceError::InvalidClip {
                clip: sc.name,
                reason: format!("duration must be > 0 ticks, got {}", sc.duration),
            });
        }
        if Some(sc.curves.len()) != expected_curves {
            return Err(ResourceError::InvalidClip {
                reason: format!(
                    "has {} curves, resource expects {}",
                    sc.curves.len(),
                    expected_curves.unwrap_or(0)
                ),
                clip: sc.name,
            });
        }

        let mut curves = Vec::with_capacity(sc.curves.len());
        for (ci, stored_curve) in sc.curves.into_iter().enumerate() {
            validate_intervals(&sc.name, ci, &stored_curve.intervals)?;
            let width = stored_curve.kind.key_width();
            for iv in &stored_curve.intervals {
                for offset in [iv.key0, iv.key1] {
                    let offset = offset as usize;
                    if offset + width > key_len {
                        return Err(ResourceError::KeyOutOfRange {
                            offset,
                            width,
                            len: key_len,
                        });
                    }
                }
            }
            let first_interval = intervals.len();
            let num_intervals = stored_curve.intervals.len();
            intervals.extend(stored_curve.intervals);
            curves.push(Curve {
                kind: stored_curve.kind,
                first_interval,
                num_intervals,
                idle_value: stored_curve.idle_value,
            });
        }

        validate_events(&sc.name, sc.duration, &sc.events)?;

        clips.push(Clip {
            name: sc.name,
            curves,
            events: sc.events,
            duration: sc.duration,
            pre_infinity: sc.pre_infinity,
            post_infinity: sc.post_infinity,
        });
    }

    Ok(AnimResource::new(clips, stored.keys, intervals))
}

fn validate_intervals(clip: &str, curve: usize, intervals: &[Interval]) -> Result<(), ResourceError> {
    let invalid = |reason: String| ResourceError::InvalidCurve {
        clip: clip.to_string(),
        curve,
        reason,
    };
    for (i, iv) in intervals.iter().enumerate() {
        if iv.start >= iv.end {
            return Err(invalid(format!(
                "interval {i} is empty or reversed: [{}, {})",
                iv.start, iv.end
            )));
        }
    }
    for (i, pair) in intervals.windows(2).enumerate() {
        if pair[0].end != pair[1].start {
            return Err(invalid(format!(
                "interval {} ends at {} but interval {} starts at {}",
                i,
                pair[0].end,
                i + 1,
                pair[1].start
            )));
        }
    }
    Ok(())
}

fn validate_events(clip: &str, duration: Tick, events: &[AnimEvent]) -> Result<(), ResourceError> {
    let mut last = Tick::MIN;
    for ev in events {
        if ev.time < 0 || ev.time > duration {
            return Err(ResourceError::InvalidEvent {
                clip: clip.to_string(),
                event: ev.name.clone(),
                reason: format!("time {} outside [0, {}]", ev.time, duration),
            });
        }
        if ev.time < last {
            return Err(ResourceError::InvalidEvent {
                clip: clip.to_string(),
                event: ev.name.clone(),
                reason: "events must be sorted by time".into(),
            });
        }
        last = ev.time;
    }
    Ok(())
}

// ----- Stored (on-disk JSON) shapes -----

#[derive(Debug, Deserialize)]
struct StoredResource {
    keys: Vec<f32>,
    clips: Vec<StoredClip>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredClip {
    name: String,
    duration: Tick,
    #[serde(default)]
    pre_infinity: InfinityType,
    #[serde(default)]
    post_infinity: InfinityType,
    curves: Vec<StoredCurve>,
    #[serde(default)]
    events: Vec<AnimEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCurve {
    #[serde(default)]
    kind: CurveKind,
    #[serde(default)]
    intervals: Vec<Interval>,
    #[serde(default = "default_idle_value")]
    idle_value: [f32; 4],
}

fn default_idle_value() -> [f32; 4] {
    [0.0, 0.0, 0.0, 0.0]
}
