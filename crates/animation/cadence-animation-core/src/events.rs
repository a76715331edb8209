//! Timeline event extraction.

use serde::{Deserialize, Serialize};

use crate::data::{AnimEvent, Clip};
use crate::time::Tick;

/// An event together with the job that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimEventInfo {
    pub event: AnimEvent,
    pub job_name: String,
    /// Blend weight of the source job at the start of the queried range.
    pub weight: f32,
}

/// Events of `clip` with `start <= time < end` in clip-relative ticks.
///
/// `start > end` means the range wrapped at the clip duration: `[start, duration)`
/// is emitted, followed by `[0, end)` only when `wraps` is set (cyclic clip or
/// infinite job). A range covering more than one full cycle cannot be expressed
/// as a single `(start, end)` pair; callers detect that case before mapping.
pub fn emit_clip_events(
    clip: &Clip,
    start: Tick,
    end: Tick,
    wraps: bool,
    category: Option<&str>,
) -> Vec<AnimEvent> {
    let mut out = Vec::new();
    collect(clip, start, end, wraps, category, &mut out);
    out
}

fn collect(
    clip: &Clip,
    start: Tick,
    end: Tick,
    wraps: bool,
    category: Option<&str>,
    out: &mut Vec<AnimEvent>,
) {
    if start <= end {
        out.extend(
            clip.events
                .iter()
                .filter(|ev| ev.time >= start && ev.time < end)
                .filter(|ev| category.map_or(true, |c| ev.category == c))
                .cloned(),
        );
    } else {
        collect(clip, start, clip.duration, wraps, category, out);
        if wraps {
            collect(clip, 0, end, wraps, category, out);
        }
    }
}
