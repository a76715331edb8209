//! Keyframe store: clips, curves and the flat key/interval buffers they index.
//! Everything here is immutable once loaded and shared read-only between jobs.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::time::Tick;

/// What a curve animates. Decides the key group width and the interpolation used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    Translation,
    Rotation,
    Scale,
    Velocity,
    #[default]
    Generic,
}

impl CurveKind {
    /// Floats per key group in the key buffer.
    #[inline]
    pub fn key_width(self) -> usize {
        match self {
            CurveKind::Rotation => 4,
            CurveKind::Translation | CurveKind::Scale | CurveKind::Velocity => 3,
            CurveKind::Generic => 1,
        }
    }
}

/// Behaviour for times outside `[0, duration]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfinityType {
    #[default]
    Constant,
    Cycle,
}

/// Half-open time range `[start, end)` with float offsets of its two keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Tick,
    pub end: Tick,
    pub key0: u32,
    pub key1: u32,
}

impl Interval {
    #[inline]
    pub fn contains(&self, time: Tick) -> bool {
        time >= self.start && time < self.end
    }
}

/// One animated channel. Its intervals live in the resource-wide interval buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub kind: CurveKind,
    pub first_interval: usize,
    pub num_intervals: usize,
    /// Substituted while the curve is inactive.
    pub idle_value: [f32; 4],
}

impl Curve {
    /// A curve without intervals never moves its target.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.num_intervals > 0
    }
}

/// Named marker on a clip timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimEvent {
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Clip-relative ticks.
    pub time: Tick,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    pub curves: Vec<Curve>,
    /// Sorted by time.
    pub events: Vec<AnimEvent>,
    pub duration: Tick,
    pub pre_infinity: InfinityType,
    pub post_infinity: InfinityType,
}

impl Clip {
    /// Map an unbounded clip time into `[0, duration]` through the infinity policies.
    pub fn map_time(&self, time: Tick) -> Tick {
        if self.duration <= 0 {
            return 0;
        }
        if time < 0 {
            match self.pre_infinity {
                InfinityType::Constant => 0,
                InfinityType::Cycle => time.rem_euclid(self.duration),
            }
        } else if time >= self.duration {
            match self.post_infinity {
                InfinityType::Constant => self.duration,
                InfinityType::Cycle => time.rem_euclid(self.duration),
            }
        } else {
            time
        }
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        self.post_infinity == InfinityType::Cycle
    }
}

/// The keyframe store for one animated entity type.
///
/// Every clip in a resource animates the same set of curves, so one sample
/// buffer layout fits all of them.
///
/// Serializes in its flattened runtime form. Deserializing it skips
/// validation, so untrusted input should go through
/// [`crate::parse_anim_resource_json`] instead.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "ResourceParts")]
pub struct AnimResource {
    clips: Vec<Clip>,
    keys: Vec<f32>,
    intervals: Vec<Interval>,
    #[serde(skip)]
    clip_index: HashMap<String, usize>,
}

// Deserialized form; the name index is rebuilt from the clips.
#[derive(Deserialize)]
struct ResourceParts {
    clips: Vec<Clip>,
    keys: Vec<f32>,
    intervals: Vec<Interval>,
}

impl From<ResourceParts> for AnimResource {
    fn from(parts: ResourceParts) -> Self {
        AnimResource::new(parts.clips, parts.keys, parts.intervals)
    }
}

impl AnimResource {
    /// Assemble a resource from already-validated parts.
    /// Use [`crate::parse_anim_resource_json`] for untrusted input.
    pub fn new(clips: Vec<Clip>, keys: Vec<f32>, intervals: Vec<Interval>) -> Self {
        let clip_index = clips
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            clips,
            keys,
            intervals,
            clip_index,
        }
    }

    #[inline]
    pub fn clip(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn clip_index(&self, name: &str) -> Option<usize> {
        self.clip_index.get(name).copied()
    }

    pub fn clip_by_name(&self, name: &str) -> Option<&Clip> {
        self.clip_index(name).and_then(|i| self.clip(i))
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    /// Curves of one clip; empty for an unknown index.
    pub fn curves(&self, clip: usize) -> &[Curve] {
        self.clips.get(clip).map(|c| c.curves.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn keys(&self) -> &[f32] {
        &self.keys
    }

    #[inline]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Slice of the interval buffer owned by `curve`.
    #[inline]
    pub fn curve_intervals(&self, curve: &Curve) -> &[Interval] {
        let end = curve.first_interval + curve.num_intervals;
        self.intervals
            .get(curve.first_interval..end)
            .unwrap_or(&[])
    }

    /// Curve count shared by every clip.
    pub fn num_curves(&self) -> usize {
        self.clips.first().map(|c| c.curves.len()).unwrap_or(0)
    }

    /// Key group at float offset `offset`, zero padded to four lanes.
    #[inline]
    pub fn key_group(&self, offset: u32, width: usize) -> [f32; 4] {
        let mut out = [0.0; 4];
        let start = offset as usize;
        if let Some(src) = self.keys.get(start..start + width) {
            out[..width].copy_from_slice(src);
        }
        out
    }
}
