//! Sample buffers, joint masks and two-buffer pose mixing.

use serde::{Deserialize, Serialize};

use crate::interp::functions::lerp_vec4;

/// One pose: a four-lane sample per curve plus a per-curve active count.
/// A count of 0 marks a sample that does not contribute to the blend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<[f32; 4]>,
    counts: Vec<u8>,
}

impl SampleBuffer {
    pub fn new(num_curves: usize) -> Self {
        Self {
            samples: vec![[0.0; 4]; num_curves],
            counts: vec![0; num_curves],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn samples(&self) -> &[[f32; 4]] {
        &self.samples
    }

    #[inline]
    pub fn counts(&self) -> &[u8] {
        &self.counts
    }

    #[inline]
    pub fn sample(&self, curve: usize) -> Option<[f32; 4]> {
        self.samples.get(curve).copied()
    }

    #[inline]
    pub fn count(&self, curve: usize) -> u8 {
        self.counts.get(curve).copied().unwrap_or(0)
    }

    #[inline]
    pub(crate) fn set(&mut self, curve: usize, value: [f32; 4], count: u8) {
        if let (Some(s), Some(c)) = (self.samples.get_mut(curve), self.counts.get_mut(curve)) {
            *s = value;
            *c = count;
        }
    }

    /// Zero every sample and mark all curves inactive.
    pub fn clear(&mut self) {
        self.samples.fill([0.0; 4]);
        self.counts.fill(0);
    }
}

/// Per-joint blend weights. One weight covers `curves_per_joint` consecutive curves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointMask {
    pub name: String,
    pub weights: Vec<f32>,
    #[serde(default = "default_curves_per_joint")]
    pub curves_per_joint: usize,
}

fn default_curves_per_joint() -> usize {
    4
}

impl JointMask {
    pub fn new(name: impl Into<String>, weights: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            weights,
            curves_per_joint: default_curves_per_joint(),
        }
    }

    /// Weight applied to `curve`; curves past the mask are unmasked.
    #[inline]
    pub fn weight_for_curve(&self, curve: usize) -> f32 {
        let per_joint = self.curves_per_joint.max(1);
        self.weights.get(curve / per_joint).copied().unwrap_or(1.0)
    }
}

/// Mix `src0` and `src1` into `dst`.
///
/// Where both sides are active the result is `lerp(src0, src1, weight * mask)`;
/// where only one side is active it passes through unchanged. The output count
/// is the sum of both input counts; a zero count leaves the sample undefined.
pub fn mix(
    src0: &SampleBuffer,
    src1: &SampleBuffer,
    weight: f32,
    mask: Option<&JointMask>,
    dst: &mut SampleBuffer,
) {
    let n = src0.len().min(src1.len()).min(dst.len());
    for i in 0..n {
        let (value, count) = mix_sample(
            src0.samples[i],
            src0.counts[i],
            src1.samples[i],
            src1.counts[i],
            curve_weight(weight, mask, i),
        );
        dst.samples[i] = value;
        dst.counts[i] = count;
    }
}

/// In-place form of [`mix`] with `dst` as the first source.
pub fn mix_into(dst: &mut SampleBuffer, src: &SampleBuffer, weight: f32, mask: Option<&JointMask>) {
    let n = src.len().min(dst.len());
    for i in 0..n {
        let (value, count) = mix_sample(
            dst.samples[i],
            dst.counts[i],
            src.samples[i],
            src.counts[i],
            curve_weight(weight, mask, i),
        );
        dst.samples[i] = value;
        dst.counts[i] = count;
    }
}

#[inline]
fn curve_weight(weight: f32, mask: Option<&JointMask>, curve: usize) -> f32 {
    match mask {
        Some(m) => weight * m.weight_for_curve(curve),
        None => weight,
    }
}

#[inline]
fn mix_sample(s0: [f32; 4], c0: u8, s1: [f32; 4], c1: u8, w: f32) -> ([f32; 4], u8) {
    let count = c0.wrapping_add(c1);
    match (c0 > 0, c1 > 0) {
        (true, true) => (lerp_vec4(s0, s1, w), count),
        (true, false) => (s0, count),
        (false, true) => (s1, count),
        (false, false) => (s0, 0),
    }
}
