//! Core configuration for cadence-animation-core.

use serde::{Deserialize, Serialize};

use crate::sampling::SampleType;

/// Per-sequencer sizing and debug switches.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enqueue beyond this many pending jobs fails with `QueueFull`.
    pub max_queued_jobs: usize,

    /// Sample type for play-clip jobs that do not choose one.
    pub default_sample_type: SampleType,

    /// Log a per-job state dump at debug level on every `update_time`.
    pub frame_dump: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_queued_jobs: 16,
            default_sample_type: SampleType::Linear,
            frame_dump: false,
        }
    }
}
