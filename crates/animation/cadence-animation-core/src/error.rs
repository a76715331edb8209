//! Error types for resource loading and sequencing.

use crate::ids::JobId;

/// Load-time data errors. Raised while parsing or validating a keyframe
/// resource, never during a running simulation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResourceError {
    /// Source text could not be decoded
    #[error("Failed to parse resource: {reason}")]
    Parse { reason: String },

    /// Clip-level inconsistency
    #[error("Invalid clip '{clip}': {reason}")]
    InvalidClip { clip: String, reason: String },

    /// Curve intervals are not strictly increasing and contiguous, or reach past the buffer
    #[error("Invalid curve {curve} in clip '{clip}': {reason}")]
    InvalidCurve {
        clip: String,
        curve: usize,
        reason: String,
    },

    /// Interval key offset outside the key buffer
    #[error("Key offset {offset} (width {width}) out of range for key buffer of {len} floats")]
    KeyOutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// Event outside the clip or out of order
    #[error("Invalid event '{event}' in clip '{clip}': {reason}")]
    InvalidEvent {
        clip: String,
        event: String,
        reason: String,
    },

    /// Named clip lookup failed
    #[error("Clip not found: {name}")]
    ClipNotFound { name: String },
}

impl ResourceError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "serialization",
            Self::InvalidClip { .. }
            | Self::InvalidCurve { .. }
            | Self::KeyOutOfRange { .. }
            | Self::InvalidEvent { .. } => "validation",
            Self::ClipNotFound { .. } => "data",
        }
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}

/// Contract violations detected by the sequencer. Callers are expected to
/// treat these as fatal; the sequencer itself stays consistent.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SequencerError {
    /// Append-mode job queued behind an infinite job on the same track
    #[error("Track {track} is blocked by infinite job {blocking}")]
    TrackBlockedByInfiniteJob { track: i32, blocking: JobId },

    /// Job is not owned by this sequencer
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// Enqueue beyond the configured queue capacity
    #[error("Job queue is full ({capacity} jobs)")]
    QueueFull { capacity: usize },
}

impl SequencerError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::TrackBlockedByInfiniteJob { .. } => "scheduling",
            Self::JobNotFound(_) => "ownership",
            Self::QueueFull { .. } => "capacity",
        }
    }
}
