//! Cadence Animation Core (engine-agnostic)
//!
//! Sequencing and sampling of keyframe animation: jobs playing clips are
//! arranged on priority tracks, faded in and out against each other, and
//! blended down to one pose per frame by a chain of sampling tasks that runs
//! on an external dispatcher. Timeline events are extracted per time range.
//!
//! Time is measured in integer ticks (milliseconds) throughout.

pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ids;
pub mod interp;
pub mod job;
pub mod mix;
pub mod play_clip;
pub mod sampling;
pub mod scratch;
pub mod sequencer;
pub mod stored_resource;
pub mod time;

// Re-exports for consumers (per-character controllers, adapters)
pub use config::Config;
pub use data::{AnimEvent, AnimResource, Clip, Curve, CurveKind, InfinityType, Interval};
pub use dispatch::{ChainHandle, EvalChain, EvalTask, InlineDispatcher, JobDispatcher, ThreadPoolDispatcher};
pub use error::{ResourceError, SequencerError};
pub use events::{emit_clip_events, AnimEventInfo};
pub use ids::JobId;
pub use job::{AnimJob, EnqueueMode, JobCfg, JobPhase, JobState};
pub use mix::{mix, mix_into, JointMask, SampleBuffer};
pub use play_clip::PlayClipJob;
pub use sampling::{find_next_interval, sample_clip, IntervalCursor, SampleType};
pub use scratch::{Scratch, SharedBuffer};
pub use sequencer::{AnimSequencer, JobDebugInfo, JobList};
pub use stored_resource::parse_anim_resource_json;
pub use time::{seconds_to_ticks, ticks_to_seconds, Tick};
