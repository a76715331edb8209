//! Animation jobs: timing state shared by every job kind and the capability
//! interface the sequencer drives them through.
//!
//! A job's phase is a pure function of the sequencer time and its fields:
//!
//! ```text
//!  base+start                      end-fade_out        end
//!      |-- fade_in --|                  |-- fade_out --|
//!  ----+-------------+------------------+--------------+---->
//!   Pending         Active                   Stopping    Expired
//! ```
//!
//! A duration of 0 means infinite: the job never stops or expires on its own.

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::data::AnimResource;
use crate::dispatch::EvalTask;
use crate::events::AnimEventInfo;
use crate::mix::JointMask;
use crate::scratch::SharedBuffer;
use crate::time::{seconds_to_ticks, ticks_to_seconds, Tick};

/// How a newly queued job treats existing jobs on its track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueMode {
    /// Start after the last job on the track finishes.
    Append,
    /// Stop the jobs on the track and take over.
    #[default]
    Intercept,
    /// Drop the new job while the same clip is still playing unstopped on the track.
    IgnoreIfSameClipActive,
    /// Drop the new job while a job with the same exclusive tag is still playing unstopped.
    IgnoreIfSameExclTagActive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPhase {
    Pending,
    Active,
    Stopping,
    Expired,
}

/// Construction parameters for a job (see [`JobState::new`]).
#[derive(Clone, Debug)]
pub struct JobCfg {
    pub name: String,
    /// Higher tracks dominate the blend.
    pub track: i32,
    pub enqueue_mode: EnqueueMode,
    pub exclusive_tag: Option<u32>,
    /// Offset from the base time assigned on insertion.
    pub start_time: Tick,
    /// 0 = infinite (or resolved from the clip by play-clip jobs).
    pub duration: Tick,
    pub fade_in: Tick,
    pub fade_out: Tick,
    /// Added to the sample time on read.
    pub time_offset: Tick,
    pub time_factor: f32,
    pub blend_weight: f32,
    pub mask: Option<Arc<JointMask>>,
}

impl Default for JobCfg {
    fn default() -> Self {
        Self {
            name: String::new(),
            track: 0,
            enqueue_mode: EnqueueMode::default(),
            exclusive_tag: None,
            start_time: 0,
            duration: 0,
            fade_in: 0,
            fade_out: 0,
            time_offset: 0,
            time_factor: 1.0,
            blend_weight: 1.0,
            mask: None,
        }
    }
}

/// Timing and blending state common to all job kinds.
#[derive(Clone, Debug)]
pub struct JobState {
    name: String,
    track: i32,
    enqueue_mode: EnqueueMode,
    exclusive_tag: Option<u32>,
    mask: Option<Arc<JointMask>>,

    base_time: Tick,
    start_time: Tick,
    duration: Tick,
    fade_in: Tick,
    fade_out: Tick,

    cur_rel_eval_time: Tick,
    last_rel_eval_time: Tick,
    // Accumulated sample time without `time_offset`. Kept fractional so
    // slow rates and short frames still advance.
    sample_time: f64,
    last_sample_time: Tick,
    time_offset: Tick,
    time_factor: f32,
    blend_weight: f32,

    paused: bool,
    attached: bool,
}

impl JobState {
    pub fn new(cfg: JobCfg) -> Self {
        Self {
            name: cfg.name,
            track: cfg.track,
            enqueue_mode: cfg.enqueue_mode,
            exclusive_tag: cfg.exclusive_tag,
            mask: cfg.mask,
            base_time: 0,
            start_time: cfg.start_time,
            duration: cfg.duration,
            fade_in: cfg.fade_in.max(0),
            fade_out: cfg.fade_out.max(0),
            cur_rel_eval_time: 0,
            last_rel_eval_time: 0,
            sample_time: 0.0,
            last_sample_time: cfg.time_offset,
            time_offset: cfg.time_offset,
            time_factor: cfg.time_factor,
            blend_weight: cfg.blend_weight,
            paused: false,
            attached: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn track(&self) -> i32 {
        self.track
    }
    pub fn enqueue_mode(&self) -> EnqueueMode {
        self.enqueue_mode
    }
    pub fn exclusive_tag(&self) -> Option<u32> {
        self.exclusive_tag
    }
    pub fn mask(&self) -> Option<&Arc<JointMask>> {
        self.mask.as_ref()
    }
    pub fn base_time(&self) -> Tick {
        self.base_time
    }
    pub fn start_time(&self) -> Tick {
        self.start_time
    }
    pub fn duration(&self) -> Tick {
        self.duration
    }
    pub fn fade_in(&self) -> Tick {
        self.fade_in
    }
    pub fn fade_out(&self) -> Tick {
        self.fade_out
    }
    pub fn time_offset(&self) -> Tick {
        self.time_offset
    }
    pub fn time_factor(&self) -> f32 {
        self.time_factor
    }
    pub fn blend_weight(&self) -> f32 {
        self.blend_weight
    }
    pub fn is_paused(&self) -> bool {
        self.paused
    }
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.duration == 0
    }

    /// Relative time of the last `update_times` call.
    pub fn rel_eval_time(&self) -> Tick {
        self.cur_rel_eval_time
    }

    /// Current (rate scaled, offset) sample time.
    pub fn sample_time(&self) -> Tick {
        self.sample_time.round() as Tick + self.time_offset
    }

    /// Sample time of the previous `update_times` call.
    pub fn last_sample_time(&self) -> Tick {
        self.last_sample_time
    }

    /// Sample time at absolute `time`, extrapolated from the last update with
    /// the play rate. Frozen while paused.
    pub fn sample_time_at(&self, time: Tick) -> Tick {
        if self.paused {
            return self.sample_time();
        }
        let frame_time = self.absolute_start_time() + self.cur_rel_eval_time;
        let ahead = (time - frame_time) as f64 * self.time_factor as f64;
        (self.sample_time + ahead).round() as Tick + self.time_offset
    }

    /// Set the duration before the job is attached. Has no effect afterwards.
    pub fn set_duration(&mut self, duration: Tick) {
        if !self.attached {
            self.duration = duration;
        }
    }

    pub(crate) fn set_base_time(&mut self, time: Tick) {
        self.base_time = time;
    }

    /// Fix fade times, then rescale the time spans by the play-rate factor.
    pub(crate) fn attach(&mut self) {
        self.attached = true;
        self.fix_fade_times();

        let factor = self.time_factor.abs() as f64;
        if factor > 0.0 && factor != 1.0 {
            let rescale = |t: Tick| seconds_to_ticks(ticks_to_seconds(t) / factor);
            self.fade_in = rescale(self.fade_in);
            self.fade_out = rescale(self.fade_out);
            if !self.is_infinite() {
                // A finite job must not turn infinite through rounding.
                self.duration = rescale(self.duration).max(1);
                self.fix_fade_times();
            }
        }
    }

    pub(crate) fn detach(&mut self) {
        self.attached = false;
    }

    /// Shrink fades proportionally so that `fade_in + fade_out <= duration`.
    fn fix_fade_times(&mut self) {
        if self.is_infinite() {
            return;
        }
        let fade_time = self.fade_in + self.fade_out;
        if fade_time > 0 && fade_time > self.duration {
            let mul = self.duration.max(0) as f64 / fade_time as f64;
            self.fade_in = (self.fade_in as f64 * mul) as Tick;
            self.fade_out = (self.fade_out as f64 * mul) as Tick;
        }
    }

    #[inline]
    pub fn absolute_start_time(&self) -> Tick {
        self.base_time + self.start_time
    }

    /// `None` for infinite jobs.
    #[inline]
    pub fn absolute_end_time(&self) -> Option<Tick> {
        (!self.is_infinite()).then(|| self.absolute_start_time() + self.duration)
    }

    /// End time minus the fade-out; `None` for infinite jobs.
    #[inline]
    pub fn absolute_stop_time(&self) -> Option<Tick> {
        self.absolute_end_time().map(|end| end - self.fade_out)
    }

    #[inline]
    pub fn is_pending(&self, time: Tick) -> bool {
        time < self.absolute_start_time()
    }

    /// Started and not yet in its fade-out. Exclusive with `is_pending` and
    /// `is_stopping_or_expired`.
    #[inline]
    pub fn is_active(&self, time: Tick) -> bool {
        !self.is_pending(time) && !self.is_stopping_or_expired(time)
    }

    /// Started and not yet expired; includes the fade-out period.
    #[inline]
    pub fn is_playing(&self, time: Tick) -> bool {
        match self.absolute_end_time() {
            None => time >= self.absolute_start_time(),
            Some(end) => time >= self.absolute_start_time() && time < end,
        }
    }

    #[inline]
    pub fn is_stopping_or_expired(&self, time: Tick) -> bool {
        match self.absolute_stop_time() {
            None => false,
            Some(stop) => time >= stop,
        }
    }

    #[inline]
    pub fn is_expired(&self, time: Tick) -> bool {
        match self.absolute_end_time() {
            None => false,
            Some(end) => time >= end,
        }
    }

    pub fn phase(&self, time: Tick) -> JobPhase {
        if self.is_pending(time) {
            JobPhase::Pending
        } else if self.is_expired(time) {
            JobPhase::Expired
        } else if self.is_stopping_or_expired(time) {
            JobPhase::Stopping
        } else {
            JobPhase::Active
        }
    }

    /// Blend weight at relative time `rel`, ramped through the fade-in and fade-out.
    pub fn compute_blend_weight(&self, rel: Tick) -> f32 {
        let rel = rel.max(0);
        let fade_out_start = self.duration - self.fade_out;
        if !self.is_infinite() && self.fade_out > 0 && rel > fade_out_start {
            let t = (rel - fade_out_start) as f32 / self.fade_out as f32;
            (self.blend_weight * (1.0 - t)).max(0.0)
        } else if self.fade_in > 0 && rel < self.fade_in {
            self.blend_weight * (rel as f32 / self.fade_in as f32)
        } else {
            self.blend_weight
        }
    }

    /// End the job so its fade-out completes at `time + fade_out`.
    /// No effect while already stopping or expired.
    pub fn stop(&mut self, time: Tick) {
        if self.is_stopping_or_expired(time) {
            return;
        }
        let new_end = (time - self.base_time) + self.fade_out;
        let duration = new_end - self.start_time;
        // 0 would read as infinite; -1 is already expired.
        self.duration = if duration == 0 { -1 } else { duration };
    }

    /// Advance relative and sample time. Runs every frame for every job,
    /// visible or not, so pause and rate scaling stay consistent.
    pub fn update_times(&mut self, time: Tick) {
        self.cur_rel_eval_time = time - self.absolute_start_time();
        let frame_ticks = self.cur_rel_eval_time - self.last_rel_eval_time;
        self.last_rel_eval_time = self.cur_rel_eval_time;

        self.last_sample_time = self.sample_time();
        if !self.paused {
            self.sample_time += frame_ticks as f64 * self.time_factor as f64;
        }
    }

    pub fn pause(&mut self, pause: bool) {
        self.paused = pause;
        if pause {
            self.last_rel_eval_time = self.cur_rel_eval_time;
        }
    }

    /// Jump the sample time to `start_time + time`.
    pub fn set_time(&mut self, time: Tick) {
        self.sample_time = (self.start_time + time) as f64;
    }
}

/// Capability interface the sequencer drives jobs through. It never depends
/// on the concrete job kind.
pub trait AnimJob: Send + Debug {
    fn state(&self) -> &JobState;
    fn state_mut(&mut self) -> &mut JobState;

    /// Clip played by this job, compared by `IgnoreIfSameClipActive`.
    fn clip_name(&self) -> Option<&str> {
        None
    }

    /// Called once when the sequencer takes ownership.
    fn on_attached(&mut self, resource: &Arc<AnimResource>, cfg: &Config) {
        let _ = (resource, cfg);
        self.state_mut().attach();
    }

    /// Called once when the sequencer releases the job.
    fn on_removed(&mut self) {
        self.state_mut().detach();
    }

    /// Build the sampling step for this frame. Without `mix_scratch` the job
    /// samples straight into `dst`; with it, it samples into the scratch buffer
    /// and mixes that into `dst` with its current blend weight.
    fn create_evaluation_task(
        &self,
        time: Tick,
        dst: &SharedBuffer,
        mix_scratch: Option<&SharedBuffer>,
    ) -> Option<EvalTask>;

    /// Events in the absolute range `[start, end)`.
    fn emit_anim_events(
        &self,
        start: Tick,
        end: Tick,
        category: Option<&str>,
    ) -> Vec<AnimEventInfo>;
}
