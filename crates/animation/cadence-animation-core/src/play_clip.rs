//! Job that plays one clip of the sequencer's resource.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::data::AnimResource;
use crate::dispatch::{EvalTask, MixStep};
use crate::error::ResourceError;
use crate::events::{emit_clip_events, AnimEventInfo};
use crate::job::{AnimJob, JobCfg, JobState};
use crate::sampling::{IntervalCursor, SampleType};
use crate::scratch::SharedBuffer;
use crate::time::Tick;

#[derive(Debug)]
pub struct PlayClipJob {
    state: JobState,
    clip_name: String,
    clip: usize,
    /// 0 plays forever.
    loop_count: f32,
    sample_type: Option<SampleType>,
    cursor: Arc<Mutex<IntervalCursor>>,
    // Set while attached; the sequencer owns the job, never the other way round.
    resource: Option<Arc<AnimResource>>,
}

impl PlayClipJob {
    /// Resolve `clip_name` in `resource`. The clip index stays valid for every
    /// sequencer built on the same resource.
    pub fn new(resource: &AnimResource, clip_name: &str, cfg: JobCfg) -> Result<Self, ResourceError> {
        let clip = resource
            .clip_index(clip_name)
            .ok_or_else(|| ResourceError::ClipNotFound {
                name: clip_name.to_string(),
            })?;
        let mut cfg = cfg;
        if cfg.name.is_empty() {
            cfg.name = clip_name.to_string();
        }
        Ok(Self {
            state: JobState::new(cfg),
            clip_name: clip_name.to_string(),
            clip,
            loop_count: 1.0,
            sample_type: None,
            cursor: Arc::new(Mutex::new(IntervalCursor::new(resource.num_curves()))),
            resource: None,
        })
    }

    pub fn with_loop_count(mut self, loop_count: f32) -> Self {
        self.loop_count = loop_count.max(0.0);
        self
    }

    pub fn with_sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = Some(sample_type);
        self
    }

    pub fn loop_count(&self) -> f32 {
        self.loop_count
    }

    pub fn sample_type(&self) -> Option<SampleType> {
        self.sample_type
    }

    pub fn clip_index(&self) -> usize {
        self.clip
    }
}

impl AnimJob for PlayClipJob {
    fn state(&self) -> &JobState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut JobState {
        &mut self.state
    }

    fn clip_name(&self) -> Option<&str> {
        Some(&self.clip_name)
    }

    fn on_attached(&mut self, resource: &Arc<AnimResource>, cfg: &Config) {
        if self.state.duration() == 0 && self.loop_count > 0.0 {
            if let Some(clip) = resource.clip(self.clip) {
                let duration = (clip.duration as f64 * self.loop_count as f64).round() as Tick;
                self.state.set_duration(duration.max(1));
            }
        }
        if self.sample_type.is_none() {
            self.sample_type = Some(cfg.default_sample_type);
        }
        self.resource = Some(Arc::clone(resource));
        self.cursor.lock().reset();
        self.state.attach();
    }

    fn on_removed(&mut self) {
        self.resource = None;
        self.state.detach();
    }

    fn create_evaluation_task(
        &self,
        _time: Tick,
        dst: &SharedBuffer,
        mix_scratch: Option<&SharedBuffer>,
    ) -> Option<EvalTask> {
        let resource = self.resource.as_ref()?;
        let clip = resource.clip(self.clip)?;
        let factor = self.state.time_factor();

        let (target, mix) = match mix_scratch {
            None => (Arc::clone(dst), None),
            Some(scratch) => (
                Arc::clone(scratch),
                Some(MixStep {
                    dst: Arc::clone(dst),
                    weight: self.state.compute_blend_weight(self.state.rel_eval_time()),
                    mask: self.state.mask().cloned(),
                }),
            ),
        };

        Some(EvalTask {
            resource: Arc::clone(resource),
            clip: self.clip,
            time: clip.map_time(self.state.sample_time()),
            sample_type: self.sample_type.unwrap_or_default(),
            velocity_scale: [factor, factor, factor, 1.0],
            cursor: Arc::clone(&self.cursor),
            target,
            mix,
        })
    }

    fn emit_anim_events(
        &self,
        start: Tick,
        end: Tick,
        category: Option<&str>,
    ) -> Vec<AnimEventInfo> {
        let Some(resource) = self.resource.as_ref() else {
            return Vec::new();
        };
        let Some(clip) = resource.clip(self.clip) else {
            return Vec::new();
        };
        if clip.events.is_empty() || end <= start {
            return Vec::new();
        }

        // Same clock the sampler reads, so events follow pause and set_time.
        // Reverse playback walks the clip backwards over the same span.
        let (rel_start, rel_end) = {
            let (a, b) = (self.state.sample_time_at(start), self.state.sample_time_at(end));
            (a.min(b), a.max(b))
        };
        let wraps = clip.is_cyclic() || self.state.is_infinite();
        let clip_start = clip.map_time(rel_start);

        let events = if clip.is_cyclic() && rel_end - rel_start >= clip.duration {
            if rel_end - rel_start > clip.duration {
                log::warn!(
                    "event range [{start}, {end}) spans more than one cycle of clip '{}'; emitting one cycle",
                    clip.name
                );
            }
            let mut events = emit_clip_events(clip, clip_start, clip.duration, false, category);
            events.extend(emit_clip_events(clip, 0, clip_start, false, category));
            events
        } else {
            emit_clip_events(clip, clip_start, clip.map_time(rel_end), wraps, category)
        };

        let weight = self
            .state
            .compute_blend_weight(start - self.state.absolute_start_time());
        events
            .into_iter()
            .map(|event| AnimEventInfo {
                event,
                job_name: self.state.name().to_string(),
                weight,
            })
            .collect()
    }
}
