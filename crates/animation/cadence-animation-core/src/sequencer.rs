//! Per-entity animation sequencer: owns jobs, arranges them on tracks,
//! advances time and issues the sampling chain that blends them into one pose.
//!
//! Frame order:
//! - `update_time(t)`: stop requests → insert queued jobs → drop expired → update job clocks.
//! - `start_async_evaluation(dispatcher)`: one chain link per playing job, lowest track first.
//! - `emit_anim_events(start, end, ..)`: independent of evaluation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::data::AnimResource;
use crate::dispatch::{ChainHandle, EvalChain, JobDispatcher};
use crate::error::SequencerError;
use crate::events::AnimEventInfo;
use crate::ids::{IdAllocator, JobId};
use crate::job::{AnimJob, EnqueueMode, JobPhase};
use crate::scratch::{Scratch, SharedBuffer};
use crate::time::Tick;

/// Which of the sequencer's lists currently holds a job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobList {
    /// Enqueued, inserted on the next `update_time`.
    Queued,
    /// Arranged on its track.
    Active,
    /// Arranged on its track with a stop request pending.
    Stopping,
}

/// Snapshot of one arranged job, for frame dumps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDebugInfo {
    pub id: JobId,
    pub name: String,
    pub track: i32,
    pub start: Tick,
    /// `None` for infinite jobs.
    pub end: Option<Tick>,
    pub fade_in: Tick,
    pub fade_out: Tick,
    pub weight: f32,
    pub time_factor: f32,
    pub paused: bool,
    pub phase: JobPhase,
}

#[derive(Debug)]
struct Entry {
    id: JobId,
    job: Box<dyn AnimJob>,
}

#[derive(Debug)]
pub struct AnimSequencer {
    cfg: Config,
    resource: Arc<AnimResource>,
    scratch: Scratch,
    ids: IdAllocator,
    time: Tick,
    /// Arranged jobs, sorted by track, insertion order within a track.
    jobs: Vec<Entry>,
    enqueued: Vec<Entry>,
    /// Stop requests against `jobs`, handled first thing in `update_time`.
    stopped: Vec<JobId>,
    in_flight: Option<ChainHandle>,
}

impl AnimSequencer {
    pub fn new(resource: Arc<AnimResource>, cfg: Config) -> Self {
        let scratch = Scratch::new(resource.num_curves());
        Self {
            cfg,
            resource,
            scratch,
            ids: IdAllocator::new(),
            time: 0,
            jobs: Vec::new(),
            enqueued: Vec::new(),
            stopped: Vec::new(),
            in_flight: None,
        }
    }

    pub fn resource(&self) -> &Arc<AnimResource> {
        &self.resource
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn time(&self) -> Tick {
        self.time
    }

    /// Take ownership of `job`. It is attached immediately and arranged on
    /// its track by the next `update_time`.
    pub fn enqueue_anim_job<J: AnimJob + 'static>(&mut self, job: J) -> Result<JobId, SequencerError> {
        self.enqueue_boxed(Box::new(job))
    }

    pub fn enqueue_boxed(&mut self, mut job: Box<dyn AnimJob>) -> Result<JobId, SequencerError> {
        if self.enqueued.len() >= self.cfg.max_queued_jobs {
            let err = SequencerError::QueueFull {
                capacity: self.cfg.max_queued_jobs,
            };
            log::error!("rejecting job '{}': {err}", job.state().name());
            return Err(err);
        }
        let id = self.ids.alloc_job();
        job.on_attached(&self.resource, &self.cfg);
        log::trace!(
            "enqueue {id} '{}' track={} mode={:?}",
            job.state().name(),
            job.state().track(),
            job.state().enqueue_mode()
        );
        self.enqueued.push(Entry { id, job });
        Ok(id)
    }

    /// Advance to `time`. A contract violation during insertion drops the
    /// offending job, finishes the frame, and is returned afterwards.
    pub fn update_time(&mut self, time: Tick) -> Result<(), SequencerError> {
        self.time = time;

        self.handle_stopped_jobs(time);
        let inserted = self.insert_enqueued_jobs(time);
        self.remove_expired_jobs(time);
        for entry in &mut self.jobs {
            entry.job.state_mut().update_times(time);
        }

        if self.cfg.frame_dump {
            self.log_frame_dump(time);
        }
        inserted
    }

    fn handle_stopped_jobs(&mut self, time: Tick) {
        for id in std::mem::take(&mut self.stopped) {
            let Some(pos) = self.position(id) else {
                continue;
            };
            let state = self.jobs[pos].job.state();
            if state.is_pending(time) || state.is_expired(time) {
                log::trace!("discard stopped {id} at {time}");
                self.remove_at(pos);
            } else if state.is_stopping_or_expired(time) {
                log::trace!("{id} already stopping at {time}");
            } else {
                log::trace!("stop {id} at {time}");
                self.jobs[pos].job.state_mut().stop(time);
            }
        }
    }

    fn insert_enqueued_jobs(&mut self, time: Tick) -> Result<(), SequencerError> {
        let mut first_err = None;
        for mut entry in std::mem::take(&mut self.enqueued) {
            match self.arrange(&entry, time) {
                Arrange::Insert { at, base_time } => {
                    entry.job.state_mut().set_base_time(base_time);
                    log::trace!("insert {} at {at} base={base_time}", entry.id);
                    self.jobs.insert(at, entry);
                }
                Arrange::Drop => {
                    log::trace!("drop {}: same clip or tag still playing", entry.id);
                    entry.job.on_removed();
                }
                Arrange::Blocked(err) => {
                    log::error!("cannot insert {} '{}': {err}", entry.id, entry.job.state().name());
                    entry.job.on_removed();
                    first_err.get_or_insert(err);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Scan the arranged jobs in track order and apply the new job's enqueue mode
    /// to each same-track predecessor.
    fn arrange(&mut self, entry: &Entry, time: Tick) -> Arrange {
        let new = entry.job.state();
        let track = new.track();
        let mut at = self.jobs.len();
        let mut base_time = time;

        for (i, cur) in self.jobs.iter_mut().enumerate() {
            let cur_track = cur.job.state().track();
            if cur_track > track {
                at = i;
                break;
            }
            if cur_track < track {
                continue;
            }

            let still_running = !cur.job.state().is_stopping_or_expired(time);
            let same = match new.enqueue_mode() {
                EnqueueMode::Append => {
                    let Some(stop) = cur.job.state().absolute_stop_time() else {
                        return Arrange::Blocked(SequencerError::TrackBlockedByInfiniteJob {
                            track,
                            blocking: cur.id,
                        });
                    };
                    base_time = base_time.max(stop);
                    continue;
                }
                EnqueueMode::Intercept => false,
                EnqueueMode::IgnoreIfSameClipActive => {
                    entry.job.clip_name().is_some()
                        && cur.job.clip_name() == entry.job.clip_name()
                }
                EnqueueMode::IgnoreIfSameExclTagActive => {
                    new.exclusive_tag().is_some()
                        && cur.job.state().exclusive_tag() == new.exclusive_tag()
                }
            };
            if same && still_running {
                return Arrange::Drop;
            }

            cur.job.state_mut().stop(time);
            if let Some(stop) = cur.job.state().absolute_stop_time() {
                base_time = base_time.max(stop);
            }
        }
        Arrange::Insert { at, base_time }
    }

    fn remove_expired_jobs(&mut self, time: Tick) {
        let mut i = 0;
        while i < self.jobs.len() {
            if self.jobs[i].job.state().is_expired(time) {
                log::trace!("expire {} at {time}", self.jobs[i].id);
                self.remove_at(i);
            } else {
                i += 1;
            }
        }
    }

    fn remove_at(&mut self, pos: usize) {
        let mut entry = self.jobs.remove(pos);
        entry.job.on_removed();
        self.stopped.retain(|id| *id != entry.id);
    }

    fn position(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|e| e.id == id)
    }

    fn request_stop(&mut self, id: JobId) {
        if !self.stopped.contains(&id) {
            self.stopped.push(id);
        }
    }

    /// Build the sampling chain for the current frame and hand it to `dispatcher`.
    ///
    /// Returns `false` when no job is playing. Any chain still running from the
    /// previous call is waited for first, since it writes the same result buffer.
    pub fn start_async_evaluation(&mut self, dispatcher: &dyn JobDispatcher) -> bool {
        self.wait_for_evaluation();

        let time = self.time;
        let dst = self.scratch.result();
        let mut chain = EvalChain::new();
        for entry in &self.jobs {
            if !entry.job.state().is_playing(time) {
                continue;
            }
            let mix = (!chain.is_empty()).then(|| self.scratch.mix());
            if let Some(task) = entry.job.create_evaluation_task(time, dst, mix) {
                chain.push(task);
            }
        }
        if chain.is_empty() {
            return false;
        }
        self.in_flight = Some(dispatcher.submit(chain));
        true
    }

    /// Handle of the chain issued by the last `start_async_evaluation`.
    pub fn evaluation_handle(&self) -> Option<&ChainHandle> {
        self.in_flight.as_ref()
    }

    pub fn wait_for_evaluation(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.wait();
        }
    }

    /// Destination pose. Only valid once the last chain has finished.
    pub fn result(&self) -> SharedBuffer {
        Arc::clone(self.scratch.result())
    }

    /// Stop every job on `track`. With `allow_fade_out` arranged jobs get a
    /// stop request for the next `update_time`, otherwise they are discarded.
    /// Queued jobs on the track are always discarded.
    pub fn stop_track(&mut self, track: i32, allow_fade_out: bool) {
        self.stop_where(|t| t == track, allow_fade_out);
    }

    pub fn stop_all_tracks(&mut self, allow_fade_out: bool) {
        self.stop_where(|_| true, allow_fade_out);
    }

    fn stop_where(&mut self, on_track: impl Fn(i32) -> bool, allow_fade_out: bool) {
        let mut i = 0;
        while i < self.jobs.len() {
            if !on_track(self.jobs[i].job.state().track()) {
                i += 1;
            } else if allow_fade_out {
                let id = self.jobs[i].id;
                self.request_stop(id);
                i += 1;
            } else {
                log::trace!("discard {} (stop without fade)", self.jobs[i].id);
                self.remove_at(i);
            }
        }

        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.enqueued)
            .into_iter()
            .partition(|e| on_track(e.job.state().track()));
        self.enqueued = kept;
        for mut entry in dropped {
            log::trace!("discard queued {}", entry.id);
            entry.job.on_removed();
        }
    }

    /// Request a fade-out stop of one arranged job.
    pub fn stop_job(&mut self, id: JobId) -> Result<(), SequencerError> {
        if self.position(id).is_none() {
            log::error!("stop request for unknown {id}");
            return Err(SequencerError::JobNotFound(id));
        }
        self.request_stop(id);
        Ok(())
    }

    pub fn pause_track(&mut self, track: i32, pause: bool) {
        for entry in self.jobs.iter_mut().filter(|e| e.job.state().track() == track) {
            entry.job.state_mut().pause(pause);
        }
    }

    pub fn pause_all_tracks(&mut self, pause: bool) {
        for entry in &mut self.jobs {
            entry.job.state_mut().pause(pause);
        }
    }

    /// Jump every arranged job's sample time.
    pub fn set_time(&mut self, time: Tick) {
        for entry in &mut self.jobs {
            entry.job.state_mut().set_time(time);
        }
    }

    /// Release a job immediately, from whichever list holds it.
    pub fn discard_job(&mut self, id: JobId) -> Result<(), SequencerError> {
        if let Some(pos) = self.position(id) {
            self.remove_at(pos);
            return Ok(());
        }
        if let Some(pos) = self.enqueued.iter().position(|e| e.id == id) {
            let mut entry = self.enqueued.remove(pos);
            entry.job.on_removed();
            return Ok(());
        }
        log::error!("discard of unknown {id}");
        Err(SequencerError::JobNotFound(id))
    }

    /// Arranged jobs in track order, then queued jobs.
    pub fn jobs(&self) -> impl Iterator<Item = (JobId, &dyn AnimJob)> {
        self.jobs
            .iter()
            .chain(self.enqueued.iter())
            .map(|e| (e.id, e.job.as_ref() as &dyn AnimJob))
    }

    pub fn jobs_by_track(&self, track: i32) -> Vec<JobId> {
        self.jobs()
            .filter(|(_, j)| j.state().track() == track)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn jobs_by_name(&self, name: &str) -> Vec<JobId> {
        self.jobs()
            .filter(|(_, j)| j.state().name() == name)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn job(&self, id: JobId) -> Option<&dyn AnimJob> {
        self.jobs().find(|(jid, _)| *jid == id).map(|(_, j)| j)
    }

    pub fn job_list_of(&self, id: JobId) -> Option<JobList> {
        if self.position(id).is_some() {
            if self.stopped.contains(&id) {
                Some(JobList::Stopping)
            } else {
                Some(JobList::Active)
            }
        } else if self.enqueued.iter().any(|e| e.id == id) {
            Some(JobList::Queued)
        } else {
            None
        }
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len() + self.enqueued.len()
    }

    /// Events of playing, unpaused jobs in `[start, end)`, cut at each job's end.
    /// With `dominating_only` only the highest-track job playing at both ends of
    /// the range contributes; the later-inserted job wins a tie.
    pub fn emit_anim_events(
        &self,
        start: Tick,
        end: Tick,
        dominating_only: bool,
        category: Option<&str>,
    ) -> Vec<AnimEventInfo> {
        let candidates: &[Entry] = if dominating_only {
            match self.dominating_job_index(start, end) {
                Some(i) => &self.jobs[i..=i],
                None => &[],
            }
        } else {
            &self.jobs
        };

        let mut out = Vec::new();
        for entry in candidates {
            let state = entry.job.state();
            if !state.is_playing(start) || state.is_paused() {
                continue;
            }
            let effective_end = state.absolute_end_time().map_or(end, |e| end.min(e));
            out.extend(entry.job.emit_anim_events(start, effective_end, category));
        }
        out
    }

    fn dominating_job_index(&self, start: Tick, end: Tick) -> Option<usize> {
        let mut best: Option<(usize, i32)> = None;
        for (i, entry) in self.jobs.iter().enumerate() {
            let state = entry.job.state();
            if !state.is_playing(start) || !state.is_playing(end) {
                continue;
            }
            if best.map_or(true, |(_, track)| state.track() >= track) {
                best = Some((i, state.track()));
            }
        }
        best.map(|(i, _)| i)
    }

    /// One line per arranged job.
    pub fn frame_dump(&self, time: Tick) -> Vec<JobDebugInfo> {
        self.jobs
            .iter()
            .map(|e| {
                let s = e.job.state();
                JobDebugInfo {
                    id: e.id,
                    name: s.name().to_string(),
                    track: s.track(),
                    start: s.absolute_start_time(),
                    end: s.absolute_end_time(),
                    fade_in: s.fade_in(),
                    fade_out: s.fade_out(),
                    weight: s.compute_blend_weight(time - s.absolute_start_time()),
                    time_factor: s.time_factor(),
                    paused: s.is_paused(),
                    phase: s.phase(time),
                }
            })
            .collect()
    }

    fn log_frame_dump(&self, time: Tick) {
        log::debug!("=== sequencer frame dump (ticks={time}, jobs={})", self.jobs.len());
        for info in self.frame_dump(time) {
            log::debug!(
                "{} '{}' track={} start={} end={} fade=({}, {}) weight={:.3} factor={} paused={} {:?}",
                info.id,
                info.name,
                info.track,
                info.start,
                info.end.map_or_else(|| "inf".to_string(), |e| e.to_string()),
                info.fade_in,
                info.fade_out,
                info.weight,
                info.time_factor,
                info.paused,
                info.phase
            );
        }
    }
}

enum Arrange {
    Insert { at: usize, base_time: Tick },
    Drop,
    Blocked(SequencerError),
}
