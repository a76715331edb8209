//! Evaluation tasks, chains and the dispatchers that run them.
//!
//! A chain is the ordered list of sampling steps for one sequencer frame. Links
//! of one chain always run in order on one thread because each mix step reads
//! the previous step's output. Different chains are independent.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::data::AnimResource;
use crate::mix::{mix_into, JointMask};
use crate::sampling::{sample_clip, IntervalCursor, SampleType};
use crate::scratch::SharedBuffer;
use crate::time::Tick;

/// Second half of a chain link: blend the freshly sampled buffer into `dst`.
#[derive(Debug, Clone)]
pub struct MixStep {
    pub dst: SharedBuffer,
    pub weight: f32,
    pub mask: Option<Arc<JointMask>>,
}

/// One self-contained sampling step. Owns everything it touches, so it can
/// run on any thread.
#[derive(Debug, Clone)]
pub struct EvalTask {
    pub resource: Arc<AnimResource>,
    pub clip: usize,
    /// Clip-relative sample time.
    pub time: Tick,
    pub sample_type: SampleType,
    pub velocity_scale: [f32; 4],
    pub cursor: Arc<Mutex<IntervalCursor>>,
    /// Sampling target.
    pub target: SharedBuffer,
    pub mix: Option<MixStep>,
}

impl EvalTask {
    pub fn run(self) {
        let mut cursor = self.cursor.lock();
        match self.mix {
            None => {
                let mut target = self.target.lock();
                sample_clip(
                    &self.resource,
                    self.clip,
                    self.time,
                    self.sample_type,
                    self.velocity_scale,
                    &mut cursor,
                    &mut target,
                );
            }
            Some(step) => {
                let mut sampled = self.target.lock();
                sample_clip(
                    &self.resource,
                    self.clip,
                    self.time,
                    self.sample_type,
                    self.velocity_scale,
                    &mut cursor,
                    &mut sampled,
                );
                let mut dst = step.dst.lock();
                mix_into(&mut dst, &sampled, step.weight, step.mask.as_deref());
            }
        }
    }
}

/// Ordered tasks of one frame.
#[derive(Debug, Default)]
pub struct EvalChain {
    tasks: Vec<EvalTask>,
}

impl EvalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: EvalTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[EvalTask] {
        &self.tasks
    }

    pub fn run(self) {
        for task in self.tasks {
            task.run();
        }
    }
}

/// Completion signal for a submitted chain. The chain holds the sending side
/// and drops it when done; every clone of the handle observes the disconnect.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    done: Receiver<()>,
}

impl ChainHandle {
    /// A handle and the token whose drop completes it.
    pub fn pair() -> (Sender<()>, ChainHandle) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (tx, ChainHandle { done: rx })
    }

    /// Block until the chain has run.
    pub fn wait(&self) {
        // Only ever disconnects; nothing is sent.
        let _ = self.done.recv();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// Runs chains somewhere and reports completion.
pub trait JobDispatcher: Send + Sync {
    fn submit(&self, chain: EvalChain) -> ChainHandle;
}

/// Runs the chain on the calling thread before returning.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl JobDispatcher for InlineDispatcher {
    fn submit(&self, chain: EvalChain) -> ChainHandle {
        let (token, handle) = ChainHandle::pair();
        chain.run();
        drop(token);
        handle
    }
}

/// Runs each chain as one task on a rayon pool.
pub struct ThreadPoolDispatcher {
    pool: rayon::ThreadPool,
}

impl ThreadPoolDispatcher {
    pub fn new(num_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("cadence-eval-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: rayon::ThreadPool) -> Self {
        Self { pool }
    }
}

impl std::fmt::Debug for ThreadPoolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolDispatcher")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl JobDispatcher for ThreadPoolDispatcher {
    fn submit(&self, chain: EvalChain) -> ChainHandle {
        let (token, handle) = ChainHandle::pair();
        self.pool.spawn(move || {
            chain.run();
            drop(token);
        });
        handle
    }
}
