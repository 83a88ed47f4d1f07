use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use promptsmith_core_types::Stage;

/// Parameters fixed for the duration of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Instruction prepended to every rewrite payload; ignored by the generate stage.
    pub prefix: String,
    /// Pause after every task, whatever its outcome.
    pub inter_task_delay: Duration,
}

impl RunConfig {
    pub fn for_stage(stage: Stage, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            inter_task_delay: stage.default_delay(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_task_delay = delay;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
}

/// Lock-free holder for a runner's [`RunState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(RunState::Idle as u8))
    }

    pub(crate) fn get(&self) -> RunState {
        match self.0.load(Ordering::Acquire) {
            0 => RunState::Idle,
            _ => RunState::Running,
        }
    }

    /// `idle -> running`; false when a run already holds the cell.
    pub(crate) fn try_begin(&self) -> bool {
        self.0
            .compare_exchange(
                RunState::Idle as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.0.store(RunState::Idle as u8, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every task in the snapshot was attempted.
    Completed,
    /// `stop` took effect before the snapshot was exhausted.
    Stopped,
    /// The stage's execution context was not registered; nothing was attempted.
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub stage: Stage,
    /// Tasks in the start-time snapshot.
    pub queued: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub(crate) fn new(stage: Stage, queued: usize) -> Self {
        Self {
            stage,
            queued,
            processed: 0,
            succeeded: 0,
            failed: 0,
            outcome: RunOutcome::Completed,
        }
    }
}
