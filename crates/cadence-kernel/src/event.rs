//! Lifecycle notifications emitted by the scheduler.

use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::CommandId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Initialized,
    Executed,
    /// Ended normally after reporting finished.
    Finished,
    /// Ended by cancel, conflict, disable or unregistration.
    Interrupted,
}

/// Read-only view handed to lifecycle observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub tick: u64,
    pub command: CommandId,
    pub name: Rc<str>,
    pub kind: LifecycleEvent,
    /// Clock reading of the operation that emitted the event.
    pub at: Duration,
}

/// Counts of lifecycle events seen during one `run` call. Starts and
/// cancels requested between ticks are not counted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub initialized: usize,
    pub executed: usize,
    pub finished: usize,
    pub interrupted: usize,
}

impl TickReport {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, kind: LifecycleEvent) {
        match kind {
            LifecycleEvent::Initialized => self.initialized += 1,
            LifecycleEvent::Executed => self.executed += 1,
            LifecycleEvent::Finished => self.finished += 1,
            LifecycleEvent::Interrupted => self.interrupted += 1,
        }
    }

    /// Number of commands that ended during the tick, either way.
    pub fn ended(&self) -> usize {
        self.finished + self.interrupted
    }
}
