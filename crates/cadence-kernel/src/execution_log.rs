//! Execution log: an observer that records every lifecycle event.
//!
//! [ExecutionLog] is one recorded entry. Attach an [ExecutionRecorder] with
//! [crate::Scheduler::on_command_event] and read the entries back, or export
//! them as JSON for offline inspection.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{CommandEvent, LifecycleEvent};
use crate::identity::CommandId;

/// One recorded lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    /// Scheduler tick the event happened in. Events emitted outside `run`
    /// carry the number of the last completed tick.
    pub tick: u64,
    pub command: CommandId,
    pub name: String,
    pub event: LifecycleEvent,
    /// Scheduler clock reading, in milliseconds.
    pub at_ms: u64,
    /// Wall-clock time the entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionLog {
    pub fn from_event(event: &CommandEvent) -> Self {
        Self {
            tick: event.tick,
            command: event.command,
            name: event.name.to_string(),
            event: event.kind,
            at_ms: u64::try_from(event.at.as_millis()).unwrap_or(u64::MAX),
            recorded_at: Utc::now(),
        }
    }
}

/// Shared, append-only store of [ExecutionLog] entries.
///
/// Clones share the same entries; hand one to the scheduler via
/// [ExecutionRecorder::observer] and keep another to read from.
#[derive(Clone, Debug, Default)]
pub struct ExecutionRecorder {
    entries: Rc<RefCell<Vec<ExecutionLog>>>,
    skip_execute: bool,
}

impl ExecutionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `Executed` events, which otherwise dominate the log.
    pub fn without_execute_events(mut self) -> Self {
        self.skip_execute = true;
        self
    }

    pub fn observer(&self) -> impl FnMut(&CommandEvent) + 'static {
        let entries = self.entries.clone();
        let skip_execute = self.skip_execute;
        move |event: &CommandEvent| {
            if skip_execute && event.kind == LifecycleEvent::Executed {
                return;
            }
            entries.borrow_mut().push(ExecutionLog::from_event(event));
        }
    }

    pub fn entries(&self) -> Vec<ExecutionLog> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Entries of one command, in recording order.
    pub fn scan(&self, command: CommandId) -> Vec<ExecutionLog> {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.command == command)
            .cloned()
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.entries.borrow())
    }
}
