//! The command lifecycle contract and the subsystem hook.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::claims::Requirements;
use crate::identity::CommandId;

/// Scheduling request issued by a command from inside a lifecycle call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Schedule(CommandId),
    Cancel(CommandId),
}

/// Per-call view of the scheduler handed to every lifecycle method.
///
/// Requests queued here are applied by the scheduler after the current
/// operation (or after the whole sweep during [crate::Scheduler::run]), never
/// while the running set is being iterated.
#[derive(Debug)]
pub struct CommandContext {
    now: Duration,
    enabled: bool,
    requests: Vec<Request>,
}

impl CommandContext {
    pub fn new(now: Duration, enabled: bool) -> Self {
        Self {
            now,
            enabled,
            requests: Vec::new(),
        }
    }

    /// Timestamp of the current scheduler operation.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Whether the robot is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn schedule(&mut self, command: CommandId) {
        self.requests.push(Request::Schedule(command));
    }

    pub fn cancel(&mut self, command: CommandId) {
        self.requests.push(Request::Cancel(command));
    }

    pub fn pending_requests(&self) -> &[Request] {
        &self.requests
    }

    pub(crate) fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }
}

/// A unit of control logic.
///
/// The scheduler guarantees the call order `initialize`, zero or more
/// (`execute`, `is_finished`) pairs, then exactly one `end`. `end` receives
/// `interrupted = false` only when `is_finished` returned true.
///
/// None of these methods may block: long-running work is spread across ticks.
pub trait Command {
    fn initialize(&mut self, _ctx: &mut CommandContext) {}

    fn execute(&mut self, _ctx: &mut CommandContext) {}

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        false
    }

    fn end(&mut self, _interrupted: bool, _ctx: &mut CommandContext) {}

    /// Subsystems held exclusively for the whole run. Must not change while
    /// the command is scheduled.
    fn requirements(&self) -> &Requirements {
        Requirements::none()
    }

    /// Whether a conflicting schedule request may end this command early.
    fn is_interruptible(&self) -> bool {
        true
    }

    fn runs_when_disabled(&self) -> bool {
        false
    }

    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

impl<C: Command + ?Sized> Command for Box<C> {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        (**self).initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        (**self).execute(ctx);
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        (**self).is_finished(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        (**self).end(interrupted, ctx);
    }

    fn requirements(&self) -> &Requirements {
        (**self).requirements()
    }

    fn is_interruptible(&self) -> bool {
        (**self).is_interruptible()
    }

    fn runs_when_disabled(&self) -> bool {
        (**self).runs_when_disabled()
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// User side of a registered subsystem.
pub trait Subsystem {
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Called once at the start of every scheduler tick.
    fn periodic(&mut self) {}
}

/// Lets a subsystem be registered while commands keep shared handles to it.
impl<S: Subsystem + ?Sized> Subsystem for Rc<RefCell<S>> {
    fn name(&self) -> String {
        self.borrow().name()
    }

    fn periodic(&mut self) {
        self.borrow_mut().periodic();
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
