//! The scheduler: command table, claim resolution and the per-tick sweep.
//!
//! Every transition of a command goes through one of two paths: `start`
//! claims and initializes, `retire` ends and releases. `retire`
//! takes the claimed requirements out of the entry before calling `end`, so a
//! command can only be ended once per run.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use crate::claims::{ClaimRegistry, Requirements};
use crate::clock::{Clock, MonotonicClock};
use crate::command::{Command, CommandContext, Request, Subsystem};
use crate::error::KernelError;
use crate::event::{CommandEvent, LifecycleEvent, TickReport};
use crate::identity::{CommandId, SubsystemId};
use crate::trigger::{Binding, Trigger, TriggerBinding};

type Observer = Box<dyn FnMut(&CommandEvent)>;

struct CommandEntry {
    command: Box<dyn Command>,
    name: Rc<str>,
    /// Requirements claimed for the current run; `None` while idle.
    claimed: Option<Requirements>,
}

struct SubsystemEntry {
    subsystem: Box<dyn Subsystem>,
    name: String,
    default_command: Option<CommandId>,
}

#[derive(Default)]
struct Observers {
    initialize: Vec<Observer>,
    execute: Vec<Observer>,
    finish: Vec<Observer>,
    interrupt: Vec<Observer>,
    any: Vec<Observer>,
}

impl Observers {
    fn notify(&mut self, event: &CommandEvent) {
        let specific = match event.kind {
            LifecycleEvent::Initialized => &mut self.initialize,
            LifecycleEvent::Executed => &mut self.execute,
            LifecycleEvent::Finished => &mut self.finish,
            LifecycleEvent::Interrupted => &mut self.interrupt,
        };
        for observer in specific.iter_mut().chain(self.any.iter_mut()) {
            observer(event);
        }
    }
}

/// Outcome of checking a schedule request against current state.
enum Admission {
    /// May start after interrupting these holders.
    Start(Vec<CommandId>),
    AlreadyScheduled,
    Rejected,
}

/// Owns every registered command and subsystem and advances the scheduled
/// commands once per [Scheduler::run].
pub struct Scheduler {
    clock: Box<dyn Clock>,
    commands: BTreeMap<CommandId, CommandEntry>,
    /// Scheduled commands in the order they started.
    order: Vec<CommandId>,
    claims: ClaimRegistry,
    subsystems: BTreeMap<SubsystemId, SubsystemEntry>,
    bindings: Vec<TriggerBinding>,
    observers: Observers,
    enabled: bool,
    suspended: bool,
    tick: u64,
    /// Counts for the tick in progress; `None` between ticks.
    report: Option<TickReport>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }

    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            commands: BTreeMap::new(),
            order: Vec::new(),
            claims: ClaimRegistry::new(),
            subsystems: BTreeMap::new(),
            bindings: Vec::new(),
            observers: Observers::default(),
            enabled: true,
            suspended: false,
            tick: 0,
            report: None,
        }
    }
}

impl Scheduler {
    /// Moves a command into the scheduler and returns its handle.
    pub fn add_command(&mut self, command: impl Command + 'static) -> CommandId {
        self.insert_command(Box::new(command))
    }

    fn insert_command(&mut self, command: Box<dyn Command>) -> CommandId {
        let id = CommandId::next();
        let name: Rc<str> = command.name().into();
        tracing::debug!(command = %id, name = %name, "command registered");
        self.commands.insert(
            id,
            CommandEntry {
                command,
                name,
                claimed: None,
            },
        );
        id
    }

    /// Takes an idle command back out of the scheduler. Trigger bindings
    /// targeting it are dropped as well.
    pub fn remove_command(&mut self, id: CommandId) -> Result<Box<dyn Command>, KernelError> {
        let entry = self
            .commands
            .get(&id)
            .ok_or(KernelError::UnknownCommand(id))?;
        if entry.claimed.is_some() {
            return Err(KernelError::CommandScheduled(id));
        }
        if let Some(subsystem) = self.default_owner(id) {
            return Err(KernelError::DefaultCommandInUse {
                command: id,
                subsystem,
            });
        }
        self.bindings.retain(|binding| binding.target() != id);
        let entry = self
            .commands
            .remove(&id)
            .ok_or(KernelError::UnknownCommand(id))?;
        tracing::debug!(command = %id, name = %entry.name, "command removed");
        Ok(entry.command)
    }

    pub fn command_name(&self, id: CommandId) -> Option<&str> {
        self.commands.get(&id).map(|entry| &*entry.name)
    }
}

impl Scheduler {
    /// Starts a command, interrupting whatever holds its requirements.
    ///
    /// Silently ignored when the id is unknown, the command is already
    /// scheduled, the scheduler is suspended, the robot is disabled and the
    /// command does not run when disabled, or a holder is not interruptible.
    pub fn schedule(&mut self, id: CommandId) {
        let mut ctx = self.context();
        self.schedule_with(id, &mut ctx);
        self.apply_requests(&mut ctx);
    }

    /// Schedules each command independently, in order.
    pub fn schedule_all(&mut self, ids: &[CommandId]) {
        let mut ctx = self.context();
        for id in ids {
            self.schedule_with(*id, &mut ctx);
        }
        self.apply_requests(&mut ctx);
    }

    /// Schedules every command or none of them. Returns whether the batch
    /// started. Members that are already scheduled keep running and count as
    /// accepted.
    pub fn schedule_all_or_none(&mut self, ids: &[CommandId]) -> bool {
        let mut seen = BTreeSet::new();
        let mut combined = Requirements::new();
        let mut starts = Vec::new();
        for id in ids {
            if !seen.insert(*id) {
                continue;
            }
            let Some(entry) = self.commands.get(id) else {
                tracing::warn!(command = %id, "batch rejected: unknown command");
                return false;
            };
            let requirements = entry.command.requirements();
            if let Some(subsystem) = combined.first_overlap(requirements) {
                tracing::debug!(command = %id, subsystem = %subsystem, "batch rejected: members overlap");
                return false;
            }
            combined.extend_from(requirements);
            match self.admit(*id) {
                Admission::Start(_) => starts.push(*id),
                Admission::AlreadyScheduled => {}
                Admission::Rejected => return false,
            }
        }

        let mut ctx = self.context();
        for id in starts {
            self.schedule_with(id, &mut ctx);
        }
        self.apply_requests(&mut ctx);
        true
    }

    /// Ends a scheduled command with `interrupted = true`. No-op otherwise.
    pub fn cancel(&mut self, id: CommandId) {
        let mut ctx = self.context();
        if !self.retire(id, true, &mut ctx) {
            tracing::debug!(command = %id, "cancel ignored: command not scheduled");
        }
        self.apply_requests(&mut ctx);
    }

    pub fn cancel_all(&mut self) {
        let mut ctx = self.context();
        for id in self.order.clone() {
            self.retire(id, true, &mut ctx);
        }
        self.apply_requests(&mut ctx);
    }

    /// True only if every listed command is scheduled. An empty list is
    /// vacuously true.
    pub fn is_scheduled(&self, ids: &[CommandId]) -> bool {
        ids.iter().all(|id| {
            self.commands
                .get(id)
                .is_some_and(|entry| entry.claimed.is_some())
        })
    }

    /// The command currently holding `subsystem`.
    pub fn requiring(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.claims.claimant(subsystem)
    }

    /// Scheduled commands in the order they started.
    pub fn scheduled(&self) -> &[CommandId] {
        &self.order
    }
}

impl Scheduler {
    /// Runs one tick: subsystem hooks, trigger polling, the sweep over
    /// scheduled commands, deferred requests and finally default commands.
    pub fn run(&mut self) -> TickReport {
        self.tick += 1;
        if self.suspended {
            tracing::trace!(tick = self.tick, "scheduler suspended; tick skipped");
            return TickReport::new(self.tick);
        }
        self.report = Some(TickReport::new(self.tick));

        for entry in self.subsystems.values_mut() {
            entry.subsystem.periodic();
        }

        let mut ctx = self.context();
        self.poll_triggers(&mut ctx);
        self.apply_requests(&mut ctx);
        self.sweep(&mut ctx);
        self.apply_requests(&mut ctx);
        self.schedule_defaults(&mut ctx);
        self.apply_requests(&mut ctx);

        let report = self
            .report
            .take()
            .unwrap_or_else(|| TickReport::new(self.tick));
        tracing::trace!(
            tick = self.tick,
            scheduled = self.order.len(),
            executed = report.executed,
            ended = report.ended(),
            "tick complete"
        );
        report
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn sweep(&mut self, ctx: &mut CommandContext) {
        for id in self.order.clone() {
            let Some(entry) = self.commands.get_mut(&id) else {
                continue;
            };
            if entry.claimed.is_none() {
                continue;
            }
            if !self.enabled && !entry.command.runs_when_disabled() {
                tracing::debug!(command = %id, name = %entry.name, "robot disabled; interrupting");
                self.retire(id, true, ctx);
                continue;
            }
            entry.command.execute(ctx);
            self.emit(id, LifecycleEvent::Executed, ctx.now());

            let finished = self
                .commands
                .get_mut(&id)
                .is_some_and(|entry| entry.command.is_finished(ctx));
            if finished {
                self.retire(id, false, ctx);
            }
        }
    }

    fn poll_triggers(&mut self, ctx: &mut CommandContext) {
        let mut bindings = std::mem::take(&mut self.bindings);
        for binding in &mut bindings {
            match binding.poll(|id| self.is_scheduled(&[id])) {
                Some(Request::Schedule(id)) => ctx.schedule(id),
                Some(Request::Cancel(id)) => ctx.cancel(id),
                None => {}
            }
        }
        self.bindings = bindings;
    }

    fn schedule_defaults(&mut self, ctx: &mut CommandContext) {
        let idle: Vec<CommandId> = self
            .subsystems
            .iter()
            .filter(|(subsystem, _)| self.claims.claimant(**subsystem).is_none())
            .filter_map(|(_, entry)| entry.default_command)
            .collect();
        for id in idle {
            if !self.is_scheduled(&[id]) {
                self.schedule_with(id, ctx);
            }
        }
    }
}

impl Scheduler {
    fn context(&self) -> CommandContext {
        CommandContext::new(self.clock.now(), self.enabled)
    }

    fn admit(&self, id: CommandId) -> Admission {
        if self.suspended {
            tracing::debug!(command = %id, "schedule rejected: scheduler suspended");
            return Admission::Rejected;
        }
        let Some(entry) = self.commands.get(&id) else {
            tracing::warn!(command = %id, "schedule rejected: unknown command");
            return Admission::Rejected;
        };
        if entry.claimed.is_some() {
            return Admission::AlreadyScheduled;
        }
        if !self.enabled && !entry.command.runs_when_disabled() {
            tracing::debug!(command = %id, name = %entry.name, "schedule rejected: robot disabled");
            return Admission::Rejected;
        }
        let holders = self.claims.conflicts(entry.command.requirements());
        for holder in &holders {
            let interruptible = self
                .commands
                .get(holder)
                .map_or(true, |held| held.command.is_interruptible());
            if !interruptible {
                tracing::debug!(
                    command = %id,
                    name = %entry.name,
                    holder = %holder,
                    "schedule rejected: requirement held by non-interruptible command"
                );
                return Admission::Rejected;
            }
        }
        Admission::Start(holders)
    }

    fn schedule_with(&mut self, id: CommandId, ctx: &mut CommandContext) -> bool {
        match self.admit(id) {
            Admission::Start(holders) => {
                for holder in holders {
                    tracing::debug!(command = %id, interrupted = %holder, "requirement conflict; interrupting holder");
                    self.retire(holder, true, ctx);
                }
                self.start(id, ctx);
                true
            }
            Admission::AlreadyScheduled | Admission::Rejected => false,
        }
    }

    fn start(&mut self, id: CommandId, ctx: &mut CommandContext) {
        let Some(entry) = self.commands.get_mut(&id) else {
            return;
        };
        let requirements = entry.command.requirements().clone();
        self.claims.claim(id, &requirements);
        entry.claimed = Some(requirements);
        self.order.push(id);
        entry.command.initialize(ctx);
        self.emit(id, LifecycleEvent::Initialized, ctx.now());
    }

    /// Ends a scheduled command and releases its claims. Returns false when
    /// the command was not scheduled.
    fn retire(&mut self, id: CommandId, interrupted: bool, ctx: &mut CommandContext) -> bool {
        let Some(entry) = self.commands.get_mut(&id) else {
            return false;
        };
        let Some(claimed) = entry.claimed.take() else {
            return false;
        };
        entry.command.end(interrupted, ctx);
        self.claims.release(id, &claimed);
        self.order.retain(|scheduled| *scheduled != id);
        let kind = if interrupted {
            LifecycleEvent::Interrupted
        } else {
            LifecycleEvent::Finished
        };
        self.emit(id, kind, ctx.now());
        true
    }

    /// Applies requests queued by commands until the queue stays empty.
    fn apply_requests(&mut self, ctx: &mut CommandContext) {
        loop {
            let requests = ctx.take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                match request {
                    Request::Schedule(id) => {
                        self.schedule_with(id, ctx);
                    }
                    Request::Cancel(id) => {
                        self.retire(id, true, ctx);
                    }
                }
            }
        }
    }

    fn emit(&mut self, id: CommandId, kind: LifecycleEvent, at: Duration) {
        let Some(entry) = self.commands.get(&id) else {
            return;
        };
        let event = CommandEvent {
            tick: self.tick,
            command: id,
            name: entry.name.clone(),
            kind,
            at,
        };
        if let Some(report) = self.report.as_mut() {
            report.record(kind);
        }
        self.observers.notify(&event);
    }
}

impl Scheduler {
    pub fn on_command_initialize(&mut self, observer: impl FnMut(&CommandEvent) + 'static) {
        self.observers.initialize.push(Box::new(observer));
    }

    pub fn on_command_execute(&mut self, observer: impl FnMut(&CommandEvent) + 'static) {
        self.observers.execute.push(Box::new(observer));
    }

    pub fn on_command_finish(&mut self, observer: impl FnMut(&CommandEvent) + 'static) {
        self.observers.finish.push(Box::new(observer));
    }

    pub fn on_command_interrupt(&mut self, observer: impl FnMut(&CommandEvent) + 'static) {
        self.observers.interrupt.push(Box::new(observer));
    }

    /// Observes every lifecycle event regardless of kind.
    pub fn on_command_event(&mut self, observer: impl FnMut(&CommandEvent) + 'static) {
        self.observers.any.push(Box::new(observer));
    }
}

impl Scheduler {
    pub fn register_subsystem(&mut self, subsystem: impl Subsystem + 'static) -> SubsystemId {
        let id = SubsystemId::new();
        let name = subsystem.name();
        tracing::info!(subsystem = %id, name = %name, "subsystem registered");
        self.subsystems.insert(
            id,
            SubsystemEntry {
                subsystem: Box::new(subsystem),
                name,
                default_command: None,
            },
        );
        id
    }

    /// Removes a subsystem. Its default command is interrupted if running and
    /// dropped. Any other command holding the subsystem is interrupted.
    pub fn unregister_subsystem(
        &mut self,
        id: SubsystemId,
    ) -> Result<Box<dyn Subsystem>, KernelError> {
        let entry = self
            .subsystems
            .remove(&id)
            .ok_or(KernelError::UnknownSubsystem(id))?;
        let mut ctx = self.context();
        if let Some(default) = entry.default_command {
            self.drop_command(default, &mut ctx);
        }
        if let Some(holder) = self.claims.claimant(id) {
            tracing::debug!(
                subsystem = %id,
                holder = %holder,
                "interrupting holder of unregistered subsystem"
            );
            self.retire(holder, true, &mut ctx);
        }
        self.claims.release_subsystem(id);
        self.apply_requests(&mut ctx);
        tracing::info!(subsystem = %id, name = %entry.name, "subsystem unregistered");
        Ok(entry.subsystem)
    }

    pub fn subsystem_name(&self, id: SubsystemId) -> Option<&str> {
        self.subsystems.get(&id).map(|entry| entry.name.as_str())
    }

    /// Binds the command scheduled whenever `subsystem` is unclaimed at the
    /// end of a tick. It must require exactly that subsystem and be
    /// interruptible. A previous default is interrupted and dropped.
    pub fn set_default_command(
        &mut self,
        subsystem: SubsystemId,
        command: impl Command + 'static,
    ) -> Result<CommandId, KernelError> {
        if !self.subsystems.contains_key(&subsystem) {
            return Err(KernelError::UnknownSubsystem(subsystem));
        }
        let requirements = command.requirements();
        if requirements.len() != 1 || !requirements.contains(subsystem) {
            return Err(KernelError::InvalidDefaultCommand {
                subsystem,
                reason: "must require exactly its subsystem".to_string(),
            });
        }
        if !command.is_interruptible() {
            return Err(KernelError::InvalidDefaultCommand {
                subsystem,
                reason: "must be interruptible".to_string(),
            });
        }

        let previous = self
            .subsystems
            .get_mut(&subsystem)
            .and_then(|entry| entry.default_command.take());
        if let Some(previous) = previous {
            let mut ctx = self.context();
            self.drop_command(previous, &mut ctx);
            self.apply_requests(&mut ctx);
        }

        let id = self.insert_command(Box::new(command));
        if let Some(entry) = self.subsystems.get_mut(&subsystem) {
            entry.default_command = Some(id);
        }
        tracing::info!(subsystem = %subsystem, command = %id, "default command set");
        Ok(id)
    }

    pub fn default_command(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.subsystems
            .get(&subsystem)
            .and_then(|entry| entry.default_command)
    }

    fn default_owner(&self, command: CommandId) -> Option<SubsystemId> {
        self.subsystems
            .iter()
            .find(|(_, entry)| entry.default_command == Some(command))
            .map(|(subsystem, _)| *subsystem)
    }

    fn drop_command(&mut self, id: CommandId, ctx: &mut CommandContext) {
        self.retire(id, true, ctx);
        self.bindings.retain(|binding| binding.target() != id);
        self.commands.remove(&id);
    }
}

impl Scheduler {
    /// Disabling takes effect on the next tick: commands that do not run when
    /// disabled are interrupted during the sweep.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::info!(enabled, "robot state changed");
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stops ticking and rejects new schedule requests until [Scheduler::resume].
    /// Already scheduled commands keep their claims.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}

impl Scheduler {
    pub fn bind(&mut self, trigger: Trigger, binding: Binding) -> Result<(), KernelError> {
        let target = binding.target();
        if !self.commands.contains_key(&target) {
            return Err(KernelError::UnknownCommand(target));
        }
        self.bindings.push(TriggerBinding::new(trigger, binding));
        Ok(())
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::clock::ManualClock;
    use crate::commands::{InstantCommand, RunCommand};

    #[test]
    fn add_then_schedule_claims_requirements() {
        let mut scheduler = Scheduler::with_clock(ManualClock::new());
        let arm = SubsystemId::new();
        let id = scheduler.add_command(RunCommand::new(|| {}).with_requirements([arm]));
        assert!(!scheduler.is_scheduled(&[id]));
        scheduler.schedule(id);
        assert!(scheduler.is_scheduled(&[id]));
        assert_eq!(scheduler.requiring(arm), Some(id));
        assert_eq!(scheduler.command_name(id), Some("RunCommand"));
    }

    #[test]
    fn instant_command_finishes_in_first_tick() {
        let mut scheduler = Scheduler::with_clock(ManualClock::new());
        let id = scheduler.add_command(InstantCommand::noop());
        scheduler.schedule(id);
        let report = scheduler.run();
        assert_eq!(report.executed, 1);
        assert_eq!(report.finished, 1);
        assert!(!scheduler.is_scheduled(&[id]));
    }

    #[test]
    fn remove_command_refuses_scheduled_commands() {
        let mut scheduler = Scheduler::with_clock(ManualClock::new());
        let id = scheduler.add_command(RunCommand::new(|| {}));
        scheduler.schedule(id);
        assert_eq!(
            scheduler.remove_command(id).err(),
            Some(KernelError::CommandScheduled(id))
        );
        scheduler.cancel(id);
        assert!(scheduler.remove_command(id).is_ok());
        assert_eq!(
            scheduler.remove_command(id).err(),
            Some(KernelError::UnknownCommand(id))
        );
    }

    #[test]
    fn observers_see_events_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut scheduler = Scheduler::with_clock(ManualClock::new());
        scheduler.on_command_event(move |event| sink.borrow_mut().push(event.kind));
        let id = scheduler.add_command(InstantCommand::noop());
        scheduler.schedule(id);
        scheduler.run();
        assert_eq!(
            *seen.borrow(),
            vec![
                LifecycleEvent::Initialized,
                LifecycleEvent::Executed,
                LifecycleEvent::Finished
            ]
        );
    }

    #[test]
    fn suspended_scheduler_skips_ticks() {
        let mut scheduler = Scheduler::with_clock(ManualClock::new());
        let id = scheduler.add_command(RunCommand::new(|| {}));
        scheduler.suspend();
        scheduler.schedule(id);
        assert!(!scheduler.is_scheduled(&[id]));
        assert_eq!(scheduler.run().executed, 0);
        scheduler.resume();
        scheduler.schedule(id);
        assert_eq!(scheduler.run().executed, 1);
        assert_eq!(scheduler.tick(), 2);
    }
}
