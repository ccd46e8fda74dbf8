//! Ready-made commands built from closures.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tracing::{info, warn};

use crate::claims::Requirements;
use crate::command::{Command, CommandContext};
use crate::identity::{CommandId, SubsystemId};

type Action = Box<dyn FnMut()>;
type Condition = Box<dyn FnMut() -> bool>;

fn requirements_of(subsystems: impl IntoIterator<Item = SubsystemId>) -> Requirements {
    subsystems.into_iter().collect()
}

/// Runs an action once in `initialize` and finishes immediately.
pub struct InstantCommand {
    action: Action,
    requirements: Requirements,
}

impl InstantCommand {
    pub fn new(action: impl FnMut() + 'static) -> Self {
        Self {
            action: Box::new(action),
            requirements: Requirements::new(),
        }
    }

    /// Does nothing and finishes immediately.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn with_requirements(mut self, subsystems: impl IntoIterator<Item = SubsystemId>) -> Self {
        self.requirements = requirements_of(subsystems);
        self
    }
}

impl Command for InstantCommand {
    fn initialize(&mut self, _ctx: &mut CommandContext) {
        (self.action)();
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        true
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }
}

/// Runs an action every tick and never finishes on its own.
pub struct RunCommand {
    action: Action,
    requirements: Requirements,
}

impl RunCommand {
    pub fn new(action: impl FnMut() + 'static) -> Self {
        Self {
            action: Box::new(action),
            requirements: Requirements::new(),
        }
    }

    pub fn with_requirements(mut self, subsystems: impl IntoIterator<Item = SubsystemId>) -> Self {
        self.requirements = requirements_of(subsystems);
        self
    }
}

impl Command for RunCommand {
    fn execute(&mut self, _ctx: &mut CommandContext) {
        (self.action)();
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }
}

/// Runs one action on start and another on end; never finishes on its own.
pub struct StartEndCommand {
    on_start: Action,
    on_end: Action,
    requirements: Requirements,
}

impl StartEndCommand {
    pub fn new(on_start: impl FnMut() + 'static, on_end: impl FnMut() + 'static) -> Self {
        Self {
            on_start: Box::new(on_start),
            on_end: Box::new(on_end),
            requirements: Requirements::new(),
        }
    }

    pub fn with_requirements(mut self, subsystems: impl IntoIterator<Item = SubsystemId>) -> Self {
        self.requirements = requirements_of(subsystems);
        self
    }
}

impl Command for StartEndCommand {
    fn initialize(&mut self, _ctx: &mut CommandContext) {
        (self.on_start)();
    }

    fn end(&mut self, _interrupted: bool, _ctx: &mut CommandContext) {
        (self.on_end)();
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }
}

/// A command assembled from four closures, one per lifecycle phase.
pub struct FunctionalCommand {
    on_init: Action,
    on_execute: Action,
    on_end: Box<dyn FnMut(bool)>,
    is_finished: Condition,
    requirements: Requirements,
}

impl FunctionalCommand {
    pub fn new(
        on_init: impl FnMut() + 'static,
        on_execute: impl FnMut() + 'static,
        on_end: impl FnMut(bool) + 'static,
        is_finished: impl FnMut() -> bool + 'static,
    ) -> Self {
        Self {
            on_init: Box::new(on_init),
            on_execute: Box::new(on_execute),
            on_end: Box::new(on_end),
            is_finished: Box::new(is_finished),
            requirements: Requirements::new(),
        }
    }

    pub fn with_requirements(mut self, subsystems: impl IntoIterator<Item = SubsystemId>) -> Self {
        self.requirements = requirements_of(subsystems);
        self
    }
}

impl Command for FunctionalCommand {
    fn initialize(&mut self, _ctx: &mut CommandContext) {
        (self.on_init)();
    }

    fn execute(&mut self, _ctx: &mut CommandContext) {
        (self.on_execute)();
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        (self.is_finished)()
    }

    fn end(&mut self, interrupted: bool, _ctx: &mut CommandContext) {
        (self.on_end)(interrupted);
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }
}

/// Finishes once `duration` has elapsed since it was initialized.
pub struct WaitCommand {
    duration: Duration,
    started: Duration,
}

impl WaitCommand {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: Duration::ZERO,
        }
    }
}

impl Command for WaitCommand {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.started = ctx.now();
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        ctx.now().saturating_sub(self.started) >= self.duration
    }

    fn runs_when_disabled(&self) -> bool {
        true
    }
}

/// Finishes as soon as a condition holds.
pub struct WaitUntilCommand {
    condition: Condition,
}

impl WaitUntilCommand {
    pub fn new(condition: impl FnMut() -> bool + 'static) -> Self {
        Self {
            condition: Box::new(condition),
        }
    }
}

impl Command for WaitUntilCommand {
    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        (self.condition)()
    }

    fn runs_when_disabled(&self) -> bool {
        true
    }
}

/// Picks one of two commands when initialized.
///
/// Requirements are the union of both branches since either may run.
pub struct ConditionalCommand {
    on_true: Box<dyn Command>,
    on_false: Box<dyn Command>,
    condition: Condition,
    selected: Option<bool>,
    requirements: Requirements,
}

impl ConditionalCommand {
    pub fn new(
        on_true: Box<dyn Command>,
        on_false: Box<dyn Command>,
        condition: impl FnMut() -> bool + 'static,
    ) -> Self {
        let mut requirements = on_true.requirements().clone();
        requirements.extend_from(on_false.requirements());
        Self {
            on_true,
            on_false,
            condition: Box::new(condition),
            selected: None,
            requirements,
        }
    }

    fn active(&mut self) -> Option<&mut Box<dyn Command>> {
        match self.selected? {
            true => Some(&mut self.on_true),
            false => Some(&mut self.on_false),
        }
    }
}

impl Command for ConditionalCommand {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.selected = Some((self.condition)());
        if let Some(active) = self.active() {
            active.initialize(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        if let Some(active) = self.active() {
            active.execute(ctx);
        }
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        self.active().map_or(true, |active| active.is_finished(ctx))
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        if let Some(active) = self.active() {
            active.end(interrupted, ctx);
        }
        self.selected = None;
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.on_true.is_interruptible() && self.on_false.is_interruptible()
    }

    fn runs_when_disabled(&self) -> bool {
        self.on_true.runs_when_disabled() && self.on_false.runs_when_disabled()
    }
}

/// Picks one of several commands by key when initialized.
///
/// A key with no matching command runs nothing and finishes at once.
pub struct SelectCommand<K> {
    commands: HashMap<K, Box<dyn Command>>,
    selector: Box<dyn FnMut() -> K>,
    selected: Option<K>,
    requirements: Requirements,
}

impl<K: Eq + Hash + std::fmt::Debug> SelectCommand<K> {
    pub fn new(
        selector: impl FnMut() -> K + 'static,
        commands: impl IntoIterator<Item = (K, Box<dyn Command>)>,
    ) -> Self {
        let commands: HashMap<K, Box<dyn Command>> = commands.into_iter().collect();
        let mut requirements = Requirements::new();
        for command in commands.values() {
            requirements.extend_from(command.requirements());
        }
        Self {
            commands,
            selector: Box::new(selector),
            selected: None,
            requirements,
        }
    }

    fn active(&mut self) -> Option<&mut Box<dyn Command>> {
        let key = self.selected.as_ref()?;
        self.commands.get_mut(key)
    }
}

impl<K: Eq + Hash + std::fmt::Debug> Command for SelectCommand<K> {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        let key = (self.selector)();
        if !self.commands.contains_key(&key) {
            warn!(key = ?key, "select command has no command for key");
            self.selected = None;
            return;
        }
        self.selected = Some(key);
        if let Some(active) = self.active() {
            active.initialize(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        if let Some(active) = self.active() {
            active.execute(ctx);
        }
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        self.active().map_or(true, |active| active.is_finished(ctx))
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        if let Some(active) = self.active() {
            active.end(interrupted, ctx);
        }
        self.selected = None;
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.commands.values().all(|command| command.is_interruptible())
    }

    fn runs_when_disabled(&self) -> bool {
        self.commands.values().all(|command| command.runs_when_disabled())
    }
}

/// Logs a message and finishes.
pub struct PrintCommand {
    message: String,
}

impl PrintCommand {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Command for PrintCommand {
    fn initialize(&mut self, _ctx: &mut CommandContext) {
        info!(target: "cadence::print", "{}", self.message);
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        true
    }

    fn runs_when_disabled(&self) -> bool {
        true
    }
}

/// Asks the scheduler to start other commands, then finishes.
///
/// The targets run independently: cancelling this command afterwards does
/// not touch them.
pub struct ScheduleCommand {
    targets: Vec<CommandId>,
}

impl ScheduleCommand {
    pub fn new(targets: impl IntoIterator<Item = CommandId>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }
}

impl Command for ScheduleCommand {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        for target in &self.targets {
            ctx.schedule(*target);
        }
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        true
    }

    fn runs_when_disabled(&self) -> bool {
        true
    }
}
