//! Decorators and the fluent [CommandExt] builder.
//!
//! Every decorator takes the wrapped command by value and reports the
//! wrapped command's requirements (plus its own, for [Customized]), so
//! requirements always form the union of all nested layers.

use std::time::Duration;

use crate::claims::Requirements;
use crate::command::{Command, CommandContext};
use crate::commands::InstantCommand;
use crate::error::KernelError;
use crate::group::{Deadline, Parallel, Race, Sequential};
use crate::identity::SubsystemId;

/// Ends the wrapped command after a fixed duration.
pub struct Timeout {
    inner: Box<dyn Command>,
    duration: Duration,
    started: Duration,
    inner_finished: bool,
}

impl Timeout {
    pub fn new(inner: Box<dyn Command>, duration: Duration) -> Self {
        Self {
            inner,
            duration,
            started: Duration::ZERO,
            inner_finished: false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Command for Timeout {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.started = ctx.now();
        self.inner_finished = false;
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        self.inner.execute(ctx);
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        self.inner_finished = self.inner.is_finished(ctx);
        self.inner_finished || ctx.now().saturating_sub(self.started) >= self.duration
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        self.inner.end(interrupted || !self.inner_finished, ctx);
    }

    fn requirements(&self) -> &Requirements {
        self.inner.requirements()
    }

    fn is_interruptible(&self) -> bool {
        self.inner.is_interruptible()
    }

    fn runs_when_disabled(&self) -> bool {
        self.inner.runs_when_disabled()
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}

/// Ends the wrapped command as soon as a condition holds.
pub struct Until {
    inner: Box<dyn Command>,
    condition: Box<dyn FnMut() -> bool>,
    inner_finished: bool,
}

impl Until {
    pub fn new(inner: Box<dyn Command>, condition: impl FnMut() -> bool + 'static) -> Self {
        Self {
            inner,
            condition: Box::new(condition),
            inner_finished: false,
        }
    }
}

impl Command for Until {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.inner_finished = false;
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        self.inner.execute(ctx);
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        self.inner_finished = self.inner.is_finished(ctx);
        self.inner_finished || (self.condition)()
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        self.inner.end(interrupted || !self.inner_finished, ctx);
    }

    fn requirements(&self) -> &Requirements {
        self.inner.requirements()
    }

    fn is_interruptible(&self) -> bool {
        self.inner.is_interruptible()
    }

    fn runs_when_disabled(&self) -> bool {
        self.inner.runs_when_disabled()
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}

/// Keeps executing the wrapped command forever. Only a cancel or an
/// interrupting schedule request stops it.
pub struct Perpetual {
    inner: Box<dyn Command>,
}

impl Perpetual {
    pub fn new(inner: Box<dyn Command>) -> Self {
        Self { inner }
    }
}

impl Command for Perpetual {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        self.inner.execute(ctx);
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        false
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext) {
        self.inner.end(true, ctx);
    }

    fn requirements(&self) -> &Requirements {
        self.inner.requirements()
    }

    fn is_interruptible(&self) -> bool {
        self.inner.is_interruptible()
    }

    fn runs_when_disabled(&self) -> bool {
        self.inner.runs_when_disabled()
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}

/// Overrides the name, flags or requirements of the wrapped command.
pub struct Customized {
    inner: Box<dyn Command>,
    name: Option<String>,
    interruptible: Option<bool>,
    runs_when_disabled: Option<bool>,
    requirements: Requirements,
}

impl Customized {
    pub fn new(inner: Box<dyn Command>) -> Self {
        let requirements = inner.requirements().clone();
        Self {
            inner,
            name: None,
            interruptible: None,
            runs_when_disabled: None,
            requirements,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = Some(interruptible);
        self
    }

    pub fn ignoring_disable(mut self, runs_when_disabled: bool) -> Self {
        self.runs_when_disabled = Some(runs_when_disabled);
        self
    }

    /// Adds requirements on top of the wrapped command's. A subsystem the
    /// wrapped command already requires is a configuration error.
    pub fn requiring(
        mut self,
        extra: impl IntoIterator<Item = SubsystemId>,
    ) -> Result<Self, KernelError> {
        for subsystem in extra {
            if self.inner.requirements().contains(subsystem) {
                return Err(KernelError::WrapperRequirementConflict(subsystem));
            }
            self.requirements.insert(subsystem);
        }
        Ok(self)
    }
}

impl Command for Customized {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.inner.initialize(ctx);
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        self.inner.execute(ctx);
    }

    fn is_finished(&mut self, ctx: &mut CommandContext) -> bool {
        self.inner.is_finished(ctx)
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        self.inner.end(interrupted, ctx);
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.interruptible
            .unwrap_or_else(|| self.inner.is_interruptible())
    }

    fn runs_when_disabled(&self) -> bool {
        self.runs_when_disabled
            .unwrap_or_else(|| self.inner.runs_when_disabled())
    }

    fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.inner.name())
    }
}

/// Fluent composition for any command.
pub trait CommandExt: Command + Sized + 'static {
    fn boxed(self) -> Box<dyn Command> {
        Box::new(self)
    }

    fn with_timeout(self, duration: Duration) -> Timeout {
        Timeout::new(self.boxed(), duration)
    }

    fn until(self, condition: impl FnMut() -> bool + 'static) -> Until {
        Until::new(self.boxed(), condition)
    }

    fn perpetually(self) -> Perpetual {
        Perpetual::new(self.boxed())
    }

    /// Runs `action` when the resulting group is initialized, which happens
    /// at schedule time.
    fn before_starting(self, action: impl FnMut() + 'static) -> Sequential {
        Sequential::new(vec![InstantCommand::new(action).boxed(), self.boxed()])
    }

    fn and_then(self, next: impl Command + 'static) -> Sequential {
        Sequential::new(vec![self.boxed(), Box::new(next)])
    }

    fn and_then_run(self, action: impl FnMut() + 'static) -> Sequential {
        Sequential::new(vec![self.boxed(), InstantCommand::new(action).boxed()])
    }

    fn along_with(self, others: Vec<Box<dyn Command>>) -> Result<Parallel, KernelError> {
        let mut commands = vec![self.boxed()];
        commands.extend(others);
        Parallel::new(commands)
    }

    fn race_with(self, others: Vec<Box<dyn Command>>) -> Result<Race, KernelError> {
        let mut commands = vec![self.boxed()];
        commands.extend(others);
        Race::new(commands)
    }

    /// Makes this command the dictator of a deadline group.
    fn deadline_with(self, satellites: Vec<Box<dyn Command>>) -> Result<Deadline, KernelError> {
        Deadline::new(self.boxed(), satellites)
    }

    fn with_name(self, name: impl Into<String>) -> Customized {
        Customized::new(self.boxed()).with_name(name)
    }

    fn with_interruptible(self, interruptible: bool) -> Customized {
        Customized::new(self.boxed()).with_interruptible(interruptible)
    }

    fn ignoring_disable(self, runs_when_disabled: bool) -> Customized {
        Customized::new(self.boxed()).ignoring_disable(runs_when_disabled)
    }

    fn requiring(
        self,
        extra: impl IntoIterator<Item = SubsystemId>,
    ) -> Result<Customized, KernelError> {
        Customized::new(self.boxed()).requiring(extra)
    }
}

impl<C: Command + 'static> CommandExt for C {}
