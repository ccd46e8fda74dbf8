#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cadence_kernel::{Command, CommandContext, Requirements, Subsystem, SubsystemId};

/// Installs a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared record of lifecycle calls, one `label:phase` line per call.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, line: impl Into<String>) {
        self.0.borrow_mut().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Lines recorded for one label.
    pub fn of(&self, label: &str) -> Vec<String> {
        let prefix = format!("{label}:");
        self.0
            .borrow()
            .iter()
            .filter(|line| line.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, line: &str) -> usize {
        self.0.borrow().iter().filter(|l| l.as_str() == line).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Boolean shared between a test and a closure it hands out.
#[derive(Clone, Default)]
pub struct Flag(Rc<Cell<bool>>);

impl Flag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: bool) {
        self.0.set(value);
    }

    pub fn get(&self) -> bool {
        self.0.get()
    }

    pub fn reader(&self) -> impl FnMut() -> bool + 'static {
        let inner = self.0.clone();
        move || inner.get()
    }
}

/// Command that journals every lifecycle call.
pub struct Probe {
    label: String,
    journal: Journal,
    requirements: Requirements,
    finish_after: Option<u32>,
    ticks: u32,
    interruptible: bool,
    runs_when_disabled: bool,
}

impl Probe {
    /// A probe that never finishes on its own.
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            journal: journal.clone(),
            requirements: Requirements::new(),
            finish_after: None,
            ticks: 0,
            interruptible: true,
            runs_when_disabled: false,
        }
    }

    /// Reports finished after `ticks` executions.
    pub fn finishing_after(mut self, ticks: u32) -> Self {
        self.finish_after = Some(ticks);
        self
    }

    pub fn needs(mut self, subsystems: &[SubsystemId]) -> Self {
        self.requirements = subsystems.iter().copied().collect();
        self
    }

    pub fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }

    pub fn when_disabled(mut self) -> Self {
        self.runs_when_disabled = true;
        self
    }
}

impl Command for Probe {
    fn initialize(&mut self, _ctx: &mut CommandContext) {
        self.ticks = 0;
        self.journal.record(format!("{}:init", self.label));
    }

    fn execute(&mut self, _ctx: &mut CommandContext) {
        self.ticks += 1;
        self.journal.record(format!("{}:exec", self.label));
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        self.finish_after.is_some_and(|limit| self.ticks >= limit)
    }

    fn end(&mut self, interrupted: bool, _ctx: &mut CommandContext) {
        let phase = if interrupted { "interrupted" } else { "end" };
        self.journal.record(format!("{}:{phase}", self.label));
    }

    fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.interruptible
    }

    fn runs_when_disabled(&self) -> bool {
        self.runs_when_disabled
    }

    fn name(&self) -> String {
        self.label.clone()
    }
}

/// Subsystem counting its `periodic` calls.
#[derive(Clone, Default)]
pub struct Mechanism {
    pub periodic_calls: Rc<Cell<u32>>,
}

impl Subsystem for Mechanism {
    fn periodic(&mut self) {
        self.periodic_calls.set(self.periodic_calls.get() + 1);
    }
}

pub fn lines(expected: &[&str]) -> Vec<String> {
    expected.iter().map(|line| line.to_string()).collect()
}
