//! Polled conditions bound to scheduling actions.

use serde::{Deserialize, Serialize};

use crate::command::Request;
use crate::identity::CommandId;

/// A boolean condition sampled once per scheduler tick.
pub struct Trigger {
    condition: Box<dyn FnMut() -> bool>,
}

impl Trigger {
    pub fn new(condition: impl FnMut() -> bool + 'static) -> Self {
        Self {
            condition: Box::new(condition),
        }
    }

    pub fn get(&mut self) -> bool {
        (self.condition)()
    }

    /// Active while both conditions are. Both are sampled on every poll.
    pub fn and(mut self, mut other: Trigger) -> Trigger {
        Trigger::new(move || {
            let left = self.get();
            let right = other.get();
            left && right
        })
    }

    /// Active while either condition is. Both are sampled on every poll.
    pub fn or(mut self, mut other: Trigger) -> Trigger {
        Trigger::new(move || {
            let left = self.get();
            let right = other.get();
            left || right
        })
    }

    pub fn negate(mut self) -> Trigger {
        Trigger::new(move || !self.get())
    }
}

/// What a trigger does to its target command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    /// Schedule on the rising edge.
    WhenActive(CommandId),
    /// Schedule on every tick the trigger is active; cancel on the falling edge.
    WhileActiveContinuous(CommandId),
    /// Schedule on the rising edge; cancel on the falling edge.
    WhileActiveOnce(CommandId),
    /// Schedule on the falling edge.
    WhenInactive(CommandId),
    /// Rising edge schedules the target if idle, cancels it if running.
    ToggleWhenActive(CommandId),
    /// Cancel on the rising edge.
    CancelWhenActive(CommandId),
}

impl Binding {
    pub fn target(&self) -> CommandId {
        match *self {
            Binding::WhenActive(id)
            | Binding::WhileActiveContinuous(id)
            | Binding::WhileActiveOnce(id)
            | Binding::WhenInactive(id)
            | Binding::ToggleWhenActive(id)
            | Binding::CancelWhenActive(id) => id,
        }
    }
}

/// A registered trigger with its last sampled state.
pub(crate) struct TriggerBinding {
    trigger: Trigger,
    binding: Binding,
    last: bool,
}

impl TriggerBinding {
    /// Samples the trigger once so a condition already true at bind time
    /// does not count as a rising edge.
    pub(crate) fn new(mut trigger: Trigger, binding: Binding) -> Self {
        let last = trigger.get();
        Self {
            trigger,
            binding,
            last,
        }
    }

    pub(crate) fn target(&self) -> CommandId {
        self.binding.target()
    }

    pub(crate) fn poll(&mut self, is_scheduled: impl FnOnce(CommandId) -> bool) -> Option<Request> {
        let current = self.trigger.get();
        let rising = current && !self.last;
        let falling = !current && self.last;
        self.last = current;

        match self.binding {
            Binding::WhenActive(id) if rising => Some(Request::Schedule(id)),
            Binding::WhileActiveContinuous(id) if current => Some(Request::Schedule(id)),
            Binding::WhileActiveContinuous(id) if falling => Some(Request::Cancel(id)),
            Binding::WhileActiveOnce(id) if rising => Some(Request::Schedule(id)),
            Binding::WhileActiveOnce(id) if falling => Some(Request::Cancel(id)),
            Binding::WhenInactive(id) if falling => Some(Request::Schedule(id)),
            Binding::ToggleWhenActive(id) if rising => {
                if is_scheduled(id) {
                    Some(Request::Cancel(id))
                } else {
                    Some(Request::Schedule(id))
                }
            }
            Binding::CancelWhenActive(id) if rising => Some(Request::Cancel(id)),
            _ => None,
        }
    }
}
