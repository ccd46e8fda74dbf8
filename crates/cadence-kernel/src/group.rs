//! Composition nodes: sequential, parallel, race and deadline groups.
//!
//! A group takes its children by value. Once a command is inside a group it
//! cannot be scheduled, registered or grouped anywhere else, so "already
//! grouped" misuse is ruled out by ownership instead of a runtime flag.
//!
//! Each group claims the union of its children's requirements for its whole
//! run, is interruptible only if every child is, and runs while disabled only
//! if every child does.

use serde::{Deserialize, Serialize};

use crate::claims::Requirements;
use crate::command::{Command, CommandContext};
use crate::error::KernelError;

/// Progress of one child inside a group run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberState {
    /// Not started in this run, or already interrupted.
    #[default]
    Idle,
    Running,
    /// Ended normally.
    Finished,
}

struct Member {
    command: Box<dyn Command>,
    state: MemberState,
}

impl Member {
    fn new(command: Box<dyn Command>) -> Self {
        Self {
            command,
            state: MemberState::Idle,
        }
    }

    fn start(&mut self, ctx: &mut CommandContext) {
        self.command.initialize(ctx);
        self.state = MemberState::Running;
    }

    /// Executes a running member and ends it normally once it reports
    /// finished. Returns true when it finished during this call.
    fn advance(&mut self, ctx: &mut CommandContext) -> bool {
        if self.state != MemberState::Running {
            return false;
        }
        self.command.execute(ctx);
        if self.command.is_finished(ctx) {
            self.command.end(false, ctx);
            self.state = MemberState::Finished;
            return true;
        }
        false
    }

    fn interrupt(&mut self, ctx: &mut CommandContext) {
        if self.state == MemberState::Running {
            self.command.end(true, ctx);
            self.state = MemberState::Idle;
        }
    }
}

/// Properties every group derives from its children.
#[derive(Clone, Debug, Default)]
struct Traits {
    requirements: Requirements,
    interruptible: bool,
    runs_when_disabled: bool,
}

impl Traits {
    fn union<'a>(commands: impl IntoIterator<Item = &'a Box<dyn Command>>) -> Self {
        let mut traits = Traits {
            requirements: Requirements::new(),
            interruptible: true,
            runs_when_disabled: true,
        };
        for command in commands {
            traits.requirements.extend_from(command.requirements());
            traits.interruptible &= command.is_interruptible();
            traits.runs_when_disabled &= command.runs_when_disabled();
        }
        traits
    }

    /// Like [Traits::union] but rejects children that share a subsystem.
    fn disjoint_union(
        group: &'static str,
        commands: &[Box<dyn Command>],
    ) -> Result<Self, KernelError> {
        let mut seen = Requirements::new();
        for command in commands {
            if let Some(subsystem) = seen.first_overlap(command.requirements()) {
                return Err(KernelError::OverlappingRequirements { group, subsystem });
            }
            seen.extend_from(command.requirements());
        }
        Ok(Self::union(commands))
    }
}

/// Runs children one after another.
pub struct Sequential {
    commands: Vec<Box<dyn Command>>,
    current: Option<usize>,
    traits: Traits,
}

impl Sequential {
    /// Children may share requirements since only one runs at a time.
    pub fn new(commands: Vec<Box<dyn Command>>) -> Self {
        let traits = Traits::union(&commands);
        Self {
            commands,
            current: None,
            traits,
        }
    }

    /// Index of the active child, `None` when the group is not running.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }
}

impl Command for Sequential {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.current = Some(0);
        if let Some(first) = self.commands.first_mut() {
            first.initialize(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        let Some(index) = self.current else {
            return;
        };
        let Some(active) = self.commands.get_mut(index) else {
            return;
        };
        active.execute(ctx);
        if !active.is_finished(ctx) {
            return;
        }
        active.end(false, ctx);
        let next = index + 1;
        self.current = Some(next);
        if let Some(following) = self.commands.get_mut(next) {
            following.initialize(ctx);
        }
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        self.current == Some(self.commands.len())
    }

    fn end(&mut self, interrupted: bool, ctx: &mut CommandContext) {
        if interrupted {
            if let Some(active) = self.current.and_then(|index| self.commands.get_mut(index)) {
                active.end(true, ctx);
            }
        }
        self.current = None;
    }

    fn requirements(&self) -> &Requirements {
        &self.traits.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.traits.interruptible
    }

    fn runs_when_disabled(&self) -> bool {
        self.traits.runs_when_disabled
    }
}

/// Runs children together until all of them have finished.
pub struct Parallel {
    members: Vec<Member>,
    traits: Traits,
}

impl Parallel {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Result<Self, KernelError> {
        let traits = Traits::disjoint_union("parallel", &commands)?;
        Ok(Self {
            members: commands.into_iter().map(Member::new).collect(),
            traits,
        })
    }

    pub fn member_states(&self) -> Vec<MemberState> {
        self.members.iter().map(|member| member.state).collect()
    }
}

impl Command for Parallel {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.start(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.advance(ctx);
        }
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        !self
            .members
            .iter()
            .any(|member| member.state == MemberState::Running)
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.interrupt(ctx);
        }
    }

    fn requirements(&self) -> &Requirements {
        &self.traits.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.traits.interruptible
    }

    fn runs_when_disabled(&self) -> bool {
        self.traits.runs_when_disabled
    }
}

/// Runs children together until the first one finishes.
pub struct Race {
    members: Vec<Member>,
    finished: bool,
    traits: Traits,
}

impl Race {
    pub fn new(commands: Vec<Box<dyn Command>>) -> Result<Self, KernelError> {
        if commands.is_empty() {
            return Err(KernelError::EmptyGroup("race"));
        }
        let traits = Traits::disjoint_union("race", &commands)?;
        Ok(Self {
            members: commands.into_iter().map(Member::new).collect(),
            finished: false,
            traits,
        })
    }

    pub fn member_states(&self) -> Vec<MemberState> {
        self.members.iter().map(|member| member.state).collect()
    }
}

impl Command for Race {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        self.finished = false;
        for member in &mut self.members {
            member.start(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        for member in &mut self.members {
            if member.advance(ctx) {
                self.finished = true;
            }
        }
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        self.finished
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.interrupt(ctx);
        }
    }

    fn requirements(&self) -> &Requirements {
        &self.traits.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.traits.interruptible
    }

    fn runs_when_disabled(&self) -> bool {
        self.traits.runs_when_disabled
    }
}

/// Runs a dictator with satellites; the group ends when the dictator does.
pub struct Deadline {
    // members[0] is the dictator.
    members: Vec<Member>,
    traits: Traits,
}

impl Deadline {
    pub fn new(
        dictator: Box<dyn Command>,
        satellites: Vec<Box<dyn Command>>,
    ) -> Result<Self, KernelError> {
        let mut commands = Vec::with_capacity(satellites.len() + 1);
        commands.push(dictator);
        commands.extend(satellites);
        let traits = Traits::disjoint_union("deadline", &commands)?;
        Ok(Self {
            members: commands.into_iter().map(Member::new).collect(),
            traits,
        })
    }

    pub fn dictator_state(&self) -> MemberState {
        self.members[0].state
    }

    pub fn satellite_states(&self) -> Vec<MemberState> {
        self.members[1..].iter().map(|member| member.state).collect()
    }
}

impl Command for Deadline {
    fn initialize(&mut self, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.start(ctx);
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.advance(ctx);
        }
    }

    fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
        self.members[0].state == MemberState::Finished
    }

    fn end(&mut self, _interrupted: bool, ctx: &mut CommandContext) {
        for member in &mut self.members {
            member.interrupt(ctx);
        }
    }

    fn requirements(&self) -> &Requirements {
        &self.traits.requirements
    }

    fn is_interruptible(&self) -> bool {
        self.traits.interruptible
    }

    fn runs_when_disabled(&self) -> bool {
        self.traits.runs_when_disabled
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::identity::SubsystemId;

    struct Fixed {
        requirements: Requirements,
        finish_after: Option<u32>,
        ticks: u32,
    }

    impl Fixed {
        fn boxed(requirements: &[SubsystemId], finish_after: Option<u32>) -> Box<dyn Command> {
            Box::new(Fixed {
                requirements: requirements.iter().copied().collect(),
                finish_after,
                ticks: 0,
            })
        }
    }

    impl Command for Fixed {
        fn execute(&mut self, _ctx: &mut CommandContext) {
            self.ticks += 1;
        }

        fn is_finished(&mut self, _ctx: &mut CommandContext) -> bool {
            self.finish_after.is_some_and(|limit| self.ticks >= limit)
        }

        fn requirements(&self) -> &Requirements {
            &self.requirements
        }
    }

    fn ctx() -> CommandContext {
        CommandContext::new(Duration::ZERO, true)
    }

    #[test]
    fn parallel_rejects_shared_requirements() {
        let arm = SubsystemId::new();
        let err = Parallel::new(vec![Fixed::boxed(&[arm], None), Fixed::boxed(&[arm], None)])
            .err()
            .expect("overlap must be rejected");
        assert_eq!(
            err,
            KernelError::OverlappingRequirements {
                group: "parallel",
                subsystem: arm
            }
        );
    }

    #[test]
    fn sequential_allows_shared_requirements_and_unions_them() {
        let (arm, wrist) = (SubsystemId::new(), SubsystemId::new());
        let group = Sequential::new(vec![
            Fixed::boxed(&[arm], Some(1)),
            Fixed::boxed(&[arm, wrist], Some(1)),
        ]);
        assert_eq!(group.requirements().len(), 2);
        assert!(group.requirements().contains(wrist));
    }

    #[test]
    fn empty_race_is_rejected() {
        assert_eq!(Race::new(Vec::new()).err(), Some(KernelError::EmptyGroup("race")));
    }

    #[test]
    fn empty_sequence_finishes_on_initialize() {
        let mut group = Sequential::new(Vec::new());
        let mut ctx = ctx();
        group.initialize(&mut ctx);
        assert!(group.is_finished(&mut ctx));
    }

    #[test]
    fn sequence_advances_in_the_tick_a_child_finishes() {
        let mut group = Sequential::new(vec![
            Fixed::boxed(&[], Some(1)),
            Fixed::boxed(&[], Some(2)),
        ]);
        let mut ctx = ctx();
        group.initialize(&mut ctx);
        assert_eq!(group.current_index(), Some(0));
        group.execute(&mut ctx);
        assert_eq!(group.current_index(), Some(1));
        assert!(!group.is_finished(&mut ctx));
        group.execute(&mut ctx);
        group.execute(&mut ctx);
        assert!(group.is_finished(&mut ctx));
        group.end(false, &mut ctx);
        assert_eq!(group.current_index(), None);
    }

    #[test]
    fn parallel_tracks_member_progress() {
        let mut group =
            Parallel::new(vec![Fixed::boxed(&[], Some(1)), Fixed::boxed(&[], Some(3))]).unwrap();
        let mut ctx = ctx();
        group.initialize(&mut ctx);
        group.execute(&mut ctx);
        assert_eq!(
            group.member_states(),
            vec![MemberState::Finished, MemberState::Running]
        );
        assert!(!group.is_finished(&mut ctx));
        group.execute(&mut ctx);
        group.execute(&mut ctx);
        assert!(group.is_finished(&mut ctx));
    }

    #[test]
    fn deadline_interrupts_satellites_when_dictator_finishes() {
        let mut group =
            Deadline::new(Fixed::boxed(&[], Some(2)), vec![Fixed::boxed(&[], None)]).unwrap();
        let mut ctx = ctx();
        group.initialize(&mut ctx);
        group.execute(&mut ctx);
        assert!(!group.is_finished(&mut ctx));
        group.execute(&mut ctx);
        assert!(group.is_finished(&mut ctx));
        group.end(false, &mut ctx);
        assert_eq!(group.dictator_state(), MemberState::Finished);
        assert_eq!(group.satellite_states(), vec![MemberState::Idle]);
    }

    #[test]
    fn group_flags_are_conjunctions() {
        struct Stubborn;
        impl Command for Stubborn {
            fn is_interruptible(&self) -> bool {
                false
            }
            fn runs_when_disabled(&self) -> bool {
                true
            }
        }
        let group = Race::new(vec![Box::new(Stubborn) as Box<dyn Command>, Fixed::boxed(&[], None)]).unwrap();
        assert!(!group.is_interruptible());
        assert!(!group.runs_when_disabled());
    }
}
