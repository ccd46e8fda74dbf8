//! Requirement sets and the claim registry.
//!
//! A claim is the exclusive association between a scheduled command and one
//! subsystem. The registry only records who holds what; deciding whether a
//! holder may be interrupted is the scheduler's job.

use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Copied;

use serde::{Deserialize, Serialize};

use crate::identity::{CommandId, SubsystemId};

static NO_REQUIREMENTS: Requirements = Requirements::new();

/// Set of subsystems a command must hold exclusively while it runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirements(BTreeSet<SubsystemId>);

impl Requirements {
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Shared empty set, for commands that touch no subsystem.
    pub fn none() -> &'static Self {
        &NO_REQUIREMENTS
    }

    pub fn insert(&mut self, subsystem: SubsystemId) -> bool {
        self.0.insert(subsystem)
    }

    pub fn contains(&self, subsystem: SubsystemId) -> bool {
        self.0.contains(&subsystem)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Copied<btree_set::Iter<'_, SubsystemId>> {
        self.0.iter().copied()
    }

    pub fn extend_from(&mut self, other: &Requirements) {
        self.0.extend(other.iter());
    }

    /// Lowest subsystem present in both sets.
    pub fn first_overlap(&self, other: &Requirements) -> Option<SubsystemId> {
        self.0.intersection(&other.0).next().copied()
    }
}

impl FromIterator<SubsystemId> for Requirements {
    fn from_iter<I: IntoIterator<Item = SubsystemId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Requirements {
    type Item = SubsystemId;
    type IntoIter = Copied<btree_set::Iter<'a, SubsystemId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Which command currently holds each claimed subsystem.
#[derive(Clone, Debug, Default)]
pub struct ClaimRegistry {
    claims: BTreeMap<SubsystemId, CommandId>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claimant(&self, subsystem: SubsystemId) -> Option<CommandId> {
        self.claims.get(&subsystem).copied()
    }

    /// Distinct current holders of any subsystem in `requirements`, in
    /// subsystem order.
    pub fn conflicts(&self, requirements: &Requirements) -> Vec<CommandId> {
        let mut holders = Vec::new();
        for subsystem in requirements {
            if let Some(holder) = self.claimant(subsystem) {
                if !holders.contains(&holder) {
                    holders.push(holder);
                }
            }
        }
        holders
    }

    /// Records `command` as the holder of every subsystem in `requirements`.
    ///
    /// Callers must have released conflicting holders first; a subsystem is
    /// never silently taken from another command.
    pub fn claim(&mut self, command: CommandId, requirements: &Requirements) {
        for subsystem in requirements {
            let previous = self.claims.insert(subsystem, command);
            debug_assert!(
                previous.is_none() || previous == Some(command),
                "{subsystem} claimed by {command} while held by {previous:?}"
            );
        }
    }

    /// Releases the subsystems in `requirements` that `command` still holds.
    /// Returns how many were released.
    pub fn release(&mut self, command: CommandId, requirements: &Requirements) -> usize {
        let mut released = 0;
        for subsystem in requirements {
            if self.claims.get(&subsystem) == Some(&command) {
                self.claims.remove(&subsystem);
                released += 1;
            }
        }
        released
    }

    /// Drops whatever claim exists on `subsystem`, returning its former holder.
    pub fn release_subsystem(&mut self, subsystem: SubsystemId) -> Option<CommandId> {
        self.claims.remove(&subsystem)
    }
}
