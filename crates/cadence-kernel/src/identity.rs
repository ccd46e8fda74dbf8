//! Identity types: subsystems (claimable resources) and registered commands.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_SUBSYSTEM_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of an exclusively claimable subsystem.
///
/// Ids are process-unique and ordered by allocation, so iterating a sorted
/// collection of them follows registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubsystemId(u64);

impl SubsystemId {
    /// Allocates a fresh identity.
    pub fn new() -> Self {
        Self(NEXT_SUBSYSTEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for SubsystemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsystem#{}", self.0)
    }
}

/// Handle to a command owned by a [crate::Scheduler].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(u64);

impl CommandId {
    pub(crate) fn next() -> Self {
        Self(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command#{}", self.0)
    }
}
