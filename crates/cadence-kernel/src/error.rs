//! Kernel errors.
//!
//! Every variant is a configuration error raised while building a composition
//! or registering with the scheduler. Runtime scheduling rejections (a claim
//! held by a non-interruptible command, cancelling something that is not
//! running) are not errors and never show up here.

use crate::identity::{CommandId, SubsystemId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("{group} group children both require {subsystem}")]
    OverlappingRequirements {
        group: &'static str,
        subsystem: SubsystemId,
    },
    #[error("{0} group needs at least one command")]
    EmptyGroup(&'static str),
    #[error("wrapper requirement {0} is already required by the wrapped command")]
    WrapperRequirementConflict(SubsystemId),
    #[error("unknown subsystem: {0}")]
    UnknownSubsystem(SubsystemId),
    #[error("unknown command: {0}")]
    UnknownCommand(CommandId),
    #[error("invalid default command for {subsystem}: {reason}")]
    InvalidDefaultCommand {
        subsystem: SubsystemId,
        reason: String,
    },
    #[error("command {0} is currently scheduled")]
    CommandScheduled(CommandId),
    #[error("command {command} is the default command of {subsystem}")]
    DefaultCommandInUse {
        command: CommandId,
        subsystem: SubsystemId,
    },
}
