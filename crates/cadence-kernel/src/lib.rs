//! Cadence kernel.
//!
//! Cooperative command scheduling for periodic control loops: subsystems are
//! exclusively claimable resources, commands are units of work with a fixed
//! lifecycle (initialize, execute, is_finished, end), and the [Scheduler]
//! advances every scheduled command once per tick while resolving claim
//! conflicts. Groups and decorators are commands that own and drive their
//! children through the same lifecycle.

pub mod claims;
pub mod clock;
pub mod command;
pub mod commands;
pub mod decorator;
pub mod error;
pub mod event;
pub mod execution_log;
pub mod group;
pub mod identity;
pub mod scheduler;
pub mod trigger;

pub use claims::{ClaimRegistry, Requirements};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use command::{Command, CommandContext, Request, Subsystem};
pub use commands::{
    ConditionalCommand, FunctionalCommand, InstantCommand, PrintCommand, RunCommand,
    ScheduleCommand, SelectCommand, StartEndCommand, WaitCommand, WaitUntilCommand,
};
pub use decorator::{CommandExt, Customized, Perpetual, Timeout, Until};
pub use error::KernelError;
pub use event::{CommandEvent, LifecycleEvent, TickReport};
pub use execution_log::{ExecutionLog, ExecutionRecorder};
pub use group::{Deadline, MemberState, Parallel, Race, Sequential};
pub use identity::{CommandId, SubsystemId};
pub use scheduler::Scheduler;
pub use trigger::{Binding, Trigger};
