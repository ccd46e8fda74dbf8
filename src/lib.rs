//! Cadence: cooperative command scheduling for periodic robot control.
//!
//! The [kernel] holds the scheduling engine; the [runtime] (default feature
//! `runtime`) runs it at a fixed period with tokio, loads TOML configuration
//! and installs tracing.
//!
//! ```
//! use cadence::prelude::*;
//!
//! let mut scheduler = Scheduler::new();
//! let drive = scheduler.register_subsystem(Drivetrain);
//! let hold = scheduler.add_command(RunCommand::new(|| {}).with_requirements([drive]));
//! scheduler.schedule(hold);
//! scheduler.run();
//! assert_eq!(scheduler.requiring(drive), Some(hold));
//!
//! struct Drivetrain;
//! impl Subsystem for Drivetrain {}
//! ```

pub use cadence_kernel as kernel;
#[cfg(feature = "runtime")]
pub use cadence_runtime as runtime;

/// The types most control code needs.
pub mod prelude {
    pub use cadence_kernel::{
        Binding, Command, CommandContext, CommandExt, CommandId, InstantCommand, KernelError,
        Requirements, RunCommand, Scheduler, Subsystem, SubsystemId, Trigger, WaitCommand,
    };
    #[cfg(feature = "runtime")]
    pub use cadence_runtime::{PeriodicDriver, RuntimeConfig};
}
