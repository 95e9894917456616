//! cadence-scheduler — task triggering and cross-process dedup.
//!
//! Three pieces:
//!
//! - [`TaskRegistry`] — explicit task-type → handler table, built at
//!   startup and injected (no global state).
//! - [`TaskController`] — binds the store's lease primitives to this
//!   process identity and refreshes its keepalive record.
//! - [`Scheduler`] — on-init and interval triggering per task type,
//!   stopped by a single watch signal.

pub mod controller;
pub mod error;
pub mod registry;
pub mod scheduler;

pub use controller::TaskController;
pub use error::{SchedulerError, SchedulerResult};
pub use registry::{HandlerFuture, TaskHandler, TaskRegistry};
pub use scheduler::{Scheduler, SchedulerConfig, TaskSchedule};
