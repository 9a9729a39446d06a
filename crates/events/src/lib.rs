//! Job lifecycle events and progress plumbing.
//!
//! - [`bus`]: in-process broadcast of [`JobEvent`]s.
//! - [`progress`]: per-job channel the progress monitor writes into.
//! - [`log`]: background subscriber that writes every event to the log.

pub mod bus;
pub mod log;
pub mod progress;

pub use bus::{EventBus, JobEvent};
pub use log::EventLog;
pub use progress::{progress_channel, ProgressReporter};
