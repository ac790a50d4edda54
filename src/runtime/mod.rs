pub mod job;
pub mod pool;
pub mod error_tracker;

pub use error_tracker::{DbErrorSink, ErrorSink};
pub use job::{cancel_pair, CancelSignal, Job, JobProgress, JobStatus};
pub use pool::{JobRuntime, TASK_LEVEL_TARGET};
