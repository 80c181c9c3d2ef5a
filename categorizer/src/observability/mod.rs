//! Observability Module
//!
//! Caller owned progress reporting for categorization runs. The library never
//! holds progress state of its own; callers pass a reporter in.

mod progress;

pub use progress::{
    format_table, NoopProgress, ProgressPhase, ProgressReporter, ProgressTracker, ProgressUpdate,
};
