//! Printing Module
//!
//! Printer-agnostic job tracking:
//! - Print job: per-document state machine with retry backoff
//! - Print queue: per-printer priority queue with a single active job

pub mod job;
pub mod queue;

pub use job::{PrintJob, PrintJobHandle};
pub use queue::{PrintQueue, PrintQueueHandle};
