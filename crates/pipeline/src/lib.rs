#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Concurrent fetch/verify pipeline for ferry
//!
//! ```text
//! index walk ──> TaskQueue (bounded) ──> WorkerPool (N) ──┬─> success consumer ──> checkpoint
//!                                                          └─> failure consumer ──> events / report
//! ```
//!
//! The [`Orchestrator`] owns every component for the lifetime of one run.
//! Nothing here is global: a second orchestrator over a different state
//! directory is fully independent.

mod consumer;
mod orchestrator;
mod queue;
mod report;
mod runners;
mod task;
mod worker;

pub use consumer::{FailureConsumer, SuccessConsumer};
pub use orchestrator::{Operation, Orchestrator, PipelineConfig};
pub use queue::{task_queue, Enqueued, QueueReceiver, QueueSender, QueueTracker, QueuedTask};
pub use report::RunReport;
pub use runners::{ExpectedChecksums, FetchRunner, VerifyRunner};
pub use task::{Failure, FailureReason, Success, Task, TaskKind};
pub use worker::{OutcomeSenders, TaskRunner, WorkerPool};
