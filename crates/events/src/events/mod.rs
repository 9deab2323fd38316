use serde::{Deserialize, Serialize};

use ferry_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(Into::into),
            retryable: error.is_retryable(),
        }
    }
}

pub mod general;
pub mod index;
pub mod run;
pub mod task;

pub use general::*;
pub use index::*;
pub use run::*;
pub use task::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug output)
    General(GeneralEvent),

    /// Registry index walk events (skipped shards and records)
    Index(IndexEvent),

    /// Per-unit-of-work outcomes
    Task(TaskEvent),

    /// Run lifecycle (start, interruption, summary)
    Run(RunEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Task(TaskEvent::Failed { .. })
            | Self::Run(RunEvent::Aborted { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Index(IndexEvent::ShardSkipped { .. } | IndexEvent::RecordSkipped { .. })
            | Self::Run(RunEvent::Interrupted) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Task(TaskEvent::Succeeded { .. } | TaskEvent::Fetched { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "ferry::events::general",
            Self::Index(_) => "ferry::events::index",
            Self::Task(_) => "ferry::events::task",
            Self::Run(_) => "ferry::events::run",
        }
    }
}
