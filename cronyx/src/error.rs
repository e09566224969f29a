//! Error types for the cronyx scheduler.
//!
//! `SchedulerError` classifies failures into the kinds the supervisor cares
//! about for propagation policy (see the crate root docs): configuration
//! errors are fatal during load, runtime/execution errors are captured on
//! the `Execution` and never abort the process, watcher errors trigger
//! fallback behavior, and so on.

use thiserror::Error;

/// Extension trait for converting arbitrary results into `SchedulerError`.
pub trait SchedulerResultExt<T> {
    fn scheduler_context<C>(self, context: C) -> Result<T, SchedulerError>
    where
        C: std::fmt::Display + Send + Sync + 'static;
}

impl<T, E> SchedulerResultExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn scheduler_context<C>(self, context: C) -> Result<T, SchedulerError>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| SchedulerError::RuntimeExecution {
            operation: context.to_string(),
            source: anyhow::Error::from(e),
        })
    }
}

/// Broad classification of a [`SchedulerError`], mirroring the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    RuntimePreparation,
    RuntimeExecution,
    Timeout,
    ResourceCleanup,
    Watcher,
    Scheduler,
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    /// INI parse error, unknown field, bad schedule, missing field, glob syntax.
    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Duplicate job name across kinds.
    #[error("job '{name}' is already registered")]
    DuplicateJob { name: String },

    /// Remove/lookup against an unknown job name.
    #[error("no job registered with name '{name}'")]
    UnknownJob { name: String },

    /// Image pull failure, container/network not found, exec-create failure.
    #[error("runtime preparation failed for job '{job}': {message}")]
    RuntimePreparation {
        job: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Non-zero exit, container removed mid-run, wait/stream I/O error.
    #[error("job '{job}' execution failed: {message}")]
    RuntimeExecution {
        job: String,
        #[allow(dead_code)]
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// Job exceeded its configured `max-runtime`.
    #[error("job '{job}' exceeded its max runtime of {limit:?}")]
    Timeout {
        job: String,
        limit: std::time::Duration,
    },

    /// Post-run container/service removal failed. Never fatal.
    #[error("cleanup failed for job '{job}': {message}")]
    ResourceCleanup {
        job: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Event-subscription or container-list failure in the watcher.
    #[error("watcher error: {message}")]
    Watcher {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Internal scheduler bookkeeping failure.
    #[error("scheduler error: {message}")]
    Scheduler {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Configuration { .. } => ErrorKind::Configuration,
            SchedulerError::DuplicateJob { .. } | SchedulerError::UnknownJob { .. } => {
                ErrorKind::Scheduler
            }
            SchedulerError::RuntimePreparation { .. } => ErrorKind::RuntimePreparation,
            SchedulerError::RuntimeExecution { .. } => ErrorKind::RuntimeExecution,
            SchedulerError::Timeout { .. } => ErrorKind::Timeout,
            SchedulerError::ResourceCleanup { .. } => ErrorKind::ResourceCleanup,
            SchedulerError::Watcher { .. } => ErrorKind::Watcher,
            SchedulerError::Scheduler { .. } => ErrorKind::Scheduler,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout)
    }

    /// A short, stable classifier used as half of the notification dedup
    /// fingerprint (see `middleware::notify`).
    pub fn fingerprint_kind(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Configuration => "configuration",
            ErrorKind::RuntimePreparation => "runtime-preparation",
            ErrorKind::RuntimeExecution => "runtime-execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ResourceCleanup => "resource-cleanup",
            ErrorKind::Watcher => "watcher",
            ErrorKind::Scheduler => "scheduler",
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SchedulerError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_with_source(message: impl Into<String>, source: anyhow::Error) -> Self {
        SchedulerError::Configuration {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn duplicate_job(name: impl Into<String>) -> Self {
        SchedulerError::DuplicateJob { name: name.into() }
    }

    pub fn unknown_job(name: impl Into<String>) -> Self {
        SchedulerError::UnknownJob { name: name.into() }
    }

    pub fn runtime_preparation(
        job: impl Into<String>,
        message: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        SchedulerError::RuntimePreparation {
            job: job.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn runtime_execution(
        job: impl Into<String>,
        message: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        SchedulerError::RuntimeExecution {
            job: job.into(),
            message: message.into(),
            source,
        }
    }

    pub fn timeout(job: impl Into<String>, limit: std::time::Duration) -> Self {
        SchedulerError::Timeout {
            job: job.into(),
            limit,
        }
    }

    pub fn resource_cleanup(
        job: impl Into<String>,
        message: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        SchedulerError::ResourceCleanup {
            job: job.into(),
            message: message.into(),
            source,
        }
    }

    pub fn watcher(message: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        SchedulerError::Watcher {
            message: message.into(),
            source,
        }
    }

    pub fn scheduler(message: impl Into<String>) -> Self {
        SchedulerError::Scheduler {
            message: message.into(),
            source: None,
        }
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(error: anyhow::Error) -> Self {
        SchedulerError::RuntimeExecution {
            job: "unknown".to_string(),
            message: error.to_string(),
            source: error,
        }
    }
}
