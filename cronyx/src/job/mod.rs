//! The polymorphic job model: common fields shared by every kind, plus one
//! state machine module per kind (`exec`, `run`, `service`, `local`,
//! `compose`).

mod compose;
mod exec;
mod hash;
mod local;
mod run;
mod service;

pub use hash::content_hash;

use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::middleware::Middleware;
use crate::runtime::ContainerRuntime;
use cronyx_cron::ValidatedSchedule;
use std::sync::Arc;
use std::time::Duration;

/// Where a job definition came from. INI always wins over Label for a
/// same-named job (enforced by the reconciler, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Ini,
    Label,
}

/// Three-valued user setting: unset defers to the supervisor-wide default,
/// `"default"` explicitly requests the runtime's own default user, and any
/// other string is used literally. An empty string under lenient INI
/// decoding is otherwise indistinguishable from "not set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserSetting {
    Inherit,
    RuntimeDefault,
    Literal(String),
}

impl UserSetting {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => UserSetting::Inherit,
            Some("default") => UserSetting::RuntimeDefault,
            Some(other) => UserSetting::Literal(other.to_string()),
        }
    }

    pub fn resolve(&self, global_default: Option<&str>) -> Option<String> {
        match self {
            UserSetting::Inherit => global_default.map(|s| s.to_string()),
            UserSetting::RuntimeDefault => None,
            UserSetting::Literal(user) => Some(user.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullPolicy {
    IfMissing,
    Always,
}

#[derive(Debug, Clone)]
pub struct ExecJob {
    pub container: String,
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RunJob {
    pub image: String,
    pub command: Vec<String>,
    pub container: Option<String>,
    pub network: Vec<String>,
    pub volumes: Vec<String>,
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub delete: bool,
    pub pull: PullPolicy,
    pub max_runtime: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServiceJob {
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub max_runtime: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct LocalJob {
    pub command: Vec<String>,
    pub dir: Option<String>,
    pub env: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComposeJob {
    pub file: String,
    pub service: Option<String>,
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum JobSpec {
    Exec(ExecJob),
    Run(RunJob),
    Service(ServiceJob),
    Local(LocalJob),
    Compose(ComposeJob),
}

impl JobSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            JobSpec::Exec(_) => "exec",
            JobSpec::Run(_) => "run",
            JobSpec::Service(_) => "service",
            JobSpec::Local(_) => "local",
            JobSpec::Compose(_) => "compose",
        }
    }

    /// Local and Compose are host-impacting: by default only accepted from
    /// INI, never from container labels (see `config::labels`).
    pub fn is_host_impacting(&self) -> bool {
        matches!(self, JobSpec::Local(_) | JobSpec::Compose(_))
    }
}

/// A schedulable unit of work. Carries everything the scheduler needs to
/// fire it plus the runtime handle its body executes against.
pub struct Job {
    pub name: String,
    pub schedule: ValidatedSchedule,
    pub user: UserSetting,
    pub source: Source,
    pub no_overlap: bool,
    pub spec: JobSpec,
    /// Fingerprint of this job's resolved (post-inheritance) notify
    /// settings, folded into `content_hash` so a change to a job's own
    /// `slack-webhook=`/`save-folder=`/etc. lines is not mistaken for a
    /// no-op by the reconciler. Built once by `Reconciler::build_job`.
    pub notify_fingerprint: String,
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
}

impl Job {
    pub fn content_hash(&self) -> String {
        content_hash(self)
    }

    pub async fn execute(&self, execution: &mut Execution) -> Result<(), SchedulerError> {
        let user = self.user.resolve(None);
        match &self.spec {
            JobSpec::Exec(spec) => {
                exec::run(self, spec, user.as_deref(), execution).await
            }
            JobSpec::Run(spec) => run::run(self, spec, user.as_deref(), execution).await,
            JobSpec::Service(spec) => service::run(self, spec, execution).await,
            JobSpec::Local(spec) => local::run(self, spec, execution).await,
            JobSpec::Compose(spec) => compose::run(self, spec, execution).await,
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("schedule", &self.schedule.source())
            .field("kind", &self.spec.kind_name())
            .field("source", &self.source)
            .finish()
    }
}
