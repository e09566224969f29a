//! Configuration model shared by the INI loader, the label scanner, and the
//! reconciler. Neither loader builds a `job::Job` directly — both produce
//! the kind-agnostic [`JobDefinition`] below, which the reconciler turns
//! into a live `Job` once global settings and the middleware chain are
//! known.

pub mod glob;
pub mod ini;
pub mod labels;
pub mod reconciler;

use crate::job::{PullPolicy, Source};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Exec,
    Run,
    Service,
    Local,
    Compose,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Exec => "exec",
            JobKind::Run => "run",
            JobKind::Service => "service",
            JobKind::Local => "local",
            JobKind::Compose => "compose",
        }
    }

    pub fn is_host_impacting(&self) -> bool {
        matches!(self, JobKind::Local | JobKind::Compose)
    }
}

#[derive(Debug, Clone)]
pub enum JobSpecConfig {
    Exec {
        container: String,
        command: Vec<String>,
    },
    Run {
        image: String,
        command: Vec<String>,
        container: Option<String>,
        network: Vec<String>,
        volumes: Vec<String>,
        env: Vec<String>,
        working_dir: Option<String>,
        entrypoint: Option<Vec<String>>,
        delete: bool,
        pull: PullPolicy,
        max_runtime: Option<Duration>,
    },
    Service {
        image: String,
        command: Vec<String>,
        env: Vec<String>,
        max_runtime: Option<Duration>,
    },
    Local {
        command: Vec<String>,
        dir: Option<String>,
        env: Vec<String>,
    },
    Compose {
        file: String,
        service: Option<String>,
        command: Vec<String>,
    },
}

/// Notification-middleware fields attached to a job. Zero-valued fields are
/// filled in from the global `NotifyConfig` before the chain is built;
/// `*_only_on_error` flags are never inherited (unset is indistinguishable
/// from explicit `false`, so inheriting them would silently flip user intent).
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub save_folder: Option<String>,
    pub save_only_on_error: bool,
    pub slack_webhook: Option<String>,
    pub slack_only_on_error: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls_skip_verify: bool,
    pub email_to: Vec<String>,
    pub email_from: Option<String>,
    pub mail_only_on_error: bool,
}

impl NotifyConfig {
    /// A stable fingerprint over every field. Used both to detect changes to
    /// the global notify defaults and to fold a job's own resolved notify
    /// settings into its content hash.
    pub fn fingerprint(&self) -> String {
        format!(
            "{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.save_folder,
            self.save_only_on_error,
            self.slack_webhook,
            self.slack_only_on_error,
            self.smtp_host,
            self.smtp_port,
            self.smtp_user,
            self.smtp_password,
            self.smtp_tls_skip_verify,
            self.email_to,
            self.email_from,
            self.mail_only_on_error,
        )
    }

    /// Fills zero-valued fields from `global`. Called once per job before
    /// the reconciler builds its middleware chain.
    pub fn inherit_from(&self, global: &NotifyConfig) -> NotifyConfig {
        NotifyConfig {
            save_folder: self.save_folder.clone().or_else(|| global.save_folder.clone()),
            save_only_on_error: self.save_only_on_error,
            slack_webhook: self.slack_webhook.clone().or_else(|| global.slack_webhook.clone()),
            slack_only_on_error: self.slack_only_on_error,
            smtp_host: self.smtp_host.clone().or_else(|| global.smtp_host.clone()),
            smtp_port: self.smtp_port.or(global.smtp_port),
            smtp_user: self.smtp_user.clone().or_else(|| global.smtp_user.clone()),
            smtp_password: self.smtp_password.clone().or_else(|| global.smtp_password.clone()),
            smtp_tls_skip_verify: self.smtp_tls_skip_verify || global.smtp_tls_skip_verify,
            email_to: if self.email_to.is_empty() { global.email_to.clone() } else { self.email_to.clone() },
            email_from: self.email_from.clone().or_else(|| global.email_from.clone()),
            mail_only_on_error: self.mail_only_on_error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: String,
    pub kind: JobKind,
    pub schedule: String,
    pub user: Option<String>,
    pub no_overlap: bool,
    pub spec: JobSpecConfig,
    pub notify: NotifyConfig,
    pub source: Source,
}

/// Global settings, one per supervisor. `[global]` INI section.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub log_level: String,
    pub enable_web: bool,
    pub web_address: String,
    pub enable_pprof: bool,
    pub pprof_address: String,
    pub max_runtime: Option<Duration>,
    pub allow_host_jobs_from_labels: bool,
    pub enable_strict_validation: bool,
    pub default_user: Option<String>,
    pub notification_cooldown: Duration,
    pub notify: NotifyConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_web: false,
            web_address: "127.0.0.1:9292".to_string(),
            enable_pprof: false,
            pprof_address: "127.0.0.1:6060".to_string(),
            max_runtime: None,
            allow_host_jobs_from_labels: false,
            enable_strict_validation: false,
            default_user: None,
            notification_cooldown: Duration::from_secs(600),
            notify: NotifyConfig::default(),
        }
    }
}

/// `[<runtime-name>]` section: container-runtime client tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub filters: Vec<String>,
    pub config_poll_interval: Duration,
    pub docker_poll_interval: Duration,
    pub events: bool,
    pub polling_fallback: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            config_poll_interval: Duration::from_secs(15),
            docker_poll_interval: Duration::from_secs(15),
            events: true,
            polling_fallback: Duration::from_secs(30),
        }
    }
}

/// The top-level, fully-loaded configuration: defaults overridden field by
/// field by the parsed INI tree (label-sourced jobs are merged in
/// separately by the reconciler, not here).
#[derive(Debug, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    pub runtime: RuntimeConfig,
    pub jobs: Vec<JobDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            runtime: RuntimeConfig::default(),
            jobs: Vec::new(),
        }
    }
}

impl Config {
    /// Applies CLI-flag-shaped overrides on top of the loaded INI tree.
    /// The CLI parser itself lives in `cli`; this is the seam it calls
    /// into, kept separate so `Config` has no `clap` dependency.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.global.log_level = log_level;
        }
        if let Some(allow) = overrides.allow_host_jobs_from_labels {
            self.global.allow_host_jobs_from_labels = allow;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub allow_host_jobs_from_labels: Option<bool>,
}
