//! Command-line surface: `daemon` / `validate` / `doctor`, plus the global
//! flags mirroring `[global]` INI settings. Every flag has a matching
//! `CRONYX_*` environment variable via clap's `env` attribute, the same
//! style the teacher's own example binaries use for their flags.

use clap::{Parser, Subcommand};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE_OR_CONFIG: i32 = 1;
pub const EXIT_RUNTIME_INIT: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "cronyx", version, about = "Container-aware cron scheduler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path (or glob) to the INI configuration.
    #[arg(long, env = "CRONYX_CONFIG", global = true, default_value = "/etc/cronyx/*.ini")]
    pub config: String,

    /// Overrides the INI `log-level` global setting.
    #[arg(long, env = "CRONYX_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Overrides the INI `allow-host-jobs-from-labels` global setting.
    #[arg(long, env = "CRONYX_ALLOW_HOST_JOBS_FROM_LABELS", global = true)]
    pub allow_host_jobs_from_labels: bool,

    /// Label namespace used for Docker-label job discovery.
    #[arg(long, env = "CRONYX_LABEL_PREFIX", global = true, default_value = "schedule")]
    pub label_prefix: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs the supervisor: loads config, starts the scheduler and watcher,
    /// and blocks until a termination signal arrives.
    Daemon,
    /// Parses and validates the configuration, then exits.
    Validate,
    /// Runs structural health checks (config loadable, runtime reachable)
    /// and reports the result.
    Doctor {
        /// Emit the report as JSON instead of a human-readable summary.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub fn config_overrides(&self) -> crate::config::ConfigOverrides {
        crate::config::ConfigOverrides {
            log_level: self.log_level.clone(),
            allow_host_jobs_from_labels: self
                .allow_host_jobs_from_labels
                .then_some(true),
        }
    }

    /// Resolves the effective log level: the `--log-level`/`CRONYX_LOG_LEVEL`
    /// flag if set, otherwise the INI `log-level` global setting.
    pub fn resolve_log_level(&self, config: &crate::config::Config) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.global.log_level.clone())
    }
}
