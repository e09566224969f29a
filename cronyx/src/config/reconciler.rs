//! Diffs the desired job set (INI ∪ labels, INI winning conflicts) against
//! the scheduler's live set and applies the difference via content-hash
//! comparison: unchanged hash is a no-op, changed or new is a
//! remove-then-add, and jobs absent from the desired set are removed.

use super::{labels, Config, GlobalConfig, JobDefinition, JobKind, JobSpecConfig, NotifyConfig};
use crate::error::SchedulerError;
use crate::job::{Job, JobSpec, UserSetting};
use crate::middleware::{MailNotifier, Middleware, NotificationDedup, OverlapGuard, SaveMiddleware, SlackNotifier};
use crate::middleware::notify::mail::MailConfig;
use crate::runtime::ContainerRuntime;
use crate::scheduler::Scheduler;
use cronyx_cron::ValidatedSchedule;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    label_prefix: String,
    overlap_guard: Arc<OverlapGuard>,
    dedup: Arc<NotificationDedup>,
    last_hashes: Mutex<HashMap<String, String>>,
    last_global_fingerprint: Mutex<Option<String>>,
}

impl Reconciler {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, label_prefix: impl Into<String>, notification_cooldown: std::time::Duration) -> Self {
        Self {
            runtime,
            label_prefix: label_prefix.into(),
            overlap_guard: Arc::new(OverlapGuard::new()),
            dedup: Arc::new(NotificationDedup::new(notification_cooldown)),
            last_hashes: Mutex::new(HashMap::new()),
            last_global_fingerprint: Mutex::new(None),
        }
    }

    /// Merges INI- and label-sourced definitions: INI always wins a
    /// `(kind, name)` collision, logging one warning per conflicting job.
    pub fn merge(&self, ini_jobs: Vec<JobDefinition>, label_jobs: Vec<JobDefinition>) -> Vec<JobDefinition> {
        let ini_keys: HashSet<(JobKind, String)> =
            ini_jobs.iter().map(|j| (j.kind, j.name.clone())).collect();

        let mut merged = ini_jobs;
        for label_job in label_jobs {
            let key = (label_job.kind, label_job.name.clone());
            if ini_keys.contains(&key) {
                warn!(job = %label_job.name, kind = label_job.kind.as_str(), "ini definition takes precedence over a same-named label definition");
                continue;
            }
            merged.push(label_job);
        }
        merged
    }

    /// Runs one reconciliation cycle: reads containers via the runtime,
    /// discovers label jobs, merges with `config.jobs`, diffs by content
    /// hash against the last cycle, and applies the difference to
    /// `scheduler`.
    pub async fn reconcile(&self, scheduler: &Scheduler, config: &Config) -> Result<(), SchedulerError> {
        let containers = self
            .runtime
            .list_containers()
            .await
            .map_err(|e| SchedulerError::watcher("failed to list containers for label discovery", Some(e)))?;

        let discovered = labels::discover(&containers, &self.label_prefix, config.global.allow_host_jobs_from_labels);
        if discovered.host_jobs_rejected {
            warn!(
                "one or more label-defined Local/Compose jobs were rejected; set allow-host-jobs-from-labels to accept them \
                 (this is a privilege-escalation surface: any container able to set labels could otherwise schedule host commands)"
            );
        }

        let definitions = self.merge(config.jobs.clone(), discovered.jobs);

        let global_fingerprint = global_fingerprint(&config.global);
        let mut last_global = self.last_global_fingerprint.lock().await;
        let global_changed = last_global.as_deref() != Some(global_fingerprint.as_str());
        *last_global = Some(global_fingerprint);
        drop(last_global);

        let mut desired = HashMap::new();
        for def in &definitions {
            match self.build_job(def, &config.global) {
                Ok(job) => {
                    desired.insert(job.name.clone(), job);
                }
                Err(error) => {
                    warn!(job = %def.name, %error, "skipping invalid job definition");
                }
            }
        }

        let mut last_hashes = self.last_hashes.lock().await;
        if global_changed {
            last_hashes.clear();
        }

        for name in last_hashes.keys().cloned().collect::<Vec<_>>() {
            if !desired.contains_key(&name) {
                scheduler.remove_job(&name).await.ok();
                last_hashes.remove(&name);
            }
        }

        for (name, job) in desired {
            let hash = job.content_hash();
            let unchanged = last_hashes.get(&name) == Some(&hash);
            if unchanged {
                continue;
            }
            if last_hashes.contains_key(&name) {
                scheduler.remove_job(&name).await.ok();
            }
            if let Err(error) = scheduler.add_job(job).await {
                warn!(job = %name, %error, "failed to register job with scheduler");
                continue;
            }
            last_hashes.insert(name, hash);
        }

        Ok(())
    }

    pub fn build_job(&self, def: &JobDefinition, global: &GlobalConfig) -> Result<Job, SchedulerError> {
        let schedule = ValidatedSchedule::parse(&def.schedule)
            .map_err(|e| SchedulerError::configuration_with_source(format!("job '{}' has an invalid schedule", def.name), e.into()))?;

        let notify = def.notify.inherit_from(&global.notify);
        let mut middlewares: Vec<Arc<dyn Middleware>> = vec![self.overlap_guard.clone()];
        middlewares.extend(self.notify_middlewares(&notify, &def.name));

        let user = UserSetting::parse(def.user.as_deref().or(global.default_user.as_deref()));
        let notify_fingerprint = notify.fingerprint();

        Ok(Job {
            name: def.name.clone(),
            schedule,
            user,
            source: def.source,
            no_overlap: def.no_overlap,
            spec: convert_spec(&def.spec),
            notify_fingerprint,
            middlewares,
            runtime: self.runtime.clone(),
        })
    }

    fn notify_middlewares(&self, notify: &NotifyConfig, job_name: &str) -> Vec<Arc<dyn Middleware>> {
        let mut out: Vec<Arc<dyn Middleware>> = Vec::new();

        if let Some(folder) = &notify.save_folder {
            out.push(Arc::new(SaveMiddleware::new(folder.clone(), notify.save_only_on_error)));
        }

        if let Some(webhook) = &notify.slack_webhook {
            out.push(Arc::new(SlackNotifier::new(webhook.clone(), notify.slack_only_on_error, self.dedup.clone())));
        }

        if let (Some(host), Some(from)) = (&notify.smtp_host, &notify.email_from) {
            if notify.email_to.is_empty() {
                warn!(job = %job_name, "mail notification configured with no recipients, skipping");
            } else {
                let mail_config = MailConfig {
                    host: host.clone(),
                    port: notify.smtp_port.unwrap_or(587),
                    user: notify.smtp_user.clone(),
                    password: notify.smtp_password.clone(),
                    tls_skip_verify: notify.smtp_tls_skip_verify,
                    from: from.clone(),
                    to: notify.email_to.clone(),
                };
                match MailNotifier::new(mail_config, notify.mail_only_on_error, self.dedup.clone()) {
                    Ok(notifier) => out.push(Arc::new(notifier)),
                    Err(error) => warn!(job = %job_name, %error, "failed to build mail notifier, skipping"),
                }
            }
        }

        out
    }
}

/// A stable fingerprint over the global fields that affect job building
/// (notify defaults, default user). Changing any of these forces a full
/// chain rebuild for every job, per the reconciliation rule.
fn global_fingerprint(global: &GlobalConfig) -> String {
    format!("{:?}|{}", global.default_user, global.notify.fingerprint())
}

fn convert_spec(spec: &JobSpecConfig) -> JobSpec {
    use crate::job::{ComposeJob, ExecJob, LocalJob, RunJob, ServiceJob};
    match spec.clone() {
        JobSpecConfig::Exec { container, command } => JobSpec::Exec(ExecJob { container, command }),
        JobSpecConfig::Run {
            image,
            command,
            container,
            network,
            volumes,
            env,
            working_dir,
            entrypoint,
            delete,
            pull,
            max_runtime,
        } => JobSpec::Run(RunJob {
            image,
            command,
            container,
            network,
            volumes,
            env,
            working_dir,
            entrypoint,
            delete,
            pull,
            max_runtime,
        }),
        JobSpecConfig::Service { image, command, env, max_runtime } => {
            JobSpec::Service(ServiceJob { image, command, env, max_runtime })
        }
        JobSpecConfig::Local { command, dir, env } => JobSpec::Local(LocalJob { command, dir, env }),
        JobSpecConfig::Compose { file, service, command } => JobSpec::Compose(ComposeJob { file, service, command }),
    }
}
