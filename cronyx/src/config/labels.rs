//! Discovers job definitions from Docker container labels.
//!
//! Scheme: `<prefix>.enabled=true` gates a container; `<prefix>.service=true`
//! additionally allows it to contribute host-impacting kinds (Local,
//! Compose); `<prefix>.<kind>.<name>.<field>=<value>` defines one field of
//! one job. Grouped by `(kind, name)` the same way dockcron groups
//! `<prefix>.job-exec.<name>.<field>` labels per container.

use super::{JobDefinition, JobKind, JobSpecConfig, NotifyConfig};
use crate::job::{PullPolicy, Source};
use crate::runtime::ContainerSummary;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

pub struct Discovered {
    pub jobs: Vec<JobDefinition>,
    /// Set when at least one label-sourced Local/Compose job was rejected
    /// because `allow_host_jobs` was false — the caller logs one
    /// consolidated warning per reconciliation cycle instead of one per job.
    pub host_jobs_rejected: bool,
}

pub fn discover(containers: &[ContainerSummary], prefix: &str, allow_host_jobs: bool) -> Discovered {
    let field_re = Regex::new(&format!(
        r"^{}\.(exec|run|service|local|compose)\.([^.]+)\.(.+)$",
        regex::escape(prefix)
    ))
    .expect("valid regex");

    let mut jobs = Vec::new();
    let mut host_jobs_rejected = false;

    for container in containers {
        let enabled_key = format!("{prefix}.enabled");
        if container.labels.get(&enabled_key).map(String::as_str) != Some("true") {
            continue;
        }
        let service_allowed = container.labels.get(&format!("{prefix}.service")).map(String::as_str) == Some("true");

        let mut by_job: HashMap<(JobKind, String), HashMap<String, String>> = HashMap::new();
        for (key, value) in &container.labels {
            let Some(captures) = field_re.captures(key) else { continue };
            let kind = match &captures[1] {
                "exec" => JobKind::Exec,
                "run" => JobKind::Run,
                "service" => JobKind::Service,
                "local" => JobKind::Local,
                "compose" => JobKind::Compose,
                _ => continue,
            };
            let name = captures[2].to_string();
            let field = captures[3].to_string();
            by_job.entry((kind, name)).or_default().insert(field, value.clone());
        }

        for ((kind, raw_name), fields) in by_job {
            if kind.is_host_impacting() {
                if !service_allowed {
                    continue;
                }
                if !allow_host_jobs {
                    host_jobs_rejected = true;
                    continue;
                }
            }

            match build(&container.name, kind, &raw_name, &fields) {
                Some(job) => jobs.push(job),
                None => warn!(container = %container.name, kind = kind.as_str(), job = %raw_name, "label job missing required fields, skipping"),
            }
        }
    }

    Discovered { jobs, host_jobs_rejected }
}

fn build(container_name: &str, kind: JobKind, raw_name: &str, fields: &HashMap<String, String>) -> Option<JobDefinition> {
    let schedule = fields.get("schedule")?.clone();
    let user = fields.get("user").cloned();
    let no_overlap = get_bool(fields, "no-overlap").unwrap_or(false);

    // Exec and Run are scoped by the emitting container to disambiguate
    // the same job name published by multiple containers.
    let name = match kind {
        JobKind::Exec | JobKind::Run => format!("{container_name}.{raw_name}"),
        _ => raw_name.to_string(),
    };

    let spec = match kind {
        JobKind::Exec => JobSpecConfig::Exec {
            container: fields.get("container").cloned().unwrap_or_else(|| container_name.to_string()),
            command: get_command(fields, "command")?,
        },
        JobKind::Run => JobSpecConfig::Run {
            image: fields.get("image")?.clone(),
            command: get_command(fields, "command").unwrap_or_default(),
            container: fields.get("container").cloned(),
            network: get_list(fields, "network"),
            volumes: get_list(fields, "volume"),
            env: get_list(fields, "environment"),
            working_dir: fields.get("working-dir").cloned(),
            entrypoint: {
                let e = get_command(fields, "entrypoint");
                e.filter(|v| !v.is_empty())
            },
            delete: get_bool(fields, "delete").unwrap_or(false),
            pull: if get_bool(fields, "pull").unwrap_or(false) { PullPolicy::Always } else { PullPolicy::IfMissing },
            max_runtime: get_duration(fields, "max-runtime"),
        },
        JobKind::Service => JobSpecConfig::Service {
            image: fields.get("image")?.clone(),
            command: get_command(fields, "command").unwrap_or_default(),
            env: get_list(fields, "environment"),
            max_runtime: get_duration(fields, "max-runtime"),
        },
        JobKind::Local => JobSpecConfig::Local {
            command: get_command(fields, "command")?,
            dir: fields.get("working-dir").cloned(),
            env: get_list(fields, "environment"),
        },
        JobKind::Compose => JobSpecConfig::Compose {
            file: fields.get("file")?.clone(),
            service: fields.get("service").cloned(),
            command: get_command(fields, "command").unwrap_or_default(),
        },
    };

    Some(JobDefinition {
        name,
        kind,
        schedule,
        user,
        no_overlap,
        spec,
        notify: parse_notify(fields),
        source: Source::Label,
    })
}

fn parse_notify(fields: &HashMap<String, String>) -> NotifyConfig {
    NotifyConfig {
        save_folder: fields.get("save-folder").cloned(),
        save_only_on_error: get_bool(fields, "save-only-on-error").unwrap_or(false),
        slack_webhook: fields.get("slack-webhook").cloned(),
        slack_only_on_error: get_bool(fields, "slack-only-on-error").unwrap_or(false),
        smtp_host: fields.get("smtp-host").cloned(),
        smtp_port: fields.get("smtp-port").and_then(|v| v.parse().ok()),
        smtp_user: fields.get("smtp-user").cloned(),
        smtp_password: fields.get("smtp-password").cloned(),
        smtp_tls_skip_verify: get_bool(fields, "smtp-tls-skip-verify").unwrap_or(false),
        email_to: get_list(fields, "email-to"),
        email_from: fields.get("email-from").cloned(),
        mail_only_on_error: get_bool(fields, "mail-only-on-error").unwrap_or(false),
    }
}

fn get_bool(fields: &HashMap<String, String>, key: &str) -> Option<bool> {
    match fields.get(key)?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn get_duration(fields: &HashMap<String, String>, key: &str) -> Option<Duration> {
    humantime::parse_duration(fields.get(key)?.trim()).ok()
}

fn get_command(fields: &HashMap<String, String>, key: &str) -> Option<Vec<String>> {
    let raw = fields.get(key)?;
    Some(coerce_list(raw))
}

fn get_list(fields: &HashMap<String, String>, key: &str) -> Vec<String> {
    fields.get(key).map(|v| coerce_list(v)).unwrap_or_default()
}

/// A label value that parses as a JSON array of strings is treated as one;
/// otherwise it's a single string, further shell-split for command-shaped
/// fields (`shlex::split` is a no-op for already-whitespace-free values).
fn coerce_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values;
        }
    }
    shlex::split(trimmed).unwrap_or_else(|| vec![trimmed.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str, labels: &[(&str, &str)]) -> ContainerSummary {
        ContainerSummary {
            id: format!("{name}-id"),
            name: name.to_string(),
            running: true,
            labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn a_disabled_container_contributes_no_jobs() {
        let c = container("web", &[("cronyx.exec.ping.schedule", "@every 5s")]);
        let discovered = discover(&[c], "cronyx", false);
        assert!(discovered.jobs.is_empty());
    }

    #[test]
    fn exec_job_name_is_scoped_by_container() {
        let c = container(
            "web",
            &[
                ("cronyx.enabled", "true"),
                ("cronyx.exec.ping.schedule", "@every 5s"),
                ("cronyx.exec.ping.command", "curl localhost"),
            ],
        );
        let discovered = discover(&[c], "cronyx", false);
        assert_eq!(discovered.jobs.len(), 1);
        assert_eq!(discovered.jobs[0].name, "web.ping");
    }

    #[test]
    fn host_impacting_kinds_require_both_service_and_allow_host_jobs() {
        let c = container(
            "web",
            &[
                ("cronyx.enabled", "true"),
                ("cronyx.service", "true"),
                ("cronyx.local.cleanup.schedule", "@every 1h"),
                ("cronyx.local.cleanup.command", "rm -rf /tmp/cache"),
            ],
        );
        let rejected = discover(std::slice::from_ref(&c), "cronyx", false);
        assert!(rejected.jobs.is_empty());
        assert!(rejected.host_jobs_rejected);

        let allowed = discover(&[c], "cronyx", true);
        assert_eq!(allowed.jobs.len(), 1);
    }

    #[test]
    fn json_array_values_coerce_to_a_list() {
        let c = container(
            "web",
            &[
                ("cronyx.enabled", "true"),
                ("cronyx.run.sync.schedule", "@every 1h"),
                ("cronyx.run.sync.image", "alpine"),
                ("cronyx.run.sync.environment", r#"["FOO=1","BAR=2"]"#),
            ],
        );
        let discovered = discover(&[c], "cronyx", false);
        match &discovered.jobs[0].spec {
            JobSpecConfig::Run { env, .. } => {
                assert_eq!(env, &vec!["FOO=1".to_string(), "BAR=2".to_string()]);
            }
            _ => panic!("expected run spec"),
        }
    }
}
