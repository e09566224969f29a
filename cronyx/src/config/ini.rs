//! Loads `Config` from one or more INI files (see `glob` for multi-file
//! resolution). Keys are case-insensitive and repeated keys collapse into
//! arrays, per the documented INI contract.

use super::{Config, GlobalConfig, JobDefinition, JobKind, JobSpecConfig, NotifyConfig, RuntimeConfig};
use crate::error::SchedulerError;
use crate::job::{PullPolicy, Source};
use ini::{Ini, Properties};
use regex::Regex;
use std::time::Duration;

/// Loads and merges every file `pattern` resolves to (lexical order, later
/// files overwrite earlier keys for the same section+key), then parses the
/// merged tree into a `Config`.
pub fn load(pattern: &str) -> Result<Config, SchedulerError> {
    let paths = super::glob::resolve(pattern)?;
    let mut merged = Ini::new();
    for path in &paths {
        let ini = Ini::load_from_file(path).map_err(|e| {
            SchedulerError::configuration_with_source(
                format!("failed to read ini file '{}'", path.display()),
                anyhow::Error::from(e),
            )
        })?;
        merge(&mut merged, ini);
    }
    parse(&merged)
}

/// Folds `incoming`'s sections into `base`, later-file-wins per key.
fn merge(base: &mut Ini, incoming: Ini) {
    for (section, props) in incoming.iter() {
        for (key, value) in props.iter() {
            base.with_section(section).set(key, value);
        }
    }
}

fn parse(ini: &Ini) -> Result<Config, SchedulerError> {
    let mut config = Config::default();

    for (section_name, props) in ini.iter() {
        let Some(section_name) = section_name else { continue };
        if section_name.eq_ignore_ascii_case("global") {
            config.global = parse_global(props)?;
        } else if section_name.eq_ignore_ascii_case("docker") || section_name.eq_ignore_ascii_case("runtime") {
            config.runtime = parse_runtime(props)?;
        }
    }

    let job_section_re = Regex::new(r#"(?i)^job-(exec|run|service-run|local|compose)\s+"(.+)"$"#).unwrap();
    for (section_name, props) in ini.iter() {
        let Some(section_name) = section_name else { continue };
        let Some(captures) = job_section_re.captures(section_name) else { continue };
        let kind_raw = captures[1].to_ascii_lowercase();
        let kind_raw = kind_raw.as_str();
        let name = captures[2].to_string();
        let kind = match kind_raw {
            "exec" => JobKind::Exec,
            "run" => JobKind::Run,
            "service-run" => JobKind::Service,
            "local" => JobKind::Local,
            "compose" => JobKind::Compose,
            _ => unreachable!(),
        };
        config.jobs.push(parse_job(&name, kind, props)?);
    }

    Ok(config)
}

fn parse_global(props: &Properties) -> Result<GlobalConfig, SchedulerError> {
    let mut global = GlobalConfig::default();
    if let Some(v) = get(props, "log-level") {
        global.log_level = v.to_string();
    }
    if let Some(v) = get_bool(props, "enable-web") {
        global.enable_web = v;
    }
    if let Some(v) = get(props, "web-address") {
        global.web_address = v.to_string();
    }
    if let Some(v) = get_bool(props, "enable-pprof") {
        global.enable_pprof = v;
    }
    if let Some(v) = get(props, "pprof-address") {
        global.pprof_address = v.to_string();
    }
    global.max_runtime = get_duration(props, "max-runtime")?;
    if let Some(v) = get_bool(props, "allow-host-jobs-from-labels") {
        global.allow_host_jobs_from_labels = v;
    }
    if let Some(v) = get_bool(props, "enable-strict-validation") {
        global.enable_strict_validation = v;
    }
    global.default_user = get(props, "default-user").map(str::to_string);
    if let Some(d) = get_duration(props, "notification-cooldown")? {
        global.notification_cooldown = d;
    }
    global.notify = parse_notify(props)?;
    Ok(global)
}

fn parse_runtime(props: &Properties) -> Result<RuntimeConfig, SchedulerError> {
    let mut runtime = RuntimeConfig::default();
    runtime.filters = get_all(props, "filters");
    if let Some(d) = get_duration(props, "config-poll-interval")? {
        runtime.config_poll_interval = d;
    }
    if let Some(d) = get_duration(props, "docker-poll-interval")? {
        runtime.docker_poll_interval = d;
    }
    if let Some(v) = get_bool(props, "events") {
        runtime.events = v;
    }
    if let Some(d) = get_duration(props, "polling-fallback")? {
        runtime.polling_fallback = d;
    }
    Ok(runtime)
}

fn parse_notify(props: &Properties) -> Result<NotifyConfig, SchedulerError> {
    Ok(NotifyConfig {
        save_folder: get(props, "save-folder").map(str::to_string),
        save_only_on_error: get_bool(props, "save-only-on-error").unwrap_or(false),
        slack_webhook: get(props, "slack-webhook").map(str::to_string),
        slack_only_on_error: get_bool(props, "slack-only-on-error").unwrap_or(false),
        smtp_host: get(props, "smtp-host").map(str::to_string),
        smtp_port: get_u16(props, "smtp-port")?,
        smtp_user: get(props, "smtp-user").map(str::to_string),
        smtp_password: get(props, "smtp-password").map(str::to_string),
        smtp_tls_skip_verify: get_bool(props, "smtp-tls-skip-verify").unwrap_or(false),
        email_to: get_all(props, "email-to"),
        email_from: get(props, "email-from").map(str::to_string),
        mail_only_on_error: get_bool(props, "mail-only-on-error").unwrap_or(false),
    })
}

fn parse_job(name: &str, kind: JobKind, props: &Properties) -> Result<JobDefinition, SchedulerError> {
    let schedule = get(props, "schedule")
        .ok_or_else(|| SchedulerError::configuration(format!("job '{name}' is missing 'schedule'")))?
        .to_string();
    let user = get(props, "user").map(str::to_string);
    let no_overlap = get_bool(props, "no-overlap").unwrap_or(false);
    let command = get_command(props, "command");

    let spec = match kind {
        JobKind::Exec => JobSpecConfig::Exec {
            container: require(props, name, "container")?,
            command,
        },
        JobKind::Run => JobSpecConfig::Run {
            image: require(props, name, "image")?,
            command,
            container: get(props, "container").map(str::to_string),
            network: get_all(props, "network"),
            volumes: get_all(props, "volume"),
            env: get_all(props, "environment"),
            working_dir: get(props, "working-dir").map(str::to_string),
            entrypoint: {
                let e = get_command(props, "entrypoint");
                if e.is_empty() { None } else { Some(e) }
            },
            delete: get_bool(props, "delete").unwrap_or(false),
            pull: if get_bool(props, "pull").unwrap_or(false) {
                PullPolicy::Always
            } else {
                PullPolicy::IfMissing
            },
            max_runtime: get_duration(props, "max-runtime")?,
        },
        JobKind::Service => JobSpecConfig::Service {
            image: require(props, name, "image")?,
            command,
            env: get_all(props, "environment"),
            max_runtime: get_duration(props, "max-runtime")?,
        },
        JobKind::Local => JobSpecConfig::Local {
            command,
            dir: get(props, "working-dir").map(str::to_string),
            env: get_all(props, "environment"),
        },
        JobKind::Compose => JobSpecConfig::Compose {
            file: require(props, name, "file")?,
            service: get(props, "service").map(str::to_string),
            command,
        },
    };

    Ok(JobDefinition {
        name: name.to_string(),
        kind,
        schedule,
        user,
        no_overlap,
        spec,
        notify: parse_notify(props)?,
        source: Source::Ini,
    })
}

fn require(props: &Properties, job: &str, field: &str) -> Result<String, SchedulerError> {
    get(props, field)
        .map(str::to_string)
        .ok_or_else(|| SchedulerError::configuration(format!("job '{job}' is missing required field '{field}'")))
}

fn get_command(props: &Properties, key: &str) -> Vec<String> {
    let raw = match get(props, key) {
        Some(v) => v,
        None => return Vec::new(),
    };
    shlex::split(raw).unwrap_or_else(|| vec![raw.to_string()])
}

/// Case-insensitive single-value lookup; last value wins on duplicate keys.
fn get<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
        .last()
}

/// Case-insensitive multi-value lookup; every matching key's value is kept.
fn get_all(props: &Properties, key: &str) -> Vec<String> {
    props
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.to_string())
        .collect()
}

fn get_bool(props: &Properties, key: &str) -> Option<bool> {
    match get(props, key)?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn get_u16(props: &Properties, key: &str) -> Result<Option<u16>, SchedulerError> {
    match get(props, key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SchedulerError::configuration(format!("invalid integer for '{key}': '{v}'"))),
    }
}

fn get_duration(props: &Properties, key: &str) -> Result<Option<Duration>, SchedulerError> {
    match get(props, key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => humantime::parse_duration(v.trim()).map(Some).map_err(|e| {
            SchedulerError::configuration_with_source(format!("invalid duration for '{key}': '{v}'"), e.into())
        }),
    }
}
