//! End-to-end reconciliation cycles: container labels, through discovery and
//! merge, registered onto a live scheduler and re-diffed on subsequent runs.

use cronyx::config::reconciler::Reconciler;
use cronyx::config::{Config, JobDefinition, JobKind, JobSpecConfig, NotifyConfig};
use cronyx::job::Source;
use cronyx::runtime::fake::FakeRuntime;
use cronyx::runtime::ContainerSummary;
use cronyx::scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;

fn ini_job(name: &str, schedule: &str) -> JobDefinition {
    JobDefinition {
        name: name.to_string(),
        kind: JobKind::Exec,
        schedule: schedule.to_string(),
        user: None,
        no_overlap: false,
        spec: JobSpecConfig::Exec { container: "web".to_string(), command: vec!["true".to_string()] },
        notify: NotifyConfig::default(),
        source: Source::Ini,
    }
}

fn labeled_container(name: &str, job_name: &str, schedule: &str) -> ContainerSummary {
    ContainerSummary {
        id: format!("{name}-id"),
        name: name.to_string(),
        running: true,
        labels: [
            ("cronyx.enabled".to_string(), "true".to_string()),
            (format!("cronyx.exec.{job_name}.schedule"), schedule.to_string()),
            (format!("cronyx.exec.{job_name}.command"), "curl localhost".to_string()),
        ]
        .into_iter()
        .collect(),
    }
}

#[tokio::test]
async fn a_reconcile_cycle_registers_label_discovered_jobs() {
    let runtime = Arc::new(
        FakeRuntime::new().with_container(labeled_container("web", "ping", "@every 5s")),
    );
    let reconciler = Reconciler::new(runtime, "cronyx", Duration::from_secs(600));
    let scheduler = Scheduler::new();
    let config = Config::default();

    reconciler.reconcile(&scheduler, &config).await.unwrap();

    assert_eq!(scheduler.jobs().await, vec!["web.ping".to_string()]);
}

#[tokio::test]
async fn a_second_cycle_with_an_unchanged_container_is_a_no_op() {
    let runtime = Arc::new(
        FakeRuntime::new().with_container(labeled_container("web", "ping", "@every 5s")),
    );
    let reconciler = Reconciler::new(runtime, "cronyx", Duration::from_secs(600));
    let scheduler = Scheduler::new();
    let config = Config::default();

    reconciler.reconcile(&scheduler, &config).await.unwrap();
    let before = scheduler.jobs().await;
    reconciler.reconcile(&scheduler, &config).await.unwrap();
    let after = scheduler.jobs().await;

    assert_eq!(before, after);
}

#[tokio::test]
async fn a_container_disappearing_removes_its_job_on_the_next_cycle() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.set_containers(vec![labeled_container("web", "ping", "@every 5s")]);
    let reconciler = Reconciler::new(runtime.clone(), "cronyx", Duration::from_secs(600));
    let scheduler = Scheduler::new();
    let config = Config::default();

    reconciler.reconcile(&scheduler, &config).await.unwrap();
    assert_eq!(scheduler.jobs().await.len(), 1);

    runtime.set_containers(vec![]);
    reconciler.reconcile(&scheduler, &config).await.unwrap();
    assert!(scheduler.jobs().await.is_empty());
}

#[tokio::test]
async fn ini_defined_jobs_coexist_with_label_discovered_ones() {
    let runtime = Arc::new(
        FakeRuntime::new().with_container(labeled_container("web", "ping", "@every 5s")),
    );
    let reconciler = Reconciler::new(runtime, "cronyx", Duration::from_secs(600));
    let scheduler = Scheduler::new();
    let mut config = Config::default();
    config.jobs.push(ini_job("backup", "@every 1h"));

    reconciler.reconcile(&scheduler, &config).await.unwrap();

    let mut jobs = scheduler.jobs().await;
    jobs.sort();
    assert_eq!(jobs, vec!["backup".to_string(), "web.ping".to_string()]);
}

#[tokio::test]
async fn an_ini_job_schedule_change_re_registers_with_the_new_schedule() {
    let runtime = Arc::new(FakeRuntime::new());
    let reconciler = Reconciler::new(runtime, "cronyx", Duration::from_secs(600));
    let scheduler = Scheduler::new();
    let mut config = Config::default();
    config.jobs.push(ini_job("backup", "@every 1h"));

    reconciler.reconcile(&scheduler, &config).await.unwrap();
    assert_eq!(scheduler.jobs().await, vec!["backup".to_string()]);

    config.jobs[0].schedule = "@every 2h".to_string();
    reconciler.reconcile(&scheduler, &config).await.unwrap();
    assert_eq!(scheduler.jobs().await, vec!["backup".to_string()]);
}
