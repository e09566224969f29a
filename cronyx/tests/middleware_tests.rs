//! Exercises the middleware chain composed of more than one real middleware
//! at once, through the crate's public surface.

use cronyx::execution::Execution;
use cronyx::job::{ExecJob, Job, JobSpec, Source, UserSetting};
use cronyx::middleware::{Chain, Middleware, OverlapGuard, SaveMiddleware};
use cronyx::runtime::fake::FakeRuntime;
use cronyx::runtime::ContainerSummary;
use cronyx_cron::ValidatedSchedule;
use std::sync::Arc;

fn running_exec_job(name: &str, no_overlap: bool, middlewares: Vec<Arc<dyn Middleware>>) -> Job {
    Job {
        name: name.to_string(),
        schedule: ValidatedSchedule::parse("@every 5s").unwrap(),
        user: UserSetting::Inherit,
        source: Source::Ini,
        no_overlap,
        spec: JobSpec::Exec(ExecJob { container: "web".to_string(), command: vec!["true".to_string()] }),
        notify_fingerprint: String::new(),
        middlewares,
        runtime: Arc::new(FakeRuntime::new().with_container(ContainerSummary {
            id: "c1".into(),
            name: "web".into(),
            running: true,
            labels: Default::default(),
        })),
    }
}

#[tokio::test]
async fn overlap_guard_blocks_a_second_fire_while_the_first_is_still_running() {
    let guard = Arc::new(OverlapGuard::new());
    let job = running_exec_job("guarded", true, vec![guard.clone()]);

    let mut first = Execution::new(&job.name);
    assert!(guard.before(&job, &mut first).await);
    assert!(guard.is_running(&job.name));

    let mut second = Execution::new(&job.name);
    assert!(!guard.before(&job, &mut second).await);
    assert!(second.skipped);

    guard.after(&job, &mut first).await;
    assert!(!guard.is_running(&job.name));
}

#[tokio::test]
async fn save_middleware_persists_an_execution_run_through_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let save: Arc<dyn Middleware> = Arc::new(SaveMiddleware::new(dir.path(), false));
    let job = running_exec_job("saved", false, vec![save]);
    let chain = Chain::new(job.middlewares.clone());

    let mut execution = Execution::new(&job.name);
    chain.run(&job, &mut execution).await.unwrap();

    let restored = SaveMiddleware::restore(dir.path());
    assert_eq!(restored.len(), 1);
    assert_eq!(restored[0].job_name, "saved");
    assert!(!restored[0].failed);
}

#[tokio::test]
async fn overlap_guard_wired_through_the_chain_skips_a_concurrent_fire() {
    let guard = Arc::new(OverlapGuard::new());
    let job = running_exec_job("chained-guard", true, vec![guard.clone()]);
    let chain = Chain::new(job.middlewares.clone());

    let mut first = Execution::new(&job.name);
    guard.before(&job, &mut first).await;

    let mut second = Execution::new(&job.name);
    chain.run(&job, &mut second).await.unwrap();
    assert!(second.skipped);

    guard.after(&job, &mut first).await;
}

#[tokio::test]
async fn a_chain_with_no_middlewares_still_runs_the_job_body() {
    let job = running_exec_job("bare", false, vec![]);
    let chain = Chain::new(job.middlewares.clone());
    let mut execution = Execution::new(&job.name);
    chain.run(&job, &mut execution).await.unwrap();
    assert!(!execution.failed);
    assert!(!execution.skipped);
}
