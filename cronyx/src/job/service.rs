//! Service kind: run a one-off task through the Swarm service API instead
//! of a bare container, so the runtime's own restart/placement logic is
//! bypassed in favor of letting this scheduler own retries-via-next-tick.
//!
//! States: `Idle -> EnsuringImage -> CreatingService -> WaitingTasks ->
//! Finished -> Removing`. The service always has exactly one replica and is
//! removed once its task reaches a terminal state, regardless of outcome.

use super::{Job, ServiceJob};
use crate::error::SchedulerError;
use crate::execution::Execution;
use crate::runtime::{CreateServiceSpec, TaskState};
use tokio::time::timeout;
use tracing::warn;

pub async fn run(
    job: &Job,
    spec: &ServiceJob,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let runtime = &job.runtime;

    if !runtime.has_image_local(&spec.image).await.map_err(|e| {
        SchedulerError::runtime_preparation(&job.name, "checking local image", e)
    })? {
        runtime
            .pull_image(&spec.image)
            .await
            .map_err(|e| SchedulerError::runtime_preparation(&job.name, "image pull failed", e))?;
    }

    let service_id = runtime
        .create_service(CreateServiceSpec {
            name: job.name.clone(),
            image: spec.image.clone(),
            cmd: spec.command.clone(),
            env: spec.env.clone(),
        })
        .await
        .map_err(|e| SchedulerError::runtime_preparation(&job.name, "service create failed", e))?;

    let result = wait_for_task(job, spec, &service_id, execution).await;

    if let Err(e) = runtime.remove_service(&service_id).await {
        warn!(job = %job.name, service = %service_id, error = ?e, "failed to remove service after run");
    }

    result
}

async fn wait_for_task(
    job: &Job,
    spec: &ServiceJob,
    service_id: &str,
    execution: &mut Execution,
) -> Result<(), SchedulerError> {
    let runtime = &job.runtime;
    let wait = runtime.wait_service_task(service_id);

    let state = match spec.max_runtime {
        Some(limit) => match timeout(limit, wait).await {
            Ok(result) => {
                result.map_err(|e| SchedulerError::runtime_execution(&job.name, "wait failed", e))?
            }
            Err(_) => {
                execution.mark_failed("timeout", format!("exceeded max runtime of {limit:?}"));
                return Err(SchedulerError::timeout(&job.name, limit));
            }
        },
        None => wait
            .await
            .map_err(|e| SchedulerError::runtime_execution(&job.name, "wait failed", e))?,
    };

    if state != TaskState::Complete {
        let logs = runtime.service_task_logs(service_id).await.unwrap_or_default();
        if !logs.is_empty() {
            execution.stderr.push_str(&logs);
        }
        let message = format!("service task ended in state {state:?}");
        execution.mark_failed("runtime-execution", &message);
        return Err(SchedulerError::runtime_execution(
            &job.name,
            message.clone(),
            anyhow::anyhow!(message),
        ));
    }

    execution.mark_success();
    Ok(())
}
