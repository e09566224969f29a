use super::{
    ContainerRuntime, ContainerSummary, CreateContainerSpec, CreateExecSpec, CreateServiceSpec,
    LogChannel, TaskState,
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, EndpointSettings, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptionsBuilder, InspectContainerOptions,
    ListContainersOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    WaitContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// `ContainerRuntime` backed by the real Docker Engine API via `bollard`.
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults().context("connect to docker daemon")?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerSummary>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                ..Default::default()
            }))
            .await
            .context("list containers")?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let running = c
                    .state
                    .as_ref()
                    .map(|s| s.as_ref() == "running")
                    .unwrap_or(false);
                ContainerSummary {
                    id: c.id.unwrap_or_default(),
                    name: c
                        .names
                        .as_ref()
                        .and_then(|v| v.first())
                        .cloned()
                        .unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                    running,
                }
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> anyhow::Result<ContainerSummary> {
        let details = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .with_context(|| format!("inspect container {id}"))?;

        let running = details
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);

        Ok(ContainerSummary {
            id: details.id.unwrap_or_else(|| id.to_string()),
            name: details.name.unwrap_or_default(),
            labels: details
                .config
                .and_then(|c| c.labels)
                .unwrap_or_default(),
            running,
        })
    }

    async fn create_container(&self, spec: CreateContainerSpec) -> anyhow::Result<String> {
        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: Some(name.clone()),
            ..Default::default()
        });

        let host_config = HostConfig {
            binds: Some(spec.volumes.clone()),
            network_mode: spec.network.clone(),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            user: spec.user.clone(),
            working_dir: spec.working_dir.clone(),
            entrypoint: spec.entrypoint.clone(),
            env: Some(spec.env.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(options, body)
            .await
            .context("create container")?;

        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await
            .with_context(|| format!("start container {id}"))
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> anyhow::Result<()> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: Some(timeout.as_secs() as i32),
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("stop container {id}"))
    }

    async fn wait_container(&self, id: &str) -> anyhow::Result<i64> {
        let mut stream = self
            .docker
            .wait_container(id, None::<WaitContainerOptions>);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(e)) => Err(anyhow!(e)).with_context(|| format!("wait container {id}")),
            None => Err(anyhow!("wait stream for container {id} ended with no result")),
        }
    }

    async fn remove_container(&self, id: &str) -> anyhow::Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .with_context(|| format!("remove container {id}"))
    }

    async fn has_image_local(&self, image: &str) -> anyhow::Result<bool> {
        Ok(self.docker.inspect_image(image).await.is_ok())
    }

    async fn pull_image(&self, image: &str) -> anyhow::Result<()> {
        let options = CreateImageOptionsBuilder::new().from_image(image).build();
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.with_context(|| format!("pull image {image}"))?;
        }
        Ok(())
    }

    async fn connect_network(&self, container_id: &str, network: &str) -> anyhow::Result<()> {
        use bollard::models::NetworkConnectRequest;
        use bollard::query_parameters::ConnectNetworkOptionsBuilder;

        let _ = ConnectNetworkOptionsBuilder::default();
        self.docker
            .connect_network(
                network,
                NetworkConnectRequest {
                    container: Some(container_id.to_string()),
                    endpoint_config: Some(EndpointSettings::default()),
                },
            )
            .await
            .with_context(|| format!("connect container {container_id} to network {network}"))
    }

    async fn create_exec(
        &self,
        container_id: &str,
        spec: CreateExecSpec,
    ) -> anyhow::Result<String> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(spec.tty),
                    cmd: Some(spec.cmd),
                    user: spec.user,
                    env: Some(spec.env),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("create exec on container {container_id}"))?;
        Ok(exec.id)
    }

    async fn start_exec(
        &self,
        exec_id: &str,
        on_output: &mut dyn FnMut(LogChannel, &str) + Send,
    ) -> anyhow::Result<i64> {
        match self
            .docker
            .start_exec(exec_id, None)
            .await
            .with_context(|| format!("start exec {exec_id}"))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(Ok(msg)) = output.next().await {
                    let (channel, bytes) = match msg {
                        LogOutput::StdOut { message } => (LogChannel::Stdout, message),
                        LogOutput::StdErr { message } => (LogChannel::Stderr, message),
                        _ => continue,
                    };
                    on_output(channel, &String::from_utf8_lossy(&bytes));
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self
            .docker
            .inspect_exec(exec_id)
            .await
            .with_context(|| format!("inspect exec {exec_id}"))?;
        Ok(inspect.exit_code.unwrap_or_default())
    }

    async fn create_service(&self, spec: CreateServiceSpec) -> anyhow::Result<String> {
        use bollard::models::{
            ContainerSpec, EndpointSpec, RestartPolicy, RestartPolicyCondition, ServiceSpec,
            TaskSpec,
        };
        use bollard::service::CreateServiceOptions;

        let service_spec = ServiceSpec {
            name: Some(spec.name.clone()),
            task_template: Some(Box::new(TaskSpec {
                container_spec: Some(Box::new(ContainerSpec {
                    image: Some(spec.image.clone()),
                    command: Some(spec.cmd.clone()),
                    env: Some(spec.env.clone()),
                    ..Default::default()
                })),
                restart_policy: Some(Box::new(RestartPolicy {
                    condition: Some(RestartPolicyCondition::NONE),
                    ..Default::default()
                })),
                ..Default::default()
            })),
            endpoint_spec: Some(Box::new(EndpointSpec::default())),
            ..Default::default()
        };

        let response = self
            .docker
            .create_service(service_spec, None::<CreateServiceOptions>)
            .await
            .with_context(|| format!("create service {}", spec.name))?;

        response.id.ok_or_else(|| anyhow!("service create returned no id"))
    }

    async fn wait_service_task(&self, service_id: &str) -> anyhow::Result<TaskState> {
        use bollard::query_parameters::ListTasksOptionsBuilder;

        let options = ListTasksOptionsBuilder::default()
            .filters(&HashMap::from([(
                "service".to_string(),
                vec![service_id.to_string()],
            )]))
            .build();

        let tasks = self
            .docker
            .list_tasks(Some(options))
            .await
            .with_context(|| format!("list tasks for service {service_id}"))?;

        let state = tasks
            .first()
            .and_then(|t| t.status.as_ref())
            .and_then(|s| s.state.as_ref())
            .map(|s| s.to_string())
            .unwrap_or_default();

        Ok(match state.as_str() {
            "complete" => TaskState::Complete,
            "failed" | "rejected" | "shutdown" => TaskState::Failed,
            "running" | "starting" => TaskState::Running,
            _ => TaskState::Pending,
        })
    }

    async fn service_task_logs(&self, _service_id: &str) -> anyhow::Result<String> {
        // bollard does not currently expose per-task log streaming the way
        // it does for containers; callers fall back to inspecting the task
        // state only. Left as a documented gap rather than a fake success.
        Ok(String::new())
    }

    async fn remove_service(&self, service_id: &str) -> anyhow::Result<()> {
        self.docker
            .delete_service(service_id)
            .await
            .with_context(|| format!("remove service {service_id}"))
    }

    async fn subscribe_events(&self) -> anyhow::Result<mpsc::Receiver<()>> {
        use bollard::query_parameters::EventsOptionsBuilder;

        let mut stream = self.docker.events(Some(
            EventsOptionsBuilder::default()
                .filters(&HashMap::from([(
                    "type".to_string(),
                    vec!["container".to_string()],
                )]))
                .build(),
        ));

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if event.is_err() {
                    break;
                }
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
