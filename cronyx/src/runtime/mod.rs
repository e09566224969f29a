//! The container-runtime capability this crate depends on.
//!
//! Only the narrow surface the job kinds and the label-discovery watcher
//! need is exposed here; the concrete implementation (`docker.rs`) is a thin
//! wrapper over `bollard`. Job kinds and the watcher depend on the trait,
//! not on `bollard` directly, so tests can swap in `fake::FakeRuntime`.

mod docker;
pub mod fake;

pub use docker::BollardRuntime;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Default)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
    pub running: bool,
}

#[derive(Debug, Clone)]
pub struct CreateContainerSpec {
    pub name: Option<String>,
    pub image: String,
    pub cmd: Vec<String>,
    pub user: Option<String>,
    pub working_dir: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub env: Vec<String>,
    pub volumes: Vec<String>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone)]
pub struct CreateExecSpec {
    pub cmd: Vec<String>,
    pub user: Option<String>,
    pub tty: bool,
    pub env: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CreateServiceSpec {
    pub name: String,
    pub image: String,
    pub cmd: Vec<String>,
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Complete,
    Failed,
}

/// The subset of the Docker Engine API this scheduler depends on.
///
/// Modeled as a trait (rather than calling `bollard::Docker` directly from
/// job bodies) so the job state machines and the label-discovery watcher
/// can be exercised against [`fake::FakeRuntime`] in tests.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerSummary>>;

    async fn inspect_container(&self, id: &str) -> anyhow::Result<ContainerSummary>;

    async fn create_container(&self, spec: CreateContainerSpec) -> anyhow::Result<String>;

    async fn start_container(&self, id: &str) -> anyhow::Result<()>;

    async fn stop_container(&self, id: &str, timeout: Duration) -> anyhow::Result<()>;

    async fn wait_container(&self, id: &str) -> anyhow::Result<i64>;

    async fn remove_container(&self, id: &str) -> anyhow::Result<()>;

    async fn has_image_local(&self, image: &str) -> anyhow::Result<bool>;

    async fn pull_image(&self, image: &str) -> anyhow::Result<()>;

    async fn connect_network(&self, container_id: &str, network: &str) -> anyhow::Result<()>;

    async fn create_exec(
        &self,
        container_id: &str,
        spec: CreateExecSpec,
    ) -> anyhow::Result<String>;

    /// Starts the exec and streams its combined output, returning the exit
    /// code once the process has finished.
    async fn start_exec(
        &self,
        exec_id: &str,
        on_output: &mut dyn FnMut(LogChannel, &str) + Send,
    ) -> anyhow::Result<i64>;

    async fn create_service(&self, spec: CreateServiceSpec) -> anyhow::Result<String>;

    async fn wait_service_task(&self, service_id: &str) -> anyhow::Result<TaskState>;

    async fn service_task_logs(&self, service_id: &str) -> anyhow::Result<String>;

    async fn remove_service(&self, service_id: &str) -> anyhow::Result<()>;

    /// Subscribes to the container lifecycle event stream, filtered to the
    /// events that should trigger a label re-scan (start, stop, die,
    /// destroy, update). The receiver yields one `()` per relevant event;
    /// the watcher doesn't need the event's contents, only that something
    /// changed. The receiver closing means the subscription dropped and
    /// the watcher should fall back to polling.
    async fn subscribe_events(&self) -> anyhow::Result<mpsc::Receiver<()>>;
}
