//! An in-memory `ContainerRuntime` used by unit and integration tests.

use super::{
    ContainerRuntime, ContainerSummary, CreateContainerSpec, CreateExecSpec, CreateServiceSpec,
    LogChannel, TaskState,
};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct State {
    containers: Vec<ContainerSummary>,
    created: Vec<CreateContainerSpec>,
    removed_containers: Vec<String>,
    removed_services: Vec<String>,
    next_id: u64,
    exec_exit_code: i64,
    exec_output: Vec<(LogChannel, String)>,
    container_exit_code: i64,
    image_present: bool,
    pull_calls: usize,
    events_should_fail: bool,
}

/// A fully in-memory stand-in for `BollardRuntime`. Every mutating call is
/// recorded so tests can assert on exactly what the job kinds did.
pub struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                exec_exit_code: 0,
                container_exit_code: 0,
                image_present: true,
                ..Default::default()
            }),
        }
    }

    pub fn with_container(self, summary: ContainerSummary) -> Self {
        self.state.lock().unwrap().containers.push(summary);
        self
    }

    /// Replaces the whole container set, for tests that need to change what
    /// `list_containers` returns between two reconciliation cycles.
    pub fn set_containers(&self, containers: Vec<ContainerSummary>) {
        self.state.lock().unwrap().containers = containers;
    }

    pub fn set_exec_exit_code(&self, code: i64) {
        self.state.lock().unwrap().exec_exit_code = code;
    }

    pub fn set_container_exit_code(&self, code: i64) {
        self.state.lock().unwrap().container_exit_code = code;
    }

    pub fn set_exec_output(&self, output: Vec<(LogChannel, String)>) {
        self.state.lock().unwrap().exec_output = output;
    }

    pub fn set_image_present(&self, present: bool) {
        self.state.lock().unwrap().image_present = present;
    }

    pub fn created_containers(&self) -> Vec<CreateContainerSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_containers.clone()
    }

    pub fn removed_services(&self) -> Vec<String> {
        self.state.lock().unwrap().removed_services.clone()
    }

    pub fn pull_calls(&self) -> usize {
        self.state.lock().unwrap().pull_calls
    }

    pub fn fail_event_subscription(&self) {
        self.state.lock().unwrap().events_should_fail = true;
    }

    pub fn allow_event_subscription(&self) {
        self.state.lock().unwrap().events_should_fail = false;
    }
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers(&self) -> anyhow::Result<Vec<ContainerSummary>> {
        Ok(self.state.lock().unwrap().containers.clone())
    }

    async fn inspect_container(&self, id: &str) -> anyhow::Result<ContainerSummary> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.id == id || c.name == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no such container: {id}"))
    }

    async fn create_container(&self, spec: CreateContainerSpec) -> anyhow::Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("fake-container-{}", state.next_id);
        state.created.push(spec);
        state.containers.push(ContainerSummary {
            id: id.clone(),
            name: id.clone(),
            labels: Default::default(),
            running: false,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.iter_mut().find(|c| c.id == id) {
            c.running = true;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str, _timeout: Duration) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.iter_mut().find(|c| c.id == id) {
            c.running = false;
        }
        Ok(())
    }

    async fn wait_container(&self, _id: &str) -> anyhow::Result<i64> {
        Ok(self.state.lock().unwrap().container_exit_code)
    }

    async fn remove_container(&self, id: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.containers.retain(|c| c.id != id);
        state.removed_containers.push(id.to_string());
        Ok(())
    }

    async fn has_image_local(&self, _image: &str) -> anyhow::Result<bool> {
        Ok(self.state.lock().unwrap().image_present)
    }

    async fn pull_image(&self, _image: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().pull_calls += 1;
        Ok(())
    }

    async fn connect_network(&self, _container_id: &str, _network: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_exec(
        &self,
        _container_id: &str,
        _spec: CreateExecSpec,
    ) -> anyhow::Result<String> {
        Ok("fake-exec".to_string())
    }

    async fn start_exec(
        &self,
        _exec_id: &str,
        on_output: &mut dyn FnMut(LogChannel, &str) + Send,
    ) -> anyhow::Result<i64> {
        let state = self.state.lock().unwrap();
        for (channel, line) in &state.exec_output {
            on_output(*channel, line);
        }
        Ok(state.exec_exit_code)
    }

    async fn create_service(&self, spec: CreateServiceSpec) -> anyhow::Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        Ok(format!("fake-service-{}-{}", spec.name, state.next_id))
    }

    async fn wait_service_task(&self, _service_id: &str) -> anyhow::Result<TaskState> {
        Ok(if self.state.lock().unwrap().container_exit_code == 0 {
            TaskState::Complete
        } else {
            TaskState::Failed
        })
    }

    async fn service_task_logs(&self, _service_id: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    async fn remove_service(&self, service_id: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .removed_services
            .push(service_id.to_string());
        Ok(())
    }

    async fn subscribe_events(&self) -> anyhow::Result<mpsc::Receiver<()>> {
        if self.state.lock().unwrap().events_should_fail {
            return Err(anyhow::anyhow!("fake event subscription failure"));
        }
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }
}
