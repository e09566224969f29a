//! Named shutdown-hook registry. Hooks run in reverse registration order on
//! termination, each bounded by its own timeout plus an overall deadline.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, warn};

type HookFn = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct Hook {
    name: String,
    timeout: Duration,
    run: HookFn,
}

/// Registers named async cleanup actions and runs them, in reverse
/// registration order, when the process is asked to shut down.
#[derive(Default)]
pub struct ShutdownManager {
    hooks: Vec<Hook>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` under `name`, bounded by `timeout`. A hook that
    /// exceeds its timeout is logged and abandoned, not awaited further.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, timeout: Duration, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push(Hook {
            name: name.into(),
            timeout,
            run: Box::new(move || Box::pin(hook())),
        });
    }

    /// Runs every hook in reverse registration order, each under its own
    /// timeout, with `overall_deadline` bounding the whole sequence.
    /// Returns once every hook has returned or the deadline elapses,
    /// whichever comes first.
    pub async fn shutdown(self, overall_deadline: Duration) {
        let sequence = async {
            for hook in self.hooks.into_iter().rev() {
                let name = hook.name.clone();
                match tokio::time::timeout(hook.timeout, (hook.run)()).await {
                    Ok(()) => {}
                    Err(_) => warn!(hook = %name, timeout = ?hook.timeout, "shutdown hook exceeded its timeout, abandoning it"),
                }
            }
        };

        if tokio::time::timeout(overall_deadline, sequence).await.is_err() {
            error!(deadline = ?overall_deadline, "shutdown deadline exceeded, exiting with hooks still outstanding");
        }
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}
