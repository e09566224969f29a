use crate::CronResult;
use crate::contracts::JobContract;
use crate::schedule::ValidatedSchedule;
use async_trait::async_trait;
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type RunnableFunc =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = CronResult<()>> + Send>> + Send + Sync>;

/// A lightweight, closure-based implementation of [`JobContract`].
///
/// Allows scheduling arbitrary `async fn`s or closures without defining a
/// new struct. Also supports **blocking** (synchronous) functions via
/// `tokio::task::spawn_blocking`.
///
/// The schedule is validated eagerly at construction time, so registration
/// fails fast on a bad expression.
pub struct FnJob {
    id: String,
    name: String,
    schedule: ValidatedSchedule,
    func: RunnableFunc,
}

#[async_trait]
impl JobContract for FnJob {
    async fn run(&self) -> CronResult<()> {
        (self.func)().await
    }

    fn id(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.id)
    }

    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn schedule(&self) -> &ValidatedSchedule {
        &self.schedule
    }
}

impl FnJob {
    /// Creates a new `FnJob` from an async closure or function.
    pub fn new<F, Fut>(
        id: impl Into<String>,
        name: impl Into<String>,
        schedule_expr: &str,
        func: F,
    ) -> CronResult<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CronResult<()>> + Send + 'static,
    {
        Ok(Self {
            id: id.into(),
            name: name.into(),
            schedule: ValidatedSchedule::parse(schedule_expr)?,
            func: Arc::new(move || Box::pin(func())),
        })
    }

    /// Creates a new `FnJob` from a **blocking** function, run via
    /// `tokio::task::spawn_blocking`.
    pub fn new_blocking<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        schedule_expr: &str,
        func: F,
    ) -> CronResult<Self>
    where
        F: Fn() -> CronResult<()> + Send + Sync + 'static + Clone,
    {
        Ok(Self {
            id: id.into(),
            name: name.into(),
            schedule: ValidatedSchedule::parse(schedule_expr)?,
            func: Arc::new(move || {
                let f = func.clone();
                Box::pin(async move { tokio::task::spawn_blocking(f).await? })
            }),
        })
    }
}
