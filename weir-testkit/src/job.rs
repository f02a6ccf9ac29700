use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use weir::{formatter, Context, Formatter, Job, JobError, JobRef};

/// A job with a display name and optional child jobs, run as an ordered
/// halt-on-error group through its context.
pub struct NamedJob {
    name: String,
    children: Vec<JobRef>,
}

impl NamedJob {
    /// A leaf job that succeeds immediately.
    pub fn leaf(name: impl Into<String>) -> JobRef {
        JobRef::new(Self {
            name: name.into(),
            children: Vec::new(),
        })
    }

    /// A job that runs the given children in order via its context.
    pub fn with_children(
        name: impl Into<String>,
        children: Vec<JobRef>,
    ) -> JobRef {
        JobRef::new(Self {
            name: name.into(),
            children,
        })
    }

    /// The job's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Job for NamedJob {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        if self.children.is_empty() {
            return Ok(());
        }
        ctx.run(self.children.iter().cloned())
            .wait()
            .await
            .map_err(JobError::into_anyhow)
    }
}

/// A named job that always fails with the given message.
pub struct FailingJob {
    name: String,
    message: String,
}

impl FailingJob {
    /// Create a failing job.
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> JobRef {
        JobRef::new(Self {
            name: name.into(),
            message: message.into(),
        })
    }

    /// The job's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Job for FailingJob {
    async fn run(&self, _ctx: &Context) -> anyhow::Result<()> {
        Err(anyhow!("{}", self.message))
    }
}

/// A named job that sleeps before succeeding.
pub struct SlowJob {
    name: String,
    delay: Duration,
}

impl SlowJob {
    /// Create a slow job.
    pub fn new(name: impl Into<String>, delay: Duration) -> JobRef {
        JobRef::new(Self {
            name: name.into(),
            delay,
        })
    }

    /// The job's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Job for SlowJob {
    async fn run(&self, _ctx: &Context) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

fn job_name(job: &JobRef) -> Option<&str> {
    if let Some(job) = job.downcast_ref::<NamedJob>() {
        return Some(job.name());
    }
    if let Some(job) = job.downcast_ref::<FailingJob>() {
        return Some(job.name());
    }
    if let Some(job) = job.downcast_ref::<SlowJob>() {
        return Some(job.name());
    }
    None
}

/// A formatter that renders each testkit job's name and suppresses output
/// for everything else.
pub fn name_formatter() -> Formatter {
    formatter(|event| {
        job_name(event.job()).unwrap_or_default().to_string()
    })
}

/// Like [`name_formatter`], but renders `heading` for jobs without a name,
/// such as a wrapping [`Sequence`](weir::Sequence).
pub fn name_formatter_with_heading(heading: impl Into<String>) -> Formatter {
    let heading = heading.into();
    formatter(move |event| {
        job_name(event.job())
            .map(str::to_string)
            .unwrap_or_else(|| heading.clone())
    })
}
