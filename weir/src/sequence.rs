use async_trait::async_trait;

use crate::context::Context;
use crate::error::JobError;
use crate::job::{Job, JobRef};

/// A [`Job`] that runs a list of jobs in order via its context, halting on
/// the first error.
///
/// Returns the aggregated error of its members, or the run's cancellation
/// error when the members finished clean but the token was set while they
/// ran.
#[derive(Clone, Default)]
pub struct Sequence {
    jobs: Vec<JobRef>,
}

impl Sequence {
    /// Create a sequence over the given jobs.
    pub fn new(jobs: impl IntoIterator<Item = JobRef>) -> Self {
        Self {
            jobs: jobs.into_iter().collect(),
        }
    }

    /// Append a job to the end of the sequence.
    pub fn push(&mut self, job: JobRef) {
        self.jobs.push(job);
    }

    /// The member jobs, in run order.
    pub fn jobs(&self) -> &[JobRef] {
        &self.jobs
    }

    /// Wrap the sequence as a job handle.
    pub fn into_job(self) -> JobRef {
        JobRef::new(self)
    }
}

impl From<Vec<JobRef>> for Sequence {
    fn from(jobs: Vec<JobRef>) -> Self {
        Self { jobs }
    }
}

impl FromIterator<JobRef> for Sequence {
    fn from_iter<I: IntoIterator<Item = JobRef>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[async_trait]
impl Job for Sequence {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        ctx.run(self.jobs.iter().cloned())
            .wait()
            .await
            .map_err(JobError::into_anyhow)?;
        ctx.cancel_error()
    }
}
