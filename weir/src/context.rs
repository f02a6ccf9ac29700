use std::any::Any;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::cancel::{CancelToken, Cancelled};
use crate::event::{Event, Events};
use crate::job::JobRef;
use crate::run::spawn_run;

/// The handle passed to each running job.
///
/// A context is scoped to one job's execution and destroyed when its run
/// returns. It exposes the run's cancellation status, progress reporting,
/// and sub-job spawning via [`run`](Context::run) and
/// [`parallel`](Context::parallel), which return their own [`Events`]
/// streams. Events from sub-jobs are sent first to that stream, and then to
/// the stream of the enclosing job, so an ancestor several levels up
/// observes every descendant's events as they occur while each level only
/// knows its immediate parent.
#[derive(Clone)]
pub struct Context {
    token: CancelToken,
    events: mpsc::Sender<Event>,
    job: JobRef,
    parent: Option<JobRef>,
}

impl Context {
    pub(crate) fn new(
        token: CancelToken,
        events: mpsc::Sender<Event>,
        job: JobRef,
        parent: Option<JobRef>,
    ) -> Self {
        Self {
            token,
            events,
            job,
            parent,
        }
    }

    /// The job this context was created for.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// The job that queued this one, absent at the root.
    pub fn parent(&self) -> Option<&JobRef> {
        self.parent.as_ref()
    }

    /// The ambient cancellation token for this run.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Check if the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cancellation outcome, or `None` while the run is live.
    pub fn cancellation(&self) -> Option<Cancelled> {
        self.token.error()
    }

    /// `Err(Cancelled)` once the run has been cancelled, `Ok(())` before.
    ///
    /// Convenient as a job's final return value when it has no error of its
    /// own to report.
    pub fn cancel_error(&self) -> anyhow::Result<()> {
        match self.token.error() {
            Some(cancelled) => Err(cancelled.into()),
            None => Ok(()),
        }
    }

    /// Emit a `Progressed` event for the current job with a job-specific
    /// payload. Blocks only on normal stream back-pressure.
    pub async fn progress<P: Any + Send + Sync>(&self, payload: P) {
        let event = Event::Progressed {
            job: self.job.clone(),
            payload: Arc::new(payload),
        };
        let _ = self.events.send(event).await;
    }

    /// Run the given jobs one after the other, halting on the first error.
    /// The current job becomes their parent.
    pub fn run(&self, jobs: impl IntoIterator<Item = JobRef>) -> Events {
        self.run_with_token(self.token.clone(), jobs)
    }

    /// Identical to [`run`](Context::run), but with a caller-supplied
    /// cancellation token.
    pub fn run_with_token(
        &self,
        token: CancelToken,
        jobs: impl IntoIterator<Item = JobRef>,
    ) -> Events {
        self.delegate(spawn_run(
            token,
            jobs.into_iter().collect(),
            Some(self.job.clone()),
            1,
            true,
        ))
    }

    /// Run the given jobs using a worker pool of the given size. Errors do
    /// not affect continuation. The current job becomes their parent.
    pub fn parallel(
        &self,
        concurrency: usize,
        jobs: impl IntoIterator<Item = JobRef>,
    ) -> Events {
        self.parallel_with_token(self.token.clone(), concurrency, jobs)
    }

    /// Identical to [`parallel`](Context::parallel), but with a
    /// caller-supplied cancellation token.
    pub fn parallel_with_token(
        &self,
        token: CancelToken,
        concurrency: usize,
        jobs: impl IntoIterator<Item = JobRef>,
    ) -> Events {
        self.delegate(spawn_run(
            token,
            jobs.into_iter().collect(),
            Some(self.job.clone()),
            concurrency,
            false,
        ))
    }

    /// Copy every event of a sub-run onto a fresh stream for the caller and
    /// onto the enclosing job's stream, in that order. One forwarding task
    /// per sub-run keeps per-path ordering intact; there is no shared
    /// broadcast state. A caller that drops its stream does not stop the
    /// ancestors from observing the rest of the sub-run.
    fn delegate(&self, mut from: Events) -> Events {
        let (tx, events) = Events::channel();
        let up = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = from.next().await {
                let _ = tx.send(event.clone()).await;
                if up.send(event).await.is_err() {
                    trace!("enclosing stream closed; delegation ending");
                }
            }
        });
        events
    }
}
