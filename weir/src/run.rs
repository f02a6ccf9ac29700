use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, trace, Instrument};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::context::Context;
use crate::error::JobError;
use crate::event::{Event, Events};
use crate::job::JobRef;

/// Identifier for one top-level or nested engine run, recorded on the run's
/// tracing span.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run the given jobs one after the other. If any job returns an error,
/// subsequent jobs are not run.
pub fn run(jobs: impl IntoIterator<Item = JobRef>) -> Events {
    run_with_token(CancelToken::new(), jobs)
}

/// Identical to [`run`], but accepts a [`CancelToken`].
pub fn run_with_token(
    token: CancelToken,
    jobs: impl IntoIterator<Item = JobRef>,
) -> Events {
    spawn_run(token, jobs.into_iter().collect(), None, 1, true)
}

/// Run the given jobs using a queue and the number of workers specified by
/// `concurrency`. Errors do not affect continuation.
///
/// `concurrency == 1` degrades to an ordered series without halt-on-error;
/// `concurrency >= len` (or `0`) starts every job at once.
pub fn parallel(
    concurrency: usize,
    jobs: impl IntoIterator<Item = JobRef>,
) -> Events {
    parallel_with_token(CancelToken::new(), concurrency, jobs)
}

/// Identical to [`parallel`], but accepts a [`CancelToken`].
pub fn parallel_with_token(
    token: CancelToken,
    concurrency: usize,
    jobs: impl IntoIterator<Item = JobRef>,
) -> Events {
    spawn_run(token, jobs.into_iter().collect(), None, concurrency, false)
}

/// Start an engine run and return its event stream.
///
/// Every job is queued upfront, in list order, before any starts, so a
/// consumer can learn the full planned work first. Strategy is selected by
/// `concurrency`: `1` runs a series, anything between `1` and the job count
/// runs a bounded worker pool, and everything else starts all jobs at once.
///
/// # Panics
///
/// `halt_on_error` may be true only when `concurrency == 1`; any other
/// combination is a contract violation and panics before any event is
/// emitted.
pub(crate) fn spawn_run(
    token: CancelToken,
    jobs: Vec<JobRef>,
    parent: Option<JobRef>,
    concurrency: usize,
    halt_on_error: bool,
) -> Events {
    assert!(
        concurrency == 1 || !halt_on_error,
        "halt_on_error must not be true unless concurrency is 1"
    );
    let (tx, events) = Events::channel();
    let run_id = RunId::new();
    let span = tracing::debug_span!(
        "weir.run",
        run_id = %run_id,
        jobs = jobs.len(),
        concurrency,
    );
    tokio::spawn(
        async move {
            for job in &jobs {
                let queued = Event::Queued {
                    job: job.clone(),
                    parent: parent.clone(),
                };
                if tx.send(queued).await.is_err() {
                    trace!("stream dropped before start; abandoning run");
                    return;
                }
            }
            let runner = Runner {
                token,
                parent,
                events: tx,
            };
            if concurrency == 1 {
                runner.series(&jobs, halt_on_error).await;
            } else if concurrency > 1 && concurrency < jobs.len() {
                runner.pooled(jobs, concurrency).await;
            } else {
                runner.unbounded(jobs).await;
            }
            // Dropping the sender closes the stream.
        }
        .instrument(span),
    );
    events
}

#[derive(Clone)]
struct Runner {
    token: CancelToken,
    parent: Option<JobRef>,
    events: mpsc::Sender<Event>,
}

impl Runner {
    async fn emit(&self, event: Event) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Run a single job to completion: `Started`, the job's own work with a
    /// fresh [`Context`], then `Finished` carrying its error as data.
    async fn one(&self, job: &JobRef) -> Option<JobError> {
        if !self.emit(Event::Started { job: job.clone() }).await {
            // Nobody is listening; the job's work is abandoned unstarted.
            return None;
        }
        let ctx = Context::new(
            self.token.clone(),
            self.events.clone(),
            job.clone(),
            self.parent.clone(),
        );
        let error = match job.run(&ctx).await {
            Ok(()) => None,
            Err(err) => Some(JobError::new(err)),
        };
        if let Some(err) = &error {
            debug!(job = ?job.id(), error = %err, "job failed");
        }
        self.emit(Event::Finished {
            job: job.clone(),
            error: error.clone(),
        })
        .await;
        error
    }

    /// Series: one job at a time, in order, checking the token before each.
    /// Jobs skipped by cancellation or halt-on-error stay queued-only.
    async fn series(&self, jobs: &[JobRef], halt_on_error: bool) {
        for job in jobs {
            if self.token.is_cancelled() {
                debug!("run cancelled; remaining jobs stay queued");
                return;
            }
            if self.events.is_closed() {
                return;
            }
            if self.one(job).await.is_some() && halt_on_error {
                return;
            }
        }
    }

    /// Unbounded parallel: start everything at once and wait for all of it.
    /// The token is not checked between starts; cooperative cancellation of
    /// an in-flight job is the job's own business.
    async fn unbounded(&self, jobs: Vec<JobRef>) {
        let mut tasks = JoinSet::new();
        for job in jobs {
            let runner = self.clone();
            tasks.spawn(async move {
                runner.one(&job).await;
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Bounded pool: exactly `concurrency` workers pull jobs from a shared
    /// FIFO feed. Feeding stops early once the token is set, leaving the
    /// rest queued-only; each worker runs its job to completion before
    /// pulling the next.
    async fn pooled(&self, jobs: Vec<JobRef>, concurrency: usize) {
        let (feed, pull) = mpsc::channel::<JobRef>(1);
        let pull = Arc::new(Mutex::new(pull));
        let mut workers = JoinSet::new();
        for worker in 0..concurrency {
            let runner = self.clone();
            let pull = Arc::clone(&pull);
            workers.spawn(async move {
                trace!(worker, "pool worker started");
                loop {
                    // The queue lock must be released before the job runs.
                    let job = pull.lock().await.recv().await;
                    match job {
                        Some(job) => {
                            runner.one(&job).await;
                        }
                        None => break,
                    }
                }
            });
        }
        for job in jobs {
            if self.token.is_cancelled() {
                debug!("run cancelled; remaining jobs stay queued");
                break;
            }
            if feed.send(job).await.is_err() {
                break;
            }
        }
        drop(feed);
        while workers.join_next().await.is_some() {}
    }
}
