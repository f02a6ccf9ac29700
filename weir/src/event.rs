use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::JobError;
use crate::job::JobRef;

/// Opaque payload attached to a `Progressed` event by the job itself.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// One lifecycle transition of one job.
///
/// For every job that is run, events occur in the order `Queued`,
/// `Started`, zero or more `Progressed`, `Finished`, and `Finished` occurs
/// exactly once. Events from a job's sub-jobs occur strictly between that
/// job's own `Started` and `Finished`.
#[derive(Clone)]
pub enum Event {
    /// The job was queued. When multiple jobs are queued by one run, their
    /// `Queued` events occur in list order, all before any job starts.
    Queued {
        /// The job that was queued.
        job: JobRef,
        /// The job whose context queued it, absent for root-level runs.
        parent: Option<JobRef>,
    },
    /// The job started.
    Started {
        /// The job that started.
        job: JobRef,
    },
    /// The job reported progress via its context.
    Progressed {
        /// The job that progressed.
        job: JobRef,
        /// The job-specific payload passed to
        /// [`Context::progress`](crate::Context::progress).
        payload: Payload,
    },
    /// The job finished.
    Finished {
        /// The job that finished.
        job: JobRef,
        /// The error returned by the job, if it failed.
        error: Option<JobError>,
    },
}

impl Event {
    /// The job this event occurred for.
    pub fn job(&self) -> &JobRef {
        match self {
            Event::Queued { job, .. }
            | Event::Started { job }
            | Event::Progressed { job, .. }
            | Event::Finished { job, .. } => job,
        }
    }

    /// Downcast a `Progressed` payload to a concrete type.
    pub fn progress_payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            Event::Progressed { payload, .. } => payload.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Queued { job, parent } => f
                .debug_struct("Queued")
                .field("job", job)
                .field("parent", parent)
                .finish(),
            Event::Started { job } => {
                f.debug_struct("Started").field("job", job).finish()
            }
            Event::Progressed { job, .. } => f
                .debug_struct("Progressed")
                .field("job", job)
                .finish_non_exhaustive(),
            Event::Finished { job, error } => f
                .debug_struct("Finished")
                .field("job", job)
                .field("error", error)
                .finish(),
        }
    }
}

/// Ordered, single-pass stream of [`Event`]s produced by one engine run.
///
/// The stream is closed exactly once, after the producing run completes.
/// Draining is destructive; events are not replayable.
pub struct Events {
    rx: mpsc::Receiver<Event>,
}

impl Events {
    /// Create a stream and the sender that feeds it. The channel holds one
    /// event at a time, so producers hand events over rather than buffering
    /// ahead of the consumer.
    pub(crate) fn channel() -> (mpsc::Sender<Event>, Events) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Events { rx })
    }

    /// Receive the next event, or `None` once the run has completed and the
    /// stream is closed.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Drain the stream, returning the error of the temporally last
    /// `Finished` event that carried one.
    ///
    /// This is last-write-wins aggregation: with jobs running concurrently,
    /// a later failure replaces an earlier one, and completion order is not
    /// deterministic. Callers that need first-error semantics (or every
    /// error) should walk the `Finished` events themselves.
    ///
    /// Combine with [`run`](crate::run) for simple halt-on-error sequences:
    ///
    /// ```ignore
    /// run([first, second, third]).wait().await?;
    /// ```
    pub async fn wait(mut self) -> Result<(), JobError> {
        let mut failure = None;
        while let Some(event) = self.next().await {
            if let Event::Finished {
                error: Some(error), ..
            } = event
            {
                failure = Some(error);
            }
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Stream for Events {
    type Item = Event;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Event>> {
        Pin::into_inner(self).rx.poll_recv(cx)
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events").finish_non_exhaustive()
    }
}
