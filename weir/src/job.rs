use std::any::Any;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;

/// A single unit of work.
///
/// Anything with a `run` operation qualifies; there is no richer hierarchy.
/// Errors are returned, not thrown past the engine: whatever `run` yields
/// ends up as data in the job's `Finished` event.
#[async_trait]
pub trait Job: Any + Send + Sync {
    /// Perform the work. `ctx` carries cancellation status, progress
    /// reporting, and the ability to spawn sub-jobs.
    async fn run(&self, ctx: &Context) -> anyhow::Result<()>;
}

/// Shared handle to a [`Job`] with identity semantics.
///
/// Two handles are equal only when they point at the same job value; two
/// jobs with identical behavior are still distinct entities and produce
/// distinct events. Cloning is cheap and preserves identity, so the same
/// job can be queued in several runs, each producing its own event
/// subsequence.
#[derive(Clone)]
pub struct JobRef(Arc<dyn Job>);

impl JobRef {
    /// Wrap a job value.
    pub fn new(job: impl Job) -> Self {
        Self(Arc::new(job))
    }

    /// Wrap an already-shared job value, preserving its identity.
    pub fn from_arc(job: Arc<dyn Job>) -> Self {
        Self(job)
    }

    /// The job's opaque identity, usable as a map key.
    pub fn id(&self) -> JobId {
        JobId(Arc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Recover the concrete job type, e.g. from inside a formatter.
    pub fn downcast_ref<T: Job>(&self) -> Option<&T> {
        let any: &dyn Any = self.0.as_ref();
        any.downcast_ref::<T>()
    }

    pub(crate) async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        self.0.run(ctx).await
    }
}

impl PartialEq for JobRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for JobRef {}

impl Hash for JobRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JobRef").field(&self.id()).finish()
    }
}

impl<T: Job> From<Arc<T>> for JobRef {
    fn from(job: Arc<T>) -> Self {
        Self(job)
    }
}

/// Identity of a job, derived from its allocation.
///
/// Stable for the lifetime of the job value and all clones of its
/// [`JobRef`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct JobId(usize);

struct FnJob<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }
}

/// Adapt a context-taking async function to a [`Job`].
pub fn job_fn_ctx<F, Fut>(f: F) -> JobRef
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    JobRef::new(FnJob { f })
}

/// Adapt a zero-argument async function to a [`Job`].
pub fn job_fn<F, Fut>(f: F) -> JobRef
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    job_fn_ctx(move |_ctx| f())
}
