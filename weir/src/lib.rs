//! Weir - job grouping and event streaming.
//!
//! A foundational crate for composing units of work into sequences and
//! bounded-concurrency groups, running them, and observing a strictly
//! ordered stream of lifecycle events that consumers use to render
//! progress and aggregate success or failure.
//!
//! # Core Concepts
//!
//! - **Job**: The fundamental unit of work. Anything implementing the
//!   single-operation [`Job`] trait qualifies; plain async functions adapt
//!   via [`job_fn`] and [`job_fn_ctx`], and [`Sequence`] composes jobs into
//!   an ordered, halt-on-error group.
//!
//! - **Events**: Each engine run produces an [`Events`] stream. For every
//!   job, events always occur in the following order:
//!
//!   ```text
//!   Queued
//!   Started
//!   Progressed (zero or more)
//!   Finished
//!   ```
//!
//!   If a job spawns sub-jobs through its [`Context`], their events arrive
//!   between its own `Started` and `Finished`.
//!
//! - **Engine**: The entrypoints [`run`], [`run_with_token`], [`parallel`],
//!   and [`parallel_with_token`] select between three strategies by
//!   concurrency level: strict series, bounded worker pool, or unbounded
//!   parallel.
//!
//! - **Presenters**: [`TextPresenter`] renders the stream as an indented,
//!   column-aligned report; [`TreePresenter`] mirrors it into an external
//!   live tree via the [`TreeNode`] contract.
//!
//! # Example
//!
//! ```ignore
//! use weir::{job_fn, run, Sequence};
//!
//! let fetch = job_fn(|| async { Ok(()) });
//! let build = job_fn(|| async { Ok(()) });
//! run([fetch, build]).wait().await?;
//! ```

/// Cancellation tokens shared by a run and its nested sub-runs.
///
/// The `cancel` module provides [`CancelToken`] for cooperative
/// cancellation and [`Cancelled`], the error value reporting it.
pub mod cancel;

/// The run-scoped handle passed to each executing job.
///
/// The `context` module defines [`Context`]: cancellation inspection,
/// progress reporting, and sub-job spawning with event delegation to the
/// enclosing run.
pub mod context;

/// Cloneable job error carried by `Finished` events.
pub mod error;

/// Lifecycle events and the stream they arrive on.
///
/// The `event` module defines [`Event`], the [`Events`] stream, and its
/// last-write-wins [`wait`](Events::wait) aggregation.
pub mod event;

/// The formatter contract consumed by presenters.
pub mod format;

/// Core job abstractions: the [`Job`] trait, the identity-keyed [`JobRef`]
/// handle, and function adapters.
pub mod job;

/// The execution engine and its three scheduling strategies.
pub mod run;

/// An ordered, halt-on-error job group that is itself a job.
pub mod sequence;

/// ANSI-aware text measurement used for column layout.
pub mod style;

/// Indented, column-aligned text rendering of an event stream.
pub mod text_presenter;

/// The external live-tree display contract.
pub mod tree;

/// Incremental job-to-node mapping over a live tree.
pub mod tree_binding;

/// Live tree rendering of an event stream.
pub mod tree_presenter;

pub use cancel::{CancelToken, Cancelled};
pub use context::Context;
pub use error::JobError;
pub use event::{Event, Events, Payload};
pub use format::{formatter, Formatter};
pub use job::{job_fn, job_fn_ctx, Job, JobId, JobRef};
pub use run::{parallel, parallel_with_token, run, run_with_token, RunId};
pub use sequence::Sequence;
pub use text_presenter::{TextPresenter, TextPresenterConfig};
pub use tree::TreeNode;
pub use tree_binding::TreeBinding;
pub use tree_presenter::TreePresenter;

pub use async_trait::async_trait;
