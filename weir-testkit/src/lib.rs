//! Test support for weir.
//!
//! Provides canned job implementations with recoverable names, an event
//! recorder, an in-memory [`TreeNode`](weir::TreeNode) implementation, and
//! a shared writer for capturing presenter output.

pub mod job;
pub mod record;
pub mod tree;
pub mod writer;

pub use job::{
    name_formatter, name_formatter_with_heading, FailingJob, NamedJob,
    SlowJob,
};
pub use record::{drain, events_for};
pub use tree::MemoryNode;
pub use writer::SharedWriter;
