use std::sync::Arc;

use crate::event::Event;

/// Transforms an event into a description, to be displayed by a presenter.
///
/// Returning an empty string suppresses output for that event entirely: the
/// text presenter skips the line and its layout bookkeeping, and the tree
/// presenter still pushes the empty text to the node.
pub type Formatter = Arc<dyn Fn(&Event) -> String + Send + Sync>;

/// Wrap a closure as a shared [`Formatter`].
pub fn formatter<F>(f: F) -> Formatter
where
    F: Fn(&Event) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}
