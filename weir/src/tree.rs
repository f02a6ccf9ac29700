use std::sync::Arc;

/// A node in an external live-updating tree display.
///
/// The display itself is not part of this crate; presenters only need the
/// two operations below. Implementations must be safe to call from
/// concurrent workers: child creation races with text updates when sibling
/// jobs run in parallel.
pub trait TreeNode: Send + Sync {
    /// Add a new child node under this one.
    fn add_child(&self) -> Arc<dyn TreeNode>;

    /// Replace the node's displayed content. Idempotent; called once per
    /// event of the bound job.
    fn update(&self, text: &str);
}
