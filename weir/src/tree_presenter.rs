use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::JobError;
use crate::event::Event;
use crate::format::Formatter;
use crate::job::{Job, JobRef};
use crate::tree::TreeNode;
use crate::tree_binding::TreeBinding;

/// Wraps a job and displays each of its descendants in a node of a live
/// tree, re-rendering the node's text on every event of that job.
pub struct TreePresenter {
    formatter: Formatter,
    tree: Arc<TreeBinding>,
}

impl TreePresenter {
    /// Create a presenter binding `job` to the display node `node`, with
    /// node text from `formatter`.
    pub fn new(
        job: JobRef,
        node: Arc<dyn TreeNode>,
        formatter: Formatter,
    ) -> Self {
        Self {
            formatter,
            tree: Arc::new(TreeBinding::new(job, node)),
        }
    }

    /// The underlying binding, for node lookups.
    pub fn binding(&self) -> &TreeBinding {
        &self.tree
    }

    /// Wrap the presenter as a job handle.
    pub fn into_job(self) -> JobRef {
        JobRef::new(self)
    }
}

#[async_trait]
impl Job for TreePresenter {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let binding = JobRef::from(Arc::clone(&self.tree));
        let mut events = ctx.run([binding]);
        let mut failure: Option<JobError> = None;
        while let Some(event) = events.next().await {
            if let Some(node) = self.tree.node(event.job()) {
                node.update(&(self.formatter)(&event));
            }
            if let Event::Finished {
                error: Some(error), ..
            } = &event
            {
                failure = Some(error.clone());
            }
        }
        match failure {
            Some(error) => Err(error.into_anyhow()),
            None => Ok(()),
        }
    }
}
