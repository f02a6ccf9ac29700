use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::context::Context;
use crate::error::JobError;
use crate::event::Event;
use crate::job::{Job, JobId, JobRef};
use crate::tree::TreeNode;

/// Creates a [`TreeNode`] under the given binding node for every descendant
/// job spawned by the given job, and provides them through
/// [`node`](TreeBinding::node).
///
/// The binding implements [`Job`] and can be run like any other job. Its
/// job→node map grows monotonically during a run: each `Queued` event whose
/// parent already has a node gets a fresh child node; a job queued under an
/// unknown parent is not tracked and its events are ignored. Inserts can
/// race with lookups from other workers, so the map sits behind a mutex.
pub struct TreeBinding {
    job: JobRef,
    nodes: Mutex<HashMap<JobId, Arc<dyn TreeNode>>>,
}

impl TreeBinding {
    /// Create a binding between `job` and the display node `node`.
    pub fn new(job: JobRef, node: Arc<dyn TreeNode>) -> Self {
        let nodes = HashMap::from([(job.id(), node)]);
        Self {
            job,
            nodes: Mutex::new(nodes),
        }
    }

    /// The bound job.
    pub fn job(&self) -> &JobRef {
        &self.job
    }

    /// The node for the given job, if the job has already been queued as
    /// the binding's job or one of its descendants.
    pub fn node(&self, job: &JobRef) -> Option<Arc<dyn TreeNode>> {
        self.nodes.lock().get(&job.id()).cloned()
    }
}

#[async_trait]
impl Job for TreeBinding {
    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let mut events = ctx.run([self.job.clone()]);
        let mut failure: Option<JobError> = None;
        while let Some(event) = events.next().await {
            match &event {
                Event::Queued { job, parent } => {
                    let parent_node =
                        parent.as_ref().and_then(|parent| self.node(parent));
                    if let Some(parent_node) = parent_node {
                        let mut nodes = self.nodes.lock();
                        nodes.insert(job.id(), parent_node.add_child());
                    }
                }
                Event::Finished {
                    error: Some(error), ..
                } => {
                    failure = Some(error.clone());
                }
                _ => {}
            }
        }
        match failure {
            Some(error) => Err(error.into_anyhow()),
            None => Ok(()),
        }
    }
}
