use std::sync::Arc;

use parking_lot::Mutex;
use weir::TreeNode;

/// In-memory [`TreeNode`] implementation that records its text and
/// children for assertions.
#[derive(Default)]
pub struct MemoryNode {
    text: Mutex<String>,
    children: Mutex<Vec<Arc<MemoryNode>>>,
}

impl MemoryNode {
    /// Create a detached root node.
    pub fn root() -> Arc<MemoryNode> {
        Arc::new(Self::default())
    }

    /// The node's current text.
    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    /// The node's children, in creation order.
    pub fn children(&self) -> Vec<Arc<MemoryNode>> {
        self.children.lock().clone()
    }

    /// Render the subtree as one indented line per node.
    pub fn render(&self, indent: &str) -> String {
        let mut out = String::new();
        self.render_into(&mut out, indent, 0);
        out
    }

    fn render_into(&self, out: &mut String, indent: &str, depth: usize) {
        for _ in 0..depth {
            out.push_str(indent);
        }
        out.push_str(&self.text());
        out.push('\n');
        for child in self.children() {
            child.render_into(out, indent, depth + 1);
        }
    }
}

impl TreeNode for MemoryNode {
    fn add_child(&self) -> Arc<dyn TreeNode> {
        let child = Arc::new(MemoryNode::default());
        self.children.lock().push(Arc::clone(&child));
        child
    }

    fn update(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}
