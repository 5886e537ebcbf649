//! ASCII rendering of trees via termtree.

use std::collections::HashMap;

use termtree::Tree;
use tracing::instrument;

use crate::domain::{DomainError, NodeId, Snapshot, TreeResult};

pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> Tree<String>;
}

/// Renders every id of `preorder` bottom-up, so each entry's leaves are
/// finished before the entry itself. Returns the trees not claimed by a
/// parent in `preorder`.
fn build_trees(snapshot: &Snapshot, preorder: &[NodeId]) -> HashMap<NodeId, Tree<String>> {
    let mut built: HashMap<NodeId, Tree<String>> = HashMap::with_capacity(preorder.len());
    for &id in preorder.iter().rev() {
        let label = match snapshot.get(id) {
            Ok(node) => node.to_string(),
            Err(_) => format!("({id})"),
        };
        let leaves: Vec<_> = snapshot
            .relations(id)
            .map(|rel| rel.children.iter().filter_map(|child| built.remove(child)).collect())
            .unwrap_or_default();
        built.insert(id, Tree::new(label).with_leaves(leaves));
    }
    built
}

impl TreeNodeConvert for Snapshot {
    /// The whole forest below a synthetic `.` root.
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        if self.is_empty() {
            return Tree::new("Empty tree".to_string());
        }
        let preorder: Vec<NodeId> = match self.nodes(None, 0) {
            Ok(nodes) => nodes.map(|node| node.id).collect(),
            Err(_) => Vec::new(),
        };
        let mut built = build_trees(self, &preorder);
        let leaves: Vec<_> = self
            .graph()
            .roots()
            .iter()
            .filter_map(|root| built.remove(root))
            .collect();
        Tree::new(".".to_string()).with_leaves(leaves)
    }
}

/// Renders the subtree rooted at `id`.
pub fn subtree_to_tree_string(snapshot: &Snapshot, id: NodeId) -> TreeResult<Tree<String>> {
    let preorder = snapshot.subtree_ids(id)?;
    build_trees(snapshot, &preorder)
        .remove(&id)
        .ok_or(DomainError::NotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Tree as MemTree;
    use crate::domain::{Payload, Record, TreeOptions};

    #[test]
    fn given_abc_tree_when_rendering_then_lists_children_below_parent() {
        let tree = MemTree::from_records(
            vec![
                Record::new(1, 0, Payload::named("A")),
                Record::new(2, 1, Payload::named("B")),
                Record::new(3, 1, Payload::named("C")),
            ],
            TreeOptions::default(),
        )
        .unwrap();

        let rendered = tree.navigator().to_tree_string().to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], ".");
        assert!(lines[1].ends_with("A (1)"));
        assert!(lines[2].ends_with("B (2)"));
        assert!(lines[3].ends_with("C (3)"));

        let sub = subtree_to_tree_string(tree.navigator(), NodeId::new(1)).unwrap();
        assert_eq!(sub.to_string().lines().next(), Some("A (1)"));
    }
}
