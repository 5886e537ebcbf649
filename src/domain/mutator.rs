//! Structural edits on a private copy of the store.
//!
//! A mutator starts from a published snapshot, edits a cloned store and
//! hands it to the relation builder on `commit`. Nothing is visible to
//! readers until the caller publishes the resulting snapshot.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::domain::builder::RelationBuilder;
use crate::domain::entities::{InsertMode, NestedNode, NodeId, Payload, Record};
use crate::domain::error::{DomainError, TreeResult};
use crate::domain::navigator::Snapshot;
use crate::domain::store::NodeStore;

pub struct TreeMutator<'a> {
    current: &'a Snapshot,
    store: NodeStore,
}

impl<'a> TreeMutator<'a> {
    pub fn new(current: &'a Snapshot) -> Self {
        Self {
            current,
            store: current.store().clone(),
        }
    }

    /// Creates a node below `parent`, directly after `prev`
    /// (`NodeId::ROOT` puts it first).
    #[instrument(level = "debug", skip(self, payload))]
    pub fn add(&mut self, payload: Payload, parent: NodeId, prev: NodeId) -> TreeResult<NodeId> {
        let id = self.store.next_id();
        if !parent.is_root() && !self.store.contains(parent) {
            return Err(DomainError::ParentNotFound { child: id, parent });
        }
        self.check_position(parent, prev)?;

        let successor = self.store.successor(parent, prev);
        let record = Record {
            id,
            parent_id: parent,
            prev_id: Some(prev),
            payload,
        };
        self.store.upsert(record, InsertMode::Strict)?;
        if let Some(next) = successor {
            self.store.set_prev(next, Some(id))?;
        }
        Ok(id)
    }

    /// Removes `id`, and its descendants when `recursive`. Returns the
    /// removed ids in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn remove(&mut self, id: NodeId, recursive: bool) -> TreeResult<Vec<NodeId>> {
        let node = self.store.get(id)?;
        let (parent, prev) = (node.parent_id, node.prev_id);

        let doomed = self.descendants(id);
        if doomed.len() > 1 && !recursive {
            return Err(DomainError::HasChildren(id));
        }

        if let Some(next) = self.store.successor(parent, id) {
            self.store.set_prev(next, prev)?;
        }
        for &victim in &doomed {
            self.store.remove(victim)?;
        }
        debug!(removed = doomed.len(), "subtree removed");
        Ok(doomed)
    }

    /// Moves `id` with its subtree below `new_parent`, after `new_prev`.
    ///
    /// A non-root `new_prev` with a root `new_parent` takes the parent
    /// from `new_prev`. Returns the parent the node ended up under.
    #[instrument(level = "debug", skip(self))]
    pub fn relocate(&mut self, id: NodeId, new_parent: NodeId, new_prev: NodeId) -> TreeResult<NodeId> {
        let node = self.store.get(id)?;
        let (old_parent, old_prev) = (node.parent_id, node.prev_id);

        let parent = if new_prev.is_root() {
            new_parent
        } else {
            if new_prev == id {
                return Err(DomainError::InconsistentOrder {
                    parent: new_parent,
                    reason: format!("node {id} cannot follow itself"),
                });
            }
            let prev_parent = self.store.get(new_prev)?.parent_id;
            if !new_parent.is_root() && prev_parent != new_parent {
                return Err(DomainError::InconsistentOrder {
                    parent: new_parent,
                    reason: format!("predecessor {new_prev} is not a child of {new_parent}"),
                });
            }
            prev_parent
        };

        if parent == id {
            return Err(DomainError::InvalidParent { id, parent });
        }
        if !parent.is_root() && !self.store.contains(parent) {
            return Err(DomainError::ParentNotFound { child: id, parent });
        }
        if self.descendants(id).contains(&parent) {
            return Err(DomainError::InvalidParent { id, parent });
        }

        // detach
        if let Some(next) = self.store.successor(old_parent, id) {
            self.store.set_prev(next, old_prev)?;
        }
        self.store.set_prev(id, None)?;

        // attach
        let successor = self.store.successor(parent, new_prev);
        self.store.set_parent(id, parent)?;
        self.store.set_prev(id, Some(new_prev))?;
        if let Some(next) = successor {
            self.store.set_prev(next, Some(id))?;
        }
        Ok(parent)
    }

    pub fn update(&mut self, id: NodeId, payload: Payload) -> TreeResult<()> {
        self.store.set_payload(id, payload)
    }

    /// Appends a nested payload tree below `parent`. Returns the new ids
    /// in pre-order.
    pub fn add_subtree(&mut self, nodes: &[NestedNode], parent: NodeId) -> TreeResult<Vec<NodeId>> {
        self.check_parent(parent, self.store.next_id())?;

        let mut tails = HashMap::from([(parent, self.store.last_child(parent))]);
        let mut added = Vec::new();
        let mut stack: Vec<(&NestedNode, NodeId)> = nodes.iter().rev().map(|nested| (nested, parent)).collect();
        while let Some((nested, under)) = stack.pop() {
            let id = self.append(nested.payload.clone(), under, &mut tails)?;
            added.push(id);
            stack.extend(nested.children.iter().rev().map(|child| (child, id)));
        }
        debug!(count = added.len(), %parent, "subtree added");
        Ok(added)
    }

    /// Duplicates the subtree of `src` as the last child of `dest`, with
    /// fresh ids. Returns the new ids in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn copy(&mut self, src: NodeId, dest: NodeId) -> TreeResult<Vec<NodeId>> {
        self.check_parent(dest, src)?;
        let current = self.current;
        let originals = current.subtree_ids(src)?;

        let mut tails = HashMap::from([(dest, self.store.last_child(dest))]);
        let mut copies: HashMap<NodeId, NodeId> = HashMap::with_capacity(originals.len());
        let mut added = Vec::with_capacity(originals.len());
        for original in originals {
            let node = current.get(original)?;
            let under = if original == src {
                dest
            } else {
                copies
                    .get(&node.parent_id)
                    .copied()
                    .ok_or(DomainError::NotFound(node.parent_id))?
            };
            let id = self.append(node.payload.clone(), under, &mut tails)?;
            copies.insert(original, id);
            added.push(id);
        }
        Ok(added)
    }

    /// Rebuilds relations over the edited store.
    pub fn commit(self) -> TreeResult<Snapshot> {
        RelationBuilder::new(self.store).build()
    }

    fn check_parent(&self, parent: NodeId, child: NodeId) -> TreeResult<()> {
        if parent.is_root() || self.store.contains(parent) {
            Ok(())
        } else {
            Err(DomainError::ParentNotFound { child, parent })
        }
    }

    /// Stores a fresh node after the current tail of `parent` and makes
    /// it the new tail. Nothing follows a tail, so no sibling is relinked.
    fn append(
        &mut self,
        payload: Payload,
        parent: NodeId,
        tails: &mut HashMap<NodeId, NodeId>,
    ) -> TreeResult<NodeId> {
        let id = self.store.next_id();
        let prev = tails.get(&parent).copied().unwrap_or(NodeId::ROOT);
        self.store.upsert(
            Record {
                id,
                parent_id: parent,
                prev_id: Some(prev),
                payload,
            },
            InsertMode::Strict,
        )?;
        tails.insert(parent, id);
        Ok(id)
    }

    fn check_position(&self, parent: NodeId, prev: NodeId) -> TreeResult<()> {
        if prev.is_root() {
            return Ok(());
        }
        match self.store.get(prev) {
            Ok(node) if node.parent_id == parent => Ok(()),
            Ok(_) => Err(DomainError::InconsistentOrder {
                parent,
                reason: format!("predecessor {prev} is not a child of {parent}"),
            }),
            Err(_) => Err(DomainError::InconsistentOrder {
                parent,
                reason: format!("predecessor {prev} does not exist"),
            }),
        }
    }

    /// `id` and everything below it in the edited store, `id` first.
    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in self.store.natural_order() {
            children.entry(node.parent_id).or_default().push(node.id);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            found.push(current);
            if let Some(kids) = children.get(&current) {
                stack.extend(kids.iter().rev());
            }
        }
        found
    }
}
