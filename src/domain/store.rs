use std::collections::{HashMap, HashSet};

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{InsertMode, Node, NodeId, Payload, Record};
use crate::domain::error::{DomainError, TreeResult};

/// Arena-backed owner of all node records.
///
/// The single source of truth for "does id X exist" and "what is its
/// payload". Relations are never stored here; they are derived by the
/// relation builder and refer back to nodes by id.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    /// Arena storage for all nodes
    arena: Arena<Node>,
    /// Node id to arena slot
    index: HashMap<NodeId, Index>,
    /// Ids that were removed and may not come back
    retired: HashSet<NodeId>,
    /// Next natural-order sequence number
    seq: u64,
    /// Highest id ever stored, for id allocation
    high_water: u64,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `record`, replacing an existing node with the same id
    /// unless `mode` is strict. A replaced node keeps its natural position.
    /// Parent existence is not checked here.
    #[instrument(level = "trace", skip(self, record), fields(id = %record.id))]
    pub fn upsert(&mut self, record: Record, mode: InsertMode) -> TreeResult<()> {
        let id = record.id;
        if id.is_root() {
            return Err(DomainError::ReservedId(id));
        }
        if self.retired.contains(&id) {
            return Err(DomainError::Retired(id));
        }

        if let Some(&idx) = self.index.get(&id) {
            if mode == InsertMode::Strict {
                return Err(DomainError::DuplicateId(id));
            }
            if let Some(node) = self.arena.get_mut(idx) {
                node.parent_id = record.parent_id;
                node.prev_id = record.prev_id;
                node.payload = record.payload;
            }
            return Ok(());
        }

        let node = Node {
            id,
            parent_id: record.parent_id,
            prev_id: record.prev_id,
            payload: record.payload,
            seq: self.seq,
        };
        self.seq += 1;
        self.high_water = self.high_water.max(id.get());
        let idx = self.arena.insert(node);
        self.index.insert(id, idx);
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> TreeResult<&Node> {
        self.index
            .get(&id)
            .and_then(|&idx| self.arena.get(idx))
            .ok_or(DomainError::NotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        match self.index.get(&id) {
            Some(&idx) => self.arena.get_mut(idx).ok_or(DomainError::NotFound(id)),
            None => Err(DomainError::NotFound(id)),
        }
    }

    /// Deletes a single record and retires its id. Does not cascade.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, id: NodeId) -> TreeResult<Node> {
        let idx = self.index.remove(&id).ok_or(DomainError::NotFound(id))?;
        self.retired.insert(id);
        self.arena.remove(idx).ok_or(DomainError::NotFound(id))
    }

    /// All nodes, in no particular order. Every call starts a new traversal.
    pub fn all(&self) -> impl Iterator<Item = &Node> + '_ {
        self.arena.iter().map(|(_, node)| node)
    }

    /// All nodes in natural (insertion) order.
    pub fn natural_order(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.all().collect();
        nodes.sort_by_key(|node| node.seq);
        nodes
    }

    /// Exports the store as records in natural order.
    pub fn records(&self) -> Vec<Record> {
        self.natural_order().into_iter().map(Node::to_record).collect()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_retired(&self, id: NodeId) -> bool {
        self.retired.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Allocates an id above every id this store has seen.
    pub fn next_id(&self) -> NodeId {
        NodeId::new(self.high_water + 1)
    }

    /// The sibling whose predecessor is `prev` below `parent`.
    pub(crate) fn successor(&self, parent: NodeId, prev: NodeId) -> Option<NodeId> {
        self.all()
            .find(|node| node.parent_id == parent && node.prev_id == Some(prev))
            .map(|node| node.id)
    }

    /// Tail of the sibling chain below `parent`, `NodeId::ROOT` when the
    /// group is empty. Nodes without an ordering key are not part of the chain.
    pub(crate) fn last_child(&self, parent: NodeId) -> NodeId {
        let followed: HashSet<NodeId> = self
            .all()
            .filter(|node| node.parent_id == parent)
            .filter_map(|node| node.prev_id)
            .collect();
        self.natural_order()
            .into_iter()
            .filter(|node| node.parent_id == parent && node.prev_id.is_some())
            .map(|node| node.id)
            .filter(|id| !followed.contains(id))
            .last()
            .unwrap_or(NodeId::ROOT)
    }

    pub(crate) fn set_prev(&mut self, id: NodeId, prev: Option<NodeId>) -> TreeResult<()> {
        self.get_mut(id)?.prev_id = prev;
        Ok(())
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) -> TreeResult<()> {
        self.get_mut(id)?.parent_id = parent;
        Ok(())
    }

    pub(crate) fn set_payload(&mut self, id: NodeId, payload: Payload) -> TreeResult<()> {
        self.get_mut(id)?.payload = payload;
        Ok(())
    }
}
