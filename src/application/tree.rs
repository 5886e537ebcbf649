//! Tree façade: owns the published snapshot and serialises edits.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::application::source::Source;
use crate::application::ApplicationResult;
use crate::domain::{
    DomainError, InsertMode, NestedNode, NodeId, NodeState, NodeStore, Payload, Record,
    RelationBuilder, Snapshot, TreeMutator, TreeOptions, TreeResult,
};

/// Outcome of a batch move. Successful moves stay applied even when
/// other ids in the batch failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub moved: Vec<NodeId>,
    pub failed: Vec<(NodeId, DomainError)>,
}

impl MoveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// An in-memory tree.
///
/// Readers get immutable snapshots; every edit builds a new snapshot from
/// a copy of the store and replaces the current one only on success.
#[derive(Debug, Default)]
pub struct Tree {
    snapshot: Arc<Snapshot>,
    /// Records staged since the last rebuild
    staged: Option<NodeStore>,
    options: TreeOptions,
}

impl Tree {
    pub fn new(options: TreeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Builds a tree from records in natural order.
    pub fn from_records(records: Vec<Record>, options: TreeOptions) -> TreeResult<Self> {
        let mut tree = Self::new(options);
        tree.setup_records(records)?;
        Ok(tree)
    }

    /// Replaces the whole tree with the records read from `source`.
    #[instrument(level = "debug", skip(self, source), fields(kind = %source.kind()))]
    pub fn setup(&mut self, source: &mut dyn Source) -> ApplicationResult<()> {
        let records = source.setup()?;
        self.setup_records(records)?;
        Ok(())
    }

    /// Replaces the whole tree with `records`. Duplicate ids are rejected.
    pub fn setup_records(&mut self, records: Vec<Record>) -> TreeResult<()> {
        let mut store = NodeStore::new();
        for record in records {
            store.upsert(record, InsertMode::Strict)?;
        }
        let next = self.build("setup", store)?;
        self.staged = None;
        self.snapshot = Arc::new(next);
        Ok(())
    }

    /// Stages a record for the next rebuild.
    ///
    /// A record without `prev_id` keeps its position when it already sits
    /// below the same parent and is appended otherwise. A record with
    /// `prev_id` is inserted directly after that sibling.
    #[instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    pub fn stage(&mut self, mut record: Record, mode: InsertMode) -> TreeResult<()> {
        let mut staged = match &self.staged {
            Some(staged) => staged.clone(),
            None => self.snapshot.store().clone(),
        };
        let id = record.id;

        let existing = staged.get(id).ok().map(|node| (node.parent_id, node.prev_id));
        match existing {
            Some((parent, prev)) if parent == record.parent_id && record.prev_id.is_none() => {
                record.prev_id = prev;
            }
            _ => {
                if let Some((parent, prev)) = existing {
                    // detach
                    if let Some(next) = staged.successor(parent, id) {
                        staged.set_prev(next, prev)?;
                    }
                    staged.set_prev(id, None)?;
                }
                match record.prev_id {
                    None => record.prev_id = Some(staged.last_child(record.parent_id)),
                    Some(prev) => {
                        if let Some(next) = staged.successor(record.parent_id, prev) {
                            staged.set_prev(next, Some(id))?;
                        }
                    }
                }
            }
        }
        staged.upsert(record, mode)?;
        self.staged = Some(staged);
        Ok(())
    }

    /// Derives relations for the staged records and publishes them.
    /// On failure the staged records and the published tree stay as they were.
    pub fn rebuild(&mut self) -> TreeResult<()> {
        let store = match &self.staged {
            Some(staged) => staged.clone(),
            None => self.snapshot.store().clone(),
        };
        let next = self.build("rebuild", store)?;
        self.staged = None;
        self.snapshot = Arc::new(next);
        Ok(())
    }

    /// The current snapshot. Stays valid and unchanged after later edits.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn navigator(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    pub fn set_remove_recursively(&mut self, recursive: bool) {
        self.options.remove_recursively = recursive;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.options.debug = debug;
    }

    /// Lifecycle state of `id`, `None` if the tree never saw it.
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        let store = self.staged.as_ref().unwrap_or(self.snapshot.store());
        if store.is_retired(id) || self.snapshot.store().is_retired(id) {
            Some(NodeState::Removed)
        } else if self.snapshot.is_node(id) && store.contains(id) {
            Some(NodeState::Attached)
        } else if store.contains(id) {
            Some(NodeState::Unattached)
        } else {
            None
        }
    }

    pub fn add(&mut self, payload: Payload, parent: NodeId, prev: NodeId) -> TreeResult<NodeId> {
        self.edit("add", |mutator| mutator.add(payload, parent, prev))
    }

    /// Removes `id`. `recursive` overrides the configured default.
    pub fn remove(&mut self, id: NodeId, recursive: Option<bool>) -> TreeResult<Vec<NodeId>> {
        let recursive = recursive.unwrap_or(self.options.remove_recursively);
        self.edit("remove", |mutator| mutator.remove(id, recursive))
    }

    /// Moves one node. Returns the parent it ended up under.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, new_prev: NodeId) -> TreeResult<NodeId> {
        self.edit("move", |mutator| mutator.relocate(id, new_parent, new_prev))
    }

    /// Moves `ids` one after the other, chaining them in the given order
    /// after `new_prev`. Each move is applied or rejected on its own.
    #[instrument(level = "debug", skip(self))]
    pub fn move_nodes(&mut self, ids: &[NodeId], new_parent: NodeId, new_prev: NodeId) -> TreeResult<MoveReport> {
        self.flush()?;
        let mut report = MoveReport::default();
        let (mut parent, mut prev) = (new_parent, new_prev);
        for &id in ids {
            match self.move_node(id, parent, prev) {
                Ok(landed) => {
                    report.moved.push(id);
                    parent = landed;
                    prev = id;
                }
                Err(e) => {
                    warn!(%id, error = %e, "move rejected");
                    report.failed.push((id, e));
                }
            }
        }
        Ok(report)
    }

    pub fn update(&mut self, id: NodeId, payload: Payload) -> TreeResult<()> {
        self.edit("update", |mutator| mutator.update(id, payload))
    }

    pub fn add_subtree(&mut self, nodes: &[NestedNode], parent: NodeId) -> TreeResult<Vec<NodeId>> {
        self.edit("add_subtree", |mutator| mutator.add_subtree(nodes, parent))
    }

    pub fn copy(&mut self, src: NodeId, dest: NodeId) -> TreeResult<Vec<NodeId>> {
        self.edit("copy", |mutator| mutator.copy(src, dest))
    }

    /// Current records in natural order, with normalised `prev_id` chains.
    pub fn records(&self) -> Vec<Record> {
        self.snapshot.store().records()
    }

    /// Writes the tree into `target` and reloads from there.
    #[instrument(level = "debug", skip(self, target), fields(kind = %target.kind()))]
    pub fn switch_source(&mut self, target: &mut dyn Source) -> ApplicationResult<()> {
        self.flush()?;
        target.store(&self.records())?;
        self.setup(target)
    }

    fn flush(&mut self) -> TreeResult<()> {
        if self.staged.is_some() {
            self.rebuild()?;
        }
        Ok(())
    }

    fn edit<R, F>(&mut self, op: &'static str, f: F) -> TreeResult<R>
    where
        F: FnOnce(&mut TreeMutator<'_>) -> TreeResult<R>,
    {
        self.flush()?;
        let started = Instant::now();
        let (value, next) = {
            let mut mutator = TreeMutator::new(&self.snapshot);
            let value = f(&mut mutator)?;
            (value, mutator.commit()?)
        };
        self.report(op, started, &next);
        self.snapshot = Arc::new(next);
        Ok(value)
    }

    fn build(&self, op: &'static str, store: NodeStore) -> TreeResult<Snapshot> {
        let started = Instant::now();
        let next = RelationBuilder::new(store).build()?;
        self.report(op, started, &next);
        Ok(next)
    }

    fn report(&self, op: &str, started: Instant, snapshot: &Snapshot) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        if self.options.debug {
            info!(op, elapsed_us, nodes = snapshot.len(), depth = snapshot.depth(), "tree rebuilt");
        } else {
            debug!(op, elapsed_us, nodes = snapshot.len(), "tree rebuilt");
        }
    }
}
