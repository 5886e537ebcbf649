//! Read-only queries over a published relation graph.

use std::ops::Range;

use itertools::Itertools;
use tracing::instrument;

use crate::domain::entities::{Node, NodeId, PathLookup};
use crate::domain::error::{DomainError, TreeResult};
use crate::domain::graph::{RelationGraph, Relations, Structure};
use crate::domain::store::NodeStore;

/// Immutable store + relation graph pair.
///
/// Produced by the relation builder and never modified afterwards, so
/// every answer stays valid for the lifetime of the snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    store: NodeStore,
    graph: RelationGraph,
}

impl Snapshot {
    pub(crate) fn new(store: NodeStore, graph: RelationGraph) -> Self {
        Self { store, graph }
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    pub fn structure(&self) -> &Structure {
        self.graph.structure()
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn is_node(&self, id: NodeId) -> bool {
        self.graph.contains(id)
    }

    pub fn get(&self, id: NodeId) -> TreeResult<&Node> {
        self.relations(id)?;
        self.store.get(id)
    }

    pub fn relations(&self, id: NodeId) -> TreeResult<&Relations> {
        self.graph.relations(id).ok_or(DomainError::NotFound(id))
    }

    fn related(&self, id: NodeId, pick: fn(&Relations) -> Option<NodeId>) -> TreeResult<Option<&Node>> {
        match pick(self.relations(id)?) {
            Some(other) => self.store.get(other).map(Some),
            None => Ok(None),
        }
    }

    pub fn parent(&self, id: NodeId) -> TreeResult<Option<&Node>> {
        self.related(id, |rel| rel.parent)
    }

    /// First child only.
    pub fn child(&self, id: NodeId) -> TreeResult<Option<&Node>> {
        self.related(id, |rel| rel.first_child)
    }

    pub fn next(&self, id: NodeId) -> TreeResult<Option<&Node>> {
        self.related(id, |rel| rel.next)
    }

    pub fn previous(&self, id: NodeId) -> TreeResult<Option<&Node>> {
        self.related(id, |rel| rel.previous)
    }

    pub fn level(&self, id: NodeId) -> TreeResult<usize> {
        Ok(self.relations(id)?.level)
    }

    pub fn has_children(&self, id: NodeId) -> TreeResult<bool> {
        Ok(!self.relations(id)?.children.is_empty())
    }

    /// Deepest level in the tree.
    pub fn depth(&self) -> usize {
        self.graph.depth()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph
            .roots()
            .iter()
            .filter_map(move |&id| self.store.get(id).ok())
    }

    pub fn first_root(&self) -> Option<&Node> {
        self.roots().next()
    }

    /// Last child of `parent`, or the last root for `NodeId::ROOT`.
    pub fn last_child(&self, parent: NodeId) -> Option<NodeId> {
        if parent.is_root() {
            return self.graph.roots().last().copied();
        }
        self.graph
            .relations(parent)
            .and_then(|rel| rel.children.last().copied())
    }

    /// Descendants of `id` down to `depth` levels (1 = direct children,
    /// 0 = unlimited), depth-first in sibling order.
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, id: NodeId, depth: usize) -> TreeResult<Vec<&Node>> {
        let level = self.level(id)?;
        let max_level = (depth > 0).then(|| level.saturating_add(depth).saturating_add(1));
        Ok(self
            .nodes_below(id, max_level)?
            .filter(|node| node.id != id)
            .collect())
    }

    /// Children of several ids. Ids without children are left out.
    pub fn children_of(&self, ids: &[NodeId], depth: usize) -> TreeResult<Vec<(NodeId, Vec<&Node>)>> {
        let mut result = Vec::new();
        for &id in ids {
            if self.has_children(id)? {
                result.push((id, self.children(id, depth)?));
            }
        }
        Ok(result)
    }

    /// Ids of `id` and all of its descendants, in pre-order.
    pub fn subtree_ids(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        Ok(self.nodes_below(id, None)?.map(|node| node.id).collect())
    }

    /// Ancestors of `id` from the root level down, ending with `id`.
    pub fn path(&self, id: NodeId) -> TreeResult<Vec<&Node>> {
        Ok(self
            .path_ids(id)?
            .into_iter()
            .filter_map(|step| self.store.get(step).ok())
            .collect())
    }

    fn path_ids(&self, id: NodeId) -> TreeResult<Vec<NodeId>> {
        let mut ids = vec![id];
        let mut cursor = self.relations(id)?;
        while let Some(parent) = cursor.parent {
            ids.push(parent);
            cursor = self.relations(parent)?;
        }
        ids.reverse();
        Ok(ids)
    }

    /// Renders the path of `id` as `field` values joined by `separator`.
    /// Nodes without the field contribute an empty segment.
    pub fn path_string(&self, id: NodeId, field: &str, separator: &str) -> TreeResult<String> {
        Ok(self
            .path(id)?
            .iter()
            .map(|node| node.field(field).unwrap_or_default())
            .join(separator))
    }

    /// Resolves a `/`-separated path of names, starting at the first root.
    pub fn id_by_path(&self, path: &str) -> TreeResult<Option<NodeId>> {
        self.id_by_path_with(path, &PathLookup::default())
    }

    /// Resolves `path` by matching each segment against the siblings of
    /// the current level, then descending into the match.
    ///
    /// Returns `Ok(None)` when a segment matches nothing. Names need not be
    /// unique: the first match in sibling order wins. A node without the
    /// lookup field matches an empty segment, except at the root level
    /// where a leading separator is dropped.
    #[instrument(level = "debug", skip(self))]
    pub fn id_by_path_with(&self, path: &str, lookup: &PathLookup) -> TreeResult<Option<NodeId>> {
        let level_start = match lookup.start {
            None => self.graph.roots().first().copied(),
            Some(start) => self.relations(start)?.first_child,
        };
        let Some(mut cursor) = level_start else {
            return Ok(None);
        };

        let path = path.strip_prefix(lookup.separator.as_str()).unwrap_or(path);
        let segments: Vec<&str> = path.split(lookup.separator.as_str()).collect();
        let last = segments.len() - 1;

        for (pos, segment) in segments.into_iter().enumerate() {
            let mut candidate = Some(cursor);
            let found = loop {
                let Some(id) = candidate else { break None };
                if self.store.get(id)?.field(&lookup.field).unwrap_or_default() == segment {
                    break Some(id);
                }
                candidate = self.relations(id)?.next;
            };
            let Some(found) = found else {
                return Ok(None);
            };
            if pos == last {
                return Ok(Some(found));
            }
            match self.relations(found)?.first_child {
                Some(child) => cursor = child,
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    pub fn node_by_path(&self, path: &str, lookup: &PathLookup) -> TreeResult<Option<&Node>> {
        match self.id_by_path_with(path, lookup)? {
            Some(id) => self.get(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn field(&self, id: NodeId, field: &str) -> TreeResult<Option<&str>> {
        Ok(self.get(id)?.field(field))
    }

    pub fn field_by_path(&self, path: &str, field: &str) -> TreeResult<Option<&str>> {
        match self.node_by_path(path, &PathLookup::default())? {
            Some(node) => Ok(node.field(field)),
            None => Ok(None),
        }
    }

    pub fn fields(&self, ids: &[NodeId], field: &str) -> TreeResult<Vec<Option<&str>>> {
        ids.iter().map(|&id| self.field(id, field)).collect()
    }

    /// Depth-first pre-order over the subtree of `start` (whole forest for
    /// `None`), limited to `depth` levels counted from the start level.
    /// A depth of 0 means unlimited. Each call is a fresh traversal.
    pub fn nodes(&self, start: Option<NodeId>, depth: usize) -> TreeResult<Nodes<'_>> {
        let (range, level) = match start {
            None => (0..self.structure().len(), 0),
            Some(id) => (self.subtree_range(id)?, self.level(id)?),
        };
        let max_level = (depth > 0).then(|| level.saturating_add(depth));
        Ok(Nodes::new(self, range, max_level))
    }

    fn nodes_below(&self, id: NodeId, max_level: Option<usize>) -> TreeResult<Nodes<'_>> {
        Ok(Nodes::new(self, self.subtree_range(id)?, max_level))
    }

    fn subtree_range(&self, id: NodeId) -> TreeResult<Range<usize>> {
        let entry = self
            .structure()
            .get(id)
            .ok_or(DomainError::NotFound(id))?;
        Ok(entry.index()..entry.subtree_end())
    }

    /// Calls `visit` for every node `nodes` yields and collects the
    /// `Some` results.
    pub fn walk<R, F>(&self, start: Option<NodeId>, depth: usize, mut visit: F) -> TreeResult<Vec<R>>
    where
        F: FnMut(&Node, usize) -> Option<R>,
    {
        let mut collected = Vec::new();
        for node in self.nodes(start, depth)? {
            let level = self.level(node.id)?;
            if let Some(value) = visit(node, level) {
                collected.push(value);
            }
        }
        Ok(collected)
    }
}

/// Lazy pre-order iterator over the structure index.
pub struct Nodes<'a> {
    snapshot: &'a Snapshot,
    cursor: usize,
    end: usize,
    /// Nodes at or below this level are skipped
    max_level: Option<usize>,
}

impl<'a> Nodes<'a> {
    fn new(snapshot: &'a Snapshot, range: Range<usize>, max_level: Option<usize>) -> Self {
        Self {
            snapshot,
            cursor: range.start,
            end: range.end,
            max_level,
        }
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.end {
            let entry = self.snapshot.graph.structure().at(self.cursor)?;
            let level = match self.snapshot.graph.relations(entry.id()) {
                Some(rel) => rel.level,
                None => {
                    self.cursor += 1;
                    continue;
                }
            };
            if self.max_level.is_some_and(|max| level >= max) {
                // skip the whole subtree
                self.cursor = entry.subtree_end();
                continue;
            }
            self.cursor += 1;
            if let Ok(node) = self.snapshot.store.get(entry.id()) {
                return Some(node);
            }
        }
        None
    }
}
