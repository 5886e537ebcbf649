//! Relation builder: derives the relation graph from flat store contents.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, trace};

use crate::domain::entities::NodeId;
use crate::domain::error::{DomainError, TreeResult};
use crate::domain::graph::{RelationGraph, Relations, Structure};
use crate::domain::navigator::Snapshot;
use crate::domain::store::NodeStore;

/// Sibling groups keyed by parent id, members in sibling order.
type Groups = HashMap<NodeId, Vec<NodeId>>;

/// Turns a node store into a consistent relation graph.
///
/// The build is all-or-nothing: on error the store is dropped and the
/// caller keeps whatever graph it published before.
pub struct RelationBuilder {
    store: NodeStore,
}

impl RelationBuilder {
    pub fn new(store: NodeStore) -> Self {
        Self { store }
    }

    /// Full rebuild. On success the store's `prev_id` fields are
    /// normalised to the derived sibling order.
    #[instrument(level = "debug", skip(self), fields(nodes = self.store.len()))]
    pub fn build(mut self) -> TreeResult<Snapshot> {
        let groups = self.group_by_parent()?;

        let mut ordered = Groups::with_capacity(groups.len());
        for (parent, members) in groups {
            let order = self.order_siblings(parent, &members)?;
            ordered.insert(parent, order);
        }

        let mut relations = self.link(&ordered);
        let (roots, preorder, depth) = self.assign_levels(&ordered, &mut relations)?;
        let structure = build_structure(&preorder, &ordered);

        self.normalize_order(&ordered)?;
        debug!(roots = roots.len(), depth, "relation graph built");

        let graph = RelationGraph {
            relations,
            roots,
            structure,
            depth,
        };
        Ok(Snapshot::new(self.store, graph))
    }

    /// Step 1: children per parent, in natural order. Fails on missing parents.
    fn group_by_parent(&self) -> TreeResult<Groups> {
        let mut groups = Groups::new();
        for node in self.store.natural_order() {
            let parent = node.parent_id;
            if !parent.is_root() && !self.store.contains(parent) {
                return Err(DomainError::ParentNotFound {
                    child: node.id,
                    parent,
                });
            }
            groups.entry(parent).or_default().push(node.id);
        }
        Ok(groups)
    }

    /// Step 2: follow the `prev_id` chain when every member has one,
    /// keep natural order when none has one.
    fn order_siblings(&self, parent: NodeId, members: &[NodeId]) -> TreeResult<Vec<NodeId>> {
        let inconsistent = |reason: String| DomainError::InconsistentOrder { parent, reason };

        let mut predecessors = Vec::with_capacity(members.len());
        for &id in members {
            if let Some(prev) = self.store.get(id)?.prev_id {
                predecessors.push((id, prev));
            }
        }
        if predecessors.is_empty() {
            return Ok(members.to_vec());
        }
        if predecessors.len() < members.len() {
            return Err(inconsistent(format!(
                "only {} of {} siblings carry an ordering key",
                predecessors.len(),
                members.len()
            )));
        }

        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let mut follower: HashMap<NodeId, NodeId> = HashMap::with_capacity(members.len());
        for (id, prev) in predecessors {
            if prev == id {
                return Err(inconsistent(format!("node {id} follows itself")));
            }
            if !prev.is_root() && !member_set.contains(&prev) {
                return Err(inconsistent(format!(
                    "node {id} follows {prev}, which is not a sibling"
                )));
            }
            if let Some(other) = follower.insert(prev, id) {
                return Err(inconsistent(if prev.is_root() {
                    format!("nodes {other} and {id} both claim the first position")
                } else {
                    format!("nodes {other} and {id} both follow {prev}")
                }));
            }
        }

        let mut order = Vec::with_capacity(members.len());
        let mut cursor = NodeId::ROOT;
        while let Some(&next) = follower.get(&cursor) {
            order.push(next);
            cursor = next;
        }
        if order.len() != members.len() {
            return Err(inconsistent(format!(
                "sibling chain reaches {} of {} nodes",
                order.len(),
                members.len()
            )));
        }
        Ok(order)
    }

    /// Step 3: parent, first child and next/previous links.
    fn link(&self, ordered: &Groups) -> HashMap<NodeId, Relations> {
        let mut relations: HashMap<NodeId, Relations> = self
            .store
            .all()
            .map(|node| (node.id, Relations::default()))
            .collect();

        for (&parent, order) in ordered {
            for (pos, &id) in order.iter().enumerate() {
                if let Some(rel) = relations.get_mut(&id) {
                    rel.parent = (!parent.is_root()).then_some(parent);
                    rel.previous = pos.checked_sub(1).map(|p| order[p]);
                    rel.next = order.get(pos + 1).copied();
                }
            }
            if !parent.is_root() {
                if let Some(rel) = relations.get_mut(&parent) {
                    rel.first_child = order.first().copied();
                    rel.children = order.clone();
                }
            }
        }
        relations
    }

    /// Step 4: levels by descending from the root level. Nodes that cannot
    /// be reached from there hang on a parent cycle.
    fn assign_levels(
        &self,
        ordered: &Groups,
        relations: &mut HashMap<NodeId, Relations>,
    ) -> TreeResult<(Vec<NodeId>, Vec<NodeId>, usize)> {
        let roots = ordered.get(&NodeId::ROOT).cloned().unwrap_or_default();
        let mut visited = HashSet::with_capacity(self.store.len());
        let mut preorder = Vec::with_capacity(self.store.len());
        let mut depth = 0;

        let mut stack: Vec<(NodeId, usize)> = roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, level)) = stack.pop() {
            if !visited.insert(id) {
                return Err(DomainError::CycleDetected(id));
            }
            preorder.push(id);
            depth = depth.max(level);
            if let Some(rel) = relations.get_mut(&id) {
                rel.level = level;
            }
            if let Some(children) = ordered.get(&id) {
                stack.extend(children.iter().rev().map(|&child| (child, level + 1)));
            }
        }

        if visited.len() < self.store.len() {
            return Err(DomainError::CycleDetected(self.find_cycle(&visited)?));
        }
        trace!(visited = visited.len(), "levels assigned");
        Ok((roots, preorder, depth))
    }

    /// Walks up from the smallest unreachable id until a node repeats.
    fn find_cycle(&self, visited: &HashSet<NodeId>) -> TreeResult<NodeId> {
        let start = self
            .store
            .all()
            .map(|node| node.id)
            .filter(|id| !visited.contains(id))
            .min()
            .ok_or_else(|| DomainError::CycleDetected(NodeId::ROOT))?;

        let mut seen = HashSet::new();
        let mut cursor = start;
        while seen.insert(cursor) {
            cursor = self.store.get(cursor)?.parent_id;
        }
        Ok(cursor)
    }

    fn normalize_order(&mut self, ordered: &Groups) -> TreeResult<()> {
        for order in ordered.values() {
            let mut prev = NodeId::ROOT;
            for &id in order {
                self.store.set_prev(id, Some(prev))?;
                prev = id;
            }
        }
        Ok(())
    }
}

/// Step 5: nested index. Subtree sizes are summed bottom-up over the
/// pre-order so no level needs its own stack frame.
fn build_structure(preorder: &[NodeId], ordered: &Groups) -> Structure {
    let mut sizes: HashMap<NodeId, usize> = HashMap::with_capacity(preorder.len());
    for &id in preorder.iter().rev() {
        let below: usize = ordered
            .get(&id)
            .map(|kids| kids.iter().filter_map(|kid| sizes.get(kid)).sum())
            .unwrap_or_default();
        sizes.insert(id, below + 1);
    }
    Structure::from_preorder(
        preorder
            .iter()
            .map(|&id| (id, sizes.get(&id).copied().unwrap_or(1))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{InsertMode, Payload, Record};

    fn store_of(records: Vec<Record>) -> NodeStore {
        let mut store = NodeStore::new();
        for record in records {
            store.upsert(record, InsertMode::Strict).unwrap();
        }
        store
    }

    fn id(raw: u64) -> NodeId {
        NodeId::new(raw)
    }

    #[test]
    fn given_flat_records_when_building_then_links_relations() {
        let store = store_of(vec![
            Record::new(1, 0, Payload::named("A")),
            Record::new(2, 1, Payload::named("B")),
            Record::new(3, 1, Payload::named("C")),
        ]);

        let snapshot = RelationBuilder::new(store).build().unwrap();
        let graph = snapshot.graph();

        let a = graph.relations(id(1)).unwrap();
        assert_eq!(a.first_child, Some(id(2)));
        assert_eq!(a.children, vec![id(2), id(3)]);
        assert_eq!(a.level, 0);

        let b = graph.relations(id(2)).unwrap();
        assert_eq!(b.parent, Some(id(1)));
        assert_eq!(b.next, Some(id(3)));
        assert_eq!(b.previous, None);
        assert_eq!(b.level, 1);
        assert_eq!(graph.depth(), 1);
    }

    #[test]
    fn given_natural_order_when_building_then_normalizes_prev_ids() {
        let store = store_of(vec![
            Record::new(1, 0, Payload::named("A")),
            Record::new(2, 1, Payload::named("B")),
            Record::new(3, 1, Payload::named("C")),
        ]);

        let snapshot = RelationBuilder::new(store).build().unwrap();

        assert_eq!(snapshot.store().get(id(2)).unwrap().prev_id, Some(NodeId::ROOT));
        assert_eq!(snapshot.store().get(id(3)).unwrap().prev_id, Some(id(2)));
    }

    #[test]
    fn given_partial_ordering_keys_when_building_then_fails_as_inconsistent() {
        let store = store_of(vec![
            Record::new(1, 0, Payload::named("A")).after(0),
            Record::new(2, 0, Payload::named("B")),
        ]);

        let err = RelationBuilder::new(store).build().unwrap_err();
        assert!(matches!(err, DomainError::InconsistentOrder { parent, .. } if parent.is_root()));
    }

    #[test]
    fn given_two_heads_when_building_then_fails_as_inconsistent() {
        let store = store_of(vec![
            Record::new(1, 0, Payload::named("A")).after(0),
            Record::new(2, 0, Payload::named("B")).after(0),
        ]);

        let err = RelationBuilder::new(store).build().unwrap_err();
        assert!(matches!(err, DomainError::InconsistentOrder { .. }));
    }

    #[test]
    fn given_self_parent_when_building_then_detects_cycle() {
        let store = store_of(vec![
            Record::new(1, 0, Payload::named("A")),
            Record::new(2, 2, Payload::named("B")),
        ]);

        let err = RelationBuilder::new(store).build().unwrap_err();
        assert_eq!(err, DomainError::CycleDetected(id(2)));
    }

    #[test]
    fn given_deep_chain_when_building_structure_then_nests_every_level() {
        let mut records = vec![Record::new(1, 0, Payload::named("n1"))];
        for raw in 2..=500 {
            records.push(Record::new(raw, raw - 1, Payload::named(format!("n{raw}"))));
        }

        let snapshot = RelationBuilder::new(store_of(records)).build().unwrap();

        assert_eq!(snapshot.graph().depth(), 499);
        let top = snapshot.structure().roots().next().unwrap();
        assert_eq!(top.size(), 500);
        let leaf = snapshot.structure().get(id(500)).unwrap();
        assert!(leaf.is_leaf());
        assert_eq!(top.children().next().map(|entry| entry.id()), Some(id(2)));
    }
}
