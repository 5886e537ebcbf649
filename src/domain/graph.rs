//! Derived relation graph and structure index

use std::collections::HashMap;
use std::fmt;

use crate::domain::entities::NodeId;

/// Relations of one node. All links are ids resolved through the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    pub parent: Option<NodeId>,
    pub first_child: Option<NodeId>,
    pub next: Option<NodeId>,
    pub previous: Option<NodeId>,
    /// Children in sibling order
    pub children: Vec<NodeId>,
    /// Depth below the root level (root-level nodes are 0)
    pub level: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    id: NodeId,
    /// One past the last slot of this entry's subtree
    end: usize,
}

/// Nested id → descendants index of the whole forest, in sibling order.
///
/// Entries are laid out in depth-first pre-order, so the subtree of an
/// entry occupies the contiguous slots `index..end`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
    slots: Vec<Slot>,
    positions: HashMap<NodeId, usize>,
}

impl Structure {
    /// Builds the index from `(id, subtree size)` pairs in pre-order.
    pub(crate) fn from_preorder(entries: impl IntoIterator<Item = (NodeId, usize)>) -> Self {
        let mut structure = Self::default();
        for (index, (id, size)) in entries.into_iter().enumerate() {
            structure.slots.push(Slot {
                id,
                end: index + size.max(1),
            });
            structure.positions.insert(id, index);
        }
        structure
    }

    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            structure: self,
            next: 0,
            end: self.slots.len(),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<StructureNode<'_>> {
        let index = *self.positions.get(&id)?;
        Some(StructureNode {
            structure: self,
            index,
        })
    }

    pub(crate) fn at(&self, index: usize) -> Option<StructureNode<'_>> {
        (index < self.slots.len()).then_some(StructureNode {
            structure: self,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One entry of the structure index.
#[derive(Clone, Copy)]
pub struct StructureNode<'a> {
    structure: &'a Structure,
    index: usize,
}

impl<'a> StructureNode<'a> {
    fn slot(&self) -> Slot {
        self.structure.slots[self.index]
    }

    pub fn id(&self) -> NodeId {
        self.slot().id
    }

    pub fn children(&self) -> Siblings<'a> {
        Siblings {
            structure: self.structure,
            next: self.index + 1,
            end: self.slot().end,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.slot().end == self.index + 1
    }

    /// Number of entries in this subtree, the entry itself included.
    pub fn size(&self) -> usize {
        self.slot().end - self.index
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn subtree_end(&self) -> usize {
        self.slot().end
    }
}

impl fmt::Debug for StructureNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructureNode")
            .field("id", &self.id())
            .field("size", &self.size())
            .finish()
    }
}

/// Entries sharing a parent, in sibling order.
#[derive(Debug, Clone)]
pub struct Siblings<'a> {
    structure: &'a Structure,
    next: usize,
    end: usize,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = StructureNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let entry = self.structure.at(self.next)?;
        self.next = entry.subtree_end();
        Some(entry)
    }
}

/// Complete relation graph produced by one rebuild.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    pub(crate) relations: HashMap<NodeId, Relations>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) structure: Structure,
    /// Deepest level present
    pub(crate) depth: usize,
}

impl RelationGraph {
    pub fn relations(&self, id: NodeId) -> Option<&Relations> {
        self.relations.get(&id)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.relations.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> NodeId {
        NodeId::new(raw)
    }

    /// 1 ( 2 ( 3 ) 4 ) 5
    fn structure() -> Structure {
        Structure::from_preorder([(id(1), 4), (id(2), 2), (id(3), 1), (id(4), 1), (id(5), 1)])
    }

    #[test]
    fn given_preorder_sizes_when_iterating_siblings_then_skips_subtrees() {
        let structure = structure();

        let roots: Vec<NodeId> = structure.roots().map(|entry| entry.id()).collect();
        let below_one: Vec<NodeId> = structure
            .get(id(1))
            .unwrap()
            .children()
            .map(|entry| entry.id())
            .collect();

        assert_eq!(roots, vec![id(1), id(5)]);
        assert_eq!(below_one, vec![id(2), id(4)]);
        assert!(structure.get(id(3)).unwrap().is_leaf());
        assert!(structure.get(id(9)).is_none());
    }
}
