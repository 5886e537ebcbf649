//! Single-writer, many-reader access to a tree.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::application::tree::Tree;
use crate::domain::Snapshot;

/// Shares a [`Tree`] between threads.
///
/// Writers take turns on the tree itself. Readers clone the last published
/// snapshot and never wait for a rebuild to finish.
#[derive(Debug)]
pub struct SharedTree {
    writer: Mutex<Tree>,
    published: RwLock<Arc<Snapshot>>,
}

impl SharedTree {
    pub fn new(tree: Tree) -> Self {
        let published = RwLock::new(tree.snapshot());
        Self {
            writer: Mutex::new(tree),
            published,
        }
    }

    /// The last published snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Runs `edit` with exclusive access and publishes whatever snapshot
    /// the tree holds afterwards.
    pub fn write<R>(&self, edit: impl FnOnce(&mut Tree) -> R) -> R {
        let mut tree = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = edit(&mut tree);
        let next = tree.snapshot();
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = next;
        result
    }

    pub fn into_inner(self) -> Tree {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::domain::{NodeId, Payload, Record, TreeOptions};

    #[test]
    fn given_concurrent_readers_when_writing_then_readers_see_whole_snapshots() {
        let tree = Tree::from_records(
            vec![Record::new(1, 0, Payload::named("root"))],
            TreeOptions::default(),
        )
        .unwrap();
        let shared = Arc::new(SharedTree::new(tree));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let snapshot = shared.read();
                        let children = snapshot.children(NodeId::new(1), 1).unwrap();
                        assert_eq!(children.len() + 1, snapshot.len());
                    }
                })
            })
            .collect();

        for n in 0..20 {
            shared
                .write(|tree| {
                    let last = tree.navigator().children(NodeId::new(1), 1)?.last().map(|node| node.id);
                    tree.add(Payload::named(format!("c{n}")), NodeId::new(1), last.unwrap_or(NodeId::ROOT))
                })
                .unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(shared.read().len(), 21);
    }
}
