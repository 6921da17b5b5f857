use std::collections::HashSet;

use tracing::{debug, warn};

use crate::bookmarks::exclusion::ExclusionRegistry;
use crate::bookmarks::model::Folder;
use crate::error::Result;
use crate::store::{BookmarkStore, Node};

/// Finds the folders a sort pass has to visit.
pub struct TreeWalker<'a, S: ?Sized> {
    store: &'a S,
    registry: &'a ExclusionRegistry,
}

impl<'a, S: BookmarkStore + ?Sized> TreeWalker<'a, S> {
    pub fn new(store: &'a S, registry: &'a ExclusionRegistry) -> Self {
        Self { store, registry }
    }

    /// Folders under `root_ids`, depth-first pre-order, in root order.
    ///
    /// Recursively excluded folders are left out together with everything
    /// beneath them. Plainly excluded folders are still listed (the engine
    /// skips them) and their subfolders are still walked. The store's
    /// implicit root is walked but never listed.
    pub async fn enumerate_folders_to_sort(&self, root_ids: &[String]) -> Result<Vec<Folder>> {
        let mut folders = Vec::new();
        for root_id in root_ids {
            let root = match self.store.get_subtree(root_id).await {
                Ok(Some(node)) => node,
                Ok(None) => {
                    debug!(id = %root_id, "root folder not found, skipping");
                    continue;
                }
                Err(e) if !e.is_terminal() => {
                    warn!(id = %root_id, error = %e, "could not read root folder, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if root.is_folder() {
                self.visit(&root, &mut folders);
            }
        }
        Ok(folders)
    }

    fn visit(&self, node: &Node, out: &mut Vec<Folder>) {
        if self.registry.is_recursively_excluded(&node.id) {
            debug!(id = %node.id, "recursively excluded, not descending");
            return;
        }
        if node.id != self.store.root_id() {
            out.push(Folder::from_node(node));
        }
        for child in node.children.iter().flatten().filter(|c| c.is_folder()) {
            self.visit(child, out);
        }
    }

    /// Ids of every folder currently in the store, excluded ones included.
    pub async fn existing_folder_ids(&self) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        if let Some(root) = self.store.get_subtree(self.store.root_id()).await? {
            root.collect_folder_ids(&mut ids);
        }
        Ok(ids)
    }
}
