//! Per-folder sorting: fetch, partition, order, diff and move.

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::bookmarks::comparator::Comparator;
use crate::bookmarks::exclusion::ExclusionRegistry;
use crate::bookmarks::model::{Folder, Item, MoveOp};
use crate::error::Result;
use crate::store::{BookmarkStore, HistoryProvider, Node};

/// What sorting one folder did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderOutcome {
    /// The folder was excluded or is the implicit root; nothing was fetched.
    pub skipped: bool,
    pub moves_planned: usize,
    pub moves_applied: usize,
    pub moves_failed: usize,
}

/// Split children into sort partitions at every separator.
///
/// Separators are dropped. A leading, trailing or doubled separator yields an
/// empty partition so that slot arithmetic stays aligned with the folder.
pub fn partition(items: Vec<Item>) -> Vec<Vec<Item>> {
    let mut partitions = vec![Vec::new()];
    for item in items {
        if item.is_separator() {
            partitions.push(Vec::new());
        } else if let Some(current) = partitions.last_mut() {
            current.push(item);
        }
    }
    partitions
}

/// Sort every partition of `folder` and return the moves needed.
///
/// Partitions are laid out back to back with one slot kept between them for
/// the separator. Only items whose new index differs from the index they were
/// read at produce a [`MoveOp`]; the result is ordered by target index.
pub fn sort_folder(folder: &mut Folder, comparator: &Comparator) -> Vec<MoveOp> {
    let mut delta = 0;
    for partition in folder.children.iter_mut() {
        partition.sort_by(|a, b| comparator.compare(a, b));
        for (offset, item) in partition.iter_mut().enumerate() {
            item.set_index(delta + offset);
        }
        delta += partition.len() + 1;
    }

    folder
        .children
        .iter()
        .flatten()
        .filter(|item| item.has_moved())
        .map(|item| MoveOp {
            id: item.id().to_string(),
            index: item.index(),
        })
        .collect()
}

/// Final child order of `folder` once its moves are applied, separators
/// included, given the order the children were read in.
fn target_order(folder: &Folder, current: &[String]) -> Vec<String> {
    let mut slots: Vec<Option<&str>> = vec![None; current.len()];
    for item in folder.children.iter().flatten() {
        if let Some(slot) = slots.get_mut(item.index()) {
            *slot = Some(item.id());
        }
    }
    // Whatever is left over is a separator, which keeps its slot.
    slots
        .iter()
        .zip(current)
        .map(|(slot, id)| slot.unwrap_or(id).to_string())
        .collect()
}

/// Sorts folders against a live store.
pub struct SortEngine<'a, S: ?Sized, H: ?Sized> {
    store: &'a S,
    history: &'a H,
    registry: &'a ExclusionRegistry,
    comparator: &'a Comparator,
}

impl<'a, S, H> SortEngine<'a, S, H>
where
    S: BookmarkStore + ?Sized,
    H: HistoryProvider + ?Sized,
{
    pub fn new(
        store: &'a S,
        history: &'a H,
        registry: &'a ExclusionRegistry,
        comparator: &'a Comparator,
    ) -> Self {
        Self {
            store,
            history,
            registry,
            comparator,
        }
    }

    /// Excluded folders and the implicit root are never sorted.
    pub fn can_be_sorted(&self, folder: &Folder) -> bool {
        !self.registry.is_excluded(&folder.id)
            && !self.registry.is_recursively_excluded(&folder.id)
            && folder.id != self.store.root_id()
    }

    /// Read the folder's children, enrich bookmarks with visit data and store
    /// them partitioned in `folder.children`. Returns the ids in read order.
    pub async fn load_children(&self, folder: &mut Folder) -> Result<Vec<String>> {
        let mut nodes = match self.store.get_children(&folder.id).await {
            Ok(Some(nodes)) => nodes,
            Ok(None) => {
                debug!(id = %folder.id, "folder vanished, nothing to sort");
                Vec::new()
            }
            Err(e) if !e.is_terminal() => {
                warn!(id = %folder.id, error = %e, "could not read folder, treating as empty");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        for (position, node) in nodes.iter_mut().enumerate() {
            node.index = position;
        }

        let annotations = self.comparator.config().needs_annotations();
        let mut items: Vec<Item> = nodes.iter().map(|n| Item::from_node(n, annotations)).collect();
        self.enrich_visits(&nodes, &mut items).await;

        folder.children = partition(items);
        Ok(nodes.into_iter().map(|n| n.id).collect())
    }

    /// Look up visits for every bookmark of the folder concurrently.
    async fn enrich_visits(&self, nodes: &[Node], items: &mut [Item]) {
        let lookups = items.iter().zip(nodes).map(|(item, node)| async move {
            match (item, node.url.as_deref()) {
                (Item::Bookmark(_), Some(url)) if !url.is_empty() => {
                    match self.history.get_visits(url).await {
                        Ok(visits) => visits,
                        Err(e) => {
                            warn!(url, error = %e, "visit lookup failed");
                            Vec::new()
                        }
                    }
                }
                _ => Vec::new(),
            }
        });
        let results = join_all(lookups).await;
        for (item, visits) in items.iter_mut().zip(results) {
            if let Item::Bookmark(bookmark) = item {
                bookmark.apply_visits(&visits);
            }
        }
    }

    /// Sort one folder and apply the resulting moves to the store.
    ///
    /// Individual move failures are logged and skipped. Only a store that
    /// cannot be reached at all makes this return an error.
    pub async fn sort_and_apply(&self, folder: &mut Folder) -> Result<FolderOutcome> {
        if !self.can_be_sorted(folder) {
            debug!(id = %folder.id, "folder excluded from sorting");
            return Ok(FolderOutcome {
                skipped: true,
                ..Default::default()
            });
        }

        let current = self.load_children(folder).await?;
        let moves = sort_folder(folder, self.comparator);
        let mut outcome = FolderOutcome {
            moves_planned: moves.len(),
            ..Default::default()
        };
        if moves.is_empty() {
            return Ok(outcome);
        }
        debug!(id = %folder.id, title = %folder.title, moves = moves.len(), "reordering folder");

        let target = target_order(folder, &current);
        self.apply_moves(&moves, current, &target, &mut outcome).await?;
        Ok(outcome)
    }

    /// Issue `moves` one at a time, in target order.
    ///
    /// The store re-numbers siblings after every move, so each call places
    /// its item directly after the item that precedes it in `target`, using
    /// that neighbour's current position in a local replica of the folder.
    /// Once every move is issued the folder matches `target`.
    async fn apply_moves(
        &self,
        moves: &[MoveOp],
        mut live: Vec<String>,
        target: &[String],
        outcome: &mut FolderOutcome,
    ) -> Result<()> {
        for op in moves {
            let Some(from) = live.iter().position(|id| *id == op.id) else {
                continue;
            };
            let id = live.remove(from);
            let to = match op.index.checked_sub(1).and_then(|i| target.get(i)) {
                Some(anchor) => live.iter().position(|x| x == anchor).map_or(0, |p| p + 1),
                None => 0,
            };
            live.insert(to, id);

            match self.store.move_item(&op.id, to).await {
                Ok(()) => outcome.moves_applied += 1,
                Err(e) if !e.is_terminal() => {
                    warn!(id = %op.id, index = op.index, error = %e, "move failed, skipping");
                    outcome.moves_failed += 1;
                    let id = live.remove(to);
                    live.insert(from, id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::comparator::{build, SortConfig, SortKey};
    use crate::store::memory::{MemoryHistory, MemoryStore};
    use crate::store::{MENU_ID, ROOT_ID};

    fn titles(specs: &[&str]) -> Vec<Node> {
        specs
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if *t == "|" {
                    Node::separator(format!("sep-{}", i))
                } else {
                    Node::bookmark(*t, *t, format!("https://{}.example/", t))
                }
            })
            .collect()
    }

    fn store_with(children: Vec<Node>) -> MemoryStore {
        MemoryStore::from_tree(
            Node::folder(ROOT_ID, "")
                .with_children(vec![Node::folder(MENU_ID, "Menu").with_children(children)]),
        )
    }

    fn folder_from(children: Vec<Node>) -> Folder {
        let mut nodes = children;
        for (i, n) in nodes.iter_mut().enumerate() {
            n.index = i;
        }
        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        folder.children = partition(nodes.iter().map(|n| Item::from_node(n, false)).collect());
        folder
    }

    fn visible(store: &MemoryStore) -> Vec<String> {
        store
            .child_ids(MENU_ID)
            .into_iter()
            .map(|id| if id.starts_with("sep-") { "|".to_string() } else { id })
            .collect()
    }

    #[test]
    fn partition_splits_and_keeps_empty_runs() {
        let items: Vec<Item> = titles(&["|", "b", "a", "|", "|", "c"])
            .iter()
            .map(|n| Item::from_node(n, false))
            .collect();
        let parts = partition(items);
        let lens: Vec<usize> = parts.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![0, 2, 0, 1]);
        assert!(parts.iter().flatten().all(|i| !i.is_separator()));
    }

    #[test]
    fn sorted_folder_needs_no_moves() {
        let comparator = build(&SortConfig::default());
        let mut folder = folder_from(titles(&["a", "b", "|", "c", "d", "|", "e"]));
        assert!(sort_folder(&mut folder, &comparator).is_empty());
        assert!(!folder.has_move());
    }

    #[test]
    fn reversal_moves_only_displaced_items() {
        let comparator = build(&SortConfig::default());
        let mut folder = folder_from(titles(&["e", "d", "c", "b", "a"]));
        let moves = sort_folder(&mut folder, &comparator);
        let moved: Vec<&str> = moves.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(moved, vec!["a", "b", "d", "e"]);
        assert!(!moved.contains(&"c"));
        assert_eq!(moves[0], MoveOp { id: "a".into(), index: 0 });
        assert_eq!(moves[3], MoveOp { id: "e".into(), index: 4 });
    }

    #[test]
    fn partitions_sort_independently() {
        let comparator = build(&SortConfig::default());
        let mut folder = folder_from(titles(&["z", "y", "|", "b", "a"]));
        let moves = sort_folder(&mut folder, &comparator);
        assert_eq!(
            moves,
            vec![
                MoveOp { id: "y".into(), index: 0 },
                MoveOp { id: "z".into(), index: 1 },
                MoveOp { id: "a".into(), index: 3 },
                MoveOp { id: "b".into(), index: 4 },
            ]
        );
    }

    #[test]
    fn targets_stay_inside_the_folder() {
        let comparator = build(&SortConfig::default());
        for layout in [
            vec!["c", "b", "a"],
            vec!["c", "|", "b", "a"],
            vec!["c", "b", "|"],
            vec!["|", "b", "a", "|"],
        ] {
            let count = layout.len();
            let mut folder = folder_from(titles(&layout));
            sort_folder(&mut folder, &comparator);
            let max = folder.children.iter().flatten().map(Item::index).max();
            assert!(max.map_or(true, |m| m < count), "layout {:?}", layout);
        }
    }

    #[tokio::test]
    async fn sort_and_apply_orders_store() {
        let store = store_with(titles(&["d", "b", "|", "z", "a", "m"]));
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        let outcome = engine.sort_and_apply(&mut folder).await.unwrap();
        assert_eq!(visible(&store), vec!["b", "d", "|", "a", "m", "z"]);
        assert_eq!(outcome.moves_applied, outcome.moves_planned);
        assert_eq!(outcome.moves_failed, 0);

        let log_len = store.move_log().len();
        let mut again = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        let second = engine.sort_and_apply(&mut again).await.unwrap();
        assert_eq!(second.moves_planned, 0);
        assert_eq!(store.move_log().len(), log_len);
    }

    #[tokio::test]
    async fn unmoved_item_between_moved_ones_stays_put() {
        let store = store_with(titles(&["z", "m", "a", "n"]));
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        let outcome = engine.sort_and_apply(&mut folder).await.unwrap();
        assert_eq!(visible(&store), vec!["a", "m", "n", "z"]);
        assert_eq!(outcome.moves_planned, 3);
        assert!(store.move_log().iter().all(|(id, _)| id != "m"));
    }

    #[tokio::test]
    async fn separators_keep_partitions() {
        let store = store_with(titles(&["c", "a", "|", "f", "e", "|", "|", "b"]));
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let before = store.child_ids(MENU_ID);
        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        engine.sort_and_apply(&mut folder).await.unwrap();
        let after = store.child_ids(MENU_ID);

        let separators = |ids: &[String]| -> Vec<(usize, String)> {
            ids.iter()
                .enumerate()
                .filter(|(_, id)| id.starts_with("sep-"))
                .map(|(i, id)| (i, id.clone()))
                .collect()
        };
        assert_eq!(separators(&before), separators(&after));
        assert_eq!(visible(&store), vec!["a", "c", "|", "e", "f", "|", "|", "b"]);
    }

    #[tokio::test]
    async fn visits_drive_access_count_order() {
        let store = store_with(titles(&["a", "b", "c"]));
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        history.add_visit("https://c.example/", 1);
        history.add_visit("https://c.example/", 2);
        history.add_visit("https://c.example/", 3);
        history.add_visit("https://b.example/", 7);
        let config = SortConfig {
            primary: SortKey::AccessCount,
            primary_reverse: true,
            ..SortConfig::default()
        };
        let comparator = build(&config);
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        engine.sort_and_apply(&mut folder).await.unwrap();
        assert_eq!(visible(&store), vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn excluded_folder_is_not_fetched() {
        let store = store_with(titles(&["b", "a"]));
        store.set_available(false);
        let mut registry = ExclusionRegistry::new();
        registry.set_excluded(MENU_ID);
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        let outcome = engine.sort_and_apply(&mut folder).await.unwrap();
        assert!(outcome.skipped);
        assert!(folder.children.is_empty());
    }

    #[tokio::test]
    async fn implicit_root_is_never_sorted() {
        let store = store_with(Vec::new());
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);
        let mut root = Folder::from_node(&Node::folder(ROOT_ID, ""));
        assert!(engine.sort_and_apply(&mut root).await.unwrap().skipped);
    }

    #[tokio::test]
    async fn vanished_folder_is_empty() {
        let store = store_with(Vec::new());
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);
        let mut gone = Folder::from_node(&Node::folder("gone", "Gone"));
        let outcome = engine.sort_and_apply(&mut gone).await.unwrap();
        assert_eq!(outcome, FolderOutcome::default());
    }

    #[tokio::test]
    async fn failed_move_does_not_stop_siblings() {
        let store = store_with(titles(&["d", "c", "b", "a"]));
        store.reject_moves_of("b");
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);

        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        let outcome = engine.sort_and_apply(&mut folder).await.unwrap();
        assert_eq!(outcome.moves_planned, 4);
        assert_eq!(outcome.moves_failed, 1);
        assert_eq!(outcome.moves_applied, 3);
        let order = store.child_ids(MENU_ID);
        assert_eq!(order[0], "a");
    }

    #[tokio::test]
    async fn unavailable_store_is_terminal() {
        let store = store_with(titles(&["b", "a"]));
        store.set_available(false);
        let registry = ExclusionRegistry::new();
        let history = MemoryHistory::new();
        let comparator = build(&SortConfig::default());
        let engine = SortEngine::new(&store, &history, &registry, &comparator);
        let mut folder = Folder::from_node(&Node::folder(MENU_ID, "Menu"));
        assert!(engine.sort_and_apply(&mut folder).await.unwrap_err().is_terminal());
    }
}
