//! In-process bookmark store and history.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Result, SortError};
use crate::event::{ChangeEvent, ChangeKind, ChangeListener};
use crate::store::{BookmarkStore, HistoryProvider, Node, Visit};

#[derive(Debug, Clone)]
struct Record {
    /// Node fields; `children`, `index` and `parent_id` are derived.
    node: Node,
    parent: Option<String>,
    children: Vec<String>,
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<String, Record>,
    available: bool,
    rejected: HashSet<String>,
    move_log: Vec<(String, usize)>,
}

/// A bookmark tree held in memory that behaves like a host store: moves are
/// absolute-position and every mutation is reported to the attached listener.
#[derive(Debug)]
pub struct MemoryStore {
    root_id: String,
    inner: Mutex<Inner>,
    listener: Mutex<Option<ChangeListener>>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn insert_tree(nodes: &mut HashMap<String, Record>, mut node: Node, parent: Option<String>) {
    let children = node.children.take().unwrap_or_default();
    let child_ids = children.iter().map(|c| c.id.clone()).collect();
    let id = node.id.clone();
    nodes.insert(
        id.clone(),
        Record {
            node,
            parent,
            children: child_ids,
        },
    );
    for child in children {
        insert_tree(nodes, child, Some(id.clone()));
    }
}

impl Inner {
    /// The node with its position fields filled in.
    fn node(&self, id: &str) -> Option<Node> {
        let record = self.nodes.get(id)?;
        let mut node = record.node.clone();
        node.parent_id = record.parent.clone();
        node.index = record
            .parent
            .as_ref()
            .and_then(|p| self.nodes.get(p))
            .and_then(|p| p.children.iter().position(|c| c == id))
            .unwrap_or(0);
        node.children = None;
        Some(node)
    }

    fn subtree(&self, id: &str) -> Option<Node> {
        let mut node = self.node(id)?;
        if node.is_folder() {
            let children = self.nodes.get(id)?.children.clone();
            node.children = Some(children.iter().filter_map(|c| self.subtree(c)).collect());
        }
        Some(node)
    }

    fn remove_recursive(&mut self, id: &str) {
        if let Some(record) = self.nodes.remove(id) {
            for child in record.children {
                self.remove_recursive(&child);
            }
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(SortError::StoreUnavailable("memory store offline".into()))
        }
    }
}

impl MemoryStore {
    /// Build a store from a nested tree whose top node is the implicit root.
    pub fn from_tree(root: Node) -> Self {
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        insert_tree(&mut nodes, root, None);
        Self {
            root_id,
            inner: Mutex::new(Inner {
                nodes,
                available: true,
                rejected: HashSet::new(),
                move_log: Vec::new(),
            }),
            listener: Mutex::new(None),
        }
    }

    /// Replace the whole tree without emitting events.
    pub fn replace_tree(&self, root: Node) {
        let mut nodes = HashMap::new();
        insert_tree(&mut nodes, root, None);
        lock(&self.inner).nodes = nodes;
    }

    /// The current tree, rooted at the implicit root.
    pub fn to_tree(&self) -> Option<Node> {
        lock(&self.inner).subtree(&self.root_id)
    }

    /// Register the listener that receives change events.
    pub fn set_listener(&self, listener: ChangeListener) {
        *lock(&self.listener) = Some(listener);
    }

    /// Simulate losing the connection to the store.
    pub fn set_available(&self, available: bool) {
        lock(&self.inner).available = available;
    }

    /// Make every future move of `id` fail with [`SortError::Rejected`].
    pub fn reject_moves_of(&self, id: &str) {
        lock(&self.inner).rejected.insert(id.to_string());
    }

    /// Moves issued so far, in order.
    pub fn move_log(&self) -> Vec<(String, usize)> {
        lock(&self.inner).move_log.clone()
    }

    /// Ids of the direct children of `folder_id`, in order.
    pub fn child_ids(&self, folder_id: &str) -> Vec<String> {
        lock(&self.inner)
            .nodes
            .get(folder_id)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    /// Insert `node` (and any nested children) under `parent_id`; appends when
    /// `index` is `None`.
    pub fn insert(&self, parent_id: &str, node: Node, index: Option<usize>) -> Result<()> {
        let id = node.id.clone();
        {
            let mut inner = lock(&self.inner);
            let parent = inner
                .nodes
                .get_mut(parent_id)
                .ok_or_else(|| SortError::NotFound(parent_id.to_string()))?;
            let at = index.unwrap_or(parent.children.len()).min(parent.children.len());
            parent.children.insert(at, id.clone());
            insert_tree(&mut inner.nodes, node, Some(parent_id.to_string()));
        }
        self.emit(ChangeKind::Created, &id);
        Ok(())
    }

    /// Remove an item and everything beneath it.
    pub fn remove(&self, id: &str) -> Result<()> {
        {
            let mut inner = lock(&self.inner);
            let parent = inner
                .nodes
                .get(id)
                .ok_or_else(|| SortError::NotFound(id.to_string()))?
                .parent
                .clone();
            if let Some(parent_id) = parent {
                if let Some(parent) = inner.nodes.get_mut(&parent_id) {
                    parent.children.retain(|c| c != id);
                }
            }
            inner.remove_recursive(id);
        }
        self.emit(ChangeKind::Removed, id);
        Ok(())
    }

    pub fn set_title(&self, id: &str, title: &str) -> Result<()> {
        {
            let mut inner = lock(&self.inner);
            let record = inner
                .nodes
                .get_mut(id)
                .ok_or_else(|| SortError::NotFound(id.to_string()))?;
            record.node.title = Some(title.to_string());
        }
        self.emit(ChangeKind::Changed, id);
        Ok(())
    }

    fn emit(&self, kind: ChangeKind, id: &str) {
        if let Some(listener) = lock(&self.listener).as_ref() {
            listener.notify(ChangeEvent::new(kind, id));
        }
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    fn root_id(&self) -> &str {
        &self.root_id
    }

    async fn get_children(&self, folder_id: &str) -> Result<Option<Vec<Node>>> {
        let inner = lock(&self.inner);
        inner.check_available()?;
        let Some(record) = inner.nodes.get(folder_id) else {
            return Ok(None);
        };
        Ok(Some(
            record.children.iter().filter_map(|c| inner.node(c)).collect(),
        ))
    }

    async fn get_subtree(&self, folder_id: &str) -> Result<Option<Node>> {
        let inner = lock(&self.inner);
        inner.check_available()?;
        Ok(inner.subtree(folder_id))
    }

    async fn move_item(&self, item_id: &str, index: usize) -> Result<()> {
        {
            let mut inner = lock(&self.inner);
            inner.check_available()?;
            if inner.rejected.contains(item_id) {
                return Err(SortError::Rejected {
                    id: item_id.to_string(),
                    reason: "item is read-only".into(),
                });
            }
            let parent_id = inner
                .nodes
                .get(item_id)
                .and_then(|r| r.parent.clone())
                .ok_or_else(|| SortError::NotFound(item_id.to_string()))?;
            let parent = inner
                .nodes
                .get_mut(&parent_id)
                .ok_or_else(|| SortError::NotFound(parent_id.clone()))?;
            parent.children.retain(|c| c != item_id);
            let at = index.min(parent.children.len());
            parent.children.insert(at, item_id.to_string());
            inner.move_log.push((item_id.to_string(), index));
        }
        self.emit(ChangeKind::Moved, item_id);
        Ok(())
    }
}

/// Visit history held in memory, keyed by exact URL.
///
/// [`add_visit`](Self::add_visit) reports a [`ChangeKind::Visited`] event
/// carrying the URL to the attached listener.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    visits: Mutex<HashMap<String, Vec<i64>>>,
    listener: Mutex<Option<ChangeListener>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(visits: HashMap<String, Vec<i64>>) -> Self {
        Self {
            visits: Mutex::new(visits),
            listener: Mutex::new(None),
        }
    }

    pub fn set_listener(&self, listener: ChangeListener) {
        *lock(&self.listener) = Some(listener);
    }

    pub fn add_visit(&self, url: &str, visit_time: i64) {
        lock(&self.visits)
            .entry(url.to_string())
            .or_default()
            .push(visit_time);
        if let Some(listener) = lock(&self.listener).as_ref() {
            listener.notify(ChangeEvent::new(ChangeKind::Visited, url));
        }
    }

    /// Swap in a whole new history without reporting visits.
    pub fn replace(&self, visits: HashMap<String, Vec<i64>>) {
        *lock(&self.visits) = visits;
    }

    pub fn snapshot(&self) -> HashMap<String, Vec<i64>> {
        lock(&self.visits).clone()
    }
}

#[async_trait]
impl HistoryProvider for MemoryHistory {
    async fn get_visits(&self, url: &str) -> Result<Vec<Visit>> {
        Ok(lock(&self.visits)
            .get(url)
            .map(|times| times.iter().map(|&t| Visit { visit_time: t }).collect())
            .unwrap_or_default())
    }
}
