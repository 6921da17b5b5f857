//! Bookmarks kept in a JSON file on disk.
//!
//! The file holds the whole tree plus visit history:
//!
//! ```json
//! { "root": { "id": "root________", "children": [ ... ] },
//!   "history": { "https://example.com/": [1700000000000] } }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SortError};
use crate::store::memory::{lock, MemoryHistory, MemoryStore};
use crate::store::{BookmarkStore, HistoryProvider, Node, Visit};

#[derive(Debug, Serialize, Deserialize)]
struct BookmarkFile {
    root: Node,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    history: HashMap<String, Vec<i64>>,
}

/// The parsed file together with the exact bytes it was parsed from.
fn read_file(path: &Path) -> Result<(BookmarkFile, Vec<u8>)> {
    let content = std::fs::read(path)?;
    Ok((serde_json::from_slice(&content)?, content))
}

/// A [`BookmarkStore`] backed by a JSON file.
///
/// The file is re-read by [`refresh`](BookmarkStore::refresh) at the start
/// of every pass and written back by [`flush`](BookmarkStore::flush) only if
/// the pass moved something. A file edited by someone else in between is
/// left alone and `flush` reports [`SortError::Conflict`].
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tree: MemoryStore,
    history: MemoryHistory,
    dirty: AtomicBool,
    /// File content as last read or written by this store.
    known: Mutex<Vec<u8>>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self> {
        let (file, content) = read_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            tree: MemoryStore::from_tree(file.root),
            history: MemoryHistory::from_map(file.history),
            dirty: AtomicBool::new(false),
            known: Mutex::new(content),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current tree and history back to disk.
    pub fn save(&self) -> Result<()> {
        let root = self
            .tree
            .to_tree()
            .ok_or_else(|| SortError::NotFound(self.tree.root_id().to_string()))?;
        let file = BookmarkFile {
            root,
            history: self.history.snapshot(),
        };
        let content = serde_json::to_vec_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        *lock(&self.known) = content;
        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BookmarkStore for JsonFileStore {
    fn root_id(&self) -> &str {
        self.tree.root_id()
    }

    async fn get_children(&self, folder_id: &str) -> Result<Option<Vec<Node>>> {
        self.tree.get_children(folder_id).await
    }

    async fn get_subtree(&self, folder_id: &str) -> Result<Option<Node>> {
        self.tree.get_subtree(folder_id).await
    }

    async fn move_item(&self, item_id: &str, index: usize) -> Result<()> {
        self.tree.move_item(item_id, index).await?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Reload the file. A file that cannot be read or parsed makes the store
    /// unavailable for this pass.
    async fn refresh(&self) -> Result<()> {
        let (file, content) = read_file(&self.path).map_err(|e| {
            SortError::StoreUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        if file.root.id != self.tree.root_id() {
            return Err(SortError::StoreUnavailable(format!(
                "{}: root id changed to {}",
                self.path.display(),
                file.root.id
            )));
        }
        self.tree.replace_tree(file.root);
        self.history.replace(file.history);
        *lock(&self.known) = content;
        self.dirty.store(false, Ordering::SeqCst);
        debug!(path = %self.path.display(), "bookmark file reloaded");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        if !self.dirty.load(Ordering::SeqCst) {
            return Ok(());
        }
        if std::fs::read(&self.path)? != *lock(&self.known) {
            warn!(path = %self.path.display(), "bookmark file changed during the pass; not overwriting it");
            self.dirty.store(false, Ordering::SeqCst);
            return Err(SortError::Conflict(self.path.display().to_string()));
        }
        self.save()?;
        debug!(path = %self.path.display(), "bookmark file written");
        Ok(())
    }
}

#[async_trait]
impl HistoryProvider for JsonFileStore {
    async fn get_visits(&self, url: &str) -> Result<Vec<Visit>> {
        self.history.get_visits(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MENU_ID, ROOT_ID};

    const SAMPLE: &str = r#"{
        "root": {
            "id": "root________",
            "title": "",
            "dateAdded": 0,
            "children": [
                {
                    "id": "menu________",
                    "title": "Menu",
                    "dateAdded": 0,
                    "children": [
                        { "id": "b", "title": "Beta", "url": "https://b.example/", "dateAdded": 1 },
                        { "id": "s", "url": "data:" },
                        { "id": "a", "title": "Alpha", "url": "https://a.example/", "dateAdded": 2 }
                    ]
                }
            ]
        },
        "history": { "https://a.example/": [5, 9] }
    }"#;

    fn sample_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bookmarks.json");
        std::fs::write(&path, SAMPLE).expect("write");
        (dir, path)
    }

    #[tokio::test]
    async fn opens_tree_and_history() {
        let (_dir, path) = sample_file();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.root_id(), ROOT_ID);
        let children = store.get_children(MENU_ID).await.unwrap().unwrap();
        let ids: Vec<&str> = children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "s", "a"]);
        assert_eq!(store.get_visits("https://a.example/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn flush_writes_only_after_moves() {
        let (_dir, path) = sample_file();
        let store = JsonFileStore::open(&path).unwrap();

        std::fs::write(&path, SAMPLE.replace("Beta", "Changed")).unwrap();
        store.flush().await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Changed"));

        store.refresh().await.unwrap();
        store.move_item("a", 0).await.unwrap();
        store.flush().await.unwrap();
        let reopened = JsonFileStore::open(&path).unwrap();
        let children = reopened.get_children(MENU_ID).await.unwrap().unwrap();
        let ids: Vec<&str> = children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "s"]);
        assert_eq!(reopened.get_visits("https://a.example/").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_picks_up_external_edits() {
        let (_dir, path) = sample_file();
        let store = JsonFileStore::open(&path).unwrap();
        std::fs::write(&path, SAMPLE.replace("\"Beta\"", "\"Zeta\"")).unwrap();
        store.refresh().await.unwrap();
        let children = store.get_children(MENU_ID).await.unwrap().unwrap();
        assert_eq!(children[0].title.as_deref(), Some("Zeta"));
    }

    #[tokio::test]
    async fn flush_keeps_edits_made_during_the_pass() {
        let (_dir, path) = sample_file();
        let store = JsonFileStore::open(&path).unwrap();
        store.refresh().await.unwrap();
        store.move_item("a", 0).await.unwrap();

        let edited = SAMPLE.replace("\"Beta\"", "\"Renamed\"");
        std::fs::write(&path, &edited).unwrap();
        let err = store.flush().await.unwrap_err();
        assert!(matches!(err, SortError::Conflict(_)));
        assert!(!err.is_terminal());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), edited);

        // The next pass starts from the edited file and may write again.
        store.refresh().await.unwrap();
        store.move_item("a", 0).await.unwrap();
        store.flush().await.unwrap();
        let children = JsonFileStore::open(&path)
            .unwrap()
            .get_children(MENU_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(children[0].id, "a");
        assert_eq!(children[1].title.as_deref(), Some("Renamed"));
    }

    #[tokio::test]
    async fn unreadable_file_makes_store_unavailable() {
        let (_dir, path) = sample_file();
        let store = JsonFileStore::open(&path).unwrap();
        std::fs::write(&path, "{ broken").unwrap();
        assert!(store.refresh().await.unwrap_err().is_terminal());
        std::fs::remove_file(&path).unwrap();
        assert!(store.refresh().await.unwrap_err().is_terminal());
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            JsonFileStore::open(&dir.path().join("none.json")),
            Err(SortError::Io(_))
        ));
    }
}
