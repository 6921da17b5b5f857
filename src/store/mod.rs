//! Host bookmark store and history interfaces, plus the backends shipped with
//! the crate.

pub mod file;
pub mod memory;
pub mod watcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bookmarks::model::BookmarkKind;
use crate::error::Result;

/// Id of the implicit top-level container. It is never sorted.
pub const ROOT_ID: &str = "root________";
/// Bookmarks toolbar.
pub const TOOLBAR_ID: &str = "toolbar_____";
/// Bookmarks menu.
pub const MENU_ID: &str = "menu________";
/// Other (unfiled) bookmarks.
pub const UNFILED_ID: &str = "unfiled_____";
/// Mobile bookmarks.
pub const MOBILE_ID: &str = "mobile______";

/// URL the host uses to mark separators when no explicit type is given.
pub const SEPARATOR_URL: &str = "data:";

/// Structural type of a store node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Bookmark,
    Folder,
    Separator,
}

/// A node as reported by the host store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Absent for folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BookmarkKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only populated by `get_subtree` and in bookmark files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Node>>,
}

impl Node {
    /// Resolve the node type: explicit `type` wins, otherwise a missing URL
    /// means folder and the `data:` URL means separator.
    pub fn node_type(&self) -> NodeType {
        if let Some(t) = self.node_type {
            return t;
        }
        match self.url.as_deref() {
            None => NodeType::Folder,
            Some(SEPARATOR_URL) => NodeType::Separator,
            Some(_) => NodeType::Bookmark,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.node_type() == NodeType::Folder
    }

    /// A folder node with no children loaded.
    pub fn folder(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            node_type: Some(NodeType::Folder),
            date_added: Some(0),
            last_modified: Some(0),
            ..Default::default()
        }
    }

    pub fn bookmark(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            url: Some(url.into()),
            node_type: Some(NodeType::Bookmark),
            date_added: Some(0),
            last_modified: Some(0),
            ..Default::default()
        }
    }

    pub fn separator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: Some(SEPARATOR_URL.to_string()),
            node_type: Some(NodeType::Separator),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_kind(mut self, kind: BookmarkKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_date_added(mut self, date_added: i64) -> Self {
        self.date_added = Some(date_added);
        self
    }

    /// Collect the ids of this node and every folder beneath it.
    pub fn collect_folder_ids(&self, out: &mut std::collections::HashSet<String>) {
        if !self.is_folder() {
            return;
        }
        out.insert(self.id.clone());
        for child in self.children.iter().flatten() {
            child.collect_folder_ids(out);
        }
    }
}

/// One history visit of a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub visit_time: i64,
}

/// The host bookmark store.
///
/// `move_item` is absolute-position: the item is taken out of its parent and
/// re-inserted so that it ends up at `index` (clamped to the last slot).
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Id of the implicit top-level container.
    fn root_id(&self) -> &str;

    /// Immediate children of `folder_id` in their current order, or `None`
    /// when the folder does not exist (anymore).
    async fn get_children(&self, folder_id: &str) -> Result<Option<Vec<Node>>>;

    /// `folder_id` with its full nested `children`, or `None` if it is gone.
    async fn get_subtree(&self, folder_id: &str) -> Result<Option<Node>>;

    async fn move_item(&self, item_id: &str, index: usize) -> Result<()>;

    /// Called before a sort pass reads anything.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Called after a sort pass applied its moves.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Visit history lookup, keyed by exact URL.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn get_visits(&self, url: &str) -> Result<Vec<Visit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn node_type_derived_from_url() {
        let mut node = Node {
            id: "a".into(),
            ..Default::default()
        };
        assert_eq!(node.node_type(), NodeType::Folder);
        node.url = Some("data:".into());
        assert_eq!(node.node_type(), NodeType::Separator);
        node.url = Some("https://example.com/".into());
        assert_eq!(node.node_type(), NodeType::Bookmark);
    }

    #[test]
    fn explicit_type_wins() {
        let mut node = Node::bookmark("a", "A", "data:");
        assert_eq!(node.node_type(), NodeType::Bookmark);
        node.node_type = None;
        assert_eq!(node.node_type(), NodeType::Separator);
    }

    #[test]
    fn node_json_uses_camel_case() {
        let json = r#"{
            "id": "b1",
            "parentId": "menu________",
            "index": 2,
            "title": "Rust",
            "url": "https://www.rust-lang.org/",
            "dateAdded": 1000,
            "kind": "livemark"
        }"#;
        let node: Node = serde_json::from_str(json).expect("parse");
        assert_eq!(node.parent_id.as_deref(), Some("menu________"));
        assert_eq!(node.index, 2);
        assert_eq!(node.date_added, Some(1000));
        assert_eq!(node.last_modified, None);
        assert_eq!(node.kind, Some(BookmarkKind::Livemark));
        assert_eq!(node.node_type(), NodeType::Bookmark);
    }

    #[test]
    fn collect_folder_ids_skips_leaves() {
        let tree = Node::folder("f1", "F1").with_children(vec![
            Node::bookmark("b1", "B", "https://b.example/"),
            Node::folder("f2", "F2").with_children(vec![Node::folder("f3", "F3")]),
            Node::separator("s1"),
        ]);
        let mut ids = HashSet::new();
        tree.collect_folder_ids(&mut ids);
        let expected: HashSet<String> = ["f1", "f2", "f3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }
}
