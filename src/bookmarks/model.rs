use serde::{Deserialize, Serialize};

use crate::store::{Node, NodeType, Visit};

/// Sort class of a leaf bookmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkKind {
    #[default]
    Normal,
    Livemark,
    SmartBookmark,
}

/// A leaf bookmark, rebuilt from the store at the start of every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub id: String,
    pub parent_id: Option<String>,
    /// Target position once sorted.
    pub index: usize,
    /// Position observed before this pass reordered anything.
    pub old_index: usize,
    pub title: String,
    pub url: String,
    pub date_added: i64,
    pub last_modified: i64,
    pub last_visited: i64,
    pub access_count: u64,
    pub kind: BookmarkKind,
    /// Required fields were missing; sorts last.
    pub corrupted: bool,
    pub keyword: Option<String>,
    pub description: Option<String>,
}

impl Bookmark {
    /// Fill `access_count` and `last_visited` from a visit list.
    pub fn apply_visits(&mut self, visits: &[Visit]) {
        if visits.is_empty() {
            return;
        }
        self.access_count = visits.len() as u64;
        self.last_visited = visits.iter().map(|v| v.visit_time).max().unwrap_or(0);
    }
}

/// A folder. `children` holds one inner list per sort partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: String,
    pub parent_id: Option<String>,
    pub index: usize,
    pub old_index: usize,
    pub title: String,
    pub date_added: i64,
    pub last_modified: i64,
    pub corrupted: bool,
    pub description: Option<String>,
    pub children: Vec<Vec<Item>>,
}

impl Folder {
    /// Build a folder (without children) from a store node.
    pub fn from_node(node: &Node) -> Self {
        let corrupted = node.title.is_none() || node.date_added.is_none();
        if corrupted {
            tracing::warn!(id = %node.id, "corrupted folder: missing title or date added");
        }
        Self {
            id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            index: node.index,
            old_index: node.index,
            title: node.title.clone().unwrap_or_default(),
            date_added: node.date_added.unwrap_or(0),
            last_modified: node.last_modified.unwrap_or(0),
            corrupted,
            description: None,
            children: Vec::new(),
        }
    }

    /// Whether any child got a position different from the one it had.
    pub fn has_move(&self) -> bool {
        self.children.iter().flatten().any(Item::has_moved)
    }
}

/// A separator. Never reordered; it only splits partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separator {
    pub id: String,
    pub parent_id: Option<String>,
    pub index: usize,
}

/// Anything that can live inside a folder.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Bookmark(Bookmark),
    Folder(Folder),
    Separator(Separator),
}

impl Item {
    /// Build an item from a store node. `annotations` copies the keyword and
    /// description, which only some sort keys need.
    pub fn from_node(node: &Node, annotations: bool) -> Self {
        match node.node_type() {
            NodeType::Separator => Item::Separator(Separator {
                id: node.id.clone(),
                parent_id: node.parent_id.clone(),
                index: node.index,
            }),
            NodeType::Folder => {
                let mut folder = Folder::from_node(node);
                if annotations {
                    folder.description = node.description.clone();
                }
                Item::Folder(folder)
            }
            NodeType::Bookmark => {
                let corrupted =
                    node.title.is_none() || node.url.is_none() || node.date_added.is_none();
                if corrupted {
                    tracing::warn!(
                        id = %node.id,
                        title = ?node.title,
                        url = ?node.url,
                        "corrupted bookmark found"
                    );
                }
                Item::Bookmark(Bookmark {
                    id: node.id.clone(),
                    parent_id: node.parent_id.clone(),
                    index: node.index,
                    old_index: node.index,
                    title: node.title.clone().unwrap_or_default(),
                    url: node.url.clone().unwrap_or_default(),
                    date_added: node.date_added.unwrap_or(0),
                    last_modified: node.last_modified.unwrap_or(0),
                    last_visited: 0,
                    access_count: 0,
                    kind: node.kind.unwrap_or_default(),
                    corrupted,
                    keyword: if annotations { node.keyword.clone() } else { None },
                    description: if annotations { node.description.clone() } else { None },
                })
            }
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Item::Bookmark(b) => &b.id,
            Item::Folder(f) => &f.id,
            Item::Separator(s) => &s.id,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Item::Bookmark(b) => b.index,
            Item::Folder(f) => f.index,
            Item::Separator(s) => s.index,
        }
    }

    pub fn old_index(&self) -> usize {
        match self {
            Item::Bookmark(b) => b.old_index,
            Item::Folder(f) => f.old_index,
            Item::Separator(s) => s.index,
        }
    }

    /// Assign the target position. `old_index` is left untouched.
    pub fn set_index(&mut self, index: usize) {
        match self {
            Item::Bookmark(b) => b.index = index,
            Item::Folder(f) => f.index = index,
            Item::Separator(s) => s.index = index,
        }
    }

    pub fn has_moved(&self) -> bool {
        self.index() != self.old_index()
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Item::Separator(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Item::Folder(_))
    }

    pub fn is_corrupted(&self) -> bool {
        match self {
            Item::Bookmark(b) => b.corrupted,
            Item::Folder(f) => f.corrupted,
            Item::Separator(_) => false,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Item::Bookmark(b) => &b.title,
            Item::Folder(f) => &f.title,
            Item::Separator(_) => "",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Item::Bookmark(b) => &b.url,
            _ => "",
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            Item::Bookmark(b) => b.keyword.as_deref().unwrap_or(""),
            _ => "",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Item::Bookmark(b) => b.description.as_deref().unwrap_or(""),
            Item::Folder(f) => f.description.as_deref().unwrap_or(""),
            Item::Separator(_) => "",
        }
    }

    pub fn date_added(&self) -> i64 {
        match self {
            Item::Bookmark(b) => b.date_added,
            Item::Folder(f) => f.date_added,
            Item::Separator(_) => 0,
        }
    }

    pub fn last_modified(&self) -> i64 {
        match self {
            Item::Bookmark(b) => b.last_modified,
            Item::Folder(f) => f.last_modified,
            Item::Separator(_) => 0,
        }
    }

    pub fn last_visited(&self) -> i64 {
        match self {
            Item::Bookmark(b) => b.last_visited,
            _ => 0,
        }
    }

    pub fn access_count(&self) -> i64 {
        match self {
            Item::Bookmark(b) => b.access_count as i64,
            _ => 0,
        }
    }
}

/// A position change to issue against the host store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOp {
    pub id: String,
    /// Final position of the item inside its folder.
    pub index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bookmark_from_complete_node() {
        let node = Node::bookmark("b1", "Rust", "https://www.rust-lang.org/").with_date_added(42);
        let item = Item::from_node(&node, false);
        assert!(matches!(item, Item::Bookmark(_)));
        assert!(!item.is_corrupted());
        assert_eq!(item.title(), "Rust");
        assert_eq!(item.date_added(), 42);
    }

    #[test]
    fn missing_fields_mark_corrupted() {
        let mut node = Node::bookmark("b1", "Rust", "https://www.rust-lang.org/");
        node.title = None;
        let item = Item::from_node(&node, false);
        assert!(item.is_corrupted());
        assert_eq!(item.title(), "");

        let mut folder = Node::folder("f1", "F");
        folder.date_added = None;
        assert!(Item::from_node(&folder, false).is_corrupted());
    }

    #[test]
    fn annotations_copied_only_on_request() {
        let mut node = Node::bookmark("b1", "Rust", "https://www.rust-lang.org/");
        node.keyword = Some("rs".into());
        assert_eq!(Item::from_node(&node, false).keyword(), "");
        assert_eq!(Item::from_node(&node, true).keyword(), "rs");
    }

    #[test]
    fn set_index_keeps_old_index() {
        let mut node = Node::bookmark("b1", "A", "https://a.example/");
        node.index = 3;
        let mut item = Item::from_node(&node, false);
        assert!(!item.has_moved());
        item.set_index(0);
        assert_eq!(item.index(), 0);
        assert_eq!(item.old_index(), 3);
        assert!(item.has_moved());
        item.set_index(3);
        assert!(!item.has_moved());
    }

    #[test]
    fn visits_fill_access_metadata() {
        let node = Node::bookmark("b1", "A", "https://a.example/");
        let Item::Bookmark(mut bookmark) = Item::from_node(&node, false) else {
            panic!("expected bookmark");
        };
        bookmark.apply_visits(&[Visit { visit_time: 10 }, Visit { visit_time: 30 }, Visit { visit_time: 20 }]);
        assert_eq!(bookmark.access_count, 3);
        assert_eq!(bookmark.last_visited, 30);
    }

    #[test]
    fn folder_has_move_checks_all_partitions() {
        let mut folder = Folder::from_node(&Node::folder("f", "F"));
        let mut a = Item::from_node(&Node::bookmark("a", "A", "https://a/"), false);
        let b = Item::from_node(&Node::bookmark("b", "B", "https://b/"), false);
        folder.children = vec![vec![b.clone()], vec![a.clone()]];
        assert!(!folder.has_move());
        a.set_index(5);
        folder.children = vec![vec![b], vec![a]];
        assert!(folder.has_move());
    }
}
