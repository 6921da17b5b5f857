use std::borrow::Cow;
use std::cmp::Ordering;

use crate::bookmarks::collate::compare_text;
use crate::bookmarks::model::{BookmarkKind, Item};
use crate::error::{Result, SortError};

/// A field items can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Url,
    /// URL with its host labels reversed (`com.example.www/path`), which
    /// groups subdomains of the same site together.
    ReversedHost,
    Hostname,
    Keyword,
    Description,
    DateAdded,
    LastModified,
    LastVisited,
    AccessCount,
}

impl SortKey {
    /// Parse a key name as written in config files.
    ///
    /// Returns `Ok(None)` for `"none"`.
    pub fn parse(name: &str) -> Result<Option<Self>> {
        let key = match name.trim().to_ascii_lowercase().as_str() {
            "none" | "" => return Ok(None),
            "title" | "name" => SortKey::Title,
            "url" => SortKey::Url,
            "revurl" | "reversed_host" => SortKey::ReversedHost,
            "hostname" | "host" => SortKey::Hostname,
            "keyword" => SortKey::Keyword,
            "description" => SortKey::Description,
            "date_added" | "dateadded" => SortKey::DateAdded,
            "last_modified" | "lastmodified" => SortKey::LastModified,
            "last_visited" | "lastvisited" => SortKey::LastVisited,
            "access_count" | "accesscount" => SortKey::AccessCount,
            other => {
                return Err(SortError::InvalidConfig(format!("unknown sort key '{}'", other)))
            }
        };
        Ok(Some(key))
    }

    /// Config-file name of the key.
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Url => "url",
            SortKey::ReversedHost => "revurl",
            SortKey::Hostname => "hostname",
            SortKey::Keyword => "keyword",
            SortKey::Description => "description",
            SortKey::DateAdded => "date_added",
            SortKey::LastModified => "last_modified",
            SortKey::LastVisited => "last_visited",
            SortKey::AccessCount => "access_count",
        }
    }

    /// Whether the key reads the keyword/description annotations.
    pub fn needs_annotations(&self) -> bool {
        matches!(self, SortKey::Keyword | SortKey::Description)
    }

    fn extract<'a>(&self, item: &'a Item) -> KeyValue<'a> {
        match self {
            SortKey::Title => KeyValue::Text(Cow::Borrowed(item.title())),
            SortKey::Url => KeyValue::Text(Cow::Borrowed(item.url())),
            SortKey::ReversedHost => KeyValue::Text(Cow::Owned(reverse_base_url(item.url()))),
            SortKey::Hostname => KeyValue::Text(Cow::Owned(hostname(item.url()))),
            SortKey::Keyword => KeyValue::Text(Cow::Borrowed(item.keyword())),
            SortKey::Description => KeyValue::Text(Cow::Borrowed(item.description())),
            SortKey::DateAdded => KeyValue::Number(item.date_added()),
            SortKey::LastModified => KeyValue::Number(item.last_modified()),
            SortKey::LastVisited => KeyValue::Number(item.last_visited()),
            SortKey::AccessCount => KeyValue::Number(item.access_count()),
        }
    }
}

enum KeyValue<'a> {
    Text(Cow<'a, str>),
    Number(i64),
}

/// Host of `url`, or `""` when it cannot be parsed.
pub fn hostname(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_default()
}

/// `url` without its `scheme://` prefix and with the labels of its first
/// `/`-delimited segment reversed; everything after that segment is kept
/// as is: `http://www.test.com/a#b` becomes `com.test.www/a#b`.
///
/// Text without a `scheme://` prefix is treated the same way from its start,
/// so `file:///x` keeps its path and `place:sort=8` passes through.
pub fn reverse_base_url(url: &str) -> String {
    let rest = match url.find("://") {
        Some(i) if i > 0 && !url[..i].contains(char::is_whitespace) => &url[i + 3..],
        _ => url,
    };
    let (host, tail) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let mut out = host.rsplit('.').collect::<Vec<_>>().join(".");
    out.push_str(tail);
    out
}

/// Cross-type precedence. Lower ranks sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRanks {
    pub folder: i32,
    pub livemark: i32,
    pub smart_bookmark: i32,
    pub bookmark: i32,
}

impl Default for TypeRanks {
    fn default() -> Self {
        Self {
            folder: 1,
            livemark: 2,
            smart_bookmark: 3,
            bookmark: 4,
        }
    }
}

impl TypeRanks {
    pub fn rank_of(&self, item: &Item) -> i32 {
        match item {
            Item::Folder(_) => self.folder,
            Item::Bookmark(b) => match b.kind {
                BookmarkKind::Normal => self.bookmark,
                BookmarkKind::Livemark => self.livemark,
                BookmarkKind::SmartBookmark => self.smart_bookmark,
            },
            Item::Separator(_) => self.bookmark,
        }
    }

    /// Folders form their own class when no other type shares their rank.
    pub fn folders_distinct(&self) -> bool {
        self.folder != self.livemark
            && self.folder != self.smart_bookmark
            && self.folder != self.bookmark
    }
}

/// Ordering rules for one sort pass. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    pub primary: SortKey,
    pub primary_reverse: bool,
    pub secondary: Option<SortKey>,
    pub secondary_reverse: bool,
    /// Key for folder-vs-folder comparisons when `different_folder_order` is set.
    pub folder_key: Option<SortKey>,
    pub folder_reverse: bool,
    pub different_folder_order: bool,
    pub case_insensitive: bool,
    pub ranks: TypeRanks,
}

impl Default for SortConfig {
    fn default() -> Self {
        let ranks = TypeRanks::default();
        Self {
            primary: SortKey::Title,
            primary_reverse: false,
            secondary: None,
            secondary_reverse: false,
            folder_key: Some(SortKey::Title),
            folder_reverse: false,
            different_folder_order: ranks.folders_distinct(),
            case_insensitive: false,
            ranks,
        }
    }
}

impl SortConfig {
    /// Whether any configured key reads keyword/description annotations.
    pub fn needs_annotations(&self) -> bool {
        std::iter::once(Some(self.primary))
            .chain([self.secondary, self.folder_key])
            .flatten()
            .any(|k| k.needs_annotations())
    }
}

/// Total order over items, built from a [`SortConfig`].
#[derive(Debug, Clone)]
pub struct Comparator {
    config: SortConfig,
}

/// Build the comparator for `config`.
pub fn build(config: &SortConfig) -> Comparator {
    Comparator {
        config: config.clone(),
    }
}

impl Comparator {
    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        match (a.is_corrupted(), b.is_corrupted()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        if self.config.different_folder_order && a.is_folder() && b.is_folder() {
            return match self.config.folder_key {
                Some(key) => self.compare_key(key, self.config.folder_reverse, a, b),
                None => Ordering::Equal,
            };
        }

        let ranks = &self.config.ranks;
        ranks
            .rank_of(a)
            .cmp(&ranks.rank_of(b))
            .then_with(|| self.compare_key(self.config.primary, self.config.primary_reverse, a, b))
            .then_with(|| match self.config.secondary {
                Some(key) => self.compare_key(key, self.config.secondary_reverse, a, b),
                None => Ordering::Equal,
            })
    }

    fn compare_key(&self, key: SortKey, reverse: bool, a: &Item, b: &Item) -> Ordering {
        let ord = match (key.extract(a), key.extract(b)) {
            (KeyValue::Text(x), KeyValue::Text(y)) => {
                compare_text(&x, &y, self.config.case_insensitive)
            }
            (KeyValue::Number(x), KeyValue::Number(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        };
        if reverse {
            ord.reverse()
        } else {
            ord
        }
    }
}
