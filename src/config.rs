//! Sorter configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--file`, `--exclusions`)
//! 2. `$BSORT_CONFIG` environment variable (path to config file)
//! 3. Project-local `.bsort.toml` in the current working directory
//! 4. Global `~/.config/bsort/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::bookmarks::comparator::{SortConfig, SortKey, TypeRanks};
use crate::error::{Result, SortError};
use crate::store::{MENU_ID, MOBILE_ID, TOOLBAR_ID, UNFILED_ID};

// ── Section configs ──────────────────────────────────────────────────────────

/// Ordering keys.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SortSection {
    /// Primary key name, e.g. "title", "revurl", "access_count".
    pub by: Option<String>,
    pub reverse: Option<bool>,
    /// Secondary key name or "none".
    pub then_by: Option<String>,
    pub then_reverse: Option<bool>,
    /// Key for folder-vs-folder comparisons, or "none" to keep folder order.
    pub folder_by: Option<String>,
    pub folder_reverse: Option<bool>,
    pub case_insensitive: Option<bool>,
    /// Sort folders by `folder_by` instead of the primary key. Derived from
    /// the ranks when unset.
    pub different_folder_order: Option<bool>,
}

/// Type-class ranks; lower sorts first.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OrderSection {
    pub folder: Option<i32>,
    pub livemark: Option<i32>,
    pub smart_bookmark: Option<i32>,
    pub bookmark: Option<i32>,
}

/// Automatic sorting after changes.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AutoSortSection {
    pub enabled: Option<bool>,
    /// Quiet period in milliseconds.
    pub delay_ms: Option<u64>,
    /// How long listeners stay detached after a pass.
    pub settle_ms: Option<u64>,
}

/// Which well-known roots get sorted.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RootsSection {
    pub toolbar: Option<bool>,
    pub menu: Option<bool>,
    pub unfiled: Option<bool>,
    pub mobile: Option<bool>,
}

/// File locations.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    /// Bookmark JSON file.
    pub bookmarks: Option<PathBuf>,
    /// Exclusion registry JSON file.
    pub exclusions: Option<PathBuf>,
    pub watch_debounce_ms: Option<u64>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sort: SortSection,
    pub order: OrderSection,
    pub autosort: AutoSortSection,
    pub roots: RootsSection,
    pub store: StoreSection,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default quiet period before an automatic pass.
pub const DEFAULT_DELAY_MS: u64 = 3000;
/// Default time listeners stay detached after a pass.
pub const DEFAULT_SETTLE_MS: u64 = 3000;
/// Default file watcher debounce.
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_BOOKMARKS_FILE: &str = "bookmarks.json";
pub const DEFAULT_EXCLUSIONS_FILE: &str = "exclusions.json";

// ── Config file locator ──────────────────────────────────────────────────────

/// Candidate config file paths in priority order, without `--config`.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("BSORT_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".bsort.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("bsort").join("config.toml"));
    }

    paths
}

/// Read and parse a TOML config file. Returns `None` if the file doesn't
/// exist or can't be parsed (with a warning).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config file");
            None
        }
    }
}

fn parse_key(field: &str, value: Option<&str>, default: Option<SortKey>) -> Result<Option<SortKey>> {
    match value {
        Some(name) => SortKey::parse(name).map_err(|e| match e {
            SortError::InvalidConfig(msg) => {
                SortError::InvalidConfig(format!("[sort] {}: {}", field, msg))
            }
            other => other,
        }),
        None => Ok(default),
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            sort: SortSection {
                by: other.sort.by.clone().or(self.sort.by),
                reverse: other.sort.reverse.or(self.sort.reverse),
                then_by: other.sort.then_by.clone().or(self.sort.then_by),
                then_reverse: other.sort.then_reverse.or(self.sort.then_reverse),
                folder_by: other.sort.folder_by.clone().or(self.sort.folder_by),
                folder_reverse: other.sort.folder_reverse.or(self.sort.folder_reverse),
                case_insensitive: other.sort.case_insensitive.or(self.sort.case_insensitive),
                different_folder_order: other
                    .sort
                    .different_folder_order
                    .or(self.sort.different_folder_order),
            },
            order: OrderSection {
                folder: other.order.folder.or(self.order.folder),
                livemark: other.order.livemark.or(self.order.livemark),
                smart_bookmark: other.order.smart_bookmark.or(self.order.smart_bookmark),
                bookmark: other.order.bookmark.or(self.order.bookmark),
            },
            autosort: AutoSortSection {
                enabled: other.autosort.enabled.or(self.autosort.enabled),
                delay_ms: other.autosort.delay_ms.or(self.autosort.delay_ms),
                settle_ms: other.autosort.settle_ms.or(self.autosort.settle_ms),
            },
            roots: RootsSection {
                toolbar: other.roots.toolbar.or(self.roots.toolbar),
                menu: other.roots.menu.or(self.roots.menu),
                unfiled: other.roots.unfiled.or(self.roots.unfiled),
                mobile: other.roots.mobile.or(self.roots.mobile),
            },
            store: StoreSection {
                bookmarks: other.store.bookmarks.clone().or(self.store.bookmarks),
                exclusions: other.store.exclusions.clone().or(self.store.exclusions),
                watch_debounce_ms: other
                    .store
                    .watch_debounce_ms
                    .or(self.store.watch_debounce_ms),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Lowest priority first so that higher ones overwrite.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn ranks(&self) -> TypeRanks {
        let defaults = TypeRanks::default();
        TypeRanks {
            folder: self.order.folder.unwrap_or(defaults.folder),
            livemark: self.order.livemark.unwrap_or(defaults.livemark),
            smart_bookmark: self.order.smart_bookmark.unwrap_or(defaults.smart_bookmark),
            bookmark: self.order.bookmark.unwrap_or(defaults.bookmark),
        }
    }

    /// Validate the key names and build the ordering rules for a pass.
    pub fn sort_config(&self) -> Result<SortConfig> {
        let defaults = SortConfig::default();
        let ranks = self.ranks();
        let primary = parse_key("by", self.sort.by.as_deref(), Some(defaults.primary))?
            .ok_or_else(|| SortError::InvalidConfig("[sort] by: a primary key is required".into()))?;
        Ok(SortConfig {
            primary,
            primary_reverse: self.sort.reverse.unwrap_or(false),
            secondary: parse_key("then_by", self.sort.then_by.as_deref(), defaults.secondary)?,
            secondary_reverse: self.sort.then_reverse.unwrap_or(false),
            folder_key: parse_key("folder_by", self.sort.folder_by.as_deref(), defaults.folder_key)?,
            folder_reverse: self.sort.folder_reverse.unwrap_or(false),
            different_folder_order: self
                .sort
                .different_folder_order
                .unwrap_or_else(|| ranks.folders_distinct()),
            case_insensitive: self.sort.case_insensitive.unwrap_or(false),
            ranks,
        })
    }

    pub fn auto_sort_enabled(&self) -> bool {
        self.autosort.enabled.unwrap_or(true)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosort.delay_ms.unwrap_or(DEFAULT_DELAY_MS))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.autosort.settle_ms.unwrap_or(DEFAULT_SETTLE_MS))
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(
            self.store
                .watch_debounce_ms
                .unwrap_or(DEFAULT_WATCH_DEBOUNCE_MS),
        )
    }

    /// Roots to sort, in toolbar, menu, unfiled, mobile order.
    pub fn root_ids(&self) -> Vec<String> {
        [
            (self.roots.toolbar, TOOLBAR_ID),
            (self.roots.menu, MENU_ID),
            (self.roots.unfiled, UNFILED_ID),
            (self.roots.mobile, MOBILE_ID),
        ]
        .into_iter()
        .filter(|(enabled, _)| enabled.unwrap_or(true))
        .map(|(_, id)| id.to_string())
        .collect()
    }

    pub fn bookmarks_path(&self) -> PathBuf {
        self.store
            .bookmarks
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOOKMARKS_FILE))
    }

    pub fn exclusions_path(&self) -> PathBuf {
        self.store
            .exclusions
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXCLUSIONS_FILE))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
