use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::bookmarks::comparator::{build, SortConfig};
use crate::bookmarks::engine::SortEngine;
use crate::bookmarks::exclusion::ExclusionRegistry;
use crate::bookmarks::walker::TreeWalker;
use crate::coalescer::{PassReport, SortPass};
use crate::error::{Result, SortError};
use crate::store::{BookmarkStore, HistoryProvider};

/// Everything one sort pass needs.
pub struct App<S: ?Sized, H: ?Sized> {
    store: Arc<S>,
    history: Arc<H>,
    registry: ExclusionRegistry,
    /// Where the registry is persisted after pruning; `None` keeps it in memory.
    registry_path: Option<PathBuf>,
    sort_config: SortConfig,
    root_ids: Vec<String>,
}

impl<S, H> App<S, H>
where
    S: BookmarkStore + ?Sized,
    H: HistoryProvider + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        history: Arc<H>,
        registry: ExclusionRegistry,
        sort_config: SortConfig,
        root_ids: Vec<String>,
    ) -> Self {
        Self {
            store,
            history,
            registry,
            registry_path: None,
            sort_config,
            root_ids,
        }
    }

    /// Persist the registry to `path` whenever a pass prunes it.
    pub fn with_registry_path(mut self, path: PathBuf) -> Self {
        self.registry_path = Some(path);
        self
    }

    pub fn registry(&self) -> &ExclusionRegistry {
        &self.registry
    }

    pub fn sort_config(&self) -> &SortConfig {
        &self.sort_config
    }

    pub fn root_ids(&self) -> &[String] {
        &self.root_ids
    }

    /// Run one full pass over every configured root.
    ///
    /// Only a terminal store failure aborts the pass; everything else is
    /// logged and counted in the report.
    pub async fn sort_all(&mut self) -> Result<PassReport> {
        info!(roots = ?self.root_ids, "sort pass started");
        self.store.refresh().await?;

        let (mut folders, existing) = {
            let walker = TreeWalker::new(self.store.as_ref(), &self.registry);
            let folders = walker.enumerate_folders_to_sort(&self.root_ids).await?;
            (folders, walker.existing_folder_ids().await?)
        };

        let mut report = PassReport {
            folders_visited: folders.len(),
            registry_pruned: self.registry.prune_missing(&existing),
            ..Default::default()
        };
        if report.registry_pruned > 0 {
            debug!(pruned = report.registry_pruned, "dropped exclusions of deleted folders");
            self.save_registry();
        }

        let comparator = build(&self.sort_config);
        let engine = SortEngine::new(
            self.store.as_ref(),
            self.history.as_ref(),
            &self.registry,
            &comparator,
        );
        for folder in folders.iter_mut() {
            let outcome = engine.sort_and_apply(folder).await?;
            if outcome.skipped {
                report.folders_skipped += 1;
            } else if outcome.moves_planned > 0 {
                report.folders_sorted += 1;
            }
            report.moves_applied += outcome.moves_applied;
            report.moves_failed += outcome.moves_failed;
        }

        match self.store.flush().await {
            Err(SortError::Conflict(what)) => {
                warn!(store = %what, "store changed during the pass; sorting again");
                report.rescan_needed = true;
            }
            other => other?,
        }
        Ok(report)
    }

    fn save_registry(&self) {
        if let Some(path) = &self.registry_path {
            if let Err(e) = self.registry.save(path) {
                warn!(path = %path.display(), error = %e, "could not save exclusions");
            }
        }
    }
}

#[async_trait]
impl<S, H> SortPass for App<S, H>
where
    S: BookmarkStore + ?Sized,
    H: HistoryProvider + ?Sized,
{
    async fn run_pass(&mut self) -> Result<PassReport> {
        self.sort_all().await
    }
}
