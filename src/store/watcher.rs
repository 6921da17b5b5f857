use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind};
use tracing::{debug, warn};

use crate::error::{Result, SortError};
use crate::event::{ChangeEvent, ChangeKind, ChangeListener};

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Watches a bookmark file and reports edits through a [`ChangeListener`].
///
/// The parent directory is watched rather than the file itself so that
/// editors replacing the file (write to temp, rename over) keep being seen.
pub struct FileWatcher {
    path: PathBuf,
    /// Handle to the debouncer (dropped to stop watching).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(path: &Path, debounce: Duration, listener: ChangeListener) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| SortError::InvalidConfig(format!("not a file path: {}", path.display())))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let label = file_name.to_string_lossy().into_owned();
        let watched = file_name.clone();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    if touches_file(&events, &watched) {
                        // Dropped silently while a pass has the listener detached.
                        if listener.notify(ChangeEvent::new(ChangeKind::Changed, label.as_str())) {
                            debug!(file = %label, "bookmark file changed");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "file watcher error"),
            },
        )?;

        debouncer
            .watcher()
            .watch(&dir, notify::RecursiveMode::NonRecursive)?;

        Ok(Self {
            path: path.to_path_buf(),
            _debouncer: debouncer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether any debounced event refers to `file_name`.
fn touches_file(events: &[DebouncedEvent], file_name: &OsString) -> bool {
    events
        .iter()
        .filter(|e| e.kind == DebouncedEventKind::Any)
        .any(|e| is_watched_path(&e.path, file_name))
}

/// A path matches when its final component is exactly `file_name`.
pub fn is_watched_path(path: &Path, file_name: &OsString) -> bool {
    path.file_name().is_some_and(|n| n == file_name.as_os_str())
}
