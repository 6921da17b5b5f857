use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, SortError>;

/// Sorter error types.
#[derive(Debug, Error)]
pub enum SortError {
    /// I/O errors from the bookmark or exclusion files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a bookmark or exclusion file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// An item or folder id that the store no longer knows about.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The host store refused an operation on an existing item.
    #[error("Rejected move of {id}: {reason}")]
    Rejected { id: String, reason: String },

    /// The host store cannot be reached at all. Aborts the current pass.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store's backing data changed behind the sorter's back, so the
    /// sorted copy was not written.
    #[error("Store changed externally: {0}")]
    Conflict(String),

    /// A configuration value that cannot be interpreted.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl SortError {
    /// Whether this error must end the in-progress pass.
    ///
    /// Everything else is absorbed where it happens so that one bad item or
    /// folder cannot block sorting of the rest of the tree.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SortError::StoreUnavailable(_))
    }
}
