//! Keeps a bookmark tree sorted.
//!
//! A sort pass walks the configured roots, orders every folder's children
//! with a configurable comparator (separators split a folder into
//! independently sorted runs) and issues only the moves needed. The
//! [`coalescer`] turns bursts of store changes into a single pass.

pub mod app;
pub mod bookmarks;
pub mod coalescer;
pub mod config;
pub mod error;
pub mod event;
pub mod store;
