//! The sorting core: item model, ordering, exclusions and folder traversal.

pub mod collate;
pub mod comparator;
pub mod engine;
pub mod exclusion;
pub mod model;
pub mod walker;
