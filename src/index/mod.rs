//! Uniqueness constraints
//!
//! Keeps one hash index per `(label, property)` pair so that an id can be
//! claimed by at most one record of a category.

pub mod manager;
pub mod unique;

pub use manager::{ConstraintKey, ConstraintManager};
pub use unique::UniqueIndex;
