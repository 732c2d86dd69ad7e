//! Storage collaborator boundary.
//!
//! The order core needs two things from storage: atomic publication of a
//! unit of work's writes and row-level exclusive locks with a bounded wait.
//! This module defines that boundary and an in-memory engine providing it.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStorage;
pub use r#trait::{ChangeSet, OrderFilter, RowKey, RowLock, Storage};
