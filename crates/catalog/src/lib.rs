//! Product catalog domain module.
//!
//! Stock records and their invariants, implemented purely as deterministic
//! domain logic (no IO, no locking, no storage).

pub mod product;

pub use product::{Category, Product, ProductDraft, ValidDraft};
