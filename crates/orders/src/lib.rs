//! Orders domain module.
//!
//! The order lifecycle state machine and order construction rules,
//! implemented purely as deterministic domain logic (no IO, no locking, no
//! storage). Stock effects are described here and carried out by the stock
//! ledger in `orderdesk-infra`.

pub mod order;
pub mod status;

pub use order::{Order, OrderItem, OrderLine, PlaceOrder, StatusChange};
pub use status::{can_transition, side_effect, OrderStatus, StockEffect, TransitionRule};
