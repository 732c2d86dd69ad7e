//! Order status lifecycle and its transition table.
//!
//! ```text
//! PENDING ──▶ RECEIVED ──▶ COMPLETED
//!    │            │            │
//!    └────────────┴────────────┴──▶ CANCELED (terminal)
//! ```
//!
//! Each status owns a [`TransitionRule`]: the set of statuses it may move to
//! and the stock effect of each move. The table is total over all statuses.

use serde::{Deserialize, Serialize};

use orderdesk_core::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Received,
    Completed,
    Canceled,
}

/// Stock operation a transition requires, applied to every item of the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Consume each item's quantity.
    Decrease,
    /// Give each item's quantity back.
    Restore,
}

/// Outgoing edges of one status.
#[derive(Debug)]
pub struct TransitionRule {
    pub targets: &'static [OrderStatus],
    side_effect: fn(OrderStatus) -> StockEffect,
}

impl TransitionRule {
    pub fn allows(&self, to: OrderStatus) -> bool {
        self.targets.contains(&to)
    }

    /// Stock effect of moving to `to`, or `None` when the edge does not exist.
    pub fn effect_of(&self, to: OrderStatus) -> Option<StockEffect> {
        self.allows(to).then(|| (self.side_effect)(to))
    }
}

fn no_effect(_: OrderStatus) -> StockEffect {
    StockEffect::None
}

fn decrease_on_complete(to: OrderStatus) -> StockEffect {
    match to {
        OrderStatus::Completed => StockEffect::Decrease,
        _ => StockEffect::None,
    }
}

fn restore_all(_: OrderStatus) -> StockEffect {
    StockEffect::Restore
}

static PENDING: TransitionRule = TransitionRule {
    targets: &[OrderStatus::Received, OrderStatus::Canceled],
    side_effect: no_effect,
};

static RECEIVED: TransitionRule = TransitionRule {
    targets: &[OrderStatus::Completed, OrderStatus::Canceled],
    side_effect: decrease_on_complete,
};

static COMPLETED: TransitionRule = TransitionRule {
    targets: &[OrderStatus::Canceled],
    side_effect: restore_all,
};

static CANCELED: TransitionRule = TransitionRule {
    targets: &[],
    side_effect: no_effect,
};

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Received,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    pub fn rule(self) -> &'static TransitionRule {
        match self {
            OrderStatus::Pending => &PENDING,
            OrderStatus::Received => &RECEIVED,
            OrderStatus::Completed => &COMPLETED,
            OrderStatus::Canceled => &CANCELED,
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.rule().allows(to)
    }

    pub fn is_terminal(self) -> bool {
        self.rule().targets.is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Canceled => "CANCELED",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DomainError::invalid_request(
                    "status must be one of: PENDING, RECEIVED, COMPLETED, CANCELED",
                )
            })
    }
}

pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    from.can_transition_to(to)
}

/// Stock effect of `from -> to`, or `InvalidStatusChange` if the edge is not in the table.
pub fn side_effect(from: OrderStatus, to: OrderStatus) -> Result<StockEffect, DomainError> {
    from.rule().effect_of(to).ok_or_else(|| {
        DomainError::invalid_status_change(format!("{from} -> {to} is not allowed"))
    })
}
