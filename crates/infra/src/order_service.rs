//! Order orchestration (application-level use cases).
//!
//! ## Create
//!
//! ```text
//! PlaceOrder
//!   ↓
//! 1. Validate + merge duplicate lines (no locks yet)
//!   ↓
//! 2. Lock product rows, ascending ProductId (items keep request order)
//!   ↓
//! 3. Check availability against the locked rows
//!   ↓
//! 4. Build PENDING order, snapshot unit prices
//!   ↓
//! 5. Commit
//! ```
//!
//! Creating an order does not consume stock; only `RECEIVED → COMPLETED` does.
//! The availability check in step 3 rejects orders that could never be
//! completed with today's stock.
//!
//! ## Status change
//!
//! ```text
//! StatusChange
//!   ↓
//! 1. Require a target status (no locks yet)
//!   ↓
//! 2. Lock the order row
//!   ↓
//! 3. Plan the transition from the table (InvalidStatusChange if absent)
//!   ↓
//! 4. Carry out the stock effect through the ledger
//!   ↓
//! 5. Record status + updated_at, commit
//! ```
//!
//! Every step runs inside one [`UnitOfWork`]; an error at any step drops it,
//! which releases all locks and discards every staged write.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use orderdesk_core::{DomainError, DomainResult, OrderId, Page, PageRequest};
use orderdesk_orders::{Order, OrderItem, OrderStatus, PlaceOrder, StatusChange};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::storage::{OrderFilter, Storage};
use crate::unit_of_work::UnitOfWork;

/// Order use cases over a storage collaborator.
#[derive(Debug, Clone)]
pub struct OrderService<S, C = SystemClock> {
    storage: S,
    clock: C,
    config: Config,
}

impl<S: Storage> OrderService<S, SystemClock> {
    pub fn new(storage: S, config: Config) -> Self {
        Self::with_clock(storage, SystemClock, config)
    }
}

impl<S: Storage, C: Clock> OrderService<S, C> {
    pub fn with_clock(storage: S, clock: C, config: Config) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Place a new order in `PENDING`.
    pub fn create(&self, request: &PlaceOrder) -> DomainResult<Order> {
        let lines = request.merged_lines()?;

        let mut uow = UnitOfWork::begin(&self.storage, self.config.lock_timeout);
        let mut stock = uow.stock();
        stock.lock_all(lines.iter().map(|&(product_id, _)| product_id))?;

        // Locks are taken in ascending id order; items keep request order.
        let mut items = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in &lines {
            stock.ensure_available(product_id, quantity)?;
            items.push(OrderItem {
                product_id,
                quantity,
                unit_price: stock.product(product_id)?.unit_price(),
            });
        }

        let order = Order::place(OrderId::new(), items, self.clock.now())?;
        uow.insert_order(order.clone());
        uow.commit()?;

        info!(
            order_id = %order.id(),
            items = order.items().len(),
            total_amount = order.total_amount(),
            "order created"
        );
        Ok(order)
    }

    /// Move an order to another status, carrying out the transition's stock effect.
    pub fn update_status(&self, order_id: OrderId, change: &StatusChange) -> DomainResult<Order> {
        let to = change.target()?;

        let result = self.transition(order_id, to);
        match &result {
            Ok(order) => info!(order_id = %order_id, status = %order.status(), "order status changed"),
            Err(err) => warn!(
                order_id = %order_id,
                to = %to,
                code = err.code(),
                error = %err,
                "order status change failed"
            ),
        }
        result
    }

    fn transition(&self, order_id: OrderId, to: OrderStatus) -> DomainResult<Order> {
        let mut uow = UnitOfWork::begin(&self.storage, self.config.lock_timeout);

        let order = uow.lock_order(order_id)?;
        let effect = order.plan_transition(to)?;
        let items = order.items().to_vec();

        uow.stock().apply(effect, &items)?;

        let now = self.clock.now();
        let order = uow.order_mut(order_id)?;
        order.apply_status(to, now)?;
        let updated = order.clone();

        uow.commit()?;
        Ok(updated)
    }

    pub fn get(&self, order_id: OrderId) -> DomainResult<Order> {
        self.storage
            .find_order(order_id)?
            .ok_or_else(|| DomainError::not_found(format!("order {order_id}")))
    }

    pub fn list(&self, page: PageRequest) -> DomainResult<Page<Order>> {
        self.query(OrderFilter::All, page)
    }

    pub fn list_by_status(&self, status: OrderStatus, page: PageRequest) -> DomainResult<Page<Order>> {
        self.query(OrderFilter::Status(status), page)
    }

    /// Orders created within `[start, end]`, both bounds inclusive.
    pub fn list_by_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page: PageRequest,
    ) -> DomainResult<Page<Order>> {
        if start > end {
            return Err(DomainError::invalid_request(format!(
                "period start {start} is after end {end}"
            )));
        }
        self.query(OrderFilter::CreatedBetween { start, end }, page)
    }

    fn query(&self, filter: OrderFilter, page: PageRequest) -> DomainResult<Page<Order>> {
        self.storage.query_orders(&filter, self.config.normalize(page))
    }
}
