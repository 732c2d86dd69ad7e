//! Explicit, scoped unit of work.
//!
//! ```text
//! begin
//!   ↓
//! lock order rows        (optional, ascending OrderId)
//!   ↓
//! lock product rows      (ascending ProductId, via StockLedger)
//!   ↓
//! read / mutate staged copies
//!   ↓
//! commit  ── Storage::apply(ChangeSet) ── release locks
//! ```
//!
//! Dropping a unit of work without committing is a rollback: staged copies
//! are discarded and every row lock is released. This holds on every exit
//! path, including early `?` returns.
//!
//! ## Lock protocol
//!
//! Any code locking more than one row goes through this type, which enforces
//! a single global acquisition order:
//!
//! 1. order rows before product rows;
//! 2. within each kind, ascending identifier.
//!
//! A request that would acquire a row out of order is rejected with
//! `DomainError::Internal` before it can block. Two units of work can
//! therefore never wait on each other in a cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::debug;

use orderdesk_catalog::Product;
use orderdesk_core::{DomainError, DomainResult, OrderId, ProductId};
use orderdesk_orders::Order;

use crate::stock_ledger::StockLedger;
use crate::storage::{ChangeSet, RowLock, Storage};

#[derive(Debug)]
struct Held<T> {
    _lock: RowLock,
    row: T,
    dirty: bool,
}

impl<T> Held<T> {
    fn new(lock: RowLock, row: T) -> Self {
        Self {
            _lock: lock,
            row,
            dirty: false,
        }
    }
}

pub struct UnitOfWork<'s, S: Storage + ?Sized> {
    storage: &'s S,
    lock_timeout: Duration,
    orders: BTreeMap<OrderId, Held<Order>>,
    products: BTreeMap<ProductId, Held<Product>>,
    inserted_orders: Vec<Order>,
    committed: bool,
}

impl<'s, S: Storage + ?Sized> UnitOfWork<'s, S> {
    pub fn begin(storage: &'s S, lock_timeout: Duration) -> Self {
        Self {
            storage,
            lock_timeout,
            orders: BTreeMap::new(),
            products: BTreeMap::new(),
            inserted_orders: Vec::new(),
            committed: false,
        }
    }

    /// Lock an order row and return its current committed state.
    pub fn lock_order(&mut self, id: OrderId) -> DomainResult<&Order> {
        if !self.orders.contains_key(&id) {
            if !self.products.is_empty() {
                return Err(DomainError::internal(
                    "lock order violated: order rows must be locked before product rows",
                ));
            }
            if let Some((&highest, _)) = self.orders.last_key_value() {
                if id < highest {
                    return Err(DomainError::internal(format!(
                        "lock order violated: order {id} requested after order {highest}"
                    )));
                }
            }

            let (lock, order) = self.storage.lock_order(id, self.lock_timeout)?;
            debug!(order_id = %id, "order row locked");
            self.orders.insert(id, Held::new(lock, order));
        }
        self.order(id)
    }

    /// A locked order row (staged state).
    pub fn order(&self, id: OrderId) -> DomainResult<&Order> {
        self.orders
            .get(&id)
            .map(|held| &held.row)
            .ok_or_else(|| DomainError::internal(format!("order {id} is not locked")))
    }

    pub fn order_mut(&mut self, id: OrderId) -> DomainResult<&mut Order> {
        let held = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| DomainError::internal(format!("order {id} is not locked")))?;
        held.dirty = true;
        Ok(&mut held.row)
    }

    /// Stage a new order for insertion at commit.
    pub fn insert_order(&mut self, order: Order) {
        self.inserted_orders.push(order);
    }

    /// Stock accounting over this unit's product rows.
    pub fn stock(&mut self) -> StockLedger<'_, 's, S> {
        StockLedger::new(self)
    }

    /// A locked product row (staged state).
    pub fn product(&self, id: ProductId) -> DomainResult<&Product> {
        self.products
            .get(&id)
            .map(|held| &held.row)
            .ok_or_else(|| DomainError::internal(format!("product {id} is not locked")))
    }

    pub fn is_product_locked(&self, id: ProductId) -> bool {
        self.products.contains_key(&id)
    }

    /// Lock every product in `ids` not yet held, in ascending id order.
    pub(crate) fn lock_products(
        &mut self,
        ids: impl IntoIterator<Item = ProductId>,
    ) -> DomainResult<()> {
        let wanted: BTreeSet<ProductId> = ids
            .into_iter()
            .filter(|id| !self.products.contains_key(id))
            .collect();

        if let (Some(&lowest), Some((&highest, _))) =
            (wanted.first(), self.products.last_key_value())
        {
            if lowest < highest {
                return Err(DomainError::internal(format!(
                    "lock order violated: product {lowest} requested after product {highest}"
                )));
            }
        }

        for id in wanted {
            let (lock, product) = self.storage.lock_product(id, self.lock_timeout)?;
            debug!(product_id = %id, stock = product.stock_quantity(), "product row locked");
            self.products.insert(id, Held::new(lock, product));
        }
        Ok(())
    }

    pub(crate) fn product_mut(&mut self, id: ProductId) -> DomainResult<&mut Product> {
        let held = self
            .products
            .get_mut(&id)
            .ok_or_else(|| DomainError::internal(format!("product {id} is not locked")))?;
        held.dirty = true;
        Ok(&mut held.row)
    }

    /// Publish all staged writes atomically, then release every lock.
    ///
    /// On error nothing is published and the locks are released as well.
    pub fn commit(mut self) -> DomainResult<()> {
        let changes = ChangeSet {
            inserted_orders: std::mem::take(&mut self.inserted_orders),
            updated_orders: dirty_rows(&self.orders),
            updated_products: dirty_rows(&self.products),
        };

        self.storage.apply(changes)?;
        self.committed = true;
        Ok(())
    }
}

fn dirty_rows<K, T: Clone>(rows: &BTreeMap<K, Held<T>>) -> Vec<T> {
    rows.values()
        .filter(|held| held.dirty)
        .map(|held| held.row.clone())
        .collect()
}

impl<S: Storage + ?Sized> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if !self.committed
            && !(self.orders.is_empty() && self.products.is_empty() && self.inserted_orders.is_empty())
        {
            debug!(
                orders = self.orders.len(),
                products = self.products.len(),
                "unit of work rolled back"
            );
        }
    }
}

impl<S: Storage + ?Sized> core::fmt::Debug for UnitOfWork<'_, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("lock_timeout", &self.lock_timeout)
            .field("orders", &self.orders.keys().collect::<Vec<_>>())
            .field("products", &self.products.keys().collect::<Vec<_>>())
            .field("inserted_orders", &self.inserted_orders.len())
            .field("committed", &self.committed)
            .finish()
    }
}
