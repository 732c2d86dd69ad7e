//! Stock ledger: the only code path that changes stock quantities.
//!
//! Every operation works on rows locked by the enclosing [`UnitOfWork`].
//! Availability is always checked against the row as read *after* its lock
//! was acquired (plus any change already made in the same unit), never
//! against an earlier unlocked read. That re-check is what prevents
//! overselling when two units race for the same product.

use tracing::warn;

use orderdesk_catalog::Product;
use orderdesk_core::{DomainError, DomainResult, ProductId};
use orderdesk_orders::{OrderItem, StockEffect};

use crate::storage::Storage;
use crate::unit_of_work::UnitOfWork;

pub struct StockLedger<'u, 's, S: Storage + ?Sized> {
    uow: &'u mut UnitOfWork<'s, S>,
}

impl<'u, 's, S: Storage + ?Sized> StockLedger<'u, 's, S> {
    pub(crate) fn new(uow: &'u mut UnitOfWork<'s, S>) -> Self {
        Self { uow }
    }

    /// Exclusively lock one product row for the rest of the unit of work.
    pub fn lock_for_update(&mut self, id: ProductId) -> DomainResult<&Product> {
        self.uow.lock_products([id])?;
        self.uow.product(id)
    }

    /// Lock several product rows; acquisition is in ascending id order
    /// whatever the order of `ids`.
    pub fn lock_all(&mut self, ids: impl IntoIterator<Item = ProductId>) -> DomainResult<()> {
        self.uow.lock_products(ids)
    }

    pub fn product(&self, id: ProductId) -> DomainResult<&Product> {
        self.uow.product(id)
    }

    pub fn available(&self, id: ProductId) -> DomainResult<u64> {
        Ok(self.uow.product(id)?.stock_quantity())
    }

    /// `OutOfStock` unless the locked row holds at least `quantity`.
    pub fn ensure_available(&self, id: ProductId, quantity: u64) -> DomainResult<()> {
        let product = self.uow.product(id)?;
        if product.has_stock_for(quantity) {
            return Ok(());
        }
        warn!(
            product_id = %id,
            stock = product.stock_quantity(),
            requested = quantity,
            "insufficient stock"
        );
        Err(DomainError::out_of_stock(format!(
            "product {id} has {} in stock, {quantity} requested",
            product.stock_quantity()
        )))
    }

    pub fn decrease(&mut self, id: ProductId, quantity: u64) -> DomainResult<()> {
        self.ensure_available(id, quantity)?;
        self.uow.product_mut(id)?.take_stock(quantity)
    }

    /// Add stock back. No upper bound beyond integer range.
    pub fn increase(&mut self, id: ProductId, quantity: u64) -> DomainResult<()> {
        self.uow.product_mut(id)?.restock(quantity)
    }

    /// Overwrite the stock level (catalog maintenance).
    pub fn set_quantity(&mut self, id: ProductId, quantity: u64) -> DomainResult<()> {
        self.uow.product_mut(id)?.set_stock(quantity);
        Ok(())
    }

    /// Carry out a transition's stock effect for every item of an order.
    ///
    /// All involved rows are locked up front, in ascending id order, before
    /// the first change. A failure on any item fails the whole call; the
    /// enclosing unit of work then discards the earlier items' changes.
    pub fn apply(&mut self, effect: StockEffect, items: &[OrderItem]) -> DomainResult<()> {
        if effect == StockEffect::None {
            return Ok(());
        }

        self.lock_all(items.iter().map(|item| item.product_id))?;

        for item in items {
            match effect {
                StockEffect::Decrease => self.decrease(item.product_id, item.quantity)?,
                StockEffect::Restore => self.increase(item.product_id, item.quantity)?,
                StockEffect::None => {}
            }
        }
        Ok(())
    }
}
