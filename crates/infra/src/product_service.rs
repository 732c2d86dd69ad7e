//! Catalog maintenance.
//!
//! Updates go through a unit of work and the stock ledger, so a restock
//! serializes with any order transition touching the same product.

use tracing::info;

use orderdesk_catalog::{Category, Product, ProductDraft};
use orderdesk_core::{DomainError, DomainResult, Page, PageRequest, ProductId};

use crate::config::Config;
use crate::storage::Storage;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone)]
pub struct ProductService<S> {
    storage: S,
    config: Config,
}

impl<S: Storage> ProductService<S> {
    pub fn new(storage: S, config: Config) -> Self {
        Self { storage, config }
    }

    pub fn create(&self, draft: &ProductDraft) -> DomainResult<Product> {
        let valid = draft.validate()?;
        let product = Product::create(ProductId::new(), &valid);
        self.storage.insert_product(product.clone())?;

        info!(
            product_id = %product.id(),
            category = %product.category(),
            stock = product.stock_quantity(),
            "product created"
        );
        Ok(product)
    }

    /// Replace a product's details and stock level.
    pub fn update(&self, id: ProductId, draft: &ProductDraft) -> DomainResult<Product> {
        let valid = draft.validate()?;

        let mut uow = UnitOfWork::begin(&self.storage, self.config.lock_timeout);
        let mut stock = uow.stock();
        let previous = stock.lock_for_update(id)?.stock_quantity();
        stock.set_quantity(id, valid.stock_quantity)?;
        let updated = {
            let product = uow.product_mut(id)?;
            product.update_details(&valid);
            product.clone()
        };
        uow.commit()?;

        info!(
            product_id = %id,
            previous_stock = previous,
            stock = updated.stock_quantity(),
            "product updated"
        );
        Ok(updated)
    }

    pub fn get(&self, id: ProductId) -> DomainResult<Product> {
        self.storage
            .find_product(id)?
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))
    }

    pub fn list(&self, page: PageRequest) -> DomainResult<Page<Product>> {
        self.storage.query_products(None, self.config.normalize(page))
    }

    pub fn list_by_category(
        &self,
        category: Category,
        page: PageRequest,
    ) -> DomainResult<Page<Product>> {
        self.storage
            .query_products(Some(category), self.config.normalize(page))
    }
}
