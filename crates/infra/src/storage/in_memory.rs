use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use orderdesk_catalog::{Category, Product};
use orderdesk_core::{DomainError, DomainResult, OrderId, Page, PageRequest, ProductId};
use orderdesk_orders::Order;

use super::r#trait::{ChangeSet, OrderFilter, RowKey, RowLock, Storage};

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
}

/// In-memory storage engine with row-level exclusive locks.
///
/// Committed rows live behind one `RwLock`, so readers never wait on row
/// locks and a change set becomes visible in a single write. Row locks are
/// separate per-row tokens created on first use.
///
/// Intended for tests/dev and for the simulator.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    row_locks: Mutex<HashMap<RowKey, Arc<Mutex<()>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn token(&self, key: RowKey) -> Arc<Mutex<()>> {
        self.row_locks.lock().entry(key).or_default().clone()
    }

    fn lock_row(&self, key: RowKey, timeout: Duration) -> DomainResult<RowLock> {
        let token = self.token(key);
        RowLock::acquire(key, &token, timeout).ok_or_else(|| {
            warn!(row = %key, timeout_ms = timeout.as_millis() as u64, "row lock timed out");
            DomainError::concurrency(format!("could not lock {key} within {timeout:?}"))
        })
    }

    fn is_locked(&self, key: RowKey) -> bool {
        self.row_locks
            .lock()
            .get(&key)
            .is_some_and(|token| token.is_locked())
    }
}

impl Storage for InMemoryStorage {
    fn lock_product(&self, id: ProductId, timeout: Duration) -> DomainResult<(RowLock, Product)> {
        if !self.tables.read().products.contains_key(&id) {
            return Err(DomainError::not_found(format!("product {id}")));
        }

        let lock = self.lock_row(RowKey::Product(id), timeout)?;

        // Re-read under the lock: this is the authoritative value.
        let product = self
            .tables
            .read()
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))?;
        Ok((lock, product))
    }

    fn lock_order(&self, id: OrderId, timeout: Duration) -> DomainResult<(RowLock, Order)> {
        if !self.tables.read().orders.contains_key(&id) {
            return Err(DomainError::not_found(format!("order {id}")));
        }

        let lock = self.lock_row(RowKey::Order(id), timeout)?;

        let order = self
            .tables
            .read()
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("order {id}")))?;
        Ok((lock, order))
    }

    fn find_product(&self, id: ProductId) -> DomainResult<Option<Product>> {
        Ok(self.tables.read().products.get(&id).cloned())
    }

    fn find_order(&self, id: OrderId) -> DomainResult<Option<Order>> {
        Ok(self.tables.read().orders.get(&id).cloned())
    }

    fn insert_product(&self, product: Product) -> DomainResult<()> {
        let mut tables = self.tables.write();
        if tables.products.contains_key(&product.id()) {
            return Err(DomainError::internal(format!(
                "product {} already exists",
                product.id()
            )));
        }
        tables.products.insert(product.id(), product);
        Ok(())
    }

    fn query_orders(&self, filter: &OrderFilter, page: PageRequest) -> DomainResult<Page<Order>> {
        let mut matching: Vec<Order> = self
            .tables
            .read()
            .orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        matching.sort_by_key(|order| (order.created_at(), order.id()));
        Ok(Page::slice(matching, page))
    }

    fn query_products(
        &self,
        category: Option<Category>,
        page: PageRequest,
    ) -> DomainResult<Page<Product>> {
        let matching: Vec<Product> = self
            .tables
            .read()
            .products
            .values()
            .filter(|product| category.is_none_or(|c| product.category() == c))
            .cloned()
            .collect();
        Ok(Page::slice(matching, page))
    }

    fn apply(&self, changes: ChangeSet) -> DomainResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        if let Some(key) = changes.locked_rows().find(|key| !self.is_locked(*key)) {
            return Err(DomainError::internal(format!("{key} written without holding its lock")));
        }

        let mut tables = self.tables.write();

        // Validate everything before the first write so a rejected change set leaves no trace.
        if let Some(order) = changes
            .inserted_orders
            .iter()
            .find(|o| tables.orders.contains_key(&o.id()))
        {
            return Err(DomainError::internal(format!("order {} already exists", order.id())));
        }
        if let Some(order) = changes
            .updated_orders
            .iter()
            .find(|o| !tables.orders.contains_key(&o.id()))
        {
            return Err(DomainError::not_found(format!("order {}", order.id())));
        }
        if let Some(product) = changes
            .updated_products
            .iter()
            .find(|p| !tables.products.contains_key(&p.id()))
        {
            return Err(DomainError::not_found(format!("product {}", product.id())));
        }

        for order in changes.inserted_orders.into_iter().chain(changes.updated_orders) {
            tables.orders.insert(order.id(), order);
        }
        for product in changes.updated_products {
            tables.products.insert(product.id(), product);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orderdesk_catalog::ProductDraft;
    use orderdesk_orders::OrderItem;

    fn seed_product(storage: &InMemoryStorage, stock: i64) -> ProductId {
        let draft = ProductDraft {
            name: "Juice".to_string(),
            unit_price: 2000,
            stock_quantity: stock,
            category: Category::Beverage,
        };
        let product = Product::create(ProductId::new(), &draft.validate().unwrap());
        let id = product.id();
        storage.insert_product(product).unwrap();
        id
    }

    fn order_for(product_id: ProductId) -> Order {
        let item = OrderItem {
            product_id,
            quantity: 1,
            unit_price: 2000,
        };
        Order::place(OrderId::new(), vec![item], Utc::now()).unwrap()
    }

    #[test]
    fn lock_missing_product_is_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage
            .lock_product(ProductId::new(), Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn second_lock_on_same_row_times_out() {
        let storage = InMemoryStorage::new();
        let id = seed_product(&storage, 5);

        let (held, _) = storage.lock_product(id, Duration::from_millis(10)).unwrap();
        let err = storage
            .lock_product(id, Duration::from_millis(20))
            .unwrap_err();
        assert!(err.is_retryable());

        drop(held);
        assert!(storage.lock_product(id, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn reads_do_not_wait_on_row_locks() {
        let storage = InMemoryStorage::new();
        let id = seed_product(&storage, 5);

        let _held = storage.lock_product(id, Duration::from_millis(10)).unwrap();
        let product = storage.find_product(id).unwrap().unwrap();
        assert_eq!(product.stock_quantity(), 5);
    }

    #[test]
    fn apply_rejects_unlocked_row_writes() {
        let storage = InMemoryStorage::new();
        let id = seed_product(&storage, 5);
        let mut product = storage.find_product(id).unwrap().unwrap();
        product.take_stock(1).unwrap();

        let err = storage
            .apply(ChangeSet {
                updated_products: vec![product],
                ..ChangeSet::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert_eq!(storage.find_product(id).unwrap().unwrap().stock_quantity(), 5);
    }

    #[test]
    fn rejected_change_set_writes_nothing() {
        let storage = InMemoryStorage::new();
        let id = seed_product(&storage, 5);
        let existing = order_for(id);
        storage
            .apply(ChangeSet {
                inserted_orders: vec![existing.clone()],
                ..ChangeSet::default()
            })
            .unwrap();

        let fresh = order_for(id);
        let err = storage
            .apply(ChangeSet {
                inserted_orders: vec![fresh.clone(), existing],
                ..ChangeSet::default()
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
        assert!(storage.find_order(fresh.id()).unwrap().is_none());
    }

    #[test]
    fn query_orders_filters_and_pages() {
        let storage = InMemoryStorage::new();
        let id = seed_product(&storage, 5);
        let orders: Vec<Order> = (0..5).map(|_| order_for(id)).collect();
        storage
            .apply(ChangeSet {
                inserted_orders: orders,
                ..ChangeSet::default()
            })
            .unwrap();

        let page = storage
            .query_orders(&OrderFilter::All, PageRequest::new(1, 2))
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_items, 5);

        let received = storage
            .query_orders(
                &OrderFilter::Status(orderdesk_orders::OrderStatus::Received),
                PageRequest::first(10),
            )
            .unwrap();
        assert_eq!(received.total_items, 0);
    }
}
