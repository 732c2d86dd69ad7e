use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use orderdesk_catalog::{Category, Product};
use orderdesk_core::{DomainResult, OrderId, Page, PageRequest, ProductId};
use orderdesk_orders::{Order, OrderStatus};

/// Identity of a lockable row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Product(ProductId),
    Order(OrderId),
}

impl core::fmt::Display for RowKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RowKey::Product(id) => write!(f, "product {id}"),
            RowKey::Order(id) => write!(f, "order {id}"),
        }
    }
}

/// Exclusive lock on one row, released on drop.
///
/// Owned by the unit of work that acquired it, so a lock never outlives its
/// unit of work.
pub struct RowLock {
    key: RowKey,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl RowLock {
    /// Try to take `token` for at most `timeout`. `None` on timeout.
    pub fn acquire(key: RowKey, token: &Arc<Mutex<()>>, timeout: Duration) -> Option<Self> {
        token
            .try_lock_arc_for(timeout)
            .map(|guard| Self { key, _guard: guard })
    }
}

impl core::fmt::Debug for RowLock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RowLock").field("key", &self.key).finish()
    }
}

/// Writes of one unit of work, published atomically by [`Storage::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub inserted_orders: Vec<Order>,
    pub updated_orders: Vec<Order>,
    pub updated_products: Vec<Product>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserted_orders.is_empty()
            && self.updated_orders.is_empty()
            && self.updated_products.is_empty()
    }

    /// Rows this change set overwrites; each must be locked by the writer.
    pub fn locked_rows(&self) -> impl Iterator<Item = RowKey> + '_ {
        self.updated_orders
            .iter()
            .map(|o| RowKey::Order(o.id()))
            .chain(self.updated_products.iter().map(|p| RowKey::Product(p.id())))
    }
}

/// Order listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    All,
    Status(OrderStatus),
    /// Created within `[start, end]` (both inclusive).
    CreatedBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            OrderFilter::All => true,
            OrderFilter::Status(status) => order.status() == *status,
            OrderFilter::CreatedBetween { start, end } => {
                order.created_at() >= *start && order.created_at() <= *end
            }
        }
    }
}

/// Durable storage collaborator of the order core.
///
/// ## Contract
///
/// - `lock_*` acquires an exclusive row lock bounded by `timeout` and returns
///   the row as read **after** the lock is held. Timeout is reported as
///   `ConcurrencyFailure`, an absent row as `NotFound`.
/// - `find_*` and `query_*` read committed state and never wait on row locks.
/// - `apply` publishes a [`ChangeSet`] all-or-nothing: readers observe either
///   none or all of it. Every overwritten row must be locked by the caller.
///
/// Callers that lock several rows must follow the global order: order rows
/// first, then product rows in ascending `ProductId`. [`crate::UnitOfWork`]
/// enforces this.
pub trait Storage: Send + Sync {
    fn lock_product(&self, id: ProductId, timeout: Duration) -> DomainResult<(RowLock, Product)>;

    fn lock_order(&self, id: OrderId, timeout: Duration) -> DomainResult<(RowLock, Order)>;

    fn find_product(&self, id: ProductId) -> DomainResult<Option<Product>>;

    fn find_order(&self, id: OrderId) -> DomainResult<Option<Order>>;

    fn insert_product(&self, product: Product) -> DomainResult<()>;

    /// Orders matching `filter`, by creation time then id.
    fn query_orders(&self, filter: &OrderFilter, page: PageRequest) -> DomainResult<Page<Order>>;

    /// Products, optionally of one category, by id.
    fn query_products(
        &self,
        category: Option<Category>,
        page: PageRequest,
    ) -> DomainResult<Page<Product>>;

    fn apply(&self, changes: ChangeSet) -> DomainResult<()>;
}

impl<S> Storage for Arc<S>
where
    S: Storage + ?Sized,
{
    fn lock_product(&self, id: ProductId, timeout: Duration) -> DomainResult<(RowLock, Product)> {
        (**self).lock_product(id, timeout)
    }

    fn lock_order(&self, id: OrderId, timeout: Duration) -> DomainResult<(RowLock, Order)> {
        (**self).lock_order(id, timeout)
    }

    fn find_product(&self, id: ProductId) -> DomainResult<Option<Product>> {
        (**self).find_product(id)
    }

    fn find_order(&self, id: OrderId) -> DomainResult<Option<Order>> {
        (**self).find_order(id)
    }

    fn insert_product(&self, product: Product) -> DomainResult<()> {
        (**self).insert_product(product)
    }

    fn query_orders(&self, filter: &OrderFilter, page: PageRequest) -> DomainResult<Page<Order>> {
        (**self).query_orders(filter, page)
    }

    fn query_products(
        &self,
        category: Option<Category>,
        page: PageRequest,
    ) -> DomainResult<Page<Product>> {
        (**self).query_products(category, page)
    }

    fn apply(&self, changes: ChangeSet) -> DomainResult<()> {
        (**self).apply(changes)
    }
}
