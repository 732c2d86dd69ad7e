//! Infrastructure layer: storage collaborator, unit of work, stock ledger,
//! and the order/catalog use cases built on them.

pub mod clock;
pub mod config;
pub mod order_service;
pub mod product_service;
pub mod stock_ledger;
pub mod storage;
pub mod unit_of_work;


pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use order_service::OrderService;
pub use product_service::ProductService;
pub use stock_ledger::StockLedger;
pub use storage::{ChangeSet, InMemoryStorage, OrderFilter, RowKey, RowLock, Storage};
pub use unit_of_work::UnitOfWork;
