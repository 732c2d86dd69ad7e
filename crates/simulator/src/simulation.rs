//! Concurrent order race against the in-memory engine.
//!
//! Workers place random orders, advance them to `RECEIVED`, race them to
//! `COMPLETED` and cancel some afterwards. When all workers are done the
//! stock of every product must equal its seed minus what the orders that are
//! still `COMPLETED` consumed.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use orderdesk_catalog::{Category, ProductDraft};
use orderdesk_core::{DomainError, DomainResult, OrderId, PageRequest, ProductId};
use orderdesk_infra::{Config, InMemoryStorage, OrderService, ProductService};
use orderdesk_orders::{Order, OrderLine, OrderStatus, PlaceOrder, StatusChange};

type SharedStorage = std::sync::Arc<InMemoryStorage>;

const MAX_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(5);
const CANCEL_RATIO: f64 = 0.25;
const MAX_LINES: usize = 3;
const MAX_QUANTITY: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub products: usize,
    pub stock: i64,
    pub workers: usize,
    pub orders_per_worker: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            products: 4,
            stock: 50,
            workers: 8,
            orders_per_worker: 25,
        }
    }
}

impl Settings {
    /// Positional `[products] [stock] [workers] [orders-per-worker]`; missing
    /// arguments keep their default.
    pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
        if args.len() > 4 {
            bail!("expected at most 4 arguments, got {}", args.len());
        }

        let mut settings = Self::default();
        if let Some(raw) = args.first() {
            settings.products = parse(raw, "products")?;
        }
        if let Some(raw) = args.get(1) {
            settings.stock = parse(raw, "stock")?;
        }
        if let Some(raw) = args.get(2) {
            settings.workers = parse(raw, "workers")?;
        }
        if let Some(raw) = args.get(3) {
            settings.orders_per_worker = parse(raw, "orders-per-worker")?;
        }

        if settings.products == 0 || settings.workers == 0 {
            bail!("products and workers must be at least 1");
        }
        if settings.stock < 0 {
            bail!("stock cannot be negative");
        }
        Ok(settings)
    }
}

fn parse<T: std::str::FromStr>(raw: &str, name: &str) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse()
        .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'"))
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub product_id: ProductId,
    pub seed_stock: u64,
    pub final_stock: u64,
    pub consumed_by_completed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub settings: Settings,
    pub elapsed_ms: u64,
    pub orders_created: u64,
    pub completions: u64,
    pub cancellations_after_completion: u64,
    pub retries: u64,
    /// Failed operations by error code.
    pub failures: BTreeMap<&'static str, u64>,
    pub products: Vec<ProductReport>,
    pub invariant_holds: bool,
    pub violations: Vec<String>,
}

#[derive(Debug, Default)]
struct Tally {
    created: u64,
    completed: u64,
    canceled: u64,
    retries: u64,
    failures: BTreeMap<&'static str, u64>,
}

impl Tally {
    fn fail(&mut self, err: &DomainError) {
        *self.failures.entry(err.code()).or_default() += 1;
    }

    fn merge(&mut self, other: Tally) {
        self.created += other.created;
        self.completed += other.completed;
        self.canceled += other.canceled;
        self.retries += other.retries;
        for (code, count) in other.failures {
            *self.failures.entry(code).or_default() += count;
        }
    }

    /// Run `op`, retrying `ConcurrencyFailure` with jittered exponential backoff.
    fn retrying<T>(&mut self, mut op: impl FnMut() -> DomainResult<T>) -> DomainResult<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    self.retries += 1;
                    let jitter = rand::thread_rng().gen_range(0.5..=1.0);
                    let delay = RETRY_BASE_DELAY.mul_f64(f64::from(1u32 << attempt) * jitter);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after lock timeout");
                    thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

pub struct Simulation {
    settings: Settings,
    orders: OrderService<SharedStorage>,
    catalog: ProductService<SharedStorage>,
    seeded: Vec<ProductId>,
}

impl Simulation {
    pub fn seed(settings: Settings, config: Config) -> anyhow::Result<Self> {
        let storage = InMemoryStorage::arc();
        let catalog = ProductService::new(storage.clone(), config.clone());
        let orders = OrderService::new(storage, config);

        let categories = [
            Category::Food,
            Category::Beverage,
            Category::Household,
            Category::Other,
        ];
        let mut rng = rand::thread_rng();
        let mut seeded = Vec::with_capacity(settings.products);
        for i in 0..settings.products {
            let product = catalog.create(&ProductDraft {
                name: format!("Product {}", i + 1),
                unit_price: rng.gen_range(100..=5_000),
                stock_quantity: settings.stock,
                category: categories[i % categories.len()],
            })?;
            seeded.push(product.id());
        }

        Ok(Self {
            settings,
            orders,
            catalog,
            seeded,
        })
    }

    pub fn run(self) -> anyhow::Result<Report> {
        let started = Instant::now();

        let this = &self;
        let tally = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.settings.workers)
                .map(|worker| scope.spawn(move || this.worker(worker)))
                .collect();

            let mut total = Tally::default();
            for handle in handles {
                total.merge(handle.join().map_err(|_| anyhow!("worker thread panicked"))?);
            }
            Ok::<_, anyhow::Error>(total)
        })?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            created = tally.created,
            completed = tally.completed,
            canceled = tally.canceled,
            elapsed_ms,
            "workers finished"
        );
        self.report(tally, elapsed_ms)
    }

    fn worker(&self, worker: usize) -> Tally {
        let mut rng = rand::thread_rng();
        let mut tally = Tally::default();

        for _ in 0..self.settings.orders_per_worker {
            let request = PlaceOrder::new(self.random_lines(&mut rng));
            let order = match tally.retrying(|| self.orders.create(&request)) {
                Ok(order) => order,
                Err(err) => {
                    tally.fail(&err);
                    continue;
                }
            };
            tally.created += 1;

            if let Err(err) = tally.retrying(|| self.advance(order.id(), OrderStatus::Received)) {
                tally.fail(&err);
                continue;
            }
            if let Err(err) = tally.retrying(|| self.advance(order.id(), OrderStatus::Completed)) {
                tally.fail(&err);
                continue;
            }
            tally.completed += 1;

            if rng.gen_bool(CANCEL_RATIO) {
                match tally.retrying(|| self.advance(order.id(), OrderStatus::Canceled)) {
                    Ok(_) => tally.canceled += 1,
                    Err(err) => tally.fail(&err),
                }
            }
        }

        debug!(worker, created = tally.created, "worker done");
        tally
    }

    fn advance(&self, order_id: OrderId, to: OrderStatus) -> DomainResult<Order> {
        self.orders.update_status(order_id, &StatusChange::to(to))
    }

    fn random_lines(&self, rng: &mut impl Rng) -> Vec<OrderLine> {
        let count = rng.gen_range(1..=MAX_LINES.min(self.seeded.len()));
        self.seeded
            .choose_multiple(rng, count)
            .map(|&product_id| OrderLine {
                product_id,
                quantity: rng.gen_range(1..=MAX_QUANTITY),
            })
            .collect()
    }

    fn completed_orders(&self) -> anyhow::Result<Vec<Order>> {
        let size = self.orders.config().max_page_size;
        let mut all = Vec::new();
        let mut page = 0;
        loop {
            let batch = self
                .orders
                .list_by_status(OrderStatus::Completed, PageRequest::new(page, size))?;
            let has_next = batch.has_next();
            all.extend(batch.items);
            if !has_next {
                return Ok(all);
            }
            page += 1;
        }
    }

    fn report(&self, tally: Tally, elapsed_ms: u64) -> anyhow::Result<Report> {
        let completed = self.completed_orders()?;

        let mut consumed: BTreeMap<ProductId, u64> = BTreeMap::new();
        for item in completed.iter().flat_map(|order| order.items()) {
            *consumed.entry(item.product_id).or_default() += item.quantity;
        }

        let seed_stock = self.settings.stock as u64;
        let mut violations = Vec::new();
        let mut products = Vec::with_capacity(self.seeded.len());
        for &product_id in &self.seeded {
            let final_stock = self.catalog.get(product_id)?.stock_quantity();
            let consumed_by_completed = consumed.get(&product_id).copied().unwrap_or(0);
            if final_stock + consumed_by_completed != seed_stock {
                violations.push(format!(
                    "product {product_id}: final {final_stock} + consumed {consumed_by_completed} != seed {seed_stock}"
                ));
            }
            products.push(ProductReport {
                product_id,
                seed_stock,
                final_stock,
                consumed_by_completed,
            });
        }

        let still_completed = completed.len() as u64;
        if still_completed != tally.completed - tally.canceled {
            violations.push(format!(
                "{still_completed} orders are COMPLETED, expected {}",
                tally.completed - tally.canceled
            ));
        }

        Ok(Report {
            settings: self.settings,
            elapsed_ms,
            orders_created: tally.created,
            completions: tally.completed,
            cancellations_after_completion: tally.canceled,
            retries: tally.retries,
            failures: tally.failures,
            products,
            invariant_holds: violations.is_empty(),
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_arguments_use_defaults() {
        assert_eq!(Settings::from_args(&[]).unwrap(), Settings::default());

        let settings = Settings::from_args(&args(&["2", "10"])).unwrap();
        assert_eq!(settings.products, 2);
        assert_eq!(settings.stock, 10);
        assert_eq!(settings.workers, 8);
        assert_eq!(settings.orders_per_worker, 25);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(Settings::from_args(&args(&["0"])).is_err());
        assert!(Settings::from_args(&args(&["2", "-1"])).is_err());
        assert!(Settings::from_args(&args(&["two"])).is_err());
        assert!(Settings::from_args(&args(&["1", "1", "1", "1", "1"])).is_err());
    }

    #[test]
    fn small_race_keeps_invariant() {
        let settings = Settings {
            products: 2,
            stock: 12,
            workers: 4,
            orders_per_worker: 10,
        };
        let report = Simulation::seed(settings, Config::default())
            .unwrap()
            .run()
            .unwrap();

        assert!(report.invariant_holds, "violations: {:?}", report.violations);
        assert_eq!(report.products.len(), 2);
        assert!(report.orders_created > 0);
        for product in &report.products {
            assert_eq!(product.final_stock + product.consumed_by_completed, 12);
        }
    }

    #[test]
    fn zero_stock_rejects_every_order() {
        let settings = Settings {
            products: 1,
            stock: 0,
            workers: 2,
            orders_per_worker: 3,
        };
        let report = Simulation::seed(settings, Config::default())
            .unwrap()
            .run()
            .unwrap();

        assert!(report.invariant_holds);
        assert_eq!(report.orders_created, 0);
        assert_eq!(report.failures.get("OUT_OF_STOCK"), Some(&6));
    }
}
