use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use orderdesk_catalog::{Category, ProductDraft};
use orderdesk_core::ProductId;
use orderdesk_infra::{Config, InMemoryStorage, OrderService, ProductService};
use orderdesk_orders::{OrderLine, OrderStatus, PlaceOrder, StatusChange};
use std::sync::Arc;

type Orders = OrderService<Arc<InMemoryStorage>>;

fn setup(products: usize, stock: i64) -> (Orders, Vec<ProductId>) {
    let storage = InMemoryStorage::arc();
    let catalog = ProductService::new(storage.clone(), Config::default());
    let ids = (0..products)
        .map(|i| {
            catalog
                .create(&ProductDraft {
                    name: format!("Bench item {i}"),
                    unit_price: 100,
                    stock_quantity: stock,
                    category: Category::Other,
                })
                .unwrap()
                .id()
        })
        .collect();
    (OrderService::new(storage, Config::default()), ids)
}

fn place_request(ids: &[ProductId]) -> PlaceOrder {
    PlaceOrder::new(
        ids.iter()
            .map(|&product_id| OrderLine {
                product_id,
                quantity: 1,
            })
            .collect(),
    )
}

fn bench_create_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_order");

    for line_count in [1usize, 5, 20].iter() {
        group.throughput(Throughput::Elements(*line_count as u64));
        group.bench_with_input(
            BenchmarkId::new("lines", line_count),
            line_count,
            |b, &count| {
                let (orders, ids) = setup(count, i64::MAX / 2);
                let request = place_request(&ids);
                b.iter(|| black_box(orders.create(&request).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_complete_cancel_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("complete_cancel_cycle");

    for line_count in [1usize, 5, 20].iter() {
        group.bench_with_input(
            BenchmarkId::new("lines", line_count),
            line_count,
            |b, &count| {
                let (orders, ids) = setup(count, 1_000);
                let request = place_request(&ids);
                b.iter(|| {
                    let order = orders.create(&request).unwrap();
                    for to in [
                        OrderStatus::Received,
                        OrderStatus::Completed,
                        OrderStatus::Canceled,
                    ] {
                        orders
                            .update_status(order.id(), &StatusChange::to(to))
                            .unwrap();
                    }
                    black_box(order)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_create_order, bench_complete_cancel_cycle);
criterion_main!(benches);
