use common::{CustomerId, MenuItemId, Money, RestaurantId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Order, OrderItem, OrderStatus};

fn bench_add_item(c: &mut Criterion) {
    c.bench_function("domain/add_item_recompute_total", |b| {
        b.iter(|| {
            let mut order = Order::new(CustomerId::new(), RestaurantId::new(), None);
            for i in 0..20u32 {
                let item = OrderItem::new(
                    MenuItemId::new(),
                    "Benchmark Item",
                    Money::from_minor(1000 + i64::from(i)),
                    1 + i % 3,
                );
                order.add_item(item).unwrap();
            }
            order.total_amount()
        });
    });
}

fn bench_status_transitions(c: &mut Criterion) {
    c.bench_function("domain/full_status_lifecycle", |b| {
        b.iter(|| {
            let mut order = Order::new(CustomerId::new(), RestaurantId::new(), None);
            order
                .add_item(OrderItem::new(
                    MenuItemId::new(),
                    "Benchmark Item",
                    Money::from_minor(1000),
                    1,
                ))
                .unwrap();
            order.transition_to(OrderStatus::Paid).unwrap();
            order.transition_to(OrderStatus::Preparing).unwrap();
            order.transition_to(OrderStatus::Delivering).unwrap();
            order.transition_to(OrderStatus::Completed).unwrap();
            order.status()
        });
    });
}

criterion_group!(benches, bench_add_item, bench_status_transitions);
criterion_main!(benches);
