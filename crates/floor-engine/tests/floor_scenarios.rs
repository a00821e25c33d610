//! Cross-component properties of the floor engine, including races between
//! concurrent staff requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tempfile::TempDir;
use floor_engine::{
    ConflictReason, CoreError, DbConfig, DiningTable, Floor, FloorConfig, FloorError, ManualClock,
    Money, MovementReason, OrderLine, Quantity, RecipeLine, RecordingSink, ReservationRequest,
    ReservationStatus, TableStatus,
};

// =============================================================================
// Fixtures
// =============================================================================

async fn floor() -> (Floor, Arc<ManualClock>, Arc<RecordingSink>) {
    let mut config = FloorConfig::default();
    config.reservations.window_minutes = 60;
    config.concurrency.max_retries = 5;
    config.concurrency.initial_backoff_ms = 1;
    config.concurrency.max_backoff_ms = 10;

    let clock = Arc::new(ManualClock::at(day().and_time(at(12, 0))));
    let sink = Arc::new(RecordingSink::new());

    let floor = Floor::builder(config)
        .database(DbConfig::in_memory().busy_timeout(Duration::from_secs(2)))
        .clock(clock.clone())
        .sink(sink.clone())
        .build()
        .await
        .unwrap();

    (floor, clock, sink)
}

/// A file-backed floor with a real connection pool, so writers on different
/// tables reach SQLite at the same time.
async fn file_floor(dir: &TempDir) -> Floor {
    let mut config = FloorConfig::default();
    config.concurrency.max_retries = 8;
    config.concurrency.initial_backoff_ms = 1;
    config.concurrency.max_backoff_ms = 20;

    let database = DbConfig::new(dir.path().join("floor.db"))
        .max_connections(5)
        .busy_timeout(Duration::from_secs(2));

    Floor::builder(config)
        .database(database)
        .clock(Arc::new(ManualClock::at(day().and_time(at(12, 0)))))
        .sink(Arc::new(RecordingSink::new()))
        .build()
        .await
        .unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

async fn tables(floor: &Floor, numbers: impl IntoIterator<Item = i64>) -> Vec<DiningTable> {
    let salon = floor.tables().create_salon("Main Room").await.unwrap();
    let mut created = Vec::new();
    for number in numbers {
        created.push(floor.tables().register_table(&salon.id, number, 4).await.unwrap());
    }
    created
}

fn booking(table: &DiningTable, time: NaiveTime, party_size: i64) -> ReservationRequest {
    ReservationRequest {
        table_id: table.id.clone(),
        customer_name: "Ada Lovelace".to_string(),
        customer_phone: "555-0100".to_string(),
        customer_email: None,
        reservation_date: day(),
        reservation_time: time,
        party_size,
        status: Some(ReservationStatus::Confirmed),
        created_by: "host-1".to_string(),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_a_finalize_consumes_recipe() {
    let (floor, _, _) = floor().await;
    let t = tables(&floor, [1]).await.remove(0);

    let tomato = floor
        .inventory()
        .create_stock("Tomato", "kg", Quantity::parse("10.0").unwrap(), Quantity::zero())
        .await
        .unwrap();
    let pizza = floor
        .catalog()
        .create_product(
            "Pizza",
            "Mains",
            Money::from_cents(1200),
            &[RecipeLine::new(&tomato.id, Quantity::parse("2.0").unwrap())],
        )
        .await
        .unwrap();

    let order = floor
        .orders()
        .open_or_upsert(&t.id, "staff-1", &[OrderLine::new(&pizza.product.id, 3)])
        .await
        .unwrap();
    floor.orders().finalize_order(&order.order.id, "staff-1").await.unwrap();

    let ledger = floor.inventory();
    assert_eq!(ledger.get(&tomato.id).await.unwrap().quantity.to_string(), "4.000");

    let movements = ledger.movements(&tomato.id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].change, Quantity::parse("-6.0").unwrap());
    assert_eq!(movements[0].reason, MovementReason::OrderConsumption);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_b_insufficient_stock_changes_nothing() {
    let (floor, _, _) = floor().await;
    let t = tables(&floor, [1]).await.remove(0);

    let cheese = floor
        .inventory()
        .create_stock("Cheese", "kg", Quantity::from_units(1), Quantity::zero())
        .await
        .unwrap();
    let dough = floor
        .inventory()
        .create_stock("Dough", "pc", Quantity::from_units(50), Quantity::zero())
        .await
        .unwrap();
    let pizza = floor
        .catalog()
        .create_product(
            "Pizza",
            "Mains",
            Money::from_cents(1200),
            &[
                RecipeLine::new(&dough.id, Quantity::from_units(1)),
                RecipeLine::new(&cheese.id, Quantity::from_units(2)),
            ],
        )
        .await
        .unwrap();

    let order = floor
        .orders()
        .open_or_upsert(&t.id, "staff-1", &[OrderLine::new(&pizza.product.id, 1)])
        .await
        .unwrap();
    let err = floor.orders().finalize_order(&order.order.id, "staff-1").await.unwrap_err();
    assert!(matches!(
        err,
        FloorError::Domain(CoreError::InsufficientStock { ref stock_id, .. })
            if stock_id == &cheese.id
    ));

    let ledger = floor.inventory();
    assert_eq!(ledger.get(&cheese.id).await.unwrap().quantity, Quantity::from_units(1));
    assert_eq!(ledger.get(&dough.id).await.unwrap().quantity, Quantity::from_units(50));
    assert!(ledger.movements(&cheese.id).await.unwrap().is_empty());
    assert!(ledger.movements(&dough.id).await.unwrap().is_empty());
    assert!(floor.orders().get_open_order(&t.id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_c_reservation_overlap() {
    let (floor, _, _) = floor().await;
    let t5 = tables(&floor, [5]).await.remove(0);
    let detector = floor.reservations();

    detector.create(booking(&t5, at(19, 0), 2)).await.unwrap();

    let err = detector.create(booking(&t5, at(19, 15), 2)).await.unwrap_err();
    assert!(matches!(
        err,
        FloorError::Domain(CoreError::ReservationConflict(ConflictReason::Overlap { .. }))
    ));

    let later = detector.create(booking(&t5, at(20, 30), 2)).await.unwrap();
    assert_eq!(later.status, ReservationStatus::Confirmed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_d_concurrent_upserts_share_one_order() {
    let (floor, _, sink) = floor().await;
    let t7 = tables(&floor, [7]).await.remove(0);

    let burger = floor
        .catalog()
        .create_product("Burger", "Mains", Money::from_cents(950), &[])
        .await
        .unwrap();
    let salad = floor
        .catalog()
        .create_product("Salad", "Mains", Money::from_cents(700), &[])
        .await
        .unwrap();

    let first = {
        let (orders, table_id, product_id) =
            (floor.orders(), t7.id.clone(), burger.product.id.clone());
        tokio::spawn(async move {
            orders
                .open_or_upsert(&table_id, "staff-1", &[OrderLine::new(product_id, 2)])
                .await
        })
    };
    let second = {
        let (orders, table_id, product_id) =
            (floor.orders(), t7.id.clone(), salad.product.id.clone());
        tokio::spawn(async move {
            orders
                .open_or_upsert(&table_id, "staff-2", &[OrderLine::new(product_id, 1)])
                .await
        })
    };

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(a.order.id, b.order.id);

    let history = floor.orders().list_for_table(&t7.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(floor.tables().status(&t7.id).await.unwrap(), TableStatus::Occupied);

    // The write that serialized last owns the item set.
    let open = floor.orders().get_open_order(&t7.id).await.unwrap().unwrap();
    assert_eq!(sink.event_types(), vec!["ORDER_CREATED", "ORDER_UPDATED"]);
    assert_eq!(open.items.len(), 1);
    assert!(open.items == a.items || open.items == b.items);
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_open_order_under_many_upserts() {
    let (floor, _, _) = floor().await;
    let t = tables(&floor, [1]).await.remove(0);
    let soup = floor
        .catalog()
        .create_product("Soup", "Starters", Money::from_cents(550), &[])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for quantity in 1..=12 {
        let (orders, table_id, product_id) =
            (floor.orders(), t.id.clone(), soup.product.id.clone());
        handles.push(tokio::spawn(async move {
            orders
                .open_or_upsert(&table_id, "staff-1", &[OrderLine::new(product_id, quantity)])
                .await
        }));
    }

    let mut order_ids = Vec::new();
    for handle in handles {
        order_ids.push(handle.await.unwrap().unwrap().order.id);
    }
    order_ids.dedup();
    assert_eq!(order_ids.len(), 1);

    let history = floor.orders().list_for_table(&t.id).await.unwrap();
    assert_eq!(history.iter().filter(|o| !o.completed).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shared_stock_never_goes_negative_and_reconciles() {
    let (floor, _, sink) = floor().await;
    let floor_tables = tables(&floor, 1..=8).await;

    let tomato = floor
        .inventory()
        .create_stock("Tomato", "kg", Quantity::from_units(10), Quantity::from_units(3))
        .await
        .unwrap();
    let pizza = floor
        .catalog()
        .create_product(
            "Pizza",
            "Mains",
            Money::from_cents(1200),
            &[RecipeLine::new(&tomato.id, Quantity::from_units(2))],
        )
        .await
        .unwrap();

    let mut order_ids = Vec::new();
    for table in &floor_tables {
        let order = floor
            .orders()
            .open_or_upsert(&table.id, "staff-1", &[OrderLine::new(&pizza.product.id, 1)])
            .await
            .unwrap();
        order_ids.push(order.order.id);
    }

    let mut handles = Vec::new();
    for order_id in order_ids {
        let orders = floor.orders();
        handles.push(tokio::spawn(async move {
            orders.finalize_order(&order_id, "staff-2").await
        }));
    }

    let (mut finalized, mut short) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => finalized += 1,
            Err(FloorError::Domain(CoreError::InsufficientStock { .. })) => short += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((finalized, short), (5, 3));

    let ledger = floor.inventory();
    let stock = ledger.get(&tomato.id).await.unwrap();
    assert_eq!(stock.quantity, Quantity::zero());

    let reconciliation = ledger.reconcile(&tomato.id).await.unwrap();
    assert!(reconciliation.balanced);
    assert_eq!(reconciliation.total_change, Quantity::from_units(-10));
    assert_eq!(ledger.movements(&tomato.id).await.unwrap().len(), 5);

    // 10 → 2 crosses the minimum of 3 exactly once.
    let low = sink
        .event_types()
        .into_iter()
        .filter(|t| *t == "STOCK_BELOW_MINIMUM")
        .count();
    assert_eq!(low, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finalize_applies_once() {
    let (floor, _, _) = floor().await;
    let t = tables(&floor, [1]).await.remove(0);

    let flour = floor
        .inventory()
        .create_stock("Flour", "kg", Quantity::from_units(5), Quantity::zero())
        .await
        .unwrap();
    let bread = floor
        .catalog()
        .create_product(
            "Bread",
            "Sides",
            Money::from_cents(250),
            &[RecipeLine::new(&flour.id, Quantity::from_milli(500))],
        )
        .await
        .unwrap();
    let order = floor
        .orders()
        .open_or_upsert(&t.id, "staff-1", &[OrderLine::new(&bread.product.id, 2)])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let (orders, order_id) = (floor.orders(), order.order.id.clone());
        handles.push(tokio::spawn(async move {
            orders.finalize_order(&order_id, "staff-1").await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(err) => assert!(matches!(
                err,
                FloorError::Domain(CoreError::InvalidOrderState { .. })
            )),
        }
    }
    assert_eq!(ok, 1);

    let ledger = floor.inventory();
    assert_eq!(ledger.get(&flour.id).await.unwrap().quantity, Quantity::from_units(4));
    assert_eq!(ledger.movements(&flour.id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bookings_never_overlap() {
    let (floor, _, _) = floor().await;
    let t = tables(&floor, [3]).await.remove(0);

    let mut handles = Vec::new();
    for minute in [0, 10, 20, 30, 40, 50] {
        let (detector, request) = (floor.reservations(), booking(&t, at(19, minute), 2));
        handles.push(tokio::spawn(async move { detector.create(request).await }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert!(matches!(
                err,
                FloorError::Domain(CoreError::ReservationConflict(_))
            )),
        }
    }
    assert_eq!(accepted, 1);

    let stored = floor.reservations().list_for_table(&t.id, day()).await.unwrap();
    assert_eq!(stored.iter().filter(|r| r.status.is_active()).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn finalize_completes_reservations_already_due() {
    let (floor, clock, _) = floor().await;
    let t = tables(&floor, [2]).await.remove(0);
    let coffee = floor
        .catalog()
        .create_product("Coffee", "Drinks", Money::from_cents(250), &[])
        .await
        .unwrap();

    let lunch = floor.reservations().create(booking(&t, at(13, 0), 2)).await.unwrap();
    let dinner = floor.reservations().create(booking(&t, at(20, 0), 2)).await.unwrap();

    clock.set_local(day().and_time(at(13, 5)));
    let order = floor
        .orders()
        .open_or_upsert(&t.id, "staff-1", &[OrderLine::new(&coffee.product.id, 2)])
        .await
        .unwrap();
    clock.set_local(day().and_time(at(14, 0)));
    floor.orders().finalize_order(&order.order.id, "staff-1").await.unwrap();

    let reservations = floor.reservations();
    assert_eq!(reservations.get(&lunch.id).await.unwrap().status, ReservationStatus::Completed);
    assert_eq!(reservations.get(&dinner.id).await.unwrap().status, ReservationStatus::Confirmed);

    // Finalize leaves the table status for staff to change.
    assert_eq!(floor.tables().status(&t.id).await.unwrap(), TableStatus::Occupied);
    floor.orders().release_table(&t.id, TableStatus::Available).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn manual_adjustments_keep_ledger_balanced() {
    let (floor, _, _) = floor().await;
    let ledger = floor.inventory();

    let oil = ledger
        .create_stock("Olive Oil", "l", Quantity::parse("3.5").unwrap(), Quantity::from_units(1))
        .await
        .unwrap();

    ledger.add(&oil.id, Quantity::from_units(2), MovementReason::Restock).await.unwrap();
    ledger
        .deduct(&oil.id, Quantity::parse("0.75").unwrap(), MovementReason::ManualAdjustment)
        .await
        .unwrap();
    ledger.adjust_to(&oil.id, Quantity::from_units(4)).await.unwrap();

    let err = ledger
        .deduct(&oil.id, Quantity::from_units(5), MovementReason::ManualAdjustment)
        .await
        .unwrap_err();
    assert!(matches!(err, FloorError::Domain(CoreError::InsufficientStock { .. })));

    let reconciliation = ledger.reconcile(&oil.id).await.unwrap();
    assert!(reconciliation.balanced);
    assert_eq!(reconciliation.current, Quantity::from_units(4));
    assert_eq!(reconciliation.total_change, Quantity::parse("0.5").unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pooled_file_database_keeps_orders_and_stock_consistent() {
    let dir = TempDir::new().unwrap();
    let floor = file_floor(&dir).await;
    let floor_tables = tables(&floor, 1..=10).await;

    let tomato = floor
        .inventory()
        .create_stock("Tomato", "kg", Quantity::from_units(15), Quantity::zero())
        .await
        .unwrap();
    let pizza = floor
        .catalog()
        .create_product(
            "Pizza",
            "Mains",
            Money::from_cents(1200),
            &[RecipeLine::new(&tomato.id, Quantity::from_units(2))],
        )
        .await
        .unwrap();

    // Many terminals syncing the same table, each on its own connection.
    let mut handles = Vec::new();
    for quantity in 1..=12 {
        let (orders, table_id, product_id) =
            (floor.orders(), floor_tables[0].id.clone(), pizza.product.id.clone());
        handles.push(tokio::spawn(async move {
            orders
                .open_or_upsert(&table_id, "staff-1", &[OrderLine::new(product_id, quantity)])
                .await
        }));
    }
    let mut order_ids = Vec::new();
    for handle in handles {
        order_ids.push(handle.await.unwrap().unwrap().order.id);
    }
    order_ids.dedup();
    assert_eq!(order_ids.len(), 1);
    floor.orders().discard_open_order(&order_ids[0]).await.unwrap();

    // One pizza per table, opened concurrently, then finalized concurrently.
    let mut handles = Vec::new();
    for table in &floor_tables {
        let (orders, table_id, product_id) =
            (floor.orders(), table.id.clone(), pizza.product.id.clone());
        handles.push(tokio::spawn(async move {
            orders
                .open_or_upsert(&table_id, "staff-1", &[OrderLine::new(product_id, 1)])
                .await
        }));
    }
    let mut order_ids = Vec::new();
    for handle in handles {
        order_ids.push(handle.await.unwrap().unwrap().order.id);
    }

    let mut handles = Vec::new();
    for order_id in order_ids {
        let orders = floor.orders();
        handles.push(tokio::spawn(async move {
            orders.finalize_order(&order_id, "staff-2").await
        }));
    }
    let (mut finalized, mut short) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => finalized += 1,
            Err(FloorError::Domain(CoreError::InsufficientStock { .. })) => short += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((finalized, short), (7, 3));

    let reconciliation = floor.inventory().reconcile(&tomato.id).await.unwrap();
    assert!(reconciliation.balanced);
    assert_eq!(reconciliation.current.to_string(), "1.000");
    assert_eq!(floor.inventory().movements(&tomato.id).await.unwrap().len(), 7);

    floor.close().await;
}
