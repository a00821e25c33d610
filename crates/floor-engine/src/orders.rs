//! # Order Lifecycle
//!
//! One open order per table, synchronized in full by each upsert and
//! finalized exactly once.
//!
//! ## States per Table
//! ```text
//!  NO_OPEN_ORDER ──open_or_upsert──► OPEN ──finalize_order──► FINALIZED
//!        ▲                            │  ▲                       (terminal)
//!        │                            │  │ open_or_upsert
//!        └──── discard_open_order ────┘  └ (replace item set)
//! ```
//!
//! ## Finalize
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. lock table                                                         │
//! │  2. plan: items × recipes → [(stock, qty)] sorted by stock id          │
//! │  3. lock those stocks (ascending)                                      │
//! │  4. BEGIN                                                              │
//! │     ├── order still open?             else InvalidOrderState           │
//! │     ├── re-plan; same stock set?      else re-plan from step 2         │
//! │     ├── every stock sufficient?       else InsufficientStock           │
//! │     ├── one ORDER_CONSUMPTION movement per stock                       │
//! │     ├── completed = 1, finalized_at, finalized_by                      │
//! │     └── due reservations on the table → COMPLETED                      │
//! │  5. COMMIT, release locks, publish events                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Any error before COMMIT drops the transaction: no stock moves, the order
//! stays open.

use std::collections::HashMap;
use std::sync::Arc;

use floor_core::recipe::stock_ids;
use floor_core::reservation::due_reservations;
use floor_core::validation::{normalize_order_lines, validate_staff_id};
use floor_core::{
    CoreError, DiningTable, Order, OrderDetails, OrderItem, OrderLine, Product, ReservationStatus,
    TableStatus, ValidationError,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::FloorContext;
use crate::error::{FloorError, FloorResult};
use crate::events::FloorEvent;
use crate::inventory::InventoryLedger;
use crate::tables::TableStateMachine;

/// Opens, synchronizes, and finalizes table orders.
#[derive(Clone)]
pub struct OrderLifecycle {
    ctx: Arc<FloorContext>,
}

impl OrderLifecycle {
    pub(crate) fn new(ctx: Arc<FloorContext>) -> Self {
        OrderLifecycle { ctx }
    }

    // =========================================================================
    // Upsert
    // =========================================================================

    /// Creates the table's open order, or replaces its items if one exists.
    ///
    /// Lines for the same product are merged. A new order sets the table
    /// `OCCUPIED`; an update leaves the status alone.
    ///
    /// ## Errors
    /// - `EmptyOrder` when `lines` is empty
    /// - `TableNotFound`, `ProductNotFound`
    /// - `Validation` for bad quantities or an inactive product
    pub async fn open_or_upsert(
        &self,
        table_id: &str,
        staff_id: &str,
        lines: &[OrderLine],
    ) -> FloorResult<OrderDetails> {
        validate_staff_id(staff_id)?;
        let lines = normalize_order_lines(lines)?;
        if lines.is_empty() {
            return Err(CoreError::EmptyOrder {
                table_id: table_id.to_string(),
            }
            .into());
        }

        let _table = self.ctx.locks.lock_table(table_id).await?;

        let lines = &lines;
        let (details, event) = self
            .ctx
            .retry
            .run("table", table_id, || async move {
                self.upsert_once(table_id, staff_id, lines).await
            })
            .await?;

        self.ctx.emit(&[event]).await;
        Ok(details)
    }

    async fn upsert_once(
        &self,
        table_id: &str,
        staff_id: &str,
        lines: &[OrderLine],
    ) -> FloorResult<(OrderDetails, FloorEvent)> {
        let now = self.ctx.clock.now_utc();
        let mut uow = self.ctx.begin().await?;

        TableStateMachine::load(&mut uow, table_id).await?;

        let product_ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
        let products = uow.products().get_many(&product_ids).await?;

        let existing = uow.orders().find_open_for_table(table_id).await?;
        let order_id = existing
            .as_ref()
            .map(|o| o.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let items = build_items(&order_id, lines, &products, now)?;

        let event = match existing {
            Some(order) => {
                uow.orders().replace_items(&order.id, &items).await?;
                uow.orders().touch(&order.id, now).await?;
                info!(
                    order_id = %order.id,
                    table_id = %table_id,
                    items = items.len(),
                    "Order items synchronized"
                );
                FloorEvent::OrderUpdated {
                    order_id: order.id,
                    table_id: table_id.to_string(),
                    item_count: items.len(),
                }
            }
            None => {
                let order = Order {
                    id: order_id.clone(),
                    table_id: table_id.to_string(),
                    staff_id: staff_id.to_string(),
                    completed: false,
                    created_at: now,
                    updated_at: now,
                    finalized_at: None,
                    finalized_by: None,
                };
                // A racing writer past the lock trips the one-open-order
                // index here; the retry then finds its row and updates it.
                uow.orders().insert(&order).await?;
                uow.orders().replace_items(&order.id, &items).await?;
                TableStateMachine::apply_status(&mut uow, table_id, TableStatus::Occupied, now)
                    .await?;
                info!(
                    order_id = %order.id,
                    table_id = %table_id,
                    items = items.len(),
                    "Order opened"
                );
                FloorEvent::OrderCreated {
                    order_id: order.id,
                    table_id: table_id.to_string(),
                    staff_id: staff_id.to_string(),
                    item_count: items.len(),
                }
            }
        };

        let details = uow
            .orders()
            .get_details(&order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.clone()))?;
        uow.commit().await?;

        Ok((details, event))
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Finalizes an open order, consuming its ingredients from stock.
    ///
    /// All or nothing: on any error no stock changes and the order stays
    /// open.
    ///
    /// ## Errors
    /// - `OrderNotFound`
    /// - `InvalidOrderState` if already finalized (no movements are written)
    /// - `InsufficientStock` for the first stock that would go negative
    pub async fn finalize_order(
        &self,
        order_id: &str,
        staff_id: &str,
    ) -> FloorResult<OrderDetails> {
        validate_staff_id(staff_id)?;

        let order = self.load_order(order_id).await?;
        if !order.is_open() {
            return Err(already_finalized(order_id));
        }
        let table_id = order.table_id;

        let _table = self.ctx.locks.lock_table(&table_id).await?;
        let table_id = table_id.as_str();

        let (details, events) = self
            .ctx
            .retry
            .run("order", order_id, || async move {
                self.finalize_once(order_id, table_id, staff_id).await
            })
            .await?;

        self.ctx.emit(&events).await;
        Ok(details)
    }

    /// One finalize attempt. The caller holds the table lock.
    async fn finalize_once(
        &self,
        order_id: &str,
        table_id: &str,
        staff_id: &str,
    ) -> FloorResult<(OrderDetails, Vec<FloorEvent>)> {
        // Plan on a short-lived connection; it is returned before waiting on
        // stock locks.
        let planned = {
            let mut uow = self.ctx.begin().await?;
            InventoryLedger::plan_requirements(&mut uow, order_id).await?
        };
        let stocks = self.ctx.locks.lock_stocks(&stock_ids(&planned)).await?;
        debug!(order_id = %order_id, stocks = stocks.stock_ids().len(), "Stock locks held");

        let now = self.ctx.clock.now_utc();
        let now_local = self.ctx.clock.now_local();
        let mut uow = self.ctx.begin().await?;

        let order = uow
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        if !order.is_open() {
            return Err(already_finalized(order_id));
        }

        let deducted =
            InventoryLedger::deduct_for_order_finalization(&mut uow, order_id, &stocks, now).await;
        let deductions = match deducted {
            Ok(deductions) => deductions,
            Err(e) => {
                if let Some(CoreError::InsufficientStock { stock_id, .. }) = e.as_domain() {
                    warn!(
                        order_id = %order_id,
                        stock_id = %stock_id,
                        "Finalize rejected: insufficient stock"
                    );
                }
                return Err(e);
            }
        };

        if !uow.orders().mark_finalized(order_id, staff_id, now).await? {
            return Err(already_finalized(order_id));
        }

        let active = uow.reservations().active_for_table(table_id).await?;
        let due: Vec<String> = due_reservations(&active, now_local).map(|r| r.id.clone()).collect();
        for reservation_id in &due {
            uow.reservations()
                .set_status(reservation_id, ReservationStatus::Completed, now)
                .await?;
            debug!(
                reservation_id = %reservation_id,
                table_id = %table_id,
                "Due reservation completed by finalize"
            );
        }

        let details = uow
            .orders()
            .get_details(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        uow.commit().await?;
        drop(stocks);

        info!(
            order_id = %order_id,
            table_id = %table_id,
            movements = deductions.len(),
            reservations_completed = due.len(),
            total = %details.total(),
            "Order finalized"
        );

        let mut events = vec![FloorEvent::OrderFinalized {
            order_id: order_id.to_string(),
            table_id: table_id.to_string(),
            finalized_by: staff_id.to_string(),
            total_cents: details.total().cents(),
        }];
        events.extend(due.into_iter().map(|reservation_id| FloorEvent::ReservationCompleted {
            reservation_id,
            table_id: table_id.to_string(),
        }));
        events.extend(InventoryLedger::low_stock_events(&deductions));

        Ok((details, events))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The table's uncompleted order, or `None`.
    pub async fn get_open_order(&self, table_id: &str) -> FloorResult<Option<OrderDetails>> {
        let mut uow = self.ctx.begin().await?;
        TableStateMachine::load(&mut uow, table_id).await?;

        let Some(order) = uow.orders().find_open_for_table(table_id).await? else {
            return Ok(None);
        };
        Ok(uow.orders().get_details(&order.id).await?)
    }

    pub async fn get_details(&self, order_id: &str) -> FloorResult<OrderDetails> {
        let mut uow = self.ctx.begin().await?;
        uow.orders()
            .get_details(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Every order a table has had, newest first.
    pub async fn list_for_table(&self, table_id: &str) -> FloorResult<Vec<Order>> {
        let mut uow = self.ctx.begin().await?;
        TableStateMachine::load(&mut uow, table_id).await?;
        Ok(uow.orders().list_for_table(table_id).await?)
    }

    // =========================================================================
    // Table Release & Discard
    // =========================================================================

    /// Moves a table to `status`, refusing `AVAILABLE` and `RESERVED` while
    /// it has an open order.
    pub async fn release_table(
        &self,
        table_id: &str,
        status: TableStatus,
    ) -> FloorResult<DiningTable> {
        let _table = self.ctx.locks.lock_table(table_id).await?;

        self.ctx
            .retry
            .run("table", table_id, || async move {
                let mut uow = self.ctx.begin().await?;
                TableStateMachine::load(&mut uow, table_id).await?;

                if matches!(status, TableStatus::Available | TableStatus::Reserved) {
                    if let Some(open) = uow.orders().find_open_for_table(table_id).await? {
                        warn!(
                            table_id = %table_id,
                            order_id = %open.id,
                            status = %status,
                            "Release refused, order still open"
                        );
                        return Err(CoreError::TableHasOpenOrder {
                            table_id: table_id.to_string(),
                            order_id: open.id,
                        }
                        .into());
                    }
                }

                let now = self.ctx.clock.now_utc();
                TableStateMachine::apply_status(&mut uow, table_id, status, now).await?;
                let table = TableStateMachine::load(&mut uow, table_id).await?;
                uow.commit().await?;
                Ok(table)
            })
            .await
    }

    /// Deletes an open order and its items without touching stock, and
    /// frees the table.
    pub async fn discard_open_order(&self, order_id: &str) -> FloorResult<()> {
        let order = self.load_order(order_id).await?;
        if !order.is_open() {
            return Err(not_discardable(order_id));
        }
        let table_id = order.table_id;

        let _table = self.ctx.locks.lock_table(&table_id).await?;
        let table_id = table_id.as_str();

        self.ctx
            .retry
            .run("order", order_id, || async move {
                let mut uow = self.ctx.begin().await?;
                let order = uow
                    .orders()
                    .get(order_id)
                    .await?
                    .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
                if !order.is_open() || !uow.orders().delete_open(order_id).await? {
                    return Err(not_discardable(order_id));
                }

                let now = self.ctx.clock.now_utc();
                TableStateMachine::apply_status(&mut uow, table_id, TableStatus::Available, now)
                    .await?;
                uow.commit().await?;
                Ok(())
            })
            .await?;

        info!(order_id = %order_id, table_id = %table_id, "Open order discarded");
        Ok(())
    }

    async fn load_order(&self, order_id: &str) -> FloorResult<Order> {
        let mut uow = self.ctx.begin().await?;
        uow.orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

fn already_finalized(order_id: &str) -> FloorError {
    CoreError::invalid_order_state(order_id, "order is already finalized").into()
}

fn not_discardable(order_id: &str) -> FloorError {
    CoreError::invalid_order_state(order_id, "finalized orders cannot be discarded").into()
}

/// Snapshots each product's name and price into order items.
fn build_items(
    order_id: &str,
    lines: &[OrderLine],
    products: &HashMap<String, Product>,
    now: chrono::DateTime<chrono::Utc>,
) -> FloorResult<Vec<OrderItem>> {
    lines
        .iter()
        .map(|line| {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            if !product.is_active {
                return Err(ValidationError::NotAllowed {
                    field: "product".to_string(),
                    reason: format!("{} is not on the menu", product.name),
                }
                .into());
            }

            Ok(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                product_id: product.id.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.price_cents,
                quantity: line.quantity,
                line_total_cents: product.price().multiply_quantity(line.quantity)?.cents(),
                created_at: now,
            })
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::catalog::RecipeLine;
    use crate::events::FloorEvent;
    use crate::testing::floor;
    use crate::{Floor, FloorError};
    use chrono::{Duration, NaiveDate, NaiveTime};
    use floor_core::{
        CoreError, DiningTable, Money, MovementReason, OrderLine, Product, ProductIngredient,
        Quantity, ReservationRequest, ReservationStatus, TableStatus, ValidationError,
    };

    struct Menu {
        table: DiningTable,
        pizza: String,
        water: String,
        tomato: String,
        cheese: String,
    }

    async fn menu(floor: &Floor) -> Menu {
        let salon = floor.tables().create_salon("Hall").await.unwrap();
        let table = floor.tables().register_table(&salon.id, 5, 4).await.unwrap();

        let tomato = floor
            .inventory()
            .create_stock("Tomato", "kg", Quantity::from_units(10), Quantity::from_units(3))
            .await
            .unwrap();
        let cheese = floor
            .inventory()
            .create_stock("Cheese", "kg", Quantity::from_units(5), Quantity::zero())
            .await
            .unwrap();

        let pizza = floor
            .catalog()
            .create_product(
                "Pizza",
                "Mains",
                Money::from_cents(1150),
                &[
                    RecipeLine::new(&tomato.id, Quantity::from_units(2)),
                    RecipeLine::new(&cheese.id, Quantity::from_units(1)),
                ],
            )
            .await
            .unwrap();
        let water = floor
            .catalog()
            .create_product("Water", "Drinks", Money::from_cents(300), &[])
            .await
            .unwrap();

        Menu {
            table,
            pizza: pizza.product.id,
            water: water.product.id,
            tomato: tomato.id,
            cheese: cheese.id,
        }
    }

    #[tokio::test]
    async fn test_open_then_sync_replaces_items() {
        let (floor, _, sink) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let opened = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.pizza, 2)])
            .await
            .unwrap();
        assert_eq!(opened.items.len(), 1);
        assert_eq!(opened.total(), Money::from_cents(2300));
        assert_eq!(floor.tables().status(&m.table.id).await.unwrap(), TableStatus::Occupied);

        let synced = orders
            .open_or_upsert(
                &m.table.id,
                "staff-2",
                &[OrderLine::new(&m.water, 1), OrderLine::new(&m.water, 2)],
            )
            .await
            .unwrap();
        assert_eq!(synced.order.id, opened.order.id);
        assert_eq!(synced.items.len(), 1);
        assert_eq!(synced.items[0].quantity, 3);
        assert_eq!(synced.items[0].name_snapshot, "Water");

        assert_eq!(sink.event_types(), vec!["ORDER_CREATED", "ORDER_UPDATED"]);
        let open = orders.get_open_order(&m.table.id).await.unwrap().unwrap();
        assert_eq!(open.order.id, opened.order.id);
    }

    #[tokio::test]
    async fn test_upsert_rejections() {
        let (floor, _, _) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let err = orders.open_or_upsert(&m.table.id, "staff-1", &[]).await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::EmptyOrder { .. })));

        let err = orders
            .open_or_upsert("missing", "staff-1", &[OrderLine::new(&m.pizza, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::TableNotFound(_))));

        let err = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new("ghost", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::ProductNotFound(_))));

        floor.catalog().deactivate(&m.water).await.unwrap();
        let err = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.water, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::Validation(_))));

        // Nothing was opened by the failures.
        assert!(orders.get_open_order(&m.table.id).await.unwrap().is_none());
        assert_eq!(floor.tables().status(&m.table.id).await.unwrap(), TableStatus::Available);
    }

    #[tokio::test]
    async fn test_finalize_consumes_recipe_once() {
        let (floor, _, sink) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let order = orders
            .open_or_upsert(
                &m.table.id,
                "staff-1",
                &[OrderLine::new(&m.pizza, 3), OrderLine::new(&m.water, 1)],
            )
            .await
            .unwrap();

        let done = orders.finalize_order(&order.order.id, "staff-9").await.unwrap();
        assert!(done.order.completed);
        assert_eq!(done.order.finalized_by.as_deref(), Some("staff-9"));
        assert!(done.order.finalized_at.is_some());

        let ledger = floor.inventory();
        assert_eq!(ledger.get(&m.tomato).await.unwrap().quantity, Quantity::from_units(4));
        assert_eq!(ledger.get(&m.cheese).await.unwrap().quantity, Quantity::from_units(2));

        let movements = ledger.movements(&m.tomato).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].change, Quantity::from_units(-6));
        assert_eq!(movements[0].reason, MovementReason::OrderConsumption);
        assert_eq!(movements[0].reference_id.as_deref(), Some(order.order.id.as_str()));

        let err = orders.finalize_order(&order.order.id, "staff-9").await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::InvalidOrderState { .. })));
        assert_eq!(ledger.movements(&m.tomato).await.unwrap().len(), 1);

        // Tomato ends at 4, still above its minimum of 3.
        assert!(!sink
            .events()
            .iter()
            .any(|e| matches!(e, FloorEvent::StockBelowMinimum { .. })));
        assert!(orders.get_open_order(&m.table.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finalize_all_or_nothing() {
        let (floor, _, _) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        // 6 pizzas need 12 tomato (have 10) and 6 cheese (have 5).
        let order = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.pizza, 6)])
            .await
            .unwrap();

        let err = orders.finalize_order(&order.order.id, "staff-1").await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::InsufficientStock { .. })));

        let ledger = floor.inventory();
        assert_eq!(ledger.get(&m.tomato).await.unwrap().quantity, Quantity::from_units(10));
        assert_eq!(ledger.get(&m.cheese).await.unwrap().quantity, Quantity::from_units(5));
        assert!(ledger.movements(&m.tomato).await.unwrap().is_empty());
        assert!(ledger.movements(&m.cheese).await.unwrap().is_empty());

        let still_open = orders.get_open_order(&m.table.id).await.unwrap().unwrap();
        assert!(!still_open.order.completed);
    }

    #[tokio::test]
    async fn test_finalize_completes_due_reservations_only() {
        let (floor, clock, sink) = floor().await;
        let m = menu(&floor).await;

        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        clock.set_local(day.and_hms_opt(18, 0, 0).unwrap());

        let request = |hour: u32| ReservationRequest {
            table_id: m.table.id.clone(),
            customer_name: "Ada".to_string(),
            customer_phone: "555-0100".to_string(),
            customer_email: None,
            reservation_date: day,
            reservation_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            party_size: 2,
            status: None,
            created_by: "staff-1".to_string(),
        };
        let early = floor.reservations().create(request(19)).await.unwrap();
        let late = floor.reservations().create(request(22)).await.unwrap();

        // Guests seated at 19:10; by 20:00 the early booking is due.
        clock.advance(Duration::minutes(70));
        let order = floor
            .orders()
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.water, 1)])
            .await
            .unwrap();
        clock.advance(Duration::minutes(50));
        floor.orders().finalize_order(&order.order.id, "staff-1").await.unwrap();

        let reservations = floor.reservations();
        assert_eq!(reservations.get(&early.id).await.unwrap().status, ReservationStatus::Completed);
        assert_eq!(reservations.get(&late.id).await.unwrap().status, ReservationStatus::Confirmed);
        assert!(sink.event_types().contains(&"RESERVATION_COMPLETED"));
    }

    #[tokio::test]
    async fn test_release_table_guard() {
        let (floor, _, _) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let order = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.water, 1)])
            .await
            .unwrap();

        let err = orders.release_table(&m.table.id, TableStatus::Available).await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::TableHasOpenOrder { .. })));

        orders.finalize_order(&order.order.id, "staff-1").await.unwrap();
        let table = orders.release_table(&m.table.id, TableStatus::Cleaning).await.unwrap();
        assert_eq!(table.status, TableStatus::Cleaning);
        let table = orders.release_table(&m.table.id, TableStatus::Available).await.unwrap();
        assert_eq!(table.status, TableStatus::Available);
    }

    #[tokio::test]
    async fn test_discard_open_order() {
        let (floor, _, _) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let order = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.pizza, 1)])
            .await
            .unwrap();
        orders.discard_open_order(&order.order.id).await.unwrap();

        assert!(orders.get_open_order(&m.table.id).await.unwrap().is_none());
        assert_eq!(floor.tables().status(&m.table.id).await.unwrap(), TableStatus::Available);
        let tomato = floor.inventory().get(&m.tomato).await.unwrap();
        assert_eq!(tomato.quantity, Quantity::from_units(10));

        let err = orders.discard_open_order(&order.order.id).await.unwrap_err();
        assert!(matches!(err, FloorError::Domain(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_oversized_rows_fail_without_panicking() {
        let (floor, _, _) = floor().await;
        let m = menu(&floor).await;
        let orders = floor.orders();

        let err = floor
            .catalog()
            .create_product("Gold Leaf", "Mains", Money::from_cents(i64::MAX / 2), &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FloorError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        // Rows written before the caps existed still have to fail cleanly.
        let now = chrono::Utc::now();
        let mut uow = floor.db().begin().await.unwrap();
        uow.products()
            .insert(&Product {
                id: "gold".to_string(),
                name: "Gold Leaf".to_string(),
                category: "Mains".to_string(),
                price_cents: i64::MAX / 2,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        uow.products()
            .replace_recipe(
                &m.pizza,
                &[ProductIngredient {
                    product_id: m.pizza.clone(),
                    stock_id: m.tomato.clone(),
                    quantity: Quantity::from_milli(i64::MAX / 2),
                }],
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let err = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new("gold", 3)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FloorError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert!(orders.get_open_order(&m.table.id).await.unwrap().is_none());

        let order = orders
            .open_or_upsert(&m.table.id, "staff-1", &[OrderLine::new(&m.pizza, 3)])
            .await
            .unwrap();
        let err = orders.finalize_order(&order.order.id, "staff-1").await.unwrap_err();
        assert!(matches!(
            err,
            FloorError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let tomato = floor.inventory().get(&m.tomato).await.unwrap();
        assert_eq!(tomato.quantity, Quantity::from_units(10));
        assert!(floor.inventory().movements(&m.tomato).await.unwrap().is_empty());
        assert!(orders.get_open_order(&m.table.id).await.unwrap().is_some());
    }
}
