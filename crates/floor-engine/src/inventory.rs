//! # Inventory Ledger
//!
//! Stock quantities and the append-only movement log behind them.
//!
//! ## Single-Stock Change
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  deduct(tomato, 6.000, ORDER_CONSUMPTION)                              │
//! │                                                                         │
//! │  1. lock stock "tomato"                                                │
//! │  2. BEGIN                                                              │
//! │  3. read quantity ─── 10.000                                           │
//! │  4. 10.000 - 6.000 < 0 ?  no                                           │
//! │  5. quantity += -6.000 ; INSERT movement(-6.000)                       │
//! │  6. COMMIT, release lock                                               │
//! │  7. crossed the minimum? → StockBelowMinimum                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order Consumption
//! A finalize expands the order's recipes into one [`Requirement`] per
//! stock, checks every one against the locked stock rows, and only then
//! writes. Either every movement lands or none do.
//!
//! `quantity == initial_quantity + Σ change` holds at every commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use floor_core::recipe::{check_availability, expand_requirements, stock_ids, Requirement};
use floor_core::validation::{
    validate_name, validate_non_negative_quantity, validate_positive_quantity,
    validate_stock_ceiling,
};
use floor_core::{CoreError, MovementReason, Quantity, Stock, StockMovement};
use floor_db::UnitOfWork;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::FloorContext;
use crate::error::FloorResult;
use crate::events::FloorEvent;
use crate::locks::StockGuards;

/// Ledger check for one stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub stock_id: String,
    pub initial: Quantity,
    pub current: Quantity,
    pub total_change: Quantity,
    /// `initial + total_change == current`
    pub balanced: bool,
}

/// One movement applied by a finalize, with the stock as it stands after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduction {
    pub stock: Stock,
    pub movement: StockMovement,
}

impl Deduction {
    /// Whether this movement took the stock from at-or-above its minimum to
    /// below it.
    pub fn crossed_minimum(&self) -> bool {
        crossed_minimum(&self.stock, self.movement.change)
    }
}

fn crossed_minimum(after: &Stock, change: Quantity) -> bool {
    let before = after.quantity - change;
    after.is_below_minimum() && before >= after.minimum_quantity
}

fn below_minimum_event(stock: &Stock) -> FloorEvent {
    FloorEvent::StockBelowMinimum {
        stock_id: stock.id.clone(),
        name: stock.name.clone(),
        quantity: stock.quantity,
        minimum: stock.minimum_quantity,
    }
}

/// Owns stock quantities and the movement ledger.
#[derive(Clone)]
pub struct InventoryLedger {
    ctx: Arc<FloorContext>,
}

impl InventoryLedger {
    pub(crate) fn new(ctx: Arc<FloorContext>) -> Self {
        InventoryLedger { ctx }
    }

    // =========================================================================
    // Setup & Queries
    // =========================================================================

    /// Creates a stock item. Its starting quantity is kept for reconciliation.
    pub async fn create_stock(
        &self,
        name: &str,
        unit: &str,
        initial_quantity: Quantity,
        minimum_quantity: Quantity,
    ) -> FloorResult<Stock> {
        validate_name("stock name", name)?;
        validate_name("unit", unit)?;
        validate_non_negative_quantity("initial quantity", initial_quantity)?;
        validate_non_negative_quantity("minimum quantity", minimum_quantity)?;

        let now = self.ctx.clock.now_utc();
        let stock = Stock {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            unit: unit.trim().to_string(),
            quantity: initial_quantity,
            initial_quantity,
            minimum_quantity,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.ctx.begin().await?;
        uow.stock().insert(&stock).await?;
        uow.commit().await?;

        info!(
            stock_id = %stock.id,
            name = %stock.name,
            quantity = %stock.quantity,
            "Stock created"
        );
        Ok(stock)
    }

    pub async fn get(&self, stock_id: &str) -> FloorResult<Stock> {
        let mut uow = self.ctx.begin().await?;
        Self::load(&mut uow, stock_id).await
    }

    /// Every stock item, by name.
    pub async fn list(&self) -> FloorResult<Vec<Stock>> {
        let mut uow = self.ctx.begin().await?;
        Ok(uow.stock().list().await?)
    }

    /// Stock items under their minimum threshold.
    pub async fn below_minimum(&self) -> FloorResult<Vec<Stock>> {
        let mut uow = self.ctx.begin().await?;
        Ok(uow.stock().list_below_minimum().await?)
    }

    /// Ledger entries for a stock, oldest first.
    pub async fn movements(&self, stock_id: &str) -> FloorResult<Vec<StockMovement>> {
        let mut uow = self.ctx.begin().await?;
        Self::load(&mut uow, stock_id).await?;
        Ok(uow.stock().movements(stock_id).await?)
    }

    /// Sum of every movement delta for a stock.
    pub async fn total_change(&self, stock_id: &str) -> FloorResult<Quantity> {
        let mut uow = self.ctx.begin().await?;
        Self::load(&mut uow, stock_id).await?;
        Ok(uow.stock().total_change(stock_id).await?)
    }

    /// Compares the stored quantity with what the ledger says it should be.
    pub async fn reconcile(&self, stock_id: &str) -> FloorResult<Reconciliation> {
        let mut uow = self.ctx.begin().await?;
        let stock = Self::load(&mut uow, stock_id).await?;
        let total_change = uow.stock().total_change(stock_id).await?;

        Ok(Reconciliation {
            stock_id: stock.id,
            initial: stock.initial_quantity,
            current: stock.quantity,
            total_change,
            balanced: stock.initial_quantity + total_change == stock.quantity,
        })
    }

    // =========================================================================
    // Single-Stock Changes
    // =========================================================================

    /// Removes `quantity` from a stock.
    ///
    /// ## Errors
    /// - `StockNotFound`
    /// - `InsufficientStock` if the result would be negative (nothing written)
    pub async fn deduct(
        &self,
        stock_id: &str,
        quantity: Quantity,
        reason: MovementReason,
    ) -> FloorResult<StockMovement> {
        validate_positive_quantity("quantity", quantity)?;
        self.change(stock_id, -quantity, reason).await
    }

    /// Adds `quantity` to a stock.
    pub async fn add(
        &self,
        stock_id: &str,
        quantity: Quantity,
        reason: MovementReason,
    ) -> FloorResult<StockMovement> {
        validate_positive_quantity("quantity", quantity)?;
        self.change(stock_id, quantity, reason).await
    }

    /// Sets a stock to a counted quantity, logging the difference as a
    /// `MANUAL_ADJUSTMENT`.
    ///
    /// ## Returns
    /// `None` when the stock already holds `new_quantity`.
    pub async fn adjust_to(
        &self,
        stock_id: &str,
        new_quantity: Quantity,
    ) -> FloorResult<Option<StockMovement>> {
        validate_non_negative_quantity("quantity", new_quantity)?;

        let guards = self.ctx.locks.lock_stocks(&[stock_id.to_string()]).await?;
        debug!(stock_id = %stock_id, locked = guards.stock_ids().len(), "Adjusting stock");

        let (movement, crossed) = self
            .ctx
            .retry
            .run("stock", stock_id, || async move {
                let mut uow = self.ctx.begin().await?;
                let stock = Self::load(&mut uow, stock_id).await?;
                let difference = new_quantity - stock.quantity;
                if difference.is_zero() {
                    return Ok((None, None));
                }

                let movement = uow
                    .stock()
                    .record_movement(
                        stock_id,
                        difference,
                        MovementReason::ManualAdjustment,
                        None,
                        self.ctx.clock.now_utc(),
                    )
                    .await?;
                let after = Self::load(&mut uow, stock_id).await?;
                uow.commit().await?;

                let crossed = crossed_minimum(&after, difference).then_some(after);
                Ok((Some(movement), crossed))
            })
            .await?;
        drop(guards);

        if let Some(movement) = &movement {
            info!(stock_id = %stock_id, change = %movement.change, "Stock adjusted");
        }
        if let Some(stock) = crossed {
            self.ctx.emit(&[below_minimum_event(&stock)]).await;
        }

        Ok(movement)
    }

    /// Applies one signed change under the stock lock.
    async fn change(
        &self,
        stock_id: &str,
        change: Quantity,
        reason: MovementReason,
    ) -> FloorResult<StockMovement> {
        let guards = self.ctx.locks.lock_stocks(&[stock_id.to_string()]).await?;

        let (movement, after) = self
            .ctx
            .retry
            .run("stock", stock_id, || async move {
                let mut uow = self.ctx.begin().await?;
                let stock = Self::load(&mut uow, stock_id).await?;

                let resulting = stock.quantity.checked_add(change)?;
                if resulting.is_negative() {
                    return Err(CoreError::InsufficientStock {
                        stock_id: stock.id,
                        name: stock.name,
                        available: stock.quantity,
                        requested: -change,
                    }
                    .into());
                }
                validate_stock_ceiling("quantity", resulting)?;

                let movement = uow
                    .stock()
                    .record_movement(stock_id, change, reason, None, self.ctx.clock.now_utc())
                    .await?;
                let after = Self::load(&mut uow, stock_id).await?;
                uow.commit().await?;
                Ok((movement, after))
            })
            .await?;
        drop(guards);

        info!(
            stock_id = %stock_id,
            change = %change,
            reason = %reason,
            quantity = %after.quantity,
            "Stock changed"
        );
        if crossed_minimum(&after, change) {
            self.ctx.emit(&[below_minimum_event(&after)]).await;
        }

        Ok(movement)
    }

    // =========================================================================
    // Order Consumption (inside the caller's transaction)
    // =========================================================================

    /// Expands an order's items through their recipes into per-stock totals.
    ///
    /// Sorted by stock id, which is also lock order.
    pub async fn plan_requirements(
        uow: &mut UnitOfWork,
        order_id: &str,
    ) -> FloorResult<Vec<Requirement>> {
        let details = uow
            .orders()
            .get_details(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        let items = details.product_quantities();
        let product_ids: Vec<String> = items.iter().map(|(id, _)| id.clone()).collect();
        let recipes = uow.products().recipes_for(&product_ids).await?;

        Ok(expand_requirements(&items, &recipes)?)
    }

    /// Deducts every ingredient an order consumes, all or nothing.
    ///
    /// Runs in the caller's transaction; the caller holds the table lock and
    /// `locked`. If the recipes changed since `locked` was taken, fails with
    /// a retryable `ConcurrencyConflict` so the caller can re-plan.
    ///
    /// ## Errors
    /// - `InsufficientStock` for the first stock (by id) that would go
    ///   negative; nothing has been written when this is returned
    /// - `StockNotFound` if a recipe references a missing stock
    pub async fn deduct_for_order_finalization(
        uow: &mut UnitOfWork,
        order_id: &str,
        locked: &StockGuards,
        now: DateTime<Utc>,
    ) -> FloorResult<Vec<Deduction>> {
        let requirements = Self::plan_requirements(uow, order_id).await?;
        let ids = stock_ids(&requirements);

        if !locked.covers_exactly(&ids) {
            debug!(order_id = %order_id, "Recipes changed after planning");
            return Err(CoreError::ConcurrencyConflict {
                entity: "order".to_string(),
                id: order_id.to_string(),
                attempts: 1,
            }
            .into());
        }

        let stocks = uow.stock().get_many(&ids).await?;
        check_availability(&requirements, &stocks)?;

        let mut deductions = Vec::with_capacity(requirements.len());
        for requirement in &requirements {
            let movement = uow
                .stock()
                .record_movement(
                    &requirement.stock_id,
                    -requirement.quantity,
                    MovementReason::OrderConsumption,
                    Some(order_id),
                    now,
                )
                .await?;
            let stock = Self::load(uow, &requirement.stock_id).await?;
            deductions.push(Deduction { stock, movement });
        }

        debug!(order_id = %order_id, stocks = deductions.len(), "Order ingredients deducted");
        Ok(deductions)
    }

    /// `StockBelowMinimum` events for deductions that crossed a threshold.
    pub fn low_stock_events(deductions: &[Deduction]) -> Vec<FloorEvent> {
        deductions
            .iter()
            .filter(|d| d.crossed_minimum())
            .map(|d| below_minimum_event(&d.stock))
            .collect()
    }

    pub(crate) async fn load(uow: &mut UnitOfWork, stock_id: &str) -> FloorResult<Stock> {
        uow.stock()
            .get(stock_id)
            .await?
            .ok_or_else(|| CoreError::StockNotFound(stock_id.to_string()).into())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
