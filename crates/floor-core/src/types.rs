//! # Domain Types
//!
//! Entities and status enums for the restaurant floor.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Salon ──< DiningTable ──< Order ──< OrderItem >── Product              │
//! │                  │                                    │                 │
//! │                  └──< Reservation                     │ recipe          │
//! │                                                       ▼                 │
//! │                            StockMovement >── Stock <── ProductIngredient│
//! │                                                                         │
//! │  TableStatus:       AVAILABLE | OCCUPIED | RESERVED | CLEANING |        │
//! │                     MAINTENANCE                                         │
//! │  ReservationStatus: CONFIRMED | PENDING | CANCELLED | COMPLETED |       │
//! │                     NO_SHOW                                             │
//! │  MovementReason:    ORDER_CONSUMPTION | MANUAL_ADJUSTMENT | RESTOCK     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries a UUID v4 `id`. Business keys (table number within a
//! salon) are unique but never used as foreign keys.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;

/// Normalizes a free-form status string: `"no-show"`, `"No Show"` → `"NO_SHOW"`.
fn normalize_status(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

// =============================================================================
// Table Status
// =============================================================================

/// Occupancy status of a dining table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    /// Free for walk-ins or seating.
    #[default]
    Available,
    /// Guests are seated and an order is (or will be) open.
    Occupied,
    /// Held for an upcoming reservation. Advisory.
    Reserved,
    /// Guests left, being reset.
    Cleaning,
    /// Out of service.
    Maintenance,
}

impl TableStatus {
    pub const ALL: [TableStatus; 5] = [
        TableStatus::Available,
        TableStatus::Occupied,
        TableStatus::Reserved,
        TableStatus::Cleaning,
        TableStatus::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "AVAILABLE",
            TableStatus::Occupied => "OCCUPIED",
            TableStatus::Reserved => "RESERVED",
            TableStatus::Cleaning => "CLEANING",
            TableStatus::Maintenance => "MAINTENANCE",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary parsing for statuses that arrive as strings.
///
/// Unknown values never reach the state machine.
impl FromStr for TableStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_status(s);
        TableStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| CoreError::InvalidStatusTransition(s.to_string()))
    }
}

// =============================================================================
// Reservation Status
// =============================================================================

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    #[default]
    Confirmed,
    Pending,
    Cancelled,
    Completed,
    NoShow,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 5] = [
        ReservationStatus::Confirmed,
        ReservationStatus::Pending,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
        ReservationStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::NoShow => "NO_SHOW",
        }
    }

    /// Active reservations hold their window and take part in conflict checks.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, ReservationStatus::Confirmed | ReservationStatus::Pending)
    }

    /// Terminal reservations accept no further transitions.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_status(s);
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::Validation(ValidationError::NotAllowed {
                    field: "reservation status".to_string(),
                    reason: format!("unknown status '{}'", s),
                })
            })
    }
}

// =============================================================================
// Movement Reason
// =============================================================================

/// Why a stock quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    /// Ingredients consumed by a finalized order.
    OrderConsumption,
    /// Direct correction after a count.
    ManualAdjustment,
    /// Delivery received.
    Restock,
}

impl fmt::Display for MovementReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MovementReason::OrderConsumption => "ORDER_CONSUMPTION",
            MovementReason::ManualAdjustment => "MANUAL_ADJUSTMENT",
            MovementReason::Restock => "RESTOCK",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Salon & Dining Table
// =============================================================================

/// A dining room. Table numbers are unique within a salon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Salon {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A table on the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: String,
    /// Owning salon (lookup only).
    pub salon_id: String,
    /// Number printed on the table, unique within the salon.
    pub number: i64,
    /// Seats.
    pub capacity: i64,
    pub status: TableStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Orders
// =============================================================================

/// An order opened against a table.
///
/// At most one order with `completed == false` exists per table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub table_id: String,
    /// Staff member who opened the order (opaque id from the identity boundary).
    pub staff_id: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub finalized_by: Option<String>,
}

impl Order {
    /// Items may only change while this is true.
    #[inline]
    pub fn is_open(&self) -> bool {
        !self.completed
    }
}

/// A line on an order.
///
/// Name and unit price are frozen when the line is written so later catalog
/// edits never change an order's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// `unit_price_cents × quantity`.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// One requested line in an order upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderDetails {
    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// `(product_id, quantity)` pairs used for recipe expansion.
    pub fn product_quantities(&self) -> Vec<(String, i64)> {
        self.items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect()
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A product on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// One recipe line: `quantity` of a stock consumed per unit of product sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductIngredient {
    pub product_id: String,
    pub stock_id: String,
    pub quantity: Quantity,
}

/// A product with its full recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithRecipe {
    pub product: Product,
    pub recipe: Vec<ProductIngredient>,
}

// =============================================================================
// Inventory
// =============================================================================

/// A stocked ingredient.
///
/// `quantity` is only ever changed together with an appended
/// [`StockMovement`], so `quantity == initial_quantity + Σ change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Stock {
    pub id: String,
    pub name: String,
    /// Unit of measure ("kg", "l", "pcs").
    pub unit: String,
    pub quantity: Quantity,
    /// On-hand amount when the stock row was created.
    pub initial_quantity: Quantity,
    /// Re-order threshold.
    pub minimum_quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    #[inline]
    pub fn is_below_minimum(&self) -> bool {
        self.quantity < self.minimum_quantity
    }
}

/// Append-only ledger entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub stock_id: String,
    /// Signed delta applied to the stock.
    pub change: Quantity,
    pub reason: MovementReason,
    /// Order id for consumption, free-form otherwise.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reservations
// =============================================================================

/// A booking for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reservation {
    pub id: String,
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i64,
    pub status: ReservationStatus,
    /// Staff member who took the booking.
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Local wall-clock start of the booking.
    #[inline]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.reservation_date.and_time(self.reservation_time)
    }
}

/// Input for creating a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub party_size: i64,
    /// `None` falls back to the configured default (CONFIRMED).
    pub status: Option<ReservationStatus>,
    pub created_by: String,
}

impl ReservationRequest {
    #[inline]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.reservation_date.and_time(self.reservation_time)
    }
}

/// Partial update for an existing reservation. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationChanges {
    pub table_id: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub reservation_date: Option<NaiveDate>,
    pub reservation_time: Option<NaiveTime>,
    pub party_size: Option<i64>,
}

impl ReservationChanges {
    /// Applies the changes on top of `current`, returning the merged booking.
    pub fn apply_to(&self, current: &Reservation) -> Reservation {
        let mut merged = current.clone();
        if let Some(table_id) = &self.table_id {
            merged.table_id = table_id.clone();
        }
        if let Some(name) = &self.customer_name {
            merged.customer_name = name.clone();
        }
        if let Some(phone) = &self.customer_phone {
            merged.customer_phone = phone.clone();
        }
        if let Some(email) = &self.customer_email {
            merged.customer_email = Some(email.clone());
        }
        if let Some(date) = self.reservation_date {
            merged.reservation_date = date;
        }
        if let Some(time) = self.reservation_time {
            merged.reservation_time = time;
        }
        if let Some(party_size) = self.party_size {
            merged.party_size = party_size;
        }
        merged
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
