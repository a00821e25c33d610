//! # Error Types
//!
//! Domain error taxonomy for the restaurant floor.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  floor-core errors (this file)                                         │
//! │  ├── CoreError        - Business outcomes surfaced verbatim            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  floor-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures                               │
//! │                                                                         │
//! │  floor-engine errors                                                   │
//! │  └── FloorError       - Domain | Storage | LockTimeout | Config        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → FloorError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is a local, expected, non-fatal outcome. The excluded
//! HTTP layer maps them to response codes.

use thiserror::Error;

use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Business errors raised by the floor components.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced dining table does not exist.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Referenced reservation does not exist.
    #[error("Reservation not found: {0}")]
    ReservationNotFound(String),

    /// Referenced stock item does not exist.
    #[error("Stock not found: {0}")]
    StockNotFound(String),

    /// Referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// An order upsert arrived with no items.
    #[error("Order for table {table_id} has no items")]
    EmptyOrder { table_id: String },

    /// The order is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Finalizing an order that is already finalized
    /// - Discarding a finalized order
    #[error("Order {order_id} cannot be changed: {reason}")]
    InvalidOrderState { order_id: String, reason: String },

    /// A deduction would drive a stock item below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Finalize order (3 × Pizza, 2.000 Cheese each)
    ///      │
    ///      ▼
    /// Cheese on hand: 1.000, required: 6.000
    ///      │
    ///      ▼
    /// InsufficientStock { stock: "Cheese", available: 1.000, requested: 6.000 }
    ///      │
    ///      ▼
    /// Nothing deducted, order stays open
    /// ```
    #[error("Not enough {name} ({stock_id}): available {available}, requested {requested}")]
    InsufficientStock {
        stock_id: String,
        name: String,
        available: Quantity,
        requested: Quantity,
    },

    /// A reservation request collides with the table's schedule or size.
    #[error("Reservation conflict: {0}")]
    ReservationConflict(ConflictReason),

    /// An unrecognized table status was requested.
    #[error("Invalid table status: '{0}'")]
    InvalidStatusTransition(String),

    /// The reservation is already in a terminal status.
    #[error("Reservation {reservation_id} is {status}, cannot perform operation")]
    InvalidReservationState {
        reservation_id: String,
        status: String,
    },

    /// The table still has an uncompleted order.
    #[error("Table {table_id} has open order {order_id}")]
    TableHasOpenOrder { table_id: String, order_id: String },

    /// Concurrent writers kept colliding; the caller should resubmit.
    #[error("Concurrent update on {entity} {id} did not settle after {attempts} attempts")]
    ConcurrencyConflict {
        entity: String,
        id: String,
        attempts: u32,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidOrderState error.
    pub fn invalid_order_state(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidOrderState {
            order_id: order_id.into(),
            reason: reason.into(),
        }
    }
}

/// Why a reservation request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// The proposed window intersects an existing active reservation.
    #[error("overlaps reservation {existing_id} ({existing_start} – {existing_end})")]
    Overlap {
        existing_id: String,
        existing_start: String,
        existing_end: String,
    },

    /// The party does not fit at the table.
    #[error("party of {party_size} exceeds table capacity {capacity}")]
    OverCapacity { party_size: i64, capacity: i64 },

    /// The table is in use by an open order during the proposed window.
    #[error("table is occupied by open order {order_id}")]
    TableOccupied { order_id: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any lock is taken or row is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed quantity, phone).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set or state.
    #[error("{field} is not allowed: {reason}")]
    NotAllowed { field: String, reason: String },

    /// Duplicate value (e.g., table number within a salon).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
