//! # floor-core: Pure Domain Logic for Floor POS
//!
//! This crate holds everything about the restaurant floor that can be
//! expressed without I/O: entity types, status enums, fixed-point stock
//! quantities, recipe expansion and reservation window math.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Floor POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          External collaborators (HTTP, auth, analytics)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   floor-engine: TableStateMachine, OrderLifecycle,              │   │
//! │  │                 InventoryLedger, ReservationConflictDetector     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ floor-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ quantity  │  │  recipe   │  │reservation│  │   │
//! │  │   │ Table     │  │ Quantity  │  │Requirement│  │  Window   │  │   │
//! │  │   │ Order     │  │  Money    │  │ expansion │  │  overlap  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    floor-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (DiningTable, Order, Stock, Reservation, ...)
//! - [`quantity`] - Fixed-point stock quantity (thousandths, no floats)
//! - [`money`] - Integer cents for prices and line totals
//! - [`recipe`] - Flattening order items into stock requirements
//! - [`reservation`] - Reservation windows and conflict detection
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use floor_core::quantity::Quantity;
//!
//! let on_hand = Quantity::from_units(10);
//! let per_pizza = Quantity::parse("2.0").unwrap();
//! let needed = per_pizza.times(3).unwrap();
//!
//! assert_eq!((on_hand - needed).to_string(), "4.000");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod quantity;
pub mod recipe;
pub mod reservation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ConflictReason, CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product on one order line.
///
/// Guards against typing 1000 instead of 10 on a terminal.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum distinct lines on a single order.
pub const MAX_ORDER_LINES: usize = 100;

/// Highest unit price accepted for a product, in cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Highest stock amount accepted anywhere, in thousandths (one billion units).
///
/// A recipe line at this cap, times [`MAX_ITEM_QUANTITY`] on every one of
/// [`MAX_ORDER_LINES`] lines, still fits in an `i64`.
pub const MAX_STOCK_MILLI: i64 = 1_000_000_000_000;

/// Default length of the block a reservation holds a table for.
///
/// One dining turn. Configurable in the engine.
pub const DEFAULT_RESERVATION_WINDOW_MINUTES: i64 = 90;

/// Longest configurable reservation window: one day.
pub const MAX_RESERVATION_WINDOW_MINUTES: i64 = 24 * 60;
