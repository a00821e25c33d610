//! # floor-engine: Floor Components for Floor POS
//!
//! The four components that keep tables, orders, stock and reservations
//! consistent while many staff terminals act on the same floor at once.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Floor Engine                                   │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     Floor (facade, cheap to clone)               │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │    ┌──────────────┬───────────┼───────────────┬──────────────────┐     │
//! │    ▼              ▼           ▼               ▼                  ▼     │
//! │ ┌────────┐ ┌──────────────┐ ┌───────────┐ ┌─────────┐ ┌──────────────┐ │
//! │ │ Table  │ │    Order     │ │ Inventory │ │ Catalog │ │ Reservation  │ │
//! │ │ State  │ │  Lifecycle   │ │  Ledger   │ │         │ │  Conflict    │ │
//! │ │Machine │ │              │ │           │ │         │ │  Detector    │ │
//! │ └───┬────┘ └──────┬───────┘ └─────┬─────┘ └────┬────┘ └──────┬───────┘ │
//! │     └─────────────┴───────────────┼────────────┴─────────────┘         │
//! │                                   ▼                                     │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  FloorContext                                                    │  │
//! │  │  LockManager (table → stocks ascending) · RetryPolicy · Clock    │  │
//! │  │  EventSink (after commit, failures logged) · Database            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`tables`] - Table status and floor setup
//! - [`orders`] - Open/sync/finalize orders, guarded table release
//! - [`inventory`] - Stock ledger and order consumption
//! - [`catalog`] - Products and recipes
//! - [`reservations`] - Reservation windows and terminal statuses
//! - [`locks`] - Keyed async locks with timeouts
//! - [`retry`] - Bounded retry of transient storage conflicts
//! - [`events`] - Notifications for external collaborators
//! - [`clock`] - Injectable time source
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Engine error type
//!
//! ## Usage
//!
//! ```rust,ignore
//! use floor_engine::{Floor, FloorConfig, OrderLine};
//!
//! floor_engine::init_tracing();
//! let floor = Floor::open(FloorConfig::load_or_default(None)).await?;
//!
//! let order = floor
//!     .orders()
//!     .open_or_upsert(&table_id, &staff_id, &[OrderLine::new(&pizza_id, 2)])
//!     .await?;
//! floor.orders().finalize_order(&order.order.id, &staff_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod floor;
pub mod inventory;
pub mod locks;
pub mod orders;
pub mod reservations;
pub mod retry;
pub mod tables;

mod context;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{Catalog, RecipeLine};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConcurrencySettings, DatabaseSettings, FloorConfig, ReservationSettings};
pub use error::{FloorError, FloorResult};
pub use events::{EventSink, FloorEvent, NoopSink, OutboxSink, RecordingSink};
pub use floor::{Floor, FloorBuilder};
pub use inventory::{Deduction, InventoryLedger, Reconciliation};
pub use locks::{LockManager, StockGuards, TableGuard};
pub use orders::OrderLifecycle;
pub use reservations::ReservationConflictDetector;
pub use retry::RetryPolicy;
pub use tables::TableStateMachine;

pub use floor_core::{
    ConflictReason, CoreError, DiningTable, Money, MovementReason, Order, OrderDetails, OrderItem,
    OrderLine, Product, Quantity, Reservation, ReservationChanges, ReservationRequest,
    ReservationStatus, Salon, Stock, StockMovement, TableStatus, ValidationError,
};
pub use floor_db::DbConfig;

// =============================================================================
// Tracing
// =============================================================================

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,floor=debug,sqlx=warn";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

// =============================================================================
// Test Support
// =============================================================================


#[cfg(test)]
mod tests {
    #[test]
    fn test_init_tracing_twice() {
        super::init_tracing();
        super::init_tracing();
        tracing::info!("still logging");
    }
}
