//! # floor-db: Database Layer for Floor POS
//!
//! SQLite storage for the restaurant floor, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Floor POS Data Flow                              │
//! │                                                                         │
//! │  floor-engine (OrderLifecycle.finalize_order)                          │
//! │       │  locks held: table, stocks                                     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     floor-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ TableRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │    │ OrderRepo     │    │ 001_initial_ │  │   │
//! │  │   │ UnitOfWork ───┼───►│ StockRepo ... │    │   schema.sql │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration, and [`UnitOfWork`]
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories for every floor record type
//!
//! ## Usage
//!
//! ```rust,ignore
//! use floor_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("floor.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! let open = uow.orders().find_open_for_table(&table_id).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, UnitOfWork};

pub use repository::order::OrderRepository;
pub use repository::outbox::{EventOutboxRepository, OutboxEntry};
pub use repository::product::ProductRepository;
pub use repository::reservation::ReservationRepository;
pub use repository::stock::StockRepository;
pub use repository::table::TableRepository;
