//! # Repository Module
//!
//! Transactional repositories for the floor database.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories inside a UnitOfWork                     │
//! │                                                                         │
//! │  floor-engine component                                                │
//! │       │                                                                 │
//! │       │  let mut uow = db.begin().await?;                              │
//! │       │  uow.orders().find_open_for_table(id)                          │
//! │       ▼                                                                 │
//! │  OrderRepository<'c> { conn: &'c mut SqliteConnection }               │
//! │       │                                                                 │
//! │       │  SQL on the transaction's connection                          │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every repository borrows the unit's connection, so all reads and      │
//! │  writes in one unit commit or roll back together.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories only translate between rows and floor-core types. Rules such
//! as "stock never goes negative" live in floor-engine; the schema's CHECK and
//! UNIQUE constraints are a last line behind them.
//!
//! ## Available Repositories
//!
//! - [`TableRepository`](table::TableRepository) - Salons, tables, status
//! - [`OrderRepository`](order::OrderRepository) - Orders and items
//! - [`ProductRepository`](product::ProductRepository) - Catalog and recipes
//! - [`StockRepository`](stock::StockRepository) - Stock and movement ledger
//! - [`ReservationRepository`](reservation::ReservationRepository) - Bookings
//! - [`EventOutboxRepository`](outbox::EventOutboxRepository) - Event queue

pub mod order;
pub mod outbox;
pub mod product;
pub mod reservation;
pub mod stock;
pub mod table;
