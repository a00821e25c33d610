//! # Stock Repository
//!
//! Stock rows and the append-only movement ledger.
//!
//! ## Ledger Write
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_movement(stock, -6.000, ORDER_CONSUMPTION, order-42)           │
//! │                                                                         │
//! │  ┌─────────────────────────── same transaction ──────────────────────┐ │
//! │  │ UPDATE stocks SET quantity = quantity + (-6000) WHERE id = ?       │ │
//! │  │ INSERT INTO stock_movements (stock_id, change, reason, ref) ...    │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  quantity == initial_quantity + SUM(change)   at every commit          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No method here issues UPDATE or DELETE against `stock_movements`.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use floor_core::{MovementReason, Quantity, Stock, StockMovement};

const STOCK_COLUMNS: &str =
    "id, name, unit, quantity, initial_quantity, minimum_quantity, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, stock_id, change, reason, reference_id, created_at";

/// Repository for stock and stock movements.
#[derive(Debug)]
pub struct StockRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockRepository { conn }
    }

    /// Inserts a stock row. `quantity` should equal `initial_quantity`.
    pub async fn insert(&mut self, stock: &Stock) -> DbResult<()> {
        debug!(id = %stock.id, name = %stock.name, quantity = %stock.quantity, "Inserting stock");

        sqlx::query(
            r#"
            INSERT INTO stocks (
                id, name, unit, quantity, initial_quantity, minimum_quantity,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&stock.id)
        .bind(&stock.name)
        .bind(&stock.unit)
        .bind(stock.quantity)
        .bind(stock.initial_quantity)
        .bind(stock.minimum_quantity)
        .bind(stock.created_at)
        .bind(stock.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a stock row by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Stock>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stocks WHERE id = ?1");
        let stock = sqlx::query_as::<_, Stock>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(stock)
    }

    /// Gets several stock rows in the order given. Missing ids are skipped.
    pub async fn get_many(&mut self, ids: &[String]) -> DbResult<Vec<Stock>> {
        let mut stocks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(stock) = self.get(id).await? {
                stocks.push(stock);
            }
        }
        Ok(stocks)
    }

    /// Lists all stock rows by name.
    pub async fn list(&mut self) -> DbResult<Vec<Stock>> {
        let sql = format!("SELECT {STOCK_COLUMNS} FROM stocks ORDER BY name");
        let stocks = sqlx::query_as::<_, Stock>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(stocks)
    }

    /// Stock rows whose quantity is under their minimum threshold.
    pub async fn list_below_minimum(&mut self) -> DbResult<Vec<Stock>> {
        let sql = format!(
            "SELECT {STOCK_COLUMNS} FROM stocks WHERE quantity < minimum_quantity ORDER BY name"
        );
        let stocks = sqlx::query_as::<_, Stock>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(stocks)
    }

    /// Applies a signed change to a stock and appends the matching ledger row.
    ///
    /// The caller has already checked the result stays non-negative; the
    /// schema's CHECK constraint rejects it otherwise.
    pub async fn record_movement(
        &mut self,
        stock_id: &str,
        change: Quantity,
        reason: MovementReason,
        reference_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<StockMovement> {
        debug!(
            stock_id = %stock_id,
            change = %change,
            reason = %reason,
            "Recording stock movement"
        );

        let result = sqlx::query(
            "UPDATE stocks SET quantity = quantity + ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(stock_id)
        .bind(change)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Stock", stock_id));
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            stock_id: stock_id.to_string(),
            change,
            reason,
            reference_id: reference_id.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, stock_id, change, reason, reference_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.stock_id)
        .bind(movement.change)
        .bind(movement.reason)
        .bind(&movement.reference_id)
        .bind(movement.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(movement)
    }

    /// Ledger entries for a stock, oldest first.
    pub async fn movements(&mut self, stock_id: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE stock_id = ?1 ORDER BY rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(stock_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(movements)
    }

    /// Ledger entries carrying a reference (e.g. an order id), oldest first.
    pub async fn movements_by_reference(
        &mut self,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE reference_id = ?1 ORDER BY rowid"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(reference_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(movements)
    }

    /// Sum of every ledger delta for a stock.
    pub async fn total_change(&mut self, stock_id: &str) -> DbResult<Quantity> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(change), 0) FROM stock_movements WHERE stock_id = ?1",
        )
        .bind(stock_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Quantity::from_milli(total))
    }

    /// Total number of ledger rows across all stock.
    pub async fn count_movements(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_movements")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError};
    use chrono::Utc;
    use floor_core::{MovementReason, Quantity, Stock};
    use uuid::Uuid;

    fn stock(name: &str, units: i64, minimum: i64) -> Stock {
        let now = Utc::now();
        Stock {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            unit: "kg".to_string(),
            quantity: Quantity::from_units(units),
            initial_quantity: Quantity::from_units(units),
            minimum_quantity: Quantity::from_units(minimum),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_record_movement_keeps_ledger_balanced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let tomato = stock("Tomato", 10, 0);
        uow.stock().insert(&tomato).await.unwrap();

        let now = Utc::now();
        uow.stock()
            .record_movement(
                &tomato.id,
                Quantity::from_units(-6),
                MovementReason::OrderConsumption,
                Some("order-1"),
                now,
            )
            .await
            .unwrap();
        uow.stock()
            .record_movement(
                &tomato.id,
                Quantity::from_milli(2_500),
                MovementReason::Restock,
                None,
                now,
            )
            .await
            .unwrap();

        let current = uow.stock().get(&tomato.id).await.unwrap().unwrap();
        assert_eq!(current.quantity, Quantity::from_milli(6_500));

        let total = uow.stock().total_change(&tomato.id).await.unwrap();
        assert_eq!(current.initial_quantity + total, current.quantity);

        let ledger = uow.stock().movements(&tomato.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].reason, MovementReason::OrderConsumption);
        assert_eq!(ledger[0].reference_id.as_deref(), Some("order-1"));
        assert_eq!(ledger[1].change, Quantity::from_milli(2_500));

        let by_order = uow.stock().movements_by_reference("order-1").await.unwrap();
        assert_eq!(by_order.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_quantity_is_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let cheese = stock("Cheese", 1, 0);
        uow.stock().insert(&cheese).await.unwrap();

        let result = uow
            .stock()
            .record_movement(
                &cheese.id,
                Quantity::from_units(-2),
                MovementReason::OrderConsumption,
                None,
                Utc::now(),
            )
            .await;
        assert!(result.is_err());

        let current = uow.stock().get(&cheese.id).await.unwrap().unwrap();
        assert_eq!(current.quantity, Quantity::from_units(1));
        assert_eq!(uow.stock().count_movements().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let err = uow
            .stock()
            .record_movement(
                "missing",
                Quantity::from_units(1),
                MovementReason::Restock,
                None,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(uow.stock().total_change("missing").await.unwrap(), Quantity::zero());
    }

    #[tokio::test]
    async fn test_below_minimum() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();

        let flour = stock("Flour", 2, 5);
        let salt = stock("Salt", 9, 1);
        uow.stock().insert(&flour).await.unwrap();
        uow.stock().insert(&salt).await.unwrap();

        let low = uow.stock().list_below_minimum().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].id, flour.id);
        assert_eq!(uow.stock().list().await.unwrap().len(), 2);

        let ids = vec![salt.id.clone(), "missing".to_string(), flour.id.clone()];
        let fetched = uow.stock().get_many(&ids).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id, salt.id);
    }
}
