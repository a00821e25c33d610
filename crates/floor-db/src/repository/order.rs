//! # Order Repository
//!
//! Orders and their items.
//!
//! ## Order Lifecycle (storage view)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── insert()        → orders row, completed = 0                    │
//! │     └── replace_items() → order_items rows (full replacement)          │
//! │                                                                         │
//! │  2. SYNC (same order, new item set)                                    │
//! │     └── replace_items() + touch()                                      │
//! │                                                                         │
//! │  3. FINALIZE                                                           │
//! │     └── mark_finalized() → completed = 1, finalized_at, finalized_by  │
//! │         (guarded by WHERE completed = 0, so it can win only once)      │
//! │                                                                         │
//! │  idx_orders_one_open_per_table rejects a second open row per table.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use floor_core::{Order, OrderDetails, OrderItem};

const ORDER_COLUMNS: &str =
    "id, table_id, staff_id, completed, created_at, updated_at, finalized_at, finalized_by";

const ITEM_COLUMNS: &str = "id, order_id, product_id, name_snapshot, unit_price_cents, \
     quantity, line_total_cents, created_at";

/// Repository for orders and order items.
#[derive(Debug)]
pub struct OrderRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OrderRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        OrderRepository { conn }
    }

    /// Gets an order by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(order)
    }

    /// Gets an order together with its items.
    pub async fn get_details(&mut self, id: &str) -> DbResult<Option<OrderDetails>> {
        let Some(order) = self.get(id).await? else {
            return Ok(None);
        };
        let items = self.items(&order.id).await?;
        Ok(Some(OrderDetails { order, items }))
    }

    /// The table's uncompleted order, if any.
    pub async fn find_open_for_table(&mut self, table_id: &str) -> DbResult<Option<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE table_id = ?1 AND completed = 0"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(table_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(order)
    }

    /// All orders for a table, newest first.
    pub async fn list_for_table(&mut self, table_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE table_id = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(table_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(orders)
    }

    /// Counts uncompleted orders for a table (0 or 1 when healthy).
    pub async fn count_open_for_table(&mut self, table_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE table_id = ?1 AND completed = 0",
        )
        .bind(table_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    /// Inserts an order row (items are written separately).
    pub async fn insert(&mut self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, table_id = %order.table_id, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, table_id, staff_id, completed,
                created_at, updated_at, finalized_at, finalized_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.table_id)
        .bind(&order.staff_id)
        .bind(order.completed)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.finalized_at)
        .bind(&order.finalized_by)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Bumps `updated_at`.
    pub async fn touch(&mut self, id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE orders SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    /// Replaces an order's item set.
    ///
    /// Items keep the order they are passed in.
    pub async fn replace_items(&mut self, order_id: &str, items: &[OrderItem]) -> DbResult<()> {
        debug!(order_id = %order_id, count = items.len(), "Replacing order items");

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *self.conn)
            .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, name_snapshot, unit_price_cents,
                    quantity, line_total_cents, created_at, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(order_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(item.created_at)
            .bind(position as i64)
            .execute(&mut *self.conn)
            .await?;
        }

        Ok(())
    }

    /// Gets all items for an order.
    pub async fn items(&mut self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY position"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(items)
    }

    /// Marks an open order completed.
    ///
    /// ## Returns
    /// `false` if the order was already completed (or does not exist).
    pub async fn mark_finalized(
        &mut self,
        id: &str,
        finalized_by: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                completed = 1,
                finalized_at = ?2,
                finalized_by = ?3,
                updated_at = ?2
            WHERE id = ?1 AND completed = 0
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(finalized_by)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deletes an open order and its items.
    ///
    /// ## Returns
    /// `false` if no open order had this id.
    pub async fn delete_open(&mut self, id: &str) -> DbResult<bool> {
        sqlx::query(
            "DELETE FROM order_items WHERE order_id IN \
             (SELECT id FROM orders WHERE id = ?1 AND completed = 0)",
        )
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1 AND completed = 0")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig, DbError, UnitOfWork};
    use chrono::Utc;
    use floor_core::{Order, OrderItem, Product};
    use uuid::Uuid;

    async fn fixture(uow: &mut UnitOfWork) -> (String, Product) {
        let now = Utc::now();
        let salon = uow.tables().create_salon("Hall").await.unwrap();
        let table = uow.tables().insert(&salon.id, 7, 4, now).await.unwrap();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Pizza".to_string(),
            category: "Mains".to_string(),
            price_cents: 1250,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        uow.products().insert(&product).await.unwrap();
        (table.id, product)
    }

    fn open_order(table_id: &str) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4().to_string(),
            table_id: table_id.to_string(),
            staff_id: "staff-1".to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
            finalized_at: None,
            finalized_by: None,
        }
    }

    fn item(order_id: &str, product: &Product, quantity: i64) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: product.id.clone(),
            name_snapshot: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price_cents * quantity,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_open_order_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let (table_id, pizza) = fixture(&mut uow).await;

        let order = open_order(&table_id);
        uow.orders().insert(&order).await.unwrap();
        uow.orders()
            .replace_items(&order.id, &[item(&order.id, &pizza, 3)])
            .await
            .unwrap();

        let open = uow.orders().find_open_for_table(&table_id).await.unwrap().unwrap();
        assert_eq!(open.id, order.id);

        let details = uow.orders().get_details(&order.id).await.unwrap().unwrap();
        assert_eq!(details.items.len(), 1);
        assert_eq!(details.total().cents(), 3750);
    }

    #[tokio::test]
    async fn test_replace_items_is_full_sync() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let (table_id, pizza) = fixture(&mut uow).await;

        let order = open_order(&table_id);
        uow.orders().insert(&order).await.unwrap();
        uow.orders()
            .replace_items(&order.id, &[item(&order.id, &pizza, 3)])
            .await
            .unwrap();
        uow.orders()
            .replace_items(&order.id, &[item(&order.id, &pizza, 1)])
            .await
            .unwrap();

        let items = uow.orders().items(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 1);
    }

    #[tokio::test]
    async fn test_second_open_order_is_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let (table_id, _) = fixture(&mut uow).await;

        uow.orders().insert(&open_order(&table_id)).await.unwrap();
        let err = uow.orders().insert(&open_order(&table_id)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert!(err.is_retryable());
        assert_eq!(uow.orders().count_open_for_table(&table_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_finalized_only_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let (table_id, _) = fixture(&mut uow).await;

        let order = open_order(&table_id);
        uow.orders().insert(&order).await.unwrap();

        let now = Utc::now();
        assert!(uow.orders().mark_finalized(&order.id, "staff-2", now).await.unwrap());
        assert!(!uow.orders().mark_finalized(&order.id, "staff-2", now).await.unwrap());

        let finalized = uow.orders().get(&order.id).await.unwrap().unwrap();
        assert!(finalized.completed);
        assert_eq!(finalized.finalized_by.as_deref(), Some("staff-2"));
        assert!(finalized.finalized_at.is_some());
        assert!(uow.orders().find_open_for_table(&table_id).await.unwrap().is_none());

        // A finalized order no longer blocks a new one.
        uow.orders().insert(&open_order(&table_id)).await.unwrap();
        assert_eq!(uow.orders().list_for_table(&table_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_open() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.begin().await.unwrap();
        let (table_id, pizza) = fixture(&mut uow).await;

        let order = open_order(&table_id);
        uow.orders().insert(&order).await.unwrap();
        uow.orders()
            .replace_items(&order.id, &[item(&order.id, &pizza, 2)])
            .await
            .unwrap();

        assert!(uow.orders().delete_open(&order.id).await.unwrap());
        assert!(uow.orders().get(&order.id).await.unwrap().is_none());
        assert!(uow.orders().items(&order.id).await.unwrap().is_empty());
        assert!(!uow.orders().delete_open(&order.id).await.unwrap());
    }
}
