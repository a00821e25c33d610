//! # Table Repository
//!
//! Salons and dining tables.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use floor_core::{DiningTable, Salon, TableStatus};

const TABLE_COLUMNS: &str =
    "id, salon_id, number, capacity, status, created_at, updated_at";

/// Repository for salons and dining tables.
#[derive(Debug)]
pub struct TableRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TableRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        TableRepository { conn }
    }

    // =========================================================================
    // Salons
    // =========================================================================

    /// Creates a salon.
    pub async fn create_salon(&mut self, name: &str) -> DbResult<Salon> {
        let salon = Salon {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %salon.id, name = %salon.name, "Creating salon");

        sqlx::query("INSERT INTO salons (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&salon.id)
            .bind(&salon.name)
            .bind(salon.created_at)
            .execute(&mut *self.conn)
            .await?;

        Ok(salon)
    }

    pub async fn get_salon(&mut self, id: &str) -> DbResult<Option<Salon>> {
        let salon = sqlx::query_as::<_, Salon>(
            "SELECT id, name, created_at FROM salons WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(salon)
    }

    pub async fn list_salons(&mut self) -> DbResult<Vec<Salon>> {
        let salons = sqlx::query_as::<_, Salon>(
            "SELECT id, name, created_at FROM salons ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(salons)
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Inserts a new table in `AVAILABLE`.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the number is taken in the salon.
    pub async fn insert(
        &mut self,
        salon_id: &str,
        number: i64,
        capacity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<DiningTable> {
        let table = DiningTable {
            id: Uuid::new_v4().to_string(),
            salon_id: salon_id.to_string(),
            number,
            capacity,
            status: TableStatus::Available,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %table.id, salon_id = %salon_id, number, "Inserting table");

        sqlx::query(
            r#"
            INSERT INTO dining_tables (
                id, salon_id, number, capacity, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&table.id)
        .bind(&table.salon_id)
        .bind(table.number)
        .bind(table.capacity)
        .bind(table.status)
        .bind(table.created_at)
        .bind(table.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => {
                DbError::duplicate("table number", number.to_string())
            }
            other => other,
        })?;

        Ok(table)
    }

    /// Gets a table by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<DiningTable>> {
        let sql = format!("SELECT {TABLE_COLUMNS} FROM dining_tables WHERE id = ?1");
        let table = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(table)
    }

    /// Lists a salon's tables by number.
    pub async fn list_by_salon(&mut self, salon_id: &str) -> DbResult<Vec<DiningTable>> {
        let sql = format!(
            "SELECT {TABLE_COLUMNS} FROM dining_tables WHERE salon_id = ?1 ORDER BY number"
        );
        let tables = sqlx::query_as::<_, DiningTable>(&sql)
            .bind(salon_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(tables)
    }

    /// Whether a table number is already used in a salon.
    pub async fn number_exists(&mut self, salon_id: &str, number: i64) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM dining_tables WHERE salon_id = ?1 AND number = ?2",
        )
        .bind(salon_id)
        .bind(number)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count > 0)
    }

    /// Sets a table's status.
    ///
    /// ## Errors
    /// `DbError::NotFound` when no table has this id.
    pub async fn set_status(
        &mut self,
        id: &str,
        status: TableStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(table_id = %id, status = %status, "Updating table status");

        let result = sqlx::query(
            "UPDATE dining_tables SET status = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Table", id));
        }

        Ok(())
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dining_tables")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
