//! # Reservation Repository
//!
//! Table bookings.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use floor_core::{Reservation, ReservationStatus};

const RESERVATION_COLUMNS: &str = "id, table_id, customer_name, customer_phone, customer_email, \
     reservation_date, reservation_time, party_size, status, created_by, created_at, updated_at";

/// Repository for reservations.
#[derive(Debug)]
pub struct ReservationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReservationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReservationRepository { conn }
    }

    /// Inserts a reservation.
    pub async fn insert(&mut self, reservation: &Reservation) -> DbResult<()> {
        debug!(
            id = %reservation.id,
            table_id = %reservation.table_id,
            starts_at = %reservation.starts_at(),
            "Inserting reservation"
        );

        sqlx::query(
            r#"
            INSERT INTO reservations (
                id, table_id, customer_name, customer_phone, customer_email,
                reservation_date, reservation_time, party_size, status,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.table_id)
        .bind(&reservation.customer_name)
        .bind(&reservation.customer_phone)
        .bind(&reservation.customer_email)
        .bind(reservation.reservation_date)
        .bind(reservation.reservation_time)
        .bind(reservation.party_size)
        .bind(reservation.status)
        .bind(&reservation.created_by)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Overwrites the editable fields of a reservation.
    pub async fn update(&mut self, reservation: &Reservation) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE reservations SET
                table_id = ?2,
                customer_name = ?3,
                customer_phone = ?4,
                customer_email = ?5,
                reservation_date = ?6,
                reservation_time = ?7,
                party_size = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.table_id)
        .bind(&reservation.customer_name)
        .bind(&reservation.customer_phone)
        .bind(&reservation.customer_email)
        .bind(reservation.reservation_date)
        .bind(reservation.reservation_time)
        .bind(reservation.party_size)
        .bind(reservation.updated_at)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Reservation", &reservation.id));
        }

        Ok(())
    }

    /// Gets a reservation by ID.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?1");
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(reservation)
    }

    /// CONFIRMED and PENDING reservations on a table, earliest first.
    pub async fn active_for_table(&mut self, table_id: &str) -> DbResult<Vec<Reservation>> {
        let sql = format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE table_id = ?1 AND status IN ('CONFIRMED', 'PENDING')
            ORDER BY reservation_date, reservation_time
            "#
        );
        let reservations = sqlx::query_as::<_, Reservation>(&sql)
            .bind(table_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(reservations)
    }

    /// Every reservation on a table for one day, by time.
    pub async fn list_for_table_on(
        &mut self,
        table_id: &str,
        date: NaiveDate,
    ) -> DbResult<Vec<Reservation>> {
        let sql = format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE table_id = ?1 AND reservation_date = ?2
            ORDER BY reservation_time
            "#
        );
        let reservations = sqlx::query_as::<_, Reservation>(&sql)
            .bind(table_id)
            .bind(date)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(reservations)
    }

    /// Sets a reservation's status.
    pub async fn set_status(
        &mut self,
        id: &str,
        status: ReservationStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(reservation_id = %id, status = %status, "Updating reservation status");

        let result = sqlx::query(
            "UPDATE reservations SET status = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Reservation", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
