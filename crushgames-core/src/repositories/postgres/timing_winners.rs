// src/repositories/postgres/timing_winners.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;
use crate::models::TimingWinner;

#[async_trait]
pub trait TimingWinnerRepository: Send + Sync {
    /// Record a fresh Perfect Timing win.
    async fn create(&self, measured_ms: i64, delta_ms: i64) -> Result<TimingWinner, Error>;

    /// Most recent winner record still waiting for a claim.
    async fn latest_unclaimed(&self) -> Result<Option<TimingWinner>, Error>;

    /// Conditionally flip `claimed`; 0 rows affected means it was already
    /// claimed.
    async fn mark_claimed(
        &self,
        winner_id: Uuid,
        contact: Option<String>,
        claimed_at: DateTime<Utc>,
    ) -> Result<u64, Error>;

    async fn mark_delivered(&self, winner_id: Uuid) -> Result<u64, Error>;

    async fn list_claimed_undelivered(&self) -> Result<Vec<TimingWinner>, Error>;
}

#[derive(Clone)]
pub struct PostgresTimingWinnerRepository {
    pool: Pool<Postgres>,
}

impl PostgresTimingWinnerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_winner(r: &sqlx::postgres::PgRow) -> Result<TimingWinner, Error> {
    Ok(TimingWinner {
        winner_id: r.try_get("winner_id")?,
        measured_ms: r.try_get("measured_ms")?,
        delta_ms: r.try_get("delta_ms")?,
        claimed: r.try_get("claimed")?,
        delivered: r.try_get("delivered")?,
        contact: r.try_get("contact")?,
        claimed_at: r.try_get("claimed_at")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl TimingWinnerRepository for PostgresTimingWinnerRepository {
    async fn create(&self, measured_ms: i64, delta_ms: i64) -> Result<TimingWinner, Error> {
        let winner = TimingWinner {
            winner_id: Uuid::new_v4(),
            measured_ms,
            delta_ms,
            claimed: false,
            delivered: false,
            contact: None,
            claimed_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO timing_winners (
                winner_id, measured_ms, delta_ms,
                claimed, delivered, contact, claimed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(winner.winner_id)
            .bind(winner.measured_ms)
            .bind(winner.delta_ms)
            .bind(winner.claimed)
            .bind(winner.delivered)
            .bind(&winner.contact)
            .bind(winner.claimed_at)
            .bind(winner.created_at)
            .execute(&self.pool)
            .await?;

        Ok(winner)
    }

    async fn latest_unclaimed(&self) -> Result<Option<TimingWinner>, Error> {
        let row = sqlx::query(
            r#"
            SELECT winner_id, measured_ms, delta_ms,
                   claimed, delivered, contact, claimed_at, created_at
            FROM timing_winners
            WHERE claimed = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_winner).transpose()
    }

    async fn mark_claimed(
        &self,
        winner_id: Uuid,
        contact: Option<String>,
        claimed_at: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE timing_winners
            SET claimed = TRUE,
                contact = $2,
                claimed_at = $3
            WHERE winner_id = $1
              AND claimed = FALSE
            "#,
        )
            .bind(winner_id)
            .bind(contact)
            .bind(claimed_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn mark_delivered(&self, winner_id: Uuid) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE timing_winners
            SET delivered = TRUE
            WHERE winner_id = $1
              AND claimed = TRUE
            "#,
        )
            .bind(winner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_claimed_undelivered(&self) -> Result<Vec<TimingWinner>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT winner_id, measured_ms, delta_ms,
                   claimed, delivered, contact, claimed_at, created_at
            FROM timing_winners
            WHERE claimed = TRUE
              AND delivered = FALSE
            ORDER BY created_at DESC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(row_to_winner(r)?);
        }
        Ok(out)
    }
}
