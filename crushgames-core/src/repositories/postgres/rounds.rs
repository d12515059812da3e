// src/repositories/postgres/rounds.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;
use crate::models::Round;

#[async_trait]
pub trait RoundRepository: Send + Sync {
    /// Insert a fresh round with the given target and return it.
    async fn create(&self, target_value: i32) -> Result<Round, Error>;

    /// Most recent round, claimed or not.
    async fn latest(&self) -> Result<Option<Round>, Error>;

    /// Most recent round still waiting for a claim.
    async fn latest_unclaimed(&self) -> Result<Option<Round>, Error>;

    /// Conditionally flip `claimed` on the given round. Returns the number
    /// of rows affected: 0 means somebody else claimed it first.
    async fn mark_claimed(
        &self,
        round_id: Uuid,
        contact: Option<String>,
        claimed_at: DateTime<Utc>,
    ) -> Result<u64, Error>;

    /// Mark every claimed round with this number as delivered.
    async fn mark_delivered_by_number(&self, number: i32) -> Result<u64, Error>;

    /// Claimed rounds whose prize has not been handed over yet.
    async fn list_claimed_undelivered(&self) -> Result<Vec<Round>, Error>;

    /// A claimed round matching the 3-digit number, if any.
    async fn find_claimed_by_number(&self, number: i32) -> Result<Option<Round>, Error>;
}

#[derive(Clone)]
pub struct PostgresRoundRepository {
    pool: Pool<Postgres>,
}

impl PostgresRoundRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_round(r: &sqlx::postgres::PgRow) -> Result<Round, Error> {
    Ok(Round {
        round_id: r.try_get("round_id")?,
        target_value: r.try_get("target_value")?,
        claimed: r.try_get("claimed")?,
        delivered: r.try_get("delivered")?,
        contact: r.try_get("contact")?,
        claimed_at: r.try_get("claimed_at")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl RoundRepository for PostgresRoundRepository {
    async fn create(&self, target_value: i32) -> Result<Round, Error> {
        let round = Round {
            round_id: Uuid::new_v4(),
            target_value,
            claimed: false,
            delivered: false,
            contact: None,
            claimed_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO rounds (
                round_id, target_value, claimed, delivered,
                contact, claimed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
            .bind(round.round_id)
            .bind(round.target_value)
            .bind(round.claimed)
            .bind(round.delivered)
            .bind(&round.contact)
            .bind(round.claimed_at)
            .bind(round.created_at)
            .execute(&self.pool)
            .await?;

        Ok(round)
    }

    async fn latest(&self) -> Result<Option<Round>, Error> {
        let row = sqlx::query(
            r#"
            SELECT round_id, target_value, claimed, delivered,
                   contact, claimed_at, created_at
            FROM rounds
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_round).transpose()
    }

    async fn latest_unclaimed(&self) -> Result<Option<Round>, Error> {
        let row = sqlx::query(
            r#"
            SELECT round_id, target_value, claimed, delivered,
                   contact, claimed_at, created_at
            FROM rounds
            WHERE claimed = FALSE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_round).transpose()
    }

    async fn mark_claimed(
        &self,
        round_id: Uuid,
        contact: Option<String>,
        claimed_at: DateTime<Utc>,
    ) -> Result<u64, Error> {
        // The `claimed = FALSE` guard makes the claim single-shot even if
        // two requests race on the same round.
        let result = sqlx::query(
            r#"
            UPDATE rounds
            SET claimed = TRUE,
                contact = $2,
                claimed_at = $3
            WHERE round_id = $1
              AND claimed = FALSE
            "#,
        )
            .bind(round_id)
            .bind(contact)
            .bind(claimed_at)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn mark_delivered_by_number(&self, number: i32) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE rounds
            SET delivered = TRUE
            WHERE target_value = $1
              AND claimed = TRUE
            "#,
        )
            .bind(number)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_claimed_undelivered(&self) -> Result<Vec<Round>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT round_id, target_value, claimed, delivered,
                   contact, claimed_at, created_at
            FROM rounds
            WHERE claimed = TRUE
              AND delivered = FALSE
            ORDER BY created_at DESC
            "#,
        )
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(row_to_round(r)?);
        }
        Ok(out)
    }

    async fn find_claimed_by_number(&self, number: i32) -> Result<Option<Round>, Error> {
        let row = sqlx::query(
            r#"
            SELECT round_id, target_value, claimed, delivered,
                   contact, claimed_at, created_at
            FROM rounds
            WHERE target_value = $1
              AND claimed = TRUE
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_round).transpose()
    }
}
