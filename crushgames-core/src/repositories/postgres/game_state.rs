// src/repositories/postgres/game_state.rs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::GameKind;

/// Lock manager over the singleton `game_state` row of each game variant.
///
/// The cooldown lock is the only piece of shared state that needs atomic
/// access: `try_lock` is a conditional UPDATE whose rows-affected count
/// tells concurrent winners apart (exactly one gets 1).
#[async_trait]
pub trait GameStateRepository: Send + Sync {
    /// Idempotently create the singleton row for a game.
    async fn ensure_row(&self, game: GameKind) -> Result<(), Error>;

    /// Current cooldown expiry, if any was ever set.
    async fn get_lock(&self, game: GameKind) -> Result<Option<DateTime<Utc>>, Error>;

    /// Set `locked_until = now + minutes` only if no lock is currently
    /// active. A lock equal to "now" counts as expired (strict comparison).
    /// Returns rows affected: 1 if this call applied the lock, 0 if a lock
    /// was already in effect.
    async fn try_lock(&self, game: GameKind, minutes: i64) -> Result<u64, Error>;

    /// Administrative override, dev tooling only.
    async fn clear_lock(&self, game: GameKind) -> Result<(), Error>;

    /// Atomically increment the forced-win counter and return the new value.
    async fn bump_forced_counter(&self, game: GameKind) -> Result<i64, Error>;

    /// Reset the forced-win counter to zero, dev tooling only.
    async fn reset_forced_counter(&self, game: GameKind) -> Result<(), Error>;
}

#[derive(Clone)]
pub struct PostgresGameStateRepository {
    pool: Pool<Postgres>,
}

impl PostgresGameStateRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameStateRepository for PostgresGameStateRepository {
    async fn ensure_row(&self, game: GameKind) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO game_state (game, locked_until, forced_win_counter)
            VALUES ($1, NULL, 0)
            ON CONFLICT (game) DO NOTHING
            "#,
        )
            .bind(game.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_lock(&self, game: GameKind) -> Result<Option<DateTime<Utc>>, Error> {
        let row = sqlx::query(
            r#"
            SELECT locked_until
            FROM game_state
            WHERE game = $1
            "#,
        )
            .bind(game.to_string())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            Ok(r.try_get("locked_until")?)
        } else {
            Ok(None)
        }
    }

    async fn try_lock(&self, game: GameKind, minutes: i64) -> Result<u64, Error> {
        let now = Utc::now();
        let until = now + Duration::minutes(minutes);

        // Conditional update: only the first winner inside an unlock window
        // gets rows_affected = 1. `locked_until <= now` means an expired
        // lock does not block a new one.
        let result = sqlx::query(
            r#"
            UPDATE game_state
            SET locked_until = $2
            WHERE game = $1
              AND (locked_until IS NULL OR locked_until <= $3)
            "#,
        )
            .bind(game.to_string())
            .bind(until)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear_lock(&self, game: GameKind) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE game_state
            SET locked_until = NULL
            WHERE game = $1
            "#,
        )
            .bind(game.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn bump_forced_counter(&self, game: GameKind) -> Result<i64, Error> {
        let row = sqlx::query(
            r#"
            UPDATE game_state
            SET forced_win_counter = forced_win_counter + 1
            WHERE game = $1
            RETURNING forced_win_counter
            "#,
        )
            .bind(game.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("forced_win_counter")?)
    }

    async fn reset_forced_counter(&self, game: GameKind) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE game_state
            SET forced_win_counter = 0
            WHERE game = $1
            "#,
        )
            .bind(game.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
