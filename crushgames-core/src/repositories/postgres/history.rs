// src/repositories/postgres/history.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{GameKind, HistoryEvent, HistoryEventKind};

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append one event. Rows are never updated afterwards; callers treat
    /// failures as non-fatal (see the services).
    async fn insert(&self, event: &HistoryEvent) -> Result<(), Error>;

    /// Newest events for a game, for admin inspection.
    async fn recent(&self, game: GameKind, limit: i64) -> Result<Vec<HistoryEvent>, Error>;
}

#[derive(Clone)]
pub struct PostgresHistoryRepository {
    pool: Pool<Postgres>,
}

impl PostgresHistoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for PostgresHistoryRepository {
    async fn insert(&self, event: &HistoryEvent) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO history_events (
                event_id, game, kind,
                attempt_value, outcome, target_value,
                source_ip, extra, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
            .bind(event.event_id)
            .bind(event.game.to_string())
            .bind(event.kind.to_string())
            .bind(event.attempt_value)
            .bind(event.outcome.map(|o| o.to_string()))
            .bind(event.target_value)
            .bind(&event.source_ip)
            .bind(&event.extra)
            .bind(event.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent(&self, game: GameKind, limit: i64) -> Result<Vec<HistoryEvent>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, game, kind,
                   attempt_value, outcome, target_value,
                   source_ip, extra, created_at
            FROM history_events
            WHERE game = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
            .bind(game.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::new();
        for r in rows {
            results.push(HistoryEvent {
                event_id: r.try_get("event_id")?,
                game: GameKind::from(r.try_get::<String, _>("game")?),
                kind: HistoryEventKind::from(r.try_get::<String, _>("kind")?),
                attempt_value: r.try_get("attempt_value")?,
                outcome: r
                    .try_get::<Option<String>, _>("outcome")?
                    .and_then(|s| s.parse().ok()),
                target_value: r.try_get("target_value")?,
                source_ip: r.try_get("source_ip")?,
                extra: r.try_get("extra")?,
                created_at: r.try_get("created_at")?,
            });
        }
        Ok(results)
    }
}
