// File: crushgames-core/tests/repository_tests.rs
//
// Exercises the Postgres repositories against a real database. These tests
// skip themselves when TEST_DATABASE_URL is not set, so the default suite
// still runs without infrastructure.

use chrono::{Duration, Utc};

use crushgames_core::models::{
    EventOutcome, GameKind, HistoryEvent, HistoryEventKind,
};
use crushgames_core::repositories::{
    GameStateRepository, HistoryRepository, PostgresGameStateRepository,
    PostgresHistoryRepository, PostgresRoundRepository, PostgresTimingWinnerRepository,
    RoundRepository, TimingWinnerRepository,
};
use crushgames_core::test_utils::helpers::{setup_test_database, test_database_url};
use crushgames_core::{Database, Error};

// Each test truncates the shared test database, so they take turns.
static DB_GUARD: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

async fn test_db() -> Result<Option<Database>, Error> {
    if test_database_url().is_none() {
        eprintln!("TEST_DATABASE_URL not set; skipping DB test.");
        return Ok(None);
    }
    Ok(Some(setup_test_database().await?))
}

#[tokio::test]
async fn round_lifecycle() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresRoundRepository::new(db.pool().clone());

    let round = repo.create(437).await?;
    assert_eq!(round.target_value, 437);
    assert!(!round.claimed);

    let latest = repo.latest().await?.expect("round should exist");
    assert_eq!(latest.round_id, round.round_id);
    assert_eq!(
        repo.latest_unclaimed().await?.unwrap().round_id,
        round.round_id
    );

    // First claim wins, second loses the race.
    let now = Utc::now();
    assert_eq!(
        repo.mark_claimed(round.round_id, Some("600111222".to_string()), now).await?,
        1
    );
    assert_eq!(
        repo.mark_claimed(round.round_id, Some("600999999".to_string()), now).await?,
        0
    );

    let claimed = repo.find_claimed_by_number(437).await?.expect("claimed round");
    assert_eq!(claimed.contact.as_deref(), Some("600111222"));
    assert!(claimed.claimed_at.is_some());

    let pending = repo.list_claimed_undelivered().await?;
    assert_eq!(pending.len(), 1);

    assert_eq!(repo.mark_delivered_by_number(437).await?, 1);
    assert!(repo.list_claimed_undelivered().await?.is_empty());

    // Claimed rounds drop out of the unclaimed view.
    assert!(repo.latest_unclaimed().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn lock_applies_exactly_once_under_concurrency() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresGameStateRepository::new(db.pool().clone());
    repo.ensure_row(GameKind::NumeroGanador).await?;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            repo.try_lock(GameKind::NumeroGanador, 10).await
        }));
    }

    let mut applied_total = 0;
    for handle in handles {
        applied_total += handle.await.expect("task panicked")?;
    }
    assert_eq!(applied_total, 1, "exactly one concurrent winner applies the lock");

    let until = repo.get_lock(GameKind::NumeroGanador).await?.expect("lock set");
    assert!(until > Utc::now());

    Ok(())
}

#[tokio::test]
async fn expired_or_cleared_locks_can_be_retaken() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresGameStateRepository::new(db.pool().clone());
    repo.ensure_row(GameKind::PerfectTiming).await?;

    assert_eq!(repo.try_lock(GameKind::PerfectTiming, 10).await?, 1);
    assert_eq!(repo.try_lock(GameKind::PerfectTiming, 10).await?, 0);

    repo.clear_lock(GameKind::PerfectTiming).await?;
    assert!(repo.get_lock(GameKind::PerfectTiming).await?.is_none());
    assert_eq!(repo.try_lock(GameKind::PerfectTiming, 10).await?, 1);

    // Backdate the lock: an expired timestamp no longer blocks.
    sqlx::query("UPDATE game_state SET locked_until = $2 WHERE game = $1")
        .bind(GameKind::PerfectTiming.to_string())
        .bind(Utc::now() - Duration::minutes(1))
        .execute(db.pool())
        .await?;
    assert_eq!(repo.try_lock(GameKind::PerfectTiming, 10).await?, 1);

    Ok(())
}

#[tokio::test]
async fn forced_counter_counts_and_resets() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresGameStateRepository::new(db.pool().clone());
    repo.ensure_row(GameKind::NumeroGanador).await?;

    assert_eq!(repo.bump_forced_counter(GameKind::NumeroGanador).await?, 1);
    assert_eq!(repo.bump_forced_counter(GameKind::NumeroGanador).await?, 2);
    assert_eq!(repo.bump_forced_counter(GameKind::NumeroGanador).await?, 3);

    repo.reset_forced_counter(GameKind::NumeroGanador).await?;
    assert_eq!(repo.bump_forced_counter(GameKind::NumeroGanador).await?, 1);

    Ok(())
}

#[tokio::test]
async fn history_is_append_only_and_ordered() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresHistoryRepository::new(db.pool().clone());

    for (value, outcome) in [(812, EventOutcome::Lose), (437, EventOutcome::Win)] {
        repo.insert(
            &HistoryEvent::new(GameKind::NumeroGanador, HistoryEventKind::Attempt)
                .attempt_value(value)
                .target_value(437)
                .outcome(outcome)
                .source_ip(Some("10.0.0.1".to_string())),
        )
        .await?;
    }
    repo.insert(
        &HistoryEvent::new(GameKind::NumeroGanador, HistoryEventKind::Win)
            .attempt_value(437)
            .target_value(437)
            .outcome(EventOutcome::Win)
            .extra(serde_json::json!({ "applied": 1 })),
    )
    .await?;

    let events = repo.recent(GameKind::NumeroGanador, 10).await?;
    assert_eq!(events.len(), 3);
    // Newest first.
    assert_eq!(events[0].kind, HistoryEventKind::Win);
    assert_eq!(events[0].extra.as_ref().unwrap()["applied"], 1);

    // Scoped per game.
    assert!(repo.recent(GameKind::PerfectTiming, 10).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn timing_winner_lifecycle() -> Result<(), Error> {
    let _guard = DB_GUARD.lock().await;
    let Some(db) = test_db().await? else { return Ok(()) };
    let repo = PostgresTimingWinnerRepository::new(db.pool().clone());

    let winner = repo.create(9960, 30).await?;
    assert_eq!(
        repo.latest_unclaimed().await?.unwrap().winner_id,
        winner.winner_id
    );

    let now = Utc::now();
    assert_eq!(
        repo.mark_claimed(winner.winner_id, Some("655000111".to_string()), now).await?,
        1
    );
    assert_eq!(repo.mark_claimed(winner.winner_id, None, now).await?, 0);

    let pending = repo.list_claimed_undelivered().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contact.as_deref(), Some("655000111"));

    assert_eq!(repo.mark_delivered(winner.winner_id).await?, 1);
    assert!(repo.list_claimed_undelivered().await?.is_empty());

    Ok(())
}
