// src/services/number_game.rs
//
// Round lifecycle orchestrator for the Número Ganador game: attempts run
// against the cooldown lock and the current round's target, claims flip the
// round, mint a coupon, and advance to a fresh round.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::config::GameConfig;
use crate::draw::{self, ForcedWin, ForcedWinPolicy};
use crate::models::{EventOutcome, GameKind, HistoryEvent, HistoryEventKind, Round};
use crate::notifier::{spawn_notify, AdminNotifier};
use crate::repositories::{GameStateRepository, HistoryRepository, RoundRepository};
use crate::sales::SalesApi;
use crate::services::{issue_coupon_best_effort, record_event, CouponResult};
use crate::Error;

const GAME: GameKind = GameKind::NumeroGanador;

#[derive(Debug, Clone)]
pub struct GameStatus {
    pub target_value: Option<i32>,
    pub locked_until: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub attempt: i32,
    pub target_value: i32,
    pub is_winner: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub next_target_value: i32,
    pub coupon: CouponResult,
}

pub struct NumberGameService {
    rounds: Arc<dyn RoundRepository>,
    state: Arc<dyn GameStateRepository>,
    history: Arc<dyn HistoryRepository>,
    sales: Option<Arc<dyn SalesApi>>,
    notifier: Arc<dyn AdminNotifier>,
    config: GameConfig,
}

impl NumberGameService {
    pub fn new(
        rounds: Arc<dyn RoundRepository>,
        state: Arc<dyn GameStateRepository>,
        history: Arc<dyn HistoryRepository>,
        sales: Option<Arc<dyn SalesApi>>,
        notifier: Arc<dyn AdminNotifier>,
        config: GameConfig,
    ) -> Self {
        Self { rounds, state, history, sales, notifier, config }
    }

    /// Current target plus lock status, for the frontend to decide whether
    /// the game is playable right now.
    pub async fn status(&self) -> Result<GameStatus, Error> {
        let target_value = self.rounds.latest().await?.map(|r| r.target_value);
        let locked_until = self.active_lock(Utc::now()).await?;
        Ok(GameStatus { target_value, locked_until, now: Utc::now() })
    }

    /// Admin operation: open a new round with a fresh random target.
    pub async fn generate_round(&self) -> Result<Round, Error> {
        let target = {
            let mut rng = rand::rng();
            draw::draw_attempt(&mut rng)
        };
        self.rounds.create(target).await
    }

    /// Play one attempt. Rejected while the cooldown lock is active; on a
    /// win the lock is applied atomically and the win is logged with the
    /// "applied" flag that tells concurrent winners apart.
    pub async fn attempt(&self, source_ip: Option<String>) -> Result<AttemptOutcome, Error> {
        let now = Utc::now();
        if let Some(until) = self.active_lock(now).await? {
            return Err(Error::Locked { until });
        }

        let round = self.rounds.latest().await?.ok_or(Error::NoActiveRound)?;

        let forced = self.resolve_forced_win().await?;
        let attempt = if forced.is_some() {
            round.target_value
        } else {
            let mut rng = rand::rng();
            draw::draw_attempt(&mut rng)
        };
        let is_winner = draw::is_win(attempt, round.target_value);

        let mut attempt_event = HistoryEvent::new(GAME, HistoryEventKind::Attempt)
            .attempt_value(attempt)
            .target_value(round.target_value)
            .outcome(if is_winner { EventOutcome::Win } else { EventOutcome::Lose })
            .source_ip(source_ip.clone());
        if let Some(f) = &forced {
            attempt_event = attempt_event.extra(json!({ "forcedReason": f.reason.clone() }));
        }
        record_event(&self.history, attempt_event).await;

        let mut locked_until = None;
        if is_winner {
            let applied = self.state.try_lock(GAME, self.config.lock_minutes).await?;
            locked_until = self.state.get_lock(GAME).await?;

            record_event(
                &self.history,
                HistoryEvent::new(GAME, HistoryEventKind::Win)
                    .attempt_value(attempt)
                    .target_value(round.target_value)
                    .outcome(EventOutcome::Win)
                    .source_ip(source_ip)
                    .extra(json!({
                        "applied": applied,
                        "forcedReason": forced.as_ref().map(|f| f.reason.clone()),
                        "lockedUntil": locked_until,
                    })),
            )
            .await;

            // Only the request that actually applied the lock notifies, so
            // concurrent duplicate wins don't spam the admin.
            if applied == 1 {
                spawn_notify(
                    self.notifier.clone(),
                    "Número Ganador: win".to_string(),
                    format!(
                        "Number {} hit the target, locked until {:?}",
                        attempt, locked_until
                    ),
                );
            }
        }

        Ok(AttemptOutcome {
            attempt,
            target_value: round.target_value,
            is_winner,
            locked_until,
        })
    }

    /// Claim the current win: flip the round before any external call so a
    /// failed coupon never leaves it re-claimable, then mint the coupon,
    /// notify, and open the next round.
    pub async fn claim(
        &self,
        contact: Option<String>,
        source_ip: Option<String>,
    ) -> Result<ClaimOutcome, Error> {
        let round = self.rounds.latest_unclaimed().await?.ok_or(Error::NoActiveRound)?;

        let affected = self
            .rounds
            .mark_claimed(round.round_id, contact.clone(), Utc::now())
            .await?;
        if affected == 0 {
            // Someone else claimed it between the lookup and the update.
            return Err(Error::NoActiveRound);
        }

        record_event(
            &self.history,
            HistoryEvent::new(GAME, HistoryEventKind::Claim)
                .target_value(round.target_value)
                .outcome(EventOutcome::Ok)
                .source_ip(source_ip.clone())
                .extra(json!({ "roundId": round.round_id })),
        )
        .await;

        let idempotency_key = format!("claim-{}", round.round_id);
        let coupon = issue_coupon_best_effort(
            self.sales.as_ref(),
            &self.history,
            GAME,
            self.config.game_number_id,
            self.config.sales.as_ref().map(|s| s.hours_to_expiry).unwrap_or(24),
            &idempotency_key,
            contact.as_deref(),
            source_ip.as_deref(),
        )
        .await;

        spawn_notify(
            self.notifier.clone(),
            "Número Ganador: claim".to_string(),
            format!(
                "Round {} claimed (contact: {}), coupon: {}",
                round.round_id,
                contact.as_deref().unwrap_or("-"),
                coupon
                    .coupon
                    .as_ref()
                    .map(|c| c.code.as_str())
                    .unwrap_or("not issued"),
            ),
        );

        let next = self.generate_round().await?;

        Ok(ClaimOutcome { next_target_value: next.target_value, coupon })
    }

    /// Admin: mark every claimed round with this number as delivered.
    /// Returns how many rows changed.
    pub async fn mark_delivered(&self, number: i32) -> Result<u64, Error> {
        self.rounds.mark_delivered_by_number(number).await
    }

    /// Admin: claimed rounds whose prize is still pending pickup.
    pub async fn list_pending(&self) -> Result<Vec<Round>, Error> {
        self.rounds.list_claimed_undelivered().await
    }

    /// Admin: look up a claimed number; absent or unclaimed is NotFound.
    pub async fn verify(&self, number: i32) -> Result<Round, Error> {
        self.rounds
            .find_claimed_by_number(number)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Número {} no encontrado o sin reclamar", number)))
    }

    /// Dev tooling: drop the cooldown lock.
    pub async fn dev_unlock(&self) -> Result<(), Error> {
        self.state.clear_lock(GAME).await
    }

    /// Dev tooling: restart the forced-win cadence.
    pub async fn dev_reset_counter(&self) -> Result<(), Error> {
        self.state.reset_forced_counter(GAME).await
    }

    /// A lock timestamp only counts while strictly in the future; at
    /// exactly `locked_until` the lock is expired.
    async fn active_lock(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.state.get_lock(GAME).await?.filter(|until| *until > now))
    }

    async fn resolve_forced_win(&self) -> Result<Option<ForcedWin>, Error> {
        match self.config.forced_win_policy() {
            ForcedWinPolicy::Disabled => Ok(None),
            ForcedWinPolicy::Always => Ok(Some(draw::always_forced())),
            ForcedWinPolicy::EveryN(n) => {
                let counter = self.state.bump_forced_counter(GAME).await?;
                Ok(draw::every_n_hit(n, counter))
            }
        }
    }
}
