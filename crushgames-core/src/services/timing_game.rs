// src/services/timing_game.rs
//
// Perfect Timing variant: the player submits a measured reaction time and
// wins when it lands within tolerance of the target duration. Wins are
// independent winner records rather than a shared round, but the cooldown
// lock and the claim/coupon flow mirror the Número Ganador game.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::GameConfig;
use crate::draw::{self, ForcedWinPolicy};
use crate::models::{EventOutcome, GameKind, HistoryEvent, HistoryEventKind, TimingWinner};
use crate::notifier::{spawn_notify, AdminNotifier};
use crate::repositories::{GameStateRepository, HistoryRepository, TimingWinnerRepository};
use crate::sales::SalesApi;
use crate::services::{issue_coupon_best_effort, record_event, CouponResult};
use crate::Error;

const GAME: GameKind = GameKind::PerfectTiming;

#[derive(Debug, Clone)]
pub struct TimingStatus {
    pub target_ms: i64,
    pub tolerance_ms: i64,
    pub locked_until: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TimingAttemptOutcome {
    pub measured_ms: i64,
    pub delta_ms: i64,
    pub is_winner: bool,
    pub winner_id: Option<Uuid>,
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct TimingClaimOutcome {
    pub winner_id: Uuid,
    pub coupon: CouponResult,
}

pub struct TimingGameService {
    winners: Arc<dyn TimingWinnerRepository>,
    state: Arc<dyn GameStateRepository>,
    history: Arc<dyn HistoryRepository>,
    sales: Option<Arc<dyn SalesApi>>,
    notifier: Arc<dyn AdminNotifier>,
    config: GameConfig,
}

impl TimingGameService {
    pub fn new(
        winners: Arc<dyn TimingWinnerRepository>,
        state: Arc<dyn GameStateRepository>,
        history: Arc<dyn HistoryRepository>,
        sales: Option<Arc<dyn SalesApi>>,
        notifier: Arc<dyn AdminNotifier>,
        config: GameConfig,
    ) -> Self {
        Self { winners, state, history, sales, notifier, config }
    }

    pub async fn status(&self) -> Result<TimingStatus, Error> {
        let locked_until = self.active_lock(Utc::now()).await?;
        Ok(TimingStatus {
            target_ms: self.config.pt_target_ms,
            tolerance_ms: self.config.pt_tolerance_ms,
            locked_until,
            now: Utc::now(),
        })
    }

    /// Judge one submitted measurement. A win creates its own winner record
    /// and applies the cooldown lock scoped to this game variant.
    pub async fn submit(
        &self,
        measured_ms: i64,
        source_ip: Option<String>,
    ) -> Result<TimingAttemptOutcome, Error> {
        if measured_ms < 0 {
            return Err(Error::InvalidInput("elapsedMs must be non-negative".to_string()));
        }

        let now = Utc::now();
        if let Some(until) = self.active_lock(now).await? {
            return Err(Error::Locked { until });
        }

        let delta_ms = (measured_ms - self.config.pt_target_ms).abs();
        // The every-N cadence has no meaning for a continuous measurement;
        // only the explicit always-force flag applies here.
        let forced = matches!(self.config.forced_win_policy(), ForcedWinPolicy::Always);
        let is_winner = forced
            || draw::is_timing_win(measured_ms, self.config.pt_target_ms, self.config.pt_tolerance_ms);

        let attempt_event = HistoryEvent::new(GAME, HistoryEventKind::Attempt)
            .outcome(if is_winner { EventOutcome::Win } else { EventOutcome::Lose })
            .source_ip(source_ip.clone())
            .extra(json!({
                "measuredMs": measured_ms,
                "deltaMs": delta_ms,
                "targetMs": self.config.pt_target_ms,
                "forcedReason": forced.then(|| draw::always_forced().reason),
            }));
        record_event(&self.history, attempt_event).await;

        let mut winner_id = None;
        let mut locked_until = None;
        if is_winner {
            let winner = self.winners.create(measured_ms, delta_ms).await?;
            winner_id = Some(winner.winner_id);

            let applied = self.state.try_lock(GAME, self.config.lock_minutes).await?;
            locked_until = self.state.get_lock(GAME).await?;

            record_event(
                &self.history,
                HistoryEvent::new(GAME, HistoryEventKind::Win)
                    .outcome(EventOutcome::Win)
                    .source_ip(source_ip)
                    .extra(json!({
                        "winnerId": winner.winner_id,
                        "measuredMs": measured_ms,
                        "deltaMs": delta_ms,
                        "applied": applied,
                        "lockedUntil": locked_until,
                    })),
            )
            .await;

            if applied == 1 {
                spawn_notify(
                    self.notifier.clone(),
                    "Perfect Timing: win".to_string(),
                    format!(
                        "Stopped at {} ms (off by {} ms), locked until {:?}",
                        measured_ms, delta_ms, locked_until
                    ),
                );
            }
        }

        Ok(TimingAttemptOutcome { measured_ms, delta_ms, is_winner, winner_id, locked_until })
    }

    /// Claim the most recent unclaimed win; keyed by winner record, so the
    /// idempotency key is `claim-<winner_id>`.
    pub async fn claim(
        &self,
        contact: Option<String>,
        source_ip: Option<String>,
    ) -> Result<TimingClaimOutcome, Error> {
        let winner = self.winners.latest_unclaimed().await?.ok_or(Error::NoActiveRound)?;

        let affected = self
            .winners
            .mark_claimed(winner.winner_id, contact.clone(), Utc::now())
            .await?;
        if affected == 0 {
            return Err(Error::NoActiveRound);
        }

        record_event(
            &self.history,
            HistoryEvent::new(GAME, HistoryEventKind::DirectClaim)
                .outcome(EventOutcome::Ok)
                .source_ip(source_ip.clone())
                .extra(json!({
                    "winnerId": winner.winner_id,
                    "measuredMs": winner.measured_ms,
                })),
        )
        .await;

        let idempotency_key = format!("claim-{}", winner.winner_id);
        let coupon = issue_coupon_best_effort(
            self.sales.as_ref(),
            &self.history,
            GAME,
            self.config.game_timing_id,
            self.config.sales.as_ref().map(|s| s.hours_to_expiry).unwrap_or(24),
            &idempotency_key,
            contact.as_deref(),
            source_ip.as_deref(),
        )
        .await;

        spawn_notify(
            self.notifier.clone(),
            "Perfect Timing: claim".to_string(),
            format!(
                "Winner {} claimed (contact: {}), coupon: {}",
                winner.winner_id,
                contact.as_deref().unwrap_or("-"),
                coupon
                    .coupon
                    .as_ref()
                    .map(|c| c.code.as_str())
                    .unwrap_or("not issued"),
            ),
        );

        Ok(TimingClaimOutcome { winner_id: winner.winner_id, coupon })
    }

    /// Admin: hand-over bookkeeping for timing prizes.
    pub async fn mark_delivered(&self, winner_id: Uuid) -> Result<u64, Error> {
        self.winners.mark_delivered(winner_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<TimingWinner>, Error> {
        self.winners.list_claimed_undelivered().await
    }

    pub async fn dev_unlock(&self) -> Result<(), Error> {
        self.state.clear_lock(GAME).await
    }

    async fn active_lock(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.state.get_lock(GAME).await?.filter(|until| *until > now))
    }
}
