// src/services/mod.rs

pub mod number_game;
pub mod timing_game;

pub use number_game::NumberGameService;
pub use timing_game::TimingGameService;

use std::sync::Arc;
use serde_json::json;
use tracing::warn;

use crate::models::{EventOutcome, GameKind, HistoryEvent, HistoryEventKind, IssuedCoupon};
use crate::repositories::HistoryRepository;
use crate::sales::{CouponIssueRequest, SalesApi};

/// Append a history event, swallowing failures. The audit log is
/// best-effort: a broken insert must never abort the attempt or claim that
/// produced it.
pub(crate) async fn record_event(history: &Arc<dyn HistoryRepository>, event: HistoryEvent) {
    let kind = event.kind;
    if let Err(e) = history.insert(&event).await {
        warn!("History insert failed for '{}' event: {:?}", kind, e);
    }
}

/// What a claim learned from the sales service.
#[derive(Debug, Clone, Default)]
pub struct CouponResult {
    pub issued: bool,
    pub coupon: Option<IssuedCoupon>,
    pub error: Option<String>,
}

/// Issue a coupon for a claim, degrading gracefully: any failure is
/// captured in the result (and the audit log) instead of propagating, so
/// the claim itself still succeeds. With no sales client configured this is
/// a no-op.
pub(crate) async fn issue_coupon_best_effort(
    sales: Option<&Arc<dyn SalesApi>>,
    history: &Arc<dyn HistoryRepository>,
    game: GameKind,
    game_number: u32,
    hours: i64,
    idempotency_key: &str,
    contact: Option<&str>,
    source_ip: Option<&str>,
) -> CouponResult {
    let Some(api) = sales else {
        return CouponResult::default();
    };

    let request = CouponIssueRequest {
        hours,
        contact: contact.map(String::from),
        game_number,
        channel: "game".to_string(),
    };

    match api.issue_coupon(idempotency_key, &request).await {
        Ok(coupon) => {
            record_event(
                history,
                HistoryEvent::new(game, HistoryEventKind::CouponIssue)
                    .outcome(EventOutcome::Ok)
                    .source_ip(source_ip.map(String::from))
                    .extra(json!({
                        "idempotencyKey": idempotency_key,
                        "code": coupon.code.clone(),
                        "expiresAt": coupon.expires_at,
                    })),
            )
            .await;

            CouponResult { issued: true, coupon: Some(coupon), error: None }
        }
        Err(e) => {
            let message = e.to_string();
            warn!("Coupon issuance failed (key={}): {}", idempotency_key, message);
            record_event(
                history,
                HistoryEvent::new(game, HistoryEventKind::CouponIssue)
                    .outcome(EventOutcome::Fail)
                    .source_ip(source_ip.map(String::from))
                    .extra(json!({
                        "idempotencyKey": idempotency_key,
                        "error": message.clone(),
                    })),
            )
            .await;

            CouponResult { issued: false, coupon: None, error: Some(message) }
        }
    }
}
