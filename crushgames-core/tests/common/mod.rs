#![allow(dead_code)]
// File: crushgames-core/tests/common/mod.rs
//
// Shared mocks and fixtures for the service-level tests. Repositories are
// mocked with mockall; the sales client uses a hand-rolled stub so tests
// can inspect the idempotency keys it was handed.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mockall::mock;
use uuid::Uuid;

use crushgames_core::config::GameConfig;
use crushgames_core::models::{
    GameKind, HistoryEvent, IssuedCoupon, Round, TimingWinner,
};
use crushgames_core::notifier::TracingNotifier;
use crushgames_core::repositories::{
    GameStateRepository, HistoryRepository, RoundRepository, TimingWinnerRepository,
};
use crushgames_core::sales::{CouponIssueRequest, SalesApi};
use crushgames_core::services::{NumberGameService, TimingGameService};
use crushgames_core::Error;

mock! {
    pub Rounds {}

    #[async_trait::async_trait]
    impl RoundRepository for Rounds {
        async fn create(&self, target_value: i32) -> Result<Round, Error>;
        async fn latest(&self) -> Result<Option<Round>, Error>;
        async fn latest_unclaimed(&self) -> Result<Option<Round>, Error>;
        async fn mark_claimed(
            &self,
            round_id: Uuid,
            contact: Option<String>,
            claimed_at: DateTime<Utc>,
        ) -> Result<u64, Error>;
        async fn mark_delivered_by_number(&self, number: i32) -> Result<u64, Error>;
        async fn list_claimed_undelivered(&self) -> Result<Vec<Round>, Error>;
        async fn find_claimed_by_number(&self, number: i32) -> Result<Option<Round>, Error>;
    }
}

mock! {
    pub State {}

    #[async_trait::async_trait]
    impl GameStateRepository for State {
        async fn ensure_row(&self, game: GameKind) -> Result<(), Error>;
        async fn get_lock(&self, game: GameKind) -> Result<Option<DateTime<Utc>>, Error>;
        async fn try_lock(&self, game: GameKind, minutes: i64) -> Result<u64, Error>;
        async fn clear_lock(&self, game: GameKind) -> Result<(), Error>;
        async fn bump_forced_counter(&self, game: GameKind) -> Result<i64, Error>;
        async fn reset_forced_counter(&self, game: GameKind) -> Result<(), Error>;
    }
}

mock! {
    pub History {}

    #[async_trait::async_trait]
    impl HistoryRepository for History {
        async fn insert(&self, event: &HistoryEvent) -> Result<(), Error>;
        async fn recent(&self, game: GameKind, limit: i64) -> Result<Vec<HistoryEvent>, Error>;
    }
}

mock! {
    pub Winners {}

    #[async_trait::async_trait]
    impl TimingWinnerRepository for Winners {
        async fn create(&self, measured_ms: i64, delta_ms: i64) -> Result<TimingWinner, Error>;
        async fn latest_unclaimed(&self) -> Result<Option<TimingWinner>, Error>;
        async fn mark_claimed(
            &self,
            winner_id: Uuid,
            contact: Option<String>,
            claimed_at: DateTime<Utc>,
        ) -> Result<u64, Error>;
        async fn mark_delivered(&self, winner_id: Uuid) -> Result<u64, Error>;
        async fn list_claimed_undelivered(&self) -> Result<Vec<TimingWinner>, Error>;
    }
}

pub enum SalesMode {
    Succeed(IssuedCoupon),
    Fail(String),
}

/// Sales stub that records every idempotency key it receives.
pub struct StubSales {
    pub mode: SalesMode,
    pub keys: Mutex<Vec<String>>,
}

impl StubSales {
    pub fn succeeding(code: &str) -> Self {
        Self {
            mode: SalesMode::Succeed(IssuedCoupon {
                code: code.to_string(),
                name: None,
                expires_at: None,
            }),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            mode: SalesMode::Fail(message.to_string()),
            keys: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SalesApi for StubSales {
    async fn issue_coupon(
        &self,
        idempotency_key: &str,
        _request: &CouponIssueRequest,
    ) -> Result<IssuedCoupon, Error> {
        self.keys.lock().unwrap().push(idempotency_key.to_string());
        match &self.mode {
            SalesMode::Succeed(coupon) => Ok(coupon.clone()),
            SalesMode::Fail(message) => Err(Error::CouponService(message.clone())),
        }
    }
}

pub fn round_with_target(target: i32) -> Round {
    Round {
        round_id: Uuid::new_v4(),
        target_value: target,
        claimed: false,
        delivered: false,
        contact: None,
        claimed_at: None,
        created_at: Utc::now(),
    }
}

pub fn winner_record(measured_ms: i64, delta_ms: i64) -> TimingWinner {
    TimingWinner {
        winner_id: Uuid::new_v4(),
        measured_ms,
        delta_ms,
        claimed: false,
        delivered: false,
        contact: None,
        claimed_at: None,
        created_at: Utc::now(),
    }
}

/// History mock that accepts anything.
pub fn history_ok() -> MockHistory {
    let mut history = MockHistory::new();
    history.expect_insert().returning(|_| Ok(()));
    history
}

pub fn number_service(
    rounds: MockRounds,
    state: MockState,
    history: MockHistory,
    sales: Option<Arc<dyn SalesApi>>,
    config: GameConfig,
) -> NumberGameService {
    NumberGameService::new(
        Arc::new(rounds),
        Arc::new(state),
        Arc::new(history),
        sales,
        Arc::new(TracingNotifier),
        config,
    )
}

pub fn timing_service(
    winners: MockWinners,
    state: MockState,
    history: MockHistory,
    sales: Option<Arc<dyn SalesApi>>,
    config: GameConfig,
) -> TimingGameService {
    TimingGameService::new(
        Arc::new(winners),
        Arc::new(state),
        Arc::new(history),
        sales,
        Arc::new(TracingNotifier),
        config,
    )
}
