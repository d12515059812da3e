// crushgames-server/src/context.rs

use std::sync::Arc;

use crushgames_core::config::GameConfig;
use crushgames_core::models::GameKind;
use crushgames_core::notifier::{AdminNotifier, TracingNotifier};
use crushgames_core::repositories::{
    GameStateRepository, PostgresGameStateRepository, PostgresHistoryRepository,
    PostgresRoundRepository, PostgresTimingWinnerRepository,
};
use crushgames_core::sales::{SalesApi, SalesClient};
use crushgames_core::services::{NumberGameService, TimingGameService};
use crushgames_core::{Database, Error};
use tracing::info;

/// Shared state for every route handler.
#[derive(Clone)]
pub struct ServerContext {
    pub number_game: Arc<NumberGameService>,
    pub timing_game: Arc<TimingGameService>,
    pub config: GameConfig,
}

impl ServerContext {
    /// Wire repositories, the optional sales client, and both game
    /// services on top of one connection pool.
    pub async fn build(db: &Database, config: GameConfig) -> Result<Self, Error> {
        let pool = db.pool().clone();

        let rounds = Arc::new(PostgresRoundRepository::new(pool.clone()));
        let state = Arc::new(PostgresGameStateRepository::new(pool.clone()));
        let history = Arc::new(PostgresHistoryRepository::new(pool.clone()));
        let winners = Arc::new(PostgresTimingWinnerRepository::new(pool));

        // Singleton lock rows must exist before any attempt comes in.
        state.ensure_row(GameKind::NumeroGanador).await?;
        state.ensure_row(GameKind::PerfectTiming).await?;

        let sales: Option<Arc<dyn SalesApi>> = match &config.sales {
            Some(cfg) => {
                info!("Sales service configured at {}", cfg.base_url);
                Some(Arc::new(SalesClient::new(cfg)?))
            }
            None => {
                info!("No sales service configured; coupons will not be issued.");
                None
            }
        };

        let notifier: Arc<dyn AdminNotifier> = Arc::new(TracingNotifier);

        let number_game = Arc::new(NumberGameService::new(
            rounds,
            state.clone(),
            history.clone(),
            sales.clone(),
            notifier.clone(),
            config.clone(),
        ));

        let timing_game = Arc::new(TimingGameService::new(
            winners,
            state,
            history,
            sales,
            notifier,
            config.clone(),
        ));

        Ok(Self { number_game, timing_game, config })
    }
}
