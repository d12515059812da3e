// src/repositories/mod.rs

pub mod postgres;

pub use postgres::rounds::{RoundRepository, PostgresRoundRepository};
pub use postgres::game_state::{GameStateRepository, PostgresGameStateRepository};
pub use postgres::history::{HistoryRepository, PostgresHistoryRepository};
pub use postgres::timing_winners::{TimingWinnerRepository, PostgresTimingWinnerRepository};
