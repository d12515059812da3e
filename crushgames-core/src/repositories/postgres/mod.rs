// src/repositories/postgres/mod.rs

pub mod rounds;
pub mod game_state;
pub mod history;
pub mod timing_winners;

pub use rounds::PostgresRoundRepository;
pub use game_state::PostgresGameStateRepository;
pub use history::PostgresHistoryRepository;
pub use timing_winners::PostgresTimingWinnerRepository;
