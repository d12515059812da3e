// src/draw.rs
//
// Draw engine for the promotional games: uniform 3-digit sampling, the
// forced-win policy, and the two win predicates.

use rand::Rng;

pub const TARGET_MIN: i32 = 100;
pub const TARGET_MAX: i32 = 999;

/// Uniformly sampled candidate value in [100, 999]. Also used to pick the
/// target of a fresh round. Non-cryptographic randomness is fine here.
pub fn draw_attempt<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.random_range(TARGET_MIN..=TARGET_MAX)
}

/// How (and whether) wins are forced for marketing purposes. The counter
/// behind `EveryN` is server-side state and never leaves the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedWinPolicy {
    /// Never force.
    Disabled,
    /// Every attempt wins (explicit test flag).
    Always,
    /// Every Nth attempt, by persistent counter, wins.
    EveryN(u32),
}

impl ForcedWinPolicy {
    /// FORCE_WIN takes precedence over FTW_EVERY when both are configured.
    /// An FTW_EVERY of zero means disabled.
    pub fn from_settings(force_win: bool, ftw_every: Option<u32>) -> Self {
        if force_win {
            ForcedWinPolicy::Always
        } else {
            match ftw_every {
                Some(n) if n > 0 => ForcedWinPolicy::EveryN(n),
                _ => ForcedWinPolicy::Disabled,
            }
        }
    }

    /// Whether this policy consumes the persistent attempt counter.
    pub fn uses_counter(&self) -> bool {
        matches!(self, ForcedWinPolicy::EveryN(_))
    }
}

/// Tag recorded in the history log when an attempt was forced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedWin {
    pub reason: String,
}

/// Decide whether the attempt whose freshly bumped counter value is
/// `counter` must be forced under `EveryN`. The counter is a positive
/// multiple of N on the Nth, 2Nth, ... attempt.
pub fn every_n_hit(n: u32, counter: i64) -> Option<ForcedWin> {
    if n > 0 && counter > 0 && counter % n as i64 == 0 {
        Some(ForcedWin { reason: format!("FTW_EVERY_{}", n) })
    } else {
        None
    }
}

pub fn always_forced() -> ForcedWin {
    ForcedWin { reason: "FORCE_WIN".to_string() }
}

/// Número Ganador predicate: exact equality, no tolerance.
pub fn is_win(attempt: i32, target: i32) -> bool {
    attempt == target
}

/// Perfect Timing predicate: within tolerance of the target duration,
/// boundary inclusive.
pub fn is_timing_win(measured_ms: i64, target_ms: i64, tolerance_ms: i64) -> bool {
    (measured_ms - target_ms).abs() <= tolerance_ms
}
