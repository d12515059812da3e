// File: crushgames-core/src/models/mod.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One promotional cycle of the Número Ganador game: a 3-digit target that
/// stays active until a winning attempt is claimed.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct Round {
    pub round_id: Uuid,
    pub target_value: i32,
    pub claimed: bool,
    pub delivered: bool,
    pub contact: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Singleton cooldown/counter row, one per game variant.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct GameState {
    pub game: GameKind,
    pub locked_until: Option<DateTime<Utc>>,
    pub forced_win_counter: i64,
}

/// Independent per-player win entry for the Perfect Timing game. Unlike
/// `Round`, several of these can coexist unclaimed within one window.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct TimingWinner {
    pub winner_id: Uuid,
    pub measured_ms: i64,
    pub delta_ms: i64,
    pub claimed: bool,
    pub delivered: bool,
    pub contact: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit log entry. Rows are never updated after insert.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow)]
pub struct HistoryEvent {
    pub event_id: Uuid,
    pub game: GameKind,
    pub kind: HistoryEventKind,
    pub attempt_value: Option<i32>,
    pub outcome: Option<EventOutcome>,
    pub target_value: Option<i32>,
    pub source_ip: Option<String>,
    pub extra: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(game: GameKind, kind: HistoryEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            game,
            kind,
            attempt_value: None,
            outcome: None,
            target_value: None,
            source_ip: None,
            extra: None,
            created_at: Utc::now(),
        }
    }

    pub fn attempt_value(mut self, value: i32) -> Self {
        self.attempt_value = Some(value);
        self
    }

    pub fn outcome(mut self, outcome: EventOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn target_value(mut self, value: i32) -> Self {
        self.target_value = Some(value);
        self
    }

    pub fn source_ip(mut self, ip: Option<String>) -> Self {
        self.source_ip = ip;
        self
    }

    pub fn extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Stored as TEXT so SQLx can decode it directly.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "snake_case")]
pub enum GameKind {
    NumeroGanador,
    PerfectTiming,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::NumeroGanador => write!(f, "numero_ganador"),
            GameKind::PerfectTiming => write!(f, "perfect_timing"),
        }
    }
}

impl FromStr for GameKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numero_ganador" => Ok(GameKind::NumeroGanador),
            "perfect_timing" => Ok(GameKind::PerfectTiming),
            _ => Err(format!("Unknown game kind: {}", s)),
        }
    }
}

impl From<String> for GameKind {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(GameKind::NumeroGanador)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "snake_case")]
pub enum HistoryEventKind {
    Attempt,
    Win,
    Claim,
    CouponIssue,
    DirectClaim,
}

impl fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEventKind::Attempt => write!(f, "attempt"),
            HistoryEventKind::Win => write!(f, "win"),
            HistoryEventKind::Claim => write!(f, "claim"),
            HistoryEventKind::CouponIssue => write!(f, "coupon_issue"),
            HistoryEventKind::DirectClaim => write!(f, "direct_claim"),
        }
    }
}

impl FromStr for HistoryEventKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "attempt" => Ok(HistoryEventKind::Attempt),
            "win" => Ok(HistoryEventKind::Win),
            "claim" => Ok(HistoryEventKind::Claim),
            "coupon_issue" => Ok(HistoryEventKind::CouponIssue),
            "direct_claim" => Ok(HistoryEventKind::DirectClaim),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

impl From<String> for HistoryEventKind {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(HistoryEventKind::Attempt)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
#[sqlx(rename_all = "lowercase")]
pub enum EventOutcome {
    Win,
    Lose,
    Ok,
    Fail,
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventOutcome::Win => write!(f, "win"),
            EventOutcome::Lose => write!(f, "lose"),
            EventOutcome::Ok => write!(f, "ok"),
            EventOutcome::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for EventOutcome {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "win" => Ok(EventOutcome::Win),
            "lose" => Ok(EventOutcome::Lose),
            "ok" => Ok(EventOutcome::Ok),
            "fail" => Ok(EventOutcome::Fail),
            _ => Err(format!("Unknown outcome: {}", s)),
        }
    }
}

/// Coupon minted by the external sales service, already normalized at the
/// boundary (see `sales`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IssuedCoupon {
    pub code: String,
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
