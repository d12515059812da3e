// src/config.rs

use std::env;
use std::str::FromStr;

use crate::draw::ForcedWinPolicy;
use crate::Error;

/// Runtime settings for both games, read from the environment. The server
/// binary loads `.env` via dotenv before calling `from_env`.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Cooldown applied after a win, in minutes.
    pub lock_minutes: i64,
    /// Explicit always-win test flag (FORCE_WIN).
    pub force_win: bool,
    /// Every-Nth-attempt forced win cadence (FTW_EVERY), if set.
    pub ftw_every: Option<u32>,
    /// Perfect Timing target duration and tolerance, in milliseconds.
    pub pt_target_ms: i64,
    pub pt_tolerance_ms: i64,
    /// Multi-game deployments address games by these ids in request bodies.
    pub game_number_id: u32,
    pub game_timing_id: u32,
    /// Sales-service settings; `None` disables coupon issuance entirely.
    pub sales: Option<SalesConfig>,
    /// `/__dev__` routes are only mounted when this is true.
    pub dev_routes: bool,
}

#[derive(Debug, Clone)]
pub struct SalesConfig {
    pub base_url: String,
    pub api_key: String,
    pub coupon_path: String,
    pub hours_to_expiry: i64,
    pub timeout_secs: u64,
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl GameConfig {
    pub fn from_env() -> Result<Self, Error> {
        let ftw_every = match env::var("FTW_EVERY") {
            Ok(raw) => {
                let n: u32 = raw.trim().parse().map_err(|_| {
                    Error::Config(format!("FTW_EVERY has an invalid value: '{}'", raw))
                })?;
                if n > 0 { Some(n) } else { None }
            }
            Err(_) => None,
        };

        let sales = match env::var("SALES_API_URL") {
            Ok(base_url) if !base_url.trim().is_empty() => Some(SalesConfig {
                base_url: base_url.trim().trim_end_matches('/').to_string(),
                api_key: env::var("SALES_API_KEY").unwrap_or_default(),
                coupon_path: env::var("SALES_COUPON_PATH")
                    .unwrap_or_else(|_| "/api/coupons/issue".to_string()),
                hours_to_expiry: env_parse("SALES_HOURS_TO_EXPIRY", 24)?,
                timeout_secs: env_parse("SALES_TIMEOUT_SECS", 5)?,
            }),
            _ => None,
        };

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            lock_minutes: env_parse("LOCK_MINUTES", 10)?,
            force_win: env_bool("FORCE_WIN"),
            ftw_every,
            pt_target_ms: env_parse("PT_TARGET_MS", 9990)?,
            pt_tolerance_ms: env_parse("PT_TOLERANCE_MS", 40)?,
            game_number_id: env_parse("GAME_NUMBER_ID", 1)?,
            game_timing_id: env_parse("GAME_TIMING_ID", 2)?,
            sales,
            dev_routes: app_env.trim().to_lowercase() != "production",
        })
    }

    pub fn forced_win_policy(&self) -> ForcedWinPolicy {
        ForcedWinPolicy::from_settings(self.force_win, self.ftw_every)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            lock_minutes: 10,
            force_win: false,
            ftw_every: None,
            pt_target_ms: 9990,
            pt_tolerance_ms: 40,
            game_number_id: 1,
            game_timing_id: 2,
            sales: None,
            dev_routes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var manipulation is process-global, so these tests stick to the
    // pure pieces.

    #[test]
    fn default_config_is_dev_shaped() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.lock_minutes, 10);
        assert!(cfg.sales.is_none());
        assert!(cfg.dev_routes);
        assert_eq!(cfg.forced_win_policy(), ForcedWinPolicy::Disabled);
    }

    #[test]
    fn policy_precedence_comes_from_settings() {
        let cfg = GameConfig {
            force_win: true,
            ftw_every: Some(7),
            ..GameConfig::default()
        };
        assert_eq!(cfg.forced_win_policy(), ForcedWinPolicy::Always);

        let cfg = GameConfig {
            force_win: false,
            ftw_every: Some(7),
            ..GameConfig::default()
        };
        assert_eq!(cfg.forced_win_policy(), ForcedWinPolicy::EveryN(7));
    }
}
