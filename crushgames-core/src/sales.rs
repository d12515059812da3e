// src/sales.rs
//
// Client for the external sales service that mints reward coupons. The
// upstream API is loosely typed (`code` at the top level on some
// deployments, nested under `coupon` on others), so everything is
// normalized into `IssuedCoupon` right here at the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::SalesConfig;
use crate::models::IssuedCoupon;
use crate::Error;

/// What a claim needs from the sales service. `game_number` identifies the
/// game in multi-game deployments; `channel` tells the portal where the
/// coupon came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponIssueRequest {
    pub hours: i64,
    pub contact: Option<String>,
    pub game_number: u32,
    pub channel: String,
}

/// Seam for mocking coupon issuance in service tests.
#[async_trait]
pub trait SalesApi: Send + Sync {
    /// Issue one coupon. The idempotency key must be stable across retries
    /// of the same claim so the upstream can deduplicate.
    async fn issue_coupon(
        &self,
        idempotency_key: &str,
        request: &CouponIssueRequest,
    ) -> Result<IssuedCoupon, Error>;
}

pub struct SalesClient {
    http: Client,
    base_url: String,
    coupon_path: String,
    api_key: String,
}

impl SalesClient {
    pub fn new(cfg: &SalesConfig) -> Result<Self, Error> {
        // The timeout is set on the client so every call is bounded; a
        // timed-out issuance is an ordinary failure for the caller.
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            coupon_path: cfg.coupon_path.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    fn coupon_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url,
            self.coupon_path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SalesApi for SalesClient {
    async fn issue_coupon(
        &self,
        idempotency_key: &str,
        request: &CouponIssueRequest,
    ) -> Result<IssuedCoupon, Error> {
        let url = self.coupon_url();
        debug!("Issuing coupon via {} (key={})", url, idempotency_key);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-idempotency-key", idempotency_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Best-effort extraction of an upstream message for the logs;
            // never forward the raw body to players.
            let detail = serde_json::from_str::<CouponResponseJson>(&body)
                .ok()
                .and_then(|j| j.error.or(j.message))
                .unwrap_or_else(|| "unexpected response".to_string());
            return Err(Error::CouponService(format!("{}: {}", status, detail)));
        }

        let json: CouponResponseJson = serde_json::from_str(&body)
            .map_err(|e| Error::CouponService(format!("malformed response: {}", e)))?;
        normalize_coupon(json)
    }
}

/// Union of the field spellings seen across sales-portal versions.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CouponResponseJson {
    code: Option<String>,
    name: Option<String>,
    coupon_name: Option<String>,
    prize_name: Option<String>,
    expires_at: Option<String>,
    coupon: Option<NestedCouponJson>,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NestedCouponJson {
    code: Option<String>,
    name: Option<String>,
    expires_at: Option<String>,
}

fn parse_expiry(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn normalize_coupon(json: CouponResponseJson) -> Result<IssuedCoupon, Error> {
    let nested = json.coupon.unwrap_or_default();

    let code = json
        .code
        .or(nested.code)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| Error::CouponService("response carried no coupon code".to_string()))?;

    let name = json
        .name
        .or(nested.name)
        .or(json.coupon_name)
        .or(json.prize_name);

    let expires_at = parse_expiry(json.expires_at).or_else(|| parse_expiry(nested.expires_at));

    Ok(IssuedCoupon { code, name, expires_at })
}
