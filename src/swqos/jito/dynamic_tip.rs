//! Jito 动态 Tip
//!
//! 从 Tip Floor API 取最近落地 bundle 的 tip 分位数，乘以倍数后限制在 `[min, max]` 之间。
//! API 返回的单位是 SOL，这里统一换算成 lamports。

use crate::common::{RouterError, RouterResult};
use crate::quote::build_http_client;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIP_FLOOR_URL: &str = "https://bundles.jito.wtf/api/v1/bundles/tip_floor";

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Deserialize)]
pub struct JitoTipFloorResponse {
    #[serde(default)]
    pub time: String,
    pub landed_tips_25th_percentile: f64,
    pub landed_tips_50th_percentile: f64,
    pub landed_tips_75th_percentile: f64,
    pub landed_tips_95th_percentile: f64,
    pub landed_tips_99th_percentile: f64,
    #[serde(default)]
    pub ema_landed_tips_50th_percentile: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipPercentile {
    P25,
    #[default]
    P50,
    P75,
    P95,
    P99,
}

impl FromStr for TipPercentile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches("th") {
            "25" | "p25" => Ok(TipPercentile::P25),
            "50" | "p50" => Ok(TipPercentile::P50),
            "75" | "p75" => Ok(TipPercentile::P75),
            "95" | "p95" => Ok(TipPercentile::P95),
            "99" | "p99" => Ok(TipPercentile::P99),
            _ => Err(format!("Invalid tip percentile: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicTipConfig {
    pub enabled: bool,
    pub percentile: TipPercentile,
    pub multiplier: f64,
    pub min_tip_lamports: u64,
    pub max_tip_lamports: u64,
}

impl Default for DynamicTipConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            percentile: TipPercentile::P50,
            multiplier: 1.0,
            min_tip_lamports: 10_000,
            max_tip_lamports: 1_000_000,
        }
    }
}

impl DynamicTipConfig {
    /// Percentile tip scaled by the multiplier and clamped to `[min, max]`.
    pub fn tip_lamports(&self, floor: &JitoTipFloorResponse) -> u64 {
        let base_sol = match self.percentile {
            TipPercentile::P25 => floor.landed_tips_25th_percentile,
            TipPercentile::P50 => floor.landed_tips_50th_percentile,
            TipPercentile::P75 => floor.landed_tips_75th_percentile,
            TipPercentile::P95 => floor.landed_tips_95th_percentile,
            TipPercentile::P99 => floor.landed_tips_99th_percentile,
        };
        let (min, max) = (self.min_tip_lamports, self.max_tip_lamports.max(self.min_tip_lamports));
        let lamports = base_sol * self.multiplier * LAMPORTS_PER_SOL;
        if !lamports.is_finite() || lamports <= 0.0 {
            return min;
        }
        (lamports.round() as u64).clamp(min, max)
    }
}

pub struct JitoTipFloorClient {
    client: Client,
    endpoint: String,
}

impl JitoTipFloorClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> RouterResult<Self> {
        let client = build_http_client(timeout)
            .map_err(|e| RouterError::Config(format!("tip floor client: {}", e)))?;
        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn with_default_endpoint() -> RouterResult<Self> {
        Self::new(DEFAULT_TIP_FLOOR_URL, Duration::from_secs(2))
    }

    pub async fn get_tip_floor(&self) -> RouterResult<JitoTipFloorResponse> {
        let floors = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<JitoTipFloorResponse>>()
            .await?;
        floors
            .into_iter()
            .next()
            .ok_or_else(|| RouterError::Http("tip floor API returned an empty array".to_string()))
    }

    /// Disabled config returns `min_tip_lamports` without a request.
    pub async fn optimal_tip_lamports(&self, config: &DynamicTipConfig) -> RouterResult<u64> {
        if !config.enabled {
            return Ok(config.min_tip_lamports);
        }
        let floor = self.get_tip_floor().await?;
        let tip = config.tip_lamports(&floor);
        debug!(percentile = ?config.percentile, tip_lamports = tip, "jito dynamic tip");
        Ok(tip)
    }
}
