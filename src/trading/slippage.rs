//! 动态滑点估算
//!
//! `total = base + size + volatility`
//!
//! - base: 固定基础滑点
//! - size: `size_coefficient_bps * ratio^1.5`，ratio 为交易量 / 池子深度
//! - volatility: `volatility_multiplier * ema_volatility + latency_bps_per_second * ema_latency_s`
//!
//! 每个分量先夹到各自的 `[floor, ceiling]`，总和再夹到 `max_total_bps`。
//! 没有历史观测的交易对只返回 base（冷启动）。

use crate::common::{RouterError, RouterResult};
use crate::resolver::sorted_pair;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Unordered mint pair, SOL/USDC and USDC/SOL share one EMA.
pub type PairKey = (Pubkey, Pubkey);

pub fn pair_key(mint_a: &Pubkey, mint_b: &Pubkey) -> PairKey {
    sorted_pair(mint_a, mint_b)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageConfig {
    pub base_bps: u64,
    pub base_floor_bps: u64,
    pub base_ceiling_bps: u64,
    pub size_coefficient_bps: f64,
    pub size_ceiling_bps: u64,
    pub volatility_multiplier: f64,
    pub latency_bps_per_second: f64,
    pub volatility_ceiling_bps: u64,
    /// EMA smoothing factor in (0, 1].
    pub ema_alpha: f64,
    pub max_total_bps: u64,
}

impl Default for SlippageConfig {
    fn default() -> Self {
        Self {
            base_bps: 50,
            base_floor_bps: 10,
            base_ceiling_bps: 500,
            size_coefficient_bps: 10_000.0,
            size_ceiling_bps: 1_000,
            volatility_multiplier: 1.0,
            latency_bps_per_second: 5.0,
            volatility_ceiling_bps: 500,
            ema_alpha: 0.2,
            max_total_bps: 1_500,
        }
    }
}

impl SlippageConfig {
    pub fn with_base_bps(mut self, base_bps: u64) -> Self {
        self.base_bps = base_bps;
        self
    }

    pub fn with_max_total_bps(mut self, max_total_bps: u64) -> Self {
        self.max_total_bps = max_total_bps.min(BPS_DENOMINATOR);
        self
    }

    pub fn with_ema_alpha(mut self, alpha: f64) -> Self {
        self.ema_alpha = alpha;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    pub volatility_bps: f64,
    pub latency_ms: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlippageEstimate {
    pub total_bps: u64,
    pub base_bps: u64,
    pub size_bps: u64,
    pub volatility_bps: u64,
    /// `None` on cold start.
    pub ema: Option<EmaState>,
}

impl SlippageEstimate {
    pub fn min_out(&self, expected: u64) -> RouterResult<u64> {
        min_out(expected, self.total_bps)
    }
}

pub struct DynamicSlippageEstimator {
    config: SlippageConfig,
    state: RwLock<HashMap<PairKey, EmaState>>,
}

impl DynamicSlippageEstimator {
    pub fn new(config: SlippageConfig) -> Self {
        Self { config, state: RwLock::new(HashMap::new()) }
    }

    pub fn config(&self) -> &SlippageConfig {
        &self.config
    }

    pub fn estimate(&self, pair: &PairKey, trade_size_ratio: f64) -> SlippageEstimate {
        let config = &self.config;
        let base_bps = config.base_bps.clamp(config.base_floor_bps, config.base_ceiling_bps.max(config.base_floor_bps));

        let Some(ema) = self.state.read().get(pair).copied() else {
            let total_bps = base_bps.min(config.max_total_bps);
            return SlippageEstimate { total_bps, base_bps, size_bps: 0, volatility_bps: 0, ema: None };
        };

        let ratio = sanitize(trade_size_ratio);
        let size_bps = to_bps(config.size_coefficient_bps * ratio.powf(1.5), config.size_ceiling_bps);

        let volatility = config.volatility_multiplier * ema.volatility_bps
            + config.latency_bps_per_second * (ema.latency_ms / 1000.0);
        let volatility_bps = to_bps(volatility, config.volatility_ceiling_bps);

        let total_bps = (base_bps + size_bps + volatility_bps).min(config.max_total_bps);
        SlippageEstimate { total_bps, base_bps, size_bps, volatility_bps, ema: Some(ema) }
    }

    /// Fold one observation into the pair's EMA. Invalid samples count as zero.
    pub fn observe(&self, pair: &PairKey, volatility_bps: f64, latency_ms: f64) {
        let alpha = if self.config.ema_alpha.is_finite() && self.config.ema_alpha > 0.0 {
            self.config.ema_alpha.min(1.0)
        } else {
            1.0
        };
        let volatility_bps = sanitize(volatility_bps);
        let latency_ms = sanitize(latency_ms);

        let mut state = self.state.write();
        state
            .entry(*pair)
            .and_modify(|ema| {
                ema.volatility_bps = alpha * volatility_bps + (1.0 - alpha) * ema.volatility_bps;
                ema.latency_ms = alpha * latency_ms + (1.0 - alpha) * ema.latency_ms;
                ema.samples += 1;
            })
            .or_insert(EmaState { volatility_bps, latency_ms, samples: 1 });
    }

    pub fn ema(&self, pair: &PairKey) -> Option<EmaState> {
        self.state.read().get(pair).copied()
    }

    pub fn reset(&self, pair: &PairKey) {
        self.state.write().remove(pair);
    }

    pub fn clear(&self) {
        self.state.write().clear();
    }
}

#[inline]
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

#[inline]
fn to_bps(value: f64, ceiling: u64) -> u64 {
    (sanitize(value).round() as u64).min(ceiling)
}

/// `floor(expected * (10000 - bps) / 10000)`, never below 1 and never above `expected`.
pub fn min_out(expected: u64, slippage_bps: u64) -> RouterResult<u64> {
    if expected == 0 {
        return Err(RouterError::StaleOrInvalidQuote("expected output is zero".to_string()));
    }
    let bps = slippage_bps.min(BPS_DENOMINATOR);
    let out = (expected as u128) * ((BPS_DENOMINATOR - bps) as u128) / (BPS_DENOMINATOR as u128);
    Ok((out as u64).clamp(1, expected))
}

/// Constant-product trade size relative to the input reserve, recovered from price impact.
///
/// With `impact = x / (R + x)` the ratio `x / R` is `impact / (1 - impact)`.
pub fn size_ratio_from_impact(price_impact_bps: u64) -> f64 {
    let impact = price_impact_bps.min(BPS_DENOMINATOR - 1) as f64 / BPS_DENOMINATOR as f64;
    impact / (1.0 - impact)
}
