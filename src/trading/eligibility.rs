//! 路由资格判定
//!
//! `decide` 是纯函数：同样的输入永远得到同样的 mode 和 reason。
//! 检查顺序固定，每一步短路返回自己的 reason（日志和界面提示都依赖它）：
//! missing-provider → fallback-route → tokens-missing → no-dex-plan → invalid-quote → provider-eligible

use crate::common::{RouterConfig, RouterError, RouterResult};
use crate::quote::VenueQuote;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteMode {
    Native,
    RouterCpiFallback,
    ExternalDirectFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteReason {
    MissingProvider,
    FallbackRoute,
    TokensMissing,
    NoDexPlan,
    InvalidQuote,
    ProviderEligible,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::MissingProvider => "missing-provider",
            RouteReason::FallbackRoute => "fallback-route",
            RouteReason::TokensMissing => "tokens-missing",
            RouteReason::NoDexPlan => "no-dex-plan",
            RouteReason::InvalidQuote => "invalid-quote",
            RouteReason::ProviderEligible => "provider-eligible",
        }
    }

    pub fn mode(&self) -> RouteMode {
        match self {
            RouteReason::MissingProvider | RouteReason::FallbackRoute | RouteReason::NoDexPlan => {
                RouteMode::RouterCpiFallback
            }
            RouteReason::TokensMissing | RouteReason::InvalidQuote => RouteMode::ExternalDirectFallback,
            RouteReason::ProviderEligible => RouteMode::Native,
        }
    }
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteDecision {
    pub mode: RouteMode,
    pub reason: RouteReason,
}

impl RouteDecision {
    pub fn is_native(&self) -> bool {
        self.mode == RouteMode::Native
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RouteEligibilityInput {
    /// A native venue produced the selected quote.
    pub has_provider: bool,
    /// The selected quote went through an intermediate pair.
    pub is_fallback_route: bool,
    pub has_input_token: bool,
    pub has_output_token: bool,
    /// A router-compatible instruction plan exists (and the native quote is competitive).
    pub has_dex_plan: bool,
    pub quote_out_amount: u64,
}

pub fn decide(input: &RouteEligibilityInput) -> RouteDecision {
    let reason = if !input.has_provider {
        RouteReason::MissingProvider
    } else if input.is_fallback_route {
        RouteReason::FallbackRoute
    } else if !input.has_input_token || !input.has_output_token {
        RouteReason::TokensMissing
    } else if !input.has_dex_plan {
        RouteReason::NoDexPlan
    } else if input.quote_out_amount == 0 {
        RouteReason::InvalidQuote
    } else {
        RouteReason::ProviderEligible
    };
    RouteDecision { mode: reason.mode(), reason }
}

// ==================== 报价安全检查 ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyConfig {
    pub max_quote_age: Duration,
    pub max_oracle_divergence_bps: u64,
    /// Native output relative to the benchmark, in bps of the benchmark.
    pub min_venue_score_bps: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self { max_quote_age: Duration::from_secs(30), max_oracle_divergence_bps: 300, min_venue_score_bps: 9_950 }
    }
}

impl From<&RouterConfig> for SafetyConfig {
    fn from(config: &RouterConfig) -> Self {
        Self {
            max_quote_age: config.max_quote_age,
            max_oracle_divergence_bps: config.max_oracle_divergence_bps,
            min_venue_score_bps: config.min_venue_score_bps,
        }
    }
}

/// USD prices and decimals of both legs; divergence is only checked when both prices are known.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OracleContext {
    pub input_price: Option<f64>,
    pub output_price: Option<f64>,
    pub input_decimals: u8,
    pub output_decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteSafety {
    /// `false` feeds `has_dex_plan = false` into [`decide`].
    pub competitive: bool,
    pub score_bps: Option<u64>,
    pub divergence_bps: Option<u64>,
}

pub fn check_quote_safety(
    quote: &VenueQuote,
    amount_in: u64,
    benchmark: Option<&VenueQuote>,
    oracle: &OracleContext,
    config: &SafetyConfig,
) -> RouterResult<QuoteSafety> {
    if quote.out_amount == 0 {
        return Err(RouterError::StaleOrInvalidQuote("zero output".to_string()));
    }
    let age = quote.age();
    if age > config.max_quote_age {
        return Err(RouterError::StaleOrInvalidQuote(format!(
            "{} quote is {}ms old",
            quote.venue,
            age.as_millis()
        )));
    }

    let divergence_bps = oracle_divergence_bps(amount_in, quote.out_amount, oracle);
    if let Some(divergence_bps) = divergence_bps {
        if divergence_bps > config.max_oracle_divergence_bps {
            return Err(RouterError::OracleDivergenceExceeded {
                divergence_bps,
                max_bps: config.max_oracle_divergence_bps,
            });
        }
    }

    let score_bps = benchmark
        .filter(|b| b.out_amount > 0)
        .map(|b| ((quote.out_amount as u128 * 10_000) / b.out_amount as u128).min(u64::MAX as u128) as u64);
    let competitive = score_bps.is_none_or(|score| score >= config.min_venue_score_bps);

    Ok(QuoteSafety { competitive, score_bps, divergence_bps })
}

/// `|value_out - value_in| / value_in` in bps, valued at oracle prices.
pub fn oracle_divergence_bps(amount_in: u64, amount_out: u64, oracle: &OracleContext) -> Option<u64> {
    let (price_in, price_out) = (oracle.input_price?, oracle.output_price?);
    if !(price_in.is_finite() && price_out.is_finite()) || price_in <= 0.0 || price_out <= 0.0 {
        return None;
    }
    let value_in = amount_in as f64 / 10f64.powi(oracle.input_decimals as i32) * price_in;
    let value_out = amount_out as f64 / 10f64.powi(oracle.output_decimals as i32) * price_out;
    if value_in <= 0.0 {
        return None;
    }
    Some(((value_out - value_in).abs() / value_in * 10_000.0).round() as u64)
}
