//! 报价聚合
//!
//! 所有报价来源实现 [`QuoteSource`]，由 [`VenueQuoteAggregator`] 并发请求、限时收集、排序。
//!
//! - [`VenueApiClient`]: 后端 `/venue-quotes`，一次返回多个 venue 的报价和 Jupiter 基准
//! - [`JupiterClient`]: Jupiter `/quote` 基准，外加 fallback 模式用到的 `/swap-instructions` 和 `/swap`
//! - [`OnChainQuoteSource`]: 直接读金库余额，按恒定乘积公式计算
//! - [`PriceOracle`]: `/price` 价格预言机，稳定币直接返回 1.0

pub mod aggregator;
pub mod jupiter;
pub mod onchain;
pub mod oracle;
pub mod venue_api;

pub use aggregator::{AggregatorConfig, VenueQuoteAggregator, best_benchmark, rank_quotes};
pub use jupiter::{
    ExternalSwapApi, JupiterApiConfig, JupiterClient, JupiterQuote, JupiterSwapInstructions,
};
pub use onchain::OnChainQuoteSource;
pub use oracle::{OraclePrice, PriceOracle};
pub use venue_api::{VenueApiClient, VenueApiConfig};

use crate::common::{AnyResult, RouterResult, Venue};
use crate::trading::slippage::SlippageEstimate;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::{env, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSourceTag {
    Native,
    Benchmark,
}

/// One venue's answer to a quote request. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueQuote {
    pub venue: Venue,
    pub out_amount: u64,
    pub price_impact_bps: u64,
    pub latency_ms: Option<u64>,
    pub source: QuoteSourceTag,
    /// Pool the quote was computed against, if the source knows it.
    pub pool: Option<Pubkey>,
    /// Intermediate mint when the venue routed through a second pair.
    pub via_mint: Option<Pubkey>,
    pub quoted_at: Instant,
}

impl VenueQuote {
    pub fn native(venue: Venue, out_amount: u64, price_impact_bps: u64) -> Self {
        Self {
            venue,
            out_amount,
            price_impact_bps,
            latency_ms: None,
            source: QuoteSourceTag::Native,
            pool: None,
            via_mint: None,
            quoted_at: Instant::now(),
        }
    }

    pub fn benchmark(out_amount: u64, price_impact_bps: u64) -> Self {
        Self { source: QuoteSourceTag::Benchmark, ..Self::native(Venue::Jupiter, out_amount, price_impact_bps) }
    }

    pub fn with_pool(mut self, pool: Pubkey) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_via_mint(mut self, mint: Pubkey) -> Self {
        self.via_mint = Some(mint);
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        self.source == QuoteSourceTag::Native && self.venue.is_native()
    }

    pub fn age(&self) -> Duration {
        self.quoted_at.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
}

impl QuoteRequest {
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, slippage_bps: u16) -> Self {
        Self { input_mint, output_mint, amount, slippage_bps }
    }
}

/// 报价来源
///
/// 一个来源可以返回多个 venue 的报价；失败只影响它自己，不会让整轮聚合失败。
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(&self, request: &QuoteRequest) -> RouterResult<Vec<VenueQuote>>;
}

/// Result of one aggregation cycle.
#[derive(Debug, Clone)]
pub struct AggregatedQuotes {
    pub request: QuoteRequest,
    /// Strictly descending by `out_amount`, no zero outputs.
    pub quotes: Vec<VenueQuote>,
    /// Top native quote, `None` when only the benchmark answered.
    pub best_venue: Option<VenueQuote>,
    pub benchmark: Option<VenueQuote>,
    /// Display estimate for the best native quote.
    pub slippage: Option<SlippageEstimate>,
}

impl AggregatedQuotes {
    pub fn best(&self) -> Option<&VenueQuote> {
        self.quotes.first()
    }

    pub fn native_quotes(&self) -> impl Iterator<Item = &VenueQuote> {
        self.quotes.iter().filter(|q| q.is_native())
    }
}

/// Shared reqwest client: keep-alive pool, nodelay, and `HTTPS_PROXY` / `HTTP_PROXY` from the environment.
pub(crate) fn build_http_client(timeout: Duration) -> AnyResult<Client> {
    let mut builder = Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(64)
        .tcp_nodelay(true)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5));

    if let Ok(https_proxy) = env::var("HTTPS_PROXY").or_else(|_| env::var("https_proxy")) {
        builder = builder.proxy(Proxy::https(&https_proxy)?);
    } else if let Ok(http_proxy) = env::var("HTTP_PROXY").or_else(|_| env::var("http_proxy")) {
        builder = builder.proxy(Proxy::http(&http_proxy)?);
    }

    Ok(builder.build()?)
}

#[inline]
pub(crate) fn join_endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Amounts arrive as JSON numbers or decimal strings depending on the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Int(u64),
    Float(f64),
    Str(String),
}

impl NumberOrString {
    pub(crate) fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrString::Int(v) => Some(*v),
            NumberOrString::Float(v) if v.is_finite() && *v >= 0.0 => Some(v.floor() as u64),
            NumberOrString::Float(_) => None,
            NumberOrString::Str(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v.floor() as u64))
            }
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Int(v) => Some(*v as f64),
            NumberOrString::Float(v) => Some(*v).filter(|v| v.is_finite()),
            NumberOrString::Str(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_or_string() {
        let v: NumberOrString = serde_json::from_str("150000000").unwrap();
        assert_eq!(v.as_u64(), Some(150_000_000));
        let v: NumberOrString = serde_json::from_str("\"150000000\"").unwrap();
        assert_eq!(v.as_u64(), Some(150_000_000));
        let v: NumberOrString = serde_json::from_str("12.9").unwrap();
        assert_eq!(v.as_u64(), Some(12));
        let v: NumberOrString = serde_json::from_str("\"-3\"").unwrap();
        assert_eq!(v.as_u64(), None);
        let v: NumberOrString = serde_json::from_str("\"0.0125\"").unwrap();
        assert_eq!(v.as_f64(), Some(0.0125));
    }

    #[test]
    fn test_join_endpoint() {
        assert_eq!(join_endpoint("https://a.b/", "/quote"), "https://a.b/quote");
        assert_eq!(join_endpoint("https://a.b/v1", "swap"), "https://a.b/v1/swap");
    }

    #[tokio::test]
    async fn test_benchmark_quote_is_not_native() {
        let q = VenueQuote::benchmark(10, 1);
        assert!(!q.is_native());
        assert_eq!(q.venue, Venue::Jupiter);
        let q = VenueQuote::native(Venue::RaydiumCpmm, 10, 1);
        assert!(q.is_native());
        let q = VenueQuote { source: QuoteSourceTag::Native, ..VenueQuote::benchmark(10, 1) };
        assert!(!q.is_native());
    }
}
