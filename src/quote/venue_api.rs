use super::{
    NumberOrString, QuoteRequest, QuoteSource, QuoteSourceTag, VenueQuote, build_http_client,
    join_endpoint,
};
use crate::common::{RouterError, RouterResult, Venue};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// 报价后端配置
#[derive(Debug, Clone)]
pub struct VenueApiConfig {
    /// 基础地址，例如 `https://quotes.example.com/api`
    pub base_url: String,
    /// 请求超时时间（毫秒）
    pub timeout_millis: u64,
}

impl VenueApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), timeout_millis: 8_000 }
    }
}

/// `GET /venue-quotes` 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueQuotesResponse {
    #[serde(default)]
    pub quotes: Vec<ApiVenueQuote>,
    #[serde(default)]
    pub jupiter_benchmark: Option<ApiBenchmark>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVenueQuote {
    pub venue: String,
    #[serde(alias = "outAmount")]
    pub output_amount: NumberOrString,
    #[serde(default)]
    pub price_impact_bps: Option<NumberOrString>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default, alias = "poolAddress")]
    pub pool: Option<String>,
    #[serde(default)]
    pub via_mint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBenchmark {
    #[serde(alias = "outAmount")]
    pub output_amount: NumberOrString,
    #[serde(default)]
    pub price_impact_bps: Option<NumberOrString>,
}

impl VenueQuotesResponse {
    /// Unknown venues and unparsable amounts are skipped.
    pub fn into_quotes(self) -> Vec<VenueQuote> {
        let mut out = Vec::with_capacity(self.quotes.len() + 1);
        for quote in self.quotes {
            let Ok(venue) = Venue::from_str(&quote.venue) else {
                debug!(venue = %quote.venue, "skipping quote for unknown venue");
                continue;
            };
            let Some(out_amount) = quote.output_amount.as_u64() else {
                continue;
            };
            let source = if venue.is_native() { QuoteSourceTag::Native } else { QuoteSourceTag::Benchmark };
            let mut q = VenueQuote { source, ..VenueQuote::native(venue, out_amount, impact_bps(&quote.price_impact_bps)) };
            q.latency_ms = quote.latency_ms;
            q.pool = quote.pool.as_deref().and_then(|p| Pubkey::from_str(p).ok());
            q.via_mint = quote.via_mint.as_deref().and_then(|m| Pubkey::from_str(m).ok());
            out.push(q);
        }
        if let Some(benchmark) = self.jupiter_benchmark {
            if let Some(out_amount) = benchmark.output_amount.as_u64() {
                out.push(VenueQuote::benchmark(out_amount, impact_bps(&benchmark.price_impact_bps)));
            }
        }
        out
    }
}

fn impact_bps(value: &Option<NumberOrString>) -> u64 {
    value
        .as_ref()
        .and_then(NumberOrString::as_f64)
        .filter(|v| *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or_default()
}

/// 报价后端 HTTP 客户端，一次请求拿到所有 venue 的报价
#[derive(Clone)]
pub struct VenueApiClient {
    http: Client,
    pub config: VenueApiConfig,
}

impl VenueApiClient {
    pub fn new(config: VenueApiConfig) -> RouterResult<Self> {
        let http = build_http_client(Duration::from_millis(config.timeout_millis))
            .map_err(|e| RouterError::Config(format!("venue api client: {}", e)))?;
        Ok(Self { http, config })
    }

    #[inline]
    fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.config.base_url, path)
    }

    pub async fn fetch_quotes(&self, request: &QuoteRequest) -> RouterResult<VenueQuotesResponse> {
        let url = self.endpoint("/venue-quotes");
        let resp = self
            .http
            .get(url)
            .query(&[
                ("inputMint", request.input_mint.to_string()),
                ("outputMint", request.output_mint.to_string()),
                ("amount", request.amount.to_string()),
                ("slippageBps", request.slippage_bps.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json::<VenueQuotesResponse>().await?)
    }
}

#[async_trait]
impl QuoteSource for VenueApiClient {
    fn name(&self) -> &str {
        "venue-api"
    }

    async fn quote(&self, request: &QuoteRequest) -> RouterResult<Vec<VenueQuote>> {
        Ok(self.fetch_quotes(request).await?.into_quotes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_venue_quotes_response() {
        let pool = Pubkey::new_unique();
        let body = format!(
            r#"{{
                "quotes": [
                    {{"venue": "raydium", "outputAmount": "150000000", "priceImpactBps": 12.4, "latencyMs": 310, "pool": "{}"}},
                    {{"venue": "orca", "outputAmount": 149500000}},
                    {{"venue": "serum", "outputAmount": "1"}},
                    {{"venue": "meteora", "outputAmount": "n/a"}}
                ],
                "jupiterBenchmark": {{"outputAmount": "150100000", "priceImpactBps": "3"}}
            }}"#,
            pool
        );
        let resp: VenueQuotesResponse = serde_json::from_str(&body).unwrap();
        let quotes = resp.into_quotes();
        assert_eq!(quotes.len(), 3);

        assert_eq!(quotes[0].venue, Venue::RaydiumAmmV4);
        assert_eq!(quotes[0].out_amount, 150_000_000);
        assert_eq!(quotes[0].price_impact_bps, 12);
        assert_eq!(quotes[0].latency_ms, Some(310));
        assert_eq!(quotes[0].pool, Some(pool));
        assert_eq!(quotes[1].venue, Venue::OrcaWhirlpool);
        assert_eq!(quotes[1].price_impact_bps, 0);

        assert_eq!(quotes[2].source, QuoteSourceTag::Benchmark);
        assert_eq!(quotes[2].out_amount, 150_100_000);
        assert_eq!(quotes[2].price_impact_bps, 3);
    }

    #[test]
    fn test_missing_fields_default() {
        let resp: VenueQuotesResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.quotes.is_empty());
        assert!(resp.jupiter_benchmark.is_none());
    }

    #[test]
    fn test_endpoint() {
        let client = VenueApiClient::new(VenueApiConfig::new("https://quotes.local/api/")).unwrap();
        assert_eq!(client.endpoint("/venue-quotes"), "https://quotes.local/api/venue-quotes");
    }
}
