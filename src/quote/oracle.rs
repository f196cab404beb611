use super::{NumberOrString, build_http_client, join_endpoint};
use crate::common::{RouterError, RouterResult};
use crate::constants::is_stablecoin;
use reqwest::Client;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;

/// USD price of one whole token.
#[derive(Debug, Clone, PartialEq)]
pub struct OraclePrice {
    pub price: f64,
    pub source: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: NumberOrString,
    #[serde(default)]
    source: Option<String>,
}

/// 价格预言机客户端：`GET {base}/price?mint=`
///
/// USDC / USDT 不发请求，直接按 1.0 计价。
#[derive(Clone)]
pub struct PriceOracle {
    http: Client,
    base_url: String,
}

impl PriceOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RouterResult<Self> {
        let http = build_http_client(timeout)
            .map_err(|e| RouterError::Config(format!("price oracle client: {}", e)))?;
        Ok(Self { http, base_url: base_url.into() })
    }

    /// `Ok(None)` when the oracle has no usable price for the mint.
    pub async fn price(&self, mint: &Pubkey) -> RouterResult<Option<OraclePrice>> {
        if is_stablecoin(mint) {
            return Ok(Some(OraclePrice { price: 1.0, source: "stablecoin".to_string() }));
        }

        let resp = self
            .http
            .get(join_endpoint(&self.base_url, "/price"))
            .query(&[("mint", mint.to_string())])
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = resp.error_for_status()?.json::<PriceResponse>().await?;
        Ok(parse_price(body))
    }
}

fn parse_price(body: PriceResponse) -> Option<OraclePrice> {
    let price = body.price.as_f64().filter(|p| *p > 0.0)?;
    Some(OraclePrice { price, source: body.source.unwrap_or_else(|| "oracle".to_string()) })
}
