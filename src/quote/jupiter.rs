//! Jupiter Swap API 客户端
//!
//! - `/quote`: 基准报价（也作为聚合器的 benchmark 来源）
//! - `/swap-instructions`: router CPI 模式需要的原始指令
//! - `/swap`: 外部直连模式，返回 Jupiter 构建好的交易

use super::{NumberOrString, QuoteRequest, QuoteSource, VenueQuote, build_http_client, join_endpoint};
use crate::common::{DEFAULT_JUPITER_API_URL, RouterError, RouterResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    transaction::VersionedTransaction,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JupiterApiConfig {
    pub base_url: String,
    pub timeout_millis: u64,
    /// Caps the route's account count so it still fits once wrapped by the router program.
    pub max_accounts: Option<u16>,
    pub only_direct_routes: bool,
}

impl Default for JupiterApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_JUPITER_API_URL.to_string(),
            timeout_millis: 8_000,
            max_accounts: Some(48),
            only_direct_routes: false,
        }
    }
}

impl JupiterApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }
}

/// Parsed `/quote` response. `raw` is sent back verbatim to `/swap` and `/swap-instructions`.
#[derive(Debug, Clone)]
pub struct JupiterQuote {
    pub out_amount: u64,
    pub other_amount_threshold: u64,
    pub price_impact_bps: u64,
    pub context_slot: Option<u64>,
    pub raw: Value,
}

impl JupiterQuote {
    pub fn from_value(raw: Value) -> RouterResult<Self> {
        let field = |name: &str| -> Option<NumberOrString> {
            raw.get(name).cloned().and_then(|v| serde_json::from_value(v).ok())
        };
        let out_amount = field("outAmount")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| RouterError::Http("jupiter quote without outAmount".to_string()))?;
        let other_amount_threshold =
            field("otherAmountThreshold").and_then(|v| v.as_u64()).unwrap_or_default();
        // priceImpactPct is a fraction, 0.01 = 1%
        let price_impact_bps = field("priceImpactPct")
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
            .map(|v| (v * 10_000.0).round() as u64)
            .unwrap_or_default();
        let context_slot = raw.get("contextSlot").and_then(Value::as_u64);
        Ok(Self { out_amount, other_amount_threshold, price_impact_bps, context_slot, raw })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAccountMeta {
    pubkey: String,
    is_signer: bool,
    is_writable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstruction {
    program_id: String,
    accounts: Vec<ApiAccountMeta>,
    data: String,
}

impl ApiInstruction {
    fn into_instruction(self) -> RouterResult<Instruction> {
        let parse = |s: &str| {
            Pubkey::from_str(s).map_err(|e| RouterError::Http(format!("bad pubkey {}: {}", s, e)))
        };
        let accounts = self
            .accounts
            .iter()
            .map(|a| {
                Ok(AccountMeta { pubkey: parse(&a.pubkey)?, is_signer: a.is_signer, is_writable: a.is_writable })
            })
            .collect::<RouterResult<Vec<_>>>()?;
        let data = STANDARD
            .decode(&self.data)
            .map_err(|e| RouterError::Http(format!("bad instruction data: {}", e)))?;
        Ok(Instruction { program_id: parse(&self.program_id)?, accounts, data })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInstructionsResponse {
    #[serde(default)]
    compute_budget_instructions: Vec<ApiInstruction>,
    #[serde(default)]
    setup_instructions: Vec<ApiInstruction>,
    swap_instruction: ApiInstruction,
    #[serde(default)]
    cleanup_instruction: Option<ApiInstruction>,
    #[serde(default)]
    address_lookup_table_addresses: Vec<String>,
}

/// Decoded `/swap-instructions` response.
#[derive(Debug, Clone)]
pub struct JupiterSwapInstructions {
    pub compute_budget: Vec<Instruction>,
    pub setup: Vec<Instruction>,
    pub swap: Instruction,
    pub cleanup: Option<Instruction>,
    pub address_lookup_tables: Vec<Pubkey>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequestBody<'a> {
    user_public_key: String,
    quote_response: &'a Value,
    wrap_and_unwrap_sol: bool,
    dynamic_compute_unit_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    compute_unit_price_micro_lamports: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    swap_transaction: String,
}

#[derive(Clone)]
pub struct JupiterClient {
    http: Client,
    pub config: JupiterApiConfig,
}

impl JupiterClient {
    pub fn new(config: JupiterApiConfig) -> RouterResult<Self> {
        let http = build_http_client(Duration::from_millis(config.timeout_millis))
            .map_err(|e| RouterError::Config(format!("jupiter client: {}", e)))?;
        Ok(Self { http, config })
    }

    #[inline]
    fn endpoint(&self, path: &str) -> String {
        join_endpoint(&self.config.base_url, path)
    }

    pub async fn get_quote(&self, request: &QuoteRequest) -> RouterResult<JupiterQuote> {
        let mut query = vec![
            ("inputMint", request.input_mint.to_string()),
            ("outputMint", request.output_mint.to_string()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ];
        if let Some(max_accounts) = self.config.max_accounts {
            query.push(("maxAccounts", max_accounts.to_string()));
        }
        if self.config.only_direct_routes {
            query.push(("onlyDirectRoutes", "true".to_string()));
        }

        let resp = self
            .http
            .get(self.endpoint("/quote"))
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        let raw = resp.json::<Value>().await?;
        let quote = JupiterQuote::from_value(raw)?;
        debug!(out_amount = quote.out_amount, impact_bps = quote.price_impact_bps, "jupiter quote");
        Ok(quote)
    }

    pub async fn swap_instructions(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<JupiterSwapInstructions> {
        let body = SwapRequestBody {
            user_public_key: user.to_string(),
            quote_response: &quote.raw,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            compute_unit_price_micro_lamports: compute_unit_price,
        };
        let resp = self
            .http
            .post(self.endpoint("/swap-instructions"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed = resp.json::<SwapInstructionsResponse>().await?;
        parse_swap_instructions(parsed)
    }

    /// Jupiter-built transaction, unsigned.
    pub async fn swap_transaction(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<VersionedTransaction> {
        let body = SwapRequestBody {
            user_public_key: user.to_string(),
            quote_response: &quote.raw,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            compute_unit_price_micro_lamports: compute_unit_price,
        };
        let resp = self
            .http
            .post(self.endpoint("/swap"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed = resp.json::<SwapResponse>().await?;
        decode_transaction(&parsed.swap_transaction)
    }
}

fn parse_swap_instructions(parsed: SwapInstructionsResponse) -> RouterResult<JupiterSwapInstructions> {
    let convert = |list: Vec<ApiInstruction>| -> RouterResult<Vec<Instruction>> {
        list.into_iter().map(ApiInstruction::into_instruction).collect()
    };
    let address_lookup_tables = parsed
        .address_lookup_table_addresses
        .iter()
        .map(|s| Pubkey::from_str(s).map_err(|e| RouterError::Http(format!("bad lookup table {}: {}", s, e))))
        .collect::<RouterResult<Vec<_>>>()?;
    Ok(JupiterSwapInstructions {
        compute_budget: convert(parsed.compute_budget_instructions)?,
        setup: convert(parsed.setup_instructions)?,
        swap: parsed.swap_instruction.into_instruction()?,
        cleanup: parsed.cleanup_instruction.map(ApiInstruction::into_instruction).transpose()?,
        address_lookup_tables,
    })
}

fn decode_transaction(encoded: &str) -> RouterResult<VersionedTransaction> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RouterError::Http(format!("bad swap transaction encoding: {}", e)))?;
    bincode::deserialize::<VersionedTransaction>(&bytes)
        .map_err(|e| RouterError::Http(format!("bad swap transaction: {}", e)))
}

/// Aggregator swap API used by the router-CPI and external-direct execution modes.
#[async_trait]
pub trait ExternalSwapApi: Send + Sync {
    async fn get_quote(&self, request: &QuoteRequest) -> RouterResult<JupiterQuote>;

    async fn swap_instructions(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<JupiterSwapInstructions>;

    async fn swap_transaction(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<VersionedTransaction>;
}

#[async_trait]
impl ExternalSwapApi for JupiterClient {
    async fn get_quote(&self, request: &QuoteRequest) -> RouterResult<JupiterQuote> {
        JupiterClient::get_quote(self, request).await
    }

    async fn swap_instructions(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<JupiterSwapInstructions> {
        JupiterClient::swap_instructions(self, quote, user, compute_unit_price).await
    }

    async fn swap_transaction(
        &self,
        quote: &JupiterQuote,
        user: &Pubkey,
        compute_unit_price: Option<u64>,
    ) -> RouterResult<VersionedTransaction> {
        JupiterClient::swap_transaction(self, quote, user, compute_unit_price).await
    }
}

#[async_trait]
impl QuoteSource for JupiterClient {
    fn name(&self) -> &str {
        "jupiter"
    }

    async fn quote(&self, request: &QuoteRequest) -> RouterResult<Vec<VenueQuote>> {
        let quote = JupiterClient::get_quote(self, request).await?;
        Ok(vec![VenueQuote::benchmark(quote.out_amount, quote.price_impact_bps)])
    }
}
