pub mod dynamic_tip;
pub mod types;

pub use dynamic_tip::{DynamicTipConfig, JitoTipFloorClient, TipPercentile};
pub use types::JitoRegion;

use crate::common::{ChainClient, RouterConfig, RouterError, RouterResult, SubmissionChannel};
use crate::constants::swqos::{JITO_TIP_ACCOUNTS, SWQOS_MIN_TIP_JITO};
use crate::quote::build_http_client;
use crate::swqos::FormatBase64VersionedTransaction;
use crate::trading::common::transaction_builder::{MessageFormat, build_transaction};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::Client;
use serde_json::{Value, json};
use solana_hash::Hash;
use solana_sdk::{
    pubkey::Pubkey, signature::Signature, signer::Signer, transaction::VersionedTransaction,
};
use solana_system_interface::instruction::transfer;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Block engine limit, tip transaction included.
pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

/// One JSON-RPC POST to the block engine.
#[async_trait]
pub trait BlockEngineTransport: Send + Sync {
    async fn send_bundle(&self, url: &str, body: &Value) -> RouterResult<Value>;
}

pub struct HttpBlockEngineTransport {
    http: Client,
    auth_token: Option<String>,
}

impl HttpBlockEngineTransport {
    pub fn new(auth_token: Option<String>, timeout: Duration) -> RouterResult<Self> {
        let http = build_http_client(timeout)
            .map_err(|e| RouterError::Config(format!("block engine client: {}", e)))?;
        Ok(Self { http, auth_token: auth_token.filter(|t| !t.is_empty()) })
    }
}

#[async_trait]
impl BlockEngineTransport for HttpBlockEngineTransport {
    async fn send_bundle(&self, url: &str, body: &Value) -> RouterResult<Value> {
        let request = match &self.auth_token {
            Some(token) => self.http.post(format!("{}?uuid={}", url, token)).header("x-jito-auth", token),
            None => self.http.post(url),
        };
        let response = request.json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        // 4xx responses still carry a JSON-RPC error object
        serde_json::from_str::<Value>(&text)
            .map_err(|_| RouterError::Http(format!("block engine returned {}: {}", status, text)))
    }
}

#[derive(Debug, Clone)]
pub struct JitoBundleConfig {
    pub block_engine_url: String,
    pub tip_lamports: u64,
    /// Random Jito tip account when unset.
    pub tip_account: Option<Pubkey>,
    pub dynamic_tip: DynamicTipConfig,
}

impl From<&RouterConfig> for JitoBundleConfig {
    fn from(config: &RouterConfig) -> Self {
        Self {
            block_engine_url: config.block_engine_url(),
            tip_lamports: config.jito_tip_lamports,
            tip_account: None,
            dynamic_tip: config.dynamic_tip.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleResult {
    /// The transactions reached a channel that accepted them.
    pub success: bool,
    pub bundle_id: Option<String>,
    pub error: Option<String>,
    /// Why the block engine path was abandoned, when it was.
    pub bundle_error: Option<String>,
    pub latency_ms: u64,
    pub transaction_count: usize,
    /// First signature of each submitted business transaction, tip excluded.
    pub signatures: Vec<Signature>,
    pub channel: SubmissionChannel,
}

impl BundleResult {
    pub fn first_signature(&self) -> Option<Signature> {
        self.signatures.first().copied()
    }
}

pub struct JitoBundleSubmitter {
    transport: Arc<dyn BlockEngineTransport>,
    config: JitoBundleConfig,
    public_rpc: Arc<dyn ChainClient>,
    private_rpc: Option<Arc<dyn ChainClient>>,
    tip_floor: Option<JitoTipFloorClient>,
}

impl JitoBundleSubmitter {
    pub fn new(
        transport: Arc<dyn BlockEngineTransport>,
        config: JitoBundleConfig,
        public_rpc: Arc<dyn ChainClient>,
    ) -> Self {
        Self { transport, config, public_rpc, private_rpc: None, tip_floor: None }
    }

    pub fn with_private_rpc(mut self, private_rpc: Arc<dyn ChainClient>) -> Self {
        self.private_rpc = Some(private_rpc);
        self
    }

    pub fn with_tip_floor(mut self, client: JitoTipFloorClient) -> Self {
        self.tip_floor = Some(client);
        self
    }

    pub fn config(&self) -> &JitoBundleConfig {
        &self.config
    }

    pub fn bundles_url(&self) -> String {
        types::bundles_url(&self.config.block_engine_url)
    }

    /// Send `signed_txs` as one bundle with a trailing tip transaction.
    ///
    /// One block engine attempt. Any failure there falls back to submitting the
    /// original transactions over RPC; the result reports the channel that was used.
    pub async fn submit(&self, signed_txs: Vec<VersionedTransaction>, payer: &(dyn Signer + Sync), blockhash: Hash) -> BundleResult {
        let started = Instant::now();
        let signatures: Vec<Signature> =
            signed_txs.iter().filter_map(|tx| tx.signatures.first().copied()).collect();

        if signed_txs.is_empty() {
            return BundleResult {
                success: false,
                bundle_id: None,
                error: Some("empty bundle".to_string()),
                bundle_error: None,
                latency_ms: 0,
                transaction_count: 0,
                signatures,
                channel: SubmissionChannel::Jito,
            };
        }

        let bundle_error = match self.send_bundle(&signed_txs, payer, blockhash).await {
            Ok(bundle_id) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                info!(bundle_id = %bundle_id, transactions = signed_txs.len() + 1, latency_ms, "jito bundle submitted");
                return BundleResult {
                    success: true,
                    bundle_id: Some(bundle_id),
                    error: None,
                    bundle_error: None,
                    latency_ms,
                    transaction_count: signed_txs.len() + 1,
                    signatures,
                    channel: SubmissionChannel::Jito,
                };
            }
            Err(e) => e,
        };

        let (channel, rpc) = match &self.private_rpc {
            Some(private) => (SubmissionChannel::Private, private),
            None => (SubmissionChannel::Public, &self.public_rpc),
        };
        warn!(error = %bundle_error, channel = ?channel, "jito bundle failed, falling back to rpc");

        let mut error = None;
        let mut sent = Vec::with_capacity(signed_txs.len());
        for tx in &signed_txs {
            match rpc.send_transaction(tx).await {
                Ok(signature) => sent.push(signature),
                Err(e) => {
                    warn!(error = %e, channel = ?channel, "rpc fallback submission failed");
                    error = Some(e.to_string());
                    break;
                }
            }
        }

        BundleResult {
            success: error.is_none(),
            bundle_id: None,
            error,
            bundle_error: Some(bundle_error.to_string()),
            latency_ms: started.elapsed().as_millis() as u64,
            transaction_count: sent.len(),
            signatures: if sent.is_empty() { signatures } else { sent },
            channel,
        }
    }

    async fn send_bundle(&self, signed_txs: &[VersionedTransaction], payer: &(dyn Signer + Sync), blockhash: Hash) -> RouterResult<String> {
        if signed_txs.len() >= MAX_BUNDLE_TRANSACTIONS {
            return Err(RouterError::BundleRejected(format!(
                "{} transactions leave no room for the tip",
                signed_txs.len()
            )));
        }
        let tip_tx = self.tip_transaction(payer, blockhash).await?;

        let mut encoded = Vec::with_capacity(signed_txs.len() + 1);
        for tx in signed_txs.iter().chain(std::iter::once(&tip_tx)) {
            encoded.push(tx.to_base64_string()?);
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sendBundle",
            "params": [encoded, { "encoding": "base64" }],
        });

        let response = self.transport.send_bundle(&self.bundles_url(), &body).await?;
        if let Some(error) = response.get("error") {
            let message = error.get("message").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(RouterError::BundleRejected(message));
        }
        response
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RouterError::BundleRejected(format!("unexpected response: {}", response)))
    }

    async fn tip_transaction(&self, payer: &(dyn Signer + Sync), blockhash: Hash) -> RouterResult<VersionedTransaction> {
        let lamports = self.tip_lamports().await;
        let tip_account = self.tip_account()?;
        let ix = transfer(&payer.try_pubkey()?, &tip_account, lamports);
        build_transaction(payer, &[ix], &[], blockhash, MessageFormat::Legacy)
    }

    async fn tip_lamports(&self) -> u64 {
        let dynamic = match &self.tip_floor {
            Some(client) if self.config.dynamic_tip.enabled => {
                match client.optimal_tip_lamports(&self.config.dynamic_tip).await {
                    Ok(tip) => Some(tip),
                    Err(e) => {
                        warn!(error = %e, "tip floor unavailable, using the fixed tip");
                        None
                    }
                }
            }
            _ => None,
        };
        dynamic.unwrap_or(self.config.tip_lamports).max(SWQOS_MIN_TIP_JITO)
    }

    fn tip_account(&self) -> RouterResult<Pubkey> {
        if let Some(account) = self.config.tip_account {
            return Ok(account);
        }
        let account = JITO_TIP_ACCOUNTS
            .choose(&mut rand::rng())
            .ok_or_else(|| RouterError::Config("no valid tip accounts found".to_string()))?;
        Pubkey::from_str(account).map_err(|e| RouterError::Config(format!("tip account {}: {}", account, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::MockChainClient;
    use parking_lot::Mutex;
    use solana_sdk::signature::Keypair;

    struct StaticTransport {
        response: RouterResult<Value>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl BlockEngineTransport for StaticTransport {
        async fn send_bundle(&self, url: &str, body: &Value) -> RouterResult<Value> {
            self.requests.lock().push((url.to_string(), body.clone()));
            self.response.clone()
        }
    }

    fn signed_tx(payer: &Keypair) -> VersionedTransaction {
        let ix = transfer(&payer.pubkey(), &Pubkey::new_unique(), 1);
        build_transaction(payer, &[ix], &[], Hash::default(), MessageFormat::Legacy).unwrap()
    }

    fn config() -> JitoBundleConfig {
        JitoBundleConfig {
            block_engine_url: "http://engine.local".to_string(),
            tip_lamports: 10_000,
            tip_account: None,
            dynamic_tip: DynamicTipConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_bundle_carries_tip_last() {
        let transport = Arc::new(StaticTransport {
            response: Ok(json!({"jsonrpc": "2.0", "id": 1, "result": "bundle-123"})),
            requests: Mutex::new(Vec::new()),
        });
        let rpc = Arc::new(MockChainClient::new());
        let submitter = JitoBundleSubmitter::new(transport.clone(), config(), rpc.clone());
        let payer = Keypair::new();
        let tx = signed_tx(&payer);

        let result = submitter.submit(vec![tx.clone()], &payer, Hash::default()).await;
        assert!(result.success);
        assert_eq!(result.channel, SubmissionChannel::Jito);
        assert_eq!(result.bundle_id.as_deref(), Some("bundle-123"));
        assert_eq!(result.transaction_count, 2);
        assert_eq!(result.first_signature(), Some(tx.signatures[0]));
        assert_eq!(rpc.write_calls(), 0);

        let requests = transport.requests.lock();
        let (url, body) = &requests[0];
        assert_eq!(url, "http://engine.local/api/v1/bundles");
        assert_eq!(body["method"], "sendBundle");
        assert_eq!(body["params"][1]["encoding"], "base64");
        let encoded = body["params"][0].as_array().unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[0], tx.to_base64_string().unwrap());
    }

    #[tokio::test]
    async fn test_rejection_falls_back_to_private_rpc() {
        let transport = Arc::new(StaticTransport {
            response: Ok(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32602, "message": "bundle dropped"}})),
            requests: Mutex::new(Vec::new()),
        });
        let public = Arc::new(MockChainClient::new());
        let private = Arc::new(MockChainClient::new());
        let submitter =
            JitoBundleSubmitter::new(transport, config(), public.clone()).with_private_rpc(private.clone());
        let payer = Keypair::new();
        let tx = signed_tx(&payer);

        let result = submitter.submit(vec![tx.clone()], &payer, Hash::default()).await;
        assert!(result.success);
        assert_eq!(result.channel, SubmissionChannel::Private);
        assert_eq!(result.bundle_error.as_deref(), Some("Bundle rejected: bundle dropped"));
        assert_eq!(result.signatures, vec![tx.signatures[0]]);
        assert_eq!(private.write_calls(), 1);
        assert_eq!(public.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_transport_error_falls_back_to_public_rpc() {
        let transport = Arc::new(StaticTransport {
            response: Err(RouterError::Http("connection refused".into())),
            requests: Mutex::new(Vec::new()),
        });
        let public = Arc::new(MockChainClient::new());
        public.push_send_result(Err(RouterError::RpcError("blockhash not found".into())));
        let submitter = JitoBundleSubmitter::new(transport, config(), public.clone());
        let payer = Keypair::new();

        let result = submitter.submit(vec![signed_tx(&payer)], &payer, Hash::default()).await;
        assert!(!result.success);
        assert_eq!(result.channel, SubmissionChannel::Public);
        assert!(result.error.unwrap().contains("blockhash not found"));
        assert_eq!(public.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_tip_respects_minimum() {
        let transport = Arc::new(StaticTransport { response: Ok(json!({"result": "x"})), requests: Mutex::new(Vec::new()) });
        let tip_account = Pubkey::new_unique();
        let config = JitoBundleConfig { tip_lamports: 10, tip_account: Some(tip_account), ..config() };
        let submitter = JitoBundleSubmitter::new(transport, config, Arc::new(MockChainClient::new()));
        assert_eq!(submitter.tip_lamports().await, SWQOS_MIN_TIP_JITO);
        assert_eq!(submitter.tip_account().unwrap(), tip_account);
    }
}
