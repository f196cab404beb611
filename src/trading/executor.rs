//! 各执行模式的交易构建与提交
//!
//! [`RpcExecutionBackend`] 把一个 [`ExecutionMode`] 变成一笔已签名、已提交的交易：
//!
//! | mode | 指令来源 | 消息格式 |
//! |------|----------|----------|
//! | `NativeCpi` | resolver + `swap_direct` | 配置了 ALT 用 v0，否则 legacy |
//! | `RouterCpiVersioned` | 聚合器 swap 指令 + `swap_external` | v0，必须有 ALT |
//! | `RouterCpiLegacy` | 同上 | legacy |
//! | `ExternalDirect` | 聚合器返回的整笔交易 | 聚合器决定 |
//!
//! 提交：配置了 Jito 就走 bundle（失败自动回退 RPC），否则私有 RPC 优先，公共 RPC 兜底。

use crate::common::{ChainClient, RouterError, RouterResult};
use crate::quote::{ExternalSwapApi, QuoteRequest};
use crate::resolver::DexAccountResolver;
use crate::swqos::JitoBundleSubmitter;
use crate::trading::builder::{NativeSwapInstructionBuilder, SwapParams};
use crate::trading::common::compute_budget::strip_compute_budget;
use crate::trading::common::transaction_builder::{MessageFormat, build_transaction, sign_prebuilt};
use crate::trading::fallback::{ExecutionBackend, ExecutionMode, ExecutionRequest};
use async_trait::async_trait;
use solana_hash::Hash;
use solana_sdk::{
    message::AddressLookupTableAccount,
    pubkey::Pubkey,
    signature::{Signature, Signer},
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::{debug, info};

pub type SignerRef = Arc<dyn Signer + Send + Sync>;

pub struct RpcExecutionBackend {
    client: Arc<dyn ChainClient>,
    private_rpc: Option<Arc<dyn ChainClient>>,
    resolver: Arc<DexAccountResolver>,
    builder: Arc<NativeSwapInstructionBuilder>,
    external: Option<Arc<dyn ExternalSwapApi>>,
    signer: SignerRef,
    bundle: Option<Arc<JitoBundleSubmitter>>,
    lookup_table: Option<Pubkey>,
    compute_unit_price: u64,
}

impl RpcExecutionBackend {
    pub fn new(
        client: Arc<dyn ChainClient>,
        resolver: Arc<DexAccountResolver>,
        builder: Arc<NativeSwapInstructionBuilder>,
        signer: SignerRef,
    ) -> Self {
        let compute_unit_price = builder.config().compute_unit_price;
        Self {
            client,
            private_rpc: None,
            resolver,
            builder,
            external: None,
            signer,
            bundle: None,
            lookup_table: None,
            compute_unit_price,
        }
    }

    pub fn with_private_rpc(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.private_rpc = Some(client);
        self
    }

    pub fn with_external(mut self, external: Arc<dyn ExternalSwapApi>) -> Self {
        self.external = Some(external);
        self
    }

    pub fn with_bundle_submitter(mut self, submitter: Arc<JitoBundleSubmitter>) -> Self {
        self.bundle = Some(submitter);
        self
    }

    pub fn with_lookup_table(mut self, table: Option<Pubkey>) -> Self {
        self.lookup_table = table;
        self
    }

    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }

    fn external(&self) -> RouterResult<&Arc<dyn ExternalSwapApi>> {
        self.external
            .as_ref()
            .ok_or_else(|| RouterError::Config("external swap api not configured".to_string()))
    }

    fn check_user(&self, request: &ExecutionRequest) -> RouterResult<()> {
        let signer = self.signer.pubkey();
        if signer != request.user {
            return Err(RouterError::ExecutionFailed(format!(
                "request user {} does not match signer {}",
                request.user, signer
            )));
        }
        Ok(())
    }

    async fn execute_native(&self, request: &ExecutionRequest) -> RouterResult<Signature> {
        let venue = request
            .venue
            .filter(|v| v.is_native())
            .ok_or_else(|| RouterError::VenueUnsupported("no native venue selected".to_string()))?;

        let route = self
            .resolver
            .resolve(venue, &request.input_mint, &request.output_mint, &request.user)
            .await?;
        let params = SwapParams::new(request.amount_in, request.expected_out, request.slippage_bps);
        let instructions = self.builder.build(&request.user, &route, &params).await?;

        let (tables, format) = match self.lookup_table {
            Some(table) => (vec![self.client.get_address_lookup_table(&table).await?], MessageFormat::V0),
            None => (Vec::new(), MessageFormat::Legacy),
        };

        let blockhash = self.client.get_latest_blockhash().await?;
        let tx = build_transaction(self.signer.as_ref(), &instructions, &tables, blockhash, format)?;
        self.submit(tx, blockhash).await
    }

    async fn execute_router_cpi(&self, request: &ExecutionRequest, format: MessageFormat) -> RouterResult<Signature> {
        let external = self.external()?;
        let quote = external.get_quote(&quote_request(request)).await?;
        let routed = external
            .swap_instructions(&quote, &request.user, Some(self.compute_unit_price))
            .await?;

        let tables = match format {
            MessageFormat::V0 => {
                let mut keys = routed.address_lookup_tables.clone();
                keys.extend(self.lookup_table);
                if keys.is_empty() {
                    return Err(RouterError::AddressLookupTableUnavailable("ALT not set".to_string()));
                }
                self.load_lookup_tables(&keys).await?
            }
            MessageFormat::Legacy => Vec::new(),
        };

        let setup = strip_compute_budget(routed.setup);
        let params = SwapParams::new(request.amount_in, quote.out_amount, request.slippage_bps);
        let built = self
            .builder
            .build_external_cpi(&request.user, &request.input_mint, &request.output_mint, &routed.swap, &setup, &params)
            .await?;
        let mut instructions = built.instructions;
        instructions.extend(routed.cleanup);

        let blockhash = self.client.get_latest_blockhash().await?;
        let tx = build_transaction(self.signer.as_ref(), &instructions, &tables, blockhash, format)?;
        self.submit(tx, blockhash).await
    }

    async fn execute_external(&self, request: &ExecutionRequest) -> RouterResult<Signature> {
        let external = self.external()?;
        let quote = external.get_quote(&quote_request(request)).await?;
        let unsigned = external
            .swap_transaction(&quote, &request.user, Some(self.compute_unit_price))
            .await?;
        let blockhash = *unsigned.message.recent_blockhash();
        let tx = sign_prebuilt(self.signer.as_ref(), unsigned)?;
        self.submit(tx, blockhash).await
    }

    async fn load_lookup_tables(&self, keys: &[Pubkey]) -> RouterResult<Vec<AddressLookupTableAccount>> {
        let mut tables = Vec::with_capacity(keys.len());
        for key in keys {
            tables.push(self.client.get_address_lookup_table(key).await?);
        }
        Ok(tables)
    }

    async fn submit(&self, tx: VersionedTransaction, blockhash: Hash) -> RouterResult<Signature> {
        if let Some(bundle) = &self.bundle {
            let result = bundle.submit(vec![tx], self.signer.as_ref(), blockhash).await;
            if result.success {
                return result
                    .first_signature()
                    .ok_or_else(|| RouterError::ExecutionFailed("submission returned no signature".to_string()));
            }
            let message = result.error.unwrap_or_else(|| "submission failed".to_string());
            return Err(RouterError::classify(&message));
        }

        let rpc = self.private_rpc.as_ref().unwrap_or(&self.client);
        let signature = rpc.send_transaction(&tx).await?;
        debug!(%signature, private = self.private_rpc.is_some(), "transaction sent");
        Ok(signature)
    }
}

fn quote_request(request: &ExecutionRequest) -> QuoteRequest {
    QuoteRequest::new(
        request.input_mint,
        request.output_mint,
        request.amount_in,
        request.slippage_bps.min(u16::MAX as u64) as u16,
    )
}

#[async_trait]
impl ExecutionBackend for RpcExecutionBackend {
    async fn execute(&self, mode: ExecutionMode, request: &ExecutionRequest) -> Result<Signature, RouterError> {
        self.check_user(request)?;
        info!(%mode, input = %request.input_mint, output = %request.output_mint, amount_in = request.amount_in, "executing");
        match mode {
            ExecutionMode::NativeCpi => self.execute_native(request).await,
            ExecutionMode::RouterCpiVersioned => self.execute_router_cpi(request, MessageFormat::V0).await,
            ExecutionMode::RouterCpiLegacy => self.execute_router_cpi(request, MessageFormat::Legacy).await,
            ExecutionMode::ExternalDirect => self.execute_external(request).await,
        }
    }
}
