pub mod common;
pub mod constants;
pub mod instruction;
pub mod quote;
pub mod resolver;
pub mod swqos;
pub mod trading;

pub use crate::common::{ChainClient, RouterConfig, RouterError, RouterResult, Venue};
pub use crate::trading::{
    ExecutionMode, ExecutionObserver, ExecutionOutcome, ExecutionRecord, NoopObserver, ObserverRef,
    RouteDecision, RouteMode, RouteReason, TerminalState,
};

use crate::common::SolanaRpcClient;
use crate::instruction::utils::spl_token::mint_decimals_decode;
use crate::quote::{
    AggregatedQuotes, AggregatorConfig, ExternalSwapApi, JupiterApiConfig, JupiterClient, OnChainQuoteSource,
    PriceOracle, QuoteSource, VenueApiClient, VenueApiConfig, VenueQuoteAggregator,
};
use crate::resolver::{DexAccountResolver, PoolRegistry, ResolverConfig};
use crate::swqos::jito::JitoTipFloorClient;
use crate::swqos::{HttpBlockEngineTransport, JitoBundleConfig, JitoBundleSubmitter};
use crate::trading::scheduler::RefreshHandle;
use crate::trading::slippage::pair_key;
use crate::trading::{
    BuilderConfig, DynamicSlippageEstimator, ExecutionFallbackOrchestrator, ExecutionRequest, NativeSwapInstructionBuilder,
    OracleContext, QuoteGate, QuoteKey, QuoteSafety, RefreshScheduler, RouteEligibilityInput, RpcExecutionBackend,
    SafetyConfig, SignerRef, VenueSelection, check_quote_safety, decide,
};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the router talks to outside the process.
///
/// [`NativeRouter::new`] builds these from [`RouterConfig`]; tests hand in mocks.
pub struct RouterComponents {
    pub client: Arc<dyn ChainClient>,
    pub private_rpc: Option<Arc<dyn ChainClient>>,
    /// Aggregator swap API for the router-CPI and external-direct modes.
    pub external: Option<Arc<dyn ExternalSwapApi>>,
    /// Extra native quote sources. The on-chain source is always added.
    pub sources: Vec<Arc<dyn QuoteSource>>,
    pub benchmark: Option<Arc<dyn QuoteSource>>,
    pub oracle: Option<Arc<PriceOracle>>,
    pub bundle: Option<Arc<JitoBundleSubmitter>>,
}

impl RouterComponents {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            private_rpc: None,
            external: None,
            sources: Vec::new(),
            benchmark: None,
            oracle: None,
            bundle: None,
        }
    }
}

/// Quotes plus the route decision for one request.
#[derive(Debug, Clone)]
pub struct RoutePreview {
    pub quotes: AggregatedQuotes,
    pub decision: RouteDecision,
    /// `None` when no native venue quoted.
    pub safety: Option<QuoteSafety>,
    /// Output the execution is priced against: best native quote in native mode, best quote otherwise.
    pub expected_out: u64,
    pub slippage_bps: u64,
    pub min_out: u64,
}

impl RoutePreview {
    pub fn venue(&self) -> Option<Venue> {
        match self.decision.mode {
            RouteMode::Native => self.quotes.best_venue.as_ref().map(|q| q.venue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwapReport {
    pub preview: RoutePreview,
    pub outcome: ExecutionOutcome,
}

/// 原生路由客户端
///
/// 报价 → 安全检查 → 路由判定 → 按回退链执行。
pub struct NativeRouter {
    pub payer: Arc<Keypair>,
    config: RouterConfig,
    client: Arc<dyn ChainClient>,
    registry: Arc<PoolRegistry>,
    resolver: Arc<DexAccountResolver>,
    aggregator: Arc<VenueQuoteAggregator>,
    slippage: Arc<DynamicSlippageEstimator>,
    oracle: Option<Arc<PriceOracle>>,
    orchestrator: ExecutionFallbackOrchestrator,
    gate: QuoteGate,
    safety: SafetyConfig,
}

impl NativeRouter {
    /// Connect to everything named in `config`.
    pub fn new(payer: Arc<Keypair>, config: RouterConfig) -> RouterResult<Self> {
        config.validate()?;

        let client: Arc<dyn ChainClient> = Arc::new(SolanaRpcClient::new_with_timeout_and_commitment(
            config.rpc_url.clone(),
            config.rpc_timeout,
            config.commitment,
        ));
        let private_rpc = config.private_rpc_url.as_ref().map(|url| {
            let private: Arc<dyn ChainClient> = Arc::new(SolanaRpcClient::new_with_timeout_and_commitment(
                url.clone(),
                config.rpc_timeout,
                config.commitment,
            ));
            private
        });

        let jupiter = Arc::new(JupiterClient::new(JupiterApiConfig::new(config.jupiter_api_url.clone()))?);
        let external: Arc<dyn ExternalSwapApi> = jupiter.clone();
        let benchmark: Arc<dyn QuoteSource> = jupiter;

        let mut sources: Vec<Arc<dyn QuoteSource>> = Vec::new();
        if let Some(url) = &config.venue_api_url {
            let mut api_config = VenueApiConfig::new(url.clone());
            api_config.timeout_millis = config.per_source_timeout.as_millis() as u64;
            sources.push(Arc::new(VenueApiClient::new(api_config)?));
        }

        let oracle = match &config.price_api_url {
            Some(url) => Some(Arc::new(PriceOracle::new(url.clone(), config.http_timeout)?)),
            None => None,
        };

        let bundle = if config.use_jito_bundle {
            let transport = Arc::new(HttpBlockEngineTransport::new(config.jito_auth_token.clone(), config.http_timeout)?);
            let mut submitter = JitoBundleSubmitter::new(transport, JitoBundleConfig::from(&config), client.clone());
            if let Some(private) = &private_rpc {
                submitter = submitter.with_private_rpc(private.clone());
            }
            if config.dynamic_tip.enabled {
                submitter = submitter.with_tip_floor(JitoTipFloorClient::with_default_endpoint()?);
            }
            Some(Arc::new(submitter))
        } else {
            None
        };

        let components = RouterComponents {
            client,
            private_rpc,
            external: Some(external),
            sources,
            benchmark: Some(benchmark),
            oracle,
            bundle,
        };
        Ok(Self::from_components(payer, config, components))
    }

    pub fn from_components(payer: Arc<Keypair>, config: RouterConfig, components: RouterComponents) -> Self {
        let client = components.client;
        let registry = Arc::new(PoolRegistry::from_entries(&config.pools));
        let resolver = Arc::new(DexAccountResolver::with_registry(
            client.clone(),
            registry.clone(),
            ResolverConfig::from(&config),
        ));
        let slippage = Arc::new(DynamicSlippageEstimator::new(config.slippage));

        let onchain: Arc<dyn QuoteSource> = Arc::new(
            OnChainQuoteSource::new(resolver.clone(), client.clone()).with_venues(config.enabled_venues.clone()),
        );
        let mut aggregator = VenueQuoteAggregator::new(AggregatorConfig::from(&config))
            .with_source(onchain)
            .with_slippage_estimator(slippage.clone());
        for source in components.sources {
            aggregator = aggregator.with_source(source);
        }
        if let Some(benchmark) = components.benchmark {
            aggregator = aggregator.with_benchmark(benchmark);
        }

        let builder = Arc::new(NativeSwapInstructionBuilder::new(client.clone(), BuilderConfig::from(&config)));
        let signer: SignerRef = payer.clone();
        let mut backend = RpcExecutionBackend::new(client.clone(), resolver.clone(), builder, signer)
            .with_lookup_table(config.address_lookup_table);
        if let Some(private) = components.private_rpc {
            backend = backend.with_private_rpc(private);
        }
        if let Some(external) = components.external {
            backend = backend.with_external(external);
        }
        if let Some(bundle) = components.bundle {
            backend = backend.with_bundle_submitter(bundle);
        }

        Self {
            payer,
            safety: SafetyConfig::from(&config),
            config,
            client,
            registry,
            resolver,
            aggregator: Arc::new(aggregator),
            slippage,
            oracle: components.oracle,
            orchestrator: ExecutionFallbackOrchestrator::new(Arc::new(backend)),
            gate: QuoteGate::new(),
        }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.orchestrator = self.orchestrator.with_observer(observer);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<DexAccountResolver> {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn slippage_estimator(&self) -> &Arc<DynamicSlippageEstimator> {
        &self.slippage
    }

    // ==================== 报价 ====================

    /// One aggregation cycle with the configured base slippage as the venue hint.
    pub async fn quote(&self, input_mint: &Pubkey, output_mint: &Pubkey, amount: u64) -> RouterResult<AggregatedQuotes> {
        let hint_bps = self.config.slippage.base_bps.min(u16::MAX as u64) as u16;
        self.quote_with_slippage(input_mint, output_mint, amount, hint_bps).await
    }

    /// One aggregation cycle with a caller-chosen slippage hint. Pools named by the quotes
    /// are remembered for resolution.
    pub async fn quote_with_slippage(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_hint_bps: u16,
    ) -> RouterResult<AggregatedQuotes> {
        let quotes = self.aggregator.quote(input_mint, output_mint, amount, slippage_hint_bps).await?;

        for quote in quotes.native_quotes() {
            if let Some(pool) = quote.pool {
                self.registry.register(quote.venue, input_mint, output_mint, pool);
            }
        }
        self.observe_market(&quotes);
        Ok(quotes)
    }

    /// [`Self::quote`] behind the request gate: `None` when the same request is already in flight.
    pub async fn quote_latest(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        selection: VenueSelection,
    ) -> Option<RouterResult<AggregatedQuotes>> {
        let key = QuoteKey::new(*input_mint, *output_mint, amount, selection);
        self.gate
            .run(key, async move {
                let quotes = self.quote(input_mint, output_mint, amount).await?;
                Ok(select_venue(quotes, selection))
            })
            .await
    }

    /// Re-quote every `refresh_interval` until the handle is dropped.
    pub fn auto_refresh<F>(self: &Arc<Self>, input_mint: Pubkey, output_mint: Pubkey, amount: u64, on_quote: F) -> RefreshHandle
    where
        F: Fn(RouterResult<AggregatedQuotes>) + Send + Sync + 'static,
    {
        let scheduler = RefreshScheduler::new(self.config.refresh_interval);
        let router = self.clone();
        let on_quote = Arc::new(on_quote);
        scheduler.spawn(move || {
            let router = router.clone();
            let on_quote = on_quote.clone();
            async move {
                let result = router.quote(&input_mint, &output_mint, amount).await;
                on_quote(result);
            }
        })
    }

    /// Feed the spread between native and benchmark output, and the winning latency, into the EMA.
    fn observe_market(&self, quotes: &AggregatedQuotes) {
        let (Some(best), Some(benchmark)) = (&quotes.best_venue, &quotes.benchmark) else {
            return;
        };
        if benchmark.out_amount == 0 {
            return;
        }
        let spread_bps = (best.out_amount as f64 - benchmark.out_amount as f64).abs() / benchmark.out_amount as f64 * 10_000.0;
        let latency_ms = best.latency_ms.unwrap_or_default() as f64;
        self.slippage
            .observe(&pair_key(&quotes.request.input_mint, &quotes.request.output_mint), spread_bps, latency_ms);
    }

    // ==================== 路由判定 ====================

    pub async fn preview(&self, input_mint: &Pubkey, output_mint: &Pubkey, amount: u64) -> RouterResult<RoutePreview> {
        let quotes = self.quote(input_mint, output_mint, amount).await?;
        self.decide_route(quotes).await
    }

    /// Safety checks on the best native quote, then [`decide`].
    ///
    /// Stale quotes and oracle divergence are errors; a non-competitive native quote only
    /// moves the route off native.
    pub async fn decide_route(&self, quotes: AggregatedQuotes) -> RouterResult<RoutePreview> {
        let request = quotes.request;
        let (input_decimals, output_decimals) = self.mint_decimals(&request.input_mint, &request.output_mint).await?;

        let (input, safety) = match &quotes.best_venue {
            Some(best) => {
                let oracle = self.oracle_context(&request.input_mint, &request.output_mint, input_decimals, output_decimals).await;
                let safety = check_quote_safety(best, request.amount, quotes.benchmark.as_ref(), &oracle, &self.safety)?;
                let has_dex_plan = safety.competitive && self.has_dex_plan(best.venue, &request.input_mint, &request.output_mint).await;
                let input = RouteEligibilityInput {
                    has_provider: true,
                    is_fallback_route: best.via_mint.is_some(),
                    has_input_token: input_decimals.is_some(),
                    has_output_token: output_decimals.is_some(),
                    has_dex_plan,
                    quote_out_amount: best.out_amount,
                };
                (input, Some(safety))
            }
            None => {
                let input = RouteEligibilityInput {
                    has_provider: false,
                    has_input_token: input_decimals.is_some(),
                    has_output_token: output_decimals.is_some(),
                    quote_out_amount: quotes.best().map(|q| q.out_amount).unwrap_or_default(),
                    ..Default::default()
                };
                (input, None)
            }
        };

        let decision = decide(&input);
        let expected_out = match decision.mode {
            RouteMode::Native => quotes.best_venue.as_ref().map(|q| q.out_amount),
            _ => quotes.best().map(|q| q.out_amount),
        }
        .unwrap_or_default();
        let slippage_bps = quotes.slippage.map(|s| s.total_bps).unwrap_or(self.config.slippage.base_bps);
        // zero expected output is caught by the decider; min_out stays 0 there
        let min_out = trading::slippage::min_out(expected_out, slippage_bps).unwrap_or_default();

        info!(
            mode = ?decision.mode,
            reason = %decision.reason,
            expected_out,
            slippage_bps,
            score_bps = ?safety.and_then(|s| s.score_bps),
            "route decided"
        );
        Ok(RoutePreview { quotes, decision, safety, expected_out, slippage_bps, min_out })
    }

    async fn mint_decimals(&self, input_mint: &Pubkey, output_mint: &Pubkey) -> RouterResult<(Option<u8>, Option<u8>)> {
        let accounts = self.client.get_multiple_accounts(&[*input_mint, *output_mint]).await?;
        let decimals = |i: usize| accounts.get(i).and_then(|a| a.as_ref()).and_then(|a| mint_decimals_decode(&a.data));
        Ok((decimals(0), decimals(1)))
    }

    async fn oracle_context(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        input_decimals: Option<u8>,
        output_decimals: Option<u8>,
    ) -> OracleContext {
        let mut context = OracleContext {
            input_decimals: input_decimals.unwrap_or_default(),
            output_decimals: output_decimals.unwrap_or_default(),
            ..Default::default()
        };
        let Some(oracle) = &self.oracle else {
            return context;
        };
        let (input_price, output_price) = futures::join!(oracle.price(input_mint), oracle.price(output_mint));
        let price = |mint: &Pubkey, result: RouterResult<Option<quote::OraclePrice>>| match result {
            Ok(price) => price.map(|p| p.price),
            Err(e) => {
                warn!(%mint, error = %e, "oracle price unavailable");
                None
            }
        };
        context.input_price = price(input_mint, input_price);
        context.output_price = price(output_mint, output_price);
        context
    }

    async fn has_dex_plan(&self, venue: Venue, input_mint: &Pubkey, output_mint: &Pubkey) -> bool {
        match self.resolver.resolve(venue, input_mint, output_mint, &self.payer.pubkey()).await {
            Ok(_) => true,
            Err(e) => {
                debug!(venue = %venue, error = %e, "no native plan");
                false
            }
        }
    }

    // ==================== 执行 ====================

    /// Run the fallback chain for a previewed route. Never errors; the outcome carries the failure.
    pub async fn execute(&self, preview: &RoutePreview) -> ExecutionOutcome {
        let request = ExecutionRequest {
            user: self.payer.pubkey(),
            input_mint: preview.quotes.request.input_mint,
            output_mint: preview.quotes.request.output_mint,
            amount_in: preview.quotes.request.amount,
            expected_out: preview.expected_out,
            slippage_bps: preview.slippage_bps,
            venue: preview.venue(),
        };
        self.orchestrator.execute(&preview.decision, &request).await
    }

    /// Quote, decide and execute. Errors only when no route can be priced.
    pub async fn swap(&self, input_mint: &Pubkey, output_mint: &Pubkey, amount: u64) -> RouterResult<SwapReport> {
        let preview = self.preview(input_mint, output_mint, amount).await?;
        let outcome = self.execute(&preview).await;
        Ok(SwapReport { preview, outcome })
    }
}

/// Narrow an aggregation to one venue (plus the benchmark).
fn select_venue(mut quotes: AggregatedQuotes, selection: VenueSelection) -> AggregatedQuotes {
    if let VenueSelection::Only(venue) = selection {
        quotes.quotes.retain(|q| q.venue == venue || !q.is_native());
        quotes.best_venue = quotes.quotes.iter().find(|q| q.is_native()).cloned();
    }
    quotes
}
