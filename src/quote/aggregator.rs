//! 并发报价聚合
//!
//! 所有来源同时发出请求，每个来源单独限时，整体共享一个截止时间。
//! 等到全部返回或截止时间到达，用已经到达的结果，不是"第一个成功就返回"。

use super::{AggregatedQuotes, QuoteRequest, QuoteSource, QuoteSourceTag, VenueQuote};
use crate::common::{RouterConfig, RouterError, RouterResult, Venue};
use crate::trading::slippage::{DynamicSlippageEstimator, pair_key, size_ratio_from_impact};
use futures::stream::{FuturesUnordered, StreamExt};
use solana_sdk::pubkey::Pubkey;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct AggregatorConfig {
    /// Shared deadline for the whole fan-out.
    pub deadline: Duration,
    pub per_source_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { deadline: Duration::from_secs(22), per_source_timeout: Duration::from_secs(8) }
    }
}

impl From<&RouterConfig> for AggregatorConfig {
    fn from(config: &RouterConfig) -> Self {
        Self { deadline: config.quote_timeout, per_source_timeout: config.per_source_timeout }
    }
}

pub struct VenueQuoteAggregator {
    sources: Vec<Arc<dyn QuoteSource>>,
    benchmark: Option<Arc<dyn QuoteSource>>,
    slippage: Option<Arc<DynamicSlippageEstimator>>,
    config: AggregatorConfig,
}

impl VenueQuoteAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { sources: Vec::new(), benchmark: None, slippage: None, config }
    }

    pub fn with_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Every quote from this source is tagged `Benchmark`, whatever it reports.
    pub fn with_benchmark(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.benchmark = Some(source);
        self
    }

    pub fn with_slippage_estimator(mut self, estimator: Arc<DynamicSlippageEstimator>) -> Self {
        self.slippage = Some(estimator);
        self
    }

    pub fn source_count(&self) -> usize {
        self.sources.len() + usize::from(self.benchmark.is_some())
    }

    pub async fn quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_hint_bps: u16,
    ) -> RouterResult<AggregatedQuotes> {
        let request = QuoteRequest::new(*input_mint, *output_mint, amount, slippage_hint_bps);
        self.quote_request(request).await
    }

    pub async fn quote_request(&self, request: QuoteRequest) -> RouterResult<AggregatedQuotes> {
        if request.amount == 0 || request.input_mint == request.output_mint {
            return Err(RouterError::NoRouteFound);
        }

        let collected = self.collect(&request).await;
        let benchmark = best_benchmark(&collected);
        let quotes = rank_quotes(collected);
        if quotes.is_empty() {
            warn!(input = %request.input_mint, output = %request.output_mint, amount = request.amount, "no venue returned a usable quote");
            return Err(RouterError::NoRouteFound);
        }

        let best_venue = quotes.iter().find(|q| q.is_native()).cloned();
        let slippage = match (&self.slippage, &best_venue) {
            (Some(estimator), Some(best)) => Some(estimator.estimate(
                &pair_key(&request.input_mint, &request.output_mint),
                size_ratio_from_impact(best.price_impact_bps),
            )),
            _ => None,
        };

        info!(
            quotes = quotes.len(),
            best_venue = ?best_venue.as_ref().map(|q| q.venue),
            best_out = best_venue.as_ref().map(|q| q.out_amount).unwrap_or_default(),
            benchmark_out = benchmark.as_ref().map(|q| q.out_amount).unwrap_or_default(),
            "quotes aggregated"
        );
        Ok(AggregatedQuotes { request, quotes, best_venue, benchmark, slippage })
    }

    async fn collect(&self, request: &QuoteRequest) -> Vec<VenueQuote> {
        let deadline = Instant::now() + self.config.deadline;
        let per_source = self.config.per_source_timeout;

        let mut pending: FuturesUnordered<_> = self
            .sources
            .iter()
            .map(|s| (s.clone(), false))
            .chain(self.benchmark.iter().map(|s| (s.clone(), true)))
            .map(|(source, is_benchmark)| async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(per_source, source.quote(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(RouterError::Http(format!("quote timed out after {:?}", per_source))),
                };
                (source, is_benchmark, started.elapsed(), result)
            })
            .collect();

        let mut collected = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, pending.next()).await {
                Ok(Some((source, is_benchmark, elapsed, Ok(quotes)))) => {
                    debug!(source = source.name(), count = quotes.len(), elapsed_ms = elapsed.as_millis() as u64, "quote source answered");
                    let latency_ms = elapsed.as_millis() as u64;
                    collected.extend(quotes.into_iter().map(|mut q| {
                        if is_benchmark {
                            q.source = QuoteSourceTag::Benchmark;
                        }
                        q.latency_ms.get_or_insert(latency_ms);
                        q
                    }));
                }
                Ok(Some((source, _, elapsed, Err(e)))) => {
                    warn!(source = source.name(), elapsed_ms = elapsed.as_millis() as u64, error = %e, "quote source failed");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = pending.len(), "quote deadline reached, using what arrived");
                    break;
                }
            }
        }
        collected
    }
}

/// Best benchmark quote, taken before tie dropping so it survives a tie with a native quote.
pub fn best_benchmark(quotes: &[VenueQuote]) -> Option<VenueQuote> {
    quotes
        .iter()
        .filter(|q| q.source == QuoteSourceTag::Benchmark && q.out_amount > 0)
        .max_by_key(|q| q.out_amount)
        .cloned()
}

/// Drop zero outputs, keep the best per `(venue, source)`, sort descending by output.
///
/// Native venues tied on output all stay, ordered by venue. A benchmark tied with a
/// native quote sorts after it and is dropped.
/// Quotes tagged native for a non-native venue are discarded.
pub fn rank_quotes(quotes: Vec<VenueQuote>) -> Vec<VenueQuote> {
    let mut best: HashMap<(Venue, QuoteSourceTag), VenueQuote> = HashMap::new();
    for quote in quotes {
        if quote.out_amount == 0 {
            continue;
        }
        if quote.source == QuoteSourceTag::Native && !quote.venue.is_native() {
            continue;
        }
        match best.entry((quote.venue, quote.source)) {
            Entry::Occupied(mut existing) => {
                if quote.out_amount > existing.get().out_amount {
                    existing.insert(quote);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(quote);
            }
        }
    }

    let mut ranked: Vec<VenueQuote> = best.into_values().collect();
    ranked.sort_by_key(|q| (Reverse(q.out_amount), q.source, q.venue));
    ranked.dedup_by(|later, earlier| later.out_amount == earlier.out_amount && later.source != earlier.source);
    ranked
}
