//! 链上恒定乘积报价
//!
//! Raydium AMM v4 / CPMM 直接读金库余额计算：
//! `fee = ceil(amount * fee_rate)`，`out = reserve_out * net / (reserve_in + net)`

use super::{QuoteRequest, QuoteSource, VenueQuote};
use crate::common::{ChainClient, RouterError, RouterResult, Venue};
use crate::instruction::utils::raydium_amm_v4::accounts::{TRADE_FEE_DENOMINATOR, TRADE_FEE_NUMERATOR};
use crate::instruction::utils::raydium_cpmm::accounts::{FEE_RATE_DENOMINATOR_VALUE, TRADE_FEE_RATE};
use crate::instruction::utils::raydium_cpmm_types::amm_config_decode;
use crate::instruction::utils::spl_token::token_account_decode;
use crate::resolver::{DexAccountResolver, PoolSnapshot};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Exact-in constant product swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantProductQuote {
    pub amount_out: u64,
    pub fee_amount: u64,
    pub price_impact_bps: u64,
}

pub fn constant_product_exact_in(
    amount_in: u64,
    reserve_in: u64,
    reserve_out: u64,
    fee_numerator: u64,
    fee_denominator: u64,
) -> Option<ConstantProductQuote> {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 || fee_denominator == 0 {
        return None;
    }
    let amount = amount_in as u128;
    let fee = (amount * fee_numerator as u128).div_ceil(fee_denominator as u128);
    let net = amount.checked_sub(fee)?;
    let denominator = reserve_in as u128 + net;
    let amount_out = (reserve_out as u128 * net / denominator) as u64;
    let price_impact_bps = (net * 10_000 / denominator) as u64;
    Some(ConstantProductQuote { amount_out, fee_amount: fee as u64, price_impact_bps })
}

/// 只支持恒定乘积 venue，集中流动性池需要 tick 数据，不在这里报价
pub struct OnChainQuoteSource {
    resolver: Arc<DexAccountResolver>,
    client: Arc<dyn ChainClient>,
    venues: Vec<Venue>,
}

impl OnChainQuoteSource {
    pub fn new(resolver: Arc<DexAccountResolver>, client: Arc<dyn ChainClient>) -> Self {
        Self { resolver, client, venues: vec![Venue::RaydiumAmmV4, Venue::RaydiumCpmm] }
    }

    pub fn with_venues(mut self, venues: Vec<Venue>) -> Self {
        self.venues = venues.into_iter().filter(|v| Self::supports(*v)).collect();
        self
    }

    pub fn supports(venue: Venue) -> bool {
        matches!(venue, Venue::RaydiumAmmV4 | Venue::RaydiumCpmm)
    }

    pub async fn quote_venue(&self, venue: Venue, request: &QuoteRequest) -> RouterResult<VenueQuote> {
        if !Self::supports(venue) {
            return Err(RouterError::VenueUnsupported(venue.to_string()));
        }
        let snapshot = self.resolver.snapshot(venue, &request.input_mint, &request.output_mint).await?;
        let (base, quote) = snapshot.sides();
        let input_is_base = base.mint == request.input_mint;

        let mut keys = vec![base.vault, quote.vault];
        if let PoolSnapshot::RaydiumCpmm { state, .. } = snapshot.as_ref() {
            keys.push(state.amm_config);
        }
        let accounts = self.client.get_multiple_accounts(&keys).await?;
        let balance = |i: usize| {
            accounts
                .get(i)
                .and_then(|a| a.as_ref())
                .and_then(|a| token_account_decode(&a.data))
                .map(|t| t.amount)
                .ok_or_else(|| RouterError::AccountNotFound(format!("vault {}", keys[i])))
        };
        let (base_reserve, quote_reserve) = (balance(0)?, balance(1)?);
        let (reserve_in, reserve_out) =
            if input_is_base { (base_reserve, quote_reserve) } else { (quote_reserve, base_reserve) };

        let (fee_numerator, fee_denominator) = match snapshot.as_ref() {
            PoolSnapshot::RaydiumAmmV4 { info, .. } if info.fees.swap_fee_denominator > 0 => {
                (info.fees.swap_fee_numerator, info.fees.swap_fee_denominator)
            }
            PoolSnapshot::RaydiumCpmm { .. } => {
                let rate = accounts
                    .get(2)
                    .and_then(|a| a.as_ref())
                    .and_then(|a| amm_config_decode(&a.data))
                    .map(|c| c.trade_fee_rate)
                    .unwrap_or(TRADE_FEE_RATE);
                (rate, FEE_RATE_DENOMINATOR_VALUE)
            }
            _ => (TRADE_FEE_NUMERATOR, TRADE_FEE_DENOMINATOR),
        };

        let result = constant_product_exact_in(request.amount, reserve_in, reserve_out, fee_numerator, fee_denominator)
            .ok_or_else(|| RouterError::StaleOrInvalidQuote(format!("{} pool has no liquidity", venue)))?;
        debug!(venue = %venue, pool = %snapshot.pool(), reserve_in, reserve_out, out = result.amount_out, "on-chain quote");
        Ok(VenueQuote::native(venue, result.amount_out, result.price_impact_bps).with_pool(snapshot.pool()))
    }
}

#[async_trait]
impl QuoteSource for OnChainQuoteSource {
    fn name(&self) -> &str {
        "on-chain"
    }

    /// Venues that fail are dropped; the error surfaces only when all of them fail.
    async fn quote(&self, request: &QuoteRequest) -> RouterResult<Vec<VenueQuote>> {
        let results = join_all(self.venues.iter().map(|venue| self.quote_venue(*venue, request))).await;
        let mut quotes = Vec::with_capacity(results.len());
        let mut last_error = None;
        for result in results {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(e) => last_error = Some(e),
            }
        }
        match (quotes.is_empty(), last_error) {
            (true, Some(e)) => Err(e),
            _ => Ok(quotes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::{MockChainClient, fixtures};
    use crate::resolver::{PoolRegistry, ResolverConfig};
    use solana_sdk::pubkey::Pubkey;

    #[test]
    fn test_constant_product_math() {
        // fee = ceil(1000 * 25 / 10000) = 3, net = 997
        let q = constant_product_exact_in(1_000, 1_000_000, 2_000_000, 25, 10_000).unwrap();
        assert_eq!(q.fee_amount, 3);
        assert_eq!(q.amount_out, 2_000_000 * 997 / 1_000_997);
        assert_eq!(q.price_impact_bps, 9);
        assert!(constant_product_exact_in(0, 1, 1, 25, 10_000).is_none());
        assert!(constant_product_exact_in(1, 0, 1, 25, 10_000).is_none());
    }

    #[tokio::test]
    async fn test_quotes_both_directions_from_vaults() {
        let mock = Arc::new(MockChainClient::new());
        let (sol, usdc) = (Pubkey::new_unique(), Pubkey::new_unique());
        let seeded = fixtures::seed_pool(&mock, Venue::RaydiumCpmm, sol, usdc, (1_000_000_000_000, 150_000_000_000));
        let resolver = Arc::new(DexAccountResolver::with_registry(
            mock.clone(),
            Arc::new(PoolRegistry::new()),
            ResolverConfig::default(),
        ));
        let source = OnChainQuoteSource::new(resolver, mock.clone()).with_venues(vec![Venue::RaydiumCpmm]);

        let sell = source.quote(&QuoteRequest::new(sol, usdc, 1_000_000_000, 50)).await.unwrap();
        assert_eq!(sell.len(), 1);
        assert_eq!(sell[0].pool, Some(seeded.pool));
        let expected = constant_product_exact_in(1_000_000_000, 1_000_000_000_000, 150_000_000_000, 2_500, 1_000_000)
            .unwrap()
            .amount_out;
        assert_eq!(sell[0].out_amount, expected);

        let buy = source.quote(&QuoteRequest::new(usdc, sol, 150_000_000, 50)).await.unwrap();
        assert!(buy[0].out_amount > 0 && buy[0].out_amount < 1_000_000_000);
    }

    #[tokio::test]
    async fn test_unknown_pair_fails() {
        let mock = Arc::new(MockChainClient::new());
        let resolver = Arc::new(DexAccountResolver::with_registry(
            mock.clone(),
            Arc::new(PoolRegistry::new()),
            ResolverConfig::default(),
        ));
        let source = OnChainQuoteSource::new(resolver, mock);
        let result = source.quote(&QuoteRequest::new(Pubkey::new_unique(), Pubkey::new_unique(), 1, 50)).await;
        assert!(result.is_err());
    }
}
