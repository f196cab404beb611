//! DEX 账户解析
//!
//! `resolve(venue, input, output, user)` 返回 venue swap 指令需要的完整账户集合。
//!
//! - 池子元数据按无序 mint 对缓存（A→B 和 B→A 共用一条），默认 60s
//! - 失败结果负缓存，默认 15s
//! - 同一对 mint 的并发解析合并成一次 fetch
//! - OpenBook 市场账户单独缓存，默认 5 分钟
//! - 每次 miss 最多 `max_fetch_attempts` 次尝试（只重试 RPC 错误）
//! - 用户 ATA 每次调用时派生，不进缓存

pub mod accounts;
pub mod cache;
pub mod locator;

pub use accounts::{
    DexAccounts, DexAccountsMeta, MeteoraDlmmAccounts, OrcaWhirlpoolAccounts, PoolSide,
    PoolSnapshot, RaydiumAmmV4Accounts, RaydiumClmmAccounts, RaydiumCpmmAccounts,
};
pub use cache::{CacheEntry, TtlCache};
pub use locator::{
    LocatorChain, PoolEntry, PoolLocator, PoolRegistry, ProgramAccountsLocator, sorted_pair,
};

use crate::common::{ChainClient, RouterConfig, RouterError, RouterResult, Venue};
use crate::constants::TOKEN_PROGRAM_2022;
use crate::instruction::utils::{
    meteora_dlmm, meteora_dlmm_types, openbook, orca_whirlpool, orca_whirlpool_types,
    raydium_amm_v4, raydium_amm_v4_types, raydium_clmm, raydium_clmm_types, raydium_cpmm_types,
};
use accounts::{array_candidates, existing_prefix, pad_tick_arrays};
use openbook::MarketAccounts;
use solana_sdk::{account::Account, pubkey::Pubkey};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub pool_ttl: Duration,
    pub negative_ttl: Duration,
    pub market_ttl: Duration,
    pub rpc_timeout: Duration,
    pub max_fetch_attempts: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pool_ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(15),
            market_ttl: Duration::from_secs(300),
            rpc_timeout: Duration::from_secs(3),
            max_fetch_attempts: 2,
        }
    }
}

impl From<&RouterConfig> for ResolverConfig {
    fn from(config: &RouterConfig) -> Self {
        Self {
            pool_ttl: config.pool_cache_ttl,
            negative_ttl: config.negative_cache_ttl,
            market_ttl: config.market_cache_ttl,
            rpc_timeout: config.rpc_timeout,
            max_fetch_attempts: config.max_fetch_attempts.max(1),
        }
    }
}

/// Cache key: venue plus the mint pair in sorted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub venue: Venue,
    pub mint_lo: Pubkey,
    pub mint_hi: Pubkey,
}

impl PoolKey {
    pub fn new(venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> Self {
        let (mint_lo, mint_hi) = sorted_pair(mint_a, mint_b);
        Self { venue, mint_lo, mint_hi }
    }
}

pub struct DexAccountResolver {
    fetcher: Arc<PoolFetcher>,
    pools: TtlCache<PoolKey, Arc<PoolSnapshot>>,
}

impl DexAccountResolver {
    pub fn new(client: Arc<dyn ChainClient>, locator: Arc<dyn PoolLocator>, config: ResolverConfig) -> Self {
        let markets = TtlCache::new(config.market_ttl, config.negative_ttl);
        let pools = TtlCache::new(config.pool_ttl, config.negative_ttl);
        Self { fetcher: Arc::new(PoolFetcher { client, locator, markets, config }), pools }
    }

    /// Registry first, then `getProgramAccounts` discovery.
    pub fn with_registry(
        client: Arc<dyn ChainClient>,
        registry: Arc<PoolRegistry>,
        config: ResolverConfig,
    ) -> Self {
        let discovery: Arc<dyn PoolLocator> = Arc::new(ProgramAccountsLocator::new(client.clone()));
        let registry: Arc<dyn PoolLocator> = registry;
        Self::new(client, Arc::new(LocatorChain::new(vec![registry, discovery])), config)
    }

    pub async fn resolve(
        &self,
        venue: Venue,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        user: &Pubkey,
    ) -> RouterResult<DexAccounts> {
        if input_mint == output_mint {
            return Err(RouterError::AccountNotFound(format!(
                "input and output mint are both {}",
                input_mint
            )));
        }
        let snapshot = self.snapshot(venue, input_mint, output_mint).await?;
        snapshot.to_dex_accounts(input_mint, output_mint, user)
    }

    /// Cached, direction-independent pool metadata for the pair.
    pub async fn snapshot(
        &self,
        venue: Venue,
        mint_a: &Pubkey,
        mint_b: &Pubkey,
    ) -> RouterResult<Arc<PoolSnapshot>> {
        if !venue.is_native() {
            return Err(RouterError::VenueUnsupported(venue.to_string()));
        }
        let key = PoolKey::new(venue, mint_a, mint_b);
        let fetcher = self.fetcher.clone();
        self.pools.get_or_fetch(key, move || fetcher.fetch_with_retry(key)).await
    }

    pub fn invalidate(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) {
        self.pools.invalidate(&PoolKey::new(venue, mint_a, mint_b));
    }

    pub fn clear(&self) {
        self.pools.clear();
        self.fetcher.markets.clear();
    }

    pub fn cached_pools(&self) -> usize {
        self.pools.len()
    }
}

struct PoolFetcher {
    client: Arc<dyn ChainClient>,
    locator: Arc<dyn PoolLocator>,
    markets: TtlCache<Pubkey, MarketAccounts>,
    config: ResolverConfig,
}

async fn with_timeout<T>(timeout: Duration, fut: impl Future<Output = RouterResult<T>>) -> RouterResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RouterError::RpcError(format!("request timed out after {:?}", timeout))),
    }
}

fn malformed(venue: Venue, key: &Pubkey) -> RouterError {
    RouterError::AccountResolutionFailed(format!("malformed {} account {}", venue, key))
}

impl PoolFetcher {
    async fn fetch_with_retry(self: Arc<Self>, key: PoolKey) -> RouterResult<Arc<PoolSnapshot>> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(&key).await {
                Ok(snapshot) => {
                    debug!(venue = %key.venue, pool = %snapshot.pool(), attempt, "pool resolved");
                    return Ok(Arc::new(snapshot));
                }
                Err(RouterError::RpcError(e)) if attempt < self.config.max_fetch_attempts => {
                    warn!(venue = %key.venue, attempt, error = %e, "pool fetch failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    warn!(venue = %key.venue, mint_a = %key.mint_lo, mint_b = %key.mint_hi, error = %e, "pool resolution failed");
                    return Err(e);
                }
            }
        }
    }

    async fn get_multiple(&self, keys: &[Pubkey]) -> RouterResult<Vec<Option<Account>>> {
        with_timeout(self.config.rpc_timeout, self.client.get_multiple_accounts(keys)).await
    }

    async fn fetch_once(&self, key: &PoolKey) -> RouterResult<PoolSnapshot> {
        let venue = key.venue;
        let program_id =
            venue.program_id().ok_or_else(|| RouterError::VenueUnsupported(venue.to_string()))?;

        let pool = with_timeout(
            self.config.rpc_timeout,
            self.locator.locate(venue, &key.mint_lo, &key.mint_hi),
        )
        .await?
        .ok_or_else(|| {
            RouterError::AccountNotFound(format!("no {} pool for {} / {}", venue, key.mint_lo, key.mint_hi))
        })?;

        // 第一批：pool 本身
        let account = self
            .get_multiple(&[pool])
            .await?
            .pop()
            .flatten()
            .ok_or_else(|| RouterError::AccountNotFound(format!("{} pool {}", venue, pool)))?;
        if account.owner != program_id {
            return Err(RouterError::AccountNotFound(format!(
                "{} is owned by {}, not {}",
                pool, account.owner, program_id
            )));
        }
        let data = account.data;

        match venue {
            Venue::RaydiumAmmV4 => {
                let info = raydium_amm_v4_types::amm_info_decode(&data).ok_or_else(|| malformed(venue, &pool))?;
                ensure_pair(key, &pool, &info.coin_mint, &info.pc_mint)?;
                if !raydium_amm_v4::is_pool_tradeable(info.status) {
                    return Err(RouterError::AccountResolutionFailed(format!(
                        "raydium_amm_v4 pool {} is not tradeable (status {})",
                        pool, info.status
                    )));
                }
                let market = self.market(info.market, info.serum_dex).await?;
                Ok(PoolSnapshot::RaydiumAmmV4 { pool, info, market })
            }
            Venue::RaydiumCpmm => {
                let state = raydium_cpmm_types::pool_state_decode(&data).ok_or_else(|| malformed(venue, &pool))?;
                ensure_pair(key, &pool, &state.token0_mint, &state.token1_mint)?;
                Ok(PoolSnapshot::RaydiumCpmm { pool, state })
            }
            Venue::RaydiumClmm => {
                let state = raydium_clmm_types::pool_state_decode(&data).ok_or_else(|| malformed(venue, &pool))?;
                ensure_pair(key, &pool, &state.token_mint0, &state.token_mint1)?;
                let (down, up) = array_candidates(venue, &pool, state.tick_current, state.tick_spacing);
                let batch = self.second_batch(&[state.token_mint0, state.token_mint1], &[&down, &up]).await?;
                let bitmap = raydium_clmm::get_tick_array_bitmap_extension_pda(&pool)
                    .ok_or_else(|| malformed(venue, &pool))?;
                Ok(PoolSnapshot::RaydiumClmm {
                    pool,
                    token_program0: batch.owner_of(&state.token_mint0)?,
                    token_program1: batch.owner_of(&state.token_mint1)?,
                    tick_array_bitmap_extension: bitmap,
                    tick_arrays_zero_for_one: existing_prefix(&down, |k| batch.exists(k)),
                    tick_arrays_one_for_zero: existing_prefix(&up, |k| batch.exists(k)),
                    state,
                })
            }
            Venue::OrcaWhirlpool => {
                let state = orca_whirlpool_types::whirlpool_decode(&data).ok_or_else(|| malformed(venue, &pool))?;
                ensure_pair(key, &pool, &state.token_mint_a, &state.token_mint_b)?;
                let (down, up) = array_candidates(venue, &pool, state.tick_current_index, state.tick_spacing);
                let batch = self.second_batch(&[state.token_mint_a, state.token_mint_b], &[&down, &up]).await?;
                let oracle = orca_whirlpool::get_oracle_pda(&pool).ok_or_else(|| malformed(venue, &pool))?;
                let token_program_a = batch.owner_of(&state.token_mint_a)?;
                let token_program_b = batch.owner_of(&state.token_mint_b)?;
                // 这里只拼 v1 `swap`，它只带 SPL Token program
                for (mint, program) in [(&state.token_mint_a, token_program_a), (&state.token_mint_b, token_program_b)] {
                    if program == TOKEN_PROGRAM_2022 {
                        return Err(RouterError::VenueUnsupported(format!(
                            "whirlpool {} trades token-2022 mint {}",
                            pool, mint
                        )));
                    }
                }
                Ok(PoolSnapshot::OrcaWhirlpool {
                    pool,
                    token_program_a,
                    token_program_b,
                    oracle,
                    tick_arrays_a_to_b: pad_tick_arrays(&existing_prefix(&down, |k| batch.exists(k))),
                    tick_arrays_b_to_a: pad_tick_arrays(&existing_prefix(&up, |k| batch.exists(k))),
                    state,
                })
            }
            Venue::MeteoraDlmm => {
                let state = meteora_dlmm_types::lb_pair_decode(&data).ok_or_else(|| malformed(venue, &pool))?;
                ensure_pair(key, &pool, &state.token_x_mint, &state.token_y_mint)?;
                let (down, up) = array_candidates(venue, &pool, state.active_id, state.bin_step);
                let bitmap =
                    meteora_dlmm::get_bitmap_extension_pda(&pool).ok_or_else(|| malformed(venue, &pool))?;
                let event_authority =
                    meteora_dlmm::get_event_authority_pda().ok_or_else(|| malformed(venue, &pool))?;
                let batch = self
                    .second_batch(&[state.token_x_mint, state.token_y_mint, bitmap], &[&down, &up])
                    .await?;
                Ok(PoolSnapshot::MeteoraDlmm {
                    pool,
                    token_x_program: batch.owner_of(&state.token_x_mint)?,
                    token_y_program: batch.owner_of(&state.token_y_mint)?,
                    bin_array_bitmap_extension: batch.exists(&bitmap).then_some(bitmap),
                    event_authority,
                    bin_arrays_x_to_y: existing_prefix(&down, |k| batch.exists(k)),
                    bin_arrays_y_to_x: existing_prefix(&up, |k| batch.exists(k)),
                    state: Box::new(state),
                })
            }
            Venue::Jupiter => Err(RouterError::VenueUnsupported(venue.to_string())),
        }
    }

    /// 第二批：mint / 可选账户 / tick 或 bin array，一次 getMultipleAccounts
    async fn second_batch(&self, required: &[Pubkey], candidates: &[&Vec<Pubkey>]) -> RouterResult<Batch> {
        let mut keys: Vec<Pubkey> = required.to_vec();
        for key in candidates.iter().flat_map(|list| list.iter()) {
            if !keys.contains(key) {
                keys.push(*key);
            }
        }
        let accounts = self.get_multiple(&keys).await?;
        let owners = keys
            .into_iter()
            .zip(accounts)
            .filter_map(|(key, account)| account.map(|a| (key, a.owner)))
            .collect();
        Ok(Batch { owners })
    }

    async fn market(&self, market: Pubkey, program: Pubkey) -> RouterResult<MarketAccounts> {
        let client = self.client.clone();
        let timeout = self.config.rpc_timeout;
        self.markets
            .get_or_fetch(market, move || async move {
                let account = with_timeout(timeout, client.get_account(&market))
                    .await?
                    .ok_or_else(|| RouterError::AccountNotFound(format!("openbook market {}", market)))?;
                let state = openbook::market_state_decode(&account.data)
                    .ok_or_else(|| malformed(Venue::RaydiumAmmV4, &market))?;
                MarketAccounts::from_state(market, program, &state).ok_or_else(|| {
                    RouterError::AccountResolutionFailed(format!("invalid vault signer nonce for market {}", market))
                })
            })
            .await
    }
}

struct Batch {
    owners: HashMap<Pubkey, Pubkey>,
}

impl Batch {
    fn exists(&self, key: &Pubkey) -> bool {
        self.owners.contains_key(key)
    }

    fn owner_of(&self, key: &Pubkey) -> RouterResult<Pubkey> {
        self.owners
            .get(key)
            .copied()
            .ok_or_else(|| RouterError::AccountNotFound(format!("mint {}", key)))
    }
}

fn ensure_pair(key: &PoolKey, pool: &Pubkey, mint0: &Pubkey, mint1: &Pubkey) -> RouterResult<()> {
    if sorted_pair(mint0, mint1) == (key.mint_lo, key.mint_hi) {
        Ok(())
    } else {
        Err(RouterError::AccountNotFound(format!(
            "{} pool {} holds {} / {}, not {} / {}",
            key.venue, pool, mint0, mint1, key.mint_lo, key.mint_hi
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::{MockChainClient, fixtures};

    fn resolver(mock: &Arc<MockChainClient>, registry: Arc<PoolRegistry>) -> DexAccountResolver {
        DexAccountResolver::new(mock.clone(), registry, ResolverConfig::default())
    }

    #[tokio::test]
    async fn test_jupiter_is_unsupported() {
        let mock = Arc::new(MockChainClient::new());
        let resolver = resolver(&mock, Arc::new(PoolRegistry::new()));
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let err = resolver.resolve(Venue::Jupiter, &a, &b, &Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(err, RouterError::VenueUnsupported(_)));
        assert_eq!(mock.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_pool_without_requested_mint_is_not_found() {
        let mock = Arc::new(MockChainClient::new());
        let registry = Arc::new(PoolRegistry::new());
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let seeded = fixtures::seed_pool(&mock, Venue::RaydiumCpmm, a, b, (1, 1));
        // registry 指向了一个不含 c 的池子
        registry.register(Venue::RaydiumCpmm, &a, &c, seeded.pool);

        let err = resolver(&mock, registry).resolve(Venue::RaydiumCpmm, &a, &c, &Pubkey::new_unique()).await;
        assert!(matches!(err, Err(RouterError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_whirlpool_repeats_last_existing_tick_array() {
        let mock = Arc::new(MockChainClient::new());
        let registry = Arc::new(PoolRegistry::new());
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let seeded = fixtures::seed_pool(&mock, Venue::OrcaWhirlpool, a, b, (1, 1));
        registry.register(Venue::OrcaWhirlpool, &a, &b, seeded.pool);

        // a→b 方向：保留当前 tick array，删掉后面两个
        let starts = orca_whirlpool::swap_tick_array_start_indexes(100, 64, true);
        for start in &starts[1..] {
            mock.remove_account(&orca_whirlpool::get_tick_array_pda(&seeded.pool, *start).unwrap());
        }
        let current = orca_whirlpool::get_tick_array_pda(&seeded.pool, starts[0]).unwrap();

        let accounts = resolver(&mock, registry).resolve(Venue::OrcaWhirlpool, &a, &b, &Pubkey::new_unique()).await.unwrap();
        let DexAccounts::OrcaWhirlpool(whirlpool) = accounts else { panic!("wrong venue") };
        assert!(whirlpool.a_to_b());
        assert_eq!(whirlpool.tick_arrays, [current, current, current]);
    }

    #[tokio::test]
    async fn test_whirlpool_rejects_token_2022_mint() {
        let mock = Arc::new(MockChainClient::new());
        let registry = Arc::new(PoolRegistry::new());
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let seeded = fixtures::seed_pool(&mock, Venue::OrcaWhirlpool, a, b, (1, 1));
        registry.register(Venue::OrcaWhirlpool, &a, &b, seeded.pool);
        mock.set_account(b, TOKEN_PROGRAM_2022, fixtures::mint_data(6));

        let err = resolver(&mock, registry).resolve(Venue::OrcaWhirlpool, &a, &b, &Pubkey::new_unique()).await;
        assert!(matches!(err, Err(RouterError::VenueUnsupported(ref m)) if m.contains(&b.to_string())));
    }

    #[tokio::test]
    async fn test_missing_tick_arrays_fail_resolution() {
        let mock = Arc::new(MockChainClient::new());
        let registry = Arc::new(PoolRegistry::new());
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let seeded = fixtures::seed_pool(&mock, Venue::RaydiumClmm, a, b, (1, 1));
        registry.register(Venue::RaydiumClmm, &a, &b, seeded.pool);
        for key in &seeded.arrays {
            mock.remove_account(key);
        }

        let err = resolver(&mock, registry).resolve(Venue::RaydiumClmm, &a, &b, &Pubkey::new_unique()).await;
        assert!(matches!(err, Err(RouterError::AccountResolutionFailed(_))));
    }
}
