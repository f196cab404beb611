//! Pool 定位
//!
//! 查找顺序：
//! 1. `PoolRegistry`：配置里的池子 + 报价返回的 pool hint（内存，无 RPC）
//! 2. `ProgramAccountsLocator`：`getProgramAccounts` + mint memcmp 过滤，两种 mint 顺序都查

use crate::common::{ChainClient, RouterError, RouterResult, Venue};
use crate::instruction::utils::{
    meteora_dlmm, meteora_dlmm_types, orca_whirlpool, orca_whirlpool_types, raydium_amm_v4,
    raydium_amm_v4_types, raydium_clmm, raydium_clmm_types, raydium_cpmm, raydium_cpmm_types,
};
use async_trait::async_trait;
use dashmap::DashMap;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait PoolLocator: Send + Sync {
    /// Pool of `venue` trading `mint_a` against `mint_b`, in either order.
    async fn locate(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> RouterResult<Option<Pubkey>>;
}

/// Order-independent mint pair.
pub fn sorted_pair(a: &Pubkey, b: &Pubkey) -> (Pubkey, Pubkey) {
    if a <= b { (*a, *b) } else { (*b, *a) }
}

/// `venue:mintA:mintB:pool`, as used by `SWAP_ROUTER_POOLS`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolEntry {
    pub venue: Venue,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub pool: Pubkey,
}

impl FromStr for PoolEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
        let [venue, mint_a, mint_b, pool] = parts.as_slice() else {
            return Err(format!("Invalid pool entry '{}', expected venue:mintA:mintB:pool", s));
        };
        let key = |v: &str| Pubkey::from_str(v).map_err(|e| format!("Invalid pubkey '{}': {}", v, e));
        Ok(Self {
            venue: venue.parse()?,
            mint_a: key(*mint_a)?,
            mint_b: key(*mint_b)?,
            pool: key(*pool)?,
        })
    }
}

#[derive(Default)]
pub struct PoolRegistry {
    pools: DashMap<(Venue, Pubkey, Pubkey), Pubkey>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[PoolEntry]) -> Self {
        let registry = Self::new();
        for entry in entries {
            registry.register(entry.venue, &entry.mint_a, &entry.mint_b, entry.pool);
        }
        registry
    }

    pub fn register(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey, pool: Pubkey) {
        let (lo, hi) = sorted_pair(mint_a, mint_b);
        self.pools.insert((venue, lo, hi), pool);
    }

    pub fn get(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> Option<Pubkey> {
        let (lo, hi) = sorted_pair(mint_a, mint_b);
        self.pools.get(&(venue, lo, hi)).map(|p| *p)
    }

    pub fn remove(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> Option<Pubkey> {
        let (lo, hi) = sorted_pair(mint_a, mint_b);
        self.pools.remove(&(venue, lo, hi)).map(|(_, pool)| pool)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[async_trait]
impl PoolLocator for PoolRegistry {
    async fn locate(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> RouterResult<Option<Pubkey>> {
        Ok(self.get(venue, mint_a, mint_b))
    }
}

/// Discovers pools with `getProgramAccounts` memcmp filters on the mint fields.
pub struct ProgramAccountsLocator {
    client: Arc<dyn ChainClient>,
}

impl ProgramAccountsLocator {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    fn filters(venue: Venue, first: &Pubkey, second: &Pubkey) -> Option<(Vec<(usize, Vec<u8>)>, u64)> {
        let found = match venue {
            Venue::RaydiumAmmV4 => {
                (raydium_amm_v4::mint_filters(first, second), raydium_amm_v4_types::AMM_INFO_SIZE)
            }
            Venue::RaydiumCpmm => {
                (raydium_cpmm::mint_filters(first, second), raydium_cpmm_types::POOL_STATE_SIZE)
            }
            Venue::RaydiumClmm => {
                (raydium_clmm::mint_filters(first, second), raydium_clmm_types::POOL_STATE_SIZE)
            }
            Venue::OrcaWhirlpool => {
                (orca_whirlpool::mint_filters(first, second), orca_whirlpool_types::WHIRLPOOL_SIZE)
            }
            Venue::MeteoraDlmm => {
                (meteora_dlmm::mint_filters(first, second), meteora_dlmm_types::LB_PAIR_SIZE)
            }
            Venue::Jupiter => return None,
        };
        Some((found.0, found.1 as u64))
    }
}

#[async_trait]
impl PoolLocator for ProgramAccountsLocator {
    async fn locate(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> RouterResult<Option<Pubkey>> {
        let program_id = venue
            .program_id()
            .ok_or_else(|| RouterError::VenueUnsupported(venue.to_string()))?;
        for (first, second) in [(mint_a, mint_b), (mint_b, mint_a)] {
            let Some((filters, size)) = Self::filters(venue, first, second) else {
                return Err(RouterError::VenueUnsupported(venue.to_string()));
            };
            let found = self
                .client
                .get_program_accounts_with_memcmp(&program_id, filters, Some(size))
                .await?;
            if let Some((pool, _)) = found.first() {
                debug!(venue = %venue, pool = %pool, candidates = found.len(), "pool discovered");
                return Ok(Some(*pool));
            }
        }
        Ok(None)
    }
}

/// Tries each locator in order and returns the first hit.
pub struct LocatorChain {
    locators: Vec<Arc<dyn PoolLocator>>,
}

impl LocatorChain {
    pub fn new(locators: Vec<Arc<dyn PoolLocator>>) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl PoolLocator for LocatorChain {
    async fn locate(&self, venue: Venue, mint_a: &Pubkey, mint_b: &Pubkey) -> RouterResult<Option<Pubkey>> {
        for locator in &self.locators {
            if let Some(pool) = locator.locate(venue, mint_a, mint_b).await? {
                return Ok(Some(pool));
            }
        }
        Ok(None)
    }
}
