use crate::common::{RouterError, RouterResult, Venue};
use crate::instruction::utils::router::accounts::ROUTER_PROGRAM;
use crate::resolver::locator::PoolEntry;
use crate::swqos::jito::{DynamicTipConfig, JitoRegion};
use crate::trading::slippage::SlippageConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "SWAP_ROUTER_";

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_JUPITER_API_URL: &str = "https://lite-api.jup.ag/swap/v1";

/// Submission channel for a signed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionChannel {
    Public,
    Private,
    Jito,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub rpc_url: String,
    /// 私有 RPC（Jito bundle 失败时优先回退到这里）
    pub private_rpc_url: Option<String>,
    pub commitment: CommitmentConfig,

    pub use_jito_bundle: bool,
    pub jito_region: JitoRegion,
    /// Overrides the region endpoint when set.
    pub jito_block_engine_url: Option<String>,
    pub jito_auth_token: Option<String>,
    pub jito_tip_lamports: u64,
    pub dynamic_tip: DynamicTipConfig,

    /// micro-lamports per compute unit
    pub compute_unit_price: u64,
    /// Overrides the per-venue unit limit when set.
    pub compute_unit_limit: Option<u32>,

    pub pool_cache_ttl: Duration,
    pub negative_cache_ttl: Duration,
    pub market_cache_ttl: Duration,
    pub rpc_timeout: Duration,
    pub max_fetch_attempts: u32,

    pub min_venue_score_bps: u64,
    pub max_oracle_divergence_bps: u64,
    pub max_quote_age: Duration,
    pub quote_timeout: Duration,
    pub per_source_timeout: Duration,

    pub plan_ttl: Duration,
    pub create_plan_if_missing: bool,
    pub create_output_ata: bool,
    pub router_program_id: Pubkey,
    pub address_lookup_table: Option<Pubkey>,

    pub venue_api_url: Option<String>,
    pub jupiter_api_url: String,
    pub price_api_url: Option<String>,
    pub http_timeout: Duration,

    pub slippage: SlippageConfig,
    pub debounce: Duration,
    pub refresh_interval: Duration,

    /// Pools known up front, checked before any `getProgramAccounts` discovery.
    pub pools: Vec<PoolEntry>,
    pub enabled_venues: Vec<Venue>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            private_rpc_url: None,
            commitment: CommitmentConfig::confirmed(),
            use_jito_bundle: false,
            jito_region: JitoRegion::Default,
            jito_block_engine_url: None,
            jito_auth_token: None,
            jito_tip_lamports: 10_000,
            dynamic_tip: DynamicTipConfig::default(),
            compute_unit_price: 50_000,
            compute_unit_limit: None,
            pool_cache_ttl: Duration::from_secs(60),
            negative_cache_ttl: Duration::from_secs(15),
            market_cache_ttl: Duration::from_secs(300),
            rpc_timeout: Duration::from_secs(3),
            max_fetch_attempts: 2,
            min_venue_score_bps: 9_950,
            max_oracle_divergence_bps: 300,
            max_quote_age: Duration::from_secs(30),
            quote_timeout: Duration::from_secs(22),
            per_source_timeout: Duration::from_secs(8),
            plan_ttl: Duration::from_secs(90),
            create_plan_if_missing: true,
            create_output_ata: true,
            router_program_id: ROUTER_PROGRAM,
            address_lookup_table: None,
            venue_api_url: None,
            jupiter_api_url: DEFAULT_JUPITER_API_URL.to_string(),
            price_api_url: None,
            http_timeout: Duration::from_secs(8),
            slippage: SlippageConfig::default(),
            debounce: Duration::from_millis(800),
            refresh_interval: Duration::from_secs(30),
            pools: Vec::new(),
            enabled_venues: Venue::NATIVE.to_vec(),
        }
    }
}

impl RouterConfig {
    pub fn new(rpc_url: String) -> Self {
        Self { rpc_url, ..Self::default() }
    }

    /// Read `SWAP_ROUTER_*` environment variables on top of the defaults.
    ///
    /// Unset or empty variables keep the default; unparsable ones fail with `RouterError::Config`.
    pub fn from_env() -> RouterResult<Self> {
        let mut config = Self::default();

        if let Some(v) = env_var("RPC_URL") {
            config.rpc_url = v;
        }
        config.private_rpc_url = env_var("PRIVATE_RPC_URL");
        if let Some(v) = env_var("COMMITMENT") {
            config.commitment = CommitmentConfig::from_str(&v)
                .map_err(|e| RouterError::Config(format!("{}COMMITMENT: {}", ENV_PREFIX, e)))?;
        }

        if let Some(v) = env_parse::<bool>("USE_JITO_BUNDLE")? {
            config.use_jito_bundle = v;
        }
        if let Some(v) = env_var("JITO_REGION") {
            config.jito_region = JitoRegion::from_str(&v).map_err(RouterError::Config)?;
        }
        config.jito_block_engine_url = env_var("JITO_BLOCK_ENGINE_URL");
        config.jito_auth_token = env_var("JITO_AUTH_TOKEN");
        if let Some(v) = env_parse("JITO_TIP_LAMPORTS")? {
            config.jito_tip_lamports = v;
        }
        if let Some(v) = env_parse("COMPUTE_UNIT_PRICE")? {
            config.compute_unit_price = v;
        }
        config.compute_unit_limit = env_parse("COMPUTE_UNIT_LIMIT")?;

        if let Some(v) = env_parse("POOL_CACHE_TTL_SECS")? {
            config.pool_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("NEGATIVE_CACHE_TTL_SECS")? {
            config.negative_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("MARKET_CACHE_TTL_SECS")? {
            config.market_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("MIN_VENUE_SCORE_BPS")? {
            config.min_venue_score_bps = v;
        }
        if let Some(v) = env_parse("MAX_ORACLE_DIVERGENCE_BPS")? {
            config.max_oracle_divergence_bps = v;
        }
        if let Some(v) = env_parse("QUOTE_TIMEOUT_MS")? {
            config.quote_timeout = Duration::from_millis(v);
        }
        if let Some(v) = env_parse("PLAN_TTL_SECS")? {
            config.plan_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<Pubkey>("ROUTER_PROGRAM_ID")? {
            config.router_program_id = v;
        }
        config.address_lookup_table = env_parse("ADDRESS_LOOKUP_TABLE")?;

        config.venue_api_url = env_var("VENUE_API_URL");
        if let Some(v) = env_var("JUPITER_API_URL") {
            config.jupiter_api_url = v;
        }
        config.price_api_url = env_var("PRICE_API_URL");

        if let Some(v) = env_var("VENUES") {
            config.enabled_venues = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Venue>().map_err(RouterError::Config))
                .collect::<RouterResult<Vec<_>>>()?;
        }
        if let Some(v) = env_var("POOLS") {
            config.pools = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<PoolEntry>().map_err(RouterError::Config))
                .collect::<RouterResult<Vec<_>>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RouterResult<()> {
        if self.max_fetch_attempts == 0 {
            return Err(RouterError::Config("max_fetch_attempts must be at least 1".into()));
        }
        if self.slippage.max_total_bps > 10_000 {
            return Err(RouterError::Config("max_total_bps cannot exceed 10000".into()));
        }
        if self.min_venue_score_bps > 10_000 {
            return Err(RouterError::Config("min_venue_score_bps cannot exceed 10000".into()));
        }
        Ok(())
    }

    pub fn with_private_rpc(mut self, url: String) -> Self {
        self.private_rpc_url = Some(url);
        self
    }

    pub fn with_jito(mut self, region: JitoRegion, tip_lamports: u64) -> Self {
        self.use_jito_bundle = true;
        self.jito_region = region;
        self.jito_tip_lamports = tip_lamports;
        self
    }

    pub fn with_compute_budget(mut self, unit_price: u64, unit_limit: Option<u32>) -> Self {
        self.compute_unit_price = unit_price;
        self.compute_unit_limit = unit_limit;
        self
    }

    pub fn with_cache_ttls(mut self, pool: Duration, negative: Duration, market: Duration) -> Self {
        self.pool_cache_ttl = pool;
        self.negative_cache_ttl = negative;
        self.market_cache_ttl = market;
        self
    }

    pub fn with_router_program(mut self, program_id: Pubkey) -> Self {
        self.router_program_id = program_id;
        self
    }

    pub fn with_address_lookup_table(mut self, table: Pubkey) -> Self {
        self.address_lookup_table = Some(table);
        self
    }

    pub fn with_venue_api(mut self, url: String) -> Self {
        self.venue_api_url = Some(url);
        self
    }

    pub fn with_price_api(mut self, url: String) -> Self {
        self.price_api_url = Some(url);
        self
    }

    pub fn with_slippage(mut self, slippage: SlippageConfig) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn with_pool(mut self, entry: PoolEntry) -> Self {
        self.pools.push(entry);
        self
    }

    pub fn with_plan_creation(mut self, enabled: bool) -> Self {
        self.create_plan_if_missing = enabled;
        self
    }

    pub fn block_engine_url(&self) -> String {
        self.jito_block_engine_url
            .clone()
            .unwrap_or_else(|| self.jito_region.endpoint().to_string())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> RouterResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| RouterError::Config(format!("{}{}={}: {}", ENV_PREFIX, key, raw, e))),
        None => Ok(None),
    }
}

pub type SolanaRpcClient = solana_client::nonblocking::rpc_client::RpcClient;
pub type AnyResult<T> = anyhow::Result<T>;
