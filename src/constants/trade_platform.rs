//! Stable string names of the venues (used in config, logs and the quote API).

pub const RAYDIUM_AMM_V4: &str = "raydium_amm_v4"; // Raydium Liquidity Pool V4 (675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8)
pub const RAYDIUM_CPMM: &str = "raydium_cpmm";
pub const RAYDIUM_CLMM: &str = "raydium_clmm";
pub const ORCA_WHIRLPOOL: &str = "orca_whirlpool";
pub const METEORA_DLMM: &str = "meteora_dlmm";
pub const JUPITER: &str = "jupiter";
