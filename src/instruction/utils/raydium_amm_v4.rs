use super::raydium_amm_v4_types::{COIN_MINT_OFFSET, PC_MINT_OFFSET};
use solana_sdk::pubkey::Pubkey;

/// Constants related to program accounts and authorities
pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const AUTHORITY: Pubkey = pubkey!("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1");
    pub const RAYDIUM_AMM_V4: Pubkey = pubkey!("675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8");
    pub const OPENBOOK_PROGRAM: Pubkey = pubkey!("srmqPvymJeFKQ4zGQed1GFppgkRHL9kaELCbyksJtPX");

    pub const TRADE_FEE_NUMERATOR: u64 = 25;
    pub const TRADE_FEE_DENOMINATOR: u64 = 10000;

    // META
    pub const AUTHORITY_META: solana_sdk::instruction::AccountMeta =
        solana_sdk::instruction::AccountMeta {
            pubkey: AUTHORITY,
            is_signer: false,
            is_writable: false,
        };
}

pub const SWAP_BASE_IN_DISCRIMINATOR: &[u8] = &[9];

/// AmmInfo.status 取值
pub mod pool_status {
    pub const UNINITIALIZED: u64 = 0;
    pub const INITIALIZED: u64 = 1;
    pub const DISABLED: u64 = 2;
    pub const WITHDRAW_ONLY: u64 = 3;
    pub const LIQUIDITY_ONLY: u64 = 4;
    pub const SWAP_ONLY: u64 = 5;
    pub const ACTIVE: u64 = 6;
}

pub fn is_pool_tradeable(status: u64) -> bool {
    status == pool_status::ACTIVE || status == pool_status::SWAP_ONLY
}

/// memcmp 过滤条件：`(coin, pc)` 两种排列都要查
pub fn mint_filters(coin: &Pubkey, pc: &Pubkey) -> Vec<(usize, Vec<u8>)> {
    vec![(COIN_MINT_OFFSET, coin.to_bytes().to_vec()), (PC_MINT_OFFSET, pc.to_bytes().to_vec())]
}
