use super::raydium_cpmm_types::{TOKEN0_MINT_OFFSET, TOKEN1_MINT_OFFSET};
use solana_sdk::pubkey::Pubkey;

/// Constants used as seeds for deriving PDAs (Program Derived Addresses)
pub mod seeds {
    pub const POOL_VAULT_SEED: &[u8] = b"pool_vault";
    pub const OBSERVATION_STATE_SEED: &[u8] = b"observation";
}

/// Constants related to program accounts and authorities
pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const AUTHORITY: Pubkey = pubkey!("GpMZbSM2GgvTKHJirzeGfMFoaZ8UR2X7F4v8vHTvxFbL");
    pub const RAYDIUM_CPMM: Pubkey = pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C");
    pub const FEE_RATE_DENOMINATOR_VALUE: u64 = 1_000_000;
    /// AMM config 读不到时使用的默认费率（0.25%）
    pub const TRADE_FEE_RATE: u64 = 2500;
    // META
    pub const AUTHORITY_META: solana_sdk::instruction::AccountMeta =
        solana_sdk::instruction::AccountMeta {
            pubkey: AUTHORITY,
            is_signer: false,
            is_writable: false,
        };
}

pub const SWAP_BASE_IN_DISCRIMINATOR: &[u8] = &[143, 190, 90, 218, 196, 30, 51, 222];

pub fn get_vault_pda(pool_state: &Pubkey, mint: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]; 3] = &[seeds::POOL_VAULT_SEED, pool_state.as_ref(), mint.as_ref()];
    Pubkey::try_find_program_address(seeds, &accounts::RAYDIUM_CPMM).map(|pda| pda.0)
}

pub fn get_observation_state_pda(pool_state: &Pubkey) -> Option<Pubkey> {
    let seeds: &[&[u8]; 2] = &[seeds::OBSERVATION_STATE_SEED, pool_state.as_ref()];
    Pubkey::try_find_program_address(seeds, &accounts::RAYDIUM_CPMM).map(|pda| pda.0)
}

pub fn mint_filters(token0: &Pubkey, token1: &Pubkey) -> Vec<(usize, Vec<u8>)> {
    vec![
        (TOKEN0_MINT_OFFSET, token0.to_bytes().to_vec()),
        (TOKEN1_MINT_OFFSET, token1.to_bytes().to_vec()),
    ]
}
