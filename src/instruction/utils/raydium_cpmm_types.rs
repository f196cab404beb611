//! Raydium CPMM 账户布局（Anchor，8 字节 discriminator 之后）

use super::decode_anchor_account;
use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const POOL_STATE_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];
pub const AMM_CONFIG_DISCRIMINATOR: [u8; 8] = [218, 244, 33, 104, 203, 203, 43, 111];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct PoolState {
    pub amm_config: Pubkey,
    pub pool_creator: Pubkey,
    pub token0_vault: Pubkey,
    pub token1_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub token0_mint: Pubkey,
    pub token1_mint: Pubkey,
    pub token0_program: Pubkey,
    pub token1_program: Pubkey,
    pub observation_key: Pubkey,
    pub auth_bump: u8,
    pub status: u8,
    pub lp_mint_decimals: u8,
    pub mint0_decimals: u8,
    pub mint1_decimals: u8,
    pub lp_supply: u64,
    pub protocol_fees_token0: u64,
    pub protocol_fees_token1: u64,
    pub fund_fees_token0: u64,
    pub fund_fees_token1: u64,
    pub open_time: u64,
    pub recent_epoch: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct AmmConfig {
    pub bump: u8,
    pub disable_create_pool: bool,
    pub index: u16,
    pub trade_fee_rate: u64,
    pub protocol_fee_rate: u64,
    pub fund_fee_rate: u64,
    pub create_pool_fee: u64,
}

/// 包含 discriminator 的 mint 偏移量（用于 getProgramAccounts memcmp）
pub const POOL_STATE_SIZE: usize = 637;

pub const TOKEN0_MINT_OFFSET: usize = 168;
pub const TOKEN1_MINT_OFFSET: usize = 200;

pub fn pool_state_decode(data: &[u8]) -> Option<PoolState> {
    decode_anchor_account(data, &POOL_STATE_DISCRIMINATOR)
}

pub fn amm_config_decode(data: &[u8]) -> Option<AmmConfig> {
    decode_anchor_account(data, &AMM_CONFIG_DISCRIMINATOR)
}

impl PoolState {
    /// `Some(true)` when `mint` is token0.
    pub fn is_token0(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.token0_mint {
            Some(true)
        } else if *mint == self.token1_mint {
            Some(false)
        } else {
            None
        }
    }
}
