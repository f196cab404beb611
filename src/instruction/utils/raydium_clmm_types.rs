//! Raydium CLMM `PoolState` 前缀（到 tick_current 为止）
//!
//! swap 只需要 mint / vault / observation / tick 相关字段，后面的奖励与 bitmap 不解析。

use super::decode_anchor_account;
use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const POOL_STATE_DISCRIMINATOR: [u8; 8] = [247, 237, 227, 245, 215, 195, 222, 70];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct PoolState {
    pub bump: u8,
    pub amm_config: Pubkey,
    pub owner: Pubkey,
    pub token_mint0: Pubkey,
    pub token_mint1: Pubkey,
    pub token_vault0: Pubkey,
    pub token_vault1: Pubkey,
    pub observation_key: Pubkey,
    pub mint_decimals0: u8,
    pub mint_decimals1: u8,
    pub tick_spacing: u16,
    pub liquidity: u128,
    pub sqrt_price_x64: u128,
    pub tick_current: i32,
}

pub const POOL_STATE_SIZE: usize = 1544;

pub const TOKEN_MINT0_OFFSET: usize = 73;
pub const TOKEN_MINT1_OFFSET: usize = 105;

pub fn pool_state_decode(data: &[u8]) -> Option<PoolState> {
    decode_anchor_account(data, &POOL_STATE_DISCRIMINATOR)
}

impl PoolState {
    pub fn is_token0(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.token_mint0 {
            Some(true)
        } else if *mint == self.token_mint1 {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::fixtures;

    #[test]
    fn test_pool_state_prefix_decode() {
        let keys: Vec<Pubkey> = (0..6).map(|_| Pubkey::new_unique()).collect();
        let data = fixtures::clmm_pool_data(&keys[0], &keys[1], &keys[2], &keys[3], &keys[4], &keys[5], 10, -1234);
        assert_eq!(&data[TOKEN_MINT0_OFFSET..TOKEN_MINT0_OFFSET + 32], keys[1].as_ref());
        assert_eq!(&data[TOKEN_MINT1_OFFSET..TOKEN_MINT1_OFFSET + 32], keys[2].as_ref());

        let pool = pool_state_decode(&data).unwrap();
        assert_eq!(pool.amm_config, keys[0]);
        assert_eq!(pool.token_vault0, keys[3]);
        assert_eq!(pool.token_vault1, keys[4]);
        assert_eq!(pool.observation_key, keys[5]);
        assert_eq!(pool.tick_spacing, 10);
        assert_eq!(pool.tick_current, -1234);
    }
}
