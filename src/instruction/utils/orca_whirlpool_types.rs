//! Orca `Whirlpool` 账户前缀（到 fee_growth_global_b 为止）

use super::decode_anchor_account;
use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub const WHIRLPOOL_DISCRIMINATOR: [u8; 8] = [63, 149, 209, 12, 225, 128, 99, 9];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct Whirlpool {
    pub whirlpools_config: Pubkey,
    pub whirlpool_bump: [u8; 1],
    pub tick_spacing: u16,
    pub tick_spacing_seed: [u8; 2],
    pub fee_rate: u16,
    pub protocol_fee_rate: u16,
    pub liquidity: u128,
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    pub protocol_fee_owed_a: u64,
    pub protocol_fee_owed_b: u64,
    pub token_mint_a: Pubkey,
    pub token_vault_a: Pubkey,
    pub fee_growth_global_a: u128,
    pub token_mint_b: Pubkey,
    pub token_vault_b: Pubkey,
    pub fee_growth_global_b: u128,
}

pub const WHIRLPOOL_SIZE: usize = 653;

pub const TOKEN_MINT_A_OFFSET: usize = 101;
pub const TOKEN_MINT_B_OFFSET: usize = 181;

pub fn whirlpool_decode(data: &[u8]) -> Option<Whirlpool> {
    decode_anchor_account(data, &WHIRLPOOL_DISCRIMINATOR)
}

impl Whirlpool {
    /// `Some(true)` when `mint` is token A (an A->B swap).
    pub fn is_token_a(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.token_mint_a {
            Some(true)
        } else if *mint == self.token_mint_b {
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
    fn test_whirlpool_decode_offsets() {
        let keys: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let data = fixtures::whirlpool_data(&keys[0], &keys[1], &keys[2], &keys[3], 64, -300);
        assert_eq!(&data[TOKEN_MINT_A_OFFSET..TOKEN_MINT_A_OFFSET + 32], keys[0].as_ref());
        assert_eq!(&data[TOKEN_MINT_B_OFFSET..TOKEN_MINT_B_OFFSET + 32], keys[2].as_ref());

        let pool = whirlpool_decode(&data).unwrap();
        assert_eq!(pool.token_mint_a, keys[0]);
        assert_eq!(pool.token_vault_a, keys[1]);
        assert_eq!(pool.token_mint_b, keys[2]);
        assert_eq!(pool.token_vault_b, keys[3]);
        assert_eq!(pool.tick_spacing, 64);
        assert_eq!(pool.tick_current_index, -300);
        assert_eq!(pool.is_token_a(&keys[2]), Some(false));
    }
}
