//! Meteora DLMM `LbPair` 前缀（到 oracle 为止）
//!
//! 参数结构体和奖励信息只保留原始字节，swap 用不到。

use super::decode_anchor_account;
use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

pub const LB_PAIR_DISCRIMINATOR: [u8; 8] = [33, 11, 49, 98, 181, 101, 177, 13];

#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize)]
pub struct LbPair {
    pub static_parameters: [u8; 32],
    pub variable_parameters: [u8; 32],
    pub bump_seed: [u8; 1],
    pub bin_step_seed: [u8; 2],
    pub pair_type: u8,
    pub active_id: i32,
    pub bin_step: u16,
    pub status: u8,
    pub require_base_factor_seed: u8,
    pub base_factor_seed: [u8; 2],
    pub activation_type: u8,
    pub creator_pool_on_off_control: u8,
    pub token_x_mint: Pubkey,
    pub token_y_mint: Pubkey,
    pub reserve_x: Pubkey,
    pub reserve_y: Pubkey,
    pub protocol_fee: [u8; 16],
    pub padding_1: [u8; 32],
    pub reward_infos: [u8; 288],
    pub oracle: Pubkey,
}

pub const LB_PAIR_SIZE: usize = 904;

pub const TOKEN_X_MINT_OFFSET: usize = 88;
pub const TOKEN_Y_MINT_OFFSET: usize = 120;

pub fn lb_pair_decode(data: &[u8]) -> Option<LbPair> {
    decode_anchor_account(data, &LB_PAIR_DISCRIMINATOR)
}

impl LbPair {
    /// `Some(true)` when `mint` is token X, i.e. the swap sells X for Y.
    pub fn swap_for_y(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.token_x_mint {
            Some(true)
        } else if *mint == self.token_y_mint {
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
    fn test_lb_pair_decode_offsets() {
        let keys: Vec<Pubkey> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let data = fixtures::lb_pair_data(&keys[0], &keys[1], &keys[2], &keys[3], &keys[4], -75, 25);
        assert_eq!(&data[TOKEN_X_MINT_OFFSET..TOKEN_X_MINT_OFFSET + 32], keys[0].as_ref());
        assert_eq!(&data[TOKEN_Y_MINT_OFFSET..TOKEN_Y_MINT_OFFSET + 32], keys[1].as_ref());
        assert_eq!(&data[8 + 544..8 + 576], keys[4].as_ref());

        let pair = lb_pair_decode(&data).unwrap();
        assert_eq!(pair.active_id, -75);
        assert_eq!(pair.bin_step, 25);
        assert_eq!(pair.reserve_x, keys[2]);
        assert_eq!(pair.reserve_y, keys[3]);
        assert_eq!(pair.oracle, keys[4]);
        assert_eq!(pair.swap_for_y(&keys[1]), Some(false));
    }
}
