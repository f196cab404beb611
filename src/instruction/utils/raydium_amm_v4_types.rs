//! Raydium AMM V4 (Raydium Liquidity Pool V4) 账户布局
//!
//! `AmmInfo` 是 752 字节的 borsh 结构，没有 Anchor discriminator。
//! Swap 需要的 OpenBook 市场账户（bids / asks / event queue / vaults）不在这里，
//! 由 [`super::openbook`] 解析。

use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct Fees {
    pub min_separate_numerator: u64,
    pub min_separate_denominator: u64,
    pub trade_fee_numerator: u64,
    pub trade_fee_denominator: u64,
    pub pnl_numerator: u64,
    pub pnl_denominator: u64,
    pub swap_fee_numerator: u64,
    pub swap_fee_denominator: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct OutPutData {
    pub need_take_pnl_coin: u64,
    pub need_take_pnl_pc: u64,
    pub total_pnl_pc: u64,
    pub total_pnl_coin: u64,
    pub pool_open_time: u64,
    pub punish_pc_amount: u64,
    pub punish_coin_amount: u64,
    pub orderbook_to_init_time: u64,
    pub swap_coin_in_amount: u128,
    pub swap_pc_out_amount: u128,
    pub swap_take_pc_fee: u64,
    pub swap_pc_in_amount: u128,
    pub swap_coin_out_amount: u128,
    pub swap_take_coin_fee: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct AmmInfo {
    pub status: u64,
    pub nonce: u64,
    pub order_num: u64,
    pub depth: u64,
    pub coin_decimals: u64,
    pub pc_decimals: u64,
    pub state: u64,
    pub reset_flag: u64,
    pub min_size: u64,
    pub vol_max_cut_ratio: u64,
    pub amount_wave: u64,
    pub coin_lot_size: u64,
    pub pc_lot_size: u64,
    pub min_price_multiplier: u64,
    pub max_price_multiplier: u64,
    pub sys_decimal_value: u64,
    pub fees: Fees,
    pub out_put: OutPutData,
    pub token_coin: Pubkey,
    pub token_pc: Pubkey,
    pub coin_mint: Pubkey,
    pub pc_mint: Pubkey,
    pub lp_mint: Pubkey,
    pub open_orders: Pubkey,
    pub market: Pubkey,
    pub serum_dex: Pubkey,
    pub target_orders: Pubkey,
    pub withdraw_queue: Pubkey,
    pub token_temp_lp: Pubkey,
    pub amm_owner: Pubkey,
    pub lp_amount: u64,
    pub client_order_id: u64,
    pub padding: [u64; 2],
}

pub const AMM_INFO_SIZE: usize = 752;

/// 16 个 u64 + Fees(64) + OutPutData(144) + token_coin + token_pc = 400
pub const COIN_MINT_OFFSET: usize = 400;
pub const PC_MINT_OFFSET: usize = 432;

pub fn amm_info_decode(data: &[u8]) -> Option<AmmInfo> {
    if data.len() < AMM_INFO_SIZE {
        return None;
    }
    borsh::from_slice::<AmmInfo>(&data[..AMM_INFO_SIZE]).ok()
}

impl AmmInfo {
    /// `Some(true)` when `mint` is the coin (base) side, `None` when the pool does not hold it.
    pub fn is_coin_side(&self, mint: &Pubkey) -> Option<bool> {
        if *mint == self.coin_mint {
            Some(true)
        } else if *mint == self.pc_mint {
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
    fn test_amm_info_decode_offsets() {
        let keys: Vec<Pubkey> = (0..8).map(|_| Pubkey::new_unique()).collect();
        let data = fixtures::amm_v4_pool_data(
            &keys[0], &keys[1], &keys[2], &keys[3], &keys[4], &keys[5], &keys[6], &keys[7],
        );
        let info = amm_info_decode(&data).unwrap();
        assert_eq!(info.status, 6);
        assert_eq!(info.coin_mint, keys[0]);
        assert_eq!(info.pc_mint, keys[1]);
        assert_eq!(info.token_coin, keys[2]);
        assert_eq!(info.token_pc, keys[3]);
        assert_eq!(info.open_orders, keys[4]);
        assert_eq!(info.target_orders, keys[5]);
        assert_eq!(info.market, keys[6]);
        assert_eq!(info.serum_dex, keys[7]);
        assert_eq!(info.is_coin_side(&keys[1]), Some(false));
        assert_eq!(info.is_coin_side(&Pubkey::new_unique()), None);
        assert!(amm_info_decode(&data[..700]).is_none());
    }
}
