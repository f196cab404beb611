//! OpenBook / Serum v3 market 布局
//!
//! Raydium AMM V4 swap 需要市场的 bids / asks / event queue / vaults 以及 vault signer。
//! 这些字段几乎不变，解析结果单独缓存（TTL 比 pool 更长）。

use borsh::BorshDeserialize;
use solana_sdk::pubkey::Pubkey;

/// 5 字节 "serum" 头 + 376 字节结构 + 7 字节尾部 padding
pub const MARKET_STATE_SIZE: usize = 388;

#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize)]
pub struct MarketState {
    pub head_padding: [u8; 5],
    pub account_flags: u64,
    pub own_address: Pubkey,
    pub vault_signer_nonce: u64,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_vault: Pubkey,
    pub base_deposits_total: u64,
    pub base_fees_accrued: u64,
    pub quote_vault: Pubkey,
    pub quote_deposits_total: u64,
    pub quote_fees_accrued: u64,
    pub quote_dust_threshold: u64,
    pub request_queue: Pubkey,
    pub event_queue: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub base_lot_size: u64,
    pub quote_lot_size: u64,
    pub fee_rate_bps: u64,
    pub referrer_rebates_accrued: u64,
    pub tail_padding: [u8; 7],
}

pub fn market_state_decode(data: &[u8]) -> Option<MarketState> {
    if data.len() < MARKET_STATE_SIZE {
        return None;
    }
    borsh::from_slice::<MarketState>(&data[..MARKET_STATE_SIZE]).ok()
}

/// Vault signer = `create_program_address([market, nonce_le], dex_program)`.
pub fn vault_signer_address(market: &Pubkey, nonce: u64, dex_program: &Pubkey) -> Option<Pubkey> {
    Pubkey::create_program_address(&[market.as_ref(), &nonce.to_le_bytes()], dex_program).ok()
}

/// Market accounts a Raydium AMM V4 swap passes through to the order book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketAccounts {
    pub market: Pubkey,
    pub program: Pubkey,
    pub bids: Pubkey,
    pub asks: Pubkey,
    pub event_queue: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
    pub vault_signer: Pubkey,
}

impl MarketAccounts {
    pub fn from_state(market: Pubkey, program: Pubkey, state: &MarketState) -> Option<Self> {
        let vault_signer = vault_signer_address(&market, state.vault_signer_nonce, &program)?;
        Some(Self {
            market,
            program,
            bids: state.bids,
            asks: state.asks,
            event_queue: state.event_queue,
            base_vault: state.base_vault,
            quote_vault: state.quote_vault,
            vault_signer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::fixtures;

    #[test]
    fn test_market_state_decode_offsets() {
        let market = Pubkey::new_unique();
        let program = Pubkey::new_unique();
        let (data, nonce) = fixtures::openbook_market_data(&market, &program, &Pubkey::new_unique(), &Pubkey::new_unique());
        let state = market_state_decode(&data).unwrap();
        assert_eq!(state.own_address, market);
        assert_eq!(state.vault_signer_nonce, nonce);
        assert_eq!(&data[285..317], state.bids.as_ref());
        assert_eq!(&data[317..349], state.asks.as_ref());
        assert_eq!(&data[253..285], state.event_queue.as_ref());

        let accounts = MarketAccounts::from_state(market, program, &state).unwrap();
        assert_eq!(Some(accounts.vault_signer), vault_signer_address(&market, nonce, &program));
        assert!(market_state_decode(&data[..300]).is_none());
    }
}
