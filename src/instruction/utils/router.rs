//! 路由合约（swap plan + CPI 包装）
//!
//! 路由合约是外部约定：
//! - `create_swap_plan`: 创建 / 覆盖用户的 SwapPlan PDA
//! - `swap_direct`: 校验 plan 后 CPI 调用 venue 的 swap 指令
//! - `swap_external`: 校验 plan 后 CPI 调用外部聚合器（Jupiter）指令

use super::{anchor_discriminator, decode_anchor_account};
use borsh::BorshDeserialize;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

pub mod seeds {
    pub const SWAP_PLAN_SEED: &[u8] = b"swap_plan";
}

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const ROUTER_PROGRAM: Pubkey = pubkey!("RouteNat1veSwap1111111111111111111111111111");
}

pub const SWAP_PLAN_DISCRIMINATOR: [u8; 8] = [95, 158, 185, 29, 164, 35, 247, 120];

/// 8 + 3 * 32 + 8 + 8 + 1 + 8 + 1
pub const SWAP_PLAN_SIZE: usize = 130;

pub fn create_swap_plan_discriminator() -> [u8; 8] {
    anchor_discriminator("global", "create_swap_plan")
}

pub fn swap_direct_discriminator() -> [u8; 8] {
    anchor_discriminator("global", "swap_direct")
}

pub fn swap_external_discriminator() -> [u8; 8] {
    anchor_discriminator("global", "swap_external")
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshDeserialize)]
pub struct SwapPlan {
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub min_out: u64,
    pub venue: u8,
    pub expires_at: i64,
    pub bump: u8,
}

pub fn swap_plan_decode(data: &[u8]) -> Option<SwapPlan> {
    decode_anchor_account(data, &SWAP_PLAN_DISCRIMINATOR)
}

pub fn get_swap_plan_pda(user: &Pubkey, router_program: &Pubkey) -> Option<(Pubkey, u8)> {
    Pubkey::try_find_program_address(&[seeds::SWAP_PLAN_SEED, user.as_ref()], router_program)
}

/// Parameters a swap plan has to carry for the upcoming swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanTerms {
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub min_out: u64,
    pub venue: u8,
}

impl SwapPlan {
    /// A plan is reusable only when it is unexpired at `now` and carries exactly `terms`.
    pub fn matches(&self, terms: &PlanTerms, now: i64) -> bool {
        self.expires_at > now
            && self.user == terms.user
            && self.input_mint == terms.input_mint
            && self.output_mint == terms.output_mint
            && self.amount == terms.amount
            && self.min_out == terms.min_out
            && self.venue == terms.venue
    }
}
