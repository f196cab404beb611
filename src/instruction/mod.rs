pub mod meteora_dlmm;
pub mod orca_whirlpool;
pub mod raydium_amm_v4;
pub mod raydium_clmm;
pub mod raydium_cpmm;
pub mod router;
pub mod utils;

use crate::resolver::DexAccounts;
use solana_sdk::instruction::Instruction;

/// Byte-exact venue swap instruction for a resolved account set (exact input).
pub trait SwapInstructionBuilder {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction;
}

impl SwapInstructionBuilder for DexAccounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        match self {
            DexAccounts::RaydiumAmmV4(a) => a.build_swap_instruction(amount_in, minimum_amount_out),
            DexAccounts::RaydiumCpmm(a) => a.build_swap_instruction(amount_in, minimum_amount_out),
            DexAccounts::RaydiumClmm(a) => a.build_swap_instruction(amount_in, minimum_amount_out),
            DexAccounts::OrcaWhirlpool(a) => a.build_swap_instruction(amount_in, minimum_amount_out),
            DexAccounts::MeteoraDlmm(a) => a.build_swap_instruction(amount_in, minimum_amount_out),
        }
    }
}
