use crate::instruction::SwapInstructionBuilder;
use crate::instruction::utils::orca_whirlpool::{SWAP_DISCRIMINATOR, accounts, sqrt_price_limit};
use crate::resolver::OrcaWhirlpoolAccounts;
use solana_sdk::instruction::Instruction;

/// Orca Whirlpool `swap`
///
/// 数据：discriminator (8) + amount (u64) + other_amount_threshold (u64)
/// + sqrt_price_limit (u128) + amount_specified_is_input (bool) + a_to_b (bool)
impl SwapInstructionBuilder for OrcaWhirlpoolAccounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        let a_to_b = self.a_to_b();
        let mut data = [0u8; 42];
        data[..8].copy_from_slice(SWAP_DISCRIMINATOR);
        data[8..16].copy_from_slice(&amount_in.to_le_bytes());
        data[16..24].copy_from_slice(&minimum_amount_out.to_le_bytes());
        data[24..40].copy_from_slice(&sqrt_price_limit(a_to_b).to_le_bytes());
        data[40] = 1; // amount_specified_is_input
        data[41] = a_to_b as u8;

        Instruction::new_with_bytes(accounts::WHIRLPOOL_PROGRAM, &data, self.to_account_metas())
    }
}
