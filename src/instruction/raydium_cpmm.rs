use crate::instruction::SwapInstructionBuilder;
use crate::instruction::utils::raydium_cpmm::{SWAP_BASE_IN_DISCRIMINATOR, accounts};
use crate::resolver::RaydiumCpmmAccounts;
use solana_sdk::instruction::Instruction;

/// Raydium CPMM `swap_base_input`: discriminator + amount_in + minimum_amount_out
impl SwapInstructionBuilder for RaydiumCpmmAccounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        let mut data = [0u8; 24];
        data[..8].copy_from_slice(SWAP_BASE_IN_DISCRIMINATOR);
        data[8..16].copy_from_slice(&amount_in.to_le_bytes());
        data[16..24].copy_from_slice(&minimum_amount_out.to_le_bytes());

        Instruction::new_with_bytes(accounts::RAYDIUM_CPMM, &data, self.to_account_metas())
    }
}
