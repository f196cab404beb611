use crate::instruction::SwapInstructionBuilder;
use crate::instruction::utils::meteora_dlmm::{SWAP_DISCRIMINATOR, accounts};
use crate::resolver::MeteoraDlmmAccounts;
use solana_sdk::instruction::Instruction;

/// Meteora DLMM `swap`: discriminator + amount_in + min_amount_out.
/// Bin arrays ride along as remaining accounts.
impl SwapInstructionBuilder for MeteoraDlmmAccounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        let mut data = [0u8; 24];
        data[..8].copy_from_slice(SWAP_DISCRIMINATOR);
        data[8..16].copy_from_slice(&amount_in.to_le_bytes());
        data[16..24].copy_from_slice(&minimum_amount_out.to_le_bytes());

        Instruction::new_with_bytes(accounts::DLMM_PROGRAM, &data, self.to_account_metas())
    }
}
