use crate::instruction::SwapInstructionBuilder;
use crate::instruction::utils::raydium_clmm::{SWAP_V2_DISCRIMINATOR, accounts};
use crate::resolver::RaydiumClmmAccounts;
use solana_sdk::instruction::Instruction;

/// Raydium CLMM `swap_v2`
///
/// 数据：discriminator (8) + amount (u64) + other_amount_threshold (u64)
/// + sqrt_price_limit_x64 (u128) + is_base_input (bool)
///
/// - `sqrt_price_limit_x64 = 0` 表示不限价，由程序取方向对应的极值
/// - `is_base_input = true`：输入固定，threshold 是最小输出
impl SwapInstructionBuilder for RaydiumClmmAccounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        let sqrt_price_limit_x64: u128 = 0;
        let mut data = vec![0u8; 41];
        data[0..8].copy_from_slice(SWAP_V2_DISCRIMINATOR);
        data[8..16].copy_from_slice(&amount_in.to_le_bytes());
        data[16..24].copy_from_slice(&minimum_amount_out.to_le_bytes());
        data[24..40].copy_from_slice(&sqrt_price_limit_x64.to_le_bytes());
        data[40] = 1;

        Instruction::new_with_bytes(accounts::RAYDIUM_CLMM, &data, self.to_account_metas())
    }
}
