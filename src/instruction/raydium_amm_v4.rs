use crate::instruction::SwapInstructionBuilder;
use crate::instruction::utils::raydium_amm_v4::{SWAP_BASE_IN_DISCRIMINATOR, accounts};
use crate::resolver::RaydiumAmmV4Accounts;
use solana_sdk::instruction::Instruction;

/// Raydium AMM V4 (Raydium Liquidity Pool V4) `swap_base_in`
///
/// Raydium AMM V4 使用恒定乘积公式（x * y = k）
/// 程序地址: 675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8
///
/// 数据：`[9] + amount_in (u64) + minimum_amount_out (u64)`，共 17 字节
impl SwapInstructionBuilder for RaydiumAmmV4Accounts {
    fn build_swap_instruction(&self, amount_in: u64, minimum_amount_out: u64) -> Instruction {
        let mut data = [0u8; 17];
        data[..1].copy_from_slice(SWAP_BASE_IN_DISCRIMINATOR);
        data[1..9].copy_from_slice(&amount_in.to_le_bytes());
        data[9..17].copy_from_slice(&minimum_amount_out.to_le_bytes());

        Instruction::new_with_bytes(accounts::RAYDIUM_AMM_V4, &data, self.to_account_metas())
    }
}
