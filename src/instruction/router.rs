//! Router program instructions
//!
//! | 指令 | 数据 |
//! |------|------|
//! | `create_swap_plan` | disc + input_mint + output_mint + amount + min_out + venue + expires_at |
//! | `swap_direct` | disc + venue + amount + min_out + inner data (borsh `Vec<u8>`) |
//! | `swap_external` | disc + amount + min_out + inner data (borsh `Vec<u8>`) |
//!
//! `swap_direct` / `swap_external` 的账户：user、swap plan、被 CPI 的程序，然后是内层指令的全部账户。

use crate::constants::SYSTEM_PROGRAM_META;
use crate::instruction::utils::router::{
    PlanTerms, create_swap_plan_discriminator, swap_direct_discriminator, swap_external_discriminator,
};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

pub fn create_swap_plan(
    router_program: &Pubkey,
    swap_plan: &Pubkey,
    terms: &PlanTerms,
    expires_at: i64,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 32 + 32 + 8 + 8 + 1 + 8);
    data.extend_from_slice(&create_swap_plan_discriminator());
    data.extend_from_slice(terms.input_mint.as_ref());
    data.extend_from_slice(terms.output_mint.as_ref());
    data.extend_from_slice(&terms.amount.to_le_bytes());
    data.extend_from_slice(&terms.min_out.to_le_bytes());
    data.push(terms.venue);
    data.extend_from_slice(&expires_at.to_le_bytes());

    let accounts: [AccountMeta; 3] = [
        AccountMeta::new(terms.user, true),      // User (signer, payer)
        AccountMeta::new(*swap_plan, false),     // Swap Plan PDA
        SYSTEM_PROGRAM_META,                     // System Program
    ];
    Instruction::new_with_bytes(*router_program, &data, accounts.to_vec())
}

fn wrap_accounts(user: &Pubkey, swap_plan: &Pubkey, inner: &Instruction) -> Vec<AccountMeta> {
    let mut accounts = Vec::with_capacity(3 + inner.accounts.len());
    accounts.push(AccountMeta::new(*user, true)); // User (signer)
    accounts.push(AccountMeta::new(*swap_plan, false)); // Swap Plan PDA
    accounts.push(AccountMeta::new_readonly(inner.program_id, false)); // CPI target program
    accounts.extend(inner.accounts.iter().cloned());
    accounts
}

fn push_inner_data(data: &mut Vec<u8>, inner: &Instruction) {
    data.extend_from_slice(&(inner.data.len() as u32).to_le_bytes());
    data.extend_from_slice(&inner.data);
}

pub fn swap_direct(
    router_program: &Pubkey,
    user: &Pubkey,
    swap_plan: &Pubkey,
    venue_id: u8,
    amount_in: u64,
    minimum_amount_out: u64,
    venue_instruction: &Instruction,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 1 + 16 + 4 + venue_instruction.data.len());
    data.extend_from_slice(&swap_direct_discriminator());
    data.push(venue_id);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());
    push_inner_data(&mut data, venue_instruction);

    Instruction::new_with_bytes(*router_program, &data, wrap_accounts(user, swap_plan, venue_instruction))
}

pub fn swap_external(
    router_program: &Pubkey,
    user: &Pubkey,
    swap_plan: &Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
    external_instruction: &Instruction,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 16 + 4 + external_instruction.data.len());
    data.extend_from_slice(&swap_external_discriminator());
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());
    push_inner_data(&mut data, external_instruction);

    Instruction::new_with_bytes(
        *router_program,
        &data,
        wrap_accounts(user, swap_plan, external_instruction),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::utils::router::{accounts::ROUTER_PROGRAM, get_swap_plan_pda};

    #[test]
    fn test_swap_direct_layout() {
        let user = Pubkey::new_unique();
        let (plan, _) = get_swap_plan_pda(&user, &ROUTER_PROGRAM).unwrap();
        let venue_program = Pubkey::new_unique();
        let inner = Instruction::new_with_bytes(
            venue_program,
            &[9, 1, 2, 3],
            vec![AccountMeta::new(Pubkey::new_unique(), false), AccountMeta::new_readonly(user, true)],
        );
        let ix = swap_direct(&ROUTER_PROGRAM, &user, &plan, 2, 1_000, 990, &inner);

        assert_eq!(ix.program_id, ROUTER_PROGRAM);
        assert_eq!(&ix.data[..8], &swap_direct_discriminator());
        assert_eq!(ix.data[8], 2);
        assert_eq!(&ix.data[9..17], &1_000u64.to_le_bytes());
        assert_eq!(&ix.data[17..25], &990u64.to_le_bytes());
        assert_eq!(&ix.data[25..29], &4u32.to_le_bytes());
        assert_eq!(&ix.data[29..], &[9, 1, 2, 3]);

        assert_eq!(ix.accounts.len(), 5);
        assert_eq!(ix.accounts[0], AccountMeta::new(user, true));
        assert_eq!(ix.accounts[1].pubkey, plan);
        assert_eq!(ix.accounts[2], AccountMeta::new_readonly(venue_program, false));
        assert_eq!(&ix.accounts[3..], &inner.accounts[..]);
    }

    #[test]
    fn test_create_swap_plan_layout() {
        let terms = PlanTerms {
            user: Pubkey::new_unique(),
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount: 5,
            min_out: 4,
            venue: 3,
        };
        let plan = Pubkey::new_unique();
        let ix = create_swap_plan(&ROUTER_PROGRAM, &plan, &terms, 1_700_000_090);
        assert_eq!(ix.data.len(), 97);
        assert_eq!(&ix.data[8..40], terms.input_mint.as_ref());
        assert_eq!(ix.data[88], 3);
        assert_eq!(&ix.data[89..97], &1_700_000_090i64.to_le_bytes());
        assert_eq!(ix.accounts[1], AccountMeta::new(plan, false));
    }
}
