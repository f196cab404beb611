use crate::constants::{ASSOCIATED_TOKEN_PROGRAM, SYSTEM_PROGRAM, TOKEN_PROGRAM};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use spl_token::solana_program::program_pack::Pack;

/// Fields of an SPL token account the router cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// Token-2022 accounts carry extensions after the base 165 bytes; only the base is read.
pub fn token_account_decode(data: &[u8]) -> Option<TokenAccountInfo> {
    if data.len() < spl_token::state::Account::LEN {
        return None;
    }
    let account = spl_token::state::Account::unpack(&data[..spl_token::state::Account::LEN]).ok()?;
    Some(TokenAccountInfo {
        mint: Pubkey::new_from_array(account.mint.to_bytes()),
        owner: Pubkey::new_from_array(account.owner.to_bytes()),
        amount: account.amount,
    })
}

pub fn mint_decimals_decode(data: &[u8]) -> Option<u8> {
    if data.len() < spl_token::state::Mint::LEN {
        return None;
    }
    spl_token::state::Mint::unpack(&data[..spl_token::state::Mint::LEN]).ok().map(|m| m.decimals)
}

pub fn get_associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM,
    )
    .0
}

/// ATA program `CreateIdempotent` (instruction tag 1).
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    let ata = get_associated_token_address(owner, mint, token_program);
    Instruction::new_with_bytes(
        ASSOCIATED_TOKEN_PROGRAM,
        &[1],
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
    )
}

/// Token program owning `mint`, falling back to the legacy program when unknown.
pub fn token_program_of(mint_owner: Option<&Pubkey>) -> Pubkey {
    mint_owner.copied().unwrap_or(TOKEN_PROGRAM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::mock_rpc::fixtures;
    use crate::constants::{SOL_MINT, USDC_MINT};

    #[test]
    fn test_token_account_decode() {
        let owner = Pubkey::new_unique();
        let data = fixtures::token_account_data(&USDC_MINT, &owner, 150_000_000);
        let info = token_account_decode(&data).unwrap();
        assert_eq!(info.mint, USDC_MINT);
        assert_eq!(info.owner, owner);
        assert_eq!(info.amount, 150_000_000);
        assert!(token_account_decode(&data[..100]).is_none());
    }

    #[test]
    fn test_mint_decimals_decode() {
        assert_eq!(mint_decimals_decode(&fixtures::mint_data(6)), Some(6));
    }

    #[test]
    fn test_ata_is_deterministic() {
        let owner = Pubkey::new_unique();
        let a = get_associated_token_address(&owner, &SOL_MINT, &TOKEN_PROGRAM);
        let b = get_associated_token_address(&owner, &SOL_MINT, &TOKEN_PROGRAM);
        assert_eq!(a, b);
        assert_ne!(a, get_associated_token_address(&owner, &USDC_MINT, &TOKEN_PROGRAM));

        let ix = create_associated_token_account_idempotent(&owner, &owner, &USDC_MINT, &TOKEN_PROGRAM);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts[1].pubkey, get_associated_token_address(&owner, &USDC_MINT, &TOKEN_PROGRAM));
    }
}
