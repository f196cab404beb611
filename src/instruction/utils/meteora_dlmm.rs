use super::meteora_dlmm_types::{TOKEN_X_MINT_OFFSET, TOKEN_Y_MINT_OFFSET};
use solana_sdk::pubkey::Pubkey;

pub mod seeds {
    pub const BIN_ARRAY_SEED: &[u8] = b"bin_array";
    pub const BITMAP_SEED: &[u8] = b"bitmap";
    pub const EVENT_AUTHORITY_SEED: &[u8] = b"__event_authority";
}

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const DLMM_PROGRAM: Pubkey = pubkey!("LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo");
}

pub const SWAP_DISCRIMINATOR: &[u8] = &[248, 198, 158, 145, 225, 117, 135, 200];

pub const MAX_BIN_PER_ARRAY: i32 = 70;
pub const SWAP_BIN_ARRAY_COUNT: usize = 3;

/// Bin array index holding `bin_id`, rounded toward negative infinity.
pub fn bin_id_to_bin_array_index(bin_id: i32) -> i32 {
    bin_id.div_euclid(MAX_BIN_PER_ARRAY)
}

pub fn get_bin_array_pda(lb_pair: &Pubkey, index: i32) -> Option<Pubkey> {
    Pubkey::try_find_program_address(
        &[seeds::BIN_ARRAY_SEED, lb_pair.as_ref(), &(index as i64).to_le_bytes()],
        &accounts::DLMM_PROGRAM,
    )
    .map(|pda| pda.0)
}

pub fn get_bitmap_extension_pda(lb_pair: &Pubkey) -> Option<Pubkey> {
    Pubkey::try_find_program_address(
        &[seeds::BITMAP_SEED, lb_pair.as_ref()],
        &accounts::DLMM_PROGRAM,
    )
    .map(|pda| pda.0)
}

pub fn get_event_authority_pda() -> Option<Pubkey> {
    Pubkey::try_find_program_address(&[seeds::EVENT_AUTHORITY_SEED], &accounts::DLMM_PROGRAM)
        .map(|pda| pda.0)
}

/// Selling X pushes the active bin down, so bin arrays are walked toward lower indexes.
pub fn swap_bin_array_indexes(active_id: i32, swap_for_y: bool) -> Vec<i32> {
    let start = bin_id_to_bin_array_index(active_id);
    (0..SWAP_BIN_ARRAY_COUNT as i32)
        .map(|i| if swap_for_y { start - i } else { start + i })
        .collect()
}

pub fn mint_filters(mint_x: &Pubkey, mint_y: &Pubkey) -> Vec<(usize, Vec<u8>)> {
    vec![
        (TOKEN_X_MINT_OFFSET, mint_x.to_bytes().to_vec()),
        (TOKEN_Y_MINT_OFFSET, mint_y.to_bytes().to_vec()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_array_index() {
        assert_eq!(bin_id_to_bin_array_index(0), 0);
        assert_eq!(bin_id_to_bin_array_index(69), 0);
        assert_eq!(bin_id_to_bin_array_index(70), 1);
        assert_eq!(bin_id_to_bin_array_index(-1), -1);
        assert_eq!(bin_id_to_bin_array_index(-70), -1);
        assert_eq!(bin_id_to_bin_array_index(-71), -2);
        assert_eq!(swap_bin_array_indexes(-75, true), vec![-2, -3, -4]);
        assert_eq!(swap_bin_array_indexes(-75, false), vec![-2, -1, 0]);
        assert!(get_event_authority_pda().is_some());
    }
}
