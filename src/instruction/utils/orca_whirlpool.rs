use super::orca_whirlpool_types::{TOKEN_MINT_A_OFFSET, TOKEN_MINT_B_OFFSET};
use solana_sdk::pubkey::Pubkey;

pub mod seeds {
    pub const TICK_ARRAY_SEED: &[u8] = b"tick_array";
    pub const ORACLE_SEED: &[u8] = b"oracle";
}

pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const WHIRLPOOL_PROGRAM: Pubkey = pubkey!("whirLbMiicVdio4qvUfM5KAg6Ct8VwpYzGff3uctyCc");
}

pub const SWAP_DISCRIMINATOR: &[u8] = &[248, 198, 158, 145, 225, 117, 135, 200];

pub const TICK_ARRAY_SIZE: i32 = 88;
/// swap 固定传 3 个 tick array
pub const SWAP_TICK_ARRAY_COUNT: usize = 3;

pub const MIN_SQRT_PRICE: u128 = 4295048016;
pub const MAX_SQRT_PRICE: u128 = 79226673515401279992447579055;

/// Price limit that never binds for the given direction.
pub fn sqrt_price_limit(a_to_b: bool) -> u128 {
    if a_to_b { MIN_SQRT_PRICE } else { MAX_SQRT_PRICE }
}

/// Tick array PDA; the start index is encoded as its decimal string.
pub fn get_tick_array_pda(whirlpool: &Pubkey, start_tick_index: i32) -> Option<Pubkey> {
    let start = start_tick_index.to_string();
    Pubkey::try_find_program_address(
        &[seeds::TICK_ARRAY_SEED, whirlpool.as_ref(), start.as_bytes()],
        &accounts::WHIRLPOOL_PROGRAM,
    )
    .map(|pda| pda.0)
}

pub fn get_oracle_pda(whirlpool: &Pubkey) -> Option<Pubkey> {
    Pubkey::try_find_program_address(
        &[seeds::ORACLE_SEED, whirlpool.as_ref()],
        &accounts::WHIRLPOOL_PROGRAM,
    )
    .map(|pda| pda.0)
}

pub fn get_tick_array_start_index(tick_current: i32, tick_spacing: u16) -> i32 {
    let ticks_in_array = TICK_ARRAY_SIZE * tick_spacing.max(1) as i32;
    tick_current.div_euclid(ticks_in_array) * ticks_in_array
}

/// a_to_b moves the price down, so tick arrays are walked toward lower indexes.
pub fn swap_tick_array_start_indexes(tick_current: i32, tick_spacing: u16, a_to_b: bool) -> Vec<i32> {
    let ticks_in_array = TICK_ARRAY_SIZE * tick_spacing.max(1) as i32;
    let start = get_tick_array_start_index(tick_current, tick_spacing);
    (0..SWAP_TICK_ARRAY_COUNT as i32)
        .map(|i| if a_to_b { start - i * ticks_in_array } else { start + i * ticks_in_array })
        .collect()
}

pub fn mint_filters(mint_a: &Pubkey, mint_b: &Pubkey) -> Vec<(usize, Vec<u8>)> {
    vec![
        (TOKEN_MINT_A_OFFSET, mint_a.to_bytes().to_vec()),
        (TOKEN_MINT_B_OFFSET, mint_b.to_bytes().to_vec()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whirlpool_tick_arrays() {
        assert_eq!(get_tick_array_start_index(-1, 64), -5632);
        assert_eq!(get_tick_array_start_index(100, 64), 0);
        assert_eq!(swap_tick_array_start_indexes(100, 1, true), vec![88, 0, -88]);
        assert_eq!(swap_tick_array_start_indexes(100, 1, false), vec![88, 176, 264]);
        assert_eq!(sqrt_price_limit(true), MIN_SQRT_PRICE);

        let pool = Pubkey::new_unique();
        assert!(get_oracle_pda(&pool).is_some());
        assert_ne!(get_tick_array_pda(&pool, -88), get_tick_array_pda(&pool, 88));
    }
}
