use super::raydium_clmm_types::{TOKEN_MINT0_OFFSET, TOKEN_MINT1_OFFSET};
use solana_sdk::pubkey::Pubkey;

/// Seeds for PDA derivation
pub mod seeds {
    pub const TICK_ARRAY_SEED: &[u8] = b"tick_array";
    pub const POOL_TICK_ARRAY_BITMAP_SEED: &[u8] = b"pool_tick_array_bitmap_extension";
}

/// Constants related to program accounts and authorities
pub mod accounts {
    use solana_sdk::{pubkey, pubkey::Pubkey};
    pub const RAYDIUM_CLMM: Pubkey = pubkey!("CAMMCzo5YL8w4VFF8KVHrK22GGUsp5VTaW7grrKgrWqK");
}

pub const SWAP_V2_DISCRIMINATOR: &[u8] = &[43, 4, 237, 11, 26, 201, 30, 98];

pub const TICKS_PER_ARRAY: i32 = 60;
/// swap_v2 传入的 tick array 数量
pub const SWAP_TICK_ARRAY_COUNT: usize = 3;

/// Tick array PDA，tick index 使用大端序（与 Raydium SDK 一致）
pub fn get_tick_array_pda(pool_id: &Pubkey, start_tick_index: i32) -> Option<Pubkey> {
    Pubkey::try_find_program_address(
        &[seeds::TICK_ARRAY_SEED, pool_id.as_ref(), &start_tick_index.to_be_bytes()],
        &accounts::RAYDIUM_CLMM,
    )
    .map(|pda| pda.0)
}

pub fn get_tick_array_bitmap_extension_pda(pool_id: &Pubkey) -> Option<Pubkey> {
    Pubkey::try_find_program_address(
        &[seeds::POOL_TICK_ARRAY_BITMAP_SEED, pool_id.as_ref()],
        &accounts::RAYDIUM_CLMM,
    )
    .map(|pda| pda.0)
}

/// Start index of the tick array containing `tick_current`, rounded toward negative infinity.
pub fn get_tick_array_start_index(tick_current: i32, tick_spacing: u16) -> i32 {
    let ticks_in_array = TICKS_PER_ARRAY * tick_spacing.max(1) as i32;
    tick_current.div_euclid(ticks_in_array) * ticks_in_array
}

/// Start indexes a swap walks through: zero_for_one moves the price (and tick) down.
pub fn swap_tick_array_start_indexes(tick_current: i32, tick_spacing: u16, zero_for_one: bool) -> Vec<i32> {
    let ticks_in_array = TICKS_PER_ARRAY * tick_spacing.max(1) as i32;
    let start = get_tick_array_start_index(tick_current, tick_spacing);
    (0..SWAP_TICK_ARRAY_COUNT as i32)
        .map(|i| if zero_for_one { start - i * ticks_in_array } else { start + i * ticks_in_array })
        .collect()
}

pub fn mint_filters(mint0: &Pubkey, mint1: &Pubkey) -> Vec<(usize, Vec<u8>)> {
    vec![
        (TOKEN_MINT0_OFFSET, mint0.to_bytes().to_vec()),
        (TOKEN_MINT1_OFFSET, mint1.to_bytes().to_vec()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_array_start_index() {
        assert_eq!(get_tick_array_start_index(0, 1), 0);
        assert_eq!(get_tick_array_start_index(59, 1), 0);
        assert_eq!(get_tick_array_start_index(60, 1), 60);
        assert_eq!(get_tick_array_start_index(-1, 1), -60);
        assert_eq!(get_tick_array_start_index(-60, 1), -60);
        assert_eq!(get_tick_array_start_index(-61, 10), -600);
        assert_eq!(get_tick_array_start_index(1234, 10), 1200);
    }

    #[test]
    fn test_swap_tick_arrays_follow_direction() {
        assert_eq!(swap_tick_array_start_indexes(5, 1, true), vec![0, -60, -120]);
        assert_eq!(swap_tick_array_start_indexes(5, 1, false), vec![0, 60, 120]);
        let pool = Pubkey::new_unique();
        assert_ne!(get_tick_array_pda(&pool, 0), get_tick_array_pda(&pool, 60));
        assert!(get_tick_array_bitmap_extension_pda(&pool).is_some());
    }
}
