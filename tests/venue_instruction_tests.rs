use native_swap_router::common::Venue;
use native_swap_router::common::mock_rpc::{MockChainClient, fixtures};
use native_swap_router::constants::TOKEN_PROGRAM;
use native_swap_router::instruction::SwapInstructionBuilder;
use native_swap_router::instruction::utils::router::swap_direct_discriminator;
use native_swap_router::resolver::{DexAccountResolver, DexAccounts, PoolRegistry, ResolverConfig};
use native_swap_router::trading::{BuilderConfig, NativeSwapInstructionBuilder, SwapParams};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

const AMOUNT: u64 = 1_000_000;
const MIN_OUT: u64 = 990_000;

struct Setup {
    mock: Arc<MockChainClient>,
    resolver: DexAccountResolver,
    seeded: fixtures::SeededPool,
    user: Pubkey,
}

fn setup(venue: Venue) -> Setup {
    let mock = Arc::new(MockChainClient::new());
    let registry = Arc::new(PoolRegistry::new());
    let seeded = fixtures::seed_pool(&mock, venue, Pubkey::new_unique(), Pubkey::new_unique(), (10_000_000, 20_000_000));
    registry.register(venue, &seeded.mint_a, &seeded.mint_b, seeded.pool);
    let resolver = DexAccountResolver::with_registry(mock.clone(), registry, ResolverConfig::default());
    Setup { mock, resolver, seeded, user: Pubkey::new_unique() }
}

impl Setup {
    async fn both_directions(&self) -> (DexAccounts, DexAccounts) {
        let venue = self.seeded.venue;
        let a_to_b = self.resolver.resolve(venue, &self.seeded.mint_a, &self.seeded.mint_b, &self.user).await.unwrap();
        let b_to_a = self.resolver.resolve(venue, &self.seeded.mint_b, &self.seeded.mint_a, &self.user).await.unwrap();
        (a_to_b, b_to_a)
    }
}

fn assert_amounts(data: &[u8], offset: usize) {
    assert_eq!(&data[offset..offset + 8], &AMOUNT.to_le_bytes());
    assert_eq!(&data[offset + 8..offset + 16], &MIN_OUT.to_le_bytes());
}

#[tokio::test]
async fn test_raydium_amm_v4_swap_base_in() {
    let s = setup(Venue::RaydiumAmmV4);
    let (forward, reverse) = s.both_directions().await;

    let ix = forward.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(ix.program_id, Venue::RaydiumAmmV4.program_id().unwrap());
    assert_eq!(ix.data.len(), 17);
    assert_eq!(ix.data[0], 9);
    assert_amounts(&ix.data, 1);
    assert_eq!(ix.accounts.len(), 18);
    assert_eq!(ix.accounts[0].pubkey, TOKEN_PROGRAM);
    assert_eq!(ix.accounts[1].pubkey, s.seeded.pool);
    assert_eq!(ix.accounts[5].pubkey, s.seeded.vault_a);
    assert_eq!(ix.accounts[6].pubkey, s.seeded.vault_b);
    assert!(ix.accounts[17].is_signer);
    assert_eq!(ix.accounts[17].pubkey, s.user);

    // pool vaults stay in coin / pc order, user accounts swap
    let back = reverse.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(back.accounts[5].pubkey, s.seeded.vault_a);
    assert_eq!(back.accounts[15].pubkey, ix.accounts[16].pubkey);
    assert_eq!(back.accounts[16].pubkey, ix.accounts[15].pubkey);
}

#[tokio::test]
async fn test_raydium_cpmm_swap_base_input() {
    let s = setup(Venue::RaydiumCpmm);
    let (forward, reverse) = s.both_directions().await;

    let ix = forward.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(ix.data.len(), 24);
    assert_eq!(&ix.data[..8], &[143, 190, 90, 218, 196, 30, 51, 222]);
    assert_amounts(&ix.data, 8);
    assert_eq!(ix.accounts.len(), 13);
    assert!(ix.accounts[0].is_signer);
    assert_eq!(ix.accounts[3].pubkey, s.seeded.pool);
    assert_eq!(ix.accounts[6].pubkey, s.seeded.vault_a);
    assert_eq!(ix.accounts[7].pubkey, s.seeded.vault_b);
    assert_eq!(ix.accounts[10].pubkey, s.seeded.mint_a);
    assert_eq!(ix.accounts[11].pubkey, s.seeded.mint_b);

    let back = reverse.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(back.accounts[6].pubkey, s.seeded.vault_b);
    assert_eq!(back.accounts[10].pubkey, s.seeded.mint_b);
}

#[tokio::test]
async fn test_raydium_clmm_swap_v2() {
    let s = setup(Venue::RaydiumClmm);
    let (forward, reverse) = s.both_directions().await;
    let DexAccounts::RaydiumClmm(clmm) = &forward else { panic!("wrong venue") };
    assert!(clmm.zero_for_one());
    assert!(!clmm.tick_arrays.is_empty());

    let ix = forward.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(ix.data.len(), 41);
    assert_eq!(&ix.data[..8], &[43, 4, 237, 11, 26, 201, 30, 98]);
    assert_amounts(&ix.data, 8);
    assert_eq!(&ix.data[24..40], &[0u8; 16]);
    assert_eq!(ix.data[40], 1);
    assert_eq!(ix.accounts.len(), 13 + 1 + clmm.tick_arrays.len());
    assert_eq!(ix.accounts[2].pubkey, s.seeded.pool);
    assert_eq!(ix.accounts[13].pubkey, clmm.tick_array_bitmap_extension);
    assert_eq!(ix.accounts[14].pubkey, clmm.tick_arrays[0]);
    assert!(ix.accounts[14..].iter().all(|meta| meta.is_writable));

    let DexAccounts::RaydiumClmm(back) = &reverse else { panic!("wrong venue") };
    assert!(!back.zero_for_one());
    assert_eq!(back.meta.input_vault, s.seeded.vault_b);
}

#[tokio::test]
async fn test_orca_whirlpool_swap() {
    let s = setup(Venue::OrcaWhirlpool);
    let (forward, reverse) = s.both_directions().await;

    let ix = forward.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(ix.data.len(), 42);
    assert_eq!(&ix.data[..8], &[248, 198, 158, 145, 225, 117, 135, 200]);
    assert_amounts(&ix.data, 8);
    assert_eq!(ix.data[40], 1);
    assert_eq!(ix.data[41], 1);
    assert_eq!(ix.accounts.len(), 11);
    assert_eq!(ix.accounts[2].pubkey, s.seeded.pool);
    assert_eq!(ix.accounts[4].pubkey, s.seeded.vault_a);
    assert_eq!(ix.accounts[6].pubkey, s.seeded.vault_b);

    let back = reverse.build_swap_instruction(AMOUNT, MIN_OUT);
    assert_eq!(back.data[41], 0);
    // price limit differs by direction
    assert_ne!(&back.data[24..40], &ix.data[24..40]);
    // token A / B slots never swap
    assert_eq!(back.accounts[4].pubkey, s.seeded.vault_a);
    assert_eq!(back.accounts[3].pubkey, ix.accounts[3].pubkey);
}

#[tokio::test]
async fn test_meteora_dlmm_swap() {
    let s = setup(Venue::MeteoraDlmm);
    let (forward, reverse) = s.both_directions().await;
    let DexAccounts::MeteoraDlmm(dlmm) = &forward else { panic!("wrong venue") };
    assert!(dlmm.swap_for_y());
    assert!(dlmm.bin_array_bitmap_extension.is_none());

    let ix = forward.build_swap_instruction(AMOUNT, MIN_OUT);
    let program = Venue::MeteoraDlmm.program_id().unwrap();
    assert_eq!(ix.data.len(), 24);
    assert_eq!(&ix.data[..8], &[248, 198, 158, 145, 225, 117, 135, 200]);
    assert_amounts(&ix.data, 8);
    assert_eq!(ix.accounts.len(), 15 + dlmm.bin_arrays.len());
    assert_eq!(ix.accounts[0].pubkey, s.seeded.pool);
    // missing bitmap extension is passed as the program id
    assert_eq!(ix.accounts[1].pubkey, program);
    assert_eq!(ix.accounts[2].pubkey, s.seeded.vault_a);
    assert_eq!(ix.accounts[3].pubkey, s.seeded.vault_b);
    assert!(ix.accounts[10].is_signer);
    assert_eq!(ix.accounts[14].pubkey, program);

    let DexAccounts::MeteoraDlmm(back) = &reverse else { panic!("wrong venue") };
    assert!(!back.swap_for_y());
    assert_eq!(back.user_token_in, dlmm.user_token_out);
}

#[tokio::test]
async fn test_router_wraps_every_venue() {
    for venue in Venue::NATIVE {
        let s = setup(venue);
        let (forward, _) = s.both_directions().await;
        let builder = NativeSwapInstructionBuilder::new(
            s.mock.clone(),
            BuilderConfig { create_output_ata: false, ..BuilderConfig::default() },
        );
        let built = builder
            .prepare(&s.user, &forward, &SwapParams::new(AMOUNT, 1_000_000, 100), 1_700_000_000)
            .await
            .unwrap();
        assert_eq!(built.min_out, MIN_OUT);

        let inner = forward.build_swap_instruction(AMOUNT, MIN_OUT);
        let swap = built.instructions.last().unwrap();
        assert_eq!(&swap.data[..8], &swap_direct_discriminator());
        assert_eq!(swap.data[8], venue.id(), "{}", venue);
        assert!(swap.data.ends_with(&inner.data));
        assert_eq!(swap.accounts[0].pubkey, s.user);
        assert!(swap.accounts[0].is_signer);
        assert_eq!(swap.accounts[1].pubkey, built.swap_plan);
        assert_eq!(swap.accounts[2].pubkey, inner.program_id);
        assert!(!swap.accounts[2].is_writable);
        assert_eq!(swap.accounts.len(), 3 + inner.accounts.len());
        assert_eq!(s.mock.write_calls(), 0);
    }
}
