//! Venue account sets
//!
//! [`PoolSnapshot`] 是缓存的、与方向无关的池子元数据（A→B 和 B→A 共用）；
//! [`DexAccounts`] 是针对一次 swap 派生出来的完整账户集合（含用户 ATA），不缓存。

use crate::common::{RouterError, RouterResult, Venue};
use crate::constants::{MEMO_PROGRAM, TOKEN_PROGRAM, TOKEN_PROGRAM_2022};
use crate::instruction::utils::meteora_dlmm::{self, accounts::DLMM_PROGRAM};
use crate::instruction::utils::meteora_dlmm_types::LbPair;
use crate::instruction::utils::openbook::MarketAccounts;
use crate::instruction::utils::orca_whirlpool;
use crate::instruction::utils::orca_whirlpool_types::Whirlpool;
use crate::instruction::utils::raydium_amm_v4::accounts::AUTHORITY_META;
use crate::instruction::utils::raydium_amm_v4_types::AmmInfo;
use crate::instruction::utils::raydium_clmm;
use crate::instruction::utils::raydium_clmm_types::PoolState as ClmmPoolState;
use crate::instruction::utils::raydium_cpmm::accounts::AUTHORITY_META as CPMM_AUTHORITY_META;
use crate::instruction::utils::raydium_cpmm_types::PoolState as CpmmPoolState;
use crate::instruction::utils::spl_token::get_associated_token_address;
use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};

/// Direction-independent summary shared by every venue account set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DexAccountsMeta {
    pub venue: Venue,
    pub program_id: Pubkey,
    pub pool: Pubkey,
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub input_vault: Pubkey,
    pub output_vault: Pubkey,
    pub input_token_program: Pubkey,
    pub output_token_program: Pubkey,
    /// Input is the pool's base side (coin / token0 / token A / token X).
    pub input_is_base: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaydiumAmmV4Accounts {
    pub meta: DexAccountsMeta,
    pub amm: Pubkey,
    pub open_orders: Pubkey,
    pub target_orders: Pubkey,
    pub coin_vault: Pubkey,
    pub pc_vault: Pubkey,
    pub market: MarketAccounts,
    pub user_source: Pubkey,
    pub user_destination: Pubkey,
}

impl RaydiumAmmV4Accounts {
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let accounts: [AccountMeta; 18] = [
            crate::constants::TOKEN_PROGRAM_META,          // Token Program (readonly)
            AccountMeta::new(self.amm, false),             // Amm
            AUTHORITY_META,                                // Authority (readonly)
            AccountMeta::new(self.open_orders, false),     // Amm Open Orders
            AccountMeta::new(self.target_orders, false),   // Amm Target Orders
            AccountMeta::new(self.coin_vault, false),      // Pool Coin Token Account
            AccountMeta::new(self.pc_vault, false),        // Pool Pc Token Account
            AccountMeta::new_readonly(self.market.program, false), // Serum Program
            AccountMeta::new(self.market.market, false),   // Serum Market
            AccountMeta::new(self.market.bids, false),     // Serum Bids
            AccountMeta::new(self.market.asks, false),     // Serum Asks
            AccountMeta::new(self.market.event_queue, false), // Serum Event Queue
            AccountMeta::new(self.market.base_vault, false), // Serum Coin Vault Account
            AccountMeta::new(self.market.quote_vault, false), // Serum Pc Vault Account
            AccountMeta::new_readonly(self.market.vault_signer, false), // Serum Vault Signer
            AccountMeta::new(self.user_source, false),     // User Source Token Account
            AccountMeta::new(self.user_destination, false), // User Destination Token Account
            AccountMeta::new_readonly(self.meta.user, true), // User Source Owner
        ];
        accounts.to_vec()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaydiumCpmmAccounts {
    pub meta: DexAccountsMeta,
    pub amm_config: Pubkey,
    pub observation: Pubkey,
    pub user_input: Pubkey,
    pub user_output: Pubkey,
}

impl RaydiumCpmmAccounts {
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let m = &self.meta;
        let accounts: [AccountMeta; 13] = [
            AccountMeta::new(m.user, true),                          // Payer (signer)
            CPMM_AUTHORITY_META,                                     // Authority (readonly)
            AccountMeta::new_readonly(self.amm_config, false),       // Amm Config (readonly)
            AccountMeta::new(m.pool, false),                         // Pool State
            AccountMeta::new(self.user_input, false),                // Input Token Account
            AccountMeta::new(self.user_output, false),               // Output Token Account
            AccountMeta::new(m.input_vault, false),                  // Input Vault Account
            AccountMeta::new(m.output_vault, false),                 // Output Vault Account
            AccountMeta::new_readonly(m.input_token_program, false), // Input Token Program (readonly)
            AccountMeta::new_readonly(m.output_token_program, false), // Output Token Program (readonly)
            AccountMeta::new_readonly(m.input_mint, false),          // Input token mint (readonly)
            AccountMeta::new_readonly(m.output_mint, false),         // Output token mint (readonly)
            AccountMeta::new(self.observation, false),               // Observation State Account
        ];
        accounts.to_vec()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaydiumClmmAccounts {
    pub meta: DexAccountsMeta,
    pub amm_config: Pubkey,
    pub observation: Pubkey,
    pub user_input: Pubkey,
    pub user_output: Pubkey,
    pub tick_array_bitmap_extension: Pubkey,
    /// Ordered in the swap direction, current array first.
    pub tick_arrays: Vec<Pubkey>,
}

impl RaydiumClmmAccounts {
    pub fn zero_for_one(&self) -> bool {
        self.meta.input_is_base
    }

    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let m = &self.meta;
        // SwapV2 主账户（13 个）
        let mut accounts = vec![
            AccountMeta::new_readonly(m.user, true),           // 0. Payer (signer, readonly)
            AccountMeta::new_readonly(self.amm_config, false), // 1. Amm Config (readonly)
            AccountMeta::new(m.pool, false),                   // 2. Pool State (writable)
            AccountMeta::new(self.user_input, false),          // 3. Input Token Account (writable)
            AccountMeta::new(self.user_output, false),         // 4. Output Token Account (writable)
            AccountMeta::new(m.input_vault, false),            // 5. Input Vault (writable)
            AccountMeta::new(m.output_vault, false),           // 6. Output Vault (writable)
            AccountMeta::new(self.observation, false),         // 7. Observation State (writable)
            AccountMeta::new_readonly(TOKEN_PROGRAM, false),   // 8. Token Program (readonly)
            AccountMeta::new_readonly(TOKEN_PROGRAM_2022, false), // 9. Token 2022 Program (readonly)
            AccountMeta::new_readonly(MEMO_PROGRAM, false),    // 10. Memo Program (readonly)
            AccountMeta::new_readonly(m.input_mint, false),    // 11. Input Mint (readonly)
            AccountMeta::new_readonly(m.output_mint, false),   // 12. Output Mint (readonly)
        ];
        // remaining accounts: bitmap extension (readonly) + tick arrays (writable)
        accounts.push(AccountMeta::new_readonly(self.tick_array_bitmap_extension, false));
        accounts.extend(self.tick_arrays.iter().map(|key| AccountMeta::new(*key, false)));
        accounts
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrcaWhirlpoolAccounts {
    pub meta: DexAccountsMeta,
    pub token_owner_account_a: Pubkey,
    pub token_vault_a: Pubkey,
    pub token_owner_account_b: Pubkey,
    pub token_vault_b: Pubkey,
    pub tick_arrays: [Pubkey; 3],
    pub oracle: Pubkey,
}

impl OrcaWhirlpoolAccounts {
    pub fn a_to_b(&self) -> bool {
        self.meta.input_is_base
    }

    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let accounts: [AccountMeta; 11] = [
            crate::constants::TOKEN_PROGRAM_META,                // Token Program (readonly)
            AccountMeta::new_readonly(self.meta.user, true),     // Token Authority (signer)
            AccountMeta::new(self.meta.pool, false),             // Whirlpool
            AccountMeta::new(self.token_owner_account_a, false), // Token Owner Account A
            AccountMeta::new(self.token_vault_a, false),         // Token Vault A
            AccountMeta::new(self.token_owner_account_b, false), // Token Owner Account B
            AccountMeta::new(self.token_vault_b, false),         // Token Vault B
            AccountMeta::new(self.tick_arrays[0], false),        // Tick Array 0
            AccountMeta::new(self.tick_arrays[1], false),        // Tick Array 1
            AccountMeta::new(self.tick_arrays[2], false),        // Tick Array 2
            AccountMeta::new(self.oracle, false),                // Oracle
        ];
        accounts.to_vec()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeteoraDlmmAccounts {
    pub meta: DexAccountsMeta,
    /// `None` when the pair has no bitmap extension; the program id is passed instead.
    pub bin_array_bitmap_extension: Option<Pubkey>,
    pub reserve_x: Pubkey,
    pub reserve_y: Pubkey,
    pub token_x_mint: Pubkey,
    pub token_y_mint: Pubkey,
    pub token_x_program: Pubkey,
    pub token_y_program: Pubkey,
    pub oracle: Pubkey,
    pub user_token_in: Pubkey,
    pub user_token_out: Pubkey,
    pub event_authority: Pubkey,
    pub bin_arrays: Vec<Pubkey>,
}

impl MeteoraDlmmAccounts {
    pub fn swap_for_y(&self) -> bool {
        self.meta.input_is_base
    }

    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        let optional = |key: Option<Pubkey>| key.unwrap_or(DLMM_PROGRAM);
        let mut accounts = vec![
            AccountMeta::new(self.meta.pool, false), // Lb Pair
            AccountMeta::new_readonly(optional(self.bin_array_bitmap_extension), false), // Bitmap Extension (optional)
            AccountMeta::new(self.reserve_x, false),       // Reserve X
            AccountMeta::new(self.reserve_y, false),       // Reserve Y
            AccountMeta::new(self.user_token_in, false),   // User Token In
            AccountMeta::new(self.user_token_out, false),  // User Token Out
            AccountMeta::new_readonly(self.token_x_mint, false), // Token X Mint
            AccountMeta::new_readonly(self.token_y_mint, false), // Token Y Mint
            AccountMeta::new(self.oracle, false),          // Oracle
            AccountMeta::new_readonly(DLMM_PROGRAM, false), // Host Fee In (none)
            AccountMeta::new_readonly(self.meta.user, true), // User (signer)
            AccountMeta::new_readonly(self.token_x_program, false), // Token X Program
            AccountMeta::new_readonly(self.token_y_program, false), // Token Y Program
            AccountMeta::new_readonly(self.event_authority, false), // Event Authority
            AccountMeta::new_readonly(DLMM_PROGRAM, false), // Program
        ];
        accounts.extend(self.bin_arrays.iter().map(|key| AccountMeta::new(*key, false)));
        accounts
    }
}

/// Exact account set for one swap on one native venue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DexAccounts {
    RaydiumAmmV4(RaydiumAmmV4Accounts),
    RaydiumCpmm(RaydiumCpmmAccounts),
    RaydiumClmm(RaydiumClmmAccounts),
    OrcaWhirlpool(OrcaWhirlpoolAccounts),
    MeteoraDlmm(MeteoraDlmmAccounts),
}

impl DexAccounts {
    pub fn meta(&self) -> &DexAccountsMeta {
        match self {
            DexAccounts::RaydiumAmmV4(a) => &a.meta,
            DexAccounts::RaydiumCpmm(a) => &a.meta,
            DexAccounts::RaydiumClmm(a) => &a.meta,
            DexAccounts::OrcaWhirlpool(a) => &a.meta,
            DexAccounts::MeteoraDlmm(a) => &a.meta,
        }
    }

    pub fn venue(&self) -> Venue {
        self.meta().venue
    }

    pub fn program_id(&self) -> Pubkey {
        self.meta().program_id
    }

    /// Accounts in the order the venue's swap instruction expects them.
    pub fn to_account_metas(&self) -> Vec<AccountMeta> {
        match self {
            DexAccounts::RaydiumAmmV4(a) => a.to_account_metas(),
            DexAccounts::RaydiumCpmm(a) => a.to_account_metas(),
            DexAccounts::RaydiumClmm(a) => a.to_account_metas(),
            DexAccounts::OrcaWhirlpool(a) => a.to_account_metas(),
            DexAccounts::MeteoraDlmm(a) => a.to_account_metas(),
        }
    }
}

// ==================== 缓存的池子快照 ====================

/// Pool metadata cached per unordered mint pair.
#[derive(Clone, Debug)]
pub enum PoolSnapshot {
    RaydiumAmmV4 { pool: Pubkey, info: AmmInfo, market: MarketAccounts },
    RaydiumCpmm { pool: Pubkey, state: CpmmPoolState },
    RaydiumClmm {
        pool: Pubkey,
        state: ClmmPoolState,
        token_program0: Pubkey,
        token_program1: Pubkey,
        tick_array_bitmap_extension: Pubkey,
        tick_arrays_zero_for_one: Vec<Pubkey>,
        tick_arrays_one_for_zero: Vec<Pubkey>,
    },
    OrcaWhirlpool {
        pool: Pubkey,
        state: Whirlpool,
        token_program_a: Pubkey,
        token_program_b: Pubkey,
        oracle: Pubkey,
        /// `None` when no tick array exists in that direction.
        tick_arrays_a_to_b: Option<[Pubkey; 3]>,
        tick_arrays_b_to_a: Option<[Pubkey; 3]>,
    },
    MeteoraDlmm {
        pool: Pubkey,
        state: Box<LbPair>,
        token_x_program: Pubkey,
        token_y_program: Pubkey,
        bin_array_bitmap_extension: Option<Pubkey>,
        event_authority: Pubkey,
        bin_arrays_x_to_y: Vec<Pubkey>,
        bin_arrays_y_to_x: Vec<Pubkey>,
    },
}

/// Base / quote side of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSide {
    pub mint: Pubkey,
    pub vault: Pubkey,
    pub token_program: Pubkey,
}

impl PoolSnapshot {
    pub fn venue(&self) -> Venue {
        match self {
            PoolSnapshot::RaydiumAmmV4 { .. } => Venue::RaydiumAmmV4,
            PoolSnapshot::RaydiumCpmm { .. } => Venue::RaydiumCpmm,
            PoolSnapshot::RaydiumClmm { .. } => Venue::RaydiumClmm,
            PoolSnapshot::OrcaWhirlpool { .. } => Venue::OrcaWhirlpool,
            PoolSnapshot::MeteoraDlmm { .. } => Venue::MeteoraDlmm,
        }
    }

    pub fn pool(&self) -> Pubkey {
        match self {
            PoolSnapshot::RaydiumAmmV4 { pool, .. }
            | PoolSnapshot::RaydiumCpmm { pool, .. }
            | PoolSnapshot::RaydiumClmm { pool, .. }
            | PoolSnapshot::OrcaWhirlpool { pool, .. }
            | PoolSnapshot::MeteoraDlmm { pool, .. } => *pool,
        }
    }

    /// (base, quote) sides of the pool.
    pub fn sides(&self) -> (PoolSide, PoolSide) {
        let side = |mint: Pubkey, vault: Pubkey, token_program: Pubkey| PoolSide {
            mint,
            vault,
            token_program,
        };
        match self {
            PoolSnapshot::RaydiumAmmV4 { info, .. } => (
                side(info.coin_mint, info.token_coin, TOKEN_PROGRAM),
                side(info.pc_mint, info.token_pc, TOKEN_PROGRAM),
            ),
            PoolSnapshot::RaydiumCpmm { state, .. } => (
                side(state.token0_mint, state.token0_vault, state.token0_program),
                side(state.token1_mint, state.token1_vault, state.token1_program),
            ),
            PoolSnapshot::RaydiumClmm { state, token_program0, token_program1, .. } => (
                side(state.token_mint0, state.token_vault0, *token_program0),
                side(state.token_mint1, state.token_vault1, *token_program1),
            ),
            PoolSnapshot::OrcaWhirlpool { state, token_program_a, token_program_b, .. } => (
                side(state.token_mint_a, state.token_vault_a, *token_program_a),
                side(state.token_mint_b, state.token_vault_b, *token_program_b),
            ),
            PoolSnapshot::MeteoraDlmm { state, token_x_program, token_y_program, .. } => (
                side(state.token_x_mint, state.reserve_x, *token_x_program),
                side(state.token_y_mint, state.reserve_y, *token_y_program),
            ),
        }
    }

    /// Derive the per-swap account set. User ATAs are computed here and never cached.
    pub fn to_dex_accounts(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        user: &Pubkey,
    ) -> RouterResult<DexAccounts> {
        let (base, quote) = self.sides();
        let input_is_base = if *input_mint == base.mint && *output_mint == quote.mint {
            true
        } else if *input_mint == quote.mint && *output_mint == base.mint {
            false
        } else {
            return Err(RouterError::AccountNotFound(format!(
                "{} pool {} does not hold {} / {}",
                self.venue(),
                self.pool(),
                input_mint,
                output_mint
            )));
        };
        let (input, output) = if input_is_base { (base, quote) } else { (quote, base) };
        let user_input = get_associated_token_address(user, &input.mint, &input.token_program);
        let user_output = get_associated_token_address(user, &output.mint, &output.token_program);

        let meta = DexAccountsMeta {
            venue: self.venue(),
            program_id: self.venue().program_id().unwrap_or_default(),
            pool: self.pool(),
            user: *user,
            input_mint: input.mint,
            output_mint: output.mint,
            input_vault: input.vault,
            output_vault: output.vault,
            input_token_program: input.token_program,
            output_token_program: output.token_program,
            input_is_base,
        };

        let accounts = match self {
            PoolSnapshot::RaydiumAmmV4 { pool, info, market } => {
                DexAccounts::RaydiumAmmV4(RaydiumAmmV4Accounts {
                    meta,
                    amm: *pool,
                    open_orders: info.open_orders,
                    target_orders: info.target_orders,
                    coin_vault: info.token_coin,
                    pc_vault: info.token_pc,
                    market: market.clone(),
                    user_source: user_input,
                    user_destination: user_output,
                })
            }
            PoolSnapshot::RaydiumCpmm { state, .. } => {
                DexAccounts::RaydiumCpmm(RaydiumCpmmAccounts {
                    meta,
                    amm_config: state.amm_config,
                    observation: state.observation_key,
                    user_input,
                    user_output,
                })
            }
            PoolSnapshot::RaydiumClmm {
                state,
                tick_array_bitmap_extension,
                tick_arrays_zero_for_one,
                tick_arrays_one_for_zero,
                ..
            } => {
                let tick_arrays =
                    if input_is_base { tick_arrays_zero_for_one } else { tick_arrays_one_for_zero };
                if tick_arrays.is_empty() {
                    return Err(no_arrays(self));
                }
                DexAccounts::RaydiumClmm(RaydiumClmmAccounts {
                    meta,
                    amm_config: state.amm_config,
                    observation: state.observation_key,
                    user_input,
                    user_output,
                    tick_array_bitmap_extension: *tick_array_bitmap_extension,
                    tick_arrays: tick_arrays.clone(),
                })
            }
            PoolSnapshot::OrcaWhirlpool {
                state,
                oracle,
                tick_arrays_a_to_b,
                tick_arrays_b_to_a,
                ..
            } => {
                let tick_arrays = if input_is_base { tick_arrays_a_to_b } else { tick_arrays_b_to_a };
                let Some(tick_arrays) = *tick_arrays else {
                    return Err(no_arrays(self));
                };
                let (owner_a, owner_b) =
                    if input_is_base { (user_input, user_output) } else { (user_output, user_input) };
                DexAccounts::OrcaWhirlpool(OrcaWhirlpoolAccounts {
                    meta,
                    token_owner_account_a: owner_a,
                    token_vault_a: state.token_vault_a,
                    token_owner_account_b: owner_b,
                    token_vault_b: state.token_vault_b,
                    tick_arrays,
                    oracle: *oracle,
                })
            }
            PoolSnapshot::MeteoraDlmm {
                state,
                token_x_program,
                token_y_program,
                bin_array_bitmap_extension,
                event_authority,
                bin_arrays_x_to_y,
                bin_arrays_y_to_x,
                ..
            } => {
                let bin_arrays = if input_is_base { bin_arrays_x_to_y } else { bin_arrays_y_to_x };
                if bin_arrays.is_empty() {
                    return Err(no_arrays(self));
                }
                DexAccounts::MeteoraDlmm(MeteoraDlmmAccounts {
                    meta,
                    bin_array_bitmap_extension: *bin_array_bitmap_extension,
                    reserve_x: state.reserve_x,
                    reserve_y: state.reserve_y,
                    token_x_mint: state.token_x_mint,
                    token_y_mint: state.token_y_mint,
                    token_x_program: *token_x_program,
                    token_y_program: *token_y_program,
                    oracle: state.oracle,
                    user_token_in: user_input,
                    user_token_out: user_output,
                    event_authority: *event_authority,
                    bin_arrays: bin_arrays.clone(),
                })
            }
        };
        Ok(accounts)
    }
}

fn no_arrays(snapshot: &PoolSnapshot) -> RouterError {
    RouterError::AccountResolutionFailed(format!(
        "{} pool {} has no initialized tick/bin array in the swap direction",
        snapshot.venue(),
        snapshot.pool()
    ))
}

/// Whirlpool always takes three tick arrays; missing trailing arrays repeat the last existing one.
pub fn pad_tick_arrays(existing: &[Pubkey]) -> Option<[Pubkey; 3]> {
    let last = *existing.last()?;
    let mut out = [last; 3];
    for (slot, key) in out.iter_mut().zip(existing.iter()) {
        *slot = *key;
    }
    Some(out)
}

/// Leading run of keys whose account exists; stops at the first gap.
pub fn existing_prefix(keys: &[Pubkey], exists: impl Fn(&Pubkey) -> bool) -> Vec<Pubkey> {
    keys.iter().take_while(|k| exists(k)).copied().collect()
}

/// Keys of the tick / bin arrays a swap may cross, both directions, current first.
pub(crate) fn array_candidates(
    venue: Venue,
    pool: &Pubkey,
    current: i32,
    spacing: u16,
) -> (Vec<Pubkey>, Vec<Pubkey>) {
    match venue {
        Venue::RaydiumClmm => {
            let keys = |zero_for_one: bool| {
                raydium_clmm::swap_tick_array_start_indexes(current, spacing, zero_for_one)
                    .into_iter()
                    .filter_map(|start| raydium_clmm::get_tick_array_pda(pool, start))
                    .collect::<Vec<_>>()
            };
            (keys(true), keys(false))
        }
        Venue::OrcaWhirlpool => {
            let keys = |a_to_b: bool| {
                orca_whirlpool::swap_tick_array_start_indexes(current, spacing, a_to_b)
                    .into_iter()
                    .filter_map(|start| orca_whirlpool::get_tick_array_pda(pool, start))
                    .collect::<Vec<_>>()
            };
            (keys(true), keys(false))
        }
        Venue::MeteoraDlmm => {
            let keys = |swap_for_y: bool| {
                meteora_dlmm::swap_bin_array_indexes(current, swap_for_y)
                    .into_iter()
                    .filter_map(|index| meteora_dlmm::get_bin_array_pda(pool, index))
                    .collect::<Vec<_>>()
            };
            (keys(true), keys(false))
        }
        _ => (Vec::new(), Vec::new()),
    }
}
