//! 内存版 ChainClient，用于测试
//!
//! `MockChainClient` 保存账户快照，并记录读写调用次数：
//! - `read_calls()`: getMultipleAccounts / getProgramAccounts / getLatestBlockhash
//! - `write_calls()`: sendTransaction
//!
//! 还可以注入失败（下 N 次读取失败、发送结果队列）以及读取延迟，
//! 用来测试缓存、合并请求以及执行回退链。

use super::{ChainClient, RouterError, RouterResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use solana_hash::Hash;
use solana_sdk::{
    account::Account, pubkey::Pubkey, signature::Signature, transaction::VersionedTransaction,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct MockChainClient {
    accounts: DashMap<Pubkey, Account>,
    blockhash: Hash,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    /// 接下来 N 次读取直接返回 RpcError
    failing_reads: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    send_results: Mutex<VecDeque<RouterResult<Signature>>>,
    sent: Mutex<Vec<VersionedTransaction>>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            blockhash: Hash::new_from_array([7u8; 32]),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            failing_reads: AtomicUsize::new(0),
            read_delay: Mutex::new(None),
            send_results: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_account(&self, key: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.accounts.insert(
            key,
            Account { lamports: 1_000_000_000, data, owner, executable: false, rent_epoch: 0 },
        );
    }

    pub fn remove_account(&self, key: &Pubkey) {
        self.accounts.remove(key);
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    /// Queue the outcome of the next `send_transaction` call.
    /// With an empty queue every send succeeds with the transaction's own signature.
    pub fn push_send_result(&self, result: RouterResult<Signature>) {
        self.send_results.lock().push_back(result);
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn sent_transactions(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().clone()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    async fn begin_read(&self) -> RouterResult<()> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(RouterError::RpcError("mock: injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> RouterResult<Vec<Option<Account>>> {
        self.begin_read().await?;
        Ok(keys.iter().map(|k| self.accounts.get(k).map(|a| a.clone())).collect())
    }

    async fn get_program_accounts_with_memcmp(
        &self,
        program_id: &Pubkey,
        filters: Vec<(usize, Vec<u8>)>,
        data_size: Option<u64>,
    ) -> RouterResult<Vec<(Pubkey, Vec<u8>)>> {
        self.begin_read().await?;
        let mut out: Vec<(Pubkey, Vec<u8>)> = self
            .accounts
            .iter()
            .filter(|entry| entry.value().owner == *program_id)
            .filter(|entry| data_size.is_none_or(|size| entry.value().data.len() as u64 == size))
            .filter(|entry| {
                let data = &entry.value().data;
                filters.iter().all(|(offset, bytes)| {
                    data.get(*offset..offset + bytes.len()).is_some_and(|slice| slice == bytes)
                })
            })
            .map(|entry| (*entry.key(), entry.value().data.clone()))
            .collect();
        out.sort_by_key(|(key, _)| *key);
        Ok(out)
    }

    async fn get_latest_blockhash(&self) -> RouterResult<Hash> {
        self.begin_read().await?;
        Ok(self.blockhash)
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> RouterResult<Signature> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(transaction.clone());
        match self.send_results.lock().pop_front() {
            Some(result) => result,
            None => Ok(transaction.signatures.first().copied().unwrap_or_default()),
        }
    }
}

/// 手工构造的账户数据，布局与链上一致，只填路由需要读取的字段。
pub mod fixtures {
    use super::MockChainClient;
    use crate::common::Venue;
    use crate::constants::TOKEN_PROGRAM;
    use crate::instruction::utils::{
        meteora_dlmm, meteora_dlmm_types, openbook, orca_whirlpool, orca_whirlpool_types,
        raydium_amm_v4, raydium_amm_v4_types, raydium_clmm, raydium_clmm_types, raydium_cpmm,
        raydium_cpmm_types, router,
    };
    use solana_sdk::pubkey::Pubkey;

    fn put(data: &mut [u8], offset: usize, bytes: &[u8]) {
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn anchor_account(discriminator: &[u8; 8], size: usize) -> Vec<u8> {
        let mut data = vec![0u8; size];
        put(&mut data, 0, discriminator);
        data
    }

    /// 165 字节 SPL token account，状态为 Initialized。
    pub fn token_account_data(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
        let mut data = vec![0u8; 165];
        put(&mut data, 0, mint.as_ref());
        put(&mut data, 32, owner.as_ref());
        put(&mut data, 64, &amount.to_le_bytes());
        data[108] = 1;
        data
    }

    /// 82 字节 SPL mint，已初始化，无 authority。
    pub fn mint_data(decimals: u8) -> Vec<u8> {
        let mut data = vec![0u8; 82];
        data[44] = decimals;
        data[45] = 1;
        data
    }

    /// Lookup table：u32 状态标签 1，56 字节 meta，之后紧排地址。`u64::MAX` 表示未停用。
    pub fn lookup_table_data(deactivation_slot: u64, addresses: &[Pubkey]) -> Vec<u8> {
        let mut data = vec![0u8; 56 + addresses.len() * 32];
        put(&mut data, 0, &1u32.to_le_bytes());
        put(&mut data, 4, &deactivation_slot.to_le_bytes());
        for (i, address) in addresses.iter().enumerate() {
            put(&mut data, 56 + i * 32, address.as_ref());
        }
        data
    }

    pub fn amm_v4_pool_data(
        coin_mint: &Pubkey,
        pc_mint: &Pubkey,
        token_coin: &Pubkey,
        token_pc: &Pubkey,
        open_orders: &Pubkey,
        target_orders: &Pubkey,
        market: &Pubkey,
        serum_dex: &Pubkey,
    ) -> Vec<u8> {
        let mut data = vec![0u8; raydium_amm_v4_types::AMM_INFO_SIZE];
        put(&mut data, 0, &raydium_amm_v4::pool_status::ACTIVE.to_le_bytes());
        put(&mut data, 336, token_coin.as_ref());
        put(&mut data, 368, token_pc.as_ref());
        put(&mut data, raydium_amm_v4_types::COIN_MINT_OFFSET, coin_mint.as_ref());
        put(&mut data, raydium_amm_v4_types::PC_MINT_OFFSET, pc_mint.as_ref());
        put(&mut data, 496, open_orders.as_ref());
        put(&mut data, 528, market.as_ref());
        put(&mut data, 560, serum_dex.as_ref());
        put(&mut data, 592, target_orders.as_ref());
        data
    }

    /// Market bytes plus the first nonce that yields a valid vault signer.
    pub fn openbook_market_data(
        market: &Pubkey,
        program: &Pubkey,
        base_mint: &Pubkey,
        quote_mint: &Pubkey,
    ) -> (Vec<u8>, u64) {
        let nonce = (0u64..)
            .find(|n| openbook::vault_signer_address(market, *n, program).is_some())
            .unwrap_or_default();
        let mut data = vec![0u8; openbook::MARKET_STATE_SIZE];
        put(&mut data, 0, b"serum");
        put(&mut data, 13, market.as_ref());
        put(&mut data, 45, &nonce.to_le_bytes());
        put(&mut data, 53, base_mint.as_ref());
        put(&mut data, 85, quote_mint.as_ref());
        put(&mut data, 117, Pubkey::new_unique().as_ref());
        put(&mut data, 165, Pubkey::new_unique().as_ref());
        put(&mut data, 221, Pubkey::new_unique().as_ref());
        put(&mut data, 253, Pubkey::new_unique().as_ref());
        put(&mut data, 285, Pubkey::new_unique().as_ref());
        put(&mut data, 317, Pubkey::new_unique().as_ref());
        put(&mut data, 381, b"padding");
        (data, nonce)
    }

    pub fn cpmm_pool_data(
        amm_config: &Pubkey,
        token0_mint: &Pubkey,
        token1_mint: &Pubkey,
        token0_vault: &Pubkey,
        token1_vault: &Pubkey,
        observation: &Pubkey,
    ) -> Vec<u8> {
        let mut data = anchor_account(&raydium_cpmm_types::POOL_STATE_DISCRIMINATOR, raydium_cpmm_types::POOL_STATE_SIZE);
        put(&mut data, 8, amm_config.as_ref());
        put(&mut data, 72, token0_vault.as_ref());
        put(&mut data, 104, token1_vault.as_ref());
        put(&mut data, 168, token0_mint.as_ref());
        put(&mut data, 200, token1_mint.as_ref());
        put(&mut data, 232, TOKEN_PROGRAM.as_ref());
        put(&mut data, 264, TOKEN_PROGRAM.as_ref());
        put(&mut data, 296, observation.as_ref());
        // auth_bump, status, lp decimals, mint0/mint1 decimals
        put(&mut data, 328, &[255, 0, 9, 9, 6]);
        data
    }

    pub fn cpmm_amm_config_data(trade_fee_rate: u64) -> Vec<u8> {
        let mut data = anchor_account(&raydium_cpmm_types::AMM_CONFIG_DISCRIMINATOR, 236);
        put(&mut data, 12, &trade_fee_rate.to_le_bytes());
        data
    }

    pub fn clmm_pool_data(
        amm_config: &Pubkey,
        mint0: &Pubkey,
        mint1: &Pubkey,
        vault0: &Pubkey,
        vault1: &Pubkey,
        observation: &Pubkey,
        tick_spacing: u16,
        tick_current: i32,
    ) -> Vec<u8> {
        let mut data =
            anchor_account(&raydium_clmm_types::POOL_STATE_DISCRIMINATOR, raydium_clmm_types::POOL_STATE_SIZE);
        data[8] = 255;
        put(&mut data, 9, amm_config.as_ref());
        put(&mut data, 73, mint0.as_ref());
        put(&mut data, 105, mint1.as_ref());
        put(&mut data, 137, vault0.as_ref());
        put(&mut data, 169, vault1.as_ref());
        put(&mut data, 201, observation.as_ref());
        put(&mut data, 233, &[9, 6]);
        put(&mut data, 235, &tick_spacing.to_le_bytes());
        put(&mut data, 269, &tick_current.to_le_bytes());
        data
    }

    pub fn whirlpool_data(
        mint_a: &Pubkey,
        vault_a: &Pubkey,
        mint_b: &Pubkey,
        vault_b: &Pubkey,
        tick_spacing: u16,
        tick_current: i32,
    ) -> Vec<u8> {
        let mut data = anchor_account(
            &orca_whirlpool_types::WHIRLPOOL_DISCRIMINATOR,
            orca_whirlpool_types::WHIRLPOOL_SIZE,
        );
        put(&mut data, 8, Pubkey::new_unique().as_ref());
        data[40] = 255;
        put(&mut data, 41, &tick_spacing.to_le_bytes());
        put(&mut data, 43, &tick_spacing.to_le_bytes());
        put(&mut data, 81, &tick_current.to_le_bytes());
        put(&mut data, 101, mint_a.as_ref());
        put(&mut data, 133, vault_a.as_ref());
        put(&mut data, 181, mint_b.as_ref());
        put(&mut data, 213, vault_b.as_ref());
        data
    }

    pub fn lb_pair_data(
        mint_x: &Pubkey,
        mint_y: &Pubkey,
        reserve_x: &Pubkey,
        reserve_y: &Pubkey,
        oracle: &Pubkey,
        active_id: i32,
        bin_step: u16,
    ) -> Vec<u8> {
        let mut data =
            anchor_account(&meteora_dlmm_types::LB_PAIR_DISCRIMINATOR, meteora_dlmm_types::LB_PAIR_SIZE);
        put(&mut data, 76, &active_id.to_le_bytes());
        put(&mut data, 80, &bin_step.to_le_bytes());
        put(&mut data, 88, mint_x.as_ref());
        put(&mut data, 120, mint_y.as_ref());
        put(&mut data, 152, reserve_x.as_ref());
        put(&mut data, 184, reserve_y.as_ref());
        put(&mut data, 552, oracle.as_ref());
        data
    }

    pub fn swap_plan_data(terms: &router::PlanTerms, expires_at: i64) -> Vec<u8> {
        let mut data = anchor_account(&router::SWAP_PLAN_DISCRIMINATOR, router::SWAP_PLAN_SIZE);
        put(&mut data, 8, terms.user.as_ref());
        put(&mut data, 40, terms.input_mint.as_ref());
        put(&mut data, 72, terms.output_mint.as_ref());
        put(&mut data, 104, &terms.amount.to_le_bytes());
        put(&mut data, 112, &terms.min_out.to_le_bytes());
        data[120] = terms.venue;
        put(&mut data, 121, &expires_at.to_le_bytes());
        data[129] = 255;
        data
    }

    /// Pool written into a [`MockChainClient`] together with everything the resolver reads.
    ///
    /// `mint_a` is the base side (coin / token0 / token A / token X).
    #[derive(Clone, Debug)]
    pub struct SeededPool {
        pub venue: Venue,
        pub pool: Pubkey,
        pub mint_a: Pubkey,
        pub mint_b: Pubkey,
        pub vault_a: Pubkey,
        pub vault_b: Pubkey,
        /// Tick / bin arrays seeded around the current price (empty for constant product venues).
        pub arrays: Vec<Pubkey>,
    }

    fn seed_mints_and_vaults(
        mock: &MockChainClient,
        mint_a: &Pubkey,
        mint_b: &Pubkey,
        vault_a: &Pubkey,
        vault_b: &Pubkey,
        vault_owner: &Pubkey,
        reserves: (u64, u64),
    ) {
        mock.set_account(*mint_a, TOKEN_PROGRAM, mint_data(9));
        mock.set_account(*mint_b, TOKEN_PROGRAM, mint_data(6));
        mock.set_account(*vault_a, TOKEN_PROGRAM, token_account_data(mint_a, vault_owner, reserves.0));
        mock.set_account(*vault_b, TOKEN_PROGRAM, token_account_data(mint_b, vault_owner, reserves.1));
    }

    /// Seed a complete pool for `venue`. `reserves` are the vault balances of (a, b).
    pub fn seed_pool(
        mock: &MockChainClient,
        venue: Venue,
        mint_a: Pubkey,
        mint_b: Pubkey,
        reserves: (u64, u64),
    ) -> SeededPool {
        let pool = Pubkey::new_unique();
        let mut arrays = Vec::new();
        let (vault_a, vault_b) = match venue {
            Venue::RaydiumAmmV4 => {
                let (vault_a, vault_b) = (Pubkey::new_unique(), Pubkey::new_unique());
                let market = Pubkey::new_unique();
                let program = raydium_amm_v4::accounts::OPENBOOK_PROGRAM;
                let data = amm_v4_pool_data(
                    &mint_a,
                    &mint_b,
                    &vault_a,
                    &vault_b,
                    &Pubkey::new_unique(),
                    &Pubkey::new_unique(),
                    &market,
                    &program,
                );
                mock.set_account(pool, raydium_amm_v4::accounts::RAYDIUM_AMM_V4, data);
                let (market_data, _) = openbook_market_data(&market, &program, &mint_a, &mint_b);
                mock.set_account(market, program, market_data);
                seed_mints_and_vaults(
                    mock,
                    &mint_a,
                    &mint_b,
                    &vault_a,
                    &vault_b,
                    &raydium_amm_v4::accounts::AUTHORITY,
                    reserves,
                );
                (vault_a, vault_b)
            }
            Venue::RaydiumCpmm => {
                let program = raydium_cpmm::accounts::RAYDIUM_CPMM;
                let vault_a = raydium_cpmm::get_vault_pda(&pool, &mint_a).unwrap_or_default();
                let vault_b = raydium_cpmm::get_vault_pda(&pool, &mint_b).unwrap_or_default();
                let observation = raydium_cpmm::get_observation_state_pda(&pool).unwrap_or_default();
                let amm_config = Pubkey::new_unique();
                mock.set_account(
                    pool,
                    program,
                    cpmm_pool_data(&amm_config, &mint_a, &mint_b, &vault_a, &vault_b, &observation),
                );
                mock.set_account(
                    amm_config,
                    program,
                    cpmm_amm_config_data(raydium_cpmm::accounts::TRADE_FEE_RATE),
                );
                mock.set_account(observation, program, vec![0u8; 64]);
                seed_mints_and_vaults(
                    mock,
                    &mint_a,
                    &mint_b,
                    &vault_a,
                    &vault_b,
                    &raydium_cpmm::accounts::AUTHORITY,
                    reserves,
                );
                (vault_a, vault_b)
            }
            Venue::RaydiumClmm => {
                let program = raydium_clmm::accounts::RAYDIUM_CLMM;
                let (vault_a, vault_b) = (Pubkey::new_unique(), Pubkey::new_unique());
                let (tick_spacing, tick_current) = (10u16, -25i32);
                let data = clmm_pool_data(
                    &Pubkey::new_unique(),
                    &mint_a,
                    &mint_b,
                    &vault_a,
                    &vault_b,
                    &Pubkey::new_unique(),
                    tick_spacing,
                    tick_current,
                );
                mock.set_account(pool, program, data);
                for zero_for_one in [true, false] {
                    for start in
                        raydium_clmm::swap_tick_array_start_indexes(tick_current, tick_spacing, zero_for_one)
                    {
                        if let Some(key) = raydium_clmm::get_tick_array_pda(&pool, start) {
                            if !arrays.contains(&key) {
                                mock.set_account(key, program, vec![0u8; 64]);
                                arrays.push(key);
                            }
                        }
                    }
                }
                seed_mints_and_vaults(mock, &mint_a, &mint_b, &vault_a, &vault_b, &pool, reserves);
                (vault_a, vault_b)
            }
            Venue::OrcaWhirlpool => {
                let program = orca_whirlpool::accounts::WHIRLPOOL_PROGRAM;
                let (vault_a, vault_b) = (Pubkey::new_unique(), Pubkey::new_unique());
                let (tick_spacing, tick_current) = (64u16, 100i32);
                mock.set_account(
                    pool,
                    program,
                    whirlpool_data(&mint_a, &vault_a, &mint_b, &vault_b, tick_spacing, tick_current),
                );
                for a_to_b in [true, false] {
                    for start in
                        orca_whirlpool::swap_tick_array_start_indexes(tick_current, tick_spacing, a_to_b)
                    {
                        if let Some(key) = orca_whirlpool::get_tick_array_pda(&pool, start) {
                            if !arrays.contains(&key) {
                                mock.set_account(key, program, vec![0u8; 64]);
                                arrays.push(key);
                            }
                        }
                    }
                }
                seed_mints_and_vaults(mock, &mint_a, &mint_b, &vault_a, &vault_b, &pool, reserves);
                (vault_a, vault_b)
            }
            Venue::MeteoraDlmm | Venue::Jupiter => {
                let program = meteora_dlmm::accounts::DLMM_PROGRAM;
                let (vault_a, vault_b) = (Pubkey::new_unique(), Pubkey::new_unique());
                let active_id = 10i32;
                mock.set_account(
                    pool,
                    program,
                    lb_pair_data(&mint_a, &mint_b, &vault_a, &vault_b, &Pubkey::new_unique(), active_id, 25),
                );
                for swap_for_y in [true, false] {
                    for index in meteora_dlmm::swap_bin_array_indexes(active_id, swap_for_y) {
                        if let Some(key) = meteora_dlmm::get_bin_array_pda(&pool, index) {
                            if !arrays.contains(&key) {
                                mock.set_account(key, program, vec![0u8; 64]);
                                arrays.push(key);
                            }
                        }
                    }
                }
                seed_mints_and_vaults(mock, &mint_a, &mint_b, &vault_a, &vault_b, &pool, reserves);
                (vault_a, vault_b)
            }
        };
        SeededPool { venue, pool, mint_a, mint_b, vault_a, vault_b, arrays }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_reads_and_injects_failures() {
        let mock = MockChainClient::new();
        let key = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        mock.set_account(key, owner, vec![1, 2, 3]);

        mock.fail_next_reads(1);
        assert!(mock.get_account(&key).await.is_err());
        let account = mock.get_account(&key).await.unwrap().unwrap();
        assert_eq!(account.data, vec![1, 2, 3]);
        assert_eq!(mock.read_calls(), 2);
        assert_eq!(mock.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_program_accounts_memcmp() {
        let mock = MockChainClient::new();
        let program = Pubkey::new_unique();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        mock.set_account(a, program, vec![0, 7, 7, 0]);
        mock.set_account(b, program, vec![0, 8, 8, 0]);

        let found = mock
            .get_program_accounts_with_memcmp(&program, vec![(1, vec![7, 7])], None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, a);

        let sized = mock.get_program_accounts_with_memcmp(&program, vec![], Some(3)).await.unwrap();
        assert!(sized.is_empty());
    }
}
