//! Chain access seam.
//!
//! The resolver, builder and executor only talk to the chain through [`ChainClient`],
//! so tests can swap the nonblocking `RpcClient` for [`super::mock_rpc::MockChainClient`].

use super::{RouterError, RouterResult, SolanaRpcClient};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use solana_account_decoder::{UiAccountData, UiAccountEncoding};
use solana_address_lookup_table_interface::state::AddressLookupTable;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_hash::Hash;
use solana_rpc_client_api::config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_sdk::{
    account::Account, message::AddressLookupTableAccount, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

/// `getMultipleAccounts` accepts at most 100 keys per call.
pub const MAX_MULTIPLE_ACCOUNTS: usize = 100;

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> RouterResult<Vec<Option<Account>>>;

    /// `getProgramAccounts` with `(offset, bytes)` memcmp filters and an optional data size.
    async fn get_program_accounts_with_memcmp(
        &self,
        program_id: &Pubkey,
        filters: Vec<(usize, Vec<u8>)>,
        data_size: Option<u64>,
    ) -> RouterResult<Vec<(Pubkey, Vec<u8>)>>;

    async fn get_latest_blockhash(&self) -> RouterResult<Hash>;

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> RouterResult<Signature>;

    async fn get_account(&self, key: &Pubkey) -> RouterResult<Option<Account>> {
        let mut accounts = self.get_multiple_accounts(std::slice::from_ref(key)).await?;
        Ok(accounts.pop().flatten())
    }

    async fn get_address_lookup_table(
        &self,
        key: &Pubkey,
    ) -> RouterResult<AddressLookupTableAccount> {
        let account = self
            .get_account(key)
            .await
            .map_err(|e| RouterError::AddressLookupTableUnavailable(e.to_string()))?
            .ok_or_else(|| RouterError::AddressLookupTableUnavailable(key.to_string()))?;
        decode_lookup_table(key, &account.data)
    }
}

/// Decode a lookup table account. Uninitialized and deactivated tables are unusable.
pub fn decode_lookup_table(key: &Pubkey, data: &[u8]) -> RouterResult<AddressLookupTableAccount> {
    let table = AddressLookupTable::deserialize(data).map_err(|e| {
        RouterError::AddressLookupTableUnavailable(format!("lookup table {}: {}", key, e))
    })?;
    if table.meta.deactivation_slot != u64::MAX {
        return Err(RouterError::AddressLookupTableUnavailable(format!(
            "lookup table {} deactivated at slot {}",
            key, table.meta.deactivation_slot
        )));
    }
    Ok(AddressLookupTableAccount { key: *key, addresses: table.addresses.to_vec() })
}

#[async_trait]
impl ChainClient for SolanaRpcClient {
    async fn get_multiple_accounts(&self, keys: &[Pubkey]) -> RouterResult<Vec<Option<Account>>> {
        let mut out = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(MAX_MULTIPLE_ACCOUNTS) {
            let accounts = SolanaRpcClient::get_multiple_accounts(self, chunk).await?;
            out.extend(accounts);
        }
        Ok(out)
    }

    async fn get_program_accounts_with_memcmp(
        &self,
        program_id: &Pubkey,
        filters: Vec<(usize, Vec<u8>)>,
        data_size: Option<u64>,
    ) -> RouterResult<Vec<(Pubkey, Vec<u8>)>> {
        let mut rpc_filters: Vec<RpcFilterType> = filters
            .iter()
            .map(|(offset, bytes)| RpcFilterType::Memcmp(Memcmp::new_base58_encoded(*offset, bytes)))
            .collect();
        if let Some(size) = data_size {
            rpc_filters.push(RpcFilterType::DataSize(size));
        }
        let config = RpcProgramAccountsConfig {
            filters: Some(rpc_filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: None,
                commitment: None,
                min_context_slot: None,
            },
            with_context: None,
            sort_results: None,
        };

        let accounts = self.get_program_ui_accounts_with_config(program_id, config).await?;

        Ok(accounts
            .into_iter()
            .filter_map(|(address, account)| {
                let data = match &account.data {
                    UiAccountData::Binary(base64_str, _) => STANDARD.decode(base64_str).ok()?,
                    _ => return None,
                };
                Some((address, data))
            })
            .collect())
    }

    async fn get_latest_blockhash(&self) -> RouterResult<Hash> {
        Ok(SolanaRpcClient::get_latest_blockhash(self).await?)
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> RouterResult<Signature> {
        Ok(SolanaRpcClient::send_transaction(self, transaction).await?)
    }
}
