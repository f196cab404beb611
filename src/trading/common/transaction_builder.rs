//! 交易组装
//!
//! 有 lookup table 时编译 V0 消息，否则使用 Legacy 消息；payer 是唯一签名者。
//! 组装后先按线上包大小检查，超出直接返回 `TransactionTooLarge`，
//! 执行状态机据此切换到下一个模式。

use crate::common::{RouterError, RouterResult};
use solana_hash::Hash;
use solana_sdk::{
    instruction::Instruction,
    message::{AddressLookupTableAccount, Message, VersionedMessage, v0},
    pubkey::Pubkey,
    signer::Signer,
    transaction::VersionedTransaction,
};
use std::collections::HashSet;

/// Maximum serialized transaction size accepted by the cluster.
pub const PACKET_DATA_SIZE: usize = 1232;

/// Legacy messages index accounts with a `u8`.
const MAX_LEGACY_ACCOUNTS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Legacy,
    V0,
}

/// Compile the message for `payer`. `V0` with no lookup table still compiles a v0 message.
pub fn compile_message(
    payer: &Pubkey,
    instructions: &[Instruction],
    lookup_tables: &[AddressLookupTableAccount],
    blockhash: Hash,
    format: MessageFormat,
) -> RouterResult<VersionedMessage> {
    match format {
        MessageFormat::V0 => {
            let message = v0::Message::try_compile(payer, instructions, lookup_tables, blockhash)
                .map_err(|e| RouterError::TransactionTooLarge(format!("v0 compile: {}", e)))?;
            Ok(VersionedMessage::V0(message))
        }
        MessageFormat::Legacy => {
            let accounts = unique_account_count(payer, instructions);
            if accounts > MAX_LEGACY_ACCOUNTS {
                return Err(RouterError::TransactionTooLarge(format!(
                    "{} accounts in a legacy message",
                    accounts
                )));
            }
            Ok(VersionedMessage::Legacy(Message::new_with_blockhash(instructions, Some(payer), &blockhash)))
        }
    }
}

/// Sign a compiled message with the single payer signature.
pub fn sign_message(signer: &dyn Signer, message: VersionedMessage) -> RouterResult<VersionedTransaction> {
    let signature = signer.try_sign_message(&message.serialize())?;
    Ok(VersionedTransaction { signatures: vec![signature], message })
}

/// Compile, sign and size-check in one go.
pub fn build_transaction(
    signer: &dyn Signer,
    instructions: &[Instruction],
    lookup_tables: &[AddressLookupTableAccount],
    blockhash: Hash,
    format: MessageFormat,
) -> RouterResult<VersionedTransaction> {
    let payer = signer.try_pubkey()?;
    let message = compile_message(&payer, instructions, lookup_tables, blockhash, format)?;
    let transaction = sign_message(signer, message)?;
    ensure_packet_size(&transaction)?;
    Ok(transaction)
}

/// Re-sign a transaction built elsewhere (Jupiter `/swap`). The payer is the first required signer.
pub fn sign_prebuilt(signer: &dyn Signer, mut transaction: VersionedTransaction) -> RouterResult<VersionedTransaction> {
    let payer = signer.try_pubkey()?;
    let first_key = transaction.message.static_account_keys().first().copied();
    if first_key != Some(payer) {
        return Err(RouterError::ExecutionFailed(format!(
            "prebuilt transaction fee payer {:?} is not {}",
            first_key, payer
        )));
    }
    let signature = signer.try_sign_message(&transaction.message.serialize())?;
    let required = transaction.message.header().num_required_signatures.max(1) as usize;
    transaction.signatures.resize(required, Default::default());
    transaction.signatures[0] = signature;
    ensure_packet_size(&transaction)?;
    Ok(transaction)
}

pub fn serialized_size(transaction: &VersionedTransaction) -> RouterResult<usize> {
    bincode::serialize(transaction)
        .map(|bytes| bytes.len())
        .map_err(|e| RouterError::ExecutionFailed(format!("serialize transaction: {}", e)))
}

pub fn ensure_packet_size(transaction: &VersionedTransaction) -> RouterResult<()> {
    let size = serialized_size(transaction)?;
    if size > PACKET_DATA_SIZE {
        return Err(RouterError::TransactionTooLarge(format!("{} > {} bytes", size, PACKET_DATA_SIZE)));
    }
    Ok(())
}

fn unique_account_count(payer: &Pubkey, instructions: &[Instruction]) -> usize {
    let mut keys: HashSet<&Pubkey> = HashSet::with_capacity(instructions.len() * 8 + 1);
    keys.insert(payer);
    for ix in instructions {
        keys.insert(&ix.program_id);
        keys.extend(ix.accounts.iter().map(|meta| &meta.pubkey));
    }
    keys.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::instruction::AccountMeta;
    use solana_sdk::signature::Keypair;

    fn wide_instruction(payer: &Pubkey, accounts: usize) -> Instruction {
        let mut metas = vec![AccountMeta::new(*payer, true)];
        metas.extend((0..accounts).map(|_| AccountMeta::new(Pubkey::new_unique(), false)));
        Instruction::new_with_bytes(Pubkey::new_unique(), &[1, 2, 3], metas)
    }

    #[test]
    fn test_legacy_small_transaction() {
        let payer = Keypair::new();
        let ix = wide_instruction(&payer.pubkey(), 4);
        let tx = build_transaction(&payer, &[ix], &[], Hash::new_from_array([1; 32]), MessageFormat::Legacy).unwrap();
        assert!(matches!(tx.message, VersionedMessage::Legacy(_)));
        assert_eq!(tx.signatures.len(), 1);
        assert!(tx.verify_with_results().iter().all(|ok| *ok));
    }

    #[test]
    fn test_legacy_too_many_accounts_is_too_large() {
        let payer = Keypair::new();
        let ix = wide_instruction(&payer.pubkey(), 40);
        let err = build_transaction(&payer, &[ix], &[], Hash::default(), MessageFormat::Legacy).unwrap_err();
        assert!(matches!(err, RouterError::TransactionTooLarge(_)));
        assert!(err.is_fallback_eligible());
    }

    #[test]
    fn test_v0_with_lookup_table_fits() {
        let payer = Keypair::new();
        let ix = wide_instruction(&payer.pubkey(), 40);
        let table = AddressLookupTableAccount {
            key: Pubkey::new_unique(),
            addresses: ix.accounts.iter().skip(1).map(|m| m.pubkey).collect(),
        };
        let tx = build_transaction(&payer, &[ix], &[table], Hash::default(), MessageFormat::V0).unwrap();
        assert!(matches!(tx.message, VersionedMessage::V0(_)));
        assert!(serialized_size(&tx).unwrap() <= PACKET_DATA_SIZE);
    }

    #[test]
    fn test_sign_prebuilt_checks_payer() {
        let payer = Keypair::new();
        let message = compile_message(
            &payer.pubkey(),
            &[wide_instruction(&payer.pubkey(), 2)],
            &[],
            Hash::default(),
            MessageFormat::V0,
        )
        .unwrap();
        let unsigned = VersionedTransaction { signatures: vec![Default::default()], message };
        let signed = sign_prebuilt(&payer, unsigned.clone()).unwrap();
        assert!(signed.verify_with_results().iter().all(|ok| *ok));

        let stranger = Keypair::new();
        assert!(sign_prebuilt(&stranger, unsigned).is_err());
    }
}
