//! 交易提交通道
//!
//! 目前只有 Jito bundle；bundle 被拒绝时回退到私有 / 公共 RPC。

pub mod jito;

pub use jito::{
    BlockEngineTransport, BundleResult, HttpBlockEngineTransport, JitoBundleConfig,
    JitoBundleSubmitter,
};

use crate::common::{RouterError, RouterResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use solana_sdk::transaction::VersionedTransaction;

/// Wire encoding used by block engine JSON-RPC.
pub trait FormatBase64VersionedTransaction {
    fn to_base64_string(&self) -> RouterResult<String>;
}

impl FormatBase64VersionedTransaction for VersionedTransaction {
    fn to_base64_string(&self) -> RouterResult<String> {
        let bytes = bincode::serialize(self)
            .map_err(|e| RouterError::ExecutionFailed(format!("serialize transaction: {}", e)))?;
        Ok(STANDARD.encode(bytes))
    }
}
