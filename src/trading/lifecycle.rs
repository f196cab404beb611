//! 执行结果回调
//!
//! 终态（确认 / 失败）出现时，每个观察者恰好收到一次通知：先刷新余额，再追加历史记录。
//! 中间模式的失败不会触发回调。回调出错只记日志，不影响执行结果。

use crate::trading::fallback::{ExecutionMode, ExecutionOutcome, ExecutionRequest, TerminalState};
use anyhow::Result;
use futures::future::BoxFuture;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::warn;

pub trait ExecutionObserver: Send + Sync {
    /// 终态后刷新钱包余额
    fn on_balance_refresh(&self, user: Pubkey) -> BoxFuture<'static, Result<()>>;

    /// 终态后追加一条历史记录
    fn on_history_append(&self, record: ExecutionRecord) -> BoxFuture<'static, Result<()>>;
}

/// One finished execution as the history sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount_in: u64,
    pub expected_out: u64,
    pub success: bool,
    pub signature: Option<String>,
    pub final_mode: ExecutionMode,
    pub modes_tried: Vec<ExecutionMode>,
    pub error: Option<String>,
    pub error_category: Option<&'static str>,
    pub remediation: Option<&'static str>,
    /// 时间戳（纳秒）
    pub timestamp_ns: u64,
}

impl ExecutionRecord {
    pub fn new(request: &ExecutionRequest, outcome: &ExecutionOutcome) -> Self {
        let (success, signature, error) = match &outcome.terminal {
            TerminalState::Confirmed(signature) => (true, Some(signature.to_string()), None),
            TerminalState::Failed(error) => (false, None, Some(error)),
        };
        let timestamp_ns = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_else(|e| {
                warn!("system clock before unix epoch: {}", e);
                std::time::Duration::from_secs(0)
            })
            .as_nanos() as u64;

        Self {
            user: request.user,
            input_mint: request.input_mint,
            output_mint: request.output_mint,
            amount_in: request.amount_in,
            expected_out: request.expected_out,
            success,
            signature,
            final_mode: outcome.final_mode(),
            modes_tried: outcome.attempts.iter().map(|a| a.mode).collect(),
            error: error.map(|e| e.to_string()),
            error_category: error.map(|e| e.category()),
            remediation: error.and_then(|e| e.remediation()).map(|r| r.message()),
            timestamp_ns,
        }
    }

    /// JSON 表示（用于日志）
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            warn!("execution record serialization failed: {}", e);
            serde_json::Value::Null
        })
    }
}

/// 空回调实现
#[derive(Clone)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {
    fn on_balance_refresh(&self, _user: Pubkey) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn on_history_append(&self, _record: ExecutionRecord) -> BoxFuture<'static, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

pub type ObserverRef = Arc<dyn ExecutionObserver>;

/// Notify every observer once. Observer errors are logged and swallowed.
pub async fn notify_observers(observers: &[ObserverRef], record: &ExecutionRecord) {
    for observer in observers {
        if let Err(e) = observer.on_balance_refresh(record.user).await {
            warn!(error = %e, "balance refresh callback failed");
        }
        if let Err(e) = observer.on_history_append(record.clone()).await {
            warn!(error = %e, "history append callback failed");
        }
    }
}
