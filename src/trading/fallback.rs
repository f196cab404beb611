//! 执行回退状态机
//!
//! ```text
//! failed mode          TransactionTooLarge   AddressLookupTableUnavailable
//! NativeCpi            RouterCpiLegacy       RouterCpiVersioned
//! RouterCpiVersioned   ExternalDirect        RouterCpiLegacy
//! RouterCpiLegacy      ExternalDirect        ExternalDirect
//! ExternalDirect       -                     -
//! ```
//!
//! 只有这两种错误会推进，其他错误（包括用户拒签）立即终止。
//! 转移只向后走，所以最多尝试四次。v0 消息过大时 legacy 只会更大，直接跳到 `ExternalDirect`。

use crate::common::{RouterError, Venue};
use crate::trading::eligibility::{RouteDecision, RouteMode};
use crate::trading::lifecycle::{ExecutionRecord, ObserverRef, notify_observers};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Router `swap_direct` into a native venue.
    NativeCpi,
    /// Router `swap_external` around the aggregator route, v0 message with lookup tables.
    RouterCpiVersioned,
    /// Same as above in a legacy message.
    RouterCpiLegacy,
    /// Aggregator-built transaction, no router involvement.
    ExternalDirect,
}

impl ExecutionMode {
    pub fn from_decision(decision: &RouteDecision) -> Self {
        match decision.mode {
            RouteMode::Native => ExecutionMode::NativeCpi,
            RouteMode::RouterCpiFallback => ExecutionMode::RouterCpiVersioned,
            RouteMode::ExternalDirectFallback => ExecutionMode::ExternalDirect,
        }
    }

    pub fn successor(&self) -> Option<ExecutionMode> {
        match self {
            ExecutionMode::NativeCpi => Some(ExecutionMode::RouterCpiVersioned),
            ExecutionMode::RouterCpiVersioned => Some(ExecutionMode::RouterCpiLegacy),
            ExecutionMode::RouterCpiLegacy => Some(ExecutionMode::ExternalDirect),
            ExecutionMode::ExternalDirect => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::NativeCpi => "native-cpi",
            ExecutionMode::RouterCpiVersioned => "router-cpi-versioned",
            ExecutionMode::RouterCpiLegacy => "router-cpi-legacy",
            ExecutionMode::ExternalDirect => "external-direct",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single transition table, keyed on the failed mode and its cause.
pub fn next_mode(mode: ExecutionMode, cause: &RouterError) -> Option<ExecutionMode> {
    if !cause.is_fallback_eligible() {
        return None;
    }
    match (mode, cause) {
        (ExecutionMode::NativeCpi, RouterError::TransactionTooLarge(_)) => Some(ExecutionMode::RouterCpiLegacy),
        (ExecutionMode::RouterCpiVersioned, RouterError::TransactionTooLarge(_)) => {
            Some(ExecutionMode::ExternalDirect)
        }
        _ => mode.successor(),
    }
}

/// What every mode needs to build and send its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub user: Pubkey,
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount_in: u64,
    pub expected_out: u64,
    pub slippage_bps: u64,
    /// Selected native venue; required by `NativeCpi`.
    pub venue: Option<Venue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionAttemptResult {
    pub mode: ExecutionMode,
    pub signature: Option<Signature>,
    pub error: Option<RouterError>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    Confirmed(Signature),
    Failed(RouterError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub attempts: Vec<ExecutionAttemptResult>,
    pub terminal: TerminalState,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.terminal, TerminalState::Confirmed(_))
    }

    pub fn signature(&self) -> Option<Signature> {
        match self.terminal {
            TerminalState::Confirmed(signature) => Some(signature),
            TerminalState::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RouterError> {
        match &self.terminal {
            TerminalState::Confirmed(_) => None,
            TerminalState::Failed(error) => Some(error),
        }
    }

    pub fn final_mode(&self) -> ExecutionMode {
        self.attempts.last().map(|a| a.mode).unwrap_or(ExecutionMode::NativeCpi)
    }
}

/// Performs one attempt in one mode: build, sign, submit.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, mode: ExecutionMode, request: &ExecutionRequest) -> Result<Signature, RouterError>;
}

pub struct ExecutionFallbackOrchestrator {
    backend: Arc<dyn ExecutionBackend>,
    observers: Vec<ObserverRef>,
}

impl ExecutionFallbackOrchestrator {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self { backend, observers: Vec::new() }
    }

    pub fn with_observer(mut self, observer: ObserverRef) -> Self {
        self.observers.push(observer);
        self
    }

    pub async fn execute(&self, decision: &RouteDecision, request: &ExecutionRequest) -> ExecutionOutcome {
        self.execute_from(ExecutionMode::from_decision(decision), request).await
    }

    pub async fn execute_from(&self, start: ExecutionMode, request: &ExecutionRequest) -> ExecutionOutcome {
        let mut mode = start;
        let mut attempts = Vec::with_capacity(4);

        let terminal = loop {
            let started = Instant::now();
            let result = self.backend.execute(mode, request).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match result {
                Ok(signature) => {
                    attempts.push(ExecutionAttemptResult { mode, signature: Some(signature), error: None, elapsed_ms });
                    info!(mode = %mode, %signature, "swap confirmed");
                    break TerminalState::Confirmed(signature);
                }
                Err(error) => {
                    let next = next_mode(mode, &error);
                    attempts.push(ExecutionAttemptResult { mode, signature: None, error: Some(error.clone()), elapsed_ms });
                    match next {
                        Some(next) => {
                            info!(from = %mode, to = %next, cause = %error, "falling back");
                            mode = next;
                        }
                        None => {
                            warn!(mode = %mode, category = error.category(), error = %error, "swap failed");
                            break TerminalState::Failed(error);
                        }
                    }
                }
            }
        };

        let outcome = ExecutionOutcome { attempts, terminal };
        notify_observers(&self.observers, &ExecutionRecord::new(request, &outcome)).await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::eligibility::RouteReason;
    use crate::trading::lifecycle::ExecutionObserver;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        results: Mutex<VecDeque<Result<Signature, RouterError>>>,
        modes: Mutex<Vec<ExecutionMode>>,
    }

    impl ScriptedBackend {
        fn new(results: Vec<Result<Signature, RouterError>>) -> Arc<Self> {
            Arc::new(Self { results: Mutex::new(results.into()), modes: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ExecutionBackend for ScriptedBackend {
        async fn execute(&self, mode: ExecutionMode, _request: &ExecutionRequest) -> Result<Signature, RouterError> {
            self.modes.lock().push(mode);
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(RouterError::TransactionTooLarge("scripted".into())))
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        refreshes: AtomicUsize,
        appends: AtomicUsize,
    }

    impl ExecutionObserver for CountingObserver {
        fn on_balance_refresh(&self, _user: Pubkey) -> BoxFuture<'static, anyhow::Result<()>> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn on_history_append(&self, _record: ExecutionRecord) -> BoxFuture<'static, anyhow::Result<()>> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Err(anyhow::anyhow!("history store offline")) })
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            user: Pubkey::new_unique(),
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            amount_in: 1_000_000_000,
            expected_out: 150_000_000,
            slippage_bps: 50,
            venue: Some(Venue::RaydiumCpmm),
        }
    }

    fn native() -> RouteDecision {
        RouteDecision { mode: RouteMode::Native, reason: RouteReason::ProviderEligible }
    }

    #[test]
    fn test_transition_table() {
        let too_large = RouterError::TransactionTooLarge("x".into());
        let no_alt = RouterError::AddressLookupTableUnavailable("x".into());
        assert_eq!(next_mode(ExecutionMode::NativeCpi, &too_large), Some(ExecutionMode::RouterCpiLegacy));
        assert_eq!(next_mode(ExecutionMode::NativeCpi, &no_alt), Some(ExecutionMode::RouterCpiVersioned));
        assert_eq!(next_mode(ExecutionMode::RouterCpiVersioned, &no_alt), Some(ExecutionMode::RouterCpiLegacy));
        assert_eq!(next_mode(ExecutionMode::RouterCpiVersioned, &too_large), Some(ExecutionMode::ExternalDirect));
        assert_eq!(next_mode(ExecutionMode::RouterCpiLegacy, &too_large), Some(ExecutionMode::ExternalDirect));
        assert_eq!(next_mode(ExecutionMode::RouterCpiLegacy, &no_alt), Some(ExecutionMode::ExternalDirect));
        assert_eq!(next_mode(ExecutionMode::ExternalDirect, &too_large), None);
        assert_eq!(next_mode(ExecutionMode::ExternalDirect, &no_alt), None);
        assert_eq!(next_mode(ExecutionMode::NativeCpi, &RouterError::UserRejectedSigning), None);
        assert_eq!(next_mode(ExecutionMode::NativeCpi, &RouterError::SimulationRejected("0x1771".into())), None);
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let modes = [
            ExecutionMode::NativeCpi,
            ExecutionMode::RouterCpiVersioned,
            ExecutionMode::RouterCpiLegacy,
            ExecutionMode::ExternalDirect,
        ];
        let causes = [
            RouterError::TransactionTooLarge("x".into()),
            RouterError::AddressLookupTableUnavailable("x".into()),
        ];
        for (i, mode) in modes.iter().enumerate() {
            for cause in &causes {
                if let Some(next) = next_mode(*mode, cause) {
                    let j = modes.iter().position(|m| *m == next).unwrap();
                    assert!(j > i, "{} -> {} on {}", mode, next, cause);
                }
            }
        }
    }

    #[test]
    fn test_start_mode_from_decision() {
        let decision = RouteDecision { mode: RouteMode::RouterCpiFallback, reason: RouteReason::NoDexPlan };
        assert_eq!(ExecutionMode::from_decision(&decision), ExecutionMode::RouterCpiVersioned);
        let decision = RouteDecision { mode: RouteMode::ExternalDirectFallback, reason: RouteReason::TokensMissing };
        assert_eq!(ExecutionMode::from_decision(&decision), ExecutionMode::ExternalDirect);
    }

    #[tokio::test]
    async fn test_full_cascade_terminates() {
        let no_alt = || Err(RouterError::AddressLookupTableUnavailable("ALT not set".into()));
        let backend = ScriptedBackend::new(vec![no_alt(), no_alt()]);
        let observer = Arc::new(CountingObserver::default());
        let orchestrator = ExecutionFallbackOrchestrator::new(backend.clone()).with_observer(observer.clone());

        let outcome = orchestrator.execute(&native(), &request()).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.attempts.len(), 4);
        assert_eq!(
            *backend.modes.lock(),
            vec![
                ExecutionMode::NativeCpi,
                ExecutionMode::RouterCpiVersioned,
                ExecutionMode::RouterCpiLegacy,
                ExecutionMode::ExternalDirect
            ]
        );
        assert_eq!(observer.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(observer.appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_too_large_retries_legacy_then_external() {
        let signature = Signature::from([4u8; 64]);
        let backend = ScriptedBackend::new(vec![
            Err(RouterError::TransactionTooLarge("Transaction too large: 1644 > 1232".into())),
            Err(RouterError::TransactionTooLarge("Transaction too large: 1710 > 1232".into())),
            Ok(signature),
        ]);
        let orchestrator = ExecutionFallbackOrchestrator::new(backend.clone());

        let outcome = orchestrator.execute(&native(), &request()).await;
        assert_eq!(outcome.signature(), Some(signature));
        assert_eq!(outcome.final_mode(), ExecutionMode::ExternalDirect);
        assert_eq!(
            *backend.modes.lock(),
            vec![ExecutionMode::NativeCpi, ExecutionMode::RouterCpiLegacy, ExecutionMode::ExternalDirect]
        );
        assert!(outcome.attempts[..2].iter().all(|a| matches!(a.error, Some(RouterError::TransactionTooLarge(_)))));
    }

    #[tokio::test]
    async fn test_oversized_versioned_skips_legacy() {
        let backend = ScriptedBackend::new(vec![]);
        let decision = RouteDecision { mode: RouteMode::RouterCpiFallback, reason: RouteReason::NoDexPlan };
        let outcome = ExecutionFallbackOrchestrator::new(backend.clone()).execute(&decision, &request()).await;
        assert!(matches!(outcome.error(), Some(RouterError::TransactionTooLarge(_))));
        assert_eq!(*backend.modes.lock(), vec![ExecutionMode::RouterCpiVersioned, ExecutionMode::ExternalDirect]);
    }

    #[tokio::test]
    async fn test_user_rejection_is_terminal() {
        let backend = ScriptedBackend::new(vec![Err(RouterError::UserRejectedSigning)]);
        let observer = Arc::new(CountingObserver::default());
        let orchestrator = ExecutionFallbackOrchestrator::new(backend.clone()).with_observer(observer.clone());

        let outcome = orchestrator.execute(&native(), &request()).await;
        assert_eq!(outcome.error(), Some(&RouterError::UserRejectedSigning));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(observer.appends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_then_success() {
        let signature = Signature::from([9u8; 64]);
        let backend = ScriptedBackend::new(vec![
            Err(RouterError::AddressLookupTableUnavailable("ALT not set".into())),
            Ok(signature),
        ]);
        let orchestrator = ExecutionFallbackOrchestrator::new(backend);
        let outcome = orchestrator.execute(&native(), &request()).await;
        assert_eq!(outcome.signature(), Some(signature));
        assert_eq!(outcome.final_mode(), ExecutionMode::RouterCpiVersioned);
        assert!(outcome.attempts[0].error.is_some());

        let record = ExecutionRecord::new(&request(), &outcome);
        assert!(record.success);
        assert_eq!(record.modes_tried, vec![ExecutionMode::NativeCpi, ExecutionMode::RouterCpiVersioned]);
        assert_eq!(record.to_json()["final_mode"], "RouterCpiVersioned");
    }
}
