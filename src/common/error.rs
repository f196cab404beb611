//! 路由错误分类
//!
//! Every terminal failure surfaced by the router maps onto one `RouterError` variant.
//! The category string and the remediation hint travel with the error so the caller
//! never has to re-derive them from a message.

use solana_sdk::signer::SignerError;
use thiserror::Error;

pub type RouterResult<T> = Result<T, RouterError>;

/// Actionable hint attached to a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Remediation {
    ReduceAmount,
    RaiseSlippage,
    SwitchRoute,
    RetryLater,
    CheckBalance,
}

impl Remediation {
    pub fn message(&self) -> &'static str {
        match self {
            Remediation::ReduceAmount => "Reduce the swap amount",
            Remediation::RaiseSlippage => "Raise the slippage tolerance",
            Remediation::SwitchRoute => "Switch to another route",
            Remediation::RetryLater => "Retry in a few seconds",
            Remediation::CheckBalance => "Check the wallet balance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Venue not supported: {0}")]
    VenueUnsupported(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Account resolution failed: {0}")]
    AccountResolutionFailed(String),

    #[error("No route found")]
    NoRouteFound,

    #[error("Stale or invalid quote: {0}")]
    StaleOrInvalidQuote(String),

    #[error("Oracle divergence {divergence_bps} bps exceeds {max_bps} bps")]
    OracleDivergenceExceeded { divergence_bps: u64, max_bps: u64 },

    #[error("Swap plan missing or expired")]
    PlanMissingOrExpired,

    #[error("Transaction too large: {0}")]
    TransactionTooLarge(String),

    #[error("Address lookup table unavailable: {0}")]
    AddressLookupTableUnavailable(String),

    #[error("Simulation rejected: {0}")]
    SimulationRejected(String),

    #[error("Bundle rejected: {0}")]
    BundleRejected(String),

    #[error("User rejected signing")]
    UserRejectedSigning,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl RouterError {
    /// Human readable category shown next to a terminal failure.
    pub fn category(&self) -> &'static str {
        match self {
            RouterError::VenueUnsupported(_) => "Unsupported venue",
            RouterError::AccountNotFound(_) | RouterError::AccountResolutionFailed(_) => {
                "Pool accounts unavailable"
            }
            RouterError::RpcError(_) | RouterError::Http(_) => "Network error",
            RouterError::NoRouteFound => "No route",
            RouterError::StaleOrInvalidQuote(_) => "Quote expired",
            RouterError::OracleDivergenceExceeded { .. } => "Price check failed",
            RouterError::PlanMissingOrExpired => "Swap plan expired",
            RouterError::TransactionTooLarge(_) => "Transaction too large",
            RouterError::AddressLookupTableUnavailable(_) => "Lookup table unavailable",
            RouterError::SimulationRejected(_) => "Rejected by program",
            RouterError::BundleRejected(_) => "Bundle rejected",
            RouterError::UserRejectedSigning => "Cancelled by user",
            RouterError::Config(_) => "Configuration error",
            RouterError::Cancelled => "Cancelled",
            RouterError::ExecutionFailed(_) => "Execution failed",
        }
    }

    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            RouterError::VenueUnsupported(_)
            | RouterError::AccountNotFound(_)
            | RouterError::AccountResolutionFailed(_)
            | RouterError::NoRouteFound
            | RouterError::AddressLookupTableUnavailable(_) => Some(Remediation::SwitchRoute),
            RouterError::RpcError(_)
            | RouterError::Http(_)
            | RouterError::StaleOrInvalidQuote(_)
            | RouterError::PlanMissingOrExpired
            | RouterError::BundleRejected(_) => Some(Remediation::RetryLater),
            RouterError::OracleDivergenceExceeded { .. } => Some(Remediation::ReduceAmount),
            RouterError::TransactionTooLarge(_) => Some(Remediation::SwitchRoute),
            RouterError::SimulationRejected(msg) => {
                let lower = msg.to_lowercase();
                if lower.contains("insufficient") {
                    Some(Remediation::CheckBalance)
                } else if lower.contains("slippage") || lower.contains("0x1771") {
                    Some(Remediation::RaiseSlippage)
                } else {
                    Some(Remediation::ReduceAmount)
                }
            }
            RouterError::UserRejectedSigning
            | RouterError::Config(_)
            | RouterError::Cancelled
            | RouterError::ExecutionFailed(_) => None,
        }
    }

    /// Only these two causes move the execution state machine to its next mode.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            RouterError::TransactionTooLarge(_) | RouterError::AddressLookupTableUnavailable(_)
        )
    }

    /// Map an RPC / wallet / simulation message onto the taxonomy.
    ///
    /// Anything unrecognized becomes `ExecutionFailed` so it is surfaced as-is.
    pub fn classify(message: &str) -> RouterError {
        let lower = message.to_lowercase();
        let msg = message.to_string();

        if lower.contains("user rejected")
            || lower.contains("user cancel")
            || lower.contains("rejected the request")
            || lower.contains("user denied")
        {
            return RouterError::UserRejectedSigning;
        }
        if lower.contains("too large")
            || lower.contains("serialization limit")
            || lower.contains("exceeds maximum")
            || lower.contains("encoding overruns")
            || lower.contains("packet data size")
        {
            return RouterError::TransactionTooLarge(msg);
        }
        if lower.contains("alt not set")
            || lower.contains("lookup table")
            || lower.contains("address table")
        {
            return RouterError::AddressLookupTableUnavailable(msg);
        }
        if lower.contains("bundle") && (lower.contains("reject") || lower.contains("fail")) {
            return RouterError::BundleRejected(msg);
        }
        if lower.contains("simulation failed")
            || lower.contains("custom program error")
            || lower.contains("instructionerror")
            || lower.contains("instruction error")
            || lower.contains("slippage")
            || lower.contains("insufficient")
        {
            return RouterError::SimulationRejected(msg);
        }
        if lower.contains("blockhash not found")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("connection")
        {
            return RouterError::RpcError(msg);
        }
        RouterError::ExecutionFailed(msg)
    }
}

impl From<solana_client::client_error::ClientError> for RouterError {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        match RouterError::classify(&e.to_string()) {
            RouterError::ExecutionFailed(msg) => RouterError::RpcError(msg),
            other => other,
        }
    }
}

impl From<reqwest::Error> for RouterError {
    fn from(e: reqwest::Error) -> Self {
        RouterError::Http(e.to_string())
    }
}

impl From<SignerError> for RouterError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::UserCancel(_) => RouterError::UserRejectedSigning,
            other => RouterError::ExecutionFailed(other.to_string()),
        }
    }
}
