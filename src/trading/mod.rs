pub mod builder;
pub mod common;
pub mod eligibility;
pub mod executor;
pub mod fallback;
pub mod lifecycle;
pub mod scheduler;
pub mod slippage;

pub use builder::{BuilderConfig, BuiltSwap, NativeSwapInstructionBuilder, SwapParams};
pub use eligibility::{
    OracleContext, QuoteSafety, RouteDecision, RouteEligibilityInput, RouteMode, RouteReason,
    SafetyConfig, check_quote_safety, decide,
};
pub use executor::{RpcExecutionBackend, SignerRef};
pub use fallback::{
    ExecutionBackend, ExecutionFallbackOrchestrator, ExecutionMode, ExecutionOutcome, ExecutionRequest,
    TerminalState, next_mode,
};
pub use lifecycle::{ExecutionObserver, ExecutionRecord, NoopObserver, ObserverRef};
pub use scheduler::{Debouncer, QuoteGate, QuoteKey, RefreshScheduler, VenueSelection};
pub use slippage::{DynamicSlippageEstimator, SlippageConfig, SlippageEstimate};
