pub mod compute_budget;
pub mod transaction_builder;

pub use compute_budget::{compute_budget_instructions, strip_compute_budget};
pub use transaction_builder::{MessageFormat, build_transaction, compile_message, sign_prebuilt};
