pub mod accounts;
pub mod swqos;
pub mod tokens;
pub mod trade_platform;

pub use accounts::*;
pub use tokens::*;
