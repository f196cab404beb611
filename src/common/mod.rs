pub mod error;
pub mod mock_rpc;
pub mod rpc;
pub mod types;
pub mod venue;

pub use error::{Remediation, RouterError, RouterResult};
pub use rpc::ChainClient;
pub use types::*;
pub use venue::Venue;
