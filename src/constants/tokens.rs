//! Well-known token mints
//!
//! Hard-coded mint addresses for the bridge assets the router quotes against.

use solana_sdk::pubkey;

pub use solana_sdk::pubkey::Pubkey;

/// SOL Mint (Wrapped SOL)
pub const SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// USDC Mint (mainnet)
pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// USDT Mint (mainnet)
pub const USDT_MINT: Pubkey = pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");

/// Mints priced at exactly 1.0 USD without asking the oracle.
pub const STABLECOIN_MINTS: [Pubkey; 2] = [USDC_MINT, USDT_MINT];

#[inline]
pub fn is_stablecoin(mint: &Pubkey) -> bool {
    STABLECOIN_MINTS.contains(mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stablecoin_membership() {
        assert!(is_stablecoin(&USDC_MINT));
        assert!(is_stablecoin(&USDT_MINT));
        assert!(!is_stablecoin(&SOL_MINT));
    }
}
