pub mod meteora_dlmm;
pub mod openbook;
pub mod orca_whirlpool;
pub mod raydium_amm_v4;
pub mod raydium_clmm;
pub mod raydium_cpmm;
pub mod router;
pub mod spl_token;

// types
pub mod meteora_dlmm_types;
pub mod orca_whirlpool_types;
pub mod raydium_amm_v4_types;
pub mod raydium_clmm_types;
pub mod raydium_cpmm_types;

use borsh::BorshDeserialize;
use sha2::{Digest, Sha256};

pub const ANCHOR_DISCRIMINATOR_LEN: usize = 8;

/// `sha256("<namespace>:<name>")[..8]`
pub fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Check the 8 byte account discriminator and borsh-read `T` from the bytes after it.
///
/// Only the prefix `T` describes is read; trailing fields are ignored.
pub fn decode_anchor_account<T: BorshDeserialize>(data: &[u8], discriminator: &[u8; 8]) -> Option<T> {
    if data.len() < ANCHOR_DISCRIMINATOR_LEN || &data[..ANCHOR_DISCRIMINATOR_LEN] != discriminator {
        return None;
    }
    let mut body = &data[ANCHOR_DISCRIMINATOR_LEN..];
    T::deserialize(&mut body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_discriminators() {
        assert_eq!(anchor_discriminator("global", "swap"), [248, 198, 158, 145, 225, 117, 135, 200]);
        assert_eq!(anchor_discriminator("global", "swap_v2"), [43, 4, 237, 11, 26, 201, 30, 98]);
        assert_eq!(
            anchor_discriminator("account", "PoolState"),
            [247, 237, 227, 245, 215, 195, 222, 70]
        );
    }

    #[test]
    fn test_decode_anchor_account_rejects_wrong_discriminator() {
        let mut data = vec![1u8; 8];
        data.extend_from_slice(&7u64.to_le_bytes());
        assert_eq!(decode_anchor_account::<u64>(&data, &[1u8; 8]), Some(7));
        assert_eq!(decode_anchor_account::<u64>(&data, &[2u8; 8]), None);
        assert_eq!(decode_anchor_account::<u64>(&data[..4], &[1u8; 8]), None);
    }
}
