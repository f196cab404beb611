use crate::constants::trade_platform;
use crate::instruction::utils::{
    meteora_dlmm, orca_whirlpool, raydium_amm_v4, raydium_clmm, raydium_cpmm,
};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Swap venues the router knows about.
///
/// `Jupiter` is only ever a benchmark / external aggregator and never a native route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    #[serde(rename = "raydium_amm_v4")]
    RaydiumAmmV4,
    #[serde(rename = "raydium_cpmm")]
    RaydiumCpmm,
    #[serde(rename = "raydium_clmm")]
    RaydiumClmm,
    #[serde(rename = "orca_whirlpool")]
    OrcaWhirlpool,
    #[serde(rename = "meteora_dlmm")]
    MeteoraDlmm,
    #[serde(rename = "jupiter")]
    Jupiter,
}

impl Venue {
    pub const NATIVE: [Venue; 5] = [
        Venue::RaydiumAmmV4,
        Venue::RaydiumCpmm,
        Venue::RaydiumClmm,
        Venue::OrcaWhirlpool,
        Venue::MeteoraDlmm,
    ];

    pub fn is_native(&self) -> bool {
        !matches!(self, Venue::Jupiter)
    }

    pub fn program_id(&self) -> Option<Pubkey> {
        match self {
            Venue::RaydiumAmmV4 => Some(raydium_amm_v4::accounts::RAYDIUM_AMM_V4),
            Venue::RaydiumCpmm => Some(raydium_cpmm::accounts::RAYDIUM_CPMM),
            Venue::RaydiumClmm => Some(raydium_clmm::accounts::RAYDIUM_CLMM),
            Venue::OrcaWhirlpool => Some(orca_whirlpool::accounts::WHIRLPOOL_PROGRAM),
            Venue::MeteoraDlmm => Some(meteora_dlmm::accounts::DLMM_PROGRAM),
            Venue::Jupiter => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::RaydiumAmmV4 => trade_platform::RAYDIUM_AMM_V4,
            Venue::RaydiumCpmm => trade_platform::RAYDIUM_CPMM,
            Venue::RaydiumClmm => trade_platform::RAYDIUM_CLMM,
            Venue::OrcaWhirlpool => trade_platform::ORCA_WHIRLPOOL,
            Venue::MeteoraDlmm => trade_platform::METEORA_DLMM,
            Venue::Jupiter => trade_platform::JUPITER,
        }
    }

    /// Venue byte stored in the swap plan and in `swap_direct` data.
    pub fn id(&self) -> u8 {
        match self {
            Venue::RaydiumAmmV4 => 1,
            Venue::RaydiumCpmm => 2,
            Venue::RaydiumClmm => 3,
            Venue::OrcaWhirlpool => 4,
            Venue::MeteoraDlmm => 5,
            Venue::Jupiter => 0,
        }
    }

    pub fn from_id(id: u8) -> Option<Venue> {
        match id {
            0 => Some(Venue::Jupiter),
            1 => Some(Venue::RaydiumAmmV4),
            2 => Some(Venue::RaydiumCpmm),
            3 => Some(Venue::RaydiumClmm),
            4 => Some(Venue::OrcaWhirlpool),
            5 => Some(Venue::MeteoraDlmm),
            _ => None,
        }
    }

    /// Compute unit budget for one router -> venue CPI.
    /// Tick / bin walking venues need the most headroom.
    pub fn compute_unit_limit(&self) -> u32 {
        match self {
            Venue::RaydiumAmmV4 => 300_000,
            Venue::RaydiumCpmm => 250_000,
            Venue::RaydiumClmm => 400_000,
            Venue::OrcaWhirlpool => 350_000,
            Venue::MeteoraDlmm => 400_000,
            Venue::Jupiter => 600_000,
        }
    }
}

impl Display for Venue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "raydium_amm_v4" | "raydium_amm" | "raydium_v4" | "raydium" | "amm_v4" => {
                Ok(Venue::RaydiumAmmV4)
            }
            "raydium_cpmm" | "cpmm" => Ok(Venue::RaydiumCpmm),
            "raydium_clmm" | "clmm" => Ok(Venue::RaydiumClmm),
            "orca_whirlpool" | "orca" | "whirlpool" => Ok(Venue::OrcaWhirlpool),
            "meteora_dlmm" | "meteora" | "dlmm" => Ok(Venue::MeteoraDlmm),
            "jupiter" | "jup" => Ok(Venue::Jupiter),
            _ => Err(format!("Unknown venue: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_parse_aliases() {
        assert_eq!("raydium".parse::<Venue>().unwrap(), Venue::RaydiumAmmV4);
        assert_eq!("Orca".parse::<Venue>().unwrap(), Venue::OrcaWhirlpool);
        assert_eq!("meteora-dlmm".parse::<Venue>().unwrap(), Venue::MeteoraDlmm);
        assert_eq!("jupiter".parse::<Venue>().unwrap(), Venue::Jupiter);
        assert!("serum".parse::<Venue>().is_err());
    }

    #[test]
    fn test_venue_id_round_trip() {
        for venue in Venue::NATIVE {
            assert!(venue.is_native());
            assert!(venue.program_id().is_some());
            assert_eq!(Venue::from_id(venue.id()), Some(venue));
            assert_eq!(venue.as_str().parse::<Venue>().unwrap(), venue);
        }
        assert!(!Venue::Jupiter.is_native());
        assert_eq!(Venue::from_id(42), None);
    }
}
