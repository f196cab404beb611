//! Jito Block Engine 区域
//!
//! 选择离自己最近的区域可以降低 bundle 提交延迟。

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// ```rust
/// use native_swap_router::swqos::jito::JitoRegion;
///
/// let region: JitoRegion = "tyo".parse().unwrap();
/// assert_eq!(region, JitoRegion::Tokyo);
/// assert_eq!(region.bundles_url(), "https://tokyo.mainnet.block-engine.jito.wtf/api/v1/bundles");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitoRegion {
    #[default]
    Default,
    Amsterdam,
    Dublin,
    Frankfurt,
    London,
    NewYork,
    SLC,
    Singapore,
    Tokyo,
}

impl JitoRegion {
    pub const ALL: [JitoRegion; 9] = [
        JitoRegion::Default,
        JitoRegion::Amsterdam,
        JitoRegion::Dublin,
        JitoRegion::Frankfurt,
        JitoRegion::London,
        JitoRegion::NewYork,
        JitoRegion::SLC,
        JitoRegion::Singapore,
        JitoRegion::Tokyo,
    ];

    /// Block Engine base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            JitoRegion::Default => "https://mainnet.block-engine.jito.wtf",
            JitoRegion::Amsterdam => "https://amsterdam.mainnet.block-engine.jito.wtf",
            JitoRegion::Dublin => "https://dublin.mainnet.block-engine.jito.wtf",
            JitoRegion::Frankfurt => "https://frankfurt.mainnet.block-engine.jito.wtf",
            JitoRegion::London => "https://london.mainnet.block-engine.jito.wtf",
            JitoRegion::NewYork => "https://ny.mainnet.block-engine.jito.wtf",
            JitoRegion::SLC => "https://slc.mainnet.block-engine.jito.wtf",
            JitoRegion::Singapore => "https://singapore.mainnet.block-engine.jito.wtf",
            JitoRegion::Tokyo => "https://tokyo.mainnet.block-engine.jito.wtf",
        }
    }

    pub fn bundles_url(&self) -> String {
        bundles_url(self.endpoint())
    }
}

/// `{engine}/api/v1/bundles`, tolerant of a trailing slash on the engine URL.
pub fn bundles_url(engine: &str) -> String {
    format!("{}/api/v1/bundles", engine.trim_end_matches('/'))
}

impl FromStr for JitoRegion {
    type Err = String;

    /// 大小写不敏感，支持常用简称
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" | "mainnet" => Ok(JitoRegion::Default),
            "amsterdam" | "ams" => Ok(JitoRegion::Amsterdam),
            "dublin" | "dub" => Ok(JitoRegion::Dublin),
            "frankfurt" | "fra" | "ffm" => Ok(JitoRegion::Frankfurt),
            "london" | "lon" => Ok(JitoRegion::London),
            "newyork" | "ny" => Ok(JitoRegion::NewYork),
            "slc" | "saltlakecity" => Ok(JitoRegion::SLC),
            "singapore" | "sgp" | "sg" => Ok(JitoRegion::Singapore),
            "tokyo" | "tyo" => Ok(JitoRegion::Tokyo),
            _ => Err(format!("Unknown Jito region: {}", s)),
        }
    }
}

impl Display for JitoRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("TOKYO".parse::<JitoRegion>().unwrap(), JitoRegion::Tokyo);
        assert_eq!("ny".parse::<JitoRegion>().unwrap(), JitoRegion::NewYork);
        assert_eq!(" sg ".parse::<JitoRegion>().unwrap(), JitoRegion::Singapore);
        assert!("losangeles".parse::<JitoRegion>().is_err());
    }

    #[test]
    fn test_bundles_url() {
        assert_eq!(
            JitoRegion::Default.bundles_url(),
            "https://mainnet.block-engine.jito.wtf/api/v1/bundles"
        );
        assert_eq!(bundles_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000/api/v1/bundles");
        assert_eq!(JitoRegion::NewYork.to_string(), "NewYork");
        assert!(JitoRegion::ALL.iter().all(|r| r.endpoint().starts_with("https://")));
    }
}
