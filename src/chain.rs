use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// EVM chains an account can be created on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Mainnet,
    Polygon,
    Base,
    Arbitrum,
    Optimism,
    Sepolia,
    PolygonAmoy,
    BaseSepolia,
}

impl Chain {
    pub const ALL: [Chain; 8] = [
        Chain::Mainnet,
        Chain::Polygon,
        Chain::Base,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Sepolia,
        Chain::PolygonAmoy,
        Chain::BaseSepolia,
    ];

    pub fn id(&self) -> u64 {
        match self {
            Chain::Mainnet => 1,
            Chain::Polygon => 137,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            Chain::Optimism => 10,
            Chain::Sepolia => 11155111,
            Chain::PolygonAmoy => 80002,
            Chain::BaseSepolia => 84532,
        }
    }

    pub fn from_id(id: u64) -> Option<Chain> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Chain::Mainnet => "mainnet",
            Chain::Polygon => "polygon",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Sepolia => "sepolia",
            Chain::PolygonAmoy => "polygon-amoy",
            Chain::BaseSepolia => "base-sepolia",
        }
    }

    /// CAIP-2 identifier, e.g. `eip155:137`.
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.id())
    }

    /// Prefix of the per-chain environment keys, e.g. `POLYGON_AMOY`.
    pub fn env_prefix(&self) -> String {
        self.name().replace('-', "_").to_uppercase()
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts a name (`polygon`), a chain id (`137`) or CAIP-2 (`eip155:137`).
impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let id = s.strip_prefix("eip155:").unwrap_or(s);
        if let Ok(id) = id.parse::<u64>() {
            return Chain::from_id(id)
                .ok_or_else(|| Error::NotFound(format!("chain {id}")));
        }

        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::NotFound(format!("chain {s}")))
    }
}
