use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{Address, B256};

use crate::chain::Chain;
use crate::constants::{
    BUNDLER_RPC_URL, DEFAULT_ACCOUNT_FACTORY, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_QUEUE_CAPACITY, RELAY_AUTH_AUDIENCE, RELAY_RPC_URL,
};
use crate::error::{Error, Result};
use crate::types::Metadata;
use crate::utils::random_bytes32;

/// Runtime settings, read from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub private_key: B256,
    pub project_ids: HashMap<Chain, String>,
    pub walletconnect_project_id: String,
    pub relay_url: String,
    pub relay_audience: String,
    pub client_seed: [u8; 32],
    pub default_chain: Chain,
    pub queue_capacity: usize,
    pub account_factory: Address,
    pub bundler_rpc_url: String,
    pub poll_interval: Duration,
    pub metadata: Metadata,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| Error::configuration(format!("{key} is not set")))
        };

        let private_key = required("PRIVATE_KEY")?
            .parse::<B256>()
            .map_err(|_| Error::configuration("PRIVATE_KEY is not a 32 byte hex key"))?;

        let project_ids: HashMap<Chain, String> = Chain::ALL
            .into_iter()
            .filter_map(|chain| {
                get(&format!("{}_PROJECT_ID", chain.env_prefix()))
                    .map(|id| (chain, id))
            })
            .collect();
        if project_ids.is_empty() {
            return Err(Error::configuration(
                "no <CHAIN>_PROJECT_ID is set, e.g. POLYGON_PROJECT_ID",
            ));
        }

        let client_seed = match get("WALLETCONNECT_CLIENT_SEED") {
            Some(seed) => hex::decode_to_array::<_, 32>(seed.trim()).map_err(
                |_| Error::configuration("WALLETCONNECT_CLIENT_SEED must be 32 hex bytes"),
            )?,
            None => random_bytes32(),
        };

        let default_chain = match get("DEFAULT_CHAIN") {
            Some(chain) => chain.parse::<Chain>().map_err(|_| {
                Error::configuration(format!("DEFAULT_CHAIN {chain} is not supported"))
            })?,
            None => Chain::Polygon,
        };

        let queue_capacity = parse_or(&get, "PENDING_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err(Error::configuration("PENDING_QUEUE_CAPACITY must be positive"));
        }

        let poll_interval_ms =
            parse_or(&get, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(Error::configuration("POLL_INTERVAL_MS must be positive"));
        }

        let account_factory = match get("ACCOUNT_FACTORY") {
            Some(factory) => factory
                .parse::<Address>()
                .map_err(|_| Error::configuration("ACCOUNT_FACTORY is not an address"))?,
            None => DEFAULT_ACCOUNT_FACTORY,
        };

        Ok(Config {
            private_key,
            project_ids,
            walletconnect_project_id: required("WALLETCONNECT_PROJECT_ID")?,
            relay_url: get("WALLETCONNECT_RELAY_URL")
                .unwrap_or_else(|| RELAY_RPC_URL.to_string()),
            relay_audience: RELAY_AUTH_AUDIENCE.to_string(),
            client_seed,
            default_chain,
            queue_capacity,
            account_factory,
            bundler_rpc_url: get("BUNDLER_RPC_URL")
                .unwrap_or_else(|| BUNDLER_RPC_URL.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            metadata: Metadata {
                name: "Smart Account Connect".to_string(),
                description: "Sponsored smart-contract account wallet".to_string(),
                url: "https://github.com/smart-account-connect".to_string(),
                icons: vec![],
            },
        })
    }

    pub fn project_id(&self, chain: Chain) -> Result<&str> {
        self.project_ids
            .get(&chain)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "{}_PROJECT_ID is not set",
                    chain.env_prefix()
                ))
            })
    }

    /// Bundler endpoint serving the given chain.
    pub fn rpc_url(&self, chain: Chain) -> Result<String> {
        Ok(format!("{}{}", self.bundler_rpc_url, self.project_id(chain)?))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::configuration(format!("{key} is not a number: {value}"))),
        None => Ok(default),
    }
}

// Keys stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("private_key", &"<redacted>")
            .field("chains", &self.project_ids.keys().collect::<Vec<_>>())
            .field("relay_url", &self.relay_url)
            .field("default_chain", &self.default_chain)
            .field("queue_capacity", &self.queue_capacity)
            .field("account_factory", &self.account_factory)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const KEY: &str =
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_lookup(lookup(&[
            ("PRIVATE_KEY", KEY),
            ("POLYGON_PROJECT_ID", "zd-polygon"),
            ("WALLETCONNECT_PROJECT_ID", "wc-project"),
        ]))
        .unwrap();

        assert_eq!(config.default_chain, Chain::Polygon);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.poll_interval, Duration::from_millis(2000));
        assert_eq!(config.account_factory, DEFAULT_ACCOUNT_FACTORY);
        assert_eq!(
            config.rpc_url(Chain::Polygon).unwrap(),
            "https://rpc.zerodev.app/api/v2/bundler/zd-polygon"
        );
        assert_eq!(
            config.rpc_url(Chain::Base).unwrap_err().kind(),
            ErrorKind::Configuration
        );
        assert!(!format!("{config:?}").contains("4c0883"));
    }

    #[test]
    fn test_overrides() {
        let seed = "11".repeat(32);
        let config = Config::from_lookup(lookup(&[
            ("PRIVATE_KEY", KEY),
            ("BASE_SEPOLIA_PROJECT_ID", "zd-base"),
            ("WALLETCONNECT_PROJECT_ID", "wc-project"),
            ("WALLETCONNECT_CLIENT_SEED", seed.as_str()),
            ("DEFAULT_CHAIN", "84532"),
            ("PENDING_QUEUE_CAPACITY", "2"),
            ("POLL_INTERVAL_MS", "500"),
            ("BUNDLER_RPC_URL", "http://localhost:4337/"),
        ]))
        .unwrap();

        assert_eq!(config.client_seed, [0x11; 32]);
        assert_eq!(config.default_chain, Chain::BaseSepolia);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(
            config.rpc_url(Chain::BaseSepolia).unwrap(),
            "http://localhost:4337/zd-base"
        );
    }

    #[test]
    fn test_missing_values_are_configuration_errors() {
        let cases: [&[(&str, &str)]; 5] = [
            &[
                ("POLYGON_PROJECT_ID", "zd"),
                ("WALLETCONNECT_PROJECT_ID", "wc"),
            ],
            &[("PRIVATE_KEY", KEY), ("WALLETCONNECT_PROJECT_ID", "wc")],
            &[("PRIVATE_KEY", KEY), ("POLYGON_PROJECT_ID", "zd")],
            &[
                ("PRIVATE_KEY", "0x1234"),
                ("POLYGON_PROJECT_ID", "zd"),
                ("WALLETCONNECT_PROJECT_ID", "wc"),
            ],
            &[
                ("PRIVATE_KEY", KEY),
                ("POLYGON_PROJECT_ID", "zd"),
                ("WALLETCONNECT_PROJECT_ID", "wc"),
                ("POLL_INTERVAL_MS", "0"),
            ],
        ];

        for pairs in cases {
            let err = Config::from_lookup(lookup(pairs)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{err}");
        }
    }
}
