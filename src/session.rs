/// Session
///
/// Proposals, settled sessions and dApp requests as the wallet tracks them,
/// plus the translation of a request into an account action.
///
use std::collections::{BTreeSet, HashMap};

use alloy::hex;
use alloy::primitives::{Address, Bytes, U256};
use serde::Deserialize;
use serde_json::Value;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::types::{
    ErrorReason, Id, Metadata, Namespace, Participant, SessionProposeParams,
    SessionRequestParams,
};

pub const EIP155: &str = "eip155";

pub const SUPPORTED_METHODS: [&str; 3] =
    ["personal_sign", "eth_sign", "eth_sendTransaction"];

pub const SUPPORTED_EVENTS: [&str; 2] = ["chainChanged", "accountsChanged"];

#[derive(Clone, Debug, PartialEq)]
pub struct SessionProposal {
    pub id: Id,
    pub pairing_topic: String,
    pub proposer: Participant,
    /// Origin the dApp claims, from its metadata url.
    pub origin: String,
    pub required_namespaces: HashMap<String, Namespace>,
    pub optional_namespaces: HashMap<String, Namespace>,
    pub expiry: Option<u64>,
}

impl SessionProposal {
    /// `pairing_topic` is the topic the proposal arrived on.
    pub fn new(id: Id, params: SessionProposeParams, pairing_topic: &str) -> Self {
        Self {
            id,
            pairing_topic: pairing_topic.to_string(),
            origin: params.proposer.metadata.url.clone(),
            proposer: params.proposer,
            required_namespaces: params.required_namespaces,
            optional_namespaces: params.optional_namespaces,
            expiry: params.expiry_timestamp,
        }
    }

    pub fn peer(&self) -> &Metadata {
        &self.proposer.metadata
    }

    /// Namespaces granted to the dApp for `account`.
    ///
    /// Every required chain has to be the account's chain and every
    /// required method and event one the wallet handles; optional chains
    /// the account is not on are left out.
    pub fn namespaces_for(
        &self,
        account: &Account,
    ) -> Result<HashMap<String, Namespace>> {
        let ours = account.chain.caip2();

        let mut unsupported = BTreeSet::new();
        for (key, ns) in &self.required_namespaces {
            for chain in namespace_chains(key, ns) {
                if chain != ours {
                    unsupported.insert(chain);
                }
            }
        }
        if !unsupported.is_empty() {
            return Err(Error::UnsupportedChains(
                unsupported.into_iter().collect(),
            ));
        }

        let missing: BTreeSet<String> = self
            .required_namespaces
            .values()
            .flat_map(|ns| {
                let methods = ns
                    .methods
                    .iter()
                    .filter(|m| !SUPPORTED_METHODS.contains(&m.as_str()));
                let events = ns
                    .events
                    .iter()
                    .filter(|e| !SUPPORTED_EVENTS.contains(&e.as_str()));
                methods.chain(events).cloned()
            })
            .collect();
        if !missing.is_empty() {
            return Err(Error::UnsupportedMethods(missing.into_iter().collect()));
        }

        let requested_events: BTreeSet<&str> = self
            .required_namespaces
            .iter()
            .chain(&self.optional_namespaces)
            .filter(|(key, _)| key.starts_with(EIP155))
            .flat_map(|(_, ns)| ns.events.iter().map(String::as_str))
            .collect();

        let namespace = Namespace {
            accounts: Some(vec![account.caip10()]),
            chains: vec![ours],
            methods: SUPPORTED_METHODS.iter().map(|m| m.to_string()).collect(),
            events: SUPPORTED_EVENTS
                .iter()
                .filter(|e| requested_events.contains(*e))
                .map(|e| e.to_string())
                .collect(),
        };

        Ok(HashMap::from([(EIP155.to_string(), namespace)]))
    }
}

// A namespace keyed by a CAIP-2 id may omit its chain list
fn namespace_chains(key: &str, ns: &Namespace) -> Vec<String> {
    if ns.chains.is_empty() && key.contains(':') {
        vec![key.to_string()]
    } else if !key.starts_with(EIP155) {
        // non-EVM namespaces can never be satisfied
        if ns.chains.is_empty() {
            vec![key.to_string()]
        } else {
            ns.chains.clone()
        }
    } else {
        ns.chains.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub topic: String,
    pub pairing_topic: String,
    pub peer: Metadata,
    pub namespaces: HashMap<String, Namespace>,
    pub accounts: Vec<String>,
    pub expiry: u64,
}

impl Session {
    pub fn new(
        topic: String,
        proposal: &SessionProposal,
        namespaces: HashMap<String, Namespace>,
        expiry: u64,
    ) -> Self {
        let mut accounts: Vec<String> = namespaces
            .values()
            .flat_map(|ns| ns.accounts.clone().unwrap_or_default())
            .collect();
        accounts.sort();

        Self {
            topic,
            pairing_topic: proposal.pairing_topic.clone(),
            peer: proposal.peer().clone(),
            namespaces,
            accounts,
            expiry,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionRequest {
    pub id: Id,
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    pub params: Value,
    pub expiry: Option<u64>,
}

impl SessionRequest {
    pub fn new(id: Id, topic: &str, params: SessionRequestParams) -> Self {
        Self {
            id,
            topic: topic.to_string(),
            chain_id: params.chain_id,
            method: params.request.method,
            params: params.request.params,
            expiry: params.request.expiry_timestamp,
        }
    }

    /// Decodes what the dApp asks the account to do.
    pub fn action(&self) -> Result<RequestAction> {
        match self.method.as_str() {
            "personal_sign" => {
                let message = self.param_str(0)?;
                Ok(RequestAction::SignMessage(decode_message(message)))
            }
            "eth_sign" => {
                let message = self.param_str(1)?;
                Ok(RequestAction::SignMessage(decode_message(message)))
            }
            "eth_sendTransaction" => {
                let tx = self
                    .params
                    .get(0)
                    .cloned()
                    .ok_or("eth_sendTransaction without a transaction")?;
                let tx: TransactionParams = serde_json::from_value(tx)?;
                let to = tx.to.ok_or("contract creation is not supported")?;
                Ok(RequestAction::SendTransaction {
                    to,
                    value: tx.value.unwrap_or_default(),
                    data: tx.data.or(tx.input).unwrap_or_default(),
                })
            }
            other => Err(Error::UnsupportedMethod(other.to_string())),
        }
    }

    fn param_str(&self, index: usize) -> Result<&str> {
        self.params
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("{} param {index} missing", self.method).into())
    }
}

/// 0x-prefixed hex is raw bytes, anything else is signed as UTF-8.
fn decode_message(message: &str) -> Vec<u8> {
    match message.strip_prefix("0x").map(hex::decode) {
        Some(Ok(bytes)) => bytes,
        _ => message.as_bytes().to_vec(),
    }
}

#[derive(Deserialize)]
struct TransactionParams {
    to: Option<Address>,
    #[serde(default)]
    value: Option<U256>,
    #[serde(default)]
    data: Option<Bytes>,
    #[serde(default)]
    input: Option<Bytes>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestAction {
    SignMessage(Vec<u8>),
    SendTransaction { to: Address, value: U256, data: Bytes },
}

/// Answer the wallet sends for a request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestResponse {
    Result(Value),
    Error(ErrorReason),
}
