//! In-memory stand-ins for the relay and the account provider.

use std::collections::HashMap;

use alloy::primitives::{Address, B256, Bytes, Signature, U256};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use serde_json::{Value, json};

use crate::account::{Account, AccountProvider, SmartAccount};
use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::session::{RequestResponse, Session, SessionProposal, SessionRequest};
use crate::sign_client::{RelayEvent, SignClient};
use crate::types::{
    ErrorReason, Id, Namespace, SessionProposeParams, SessionRequestParams,
};
use crate::utils::PairingUri;

pub const URI: &str = "wc:7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9@2?relay-protocol=irn&symKey=587d5484ce2a2a6ee3ba1962fdd7e8588e06200c46823bd18fbd67def96ad303";

pub fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn proposal_params(name: &str, url: &str) -> SessionProposeParams {
    serde_json::from_value(json!({
        "requiredNamespaces": {
            "eip155": {
                "chains": ["eip155:137"],
                "methods": ["eth_sendTransaction", "personal_sign"],
                "events": ["chainChanged", "accountsChanged"]
            }
        },
        "optionalNamespaces": {},
        "relays": [{ "protocol": "irn" }],
        "pairingTopic": "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9",
        "proposer": {
            "publicKey": "690a17937795cf5af845bd7c0701156f647d9bcb211eb7bd85d362fa371cb02d",
            "metadata": { "name": name, "description": "", "url": url, "icons": [] }
        }
    }))
    .expect("valid proposal")
}

pub fn request_params(method: &str, params: Value) -> SessionRequestParams {
    serde_json::from_value(json!({
        "chainId": "eip155:137",
        "request": { "method": method, "params": params }
    }))
    .expect("valid request")
}

pub fn proposal(id: u64, name: &str, url: &str) -> SessionProposal {
    SessionProposal::new(
        Id::from(id),
        proposal_params(name, url),
        "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9",
    )
}

pub fn request(id: u64, topic: &str, method: &str, params: Value) -> SessionRequest {
    SessionRequest::new(Id::from(id), topic, request_params(method, params))
}

/// Records every call; events to deliver are queued up front.
#[derive(Default)]
pub struct MockSignClient {
    pub on_pair: Vec<RelayEvent>,
    pub on_poll: Vec<RelayEvent>,
    pub offline: bool,
    pub refuse_settlement: bool,
    pub paired: Vec<String>,
    pub rejected: Vec<(Id, ErrorReason)>,
    pub responses: Vec<(Id, RequestResponse)>,
    pub disconnected: Vec<String>,
    pub sessions_created: usize,
}

impl MockSignClient {
    fn relay(&self) -> Result<()> {
        if self.offline {
            return Err(Error::pairing("relay unreachable"));
        }
        Ok(())
    }
}

impl SignClient for MockSignClient {
    async fn pair(&mut self, uri: &PairingUri) -> Result<Vec<RelayEvent>> {
        self.relay()?;
        self.paired.push(uri.topic.clone());
        Ok(std::mem::take(&mut self.on_pair))
    }

    async fn approve_session(
        &mut self,
        proposal: &SessionProposal,
        namespaces: HashMap<String, Namespace>,
    ) -> Result<(Session, Vec<RelayEvent>)> {
        self.relay()?;
        if self.refuse_settlement {
            return Err(Error::PairingNotApproved);
        }
        self.sessions_created += 1;
        let topic = format!("session-{}", self.sessions_created);
        Ok((Session::new(topic, proposal, namespaces, 1_000_000), vec![]))
    }

    async fn reject_session(
        &mut self,
        proposal: &SessionProposal,
        reason: ErrorReason,
    ) -> Result<()> {
        self.relay()?;
        self.rejected.push((proposal.id.clone(), reason));
        Ok(())
    }

    async fn respond(
        &mut self,
        request: &SessionRequest,
        response: RequestResponse,
    ) -> Result<()> {
        self.relay()?;
        self.responses.push((request.id.clone(), response));
        Ok(())
    }

    async fn disconnect(&mut self, topic: &str) -> Result<()> {
        self.relay()?;
        self.disconnected.push(topic.to_string());
        Ok(())
    }

    async fn poll_events(&mut self) -> Result<Vec<RelayEvent>> {
        self.relay()?;
        Ok(std::mem::take(&mut self.on_poll))
    }
}

#[derive(Default)]
pub struct MockAccountProvider {
    pub missing_credentials: Vec<Chain>,
    pub unreachable: bool,
    pub deployment_unavailable: bool,
    pub failing_transactions: bool,
}

impl AccountProvider for MockAccountProvider {
    type Account = MockSmartAccount;

    async fn create_account(&self, chain: Chain) -> Result<MockSmartAccount> {
        if self.missing_credentials.contains(&chain) {
            return Err(Error::configuration(format!(
                "{}_PROJECT_ID is not set",
                chain.env_prefix()
            )));
        }
        if self.unreachable {
            return Err("connection refused".into());
        }
        Ok(MockSmartAccount::new(
            chain,
            self.deployment_unavailable,
            self.failing_transactions,
        ))
    }
}

pub struct MockSmartAccount {
    account: Account,
    signer: PrivateKeySigner,
    deployment_unavailable: bool,
    failing_transactions: bool,
}

impl MockSmartAccount {
    pub fn new(
        chain: Chain,
        deployment_unavailable: bool,
        failing_transactions: bool,
    ) -> Self {
        let signer = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42))
            .expect("valid key");
        Self {
            account: Account {
                chain,
                address: address(0xaa),
                owner: signer.address(),
            },
            signer,
            deployment_unavailable,
            failing_transactions,
        }
    }
}

impl SmartAccount for MockSmartAccount {
    fn account(&self) -> &Account {
        &self.account
    }

    async fn is_deployed(&self) -> Result<bool> {
        if self.deployment_unavailable {
            return Err("eth_getCode failed".into());
        }
        Ok(false)
    }

    async fn send_transaction(
        &self,
        _to: Address,
        _value: U256,
        _data: Bytes,
    ) -> Result<B256> {
        if self.failing_transactions {
            return Err(Error::transaction("AA21 didn't pay prefund"));
        }
        Ok(B256::repeat_byte(0x11))
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.signer.sign_message_sync(message)?)
    }
}
