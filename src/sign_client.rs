use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::pairing::{Pairing, SessionChannel};
use crate::session::{RequestResponse, Session, SessionProposal, SessionRequest};
use crate::types::{ErrorReason, Id, Namespace};
use crate::utils::PairingUri;
use crate::wc_message::{WcData, WcMessage};

/// Something the dApp side did that the wallet has to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayEvent {
    Proposal(SessionProposal),
    Request(SessionRequest),
    SessionDeleted { topic: String },
}

/// Sign-protocol client the session manager drives.
#[allow(async_fn_in_trait)]
pub trait SignClient {
    /// Pairs with a dApp and returns what it already sent.
    async fn pair(&mut self, uri: &PairingUri) -> Result<Vec<RelayEvent>>;

    /// Settles a session. Events that raced the settlement are returned too.
    async fn approve_session(
        &mut self,
        proposal: &SessionProposal,
        namespaces: HashMap<String, Namespace>,
    ) -> Result<(Session, Vec<RelayEvent>)>;

    async fn reject_session(
        &mut self,
        proposal: &SessionProposal,
        reason: ErrorReason,
    ) -> Result<()>;

    async fn respond(
        &mut self,
        request: &SessionRequest,
        response: RequestResponse,
    ) -> Result<()>;

    async fn disconnect(&mut self, topic: &str) -> Result<()>;

    async fn poll_events(&mut self) -> Result<Vec<RelayEvent>>;
}

/// [`SignClient`] backed by the WalletConnect relay.
pub struct WalletConnectClient {
    connection: Arc<Connection>,
    pairings: HashMap<String, Pairing>,
    sessions: HashMap<String, SessionChannel>,
    // raw messages, kept to answer them with the right tag
    proposals: HashMap<Id, WcMessage>,
    requests: HashMap<(String, Id), WcMessage>,
}

impl WalletConnectClient {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection: Arc::new(connection),
            pairings: HashMap::new(),
            sessions: HashMap::new(),
            proposals: HashMap::new(),
            requests: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let connection = Connection::new(
            &config.relay_url,
            &config.relay_audience,
            &config.walletconnect_project_id,
            config.client_seed,
            config.metadata.clone(),
        )?;
        Ok(Self::new(connection))
    }

    async fn handle(
        &mut self,
        topic: &str,
        messages: Vec<WcMessage>,
    ) -> Vec<RelayEvent> {
        let mut events = vec![];
        for msg in messages {
            match self.handle_one(topic, msg).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!("failed to handle message on {topic}: {e}"),
            }
        }
        events
    }

    async fn handle_one(
        &mut self,
        topic: &str,
        msg: WcMessage,
    ) -> Result<Option<RelayEvent>> {
        match &msg.data {
            WcData::SessionPropose(params) => {
                let proposal =
                    SessionProposal::new(msg.id.clone(), params.clone(), topic);
                self.proposals.insert(msg.id.clone(), msg);
                Ok(Some(RelayEvent::Proposal(proposal)))
            }
            WcData::SessionRequest(params) => {
                if !self.sessions.contains_key(topic) {
                    return Err(Error::NotFound(format!("session {topic}")));
                }
                let request =
                    SessionRequest::new(msg.id.clone(), topic, params.clone());
                self.requests
                    .insert((topic.to_string(), msg.id.clone()), msg);
                Ok(Some(RelayEvent::Request(request)))
            }
            WcData::SessionPing => {
                self.reply(topic, &msg, &msg.result(Value::Bool(true)))
                    .await?;
                Ok(None)
            }
            WcData::SessionDelete(reason) => {
                info!("dApp closed {topic}: {}", reason.message);
                let reply = msg.result(Value::Bool(true));
                self.reply(topic, &msg, &reply).await?;
                self.forget_session(topic);
                Ok(Some(RelayEvent::SessionDeleted {
                    topic: topic.to_string(),
                }))
            }
            WcData::SessionAuthenticate(_) => {
                info!("ignoring wc_sessionAuthenticate {} on {topic}", msg.id);
                Ok(None)
            }
            WcData::SessionSettle(_) => {
                warn!("unexpected wc_sessionSettle from dApp on {topic}");
                Ok(None)
            }
            WcData::Result(_) | WcData::Error(_) => {
                debug!("late response {} on {topic}", msg.id);
                Ok(None)
            }
        }
    }

    async fn reply(
        &self,
        topic: &str,
        request: &WcMessage,
        response: &WcMessage,
    ) -> Result<()> {
        if let Some(channel) = self.sessions.get(topic) {
            channel.reply(request, response).await
        } else if let Some(pairing) = self.pairings.get(topic) {
            pairing.reply(request, response).await
        } else {
            Err(Error::NotFound(format!("topic {topic}")))
        }
    }

    fn forget_session(&mut self, topic: &str) -> Option<SessionChannel> {
        self.requests.retain(|(t, _), _| t != topic);
        self.sessions.remove(topic)
    }
}

impl SignClient for WalletConnectClient {
    async fn pair(&mut self, uri: &PairingUri) -> Result<Vec<RelayEvent>> {
        let pairing = match self.pairings.get(&uri.topic) {
            Some(pairing) => pairing.clone(),
            None => Pairing::new(uri.clone(), self.connection.clone()),
        };

        let messages = pairing.init_pairing().await.map_err(Error::pairing)?;
        info!("paired on {uri}, {} message(s) waiting", messages.len());
        self.pairings.insert(uri.topic.clone(), pairing);

        Ok(self.handle(&uri.topic, messages).await)
    }

    async fn approve_session(
        &mut self,
        proposal: &SessionProposal,
        namespaces: HashMap<String, Namespace>,
    ) -> Result<(Session, Vec<RelayEvent>)> {
        let raw = self
            .proposals
            .get(&proposal.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("proposal {}", proposal.id)))?;
        let pairing = self
            .pairings
            .get(&proposal.pairing_topic)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("pairing {}", proposal.pairing_topic))
            })?;

        let settled = pairing
            .approve(&raw, namespaces)
            .await
            .map_err(Error::pairing)?;
        self.proposals.remove(&proposal.id);

        let topic = settled.channel.topic().to_string();
        self.sessions.insert(topic.clone(), settled.channel);

        let session = Session::new(
            topic.clone(),
            proposal,
            settled.settle.namespaces,
            settled.settle.expiry,
        );
        let events = self.handle(&topic, settled.excess).await;

        Ok((session, events))
    }

    async fn reject_session(
        &mut self,
        proposal: &SessionProposal,
        reason: ErrorReason,
    ) -> Result<()> {
        let raw = self
            .proposals
            .remove(&proposal.id)
            .ok_or_else(|| Error::NotFound(format!("proposal {}", proposal.id)))?;
        let pairing = self
            .pairings
            .get(&proposal.pairing_topic)
            .ok_or_else(|| {
                Error::NotFound(format!("pairing {}", proposal.pairing_topic))
            })?;

        pairing.reject(&raw, reason).await.map_err(Error::pairing)
    }

    async fn respond(
        &mut self,
        request: &SessionRequest,
        response: RequestResponse,
    ) -> Result<()> {
        let raw = self
            .requests
            .remove(&(request.topic.clone(), request.id.clone()))
            .ok_or_else(|| Error::NotFound(format!("request {}", request.id)))?;

        let reply = match response {
            RequestResponse::Result(value) => raw.result(value),
            RequestResponse::Error(reason) => raw.error(reason),
        };
        self.reply(&request.topic, &raw, &reply)
            .await
            .map_err(Error::pairing)
    }

    async fn disconnect(&mut self, topic: &str) -> Result<()> {
        let channel = self
            .forget_session(topic)
            .ok_or_else(|| Error::NotFound(format!("session {topic}")))?;
        channel.delete().await.map_err(Error::pairing)
    }

    async fn poll_events(&mut self) -> Result<Vec<RelayEvent>> {
        let mut fetched = vec![];
        let mut last_error = None;
        let mut attempts = 0;

        for pairing in self.pairings.values() {
            attempts += 1;
            match pairing.fetch_messages().await {
                Ok(messages) => fetched.push((pairing.topic().to_string(), messages)),
                Err(e) => last_error = Some(e),
            }
        }
        for channel in self.sessions.values() {
            attempts += 1;
            match channel.fetch_messages().await {
                Ok(messages) => fetched.push((channel.topic().to_string(), messages)),
                Err(e) => last_error = Some(e),
            }
        }

        // one unreachable topic does not hide the others' messages
        if let Some(e) = last_error {
            if fetched.is_empty() {
                return Err(Error::pairing(e));
            }
            warn!("relay poll failed on some of {attempts} topics: {e}");
        }

        let mut events = vec![];
        for (topic, messages) in fetched {
            if !messages.is_empty() {
                events.extend(self.handle(&topic, messages).await);
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{proposal_params, request_params};
    use crate::types::Metadata;

    fn client() -> WalletConnectClient {
        WalletConnectClient::new(
            Connection::new(
                "http://127.0.0.1:9/rpc",
                "http://127.0.0.1:9",
                "project",
                [3u8; 32],
                Metadata::default(),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_proposal_becomes_event() {
        let mut client = client();
        let params = proposal_params("Example Dapp", "https://example-dapp.com");
        let msg = WcMessage::new(Id::from(11u64), WcData::SessionPropose(params));

        let events = client.handle("pairing", vec![msg]).await;
        let [RelayEvent::Proposal(proposal)] = events.as_slice() else {
            panic!("unexpected {events:?}");
        };
        assert_eq!(proposal.id, Id::from(11u64));
        assert_eq!(proposal.origin, "https://example-dapp.com");
        assert!(client.proposals.contains_key(&Id::from(11u64)));
    }

    #[tokio::test]
    async fn test_request_for_unknown_session_is_dropped() {
        let mut client = client();
        let msg = WcMessage::new(
            Id::from(12u64),
            WcData::SessionRequest(request_params(
                "personal_sign",
                serde_json::json!(["0x00"]),
            )),
        );

        assert!(client.handle("nowhere", vec![msg]).await.is_empty());
        assert!(client.requests.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_targets_are_not_found() {
        let mut client = client();

        let err = client.disconnect("nowhere").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let request = SessionRequest::new(
            Id::from(1u64),
            "nowhere",
            request_params("personal_sign", serde_json::json!([])),
        );
        let err = client
            .respond(&request, RequestResponse::Result(Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(client.poll_events().await.unwrap().is_empty());
    }
}
