/// Pairing
///
/// Implementation of walletconnect specs to pair with a dApp, settle sessions
/// and exchange messages on the session topic.
///
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::hex;
use log::{debug, info, warn};
use serde_json::Value;

use crate::connection::Connection;
use crate::constants::{
    RELAY_PROTOCOL, SESSION_EXPIRY, SETTLE_ACK_ATTEMPTS,
    SETTLE_ACK_INTERVAL_MS, USER_DISCONNECTED_CODE, USER_DISCONNECTED_MESSAGE,
};
use crate::error::{Error, Result};
use crate::message::{EncodingType, Message, TYPE_0};
use crate::types::{
    EncryptedMessage, ErrorReason, IrnTag, Namespace, Participant, Relay,
    SessionProposeParams, SessionProposeResponse, SessionSettleParams,
};
use crate::utils::{
    PairingUri, derive_sym_key, random_bytes32, topic_of, unix_timestamp,
    x25519_public_key,
};
use crate::wc_message::{WcData, WcMessage};

/// A pairing with one dApp, on the topic scanned from its URI.
#[derive(Clone)]
pub struct Pairing {
    uri: PairingUri,
    connection: Arc<Connection>,
}

/// Session established with [`Pairing::approve`].
pub struct SettledSession {
    pub channel: SessionChannel,
    pub settle: SessionSettleParams,
    /// Messages that arrived on the session topic before the acknowledgement.
    pub excess: Vec<WcMessage>,
}

impl Pairing {
    pub fn new(uri: PairingUri, connection: Arc<Connection>) -> Self {
        Self { uri, connection }
    }

    pub fn topic(&self) -> &str {
        &self.uri.topic
    }

    /// Initialise the pairing process
    ///
    /// 1. Subscribe to the relay with the topic in the URI
    /// 2. Fetch the messages the dapp already published
    ///
    /// Proposals among them are approved or rejected with the methods below.
    pub async fn init_pairing(&self) -> Result<Vec<WcMessage>> {
        let now = unix_timestamp()?;
        if self.uri.is_expired(now) {
            return Err(Error::UriExpired(
                self.uri.expiry_timestamp.unwrap_or_default(),
            ));
        }

        let subscription = self.connection.irn_subscribe(self.topic()).await?;
        debug!("subscribed to pairing {} ({subscription})", self.topic());

        self.fetch_messages().await
    }

    pub async fn fetch_messages(&self) -> Result<Vec<WcMessage>> {
        fetch(&self.connection, self.topic(), self.uri.sym_key).await
    }

    /// Approve a proposal by settling a session
    ///
    /// 1. Answer the proposal on the pairing topic with a fresh public key.
    /// 2. Subscribe to the topic of the key derived from both public keys.
    /// 3. Publish wc_sessionSettle there and wait for the dApp to acknowledge.
    pub async fn approve(
        &self,
        proposal: &WcMessage,
        namespaces: HashMap<String, Namespace>,
    ) -> Result<SettledSession> {
        let WcData::SessionPropose(params) = &proposal.data else {
            return Err("not a session proposal".into());
        };

        let private_key = random_bytes32();
        let public_key = x25519_public_key(private_key);

        let response = proposal.result(serde_json::to_value(
            SessionProposeResponse {
                relay: Relay {
                    protocol: RELAY_PROTOCOL.to_string(),
                },
                responder_public_key: hex::encode(public_key),
            },
        )?);
        self.reply(proposal, &response).await?;

        let channel = SessionChannel::derive(
            private_key,
            params,
            self.connection.clone(),
        )?;
        channel.subscribe().await?;

        let settle = SessionSettleParams {
            controller: Participant {
                public_key: hex::encode(public_key),
                metadata: self.connection.metadata().clone(),
            },
            expiry: unix_timestamp()? + SESSION_EXPIRY,
            namespaces,
            relay: Relay {
                protocol: RELAY_PROTOCOL.to_string(),
            },
            pairing_topic: Some(self.topic().to_string()),
        };
        let settle_message = WcMessage::new(
            self.connection.next_message_id(),
            WcData::SessionSettle(settle.clone()),
        );
        channel
            .send(&settle_message, IrnTag::SessionSettle, 300)
            .await?;

        let excess = channel.await_ack(&settle_message).await?;
        info!("session {} settled", channel.topic());

        Ok(SettledSession {
            channel,
            settle,
            excess,
        })
    }

    pub async fn reject(
        &self,
        proposal: &WcMessage,
        reason: ErrorReason,
    ) -> Result<()> {
        self.reply(proposal, &proposal.error(reason)).await
    }

    /// Answers a request received on the pairing topic.
    pub async fn reply(
        &self,
        request: &WcMessage,
        response: &WcMessage,
    ) -> Result<()> {
        let (tag, ttl) = reply_tag(request, response)?;
        publish(
            &self.connection,
            self.topic(),
            self.uri.sym_key,
            response,
            tag,
            ttl,
        )
        .await
    }
}

/// Encrypted channel on a settled session topic.
#[derive(Clone)]
pub struct SessionChannel {
    sym_key: [u8; 32],
    topic: String,
    connection: Arc<Connection>,
}

impl SessionChannel {
    fn derive(
        private_key: [u8; 32],
        proposal: &SessionProposeParams,
        connection: Arc<Connection>,
    ) -> Result<Self> {
        let proposer_key =
            hex::decode_to_array::<_, 32>(&proposal.proposer.public_key)?;
        let sym_key = derive_sym_key(private_key, proposer_key)?;

        Ok(Self {
            sym_key,
            topic: topic_of(sym_key),
            connection,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn subscribe(&self) -> Result<String> {
        self.connection.irn_subscribe(&self.topic).await
    }

    pub async fn fetch_messages(&self) -> Result<Vec<WcMessage>> {
        fetch(&self.connection, &self.topic, self.sym_key).await
    }

    pub async fn send(
        &self,
        message: &WcMessage,
        tag: IrnTag,
        ttl: u64,
    ) -> Result<()> {
        publish(&self.connection, &self.topic, self.sym_key, message, tag, ttl)
            .await
    }

    pub async fn reply(
        &self,
        request: &WcMessage,
        response: &WcMessage,
    ) -> Result<()> {
        let (tag, ttl) = reply_tag(request, response)?;
        self.send(response, tag, ttl).await
    }

    /// Tells the dApp the user ended the session.
    pub async fn delete(&self) -> Result<()> {
        let message = WcMessage::new(
            self.connection.next_message_id(),
            WcData::SessionDelete(ErrorReason::new(
                USER_DISCONNECTED_CODE,
                USER_DISCONNECTED_MESSAGE,
            )),
        );
        self.send(&message, IrnTag::SessionDelete, 86400).await
    }

    // Returns the unrelated messages fetched while waiting
    async fn await_ack(&self, settle: &WcMessage) -> Result<Vec<WcMessage>> {
        let mut excess = vec![];

        for _ in 0..SETTLE_ACK_ATTEMPTS {
            for msg in self.fetch_messages().await? {
                if msg.id != settle.id {
                    excess.push(msg);
                    continue;
                }
                return match msg.data {
                    WcData::Result(Value::Bool(true)) => Ok(excess),
                    WcData::Error(reason) => Err(Error::RemoteError {
                        code: reason.code,
                        message: reason.message,
                    }),
                    _ => Err(Error::PairingNotApproved),
                };
            }
            tokio::time::sleep(Duration::from_millis(SETTLE_ACK_INTERVAL_MS))
                .await;
        }

        // dApps may acknowledge later; the settle is already published
        warn!("no settle acknowledgement on {}", self.topic);
        Ok(excess)
    }
}

fn reply_tag(request: &WcMessage, response: &WcMessage) -> Result<(IrnTag, u64)> {
    let method = request
        .method()
        .ok_or("cannot reply to a response")?;
    let tag = match response.data {
        WcData::Error(_) => method.reject_tag(),
        _ => method.response_tag(),
    };
    Ok((tag, method.ttl()))
}

async fn publish(
    connection: &Connection,
    topic: &str,
    sym_key: [u8; 32],
    message: &WcMessage,
    tag: IrnTag,
    ttl: u64,
) -> Result<()> {
    let cipher_text = message.into_raw()?.encrypt(
        sym_key,
        TYPE_0,
        None,
        EncodingType::Base64,
    )?;

    connection
        .irn_publish(EncryptedMessage::new(
            topic.to_string(),
            cipher_text,
            tag,
            ttl,
        ))
        .await?;
    Ok(())
}

// Undecodable messages are skipped so one bad payload does not stall a topic
async fn fetch(
    connection: &Connection,
    topic: &str,
    sym_key: [u8; 32],
) -> Result<Vec<WcMessage>> {
    let messages = connection.irn_fetch_messages(topic).await?;

    Ok(messages
        .into_iter()
        .filter_map(|m| {
            match Message::decrypt(&m.message, sym_key, EncodingType::Base64)
                .and_then(Message::decode)
            {
                Ok(msg) => Some(msg),
                Err(e) => {
                    warn!("dropping message on {topic} (tag {}): {e}", m.tag);
                    None
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{Id, Metadata};

    fn proposal(proposer_key: [u8; 32]) -> SessionProposeParams {
        serde_json::from_value(json!({
            "requiredNamespaces": {},
            "optionalNamespaces": {},
            "relays": [{ "protocol": "irn" }],
            "pairingTopic": "abc",
            "proposer": {
                "publicKey": hex::encode(x25519_public_key(proposer_key)),
                "metadata": { "name": "Example Dapp", "url": "https://example-dapp.com" }
            }
        }))
        .unwrap()
    }

    fn connection() -> Arc<Connection> {
        Arc::new(
            Connection::new(
                "http://127.0.0.1:9/rpc",
                "http://127.0.0.1:9",
                "project",
                [1u8; 32],
                Metadata::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_session_topic_matches_dapp_derivation() {
        let wallet_key = random_bytes32();
        let dapp_key = random_bytes32();

        let channel =
            SessionChannel::derive(wallet_key, &proposal(dapp_key), connection())
                .unwrap();

        let dapp_sym =
            derive_sym_key(dapp_key, x25519_public_key(wallet_key)).unwrap();
        assert_eq!(channel.topic(), topic_of(dapp_sym));
    }

    #[test]
    fn test_reply_tags() {
        let propose = WcMessage::new(
            Id::from(1u64),
            WcData::SessionPropose(proposal([2u8; 32])),
        );
        let (tag, ttl) =
            reply_tag(&propose, &propose.error(ErrorReason::new(5000, "no")))
                .unwrap();
        assert_eq!(tag, IrnTag::SessionProposeRejectResponse);
        assert_eq!(ttl, 300);

        let ping = WcMessage::new(Id::from(2u64), WcData::SessionPing);
        let (tag, ttl) = reply_tag(&ping, &ping.result(Value::Bool(true))).unwrap();
        assert_eq!(tag, IrnTag::SessionPingResponse);
        assert_eq!(ttl, 30);

        let response = ping.result(Value::Null);
        assert!(reply_tag(&response, &response).is_err());
    }
}
