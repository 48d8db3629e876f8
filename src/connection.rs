use log::debug;
use serde_json::{Value, json};

use crate::error::Result;
use crate::relay_auth::RelayAuth;
use crate::rpc::JsonRpcClient;
use crate::types::{EncryptedMessage, FetchMessageResult, Id, Metadata};

/// Authenticated connection to the WalletConnect relay RPC.
pub struct Connection {
    client: JsonRpcClient,
    metadata: Metadata,
}

impl Connection {
    pub fn new(
        rpc: &str,
        jwt_aud: &str,
        project_id: &str,
        client_seed: [u8; 32],
        metadata: Metadata,
    ) -> Result<Self> {
        let auth = RelayAuth::new(client_seed);
        debug!("relay client id {}", auth.client_id());

        let client = JsonRpcClient::new(rpc)
            .with_query("projectId", project_id)
            .with_bearer(auth.sign_jwt(jwt_aud)?);

        Ok(Self { client, metadata })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn next_message_id(&self) -> Id {
        Id::from(self.client.next_id())
    }

    /// Returns the subscription id.
    pub async fn irn_subscribe(&self, topic: &str) -> Result<String> {
        self.client
            .request("irn_subscribe", json!({ "topic": topic }))
            .await
    }

    /// Drains every message the relay holds for the topic.
    pub async fn irn_fetch_messages(
        &self,
        topic: &str,
    ) -> Result<Vec<EncryptedMessage>> {
        let mut messages = vec![];
        loop {
            let page: FetchMessageResult = self
                .client
                .request("irn_fetchMessages", json!({ "topic": topic }))
                .await?;
            messages.extend(page.messages);
            if !page.has_more {
                break;
            }
        }
        Ok(messages)
    }

    pub async fn irn_publish(&self, message: EncryptedMessage) -> Result<Value> {
        debug!("publish tag {} on {}", message.tag, message.topic);
        self.client.request("irn_publish", message).await
    }
}
