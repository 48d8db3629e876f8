use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use rand::Rng;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;
use crate::types::{Id, JsonRpcRequest, JsonRpcResponse};

/// JSON-RPC 2.0 over HTTP POST, shared by the relay and the account provider.
pub struct JsonRpcClient {
    url: String,
    http: Client,
    bearer: Option<String>,
    query: Vec<(String, String)>,
    counter: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str) -> Self {
        let initial: u16 = rand::thread_rng().r#gen();
        Self {
            url: url.to_string(),
            http: Client::new(),
            bearer: None,
            query: vec![],
            counter: AtomicU64::new(initial as u64),
        }
    }

    pub fn with_bearer(mut self, token: String) -> Self {
        self.bearer = Some(token);
        self
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Message ids are the current time in nanoseconds plus a per-client
    /// counter, the scheme dApps use for sign-protocol payloads.
    pub fn next_id(&self) -> u128 {
        let date_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|now| now.as_millis() * 1_000_000)
            .unwrap_or_default();
        let extra = self.counter.fetch_add(1, Ordering::Relaxed) as u128;

        date_ns + extra
    }

    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params: Some(params),
            id: Id::from(self.next_id()),
        };
        debug!("rpc -> {} {method}", self.url);

        let mut builder = self.http.post(&self.url).json(&request);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await?
            .json::<JsonRpcResponse<R>>()
            .await?;

        if let Some(error) = response.error {
            Err(error.into())
        } else if let Some(result) = response.result {
            Ok(result)
        } else {
            Err(format!("Unexpected empty response to {method}").into())
        }
    }
}
