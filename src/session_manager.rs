/// Session Manager
///
/// Owns the session set and the pending proposal/request queues, drives the
/// sign client and publishes a snapshot of everything after each operation.
///
use std::collections::{BTreeMap, VecDeque};

use alloy::hex;
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::watch;

use crate::account::{Account, SmartAccount};
use crate::constants::{
    EXPIRED_CODE, EXPIRED_MESSAGE, REQUEST_FAILED_CODE, SESSION_NOT_FOUND_CODE,
    UNSUPPORTED_METHOD_CODE, USER_REJECTED_CODE, USER_REJECTED_MESSAGE,
};
use crate::error::{Error, ErrorReport, Result};
use crate::session::{
    RequestAction, RequestResponse, Session, SessionProposal, SessionRequest,
};
use crate::sign_client::{RelayEvent, SignClient};
use crate::types::{ErrorReason, Id};
use crate::utils::{PairingUri, unix_timestamp};

const QUEUE_FULL_MESSAGE: &str = "Wallet has too many pending items.";
const SEEN_IDS: usize = 256;

/// Bounded FIFO; the head is the item shown to the user.
#[derive(Clone, Debug)]
pub struct PendingQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> PendingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Hands the item back when the queue is full.
    pub fn push(&mut self, item: T) -> std::result::Result<(), T> {
        if self.items.len() >= self.capacity {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    pub fn head(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    pub sessions: Vec<Session>,
    pub pending_proposal: Option<SessionProposal>,
    pub pending_request: Option<SessionRequest>,
    pub queued_proposals: usize,
    pub queued_requests: usize,
    pub loading: bool,
    pub last_error: Option<ErrorReport>,
}

pub struct SessionManager<C: SignClient> {
    client: C,
    sessions: BTreeMap<String, Session>,
    proposals: PendingQueue<SessionProposal>,
    requests: PendingQueue<SessionRequest>,
    seen: VecDeque<Id>,
    loading: bool,
    last_error: Option<ErrorReport>,
    state: watch::Sender<SessionSnapshot>,
}

impl<C: SignClient> SessionManager<C> {
    pub fn new(client: C, queue_capacity: usize) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            client,
            sessions: BTreeMap::new(),
            proposals: PendingQueue::new(queue_capacity),
            requests: PendingQueue::new(queue_capacity),
            seen: VecDeque::new(),
            loading: false,
            last_error: None,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn pending_proposal(&self) -> Option<&SessionProposal> {
        self.proposals.head()
    }

    pub fn pending_request(&self) -> Option<&SessionRequest> {
        self.requests.head()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    /// Pairs with the dApp behind a `wc:` URI and queues its proposals.
    pub async fn connect(&mut self, uri: &str) -> Result<()> {
        self.begin();
        let result = self.connect_inner(uri).await;
        self.finish(result)
    }

    async fn connect_inner(&mut self, uri: &str) -> Result<()> {
        let uri: PairingUri = uri.parse().map_err(Error::pairing)?;
        if uri.is_expired(unix_timestamp()?) {
            return Err(Error::pairing(Error::UriExpired(
                uri.expiry_timestamp.unwrap_or_default(),
            )));
        }

        let events = self.client.pair(&uri).await.map_err(Error::pairing)?;
        self.apply(events).await;
        Ok(())
    }

    /// Approves the pending proposal for `account`.
    pub async fn approve_proposal(
        &mut self,
        account: Option<&Account>,
    ) -> Result<Session> {
        self.begin();
        let result = self.approve_proposal_inner(account).await;
        self.finish(result)
    }

    async fn approve_proposal_inner(
        &mut self,
        account: Option<&Account>,
    ) -> Result<Session> {
        let proposal = self
            .proposals
            .head()
            .cloned()
            .ok_or(Error::InvalidState("no pending proposal"))?;
        let account = account.ok_or(Error::InvalidState("no account"))?;

        let now = unix_timestamp()?;
        if let Some(at) = proposal.expiry.filter(|at| *at <= now) {
            self.proposals.pop();
            let reason = ErrorReason::new(EXPIRED_CODE, EXPIRED_MESSAGE);
            if let Err(e) = self.client.reject_session(&proposal, reason).await {
                warn!("could not reject expired {}: {e}", proposal.id);
            }
            return Err(Error::pairing(Error::Expired(at)));
        }

        // the proposal stays queued so the user can still reject it
        let namespaces =
            proposal.namespaces_for(account).map_err(Error::pairing)?;
        let (session, events) = self
            .client
            .approve_session(&proposal, namespaces)
            .await
            .map_err(Error::pairing)?;

        self.proposals.pop();
        info!("session {} with {}", session.topic, session.peer.name);
        self.sessions.insert(session.topic.clone(), session.clone());
        self.apply(events).await;

        Ok(session)
    }

    /// Rejects the pending proposal; it leaves the queue either way.
    pub async fn reject_proposal(&mut self) -> Result<()> {
        self.begin();
        let result = self.reject_proposal_inner().await;
        self.finish(result)
    }

    async fn reject_proposal_inner(&mut self) -> Result<()> {
        let proposal = self
            .proposals
            .pop()
            .ok_or(Error::InvalidState("no pending proposal"))?;

        self.client
            .reject_session(
                &proposal,
                ErrorReason::new(USER_REJECTED_CODE, USER_REJECTED_MESSAGE),
            )
            .await
            .map_err(Error::pairing)
    }

    /// Ends one session. It is dropped locally even if the relay is down.
    pub async fn disconnect(&mut self, topic: &str) -> Result<()> {
        self.begin();
        let result = self.disconnect_inner(topic).await;
        self.finish(result)
    }

    async fn disconnect_inner(&mut self, topic: &str) -> Result<()> {
        if self.sessions.remove(topic).is_none() {
            return Err(Error::NotFound(format!("session {topic}")));
        }
        self.requests.retain(|r| r.topic != topic);

        self.client.disconnect(topic).await.map_err(Error::pairing)
    }

    /// Executes the pending request with `account` and answers the dApp.
    ///
    /// The request leaves the queue whatever the outcome; failures are
    /// answered with an error response.
    pub async fn approve_session_request<A: SmartAccount>(
        &mut self,
        account: Option<&A>,
    ) -> Result<Value> {
        self.begin();
        let result = self.approve_session_request_inner(account).await;
        self.finish(result)
    }

    async fn approve_session_request_inner<A: SmartAccount>(
        &mut self,
        account: Option<&A>,
    ) -> Result<Value> {
        let now = unix_timestamp()?;
        let request = self
            .requests
            .pop()
            .ok_or(Error::InvalidState("no pending request"))?;

        let outcome = match request.expiry.filter(|at| *at <= now) {
            Some(at) => Err(Error::Expired(at)),
            None => execute(&request, account).await,
        };
        match outcome {
            Ok(result) => {
                self.client
                    .respond(&request, RequestResponse::Result(result.clone()))
                    .await
                    .map_err(Error::pairing)?;
                Ok(result)
            }
            Err(e) => {
                let code = match &e {
                    Error::UnsupportedMethod(_) => UNSUPPORTED_METHOD_CODE,
                    Error::Expired(_) => EXPIRED_CODE,
                    _ => REQUEST_FAILED_CODE,
                };
                let e = Error::transaction(e);
                let reason = ErrorReason::new(code, e.to_string());
                if let Err(relay) = self
                    .client
                    .respond(&request, RequestResponse::Error(reason))
                    .await
                {
                    warn!("could not report failure of {}: {relay}", request.id);
                }
                Err(e)
            }
        }
    }

    pub async fn reject_session_request(&mut self) -> Result<()> {
        self.begin();
        let result = self.reject_session_request_inner().await;
        self.finish(result)
    }

    async fn reject_session_request_inner(&mut self) -> Result<()> {
        let request = self
            .requests
            .pop()
            .ok_or(Error::InvalidState("no pending request"))?;

        self.client
            .respond(
                &request,
                RequestResponse::Error(ErrorReason::new(
                    USER_REJECTED_CODE,
                    USER_REJECTED_MESSAGE,
                )),
            )
            .await
            .map_err(Error::pairing)
    }

    /// Pulls new proposals, requests and deletions from the relay.
    ///
    /// A successful poll leaves the last error of a user operation in place.
    pub async fn poll(&mut self) -> Result<()> {
        match self.client.poll_events().await {
            Ok(events) => {
                self.apply(events).await;
                self.publish();
                Ok(())
            }
            Err(e) => {
                let e = Error::pairing(e);
                self.report_error(&e);
                Err(e)
            }
        }
    }

    /// Drops everything tied to the current account, before a chain switch.
    ///
    /// Pending requests are rejected and sessions deleted on a best-effort
    /// basis. Queued proposals are kept.
    pub async fn reset(&mut self) -> Result<()> {
        self.begin();

        let requests: Vec<_> = self.requests.drain().collect();
        for request in requests {
            let reason =
                ErrorReason::new(USER_REJECTED_CODE, USER_REJECTED_MESSAGE);
            if let Err(e) = self
                .client
                .respond(&request, RequestResponse::Error(reason))
                .await
            {
                warn!("could not reject {}: {e}", request.id);
            }
        }

        let topics: Vec<String> = self.sessions.keys().cloned().collect();
        self.sessions.clear();
        for topic in topics {
            if let Err(e) = self.client.disconnect(&topic).await {
                warn!("could not delete session {topic}: {e}");
            }
        }

        self.finish(Ok(()))
    }

    /// Records a failure that happened outside the manager's own operations.
    pub fn report_error(&mut self, error: &Error) {
        self.last_error = Some(error.report());
        self.publish();
    }

    async fn apply(&mut self, events: Vec<RelayEvent>) {
        for event in events {
            match event {
                RelayEvent::Proposal(proposal) => {
                    self.enqueue_proposal(proposal).await
                }
                RelayEvent::Request(request) => {
                    self.enqueue_request(request).await
                }
                RelayEvent::SessionDeleted { topic } => {
                    if self.sessions.remove(&topic).is_some() {
                        info!("session {topic} closed by the dApp");
                    }
                    self.requests.retain(|r| r.topic != topic);
                }
            }
        }
    }

    async fn enqueue_proposal(&mut self, proposal: SessionProposal) {
        if !self.first_sight(&proposal.id) {
            debug!("duplicate proposal {}", proposal.id);
            return;
        }

        if let Err(proposal) = self.proposals.push(proposal) {
            warn!("proposal queue full, rejecting {}", proposal.origin);
            let reason = ErrorReason::new(USER_REJECTED_CODE, QUEUE_FULL_MESSAGE);
            if let Err(e) = self.client.reject_session(&proposal, reason).await {
                warn!("could not reject {}: {e}", proposal.id);
            }
        }
    }

    async fn enqueue_request(&mut self, request: SessionRequest) {
        if !self.first_sight(&request.id) {
            debug!("duplicate request {}", request.id);
            return;
        }

        if !self.sessions.contains_key(&request.topic) {
            warn!("request {} for unknown session {}", request.id, request.topic);
            let reason =
                ErrorReason::new(SESSION_NOT_FOUND_CODE, "Session not found.");
            return self.refuse(&request, reason).await;
        }

        if let Err(request) = self.requests.push(request) {
            warn!("request queue full, rejecting {}", request.id);
            let reason = ErrorReason::new(USER_REJECTED_CODE, QUEUE_FULL_MESSAGE);
            self.refuse(&request, reason).await;
        }
    }

    async fn refuse(&mut self, request: &SessionRequest, reason: ErrorReason) {
        if let Err(e) = self
            .client
            .respond(request, RequestResponse::Error(reason))
            .await
        {
            warn!("could not refuse {}: {e}", request.id);
        }
    }

    fn first_sight(&mut self, id: &Id) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.seen.len() >= SEEN_IDS {
            self.seen.pop_front();
        }
        self.seen.push_back(id.clone());
        true
    }

    fn begin(&mut self) {
        self.loading = true;
        self.publish();
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.loading = false;
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!("{e}");
                self.last_error = Some(e.report());
            }
        }
        self.publish();
        result
    }

    fn publish(&self) {
        self.state.send_replace(SessionSnapshot {
            sessions: self.sessions.values().cloned().collect(),
            pending_proposal: self.proposals.head().cloned(),
            pending_request: self.requests.head().cloned(),
            queued_proposals: self.proposals.len(),
            queued_requests: self.requests.len(),
            loading: self.loading,
            last_error: self.last_error.clone(),
        });
    }
}

async fn execute<A: SmartAccount>(
    request: &SessionRequest,
    account: Option<&A>,
) -> Result<Value> {
    let account = account.ok_or("no account to execute the request")?;
    let chain = account.account().chain;
    if request.chain_id != chain.caip2() {
        return Err(format!(
            "request for {}, account is on {}",
            request.chain_id,
            chain.caip2()
        )
        .into());
    }

    match request.action()? {
        RequestAction::SignMessage(message) => {
            let signature = account.sign_message(&message).await?;
            Ok(Value::String(hex::encode_prefixed(signature.as_bytes())))
        }
        RequestAction::SendTransaction { to, value, data } => {
            let hash = account.send_transaction(to, value, data).await?;
            info!("request {} submitted as {hash}", request.id);
            Ok(Value::String(hash.to_string()))
        }
    }
}
