/// Account
///
/// Contract with the account-abstraction provider and the lifecycle of the
/// account the wallet currently acts as.
///
use alloy::primitives::{Address, B256, Bytes, Signature, U256};
use log::{info, warn};
use tokio::sync::watch;

use crate::chain::Chain;
use crate::error::{Error, ErrorReport, Result};

pub mod rpc;

pub use rpc::{RpcAccountProvider, RpcSmartAccount};

/// Smart-contract account on one chain. Replaced, never mutated, on a
/// chain switch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub chain: Chain,
    pub address: Address,
    /// EOA that controls the account.
    pub owner: Address,
}

impl Account {
    /// CAIP-10 account id, e.g. `eip155:137:0xabc…`.
    pub fn caip10(&self) -> String {
        format!("{}:{}", self.chain.caip2(), self.address)
    }
}

/// Authenticated client for one account.
#[allow(async_fn_in_trait)]
pub trait SmartAccount {
    fn account(&self) -> &Account;

    async fn is_deployed(&self) -> Result<bool>;

    /// Submits a sponsored transaction and returns its hash.
    async fn send_transaction(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
    ) -> Result<B256>;

    /// EIP-191 personal signature.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature>;
}

#[allow(async_fn_in_trait)]
pub trait AccountProvider {
    type Account: SmartAccount;

    async fn create_account(&self, chain: Chain) -> Result<Self::Account>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccountStatus {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// What the view reads about the account.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AccountSnapshot {
    pub status: AccountStatus,
    pub chain: Option<Chain>,
    pub account: Option<Account>,
    pub deployed: Option<bool>,
    pub error: Option<ErrorReport>,
}

pub struct AccountManager<P: AccountProvider> {
    provider: P,
    current: Option<P::Account>,
    state: watch::Sender<AccountSnapshot>,
}

impl<P: AccountProvider> AccountManager<P> {
    pub fn new(provider: P) -> Self {
        let (state, _) = watch::channel(AccountSnapshot::default());
        Self {
            provider,
            current: None,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AccountSnapshot {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Option<&P::Account> {
        self.current.as_ref()
    }

    /// Creates the account for `chain`, discarding the previous one.
    pub async fn create_account(&mut self, chain: Chain) -> Result<Account> {
        self.current = None;
        self.state.send_replace(AccountSnapshot {
            status: AccountStatus::Loading,
            chain: Some(chain),
            ..Default::default()
        });

        let client = match self.provider.create_account(chain).await {
            Ok(client) => client,
            Err(e) => {
                let e = Error::provider(e);
                warn!("account creation on {chain} failed: {e}");
                self.state.send_modify(|s| {
                    s.status = AccountStatus::Failed;
                    s.error = Some(e.report());
                });
                return Err(e);
            }
        };

        let account = client.account().clone();
        info!("account {} ready on {chain}", account.address);
        self.current = Some(client);
        self.state.send_modify(|s| {
            s.status = AccountStatus::Ready;
            s.account = Some(account.clone());
        });

        // deployment status is informational only
        let _ = self.refresh_deployment().await;

        Ok(account)
    }

    pub async fn refresh_deployment(&mut self) -> Result<bool> {
        let client = self
            .current
            .as_ref()
            .ok_or(Error::InvalidState("no account"))?;

        match client.is_deployed().await {
            Ok(deployed) => {
                self.state.send_modify(|s| {
                    s.deployed = Some(deployed);
                    s.error = None;
                });
                Ok(deployed)
            }
            Err(e) => {
                let e = Error::provider(e);
                warn!("deployment status unavailable: {e}");
                self.state.send_modify(|s| s.error = Some(e.report()));
                Err(e)
            }
        }
    }
}
