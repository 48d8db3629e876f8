//! # smart-account-connect
//!
//! Connects a sponsored smart-contract account to dApps over
//! [WalletConnect v2](https://specs.walletconnect.com/2.0/).
//!
//! ## Features
//! - Account lifecycle per chain through an [`AccountProvider`]
//! - Pairing, session proposals and session requests over the relay
//! - `personal_sign`, `eth_sign` and `eth_sendTransaction` requests
//!
//! ## Example
//!
//! ```no_run
//! use smart_account_connect::{
//!     App, Command, Config, RpcAccountProvider, WalletConnectClient,
//! };
//!
//! # async fn run() -> smart_account_connect::Result<()> {
//! let config = Config::from_env()?;
//! let client = WalletConnectClient::from_config(&config)?;
//! let (chain, capacity) = (config.default_chain, config.queue_capacity);
//! let mut app = App::new(RpcAccountProvider::new(config), client, chain, capacity);
//!
//! app.dispatch(Command::SignIn).await?;
//! app.dispatch("pair wc:...@2?relay-protocol=irn&symKey=...".parse()?).await?;
//! app.dispatch(Command::Approve).await?;
//!
//! loop {
//!     app.tick().await?;
//!     print!("{}", app.screen());
//! }
//! # }
//! ```
//!
//! ## License
//! MIT OR Apache-2.0

pub mod account;
pub mod app;
pub mod chain;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod message;
pub mod pairing;
pub mod relay_auth;
pub mod rpc;
pub mod session;
pub mod session_manager;
pub mod sign_client;
pub mod types;
pub mod utils;
pub mod view;
pub mod wc_message;

#[cfg(test)]
mod testing;

/// Exposed for easy access
pub use account::{
    Account, AccountManager, AccountProvider, RpcAccountProvider, SmartAccount,
};
pub use app::{App, Command, Flow};
pub use chain::Chain;
pub use config::Config;
pub use connection::Connection;
pub use error::{Error, ErrorKind, ErrorReport, Result};
pub use session_manager::SessionManager;
pub use sign_client::{SignClient, WalletConnectClient};
pub use view::Screen;
