use std::str::FromStr;

use log::info;

use crate::account::{Account, AccountManager, AccountProvider, AccountStatus};
use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::session_manager::SessionManager;
use crate::sign_client::SignClient;
use crate::view::Screen;

pub const HELP: &str = "\
commands:
  sign-in                 create the smart account on the current chain
  chain <name|id>         switch chain, closing every session
  pair <wc:uri>           pair with a dApp
  approve | reject        resolve the pending session proposal
  disconnect <topic>      close one session
  approve-request         sign or send the pending request
  reject-request          refuse the pending request
  refresh                 poll the relay and the deployment status
  help | quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SignIn,
    Chain(Chain),
    Pair(String),
    Approve,
    Reject,
    Disconnect(String),
    ApproveRequest,
    RejectRequest,
    Refresh,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let name = words
            .next()
            .ok_or(Error::InvalidState("empty command"))?;
        let mut argument = |missing: &'static str| {
            words.next().map(str::to_string).ok_or(Error::InvalidState(missing))
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "sign-in" | "signin" => Command::SignIn,
            "chain" => Command::Chain(argument("chain needs a name or id")?.parse()?),
            "pair" => Command::Pair(argument("pair needs a wc: URI")?),
            "approve" => Command::Approve,
            "reject" => Command::Reject,
            "disconnect" => Command::Disconnect(argument("disconnect needs a topic")?),
            "approve-request" => Command::ApproveRequest,
            "reject-request" => Command::RejectRequest,
            "refresh" => Command::Refresh,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(Error::NotFound(format!("command {other}"))),
        };
        Ok(command)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Help,
    Quit,
}

/// The wallet: one account at a time and the sessions opened with it.
pub struct App<P: AccountProvider, C: SignClient> {
    accounts: AccountManager<P>,
    sessions: SessionManager<C>,
    default_chain: Chain,
}

impl<P: AccountProvider, C: SignClient> App<P, C> {
    pub fn new(
        provider: P,
        client: C,
        default_chain: Chain,
        queue_capacity: usize,
    ) -> Self {
        Self {
            accounts: AccountManager::new(provider),
            sessions: SessionManager::new(client, queue_capacity),
            default_chain,
        }
    }

    pub fn accounts(&self) -> &AccountManager<P> {
        &self.accounts
    }

    pub fn sessions(&self) -> &SessionManager<C> {
        &self.sessions
    }

    pub fn screen(&self) -> Screen {
        Screen::from_snapshots(&self.accounts.snapshot(), &self.sessions.snapshot())
    }

    pub fn chain(&self) -> Chain {
        self.accounts.snapshot().chain.unwrap_or(self.default_chain)
    }

    pub async fn dispatch(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::SignIn => {
                self.sign_in().await?;
            }
            Command::Chain(chain) => {
                self.switch_chain(chain).await?;
            }
            Command::Pair(uri) => {
                self.ready_account()?;
                self.sessions.connect(&uri).await?;
            }
            Command::Approve => {
                let account = self.ready_account()?;
                self.sessions.approve_proposal(Some(&account)).await?;
            }
            Command::Reject => self.sessions.reject_proposal().await?,
            Command::Disconnect(topic) => self.sessions.disconnect(&topic).await?,
            Command::ApproveRequest => {
                self.sessions
                    .approve_session_request(self.accounts.current())
                    .await?;
            }
            Command::RejectRequest => self.sessions.reject_session_request().await?,
            Command::Refresh => self.refresh().await?,
            Command::Help => return Ok(Flow::Help),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    pub async fn sign_in(&mut self) -> Result<Account> {
        let chain = self.chain();
        self.accounts.create_account(chain).await
    }

    /// Sessions were approved for the old account, so they all go first.
    pub async fn switch_chain(&mut self, chain: Chain) -> Result<Account> {
        info!("switching to {chain}");
        self.sessions.reset().await?;
        self.accounts.create_account(chain).await
    }

    /// Polls the relay; called on every tick of the poll timer.
    pub async fn tick(&mut self) -> Result<()> {
        self.sessions.poll().await
    }

    async fn refresh(&mut self) -> Result<()> {
        if self.accounts.current().is_some() {
            // recorded in the account snapshot
            let _ = self.accounts.refresh_deployment().await;
        }
        self.sessions.poll().await
    }

    fn ready_account(&self) -> Result<Account> {
        let snapshot = self.accounts.snapshot();
        match (snapshot.status, snapshot.account) {
            (AccountStatus::Ready, Some(account)) => Ok(account),
            _ => Err(Error::InvalidState("sign in first")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sign_client::RelayEvent;
    use crate::testing::{MockAccountProvider, MockSignClient, URI, proposal, request};

    fn app(client: MockSignClient) -> App<MockAccountProvider, MockSignClient> {
        App::new(MockAccountProvider::default(), client, Chain::Polygon, 8)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("sign-in".parse::<Command>().unwrap(), Command::SignIn);
        assert_eq!(" chain base ".parse::<Command>().unwrap(), Command::Chain(Chain::Base));
        assert_eq!("chain 137".parse::<Command>().unwrap(), Command::Chain(Chain::Polygon));
        assert_eq!(
            format!("pair {URI}").parse::<Command>().unwrap(),
            Command::Pair(URI.to_string())
        );
        assert_eq!(
            "disconnect abc".parse::<Command>().unwrap(),
            Command::Disconnect("abc".to_string())
        );
        assert_eq!("APPROVE-REQUEST".parse::<Command>().unwrap(), Command::ApproveRequest);
        assert_eq!("exit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_bad_commands() {
        let err = "pair".parse::<Command>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = "launch".parse::<Command>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = "chain gnosis".parse::<Command>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!("   ".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn test_pair_needs_an_account() {
        let mut app = app(MockSignClient::default());

        let err = app.dispatch(Command::Pair(URI.to_string())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(app.sessions().client().paired.is_empty());

        let err = app.dispatch(Command::Approve).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(app.screen(), Screen::SignIn);
    }

    #[tokio::test]
    async fn test_sign_in_pair_approve() {
        let client = MockSignClient {
            on_pair: vec![RelayEvent::Proposal(proposal(
                1,
                "Example Dapp",
                "https://example-dapp.com",
            ))],
            ..Default::default()
        };
        let mut app = app(client);

        assert_eq!(app.dispatch(Command::SignIn).await.unwrap(), Flow::Continue);
        assert_eq!(app.accounts().snapshot().status, AccountStatus::Ready);

        app.dispatch(Command::Pair(URI.to_string())).await.unwrap();
        app.dispatch(Command::Approve).await.unwrap();

        let screen = app.screen();
        let Screen::Dashboard(dashboard) = &screen else {
            panic!("expected dashboard, got {screen:?}");
        };
        assert_eq!(dashboard.sessions.len(), 1);
        assert_eq!(dashboard.sessions[0].peer.name, "Example Dapp");
        assert_eq!(dashboard.account.chain, Chain::Polygon);
        assert!(dashboard.pending_proposal.is_none());
    }

    #[tokio::test]
    async fn test_chain_switch_closes_sessions() {
        let client = MockSignClient {
            on_pair: vec![RelayEvent::Proposal(proposal(
                1,
                "Example Dapp",
                "https://example-dapp.com",
            ))],
            ..Default::default()
        };
        let mut app = app(client);
        app.dispatch(Command::SignIn).await.unwrap();
        app.dispatch(Command::Pair(URI.to_string())).await.unwrap();
        app.dispatch(Command::Approve).await.unwrap();

        app.dispatch(Command::Chain(Chain::Base)).await.unwrap();

        assert_eq!(app.chain(), Chain::Base);
        assert_eq!(app.sessions().sessions().count(), 0);
        assert_eq!(app.sessions().client().disconnected, vec!["session-1"]);
        let account = app.accounts().snapshot().account.unwrap();
        assert_eq!(account.chain, Chain::Base);
    }

    #[tokio::test]
    async fn test_failed_sign_in_shows_failure() {
        let provider = MockAccountProvider {
            missing_credentials: vec![Chain::Polygon],
            ..Default::default()
        };
        let mut app = App::new(provider, MockSignClient::default(), Chain::Polygon, 8);

        let err = app.dispatch(Command::SignIn).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(app.screen(), Screen::Failed { chain: Some(Chain::Polygon), .. }));

        // switching to a configured chain recovers
        app.dispatch(Command::Chain(Chain::Base)).await.unwrap();
        assert!(matches!(app.screen(), Screen::Dashboard(_)));
    }

    #[tokio::test]
    async fn test_request_answered_through_app() {
        let client = MockSignClient {
            on_pair: vec![RelayEvent::Proposal(proposal(
                1,
                "Example Dapp",
                "https://example-dapp.com",
            ))],
            ..Default::default()
        };
        let mut app = app(client);
        app.dispatch(Command::SignIn).await.unwrap();
        app.dispatch(Command::Pair(URI.to_string())).await.unwrap();
        app.dispatch(Command::Approve).await.unwrap();

        app.sessions.client_mut().on_poll = vec![RelayEvent::Request(request(
            2,
            "session-1",
            "personal_sign",
            serde_json::json!(["0x68656c6c6f", "0xaa"]),
        ))];
        app.tick().await.unwrap();
        assert!(app.sessions().pending_request().is_some());

        app.dispatch(Command::ApproveRequest).await.unwrap();
        assert!(app.sessions().pending_request().is_none());
        assert_eq!(app.sessions().client().responses.len(), 1);
    }

    #[tokio::test]
    async fn test_help_and_quit() {
        let mut app = app(MockSignClient::default());
        assert_eq!(app.dispatch(Command::Help).await.unwrap(), Flow::Help);
        assert_eq!(app.dispatch(Command::Quit).await.unwrap(), Flow::Quit);
    }
}
