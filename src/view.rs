use std::fmt::{self, Display};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::account::{Account, AccountSnapshot, AccountStatus};
use crate::chain::Chain;
use crate::error::ErrorReport;
use crate::session::{Session, SessionProposal, SessionRequest};
use crate::session_manager::SessionSnapshot;

/// What the terminal shows, derived from the two published snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum Screen {
    SignIn,
    Loading { chain: Option<Chain> },
    Failed { chain: Option<Chain>, error: Option<ErrorReport> },
    Dashboard(Box<Dashboard>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dashboard {
    pub account: Account,
    pub deployed: Option<bool>,
    pub sessions: Vec<Session>,
    pub pending_proposal: Option<SessionProposal>,
    pub pending_request: Option<SessionRequest>,
    pub queued_proposals: usize,
    pub queued_requests: usize,
    pub busy: bool,
    pub error: Option<ErrorReport>,
}

impl Screen {
    pub fn from_snapshots(
        account: &AccountSnapshot,
        sessions: &SessionSnapshot,
    ) -> Screen {
        match (account.status, &account.account) {
            (AccountStatus::Uninitialized, _) => Screen::SignIn,
            (AccountStatus::Loading, _) => Screen::Loading {
                chain: account.chain,
            },
            (AccountStatus::Ready, Some(current)) => {
                Screen::Dashboard(Box::new(Dashboard {
                    account: current.clone(),
                    deployed: account.deployed,
                    sessions: sessions.sessions.clone(),
                    pending_proposal: sessions.pending_proposal.clone(),
                    pending_request: sessions.pending_request.clone(),
                    queued_proposals: sessions.queued_proposals,
                    queued_requests: sessions.queued_requests,
                    busy: sessions.loading,
                    error: sessions
                        .last_error
                        .clone()
                        .or_else(|| account.error.clone()),
                }))
            }
            (AccountStatus::Failed, _) | (AccountStatus::Ready, None) => {
                Screen::Failed {
                    chain: account.chain,
                    error: account.error.clone(),
                }
            }
        }
    }
}

impl Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::SignIn => {
                writeln!(f, "Not signed in.")?;
                writeln!(f, "  sign-in             create the smart account")
            }
            Screen::Loading { chain } => match chain {
                Some(chain) => writeln!(f, "Creating account on {chain}..."),
                None => writeln!(f, "Creating account..."),
            },
            Screen::Failed { chain, error } => {
                match chain {
                    Some(chain) => writeln!(f, "Account on {chain} unavailable.")?,
                    None => writeln!(f, "Account unavailable.")?,
                }
                if let Some(error) = error {
                    writeln!(f, "  {}: {error}", error.kind)?;
                }
                writeln!(f, "  sign-in | chain <name>   try again")
            }
            Screen::Dashboard(dashboard) => dashboard.fmt(f),
        }
    }
}

impl Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deployed = match self.deployed {
            Some(true) => "deployed",
            Some(false) => "not deployed yet",
            None => "deployment unknown",
        };
        writeln!(f, "Account {} on {} ({deployed})", self.account.address, self.account.chain)?;
        writeln!(f, "Owner   {}", self.account.owner)?;
        if self.busy {
            writeln!(f, "Working...")?;
        }

        writeln!(f, "Sessions ({}):", self.sessions.len())?;
        for session in &self.sessions {
            writeln!(
                f,
                "  {} {} [{}] until {}",
                session.topic,
                session.peer.name,
                session.peer.url,
                format_timestamp(session.expiry)
            )?;
        }

        if let Some(proposal) = &self.pending_proposal {
            writeln!(
                f,
                "Proposal from {} ({}), {} queued: approve | reject",
                proposal.peer().name,
                proposal.origin,
                self.queued_proposals
            )?;
        }
        if let Some(request) = &self.pending_request {
            writeln!(
                f,
                "Request {} {} on {} for {}, {} queued: approve-request | reject-request",
                request.id, request.method, request.chain_id, request.topic, self.queued_requests
            )?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "Last error ({}): {error}", error.kind)?;
        }
        Ok(())
    }
}

fn format_timestamp(unix: u64) -> String {
    i64::try_from(unix)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| unix.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::testing::{address, proposal};

    fn ready() -> AccountSnapshot {
        AccountSnapshot {
            status: AccountStatus::Ready,
            chain: Some(Chain::Polygon),
            account: Some(Account {
                chain: Chain::Polygon,
                address: address(0xaa),
                owner: address(0xbb),
            }),
            deployed: Some(true),
            error: None,
        }
    }

    #[test]
    fn test_screen_follows_account_status() {
        let sessions = SessionSnapshot::default();
        assert_eq!(
            Screen::from_snapshots(&AccountSnapshot::default(), &sessions),
            Screen::SignIn
        );

        let loading = AccountSnapshot {
            status: AccountStatus::Loading,
            chain: Some(Chain::Base),
            ..Default::default()
        };
        let screen = Screen::from_snapshots(&loading, &sessions);
        assert_eq!(screen, Screen::Loading { chain: Some(Chain::Base) });
        assert_eq!(screen.to_string(), "Creating account on base...\n");

        let failed = AccountSnapshot {
            status: AccountStatus::Failed,
            chain: Some(Chain::Base),
            error: Some(Error::configuration("BASE_PROJECT_ID is not set").report()),
            ..Default::default()
        };
        let rendered = Screen::from_snapshots(&failed, &sessions).to_string();
        assert!(rendered.contains("configuration error: configuration: BASE_PROJECT_ID is not set"));
    }

    #[test]
    fn test_dashboard_rendering() {
        let pending = proposal(1, "Example Dapp", "https://example-dapp.com");
        let session = Session::new(
            "topic-1".to_string(),
            &pending,
            Default::default(),
            0,
        );
        let sessions = SessionSnapshot {
            sessions: vec![session],
            pending_proposal: Some(pending),
            queued_proposals: 1,
            last_error: Some(Error::NotFound("session x".to_string()).report()),
            ..Default::default()
        };

        let screen = Screen::from_snapshots(&ready(), &sessions);
        let Screen::Dashboard(dashboard) = &screen else {
            panic!("expected dashboard");
        };
        assert_eq!(dashboard.error.as_ref().unwrap().kind, ErrorKind::NotFound);

        let rendered = screen.to_string();
        assert!(rendered.contains("(deployed)"));
        assert!(rendered.contains(
            "  topic-1 Example Dapp [https://example-dapp.com] until 1970-01-01T00:00:00Z"
        ));
        assert!(rendered.contains("Proposal from Example Dapp (https://example-dapp.com), 1 queued"));
        assert!(rendered.contains("Last error (not found): not found: session x"));
    }
}
