use std::fmt::{self, Display};

use crate::types::JsonRpcError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Coarse classification surfaced to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Provider,
    Pairing,
    Transaction,
    InvalidState,
    NotFound,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration error",
            Self::Provider => "provider error",
            Self::Pairing => "pairing error",
            Self::Transaction => "transaction error",
            Self::InvalidState => "invalid state",
            Self::NotFound => "not found",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum Error {
    // Lifecycle taxonomy
    Configuration(String),
    Provider(Box<Error>),
    Pairing(Box<Error>),
    Transaction(Box<Error>),
    InvalidState(&'static str),
    NotFound(String),

    // Pairing URI
    RelayProtocolNotMentioned,
    InvalidUri,
    SymKeyNotMentioned,
    PathEndNotFound,
    UnsupportedVersion(u32),
    UriExpired(u64),
    Expired(u64),

    ChainMismatch { expected: u64, actual: u64 },
    UnsupportedChains(Vec<String>),
    UnsupportedMethods(Vec<String>),
    UnsupportedMethod(String),
    PairingNotApproved,
    RemoteError { code: i64, message: String },

    ParseInt(std::num::ParseIntError),
    JsonRpc(JsonRpcError),
    Reqwest(reqwest::Error),
    InternalError(String),
    SerdeJsonError(serde_json::Error),
    FromHexError(alloy::hex::FromHexError),
    CipherError(chacha20poly1305::Error),
    Base64Error(base64ct::Error),
    FromUtf8Error(std::string::FromUtf8Error),
    SignerError(alloy::signers::Error),
    SystemTimeError(std::time::SystemTimeError),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Wraps a low-level failure as an account provider error.
    pub fn provider(e: impl Into<Error>) -> Self {
        Self::wrap(e.into(), Error::Provider)
    }

    /// Wraps a low-level failure as a pairing/relay error.
    pub fn pairing(e: impl Into<Error>) -> Self {
        Self::wrap(e.into(), Error::Pairing)
    }

    /// Wraps a low-level failure as a signing/submission error.
    pub fn transaction(e: impl Into<Error>) -> Self {
        Self::wrap(e.into(), Error::Transaction)
    }

    // Errors already classified keep their kind
    fn wrap(e: Error, f: fn(Box<Error>) -> Error) -> Self {
        match e.kind() {
            ErrorKind::Internal => f(Box::new(e)),
            _ => e,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Provider(_) => ErrorKind::Provider,
            Error::Pairing(_) => ErrorKind::Pairing,
            Error::Transaction(_) => ErrorKind::Transaction,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(m) => write!(f, "configuration: {m}"),
            Error::Provider(e) => write!(f, "account provider: {e}"),
            Error::Pairing(e) => write!(f, "pairing: {e}"),
            Error::Transaction(e) => write!(f, "transaction: {e}"),
            Error::InvalidState(m) => write!(f, "invalid state: {m}"),
            Error::NotFound(what) => write!(f, "not found: {what}"),

            Error::RelayProtocolNotMentioned => {
                f.write_str("relay-protocol missing from URI")
            }
            Error::InvalidUri => f.write_str("malformed WalletConnect URI"),
            Error::SymKeyNotMentioned => f.write_str("symKey missing from URI"),
            Error::PathEndNotFound => f.write_str("URI has no query string"),
            Error::UnsupportedVersion(v) => {
                write!(f, "unsupported WalletConnect version {v}")
            }
            Error::UriExpired(at) => write!(f, "URI expired at {at}"),
            Error::Expired(at) => write!(f, "expired at {at}"),

            Error::ChainMismatch { expected, actual } => {
                write!(f, "expected chain {expected}, provider is on {actual}")
            }
            Error::UnsupportedChains(chains) => {
                write!(f, "required chains not supported: {}", chains.join(", "))
            }
            Error::UnsupportedMethods(items) => write!(
                f,
                "required methods or events not supported: {}",
                items.join(", ")
            ),
            Error::UnsupportedMethod(m) => write!(f, "unsupported method {m}"),
            Error::PairingNotApproved => {
                f.write_str("dApp did not acknowledge the session")
            }
            Error::RemoteError { code, message } => {
                write!(f, "{message} ({code})")
            }

            Error::ParseInt(e) => write!(f, "{e}"),
            Error::JsonRpc(e) => write!(f, "{e}"),
            Error::Reqwest(e) => write!(f, "{e}"),
            Error::InternalError(m) => f.write_str(m),
            Error::SerdeJsonError(e) => write!(f, "{e}"),
            Error::FromHexError(e) => write!(f, "{e}"),
            Error::CipherError(e) => write!(f, "{e}"),
            Error::Base64Error(e) => write!(f, "{e}"),
            Error::FromUtf8Error(e) => write!(f, "{e}"),
            Error::SignerError(e) => write!(f, "{e}"),
            Error::SystemTimeError(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provider(e) | Error::Pairing(e) | Error::Transaction(e) => {
                Some(e.as_ref())
            }
            Error::Reqwest(e) => Some(e),
            Error::SerdeJsonError(e) => Some(e),
            _ => None,
        }
    }
}

/// Cloneable form of an error, kept as the "current error" of a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::InternalError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::InternalError(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::ParseInt(e)
    }
}

impl From<JsonRpcError> for Error {
    fn from(e: JsonRpcError) -> Self {
        Error::JsonRpc(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Reqwest(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerdeJsonError(e)
    }
}

impl From<alloy::hex::FromHexError> for Error {
    fn from(e: alloy::hex::FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<chacha20poly1305::Error> for Error {
    fn from(e: chacha20poly1305::Error) -> Self {
        Error::CipherError(e)
    }
}

impl From<base64ct::Error> for Error {
    fn from(e: base64ct::Error) -> Self {
        Error::Base64Error(e)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::FromUtf8Error(e)
    }
}

impl From<alloy::signers::Error> for Error {
    fn from(e: alloy::signers::Error) -> Self {
        Error::SignerError(e)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Error::SystemTimeError(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_classifies_low_level_errors() {
        let e = Error::pairing(Error::InvalidUri);
        assert_eq!(e.kind(), ErrorKind::Pairing);
        assert_eq!(e.to_string(), "pairing: malformed WalletConnect URI");
    }

    #[test]
    fn wrapping_keeps_existing_kind() {
        let e = Error::transaction(Error::InvalidState("no pending request"));
        assert_eq!(e.kind(), ErrorKind::InvalidState);

        let e = Error::pairing(Error::provider("unreachable"));
        assert_eq!(e.kind(), ErrorKind::Provider);
    }

    #[test]
    fn report_carries_kind_and_message() {
        let report = Error::NotFound("session abc".to_string()).report();
        assert_eq!(report.kind, ErrorKind::NotFound);
        assert_eq!(report.to_string(), "not found: session abc");
    }
}
