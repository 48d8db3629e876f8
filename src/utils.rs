use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::hex;
use alloy::signers::k256::sha2::{Digest, Sha256};
use base64ct::{Base64, Encoding};
use hkdf::Hkdf;
use rand::{RngCore, rngs::OsRng};
use url::form_urlencoded;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{
    constants::{
        DID_DELIMITER, DID_METHOD, DID_PREFIX, MULTICODEC_ED25519_BASE,
        MULTICODEC_ED25519_HEADER, PAIRING_VERSION,
    },
    error::{Error, Result},
};

/// Parameters carried by a `wc:` pairing URI.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingUri {
    pub topic: String,
    pub version: u32,
    pub sym_key: [u8; 32],
    pub relay: RelayProtocolOptions,
    pub methods: Option<Vec<String>>,
    pub expiry_timestamp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayProtocolOptions {
    pub protocol: String,
    pub data: Option<String>,
}

impl PairingUri {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiry_timestamp.is_some_and(|expiry| expiry <= now)
    }
}

impl FromStr for PairingUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_uri(s)
    }
}

// Only the topic is printed, the symKey is a secret
impl fmt::Display for PairingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wc:{}@{}", self.topic, self.version)
    }
}

pub fn parse_uri(input: &str) -> Result<PairingUri> {
    let mut input = input.trim().to_string();

    // Some QR scanners hand over the URI base64 encoded
    if !input.starts_with("wc:") {
        if let Ok(decoded_bytes) = Base64::decode_vec(&input) {
            if let Ok(decoded_str) = String::from_utf8(decoded_bytes) {
                if decoded_str.starts_with("wc:") {
                    input = decoded_str;
                }
            }
        }
    }

    let rest = input
        .strip_prefix("wc://")
        .or_else(|| input.strip_prefix("wc:"))
        .ok_or(Error::InvalidUri)?;

    let (path, query_string) =
        rest.split_once('?').ok_or(Error::PathEndNotFound)?;

    let (topic, version) = path.split_once('@').ok_or(Error::InvalidUri)?;
    let topic = parse_topic(topic);
    if topic.is_empty() || version.contains('@') {
        return Err(Error::InvalidUri);
    }

    let version: u32 = version.parse()?;
    if version != PAIRING_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut query_params: HashMap<String, String> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query_string.as_bytes()) {
        query_params.insert(key.into(), value.into());
    }

    let sym_key = query_params
        .get("symKey")
        .ok_or(Error::SymKeyNotMentioned)?;
    let sym_key = hex::decode_to_array::<_, 32>(sym_key)?;

    let methods = query_params
        .get("methods")
        .map(|m| m.split(',').map(|s| s.to_string()).collect());

    Ok(PairingUri {
        topic,
        version,
        sym_key,
        relay: parse_relay_params(&query_params)?,
        methods,
        expiry_timestamp: query_params
            .get("expiryTimestamp")
            .and_then(|v| v.parse().ok()),
    })
}

pub fn parse_topic(topic: &str) -> String {
    topic.strip_prefix("//").unwrap_or(topic).to_string()
}

pub fn parse_relay_params(
    params: &HashMap<String, String>,
) -> Result<RelayProtocolOptions> {
    let protocol = params
        .get("relay-protocol")
        .ok_or(Error::RelayProtocolNotMentioned)?
        .clone();
    let data = params.get("relay-data").cloned();

    Ok(RelayProtocolOptions { protocol, data })
}

pub fn random_bytes32() -> [u8; 32] {
    let mut random_value = [0u8; 32];
    OsRng.fill_bytes(&mut random_value);
    random_value
}

pub fn sha256(data: impl AsRef<[u8]>) -> [u8; 32] {
    Sha256::digest(data.as_ref()).into()
}

/// X25519 public key for a private key, as used in session handshakes.
pub fn x25519_public_key(private_key: [u8; 32]) -> [u8; 32] {
    let secret = StaticSecret::from(private_key);
    PublicKey::from(&secret).to_bytes()
}

/// Symmetric session key: HKDF-SHA256 over the X25519 shared secret.
pub fn derive_sym_key(
    self_private_key: [u8; 32],
    other_public_key: [u8; 32],
) -> Result<[u8; 32]> {
    let secret = StaticSecret::from(self_private_key);
    let shared = secret.diffie_hellman(&PublicKey::from(other_public_key));

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut sym_key = [0u8; 32];
    hk.expand(&[], &mut sym_key)
        .map_err(|e| Error::InternalError(format!("hkdf: {e}")))?;
    Ok(sym_key)
}

/// Relay topic for a symmetric key.
pub fn topic_of(sym_key: [u8; 32]) -> String {
    hex::encode(sha256(sym_key))
}

pub fn unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

pub fn encode_iss(public_key: &[u8; 32]) -> String {
    let combined = [MULTICODEC_ED25519_HEADER.as_slice(), public_key].concat();
    let multicodec = format!(
        "{}{}",
        MULTICODEC_ED25519_BASE,
        bs58::encode(combined).into_string()
    );

    [DID_PREFIX, DID_METHOD, &multicodec].join(DID_DELIMITER)
}
