/// Relay Auth
///
/// Signs the EdDSA JWT the relay expects as bearer token. The issuer is the
/// `did:key` of an ed25519 key derived from the client seed.
///
use alloy::hex;
use base64ct::{Base64UrlUnpadded, Encoding};
use ed25519_dalek::{Signer, SigningKey};
use serde::Serialize;

use crate::{
    constants::{CRYPTO_JWT_TTL, JWT_IRIDIUM_ALG, JWT_IRIDIUM_TYP},
    error::Result,
    utils::{encode_iss, random_bytes32, unix_timestamp},
};

pub struct RelayAuth {
    keypair: Keypair,
}

impl RelayAuth {
    pub fn new(client_seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(client_seed),
        }
    }

    pub fn client_id(&self) -> String {
        encode_iss(&self.keypair.public_key)
    }

    pub fn sign_jwt(&self, aud: &str) -> Result<String> {
        // random session identifier
        let sub = hex::encode(random_bytes32());
        sign_jwt(&sub, aud, CRYPTO_JWT_TTL, &self.keypair, None)
    }
}

// Only used for JWT signing, not used for encryption
#[derive(Debug, Clone)]
pub struct Keypair {
    seed: [u8; 32],
    pub public_key: [u8; 32],
}

impl Keypair {
    pub fn from_seed(seed: [u8; 32]) -> Keypair {
        let signing_key = SigningKey::from_bytes(&seed);
        Keypair {
            seed,
            public_key: signing_key.verifying_key().to_bytes(),
        }
    }

    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        SigningKey::from_bytes(&self.seed).sign(data).to_bytes()
    }
}

#[derive(Serialize)]
struct IridiumJWTHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct IridiumJWTPayload {
    iss: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
}

fn encode_json<T: ?Sized + Serialize>(val: &T) -> Result<String> {
    Ok(Base64UrlUnpadded::encode_string(
        serde_json::to_string(val)?.as_bytes(),
    ))
}

pub fn sign_jwt(
    sub: &str,
    aud: &str,
    ttl: u64,
    keypair: &Keypair,
    iat: Option<u64>,
) -> Result<String> {
    let iat = match iat {
        Some(iat) => iat,
        None => unix_timestamp()?,
    };

    let header = IridiumJWTHeader {
        alg: JWT_IRIDIUM_ALG,
        typ: JWT_IRIDIUM_TYP,
    };
    let payload = IridiumJWTPayload {
        iss: encode_iss(&keypair.public_key),
        sub: sub.to_string(),
        aud: aud.to_string(),
        iat,
        exp: iat + ttl,
    };

    let head_payload =
        format!("{}.{}", encode_json(&header)?, encode_json(&payload)?);
    let signature = keypair.sign(head_payload.as_bytes());

    Ok(format!(
        "{head_payload}.{}",
        Base64UrlUnpadded::encode_string(&signature)
    ))
}
