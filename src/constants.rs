use alloy::primitives::{Address, address};

pub const JWT_IRIDIUM_ALG: &str = "EdDSA";
pub const JWT_IRIDIUM_TYP: &str = "JWT";

pub const DID_DELIMITER: &str = ":";
pub const DID_PREFIX: &str = "did";
pub const DID_METHOD: &str = "key";

// Multicodec varint for ed25519-pub (0xed), base58btc prefixed with "z"
pub const MULTICODEC_ED25519_BASE: &str = "z";
pub const MULTICODEC_ED25519_HEADER: [u8; 2] = [0xed, 0x01];

pub const CRYPTO_JWT_TTL: u64 = 86400; // ONE_DAY

pub const RELAY_RPC_URL: &str = "https://relay.walletconnect.org/rpc";
pub const RELAY_AUTH_AUDIENCE: &str = "https://relay.walletconnect.org";
pub const RELAY_PROTOCOL: &str = "irn";
pub const PAIRING_VERSION: u32 = 2;

pub const BUNDLER_RPC_URL: &str = "https://rpc.zerodev.app/api/v2/bundler/";

// LightAccountFactory v2.0.0, exposes getAddress(address owner, uint256 salt)
pub const DEFAULT_ACCOUNT_FACTORY: Address =
    address!("0x0000000000400CdFef5E2714E63d8040b700BC24");

pub const DEFAULT_QUEUE_CAPACITY: usize = 8;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

// Settled sessions live for a week unless extended
pub const SESSION_EXPIRY: u64 = 7 * DAYS;
pub const DAYS: u64 = 86400;

pub const SETTLE_ACK_ATTEMPTS: usize = 10;
pub const SETTLE_ACK_INTERVAL_MS: u64 = 1000;

// https://specs.walletconnect.com/2.0/specs/clients/sign/error-codes
pub const USER_REJECTED_CODE: i64 = 5000;
pub const USER_REJECTED_MESSAGE: &str = "User rejected.";
pub const UNSUPPORTED_METHOD_CODE: i64 = 10001;
pub const USER_DISCONNECTED_CODE: i64 = 6000;
pub const USER_DISCONNECTED_MESSAGE: &str = "User disconnected.";
pub const SESSION_NOT_FOUND_CODE: i64 = 7001;
pub const EXPIRED_CODE: i64 = 8000;
pub const EXPIRED_MESSAGE: &str = "Request expired.";
pub const REQUEST_FAILED_CODE: i64 = -32000;
