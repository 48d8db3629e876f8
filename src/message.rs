use alloy::hex;
use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use log::debug;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::Id;

/// Undecoded sign-protocol JSON-RPC message, as it travels inside an envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MessageError>,
    pub id: Id,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const IV_LENGTH: usize = 12;
pub const KEY_LENGTH: usize = 32;
pub const TYPE_LENGTH: usize = 1;
pub const TYPE_0: u8 = 0;
pub const TYPE_1: u8 = 1;

impl Message {
    pub fn encrypt(
        &self,
        sym_key: [u8; 32],
        type_byte: u8,
        sender_public_key: Option<[u8; 32]>,
        encoding: EncodingType,
    ) -> Result<String> {
        if type_byte == TYPE_1 && sender_public_key.is_none() {
            return Err("Missing sender public key for type 1 envelope".into());
        }

        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(&mut iv);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&sym_key));
        let message = serde_json::to_string(self)?;
        let sealed =
            cipher.encrypt(Nonce::from_slice(&iv), message.as_bytes())?;

        Ok(EncryptedEnvelope {
            type_byte,
            sealed,
            iv,
            sender_public_key,
        }
        .serialize(encoding))
    }

    pub fn decrypt(
        cipher_text: &str,
        sym_key: [u8; 32],
        encoding: EncodingType,
    ) -> Result<Self> {
        let envelope = EncryptedEnvelope::deserialize(cipher_text, encoding)?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&sym_key));
        let decrypted = cipher
            .decrypt(Nonce::from_slice(&envelope.iv), envelope.sealed.as_ref())?;
        let str = String::from_utf8(decrypted)?;
        serde_json::from_str::<Self>(&str).map_err(|e| {
            debug!("Failed to deserialize JSON-RPC message: {e}\n{str}");
            Error::from(e)
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct EncryptedEnvelope {
    pub type_byte: u8,
    pub sealed: Vec<u8>,
    pub iv: [u8; IV_LENGTH],
    // only for type 1 message - lets the dapp calculate the diffie sym key
    pub sender_public_key: Option<[u8; 32]>,
}

#[derive(Debug, Clone, Copy)]
pub enum EncodingType {
    Base64,
    Base64Url,
}

impl EncryptedEnvelope {
    pub fn serialize(&self, encoding: EncodingType) -> String {
        let mut bytes = vec![self.type_byte];

        if let (TYPE_1, Some(sender)) = (self.type_byte, &self.sender_public_key)
        {
            bytes.extend_from_slice(sender);
        }
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.sealed);

        match encoding {
            EncodingType::Base64 => Base64::encode_string(&bytes),
            EncodingType::Base64Url => Base64UrlUnpadded::encode_string(&bytes),
        }
    }

    pub fn deserialize(encoded: &str, encoding: EncodingType) -> Result<Self> {
        let bytes = match encoding {
            EncodingType::Base64 => Base64::decode_vec(encoded)?,
            EncodingType::Base64Url => Base64UrlUnpadded::decode_vec(encoded)?,
        };

        let type_byte = *bytes.first().ok_or("empty envelope")?;
        let mut offset = TYPE_LENGTH;

        let sender_public_key = match type_byte {
            TYPE_0 => None,
            TYPE_1 => {
                let key = bytes
                    .get(offset..offset + KEY_LENGTH)
                    .ok_or("truncated type 1 envelope")?;
                offset += KEY_LENGTH;
                let mut sender = [0u8; 32];
                sender.copy_from_slice(key);
                Some(sender)
            }
            other => {
                return Err(format!("unsupported envelope type {other}").into());
            }
        };

        let iv_bytes = bytes
            .get(offset..offset + IV_LENGTH)
            .ok_or("truncated envelope")?;
        let mut iv = [0u8; IV_LENGTH];
        iv.copy_from_slice(iv_bytes);

        Ok(EncryptedEnvelope {
            type_byte,
            sealed: bytes[offset + IV_LENGTH..].to_vec(),
            iv,
            sender_public_key,
        })
    }

    pub fn sender_public_key_hex(&self) -> Option<String> {
        self.sender_public_key.map(hex::encode)
    }
}

#[cfg(test)]
mod tests {
    use alloy::hex;
    use serde_json::json;

    use super::*;

    fn ping(id: u64) -> Message {
        Message {
            jsonrpc: "2.0".to_string(),
            method: Some("wc_sessionPing".to_string()),
            params: Some(json!({})),
            result: None,
            error: None,
            id: Id::from(id),
        }
    }

    #[test]
    fn test_type_0_roundtrip() {
        let key = [3u8; 32];
        let sealed = ping(42)
            .encrypt(key, TYPE_0, None, EncodingType::Base64)
            .unwrap();
        let opened = Message::decrypt(&sealed, key, EncodingType::Base64).unwrap();
        assert_eq!(opened, ping(42));

        assert!(Message::decrypt(&sealed, [4u8; 32], EncodingType::Base64).is_err());
    }

    #[test]
    fn test_type_1_carries_sender_key() {
        let key = [9u8; 32];
        let sender = [1u8; 32];
        let sealed = ping(7)
            .encrypt(key, TYPE_1, Some(sender), EncodingType::Base64Url)
            .unwrap();

        let envelope =
            EncryptedEnvelope::deserialize(&sealed, EncodingType::Base64Url)
                .unwrap();
        assert_eq!(envelope.type_byte, TYPE_1);
        assert_eq!(envelope.sender_public_key_hex(), Some(hex::encode(sender)));

        let opened =
            Message::decrypt(&sealed, key, EncodingType::Base64Url).unwrap();
        assert_eq!(opened.id, Id::from(7u64));
    }

    #[test]
    fn test_type_1_requires_sender() {
        assert!(
            ping(1)
                .encrypt([0u8; 32], TYPE_1, None, EncodingType::Base64)
                .is_err()
        );
    }

    #[test]
    fn test_truncated_envelope_is_an_error() {
        assert!(EncryptedEnvelope::deserialize("AA==", EncodingType::Base64).is_err());
        assert!(EncryptedEnvelope::deserialize("", EncodingType::Base64).is_err());
    }

    #[test]
    fn test_decrypt_relay_payload() {
        // captured from the relay for a wc_sessionAuthenticate pairing
        let encoded = "AHoIrrPpwOD3xzh0kmqYPdjsMBfp7VpdDlufHKoM7DqiJnfvH23BRpF7kLbCuxmPd2hhIkKiYN0gGoXBBk8YrGniPJJJikeXW5TpcVczzxdDIy/psZNICwriuIzCrixpX9EzD7BHb0K59mFJOiIeiTetaLSSMl0AE49EAKcw0qUBYtAl+5clKNjC+86Pr4ZU720J8ifRaLzboWUDEIxlB1jv7ZildyamCOQDvj7Mt65u4lAaIXWS+RzfRa6nUYthx2IxgII5ufOzs7LwMmLY08RoIMIwFCZOO7sHihsCcyOllBnlPuVxAY27CueC8LgIAhyZdjHOTv4kz79uM/29C7GexEHJXgkyojekNNh+l016Ou5amJdgVe/1Ypx93S466vxJzL8a04s3yfYLrz1wRHAUM2VYFvNKNglVfOIdvS7HBrAP3cYN0hq2DRmu3YQ+e1U8FqVrl0Zn5JHUNw/Q0zff2P57KR2ocaf1Ysikib576InnYxj9gjJ328g/rUmPOz7BphiJwcxCxWePniQ53qVNuNjCmFTIj4OBzqAE1iR0630mB09UeE6S3tGcwvkSTe2J2Cayu/9oqf8tMp+nsiFYBH/EC2qp6Et2GhJwyFgcgOF7GoIwpZpPOlpzw+wD19mukvm0dxej9zvyJ6p4d3JQ7CsPXbHi2bGgqqfEiPtDwRuoiPIJH0UnOaWh1P27EXNC8NZNKCnQAJIVQGtEs/hrysEbH/P+SUbx9L68OFuktAHZYk++DETcezFK3pfKhzGutvDeHrdzkoPDD0fQKOi86Dh7moNpukQ3UohPHSdbdRjJInLPTb6lbHSMjxiHI+JF2BSZmQpWaZR81g2+p30p4qK+NUxdPZ+FPjntYsgXpQeryWgATE74EQqMm6eevk10snJ3lRHIt6CoMKdtYXfWQr6uRMVL2CIThwySL8f0KLd8M2yKvBNwDBhkye8l7wjWejEYafZVIQ0YoOFiX8QMPQogmLbshSyWe/RBC2M3YSI9yyKKxn5vr0T7+7bp2wKhTyw5gOhrtsoZcANr3AIEp1l8At8JuF/LpvUUFhx8oV7pEhxSmoR9+TOEt/28KkBemmRuvBPhIipybieGA/d3flQBLCAK5rW5v30rGzif8TTd8kSCW1dPBWE7plG2FGjwY0hpxxuTmW0EDNazAvJwf25XcXw2pDEufDA9Q76EE6vCpPNT82xld9KocCn47ltrCclW4D9ZKFaOTAnmySfZdD740tlBZHNmO4RTcv0yESkqmOZSj4PegA4bWaVPXszW4veZZMrPFzuWmb+7cEgId5sBsvOmZ7F8d5C3pGqdHyBSaAxQ0gh4iiN3jU7qncmteSGGhkfhZq2qHG6Wdw5H7KDZ/IGE+eZTMgzP38wGTuWkIauro1FtGqtS+SfK+5dxM83c2x3RiaCb6cejzXvj0l19kJfvPxx/njxI03KPDE9/jpW5ar1YkaR5oVVpxXsmcFcPSWFrnI3Isl6I/M2l++7vvNXVddV7TEbRwNwYVqpBnbV+hM0/mDjF5Em/g0zovzpwbjyQtK28MbRb6jkGcBGT4n5vMruwDQTaw3MorYVyLFWM4hBUquM2e5KwpnpQX9LL4+MbK4ePqhxMlqgswUJG3I/0IW/eYsxl+K9GSVYLSeBqgkcJDAprA6KnEwqXL9cP080vlIBF01XuJOWk7kzta8YJWvyypXk9q3hgpz5Pvt3Pmi+CIaScEv2zmbrLtcjwhRHAvYj46f3aEu2LrCOlxBPtinnR3NI5X2vF4yEdVY9L+U4xfxT/36VBi74xRvzwwrBIgIkY9ol/z80aiuUuj3Rk6eE+y18zFl1BuhZf58mE6oqqkyPVxC9nTB3SLzQcrCxiTST2mlN7TYcHypZHjt6ql/UmbhpUh6Xu4B1fdNRbXT7G/UmXyR/KBO3jQwGi8RO7asPdHZve2q2IvBiiB9C868ZHitBZbDz5uVOdDnGQrleZdNRXoHRePx/d9SQMgJvxJyLBP4oQ00reVF6nLFhdAfWf6cWcVVU3pgr/hYgVFd6WxsAycX+hz0puHFv37JN5ObfUGGPWabiNgfdxe3+IniBhswKCn2KKWlIG1sgF8O/DZ49P2y73IXXuqTFY3hcPsZZe4ORer2/M53VW+uLBc32JVgg6/+DF5U0puxMLlNJh8KY+uFn8Zxo4ZJPIukSGcqMmSp71FNM85hOPrhGXXqrErofDwMKfpwrM19IBU+tLM2SrxmcIRiDK7ADKEDKyxj60UN3F5Q4S/aniBuowgNZkQ1ex4ywYP9G25XOkqev221sofB1TyDWTg+FvwpOp4iKOvec9KDxKWAu+otPnWneqIGD6OjLrRYLKUElbQFDejWAOyzo8PCdRABIT/vEd//xwYN995YLPYO/5BU2ZtUUVh5+QidbRPAjIi9IV3boJfWI8QXn/DeJ5kScXgkz3xPRHq6WNT4zC769QXzISahLiI4Yi8iktMEtidkCK0kTGZkNI9KbubTm/EVcMxT4ntksFQUyTpbLZ+x2KlnZEL7W1LExXnPvL3JCjbidH01WMatSAbkoAGEGYDYsUZB6CbxCFXHD4mrteH27fsqhL1dwUCcTKEqU5ZucmGttJ/XjjvA11JF/naBYdnKgZWe0KDu77GV+tHGcbl+LmZPcdo6xsD6pnvEWgOOSaHruAqcQHIJF0MqWz4lyv/tykVHihvh9MzPtZ2k8Qhn4XFSb0B2l396I=";
        let result = Message::decrypt(
            encoded,
            hex!("3d0a9b08ac5e6d83bbc32ea4fbe799d2bf8d1a148beff2f93072b96156bea503"),
            EncodingType::Base64,
        )
        .unwrap();

        assert_eq!(result.jsonrpc, "2.0");
        assert!(result.method.is_some());
        assert!(result.params.is_some());
    }
}
