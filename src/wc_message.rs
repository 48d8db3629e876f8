use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::message::{Message, MessageError};
use crate::types::{
    ErrorReason, Id, IrnTag, SessionProposeParams, SessionRequestParams,
    SessionSettleParams,
};

/// Sign-protocol message with its params decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct WcMessage {
    pub data: WcData,
    pub id: Id,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WcMethod {
    #[serde(rename = "wc_sessionPing")]
    SessionPing,

    #[serde(rename = "wc_sessionPropose")]
    SessionPropose,

    #[serde(rename = "wc_sessionAuthenticate")]
    SessionAuthenticate,

    #[serde(rename = "wc_sessionSettle")]
    SessionSettle,

    #[serde(rename = "wc_sessionRequest")]
    SessionRequest,

    #[serde(rename = "wc_sessionDelete")]
    SessionDelete,
}

impl Display for WcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_plain::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&name)
    }
}

impl FromStr for WcMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_plain::from_str(s)
            .map_err(|_| crate::Error::UnsupportedMethod(s.to_string()))
    }
}

// https://specs.walletconnect.com/2.0/specs/clients/sign/rpc-methods#methods
impl WcMethod {
    pub fn request_tag(&self) -> IrnTag {
        match self {
            Self::SessionPing => IrnTag::SessionPing,
            Self::SessionPropose => IrnTag::SessionPropose,
            // one-click auth shares the propose tag range, it is never sent
            Self::SessionAuthenticate => IrnTag::SessionPropose,
            Self::SessionSettle => IrnTag::SessionSettle,
            Self::SessionRequest => IrnTag::SessionRequest,
            Self::SessionDelete => IrnTag::SessionDelete,
        }
    }

    pub fn response_tag(&self) -> IrnTag {
        match self {
            Self::SessionPing => IrnTag::SessionPingResponse,
            Self::SessionPropose | Self::SessionAuthenticate => {
                IrnTag::SessionProposeApproveResponse
            }
            Self::SessionSettle => IrnTag::SessionSettleResponse,
            Self::SessionRequest => IrnTag::SessionRequestResponse,
            Self::SessionDelete => IrnTag::SessionDeleteResponse,
        }
    }

    /// Tag of an error response; proposals have a dedicated reject tag.
    pub fn reject_tag(&self) -> IrnTag {
        match self {
            Self::SessionPropose | Self::SessionAuthenticate => {
                IrnTag::SessionProposeRejectResponse
            }
            other => other.response_tag(),
        }
    }

    pub fn ttl(&self) -> u64 {
        match self {
            Self::SessionPing => 30,
            Self::SessionPropose => 300,
            Self::SessionAuthenticate => 3600,
            Self::SessionSettle => 300,
            Self::SessionRequest => 300,
            Self::SessionDelete => 86400,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WcData {
    SessionPing,
    SessionPropose(SessionProposeParams),
    // logged and ignored, kept raw
    SessionAuthenticate(Value),
    SessionSettle(SessionSettleParams),
    SessionRequest(SessionRequestParams),
    SessionDelete(ErrorReason),

    Result(Value),
    Error(ErrorReason),
}

impl WcData {
    pub fn method(&self) -> Option<WcMethod> {
        match self {
            Self::SessionPing => Some(WcMethod::SessionPing),
            Self::SessionPropose(_) => Some(WcMethod::SessionPropose),
            Self::SessionAuthenticate(_) => Some(WcMethod::SessionAuthenticate),
            Self::SessionSettle(_) => Some(WcMethod::SessionSettle),
            Self::SessionRequest(_) => Some(WcMethod::SessionRequest),
            Self::SessionDelete(_) => Some(WcMethod::SessionDelete),
            Self::Result(_) | Self::Error(_) => None,
        }
    }

    pub fn params(&self) -> crate::Result<Option<Value>> {
        Ok(match self {
            Self::SessionPing => Some(Value::Object(Default::default())),
            Self::SessionPropose(p) => Some(serde_json::to_value(p)?),
            Self::SessionAuthenticate(v) => Some(v.clone()),
            Self::SessionSettle(p) => Some(serde_json::to_value(p)?),
            Self::SessionRequest(p) => Some(serde_json::to_value(p)?),
            Self::SessionDelete(r) => Some(serde_json::to_value(r)?),
            Self::Result(_) | Self::Error(_) => None,
        })
    }

    pub fn is_response(&self) -> bool {
        self.method().is_none()
    }
}

impl WcMessage {
    pub fn new(id: Id, data: WcData) -> Self {
        Self { data, id }
    }

    pub fn method(&self) -> Option<WcMethod> {
        self.data.method()
    }

    /// Success response to this request, same id.
    pub fn result(&self, result: Value) -> WcMessage {
        WcMessage::new(self.id.clone(), WcData::Result(result))
    }

    /// Error response to this request, same id.
    pub fn error(&self, reason: ErrorReason) -> WcMessage {
        WcMessage::new(self.id.clone(), WcData::Error(reason))
    }

    pub fn into_raw(&self) -> crate::Result<Message> {
        let (result, error) = match &self.data {
            WcData::Result(v) => (Some(v.clone()), None),
            WcData::Error(reason) => (
                None,
                Some(MessageError {
                    code: Some(reason.code),
                    message: Some(reason.message.clone()),
                    data: None,
                }),
            ),
            _ => (None, None),
        };

        Ok(Message {
            jsonrpc: "2.0".to_string(),
            method: self.data.method().map(|m| m.to_string()),
            params: self.data.params()?,
            result,
            error,
            id: self.id.clone(),
        })
    }
}

impl Message {
    pub fn decode(self) -> crate::Result<WcMessage> {
        WcMessage::try_from(self)
    }
}

impl FromStr for WcMessage {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str::<Message>(s)?.decode()
    }
}

impl TryFrom<Message> for WcMessage {
    type Error = crate::Error;

    fn try_from(msg: Message) -> Result<Self, Self::Error> {
        let Some(method) = msg.method.as_deref() else {
            let data = match msg.error {
                Some(error) => WcData::Error(ErrorReason::new(
                    error.code.unwrap_or_default(),
                    error.message.unwrap_or_default(),
                )),
                None => WcData::Result(msg.result.unwrap_or(Value::Null)),
            };
            return Ok(WcMessage::new(msg.id, data));
        };

        let method = WcMethod::from_str(method)?;
        let params = msg.params.unwrap_or(Value::Null);
        let data = match method {
            WcMethod::SessionPing => WcData::SessionPing,
            WcMethod::SessionPropose => {
                WcData::SessionPropose(serde_json::from_value(params)?)
            }
            WcMethod::SessionAuthenticate => WcData::SessionAuthenticate(params),
            WcMethod::SessionSettle => {
                WcData::SessionSettle(serde_json::from_value(params)?)
            }
            WcMethod::SessionRequest => {
                WcData::SessionRequest(serde_json::from_value(params)?)
            }
            WcMethod::SessionDelete => {
                WcData::SessionDelete(serde_json::from_value(params)?)
            }
        };

        Ok(WcMessage::new(msg.id, data))
    }
}
