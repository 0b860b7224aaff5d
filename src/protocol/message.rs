use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::frame::Frame;
use crate::error::Result;

pub const METHOD_LOGIN: &str = "global.login";
pub const METHOD_FACTORY_INSTANCE: &str = "accessControl.factory.instance";
pub const METHOD_OPEN_DOOR: &str = "accessControl.openDoor";
pub const METHOD_DESTROY: &str = "accessControl.destroy";

/// Error code a device answers with when the login must be authenticated first
pub const LOGIN_CHALLENGE_CODE: i64 = 268_632_079;

/// Outbound method call, before `id` and `session` are injected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: None,
            object: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Address the call to a remote object returned by a factory call
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    pub fn factory_instance(channel: u32) -> Self {
        Self::new(METHOD_FACTORY_INSTANCE).with_params(json!({ "channel": channel }))
    }

    pub fn open_door(object: Value, door_index: u32, short_number: &str) -> Self {
        Self::new(METHOD_OPEN_DOOR)
            .with_object(object)
            .with_params(json!({
                "DoorIndex": door_index,
                "ShortNumber": short_number,
            }))
    }

    pub fn destroy(object: Value) -> Self {
        Self::new(METHOD_DESTROY).with_object(object)
    }

    /// Encode as a frame body carrying `id` and `session`
    pub fn to_frame(&self, session_id: u32, request_id: u32) -> Result<Frame> {
        let envelope = Envelope {
            request: self,
            id: request_id,
            session: session_id,
        };
        Frame::json(session_id, request_id, &envelope)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    request: &'a Request,
    id: u32,
    session: u32,
}

/// `error` object of a failed call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Inbound frame body. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Response {
    pub fn is_challenge(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.code == LOGIN_CHALLENGE_CODE)
    }

    /// Truthiness of `result` as the device firmware means it:
    /// `false`, `null`, `0`, `""` and a missing result all count as "no".
    pub fn has_truthy_result(&self) -> bool {
        match &self.result {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }

    /// Numeric session carried by the body, if any
    pub fn session_id(&self) -> Option<u32> {
        match self.session.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}
