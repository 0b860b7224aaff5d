//! Login challenge handling.
//!
//! A device answers the first `global.login` with error code
//! [`LOGIN_CHALLENGE_CODE`](crate::protocol::message::LOGIN_CHALLENGE_CODE),
//! a `realm`, a `random` and the session id to use from then on. The client
//! proves knowledge of the password with a two-stage salted MD5 digest:
//!
//! ```text
//! stage1 = HEX(MD5("{user}:{realm}:{password}"))
//! stage2 = HEX(MD5("{user}:{random}:{stage1}"))
//! ```
//!
//! and sends a second `global.login` carrying `userName` and `password = stage2`.

use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{constants, DhipError, Result};
use crate::protocol::message::{Request, Response, METHOD_LOGIN};

/// Account used by intercom units with no configured password
pub const DEFAULT_USERNAME: &str = "admin";

/// Username and password presented to the device
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, "")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fixed parameters sent with every `global.login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginParams {
    pub client_type: String,
    pub ip_addr: String,
    pub login_type: String,
}

impl Default for LoginParams {
    fn default() -> Self {
        Self {
            client_type: String::from("NetKeyboard"),
            ip_addr: String::from("127.0.0.1"),
            login_type: String::from("Direct"),
        }
    }
}

/// Fields of a login challenge the answer is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub random: String,
    pub session_id: u32,
}

impl Challenge {
    /// Pull `params.realm`, `params.random` and `session` out of a challenge body
    pub fn from_response(response: &Response) -> Result<Self> {
        let param = |name: &str| {
            response
                .params
                .as_ref()
                .and_then(|p| p.get(name))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        let realm = param("realm").ok_or_else(|| {
            DhipError::HandshakeError(constants::ERR_CHALLENGE_MISSING_REALM.into())
        })?;
        let random = param("random").ok_or_else(|| {
            DhipError::HandshakeError(constants::ERR_CHALLENGE_MISSING_RANDOM.into())
        })?;
        let session_id = response.session_id().ok_or_else(|| {
            DhipError::HandshakeError(constants::ERR_CHALLENGE_MISSING_SESSION.into())
        })?;

        Ok(Self {
            realm,
            random,
            session_id,
        })
    }
}

fn md5_upper_hex(input: &str) -> String {
    hex::encode_upper(Md5::digest(input.as_bytes()))
}

/// Two-stage digest answering a challenge
pub fn digest_password(credentials: &Credentials, realm: &str, random: &str) -> String {
    let stage1 = md5_upper_hex(&format!(
        "{}:{}:{}",
        credentials.username, realm, credentials.password
    ));
    md5_upper_hex(&format!("{}:{}:{}", credentials.username, random, stage1))
}

/// First, unauthenticated `global.login`
pub fn login_request(login: &LoginParams) -> Request {
    Request::new(METHOD_LOGIN).with_params(serde_json::to_value(login).unwrap_or(Value::Null))
}

/// Replacement `global.login` answering `challenge`
#[instrument(skip(credentials, login, challenge), fields(session_id = challenge.session_id))]
pub fn answer_challenge(
    credentials: &Credentials,
    login: &LoginParams,
    challenge: &Challenge,
) -> Request {
    let mut params = serde_json::to_value(login).unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut params {
        map.insert(
            "userName".to_string(),
            Value::String(credentials.username.clone()),
        );
        map.insert(
            "password".to_string(),
            Value::String(digest_password(
                credentials,
                &challenge.realm,
                &challenge.random,
            )),
        );
    }

    debug!(realm = %challenge.realm, "Answering login challenge");

    Request::new(METHOD_LOGIN).with_params(params)
}
