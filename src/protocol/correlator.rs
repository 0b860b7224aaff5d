//! Request/response correlation for one connection.
//!
//! Exactly one request may be outstanding. The pending slot is an explicit
//! state ([`Slot`]) whose transitions happen synchronously inside
//! [`Correlator::send`] and the event handlers ([`Correlator::on_message`],
//! [`Correlator::on_transport_closed`], [`Correlator::on_transport_error`]).
//! Callers await the completion half through [`PendingResponse`].
//!
//! Encoded frames are not written here: they are queued on an unbounded
//! channel drained by the connection's writer task, so every transition is
//! free of `.await` points.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use crate::core::frame::Frame;
use crate::error::{constants, DhipError, Result};
use crate::protocol::handshake::{self, Challenge, Credentials, LoginParams};
use crate::protocol::message::{Request, Response};
use crate::utils::metrics;
use crate::utils::timeout::with_timeout_error;

/// Single-slot request state
#[derive(Debug)]
pub enum Slot {
    Idle,
    Pending(Pending),
}

/// The one outstanding request
#[derive(Debug)]
pub struct Pending {
    request_id: u32,
    challenges: u32,
    completion: oneshot::Sender<Result<Response>>,
}

impl Pending {
    fn resolve(self, outcome: Result<Response>) {
        // The caller may have given up (timeout); nothing left to notify then.
        let _ = self.completion.send(outcome);
    }
}

struct State {
    session_id: u32,
    request_id: u32,
    slot: Slot,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
}

impl State {
    /// Allocate the next request id and queue the encoded frame
    fn write(&mut self, request: &Request) -> Result<u32> {
        let outbound = self.outbound.as_ref().ok_or(DhipError::TransportClosed)?;

        let request_id = self.request_id.wrapping_add(1);
        let frame = request.to_frame(self.session_id, request_id)?;
        let frame_len = frame.header.frame_len()?;
        outbound
            .send(frame)
            .map_err(|_| DhipError::TransportClosed)?;
        self.request_id = request_id;

        debug!(
            method = %request.method,
            request_id,
            session_id = self.session_id,
            "Sending request"
        );
        metrics::global_metrics().frame_sent(frame_len);

        Ok(request_id)
    }

    fn take_pending(&mut self) -> Option<Pending> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Pending(pending) => Some(pending),
            Slot::Idle => None,
        }
    }
}

/// Awaitable half of a sent request
#[derive(Debug)]
pub struct PendingResponse {
    request_id: u32,
    completion: oneshot::Receiver<Result<Response>>,
}

impl PendingResponse {
    /// Request id the frame was sent with
    pub fn request_id(&self) -> u32 {
        self.request_id
    }

    /// Wait for the response, or for the transport to give up
    pub async fn wait(self) -> Result<Response> {
        self.completion
            .await
            .unwrap_or(Err(DhipError::TransportClosed))
    }
}

/// Tracks the session and the single in-flight request of one connection
pub struct Correlator {
    state: Mutex<State>,
    credentials: Credentials,
    login: LoginParams,
    max_auth_attempts: u32,
}

impl Correlator {
    /// Create a correlator and the receiving end of its outbound frame queue
    pub fn new(
        credentials: Credentials,
        login: LoginParams,
        max_auth_attempts: u32,
    ) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let correlator = Self {
            state: Mutex::new(State {
                session_id: 0,
                request_id: 0,
                slot: Slot::Idle,
                outbound: Some(tx),
            }),
            credentials,
            login,
            max_auth_attempts,
        };
        (correlator, rx)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session id (0 until a challenge assigns one)
    pub fn session_id(&self) -> u32 {
        self.lock().session_id
    }

    /// Last request id handed out
    pub fn last_request_id(&self) -> u32 {
        self.lock().request_id
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.lock().slot, Slot::Pending(_))
    }

    /// Initial `global.login` for this connection
    pub fn login_request(&self) -> Request {
        handshake::login_request(&self.login)
    }

    /// Occupy the pending slot and queue `request`.
    ///
    /// # Errors
    /// - `RequestInFlight` if a request is already pending; the slot is left untouched
    /// - `TransportClosed` once the connection has gone away
    pub fn send(&self, request: Request) -> Result<PendingResponse> {
        let mut state = self.lock();
        if matches!(state.slot, Slot::Pending(_)) {
            return Err(DhipError::RequestInFlight);
        }

        let request_id = state.write(&request)?;
        let (tx, rx) = oneshot::channel();
        state.slot = Slot::Pending(Pending {
            request_id,
            challenges: 0,
            completion: tx,
        });

        Ok(PendingResponse {
            request_id,
            completion: rx,
        })
    }

    /// Send `request` and wait at most `timeout` for its final response.
    ///
    /// On expiry the slot is cleared, so a late answer is dropped on arrival.
    #[instrument(skip(self, request), fields(method = %request.method), level = "debug")]
    pub async fn call(&self, request: Request, timeout: Duration) -> Result<Response> {
        let pending = self.send(request)?;

        let outcome = with_timeout_error(pending.wait(), timeout).await;
        if matches!(outcome, Err(DhipError::Timeout)) {
            warn!(timeout_ms = timeout.as_millis() as u64, "Request timed out");
            self.abandon();
        }
        outcome
    }

    fn abandon(&self) {
        if let Some(pending) = self.lock().take_pending() {
            pending.resolve(Err(DhipError::Timeout));
        }
    }

    /// Feed one decoded inbound body
    pub fn on_message(&self, response: Response) {
        metrics::global_metrics().frame_received();
        let mut state = self.lock();

        let Some(mut pending) = state.take_pending() else {
            warn!(id = ?response.id, "Dropping frame received with no pending request");
            return;
        };

        if let Some(id) = response.id {
            if id != pending.request_id {
                warn!(
                    id,
                    expected = pending.request_id,
                    "Dropping frame answering another request"
                );
                state.slot = Slot::Pending(pending);
                return;
            }
        }

        let Some(error) = response.error.clone() else {
            debug!(request_id = pending.request_id, "Request resolved");
            pending.resolve(Ok(response));
            return;
        };

        if !response.is_challenge() {
            debug!(code = error.code, message = %error.message, "Request rejected by device");
            metrics::global_metrics().remote_error();
            let err = DhipError::RemoteError {
                code: error.code,
                message: error.message,
            };
            pending.resolve(Err(err));
            return;
        }

        pending.challenges += 1;
        if pending.challenges > self.max_auth_attempts {
            warn!(attempts = pending.challenges, "Giving up on login challenges");
            pending.resolve(Err(DhipError::HandshakeError(
                constants::ERR_TOO_MANY_CHALLENGES.into(),
            )));
            return;
        }

        let challenge = match Challenge::from_response(&response) {
            Ok(challenge) => challenge,
            Err(e) => {
                pending.resolve(Err(e));
                return;
            }
        };

        state.session_id = challenge.session_id;
        let answer = handshake::answer_challenge(&self.credentials, &self.login, &challenge);
        match state.write(&answer) {
            Ok(request_id) => {
                metrics::global_metrics().challenge_answered();
                pending.request_id = request_id;
                state.slot = Slot::Pending(pending);
            }
            Err(e) => pending.resolve(Err(e)),
        }
    }

    /// The peer closed the stream or the socket failed
    pub fn on_transport_closed(&self) {
        self.fail(DhipError::TransportClosed);
    }

    /// The byte stream could not be decoded
    pub fn on_transport_error(&self, err: DhipError) {
        metrics::global_metrics().protocol_error();
        self.fail(err);
    }

    /// Stop accepting requests; a pending request fails with `TransportClosed`
    pub fn shutdown(&self) {
        self.fail(DhipError::TransportClosed);
    }

    fn fail(&self, err: DhipError) {
        let mut state = self.lock();
        state.outbound = None;
        if let Some(pending) = state.take_pending() {
            debug!(request_id = pending.request_id, error = %err, "Rejecting pending request");
            pending.resolve(Err(err));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn correlator() -> (Correlator, mpsc::UnboundedReceiver<Frame>) {
        Correlator::new(Credentials::default(), LoginParams::default(), 3)
    }

    fn body(frame: &Frame) -> Value {
        frame.body_json().unwrap()
    }

    #[test]
    fn test_request_ids_start_at_one() {
        let (correlator, mut frames) = correlator();
        let pending = correlator.send(Request::new("a")).unwrap();

        assert_eq!(pending.request_id(), 1);
        let frame = frames.try_recv().unwrap();
        assert_eq!(frame.header.request_id, 1);
        assert_eq!(frame.header.session_id, 0);
        assert_eq!(body(&frame)["id"], 1);
        assert_eq!(body(&frame)["session"], 0);
    }

    #[test]
    fn test_second_send_is_rejected() {
        let (correlator, mut frames) = correlator();
        let _pending = correlator.send(Request::new("first")).unwrap();
        frames.try_recv().unwrap();

        assert!(matches!(
            correlator.send(Request::new("second")),
            Err(DhipError::RequestInFlight)
        ));
        assert!(frames.try_recv().is_err());
        assert_eq!(correlator.last_request_id(), 1);
        assert!(correlator.is_pending());
    }

    #[tokio::test]
    async fn test_success_resolves_and_frees_slot() {
        let (correlator, _frames) = correlator();
        let pending = correlator.send(Request::new("a")).unwrap();

        correlator.on_message(Response {
            id: Some(1),
            result: Some(json!(true)),
            ..Default::default()
        });

        let response = pending.wait().await.unwrap();
        assert_eq!(response.result, Some(json!(true)));
        assert!(!correlator.is_pending());
        assert!(correlator.send(Request::new("b")).is_ok());
    }

    #[tokio::test]
    async fn test_remote_error_rejects() {
        let (correlator, _frames) = correlator();
        let pending = correlator.send(Request::new("a")).unwrap();

        correlator.on_message(Response {
            error: Some(crate::protocol::message::RemoteErrorBody {
                code: 268894209,
                message: "Invalid request".into(),
            }),
            ..Default::default()
        });

        match pending.wait().await {
            Err(DhipError::RemoteError { code, message }) => {
                assert_eq!(code, 268894209);
                assert_eq!(message, "Invalid request");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!correlator.is_pending());
    }

    #[tokio::test]
    async fn test_transport_closed_rejects_and_blocks_sends() {
        let (correlator, mut frames) = correlator();
        let pending = correlator.send(Request::new("a")).unwrap();
        frames.try_recv().unwrap();

        correlator.on_transport_closed();

        assert!(matches!(
            pending.wait().await,
            Err(DhipError::TransportClosed)
        ));
        assert!(matches!(
            correlator.send(Request::new("b")),
            Err(DhipError::TransportClosed)
        ));
        assert!(frames.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_mismatched_id_is_ignored() {
        let (correlator, _frames) = correlator();
        let pending = correlator.send(Request::new("a")).unwrap();

        correlator.on_message(Response {
            id: Some(41),
            result: Some(json!("stale")),
            ..Default::default()
        });
        assert!(correlator.is_pending());

        correlator.on_message(Response {
            id: Some(1),
            result: Some(json!("fresh")),
            ..Default::default()
        });
        assert_eq!(pending.wait().await.unwrap().result, Some(json!("fresh")));
    }

    #[test]
    fn test_stray_frame_without_pending_request() {
        let (correlator, mut frames) = correlator();
        correlator.on_message(Response {
            result: Some(json!(true)),
            ..Default::default()
        });

        assert!(!correlator.is_pending());
        assert!(frames.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out_and_clears_slot() {
        let (correlator, _frames) = correlator();

        let outcome = correlator
            .call(Request::new("a"), Duration::from_millis(50))
            .await;

        assert!(matches!(outcome, Err(DhipError::Timeout)));
        assert!(!correlator.is_pending());

        // A late answer to the abandoned request must not satisfy the next one.
        let next = correlator.send(Request::new("b")).unwrap();
        correlator.on_message(Response {
            id: Some(1),
            result: Some(json!("late")),
            ..Default::default()
        });
        assert!(correlator.is_pending());
        assert_eq!(next.request_id(), 2);
    }
}
