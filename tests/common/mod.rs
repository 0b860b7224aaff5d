//! Scripted DHIP device for integration tests.
//!
//! The device accepts one connection, reads frames one at a time and lets a
//! handler decide how to answer each request body. Everything it received is
//! returned in a [`DeviceLog`] once the client closes the connection.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use dhip_client::config::ClientConfig;
use dhip_client::core::frame::{Frame, Header, HEADER_SIZE};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const GOLDEN_PASSWORD: &str = "222047CB02DB99A5C1706968F231574B";
pub const SESSION: u32 = 1234;

/// What the device does with one request
pub enum Reply {
    /// Answer with this body (`id` and `session` are filled in)
    Respond(Value),
    /// Answer in chunks of the given size, pausing between them
    RespondInChunks(Value, usize),
    /// Answer with raw bytes
    Raw(Vec<u8>),
    /// Close the device's write half, keep reading
    Hangup,
    /// Say nothing
    Ignore,
}

#[derive(Debug, Default)]
pub struct DeviceLog {
    pub requests: Vec<Value>,
    pub headers: Vec<Header>,
    pub saw_eof: bool,
}

impl DeviceLog {
    pub fn methods(&self) -> Vec<&str> {
        self.requests
            .iter()
            .map(|r| r["method"].as_str().unwrap_or_default())
            .collect()
    }
}

/// Client configuration pointing at a test device
pub fn client_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        port: addr.port(),
        connect_timeout: Duration::from_secs(2),
        response_timeout: Duration::from_secs(2),
        ..ClientConfig::default()
    }
}

pub async fn spawn_device<F>(mut handler: F) -> (SocketAddr, JoinHandle<DeviceLog>)
where
    F: FnMut(&Value) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut log = DeviceLog::default();

        loop {
            let mut raw_header = [0u8; HEADER_SIZE];
            if socket.read_exact(&mut raw_header).await.is_err() {
                log.saw_eof = true;
                break;
            }
            let header = Header::parse(&raw_header).expect("client sent a bad header");
            let mut body = vec![0u8; header.body_length as usize];
            socket.read_exact(&mut body).await.unwrap();

            let request: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(request["id"], header.request_id);
            assert_eq!(request["session"], header.session_id);

            let reply = handler(&request);
            log.requests.push(request.clone());
            log.headers.push(header);

            match reply {
                Reply::Respond(body) => {
                    let bytes = response_bytes(&request, body);
                    socket.write_all(&bytes).await.unwrap();
                }
                Reply::RespondInChunks(body, size) => {
                    let bytes = response_bytes(&request, body);
                    write_in_chunks(&mut socket, &bytes, size).await;
                }
                Reply::Raw(bytes) => socket.write_all(&bytes).await.unwrap(),
                Reply::Hangup => socket.shutdown().await.unwrap(),
                Reply::Ignore => {}
            }
        }

        log
    });

    (addr, handle)
}

/// Encode `body` as the answer to `request`
pub fn response_bytes(request: &Value, mut body: Value) -> Vec<u8> {
    let id = request["id"].as_u64().unwrap() as u32;
    let map = body.as_object_mut().unwrap();
    map.entry("id").or_insert(json!(id));
    map.entry("session").or_insert(request["session"].clone());
    let session = map["session"].as_u64().unwrap_or(0) as u32;

    Frame::json(session, id, &body).unwrap().to_bytes().to_vec()
}

pub async fn write_in_chunks(socket: &mut TcpStream, bytes: &[u8], size: usize) {
    for chunk in bytes.chunks(size.max(1)) {
        socket.write_all(chunk).await.unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

pub fn challenge() -> Value {
    json!({
        "error": {"code": 268632079, "message": "Component error: login challenge!"},
        "params": {"encryption": "Default", "random": "RAND1", "realm": "R1"},
        "result": false,
        "session": SESSION,
    })
}

/// Device that challenges the login and then accepts everything
pub fn cooperative_device(open_result: Value) -> impl FnMut(&Value) -> Reply + Send + 'static {
    move |request| match request["method"].as_str() {
        Some("global.login") if request["params"].get("password").is_none() => {
            Reply::Respond(challenge())
        }
        Some("global.login") => {
            assert_eq!(request["params"]["password"], GOLDEN_PASSWORD);
            Reply::Respond(json!({"result": true, "params": null}))
        }
        Some("accessControl.factory.instance") => Reply::Respond(json!({"result": "obj-1"})),
        Some("accessControl.openDoor") => Reply::Respond(json!({"result": open_result.clone()})),
        Some("accessControl.destroy") => Reply::Respond(json!({"result": true})),
        other => panic!("unexpected method {other:?}"),
    }
}
