//! End-to-end open-door flows against a scripted device.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use common::{client_config, cooperative_device, spawn_device, Reply, SESSION};
use dhip_client::config::DoorConfig;
use dhip_client::{Accessory, AccessoryState, Capability, DhipError, DoorClient};
use serde_json::json;

#[tokio::test]
async fn test_open_door_with_login_challenge() {
    let (addr, device) = spawn_device(cooperative_device(json!(true))).await;
    let client = DoorClient::new(client_config(addr));

    client.open_door("127.0.0.1", "1234").await.unwrap();

    let log = device.await.unwrap();
    assert_eq!(
        log.methods(),
        vec![
            "global.login",
            "global.login",
            "accessControl.factory.instance",
            "accessControl.openDoor",
            "accessControl.destroy",
        ]
    );
    assert!(log.saw_eof);

    let ids: Vec<u32> = log.headers.iter().map(|h| h.request_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    let sessions: Vec<u32> = log.headers.iter().map(|h| h.session_id).collect();
    assert_eq!(sessions, vec![0, SESSION, SESSION, SESSION, SESSION]);

    let first_login = &log.requests[0]["params"];
    assert!(first_login.get("password").is_none());
    assert_eq!(first_login["clientType"], "NetKeyboard");
    assert_eq!(first_login["ipAddr"], "127.0.0.1");
    assert_eq!(first_login["loginType"], "Direct");

    let answer = &log.requests[1]["params"];
    assert_eq!(answer["userName"], "admin");
    assert_eq!(answer["password"], common::GOLDEN_PASSWORD);
    assert_eq!(answer["clientType"], "NetKeyboard");

    assert_eq!(log.requests[2]["params"], json!({"channel": 0}));
    assert_eq!(
        log.requests[3]["params"],
        json!({"DoorIndex": 0, "ShortNumber": "1234"})
    );
    assert_eq!(log.requests[3]["object"], "obj-1");
    assert_eq!(log.requests[4]["object"], "obj-1");
}

#[tokio::test]
async fn test_refused_open_still_destroys_object() {
    let (addr, device) = spawn_device(cooperative_device(json!(false))).await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "0000").await;
    assert!(matches!(outcome, Err(DhipError::RefusedOperation)));

    let log = device.await.unwrap();
    assert_eq!(log.methods().last(), Some(&"accessControl.destroy"));
    assert!(log.saw_eof);
}

#[tokio::test]
async fn test_null_open_result_is_refused() {
    let (addr, device) = spawn_device(cooperative_device(json!(null))).await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::RefusedOperation)));
    device.await.unwrap();
}

#[tokio::test]
async fn test_device_hangs_up_during_login() {
    let (addr, device) = spawn_device(|_| Reply::Hangup).await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::TransportClosed)));

    let log = device.await.unwrap();
    assert_eq!(log.methods(), vec!["global.login"]);
    assert!(log.saw_eof);
}

#[tokio::test]
async fn test_factory_error_skips_destroy() {
    let mut inner = cooperative_device(json!(true));
    let (addr, device) = spawn_device(move |request| {
        if request["method"] == "accessControl.factory.instance" {
            Reply::Respond(json!({
                "result": false,
                "error": {"code": 268894209, "message": "Invalid request"},
            }))
        } else {
            inner(request)
        }
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    match client.open_door("127.0.0.1", "1234").await {
        Err(DhipError::RemoteError { code, message }) => {
            assert_eq!(code, 268894209);
            assert_eq!(message, "Invalid request");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let log = device.await.unwrap();
    assert!(!log.methods().contains(&"accessControl.destroy"));
    assert!(log.saw_eof);
}

#[tokio::test]
async fn test_missing_factory_handle() {
    let mut inner = cooperative_device(json!(true));
    let (addr, device) = spawn_device(move |request| {
        if request["method"] == "accessControl.factory.instance" {
            Reply::Respond(json!({"params": null}))
        } else {
            inner(request)
        }
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::DeserializeError(_))));
    device.await.unwrap();
}

#[tokio::test]
async fn test_open_error_reported_over_destroy_outcome() {
    let mut inner = cooperative_device(json!(true));
    let (addr, device) = spawn_device(move |request| {
        if request["method"] == "accessControl.openDoor" {
            Reply::Respond(json!({
                "result": false,
                "error": {"code": 285802499, "message": "Door busy"},
            }))
        } else {
            inner(request)
        }
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(
        outcome,
        Err(DhipError::RemoteError { code: 285802499, .. })
    ));

    let log = device.await.unwrap();
    assert_eq!(log.methods().last(), Some(&"accessControl.destroy"));
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let mut inner = cooperative_device(json!(true));
    let (addr, device) = spawn_device(move |request| {
        if request["method"] == "accessControl.openDoor" {
            Reply::Ignore
        } else {
            inner(request)
        }
    })
    .await;
    let mut config = client_config(addr);
    config.response_timeout = Duration::from_millis(200);
    let client = DoorClient::new(config);

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::Timeout)));

    let log = device.await.unwrap();
    assert_eq!(log.methods().last(), Some(&"accessControl.destroy"));
    assert!(log.saw_eof);
}

#[tokio::test]
async fn test_bad_magic_from_device() {
    let (addr, device) = spawn_device(|_| {
        let mut bytes = vec![0u8; 32];
        bytes[..8].copy_from_slice(&0xdead_beef_u64.to_le_bytes());
        Reply::Raw(bytes)
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::ProtocolMismatch(0xdead_beef))));

    let log = device.await.unwrap();
    assert_eq!(log.methods(), vec!["global.login"]);
}

#[tokio::test]
async fn test_response_split_into_small_chunks() {
    let mut inner = cooperative_device(json!(true));
    let (addr, device) = spawn_device(move |request| match inner(request) {
        Reply::Respond(body) => Reply::RespondInChunks(body, 7),
        other => other,
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    client.open_door("127.0.0.1", "1234").await.unwrap();
    assert_eq!(device.await.unwrap().requests.len(), 5);
}

#[tokio::test]
async fn test_wrong_password_exhausts_challenges() {
    let (addr, device) = spawn_device(|request| {
        assert_eq!(request["method"], "global.login");
        Reply::Respond(common::challenge())
    })
    .await;
    let client = DoorClient::new(client_config(addr));

    let outcome = client.open_door("127.0.0.1", "1234").await;
    assert!(matches!(outcome, Err(DhipError::HandshakeError(_))));

    // Initial login plus one answer per allowed challenge.
    let log = device.await.unwrap();
    assert_eq!(log.requests.len(), 4);
}

fn door(addr: std::net::SocketAddr, capability: Capability) -> DoorConfig {
    DoorConfig {
        address: format!("127.0.0.1:{}", addr.port()),
        short_number: "1234".into(),
        capability,
        garage_open_delay: Duration::from_millis(50),
        ..DoorConfig::default()
    }
}

#[tokio::test]
async fn test_lock_accessory_returns_to_secured() {
    let (addr, device) = spawn_device(cooperative_device(json!(true))).await;
    let accessory = Accessory::new(
        DoorClient::new(client_config(addr)),
        door(addr, Capability::Lock),
    );

    assert_eq!(accessory.state(), AccessoryState::Secured);
    accessory.trigger().await.unwrap();
    assert_eq!(accessory.state(), AccessoryState::Secured);
    device.await.unwrap();
}

#[tokio::test]
async fn test_switch_accessory_turns_off_after_failure() {
    let (addr, device) = spawn_device(cooperative_device(json!(false))).await;
    let accessory = Accessory::new(
        DoorClient::new(client_config(addr)),
        door(addr, Capability::Switch),
    );
    let mut states = accessory.subscribe();

    let outcome = accessory.trigger().await;
    assert!(matches!(outcome, Err(DhipError::RefusedOperation)));
    assert_eq!(accessory.state(), AccessoryState::Off);
    assert!(states.has_changed().unwrap());
    device.await.unwrap();
}

#[tokio::test]
async fn test_garage_door_reports_open_after_delay() {
    let (addr, device) = spawn_device(cooperative_device(json!(true))).await;
    let accessory = Accessory::new(
        DoorClient::new(client_config(addr)),
        door(addr, Capability::GarageDoor),
    );
    let mut states = accessory.subscribe();

    accessory.trigger().await.unwrap();
    assert_eq!(accessory.state(), AccessoryState::Opening);

    tokio::time::timeout(
        Duration::from_secs(2),
        states.wait_for(|state| *state == AccessoryState::Open),
    )
    .await
    .expect("garage door never reported open")
    .unwrap();
    device.await.unwrap();
}
