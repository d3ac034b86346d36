//! End-to-end socket tests: a real server on an ephemeral port, driven by
//! `tokio-tungstenite` clients.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use lib_auth::{encode_jwt, TokenVerifier};
use lib_core::model::store::{MessageRepository, RoomRepository};
use lib_core::{create_pool, migrate, BusBackend, Config, DbPool};
use lib_web::chat::{ChatAppState, LocalBus};
use lib_web::services::{IdentityGateway, UserCheck};
use lib_web::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const SECRET: &str = "test-secret-key-must-be-at-least-32-characters-long!";

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct StaticIdentity;

#[async_trait]
impl IdentityGateway for StaticIdentity {
    async fn fetch_profile(&self, token: &str) -> Option<Value> {
        if token.is_empty() {
            None
        } else {
            Some(json!({"username": "alice"}))
        }
    }

    async fn check_user(&self, _user_id: &str, _token: &str) -> UserCheck {
        UserCheck::Exists
    }
}

fn config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_algorithm: "HS256".to_string(),
        jwt_secret: Some(SECRET.to_string()),
        jwt_public_key: None,
        auth_api_url: "http://localhost:8080".to_string(),
        auth_profile_endpoint: "api/users/profile/".to_string(),
        identity_timeout_secs: 10,
        identity_fail_open: true,
        broadcast_backend: BusBackend::Local,
        redis_url: "redis://127.0.0.1:6379".to_string(),
        session_buffer: 32,
    }
}

/// Serve the full router on 127.0.0.1:0; returns the address and the store.
async fn spawn_server() -> (String, DbPool) {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    migrate(&pool).await.unwrap();

    let verifier = Arc::new(TokenVerifier::hmac(SECRET).unwrap());
    let identity: Arc<dyn IdentityGateway> = Arc::new(StaticIdentity);
    let chat_state = Arc::new(ChatAppState::new(
        pool.clone(),
        Arc::clone(&verifier),
        Arc::clone(&identity),
        Arc::new(LocalBus::new()),
        32,
    ));
    let state = AppState {
        db: pool.clone(),
        config: config(),
        verifier,
        identity,
    };
    let app = create_router(state, chat_state, &[]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr.to_string(), pool)
}

async fn connect(addr: &str, path: &str, user_id: &str) -> Client {
    let token = encode_jwt(user_id, &format!("user{}", user_id), SECRET, 1).unwrap();
    let url = format!("ws://{}{}?token={}", addr, path, token);
    let (socket, _response) = connect_async(url).await.expect("handshake should succeed");
    socket
}

async fn send(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, failing the test after a few seconds of silence.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

fn presence(user_id: &str, status: &str) -> Value {
    json!({"type": "presence", "user_id": user_id, "status": status})
}

#[tokio::test]
async fn test_room_conversation() {
    let (addr, pool) = spawn_server().await;
    let (room, _) = RoomRepository::get_or_create(&pool, "3", "5").await.unwrap();
    let path = format!("/ws/chat/{}", room.id);

    let mut alice = connect(&addr, &path, "3").await;
    assert_eq!(next_json(&mut alice).await, presence("3", "online"));

    let mut bob = connect(&addr, &path, "5").await;
    assert_eq!(next_json(&mut bob).await, presence("5", "online"));
    assert_eq!(next_json(&mut alice).await, presence("5", "online"));

    // Message: trimmed, persisted, delivered to both without a type field
    send(&mut alice, json!({"type": "message", "content": "  hello  "})).await;
    for client in [&mut alice, &mut bob] {
        let frame = next_json(client).await;
        assert!(frame.get("type").is_none());
        assert_eq!(frame["content"], "hello");
        assert_eq!(frame["sender_id"], "3");
        assert_eq!(frame["room"], room.id);
        assert!(frame["timestamp"].is_string());
    }

    // Blank content is dropped; the next frame each side sees is the typing event
    send(&mut alice, json!({"type": "message", "content": "   "})).await;
    send(&mut bob, json!({"type": "typing", "is_typing": "yes"})).await;
    let typing = json!({"type": "typing", "user_id": "5", "is_typing": true});
    assert_eq!(next_json(&mut alice).await, typing);
    assert_eq!(next_json(&mut bob).await, typing);

    // Errors go to the sender only and the socket stays usable
    send(&mut alice, json!({"type": "dance"})).await;
    assert_eq!(next_json(&mut alice).await, json!({"type": "error", "detail": "unknown type"}));
    alice.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(next_json(&mut alice).await["type"], "error");

    send(&mut alice, json!({"type": "fetch_profile"})).await;
    assert_eq!(
        next_json(&mut alice).await,
        json!({"type": "profile", "profile": {"username": "alice"}})
    );

    send(&mut alice, json!({"type": "typing", "is_typing": 0})).await;
    let stopped = json!({"type": "typing", "user_id": "3", "is_typing": false});
    assert_eq!(next_json(&mut bob).await, stopped);
    assert_eq!(next_json(&mut alice).await, stopped);

    // Disconnect announces offline exactly once to the remaining participant
    bob.close(None).await.unwrap();
    assert_eq!(next_json(&mut alice).await, presence("5", "offline"));
    assert!(
        tokio::time::timeout(Duration::from_millis(300), alice.next()).await.is_err(),
        "offline must be announced exactly once"
    );

    let stored = MessageRepository::list_for_room(&pool, room.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hello");
}

#[tokio::test]
async fn test_rooms_do_not_leak_into_each_other() {
    let (addr, pool) = spawn_server().await;
    let (room_a, _) = RoomRepository::get_or_create(&pool, "3", "5").await.unwrap();
    let (room_b, _) = RoomRepository::get_or_create(&pool, "3", "7").await.unwrap();

    let mut in_a = connect(&addr, &format!("/ws/chat/{}", room_a.id), "5").await;
    assert_eq!(next_json(&mut in_a).await, presence("5", "online"));

    let mut in_b = connect(&addr, &format!("/ws/chat/{}", room_b.id), "7").await;
    assert_eq!(next_json(&mut in_b).await, presence("7", "online"));

    send(&mut in_b, json!({"type": "message", "content": "only for b"})).await;
    assert_eq!(next_json(&mut in_b).await["content"], "only for b");

    send(&mut in_a, json!({"type": "typing", "is_typing": true})).await;
    assert_eq!(next_json(&mut in_a).await["type"], "typing");
}

#[tokio::test]
async fn test_global_presence_relay() {
    let (addr, _pool) = spawn_server().await;

    let status = |user_id: &str, status: &str| {
        json!({"type": "presence_global", "user_id": user_id, "status": status})
    };

    // Each client sees its own announcement once it has joined the group.
    // Announcements without a usable status are never relayed.
    let mut alice = connect(&addr, "/ws/presence", "3").await;
    send(&mut alice, json!({"action": "status", "status": "online"})).await;
    assert_eq!(next_json(&mut alice).await, status("3", "online"));

    let mut bob = connect(&addr, "/ws/presence", "5").await;
    send(&mut bob, json!({"action": "wave"})).await;
    send(&mut bob, json!({"action": "status"})).await;
    send(&mut bob, json!({"action": "status", "status": 5})).await;
    send(&mut bob, json!({"action": "status", "status": ""})).await;
    send(&mut bob, json!({"action": "status", "status": "online"})).await;
    assert_eq!(next_json(&mut bob).await, status("5", "online"));
    assert_eq!(next_json(&mut alice).await, status("5", "online"));

    // The verified user id wins over anything in the frame
    send(&mut alice, json!({"action": "status", "status": "away", "user_id": "spoofed"})).await;
    assert_eq!(next_json(&mut alice).await, status("3", "away"));
    assert_eq!(next_json(&mut bob).await, status("3", "away"));
}
