//! PostgreSQL backend tests
//!
//! Require a running database reachable through `DATABASE_URL`; run with
//! `cargo test -- --ignored`. Every test works in freshly generated rooms,
//! so runs do not interfere with each other or with existing data.

#![cfg(feature = "ssr")]

mod common;

use chrono::Utc;
use common::{database_pool, small_database_pool, test_config, token, TestClient, RECV_TIMEOUT};
use pretty_assertions::assert_eq;
use roomcast::backend::auth::JwtAuthenticator;
use roomcast::backend::chat::{
    ChatBackend, ChatService, HistoryStore, InviteStore, PgHistoryStore, PgInviteStore,
    PgRoomRegistry, RoomRegistry,
};
use roomcast::backend::realtime::{Broadcaster, PgBroadcaster};
use roomcast::shared::{Message, Principal};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn principal(name: &str) -> Principal {
    Principal::new(format!("{name}-{}", uuid::Uuid::new_v4())).unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_registry_rooms_and_membership() {
    let registry = PgRoomRegistry::new(database_pool().await);
    let user = principal("alice");

    let r1 = registry.create_room().await.unwrap();
    let r2 = registry.create_room().await.unwrap();
    assert!(registry.room_exists(&r1).await.unwrap());

    registry.add_member(&user, &r1).await.unwrap();
    registry.add_member(&user, &r2).await.unwrap();
    registry.add_member(&user, &r1).await.unwrap();

    assert_eq!(registry.rooms_for_user(&user).await.unwrap(), vec![r1, r2]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_invites_are_bound_to_invitee() {
    let pool = database_pool().await;
    let registry = PgRoomRegistry::new(pool.clone());
    let invites = PgInviteStore::new(pool);
    let room_id = registry.create_room().await.unwrap();
    let bob = principal("bob");

    let key = invites.create_invite(&room_id, &bob).await.unwrap();

    assert_eq!(invites.lookup(&key, &bob).await.unwrap(), Some(room_id));
    assert_eq!(invites.lookup(&key, &principal("eve")).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_history_keeps_insertion_order() {
    let pool = database_pool().await;
    let room_id = PgRoomRegistry::new(pool.clone()).create_room().await.unwrap();
    let history = PgHistoryStore::new(pool);
    let user = principal("alice");

    // Identical timestamps: order must come from insertion, not time.
    let now = Utc::now();
    let sent: Vec<Message> = ["one", "two", "three"]
        .iter()
        .map(|body| Message::new(room_id.clone(), user.clone(), body.to_string(), now))
        .collect();
    for message in &sent {
        history.append(&room_id, message).await.unwrap();
    }

    let listed = history.list(&room_id).await.unwrap();
    let bodies: Vec<_> = listed.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);
    assert_eq!(listed[0].id, sent[0].id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
#[serial]
async fn test_notify_reaches_every_listener() {
    let pool = database_pool().await;
    let room_id = PgRoomRegistry::new(pool.clone()).create_room().await.unwrap();
    let broadcaster = PgBroadcaster::new(pool, 8, Duration::from_secs(5));

    let mut first = broadcaster.subscribe(&room_id).await.unwrap();
    let mut second = broadcaster.subscribe(&room_id).await.unwrap();

    let message = Message::new(room_id.clone(), principal("alice"), "over the wire".into(), Utc::now());
    broadcaster.publish(&room_id, &message).await.unwrap();

    for sub in [&mut first, &mut second] {
        let received = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("notification should arrive")
            .expect("subscription should be open");
        assert_eq!(received.id, message.id);
        assert_eq!(received.body, "over the wire");
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
#[serial]
async fn test_relay_across_services_sharing_a_database() {
    let config = test_config();
    let pool = database_pool().await;
    // Two services over one database behave like two server processes.
    let make_service = || {
        ChatService::new(
            Arc::new(JwtAuthenticator::new(&config.jwt_secret)),
            ChatBackend::postgres(pool.clone(), &config),
        )
    };
    let east = make_service();
    let west = make_service();

    let room_id = east.create_room(&token("alice")).await.unwrap();

    let alice = TestClient::connect(&east, "alice", room_id.as_str()).await;
    let mut bob = TestClient::connect(&west, "bob", room_id.as_str()).await;

    alice.send("hello from east").await;
    let received = bob.recv().await;
    assert_eq!(received.body, "hello from east");
    assert_eq!(received.user_id, "alice");

    let history = west.history(&token("bob"), room_id.as_str()).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
#[serial]
async fn test_sessions_beyond_pool_size_share_one_listener() {
    let config = test_config();
    let pool = small_database_pool(3).await;
    let service = ChatService::new(
        Arc::new(JwtAuthenticator::new(&config.jwt_secret)),
        ChatBackend::postgres(pool.clone(), &config),
    );
    let rooms = [
        service.create_room(&token("alice")).await.unwrap(),
        service.create_room(&token("alice")).await.unwrap(),
    ];

    // Four sessions per room, eight in total against three connections.
    let mut clients = Vec::new();
    for i in 0..8 {
        let room_id = &rooms[i % rooms.len()];
        clients.push(TestClient::connect(&service, &format!("user{i}"), room_id.as_str()).await);
    }
    assert!(pool.size() <= 3);

    clients[0].send("still appending").await;
    for client in clients.iter_mut().step_by(2) {
        assert_eq!(client.recv().await.body, "still appending");
    }
    assert!(clients[1].is_quiet().await);

    let history = service.history(&token("alice"), rooms[0].as_str()).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
#[serial]
async fn test_room_is_heard_again_after_last_subscriber_leaves() {
    let pool = database_pool().await;
    let room_id = PgRoomRegistry::new(pool.clone()).create_room().await.unwrap();
    let broadcaster = PgBroadcaster::new(pool, 8, Duration::from_secs(5));

    let first = broadcaster.subscribe(&room_id).await.unwrap();
    assert_eq!(broadcaster.subscriber_count(&room_id), 1);
    drop(first);
    assert_eq!(broadcaster.subscriber_count(&room_id), 0);

    let mut second = broadcaster.subscribe(&room_id).await.unwrap();
    let message = Message::new(room_id.clone(), principal("alice"), "welcome back".into(), Utc::now());
    broadcaster.publish(&room_id, &message).await.unwrap();

    let received = tokio::time::timeout(RECV_TIMEOUT, second.recv())
        .await
        .expect("notification should arrive")
        .expect("subscription should be open");
    assert_eq!(received.id, message.id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
#[serial]
async fn test_body_larger_than_notify_limit_is_relayed() {
    let mut config = test_config();
    config.max_body_bytes = 16 * 1024;
    let service = ChatService::new(
        Arc::new(JwtAuthenticator::new(&config.jwt_secret)),
        ChatBackend::postgres(database_pool().await, &config),
    )
    .with_max_body_bytes(config.max_body_bytes);
    let room_id = service.create_room(&token("alice")).await.unwrap();

    let alice = TestClient::connect(&service, "alice", room_id.as_str()).await;
    let mut bob = TestClient::connect(&service, "bob", room_id.as_str()).await;

    let body = "x".repeat(8000);
    alice.send(&body).await;
    let received = bob.recv().await;
    assert_eq!(received.body, body);
    assert_eq!(received.user_id, "alice");

    alice.send("small again").await;
    assert_eq!(bob.recv().await.body, "small again");
    assert!(alice.hang_up().await.is_ok());
}
