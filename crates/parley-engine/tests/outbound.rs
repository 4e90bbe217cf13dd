// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound pipeline against a real store and the mock provider.

use std::time::Duration;

use parley_core::types::{Direction, MessageStatus, MessageType};
use parley_core::{ParleyError, RateLimit};
use parley_engine::{EngineSettings, NotificationEvent, SendRequest};
use parley_test_utils::{MOCK_BUSINESS_ADDRESS, TestHarness, mock_config};

const CUSTOMER: &str = "+15551234567";

async fn harness() -> TestHarness {
    TestHarness::builder().with_mock_tenant(1).build().await.unwrap()
}

#[tokio::test]
async fn send_persists_and_is_immediately_visible() {
    let h = harness().await;
    let inbox = h.engine.inbox();

    // Prime the caches so freshness depends on invalidation.
    assert!(inbox.list_conversations(1, &Default::default()).await.unwrap().is_empty());

    let message = h
        .engine
        .outbound()
        .send(1, &SendRequest::text("555-123-4567", "hello"))
        .await
        .unwrap();
    assert_eq!(message.direction, Direction::Outbound);
    assert_eq!(message.status, MessageStatus::Sent);
    assert_eq!(message.to_address, CUSTOMER);
    assert_eq!(message.from_address, MOCK_BUSINESS_ADDRESS);

    let sent = h.mock.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, CUSTOMER);

    let conversations = inbox.list_conversations(1, &Default::default()).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].id, message.conversation_id);
    assert_eq!(conversations[0].message_count, 1);
    assert_eq!(conversations[0].unread_count, 0);

    let history = inbox.message_history(1, &message.conversation_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, message.id);
}

#[tokio::test]
async fn media_sends_carry_their_type() {
    let h = harness().await;
    let request = SendRequest {
        to: CUSTOMER.into(),
        body: String::new(),
        media_url: Some("https://cdn.example/p.jpg".into()),
        media_content_type: Some("image/jpeg".into()),
    };
    let message = h.engine.outbound().send(1, &request).await.unwrap();
    assert_eq!(message.message_type, MessageType::Image);
    assert_eq!(h.mock.sent()[0].media_url.as_deref(), Some("https://cdn.example/p.jpg"));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_provider() {
    let h = harness().await;
    let outbound = h.engine.outbound();

    let err = outbound.send(1, &SendRequest::text("12", "hi")).await.unwrap_err();
    assert!(matches!(err, ParleyError::Validation(_)));
    let err = outbound.send(1, &SendRequest::text(CUSTOMER, "  ")).await.unwrap_err();
    assert!(matches!(err, ParleyError::Validation(_)));

    assert!(h.mock.sent().is_empty());
    assert!(h.all_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn blacklisted_addresses_are_refused() {
    let h = harness().await;
    let inbox = h.engine.inbox();
    let canonical = inbox.blacklist_add(1, "5551234567", Some("opted out")).await.unwrap();
    assert_eq!(canonical, CUSTOMER);

    let err = h
        .engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "promo"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Blacklisted { .. }));
    assert!(h.mock.sent().is_empty());

    assert!(inbox.blacklist_remove(1, CUSTOMER).await.unwrap());
    assert!(!inbox.blacklist_remove(1, CUSTOMER).await.unwrap());
    h.engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "welcome back"))
        .await
        .unwrap();
}

#[tokio::test]
async fn window_limit_applies_per_tenant() {
    let mut limited = mock_config(1, "mock");
    limited.rate_limit = RateLimit {
        window_minutes: 1,
        max_messages: 2,
    };
    let h = TestHarness::builder()
        .with_tenant(limited)
        .with_mock_tenant(2)
        .build()
        .await
        .unwrap();
    let outbound = h.engine.outbound();

    for _ in 0..2 {
        outbound.send(1, &SendRequest::text(CUSTOMER, "x")).await.unwrap();
    }
    let err = outbound.send(1, &SendRequest::text(CUSTOMER, "x")).await.unwrap_err();
    assert!(matches!(err, ParleyError::RateLimited { tenant_id: 1, .. }));

    // Another tenant has its own window.
    outbound.send(2, &SendRequest::text(CUSTOMER, "x")).await.unwrap();
    assert_eq!(h.mock.sent().len(), 3);
}

#[tokio::test]
async fn provider_rejection_persists_nothing() {
    let h = harness().await;
    h.mock.fail_sends("21211 invalid 'To' number");
    let err = h
        .engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Provider { .. }));
    assert!(h.all_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_provider_times_out() {
    let h = TestHarness::builder()
        .with_mock_tenant(1)
        .with_settings(EngineSettings {
            provider_timeout: Duration::from_millis(50),
            ..EngineSettings::default()
        })
        .build()
        .await
        .unwrap();
    h.mock.delay_sends(Duration::from_secs(10));
    let err = h
        .engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Timeout { .. }));
    assert!(h.all_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_provider_leaves_no_state() {
    let h = TestHarness::builder()
        .with_tenant(mock_config(1, "carrier-pigeon"))
        .build()
        .await
        .unwrap();
    let err = h
        .engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::UnknownProvider { .. }));
    assert!(h.all_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_destination_fails_before_tenant_lookup() {
    let h = harness().await;
    let outbound = h.engine.outbound();

    // Tenant 9 has no configuration; a bad address is still the caller's error.
    let err = outbound
        .send(9, &SendRequest::text("not a number", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Validation(_)));

    // A bare national number needs the tenant's country code first.
    let err = outbound
        .send(9, &SendRequest::text("5551234567", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Configuration(_)));
    assert!(h.mock.sent().is_empty());
}

#[tokio::test]
async fn bulk_results_line_up_with_requests() {
    let h = harness().await;
    let results = h
        .engine
        .outbound()
        .send_bulk(
            1,
            &[
                SendRequest::text("+15551230001", "a"),
                SendRequest::text("nope", "b"),
                SendRequest::text("+15551230002", "c"),
            ],
        )
        .await;
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().body, "a");
    assert!(matches!(results[1], Err(ParleyError::Validation(_))));
    assert_eq!(results[2].as_ref().unwrap().to_address, "+15551230002");

    let conversations = h
        .engine
        .inbox()
        .list_conversations(1, &Default::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 2);
}

#[tokio::test]
async fn sends_are_announced() {
    let h = harness().await;
    let mut events = h.engine.subscribe();
    h.engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "hi"))
        .await
        .unwrap();

    let mut saw_sent = false;
    while let Ok(event) = events.try_recv() {
        if let NotificationEvent::MessageSent { message } = event {
            assert_eq!(message.body, "hi");
            saw_sent = true;
        }
    }
    assert!(saw_sent);
}
