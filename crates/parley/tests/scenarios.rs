// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows across webhook ingestion, the widget bridge and the
//! outbound pipeline, assembled the way `parley serve` assembles them.

use std::time::Duration;

use parley_core::types::{ConversationFilter, Direction};
use parley_core::{ParleyError, RateLimit};
use parley_engine::{SendRequest, WebhookOutcome, WidgetPost};
use parley_test_utils::{MOCK_PROVIDER, TestHarness, inbound_text, mock_config, webhook_body};

#[tokio::test]
async fn duplicate_webhook_delivery_stores_one_message() {
    let mut config = mock_config(42, MOCK_PROVIDER);
    config.business_address = "+14155550000".into();
    let h = TestHarness::builder().with_tenant(config).build().await.unwrap();

    let body = webhook_body("abc1", vec![inbound_text("wamid-1", "+18095551234", "hello")]);
    let first = h.deliver_webhook(42, &body).await.unwrap();
    let second = h.deliver_webhook(42, &body).await.unwrap();
    assert_eq!(
        first,
        WebhookOutcome::Processed {
            messages: 1,
            statuses: 0
        }
    );
    assert_eq!(second, WebhookOutcome::Duplicate);

    let messages = h.all_messages(42).await.unwrap();
    assert_eq!(messages.len(), 1);

    let conversations = h
        .engine
        .inbox()
        .list_conversations(42, &ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    let conversation = &conversations[0];
    assert_eq!(conversation.customer_address, "+18095551234");
    assert_eq!(conversation.business_address, "+14155550000");
    assert_eq!(conversation.unread_count, 1);
    assert_eq!(conversation.last_message_preview.as_deref(), Some("hello"));
}

#[tokio::test]
async fn widget_retry_with_client_id_returns_original() {
    let h = TestHarness::builder().with_mock_tenant(7).build().await.unwrap();
    let post = WidgetPost {
        session_id: "sess-1".into(),
        body: "is anyone there?".into(),
        client_message_id: Some("c1".into()),
    };

    let first = h.engine.widget().post_customer_message(7, &post).await.unwrap();
    let retry = h.engine.widget().post_customer_message(7, &post).await.unwrap();

    assert!(!first.duplicate);
    assert!(retry.duplicate);
    assert_eq!(retry.message.id, first.message.id);
    assert_eq!(h.all_messages(7).await.unwrap().len(), 1);

    let polled = h.engine.widget().poll(7, "sess-1", None).await.unwrap();
    assert_eq!(polled.len(), 1);
    assert_eq!(polled[0].direction, Direction::Inbound);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_window_reopens_after_it_elapses() {
    let mut config = mock_config(3, MOCK_PROVIDER);
    config.rate_limit = RateLimit {
        window_minutes: 1,
        max_messages: 5,
    };
    let h = TestHarness::builder().with_tenant(config).build().await.unwrap();
    let outbound = h.engine.outbound();

    for i in 0..5 {
        outbound
            .send(3, &SendRequest::text("+15551234567", format!("msg {i}")))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
    }

    let err = outbound
        .send(3, &SendRequest::text("+15551234567", "one too many"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::RateLimited { tenant_id: 3, .. }));
    assert_eq!(h.mock.sent().len(), 5);

    tokio::time::advance(Duration::from_secs(61)).await;
    outbound
        .send(3, &SendRequest::text("+15551234567", "after the window"))
        .await
        .unwrap();
    assert_eq!(h.mock.sent().len(), 6);
    assert_eq!(h.all_messages(3).await.unwrap().len(), 6);
}

#[tokio::test]
async fn unknown_provider_creates_nothing() {
    let h = TestHarness::builder()
        .with_tenant(mock_config(9, "carrier-pigeon"))
        .build()
        .await
        .unwrap();

    let err = h.engine.factory().resolve(9).await.err().expect("expected UnknownProvider error");
    assert!(matches!(err, ParleyError::UnknownProvider { ref name } if name == "carrier-pigeon"));

    let err = h
        .engine
        .outbound()
        .send(9, &SendRequest::text("+15551234567", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::UnknownProvider { .. }));
    assert!(
        h.store
            .list_conversations(9, &ConversationFilter::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert!(h.mock.sent().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolution_yields_one_conversation() {
    let h = TestHarness::builder().with_mock_tenant(5).build().await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move {
                engine
                    .resolver()
                    .resolve_phone(5, "(555) 123-4567", "+15550000000", "1")
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut created = 0;
    for result in futures::future::join_all(tasks).await {
        let resolved = result.unwrap().unwrap();
        if resolved.created {
            created += 1;
        }
        ids.push(resolved.conversation.id);
    }

    assert_eq!(created, 1);
    ids.dedup();
    assert_eq!(ids.len(), 1);
    let stored = h
        .store
        .list_conversations(5, &ConversationFilter::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].customer_address, "+15551234567");
}

#[tokio::test]
async fn inbound_then_reply_reads_back_in_order() {
    let h = TestHarness::builder().with_mock_tenant(1).build().await.unwrap();
    let inbox = h.engine.inbox();

    // Warm both caches before writing.
    assert!(inbox.list_conversations(1, &ConversationFilter::default()).await.unwrap().is_empty());

    let body = webhook_body("evt-1", vec![inbound_text("in-1", "+15551234567", "where is my order?")]);
    h.deliver_webhook(1, &body).await.unwrap();

    let conversations = inbox.list_conversations(1, &ConversationFilter::default()).await.unwrap();
    assert_eq!(conversations.len(), 1);
    let conversation_id = conversations[0].id.clone();
    assert_eq!(inbox.message_history(1, &conversation_id).await.unwrap().len(), 1);

    h.engine
        .outbound()
        .send(1, &SendRequest::text("+15551234567", "it ships today"))
        .await
        .unwrap();

    let history = inbox.message_history(1, &conversation_id).await.unwrap();
    let bodies: Vec<_> = history.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["where is my order?", "it ships today"]);
    assert_eq!(history[0].direction, Direction::Inbound);
    assert_eq!(history[1].direction, Direction::Outbound);

    let conversations = inbox.list_conversations(1, &ConversationFilter::default()).await.unwrap();
    assert_eq!(conversations[0].message_count, 2);
    assert_eq!(
        conversations[0].last_message_preview.as_deref(),
        Some("it ships today")
    );
}

#[tokio::test]
async fn events_follow_the_conversation_lifecycle() {
    let h = TestHarness::builder().with_mock_tenant(1).build().await.unwrap();
    let mut events = h.engine.subscribe();

    let body = webhook_body("evt-9", vec![inbound_text("in-9", "+15557654321", "hi")]);
    h.deliver_webhook(1, &body).await.unwrap();

    let first = events.recv().await.unwrap();
    let second = events.recv().await.unwrap();
    assert!(matches!(first, parley_engine::NotificationEvent::ConversationCreated { .. }));
    assert!(matches!(second, parley_engine::NotificationEvent::MessageReceived { .. }));
    assert_eq!(second.tenant_id(), 1);
}
