// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion against a real store and the mock provider.

use http::HeaderMap;
use parley_core::types::{ContactProfile, InboundEvent, MessageStatus, StatusUpdate};
use parley_core::{AuthFailure, ParleyError};
use parley_engine::{NotificationEvent, SendRequest, WebhookOutcome};
use parley_test_utils::{TestHarness, inbound_text, webhook_body};

const CUSTOMER: &str = "+15551234567";

async fn harness() -> TestHarness {
    TestHarness::builder().with_mock_tenant(1).build().await.unwrap()
}

#[tokio::test]
async fn duplicate_delivery_is_acknowledged_once() {
    let h = harness().await;
    let body = webhook_body("evt-1", vec![inbound_text("m-1", CUSTOMER, "hello")]);

    let first = h.deliver_webhook(1, &body).await.unwrap();
    let second = h.deliver_webhook(1, &body).await.unwrap();

    assert_eq!(first, WebhookOutcome::Processed { messages: 1, statuses: 0 });
    assert_eq!(second, WebhookOutcome::Duplicate);
    assert_eq!(h.all_messages(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn redelivered_message_under_new_event_id_is_not_duplicated() {
    let h = harness().await;
    let msg = inbound_text("m-1", CUSTOMER, "hello");
    h.deliver_webhook(1, &webhook_body("evt-1", vec![msg.clone()]))
        .await
        .unwrap();
    let again = h
        .deliver_webhook(1, &webhook_body("evt-2", vec![msg]))
        .await
        .unwrap();
    assert_eq!(again, WebhookOutcome::Processed { messages: 0, statuses: 0 });

    let conversations = h
        .engine
        .inbox()
        .list_conversations(1, &Default::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].message_count, 1);
    assert_eq!(conversations[0].unread_count, 1);
}

#[tokio::test]
async fn bad_token_is_rejected_before_anything_is_stored() {
    let h = harness().await;
    let body = webhook_body("evt-1", vec![inbound_text("m-1", CUSTOMER, "hello")]);
    let err = h
        .engine
        .webhooks()
        .ingest(1, "mock", "not-the-token", &HeaderMap::new(), &body)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Auth(AuthFailure::Token)));

    // The event id was never logged, so an authentic retry goes through.
    let outcome = h.deliver_webhook(1, &body).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed { messages: 1, statuses: 0 });
}

#[tokio::test]
async fn missing_header_is_rejected() {
    let h = harness().await;
    let err = h
        .engine
        .webhooks()
        .ingest(1, "mock", "token-1", &HeaderMap::new(), b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Auth(AuthFailure::Header)));
}

#[tokio::test]
async fn unconfigured_tenant_or_provider_is_not_found() {
    let h = harness().await;
    let err = h.deliver_webhook(99, b"{}").await.unwrap_err();
    assert!(matches!(err, ParleyError::Configuration(_)));

    let err = h
        .engine
        .webhooks()
        .ingest(1, "twilio", "token-1", &HeaderMap::new(), b"{}")
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Configuration(_)));
}

#[tokio::test]
async fn undecodable_body_is_acknowledged() {
    let h = harness().await;
    let outcome = h.deliver_webhook(1, b"<xml/>").await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Undecodable);
    assert!(h.all_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn status_callbacks_advance_sent_messages() {
    let h = harness().await;
    let sent = h
        .engine
        .outbound()
        .send(1, &SendRequest::text(CUSTOMER, "your order shipped"))
        .await
        .unwrap();
    let external_id = sent.external_id.clone().unwrap();

    let status = |id: &str, status| InboundEvent {
        event_id: Some(id.to_string()),
        statuses: vec![StatusUpdate {
            external_id: external_id.clone(),
            status,
            timestamp: sent.timestamp.clone(),
        }],
        ..Default::default()
    };

    let delivered = serde_json::to_vec(&status("s-1", MessageStatus::Delivered)).unwrap();
    let outcome = h.deliver_webhook(1, &delivered).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed { messages: 0, statuses: 1 });

    // A late "sent" callback must not move the status backwards.
    let late = serde_json::to_vec(&status("s-2", MessageStatus::Sent)).unwrap();
    let outcome = h.deliver_webhook(1, &late).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed { messages: 0, statuses: 0 });

    let stored = h.all_messages(1).await.unwrap();
    assert_eq!(stored[0].status, MessageStatus::Delivered);
}

#[tokio::test]
async fn contact_names_update_the_conversation() {
    let h = harness().await;
    let event = InboundEvent {
        event_id: Some("evt-1".into()),
        messages: vec![inbound_text("m-1", CUSTOMER, "hi")],
        contacts: vec![ContactProfile {
            address: CUSTOMER.into(),
            name: "Ada".into(),
        }],
        ..Default::default()
    };
    h.deliver_webhook(1, &serde_json::to_vec(&event).unwrap())
        .await
        .unwrap();

    let conversations = h
        .engine
        .inbox()
        .list_conversations(1, &Default::default())
        .await
        .unwrap();
    assert_eq!(conversations[0].customer_name.as_deref(), Some("Ada"));
    assert!(conversations[0].last_event_at.is_some());
}

#[tokio::test]
async fn new_threads_and_messages_are_announced() {
    let h = harness().await;
    let mut events = h.engine.subscribe();
    h.deliver_webhook(1, &webhook_body("evt-1", vec![inbound_text("m-1", CUSTOMER, "hi")]))
        .await
        .unwrap();

    match events.recv().await.unwrap() {
        NotificationEvent::ConversationCreated { conversation } => {
            assert_eq!(conversation.customer_address, CUSTOMER);
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match events.recv().await.unwrap() {
        NotificationEvent::MessageReceived { message } => assert_eq!(message.body, "hi"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn national_numbers_thread_with_canonical_ones() {
    let h = harness().await;
    h.deliver_webhook(1, &webhook_body("evt-1", vec![inbound_text("m-1", "(555) 123-4567", "a")]))
        .await
        .unwrap();
    h.deliver_webhook(1, &webhook_body("evt-2", vec![inbound_text("m-2", CUSTOMER, "b")]))
        .await
        .unwrap();
    let conversations = h
        .engine
        .inbox()
        .list_conversations(1, &Default::default())
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].message_count, 2);
}
