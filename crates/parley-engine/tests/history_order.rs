// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History order does not depend on insertion order.

use parley_core::types::{ConversationKey, MessageType, Source};
use parley_core::{Direction, Message, MessageStatus};
use parley_test_utils::TestHarness;
use proptest::prelude::*;

fn message(conversation_id: &str, n: usize, second: u32) -> Message {
    Message {
        id: format!("msg-{n}"),
        tenant_id: 1,
        conversation_id: conversation_id.to_string(),
        provider: "mock".into(),
        external_id: Some(format!("ext-{n}")),
        from_address: "+15551234567".into(),
        to_address: "+15550000000".into(),
        body: format!("body {n}"),
        message_type: MessageType::Text,
        media_url: None,
        media_content_type: None,
        direction: Direction::Inbound,
        status: MessageStatus::Received,
        source: Source::Provider,
        session_id: None,
        timestamp: format!("2026-03-01T10:{:02}:{:02}.000Z", second / 60, second % 60),
        read_at: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn history_is_ascending_for_any_insertion_order(
        seconds in proptest::collection::vec(0u32..3600, 1..12)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let timestamps = runtime.block_on(async {
            let h = TestHarness::builder().with_mock_tenant(1).build().await.unwrap();
            let resolved = h
                .engine
                .resolver()
                .resolve(
                    1,
                    &ConversationKey::Phone {
                        customer_address: "+15551234567".into(),
                        business_address: "+15550000000".into(),
                    },
                )
                .await
                .unwrap();
            let id = resolved.conversation.id;
            for (n, second) in seconds.iter().enumerate() {
                h.store.append_message(&message(&id, n, *second)).await.unwrap();
            }
            h.engine
                .inbox()
                .message_history(1, &id)
                .await
                .unwrap()
                .into_iter()
                .map(|m| m.timestamp)
                .collect::<Vec<_>>()
        });

        prop_assert_eq!(timestamps.len(), seconds.len());
        let mut sorted = timestamps.clone();
        sorted.sort();
        prop_assert_eq!(timestamps, sorted);
    }
}
