// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event ledger.

use parley_core::ParleyError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::WebhookEvent;

/// Insert-if-absent on `(tenant_id, event_id)`.
///
/// Returns `false` when the event was already recorded. Events without an id
/// are always inserted.
pub async fn record(db: &Database, event: &WebhookEvent) -> Result<bool, ParleyError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO webhook_events (tenant_id, provider, event_id, event_type, payload, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT DO NOTHING",
                params![
                    event.tenant_id,
                    event.provider,
                    event.event_id,
                    event.event_type,
                    event.payload,
                    event.received_at,
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(tenant_id: i64, event_id: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            tenant_id,
            provider: "twilio".into(),
            event_id: event_id.map(String::from),
            event_type: Some("message".into()),
            payload: "{}".into(),
            received_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn same_event_id_is_recorded_once_per_tenant() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(record(&db, &event(1, Some("evt-1"))).await.unwrap());
        assert!(!record(&db, &event(1, Some("evt-1"))).await.unwrap());
        assert!(record(&db, &event(2, Some("evt-1"))).await.unwrap());
    }

    #[tokio::test]
    async fn events_without_id_are_always_recorded() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();

        assert!(record(&db, &event(1, None)).await.unwrap());
        assert!(record(&db, &event(1, None)).await.unwrap());
    }
}
