// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation queries.

use parley_core::ParleyError;
use parley_core::types::{
    ConversationFilter, ConversationKey, ConversationPatch, CustomerProfile, Source,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};

use crate::database::{Database, map_tr_err};
use crate::models::{CONVERSATION_COLUMNS, Conversation, conversation_from_row};

/// Find a conversation by natural key.
pub async fn find_by_key(
    db: &Database,
    tenant_id: i64,
    key: &ConversationKey,
) -> Result<Option<Conversation>, ParleyError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| match key {
            ConversationKey::Phone {
                customer_address,
                business_address,
            } => conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 AND customer_address = ?2
                           AND business_address = ?3 AND source = 'provider'"
                    ),
                    params![tenant_id, customer_address, business_address],
                    conversation_from_row,
                )
                .optional(),
            ConversationKey::Widget { session_id } => conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE tenant_id = ?1 AND session_id = ?2 AND source = 'widget'"
                    ),
                    params![tenant_id, session_id],
                    conversation_from_row,
                )
                .optional(),
        })
        .await
        .map_err(map_tr_err)
}

/// Find a conversation by id within a tenant.
pub async fn get(
    db: &Database,
    tenant_id: i64,
    id: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE tenant_id = ?1 AND id = ?2"
                ),
                params![tenant_id, id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a conversation unless its natural key is taken.
///
/// The partial unique indexes arbitrate concurrent creators; the loser sees
/// `Ok(false)` and re-reads.
pub async fn insert(db: &Database, conv: &Conversation) -> Result<bool, ParleyError> {
    let conv = conv.clone();
    let tags = serde_json::to_string(&conv.tags).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO conversations (id, tenant_id, customer_address, business_address,
                     source, session_id, status, priority, unread_count, message_count,
                     last_message_preview, last_message_at, last_message_sender, last_event_at,
                     assigned_agent_id, tags, notes, customer_name, customer_avatar_url,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21)
                 ON CONFLICT DO NOTHING",
                params![
                    conv.id,
                    conv.tenant_id,
                    conv.customer_address,
                    conv.business_address,
                    conv.source.to_string(),
                    conv.session_id,
                    conv.status.to_string(),
                    conv.priority.to_string(),
                    conv.unread_count,
                    conv.message_count,
                    conv.last_message_preview,
                    conv.last_message_at,
                    conv.last_message_sender.map(|d| d.to_string()),
                    conv.last_event_at,
                    conv.assigned_agent_id,
                    tags,
                    conv.notes,
                    conv.customer_name,
                    conv.customer_avatar_url,
                    conv.created_at,
                    conv.updated_at,
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations, most recently active first.
pub async fn list(
    db: &Database,
    tenant_id: i64,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>, ParleyError> {
    let mut sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE tenant_id = ?");
    let mut args: Vec<Value> = vec![Value::Integer(tenant_id)];

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        args.push(Value::Text(status.to_string()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        sql.push_str(
            " AND (customer_address LIKE ? OR customer_name LIKE ? OR last_message_preview LIKE ?)",
        );
        let pattern = format!("%{search}%");
        for _ in 0..3 {
            args.push(Value::Text(pattern.clone()));
        }
    }
    sql.push_str(" ORDER BY COALESCE(last_message_at, created_at) DESC, id ASC LIMIT ? OFFSET ?");
    args.push(Value::Integer(i64::from(filter.limit)));
    args.push(Value::Integer(i64::from(filter.offset)));

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), conversation_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply an agent patch and return the updated row.
pub async fn update(
    db: &Database,
    tenant_id: i64,
    id: &str,
    patch: &ConversationPatch,
    updated_at: &str,
) -> Result<Option<Conversation>, ParleyError> {
    let mut sets = vec!["updated_at = ?"];
    let mut args: Vec<Value> = vec![Value::Text(updated_at.to_string())];

    if let Some(status) = patch.status {
        sets.push("status = ?");
        args.push(Value::Text(status.to_string()));
    }
    if let Some(priority) = patch.priority {
        sets.push("priority = ?");
        args.push(Value::Text(priority.to_string()));
    }
    if let Some(agent) = patch.assigned_agent_id {
        sets.push("assigned_agent_id = ?");
        args.push(agent.map_or(Value::Null, Value::Integer));
    }
    if let Some(tags) = &patch.tags {
        let tags = serde_json::to_string(tags).map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        })?;
        sets.push("tags = ?");
        args.push(Value::Text(tags));
    }
    if let Some(notes) = &patch.notes {
        sets.push("notes = ?");
        args.push(Value::Text(notes.clone()));
    }

    let sql = format!(
        "UPDATE conversations SET {} WHERE tenant_id = ? AND id = ?",
        sets.join(", ")
    );
    args.push(Value::Integer(tenant_id));
    args.push(Value::Text(id.to_string()));
    let id = id.to_string();

    db.connection()
        .call(move |conn| {
            if conn.execute(&sql, params_from_iter(args))? == 0 {
                return Ok(None);
            }
            conn.query_row(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations
                     WHERE tenant_id = ?1 AND id = ?2"
                ),
                params![tenant_id, id],
                conversation_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Record the latest provider event time.
pub async fn touch_last_event(
    db: &Database,
    tenant_id: i64,
    id: &str,
    at: &str,
) -> Result<(), ParleyError> {
    let (id, at) = (id.to_string(), at.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET last_event_at = ?3
                 WHERE tenant_id = ?1 AND id = ?2
                   AND (last_event_at IS NULL OR last_event_at < ?3)",
                params![tenant_id, id, at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Store enriched profile fields, keeping existing values for `None`.
pub async fn update_profile(
    db: &Database,
    tenant_id: i64,
    id: &str,
    profile: &CustomerProfile,
    updated_at: &str,
) -> Result<(), ParleyError> {
    let id = id.to_string();
    let profile = profile.clone();
    let updated_at = updated_at.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations
                 SET customer_name = COALESCE(?3, customer_name),
                     customer_avatar_url = COALESCE(?4, customer_avatar_url),
                     updated_at = ?5
                 WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id, profile.name, profile.avatar_url, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Move a widget conversation to a new session id.
///
/// Returns `false` if the conversation is unknown or the new session already
/// has its own conversation.
pub async fn rebind_session(
    db: &Database,
    tenant_id: i64,
    id: &str,
    session_id: &str,
    updated_at: &str,
) -> Result<bool, ParleyError> {
    let (id, session_id, updated_at) = (id.to_string(), session_id.to_string(), updated_at.to_string());
    let widget = Source::Widget.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE OR IGNORE conversations
                 SET session_id = ?3, customer_address = ?3, updated_at = ?4
                 WHERE tenant_id = ?1 AND id = ?2 AND source = ?5",
                params![tenant_id, id, session_id, updated_at, widget],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Zero the unread counter and stamp unread inbound messages.
pub async fn mark_read(
    db: &Database,
    tenant_id: i64,
    id: &str,
    at: &str,
) -> Result<(), ParleyError> {
    let (id, at) = (id.to_string(), at.to_string());
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE conversations SET unread_count = 0, updated_at = ?3
                 WHERE tenant_id = ?1 AND id = ?2",
                params![tenant_id, id, at],
            )?;
            tx.execute(
                "UPDATE messages SET read_at = ?3
                 WHERE tenant_id = ?1 AND conversation_id = ?2
                   AND direction = 'inbound' AND read_at IS NULL",
                params![tenant_id, id, at],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{ConversationStatus, Priority};
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn phone_key(customer: &str) -> ConversationKey {
        ConversationKey::Phone {
            customer_address: customer.into(),
            business_address: "+15550000000".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_find_by_key() {
        let (db, _dir) = setup().await;
        let conv = Conversation::new(1, &phone_key("+15551112222"));
        assert!(insert(&db, &conv).await.unwrap());

        let found = find_by_key(&db, 1, &phone_key("+15551112222"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, conv.id);
        assert_eq!(found.status, ConversationStatus::Active);
        assert!(find_by_key(&db, 2, &phone_key("+15551112222")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_natural_key_is_rejected() {
        let (db, _dir) = setup().await;
        assert!(insert(&db, &Conversation::new(1, &phone_key("+1555"))).await.unwrap());
        assert!(!insert(&db, &Conversation::new(1, &phone_key("+1555"))).await.unwrap());
        let widget = ConversationKey::Widget {
            session_id: "s1".into(),
        };
        assert!(insert(&db, &Conversation::new(1, &widget)).await.unwrap());
        assert!(!insert(&db, &Conversation::new(1, &widget)).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_create_exactly_one_row() {
        let dir = tempdir().unwrap();
        let db = Arc::new(
            Database::open(dir.path().join("race.db").to_str().unwrap())
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..16 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                insert(&db, &Conversation::new(7, &phone_key("+15559990000")))
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        let all = list(&db, 7, &ConversationFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_search() {
        let (db, _dir) = setup().await;
        let a = Conversation::new(1, &phone_key("+15551110001"));
        let mut b = Conversation::new(1, &phone_key("+15551110002"));
        b.customer_name = Some("Dana".into());
        insert(&db, &a).await.unwrap();
        insert(&db, &b).await.unwrap();
        let patch = ConversationPatch {
            status: Some(ConversationStatus::Closed),
            ..Default::default()
        };
        update(&db, 1, &a.id, &patch, "2026-01-01T00:00:00.000Z")
            .await
            .unwrap();

        let closed = list(
            &db,
            1,
            &ConversationFilter {
                status: Some(ConversationStatus::Closed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, a.id);

        let search = list(
            &db,
            1,
            &ConversationFilter {
                search: Some("dan".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].id, b.id);
    }

    #[tokio::test]
    async fn update_applies_only_given_fields() {
        let (db, _dir) = setup().await;
        let conv = Conversation::new(1, &phone_key("+1555"));
        insert(&db, &conv).await.unwrap();

        let patch = ConversationPatch {
            priority: Some(Priority::Urgent),
            assigned_agent_id: Some(Some(12)),
            tags: Some(vec!["vip".into(), "billing".into()]),
            ..Default::default()
        };
        let updated = update(&db, 1, &conv.id, &patch, "2026-02-01T00:00:00.000Z")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.priority, Priority::Urgent);
        assert_eq!(updated.assigned_agent_id, Some(12));
        assert_eq!(updated.tags, vec!["vip", "billing"]);
        assert_eq!(updated.status, ConversationStatus::Active);

        let unassign = ConversationPatch {
            assigned_agent_id: Some(None),
            ..Default::default()
        };
        let updated = update(&db, 1, &conv.id, &unassign, "2026-02-01T00:00:01.000Z")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.assigned_agent_id, None);
        assert_eq!(updated.tags, vec!["vip", "billing"]);

        assert!(update(&db, 1, "missing", &patch, "2026-02-01T00:00:00.000Z")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rebind_moves_widget_session() {
        let (db, _dir) = setup().await;
        let old = Conversation::new(
            1,
            &ConversationKey::Widget {
                session_id: "old".into(),
            },
        );
        let other = Conversation::new(
            1,
            &ConversationKey::Widget {
                session_id: "taken".into(),
            },
        );
        insert(&db, &old).await.unwrap();
        insert(&db, &other).await.unwrap();

        assert!(rebind_session(&db, 1, &old.id, "new", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap());
        let found = find_by_key(
            &db,
            1,
            &ConversationKey::Widget {
                session_id: "new".into(),
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(found.id, old.id);

        assert!(!rebind_session(&db, 1, &old.id, "taken", "2026-01-01T00:00:00.000Z")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn profile_update_keeps_existing_fields() {
        let (db, _dir) = setup().await;
        let conv = Conversation::new(1, &phone_key("+1555"));
        insert(&db, &conv).await.unwrap();
        let now = "2026-01-01T00:00:00.000Z";
        update_profile(
            &db,
            1,
            &conv.id,
            &CustomerProfile {
                name: Some("Ann".into()),
                avatar_url: Some("https://a/img.png".into()),
            },
            now,
        )
        .await
        .unwrap();
        update_profile(
            &db,
            1,
            &conv.id,
            &CustomerProfile {
                name: Some("Ann B".into()),
                avatar_url: None,
            },
            now,
        )
        .await
        .unwrap();
        let found = get(&db, 1, &conv.id).await.unwrap().unwrap();
        assert_eq!(found.customer_name.as_deref(), Some("Ann B"));
        assert_eq!(found.customer_avatar_url.as_deref(), Some("https://a/img.png"));
    }
}
