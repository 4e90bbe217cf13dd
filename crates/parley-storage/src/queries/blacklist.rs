// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-tenant outbound blacklist.

use parley_core::ParleyError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Whether `address` is blacklisted for the tenant.
pub async fn contains(db: &Database, tenant_id: i64, address: &str) -> Result<bool, ParleyError> {
    let address = address.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blacklist WHERE tenant_id = ?1 AND address = ?2)",
                params![tenant_id, address],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Add or re-reason an address.
pub async fn add(
    db: &Database,
    tenant_id: i64,
    address: &str,
    reason: Option<&str>,
    created_at: &str,
) -> Result<(), ParleyError> {
    let (address, created_at) = (address.to_string(), created_at.to_string());
    let reason = reason.map(String::from);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO blacklist (tenant_id, address, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (tenant_id, address) DO UPDATE SET reason = excluded.reason",
                params![tenant_id, address, reason, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove an address. Returns `false` if it was not listed.
pub async fn remove(db: &Database, tenant_id: i64, address: &str) -> Result<bool, ParleyError> {
    let address = address.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM blacklist WHERE tenant_id = ?1 AND address = ?2",
                params![tenant_id, address],
            )?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn add_check_remove() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let now = "2026-01-01T00:00:00.000Z";

        assert!(!contains(&db, 1, "+15550001111").await.unwrap());
        add(&db, 1, "+15550001111", Some("spam"), now).await.unwrap();
        add(&db, 1, "+15550001111", Some("abuse"), now).await.unwrap();
        assert!(contains(&db, 1, "+15550001111").await.unwrap());
        assert!(!contains(&db, 2, "+15550001111").await.unwrap());

        assert!(remove(&db, 1, "+15550001111").await.unwrap());
        assert!(!remove(&db, 1, "+15550001111").await.unwrap());
        assert!(!contains(&db, 1, "+15550001111").await.unwrap());
    }
}
