//! Reconciliation of ingested records against the store.
//!
//! Only unseen natural keys are inserted. Rows that already exist are left
//! exactly as they are, even when the upstream copy has changed.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::Result;
use crate::models::BillRecord;
use crate::storage::BillStore;

/// Outcome of reconciling one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Records in the incoming batch
    pub received: usize,
    /// Records newly stored
    pub inserted: usize,
    /// Records whose key was already stored
    pub already_known: usize,
    /// Records repeating a key seen earlier in the same batch
    pub duplicates_in_batch: usize,
}

/// Merge a batch into the store, returning what happened to it.
pub async fn reconcile(store: &dyn BillStore, records: &[BillRecord]) -> Result<ReconcileReport> {
    let mut report = ReconcileReport {
        received: records.len(),
        ..ReconcileReport::default()
    };

    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.key) {
            report.duplicates_in_batch += 1;
            continue;
        }

        if store.upsert_if_absent(record).await? {
            log::debug!("Stored new bill {}", record.key);
            report.inserted += 1;
        } else {
            report.already_known += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillKey, BillType};
    use crate::storage::SqliteBillStore;
    use crate::testing::record;

    #[tokio::test]
    async fn test_reconcile_twice_inserts_once() {
        let store = SqliteBillStore::open_in_memory().unwrap();
        let batch = vec![
            record(BillType::Hr, 100, "Cyber Act"),
            record(BillType::S, 200, "Cyber Defense Act"),
        ];

        let first = reconcile(&store, &batch).await.unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.already_known, 0);

        let second = reconcile(&store, &batch).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.already_known, 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.posted, 0);
    }

    #[tokio::test]
    async fn test_duplicates_within_batch_collapse() {
        let store = SqliteBillStore::open_in_memory().unwrap();
        let batch = vec![
            record(BillType::Hr, 100, "First copy"),
            record(BillType::Hr, 100, "Second copy"),
            record(BillType::S, 100, "Different chamber"),
        ];

        let report = reconcile(&store, &batch).await.unwrap();
        assert_eq!(report.received, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates_in_batch, 1);

        let bill = store
            .find(&BillKey::new(BillType::Hr, 100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bill.title, "First copy");
    }

    #[tokio::test]
    async fn test_order_does_not_change_stored_keys() {
        let batch = vec![
            record(BillType::Hr, 1, "A"),
            record(BillType::S, 2, "B"),
            record(BillType::Hres, 3, "C"),
        ];
        let mut reversed = batch.clone();
        reversed.reverse();

        let forward = SqliteBillStore::open_in_memory().unwrap();
        let backward = SqliteBillStore::open_in_memory().unwrap();
        reconcile(&forward, &batch).await.unwrap();
        reconcile(&backward, &reversed).await.unwrap();

        for r in &batch {
            assert!(forward.find(&r.key).await.unwrap().is_some());
            assert!(backward.find(&r.key).await.unwrap().is_some());
        }
        assert_eq!(
            forward.stats().await.unwrap(),
            backward.stats().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_existing_rows_keep_status() {
        let store = SqliteBillStore::open_in_memory().unwrap();
        let original = record(BillType::Hr, 100, "Cyber Act");
        reconcile(&store, std::slice::from_ref(&original))
            .await
            .unwrap();
        store
            .set_short_url(&original.key, "https://is.gd/x")
            .await
            .unwrap();
        store.mark_posted(&original.key).await.unwrap();

        let updated = record(BillType::Hr, 100, "Cyber Act (amended)");
        let report = reconcile(&store, &[updated]).await.unwrap();
        assert_eq!(report.already_known, 1);

        let bill = store.find(&original.key).await.unwrap().unwrap();
        assert!(bill.posted);
        assert_eq!(bill.short_url.as_deref(), Some("https://is.gd/x"));
        assert_eq!(bill.title, "Cyber Act");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = SqliteBillStore::open_in_memory().unwrap();
        let report = reconcile(&store, &[]).await.unwrap();
        assert_eq!(report, ReconcileReport::default());
    }
}
