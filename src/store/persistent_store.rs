use crate::errors::NormalizeError;
use crate::store::record_store::RecordStore;
use crate::utils::types::{OwnerKind, OwnerRecord, RecordId};
use async_trait::async_trait;
use fjall::{Keyspace, KeyspaceCreateOptions, PersistMode};
use log::debug;
use std::path::Path;
use tokio::task::spawn_blocking;

const RECORDS_KEYSPACE: &str = "records";

/// Expecting a catalog record to be well under 1kb, keep a few thousand hot
const DB_CACHE_SIZE: u64 = 4 * 1024 * 1024;

/// Custom key layout so lsm-tree ordering matches primary key ordering.
///
/// `{kind}/` then big-endian id. The trailing slash keeps `Event/` from
/// prefix-matching `EventGallery/`.
fn kind_prefix(kind: OwnerKind) -> Vec<u8> {
    format!("{}/", kind).into_bytes()
}

fn record_key(kind: OwnerKind, id: RecordId) -> Vec<u8> {
    let mut key = kind_prefix(kind);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn storage_err(err: impl std::fmt::Display) -> NormalizeError {
    NormalizeError::persistence(err.to_string())
}

fn decode_record(bytes: &[u8]) -> Result<OwnerRecord, NormalizeError> {
    postcard::from_bytes(bytes).map_err(|err| storage_err(format!("corrupted record: {}", err)))
}

/// Record store on top of an on-disk lsm-tree
pub struct PersistentRecordStore {
    db: fjall::Database,
    records: Keyspace,
}

impl PersistentRecordStore {
    pub fn open(db_path: &Path) -> Result<Self, NormalizeError> {
        let db = fjall::Database::builder(db_path)
            .cache_size(DB_CACHE_SIZE)
            .open()
            .map_err(storage_err)?;
        let records = db
            .keyspace(RECORDS_KEYSPACE, KeyspaceCreateOptions::default)
            .map_err(storage_err)?;

        Ok(PersistentRecordStore { db, records })
    }

    /// Flush journal to disk, so a finished run survives a power loss
    pub fn persist(&self) -> Result<(), NormalizeError> {
        debug!("Flushing records to disk");
        self.db.persist(PersistMode::SyncAll).map_err(storage_err)
    }
}

#[async_trait]
impl RecordStore for PersistentRecordStore {
    async fn list(&self, kind: OwnerKind) -> Result<Vec<OwnerRecord>, NormalizeError> {
        let keyspace = self.records.clone();
        let prefix = kind_prefix(kind);

        spawn_blocking(move || {
            let mut records = Vec::new();
            for item in keyspace.prefix(prefix) {
                let (_, value) = item.into_inner().map_err(storage_err)?;
                records.push(decode_record(value.as_ref())?);
            }
            Ok::<_, NormalizeError>(records)
        })
        .await
        .map_err(storage_err)?
    }

    async fn get(
        &self,
        kind: OwnerKind,
        id: RecordId,
    ) -> Result<Option<OwnerRecord>, NormalizeError> {
        let keyspace = self.records.clone();
        let key = record_key(kind, id);

        let value = spawn_blocking(move || keyspace.get(key))
            .await
            .map_err(storage_err)?
            .map_err(storage_err)?;

        match value {
            None => Ok(None),
            Some(value) => decode_record(value.as_ref()).map(Some),
        }
    }

    async fn save(&self, record: &OwnerRecord) -> Result<(), NormalizeError> {
        let keyspace = self.records.clone();
        let key = record_key(record.kind, record.id);
        let value = postcard::to_stdvec(record).map_err(storage_err)?;

        spawn_blocking(move || keyspace.insert(key, value))
            .await
            .map_err(storage_err)?
            .map_err(storage_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_numeric_id() {
        assert!(record_key(OwnerKind::Course, 2) < record_key(OwnerKind::Course, 10));
        assert!(record_key(OwnerKind::Course, 255) < record_key(OwnerKind::Course, 256));
        assert!(
            !record_key(OwnerKind::EventGallery, 1).starts_with(&kind_prefix(OwnerKind::Event))
        );
    }

    #[tokio::test]
    async fn lists_records_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistentRecordStore::open(&dir.path().join("records")).unwrap();
        for id in [300, 2, 17] {
            let record = OwnerRecord::new(OwnerKind::Gallery, id)
                .with_image("img", format!("gallery_photos/{}.jpg", id));
            store.save(&record).await.unwrap();
        }
        store
            .save(&OwnerRecord::new(OwnerKind::Event, 1).with_label("Open day"))
            .await
            .unwrap();
        store.persist().unwrap();

        let ids: Vec<RecordId> = store
            .list(OwnerKind::Gallery)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2, 17, 300]);

        let event = store.get(OwnerKind::Event, 1).await.unwrap().unwrap();
        assert_eq!(event.label.as_deref(), Some("Open day"));
        assert!(store.get(OwnerKind::Event, 2).await.unwrap().is_none());
        assert!(
            store
                .list(OwnerKind::EventGallery)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
