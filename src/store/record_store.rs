use crate::errors::NormalizeError;
use crate::utils::types::{OwnerKind, OwnerRecord, RecordId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Repository of catalog records owning images
#[async_trait]
pub trait RecordStore {
    /// All records of `kind`, in ascending id order
    async fn list(&self, kind: OwnerKind) -> Result<Vec<OwnerRecord>, NormalizeError>;

    async fn get(
        &self,
        kind: OwnerKind,
        id: RecordId,
    ) -> Result<Option<OwnerRecord>, NormalizeError>;

    /// Insert or overwrite the record under its (kind, id)
    async fn save(&self, record: &OwnerRecord) -> Result<(), NormalizeError>;
}

/// Inmemory record store
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<(OwnerKind, RecordId), OwnerRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(&self, kind: OwnerKind) -> Result<Vec<OwnerRecord>, NormalizeError> {
        let records = self.records.read().await;
        Ok(records
            .range((kind, RecordId::MIN)..=(kind, RecordId::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get(
        &self,
        kind: OwnerKind,
        id: RecordId,
    ) -> Result<Option<OwnerRecord>, NormalizeError> {
        Ok(self.records.read().await.get(&(kind, id)).cloned())
    }

    async fn save(&self, record: &OwnerRecord) -> Result<(), NormalizeError> {
        self.records
            .write()
            .await
            .insert((record.kind, record.id), record.clone());
        Ok(())
    }
}
