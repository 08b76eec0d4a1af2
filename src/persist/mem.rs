use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use tracing::trace;

use crate::{JobflowError, Result, ShareLock, extract::Fields, model::WriteOperation};

use super::{StorageSink, WriteOutcome, WriteRequest, WriteResult};

/// In-memory storage sink. Rows are untyped field maps grouped by table.
#[derive(Clone, Default)]
pub struct MemStorage {
    tables: ShareLock<HashMap<String, Vec<Fields>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Snapshot of all rows of a table, in insertion order.
    pub fn rows(
        &self,
        table: &str,
    ) -> Vec<Fields> {
        self.read().get(table).cloned().unwrap_or_default()
    }

    /// Finds the first row whose values match every key field.
    pub fn find(
        &self,
        table: &str,
        key: &Fields,
    ) -> Option<Fields> {
        self.read().get(table).and_then(|rows| rows.iter().find(|row| matches_key(row, key)).cloned())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Fields>>> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(
        &self,
        request: &WriteRequest,
    ) -> Result<WriteResult> {
        let mut tables = self.tables.write().map_err(|e| JobflowError::Persistence(e.to_string()))?;
        let rows = tables.entry(request.table.clone()).or_default();

        match request.operation {
            WriteOperation::Insert => {
                rows.push(request.fields.clone());
                Ok(inserted())
            }
            WriteOperation::Update => {
                let updated = update_matching(rows, request);
                if updated == 0 {
                    return Err(JobflowError::RecordNotFound {
                        table: request.table.clone(),
                        key: describe_key(&request.key),
                    });
                }
                Ok(WriteResult {
                    outcome: WriteOutcome::Updated,
                    rows_affected: updated,
                })
            }
            WriteOperation::Upsert => {
                let updated = update_matching(rows, request);
                if updated > 0 {
                    return Ok(WriteResult {
                        outcome: WriteOutcome::Updated,
                        rows_affected: updated,
                    });
                }
                rows.push(new_row(request));
                Ok(inserted())
            }
            WriteOperation::Replace => {
                rows.retain(|row| !matches_key(row, &request.key));
                rows.push(new_row(request));
                Ok(WriteResult {
                    outcome: WriteOutcome::Replaced,
                    rows_affected: 1,
                })
            }
        }
    }
}

#[async_trait]
impl StorageSink for MemStorage {
    async fn write(
        &self,
        request: &WriteRequest,
    ) -> Result<WriteResult> {
        trace!("mem_storage::write({}, {})", request.table, request.operation.as_ref());
        if request.operation.is_keyed() && request.key.is_empty() {
            return Err(JobflowError::Persistence(format!("{} on '{}' requires a key", request.operation.as_ref(), request.table)));
        }
        self.apply(request)
    }
}

fn matches_key(
    row: &Fields,
    key: &Fields,
) -> bool {
    key.iter().all(|(k, v)| row.get(k) == Some(v))
}

fn update_matching(
    rows: &mut [Fields],
    request: &WriteRequest,
) -> usize {
    let mut updated = 0;
    for row in rows.iter_mut().filter(|row| matches_key(row, &request.key)) {
        row.extend(request.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        updated += 1;
    }
    updated
}

fn new_row(request: &WriteRequest) -> Fields {
    let mut row = request.fields.clone();
    row.extend(request.key.iter().map(|(k, v)| (k.clone(), v.clone())));
    row
}

fn inserted() -> WriteResult {
    WriteResult {
        outcome: WriteOutcome::Inserted,
        rows_affected: 1,
    }
}

fn describe_key(key: &Fields) -> String {
    key.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::DatabaseSpec, persist::PersistenceMapper};

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn spec(operation: WriteOperation) -> DatabaseSpec {
        DatabaseSpec {
            table: "devices".to_string(),
            operation,
            key_fields: vec!["ip_address".to_string()],
            ..Default::default()
        }
    }

    async fn write(
        storage: &MemStorage,
        operation: WriteOperation,
        pairs: &[(&str, &str)],
        target: &str,
    ) -> Result<WriteResult> {
        let request = PersistenceMapper::apply(&fields(pairs), &spec(operation), target);
        storage.write(&request).await
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let storage = MemStorage::new();

        let result = write(&storage, WriteOperation::Upsert, &[("status", "online")], "10.0.0.1").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Inserted);
        assert_eq!(storage.rows("devices"), vec![fields(&[("ip_address", "10.0.0.1"), ("status", "online")])]);

        let result = write(&storage, WriteOperation::Upsert, &[("status", "offline"), ("rtt", "1.2")], "10.0.0.1").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Updated);
        let rows = storage.rows("devices");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("status").unwrap(), "offline");
        assert_eq!(rows[0].get("rtt").unwrap(), "1.2");
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_promoted() {
        let storage = MemStorage::new();
        let err = write(&storage, WriteOperation::Update, &[("status", "online")], "10.0.0.1").await.unwrap_err();
        assert!(matches!(err, JobflowError::RecordNotFound { .. }));
        assert!(storage.rows("devices").is_empty());
    }

    #[tokio::test]
    async fn test_update_existing_row() {
        let storage = MemStorage::new();
        write(&storage, WriteOperation::Upsert, &[("status", "online"), ("vendor", "cisco")], "10.0.0.1").await.unwrap();
        let result = write(&storage, WriteOperation::Update, &[("status", "offline")], "10.0.0.1").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Updated);

        let row = storage.find("devices", &fields(&[("ip_address", "10.0.0.1")])).unwrap();
        assert_eq!(row.get("status").unwrap(), "offline");
        assert_eq!(row.get("vendor").unwrap(), "cisco");
    }

    #[tokio::test]
    async fn test_replace_drops_old_columns() {
        let storage = MemStorage::new();
        write(&storage, WriteOperation::Upsert, &[("status", "online"), ("vendor", "cisco")], "10.0.0.1").await.unwrap();
        write(&storage, WriteOperation::Upsert, &[("status", "online")], "10.0.0.2").await.unwrap();

        let result = write(&storage, WriteOperation::Replace, &[("status", "offline")], "10.0.0.1").await.unwrap();
        assert_eq!(result.outcome, WriteOutcome::Replaced);

        let rows = storage.rows("devices");
        assert_eq!(rows.len(), 2);
        let row = storage.find("devices", &fields(&[("ip_address", "10.0.0.1")])).unwrap();
        assert!(!row.contains_key("vendor"));
    }

    #[tokio::test]
    async fn test_insert_always_appends() {
        let storage = MemStorage::new();
        write(&storage, WriteOperation::Insert, &[("event", "seen")], "10.0.0.1").await.unwrap();
        write(&storage, WriteOperation::Insert, &[("event", "seen")], "10.0.0.1").await.unwrap();
        assert_eq!(storage.rows("devices").len(), 2);
    }

    #[tokio::test]
    async fn test_keyed_write_without_key_is_rejected() {
        let storage = MemStorage::new();
        let request = WriteRequest {
            table: "devices".to_string(),
            operation: WriteOperation::Upsert,
            key: Fields::new(),
            fields: fields(&[("a", "1")]),
            field_types: HashMap::new(),
        };
        assert!(matches!(storage.write(&request).await, Err(JobflowError::Persistence(_))));
    }
}
