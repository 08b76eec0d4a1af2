use crate::{
    extract::Fields,
    model::{DatabaseSpec, WriteOperation},
};

use super::WriteRequest;

pub struct PersistenceMapper;

impl PersistenceMapper {
    /// Describes the write for one target's extracted fields.
    ///
    /// Each key field takes the extracted value of the same name when there is
    /// one, otherwise the target itself (e.g. `ip_address`). Inserts carry no key.
    pub fn apply(
        fields: &Fields,
        database: &DatabaseSpec,
        target: &str,
    ) -> WriteRequest {
        let key = match database.operation {
            WriteOperation::Insert => Fields::new(),
            WriteOperation::Update | WriteOperation::Upsert | WriteOperation::Replace => database
                .key_fields
                .iter()
                .map(|k| (k.clone(), fields.get(k).cloned().unwrap_or_else(|| target.to_string())))
                .collect(),
        };

        WriteRequest {
            table: database.table.clone(),
            operation: database.operation,
            key,
            fields: fields.clone(),
            field_types: database.field_types.clone(),
        }
    }
}
