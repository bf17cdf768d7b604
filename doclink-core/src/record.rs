//! Conversions between physical engine records and the logical records callers see.
//!
//! Outbound, [`to_logical`] exposes the surrogate key under the model's identifier field
//! and strips the engine's key and metadata fields. Inbound, [`sanitize`] removes from an
//! update payload every field a caller must not be able to overwrite.

use bson::Document;

use crate::engine::{KEY_FIELD, META_FIELD, RESERVED_PREFIX};

/// Shapes one physical record into a logical record.
pub fn to_logical(mut record: Document, id_field: &str) -> Document {
    if let Some(key) = record.remove(KEY_FIELD) {
        record.insert(id_field, key);
    }
    record.remove(META_FIELD);
    record
}

/// Shapes a sequence of physical records, preserving order and cardinality.
pub fn to_logical_all(records: Vec<Document>, id_field: &str) -> Vec<Document> {
    records
        .into_iter()
        .map(|record| to_logical(record, id_field))
        .collect()
}

/// Returns `true` if a payload may not write `field`.
pub fn is_protected_field(field: &str, id_field: &str) -> bool {
    field == META_FIELD || field == id_field || field.starts_with(RESERVED_PREFIX)
}

/// Removes the identifier, metadata and engine-reserved fields from an update payload.
///
/// Only top-level keys are inspected; nested documents are kept as they are.
pub fn sanitize(mut payload: Document, id_field: &str) -> Document {
    let protected = payload
        .keys()
        .filter(|key| is_protected_field(key, id_field))
        .cloned()
        .collect::<Vec<_>>();

    for key in protected {
        payload.remove(&key);
    }

    payload
}

/// Shallow-merges `patch` into `record`: patched fields are overwritten, others are kept.
pub fn merge(mut record: Document, patch: &Document) -> Document {
    for (key, value) in patch {
        record.insert(key.clone(), value.clone());
    }
    record
}

/// Replaces every field of `record` except the key and metadata with the fields of `patch`.
pub fn replace_fields(record: Document, patch: &Document) -> Document {
    let kept = record
        .into_iter()
        .filter(|(key, _)| key == KEY_FIELD || key == META_FIELD)
        .collect::<Document>();

    merge(kept, patch)
}
