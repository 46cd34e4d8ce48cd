//! Object key derivation for uploaded audio.
//!
//! Key format: `{procedure}/{unique_id}_{file_name}`. Inside the bucket the
//! object lives under the access-level prefix: `{public_prefix}/{object_key}`.

use uuid::Uuid;

/// Derive the object key for one file.
///
/// Deterministic in its inputs; the caller supplies a fresh `unique_id` per file.
pub fn object_key(procedure: &str, unique_id: &Uuid, file_name: &str) -> String {
    format!("{}/{}_{}", procedure, unique_id, file_name)
}

/// Bucket-relative path of an object key under the access-level prefix
pub fn bucket_key(public_prefix: &str, object_key: &str) -> String {
    format!("{}/{}", public_prefix, object_key)
}

/// Keys derived for one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    /// Record identifier, also embedded in the object key
    pub id: Uuid,
    /// Key the object is written under
    pub object_key: String,
    /// Path of the object relative to the bucket root
    pub bucket_key: String,
}

impl DerivedKeys {
    /// Draw a fresh id and derive both keys for a file
    pub fn generate(procedure: &str, file_name: &str, public_prefix: &str) -> Self {
        Self::with_id(Uuid::new_v4(), procedure, file_name, public_prefix)
    }

    pub fn with_id(id: Uuid, procedure: &str, file_name: &str, public_prefix: &str) -> Self {
        let object_key = object_key(procedure, &id, file_name);
        let bucket_key = bucket_key(public_prefix, &object_key);

        Self {
            id,
            object_key,
            bucket_key,
        }
    }
}
