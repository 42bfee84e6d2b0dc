//! In-memory trust store.
//!
//! Holds the records a run treats as already verified: publisher accounts and
//! snap declarations. Records are keyed by type and primary key. Signature
//! checking is outside the simulation, so [`TrustStore::verify_chain`]
//! always succeeds.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::decl::DeclError;

/// Kind of record held in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    Account,
    SnapDeclaration,
}

impl RecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Account => "account",
            RecordType::SnapDeclaration => "snap-declaration",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    record_type: RecordType,
    key: String,
    body: Value,
    digest: String,
}

impl Record {
    pub fn new(record_type: RecordType, key: impl Into<String>, body: Value) -> Self {
        let digest = body_digest(&body);
        Record {
            record_type,
            key: key.into(),
            body,
            digest,
        }
    }

    /// An account record for a publisher id.
    pub fn account(publisher_id: &str) -> Self {
        Record::new(
            RecordType::Account,
            publisher_id,
            serde_json::json!({ "account-id": publisher_id }),
        )
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// SHA-256 of the canonical JSON body, hex encoded.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// `serde_json` maps are ordered, so `to_string` is canonical.
fn body_digest(body: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of a store lookup. A missing record is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a Record),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn found(self) -> Option<&'a Record> {
        match self {
            Lookup::Found(record) => Some(record),
            Lookup::NotFound => None,
        }
    }
}

/// Record store for one run.
#[derive(Debug, Default)]
pub struct TrustStore {
    records: BTreeMap<(RecordType, String), Record>,
}

impl TrustStore {
    pub fn new() -> Self {
        TrustStore::default()
    }

    /// Add a record.
    ///
    /// Adding a record identical to one already stored is a no-op; a
    /// different record under the same key is a conflict.
    pub fn add(&mut self, record: Record) -> Result<(), DeclError> {
        let key = (record.record_type, record.key.clone());
        if let Some(existing) = self.records.get(&key) {
            if existing.digest == record.digest {
                return Ok(());
            }
            return Err(DeclError::ConflictingRecord {
                record_type: record.record_type.to_string(),
                key: record.key,
            });
        }
        self.records.insert(key, record);
        Ok(())
    }

    /// Find a record by type and primary key.
    pub fn find(&self, record_type: RecordType, key: &str) -> Lookup<'_> {
        match self.records.get(&(record_type, key.to_string())) {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        }
    }

    /// Verify the signing chain of a record. Always succeeds.
    pub fn verify_chain(&self, _record: &Record) -> Result<(), DeclError> {
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
