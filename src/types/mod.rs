//! Identifier and error types shared by every storage module.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Opaque record identifier.
///
/// Either a stable server identifier or a locally generated client id. Ids are
/// unique within one [`crate::storage::RecordStore`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataId(String);

impl DataId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        DataId(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DataId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for DataId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DataId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataId {
    fn from(value: &str) -> Self {
        DataId(value.to_owned())
    }
}

impl From<String> for DataId {
    fn from(value: String) -> Self {
        DataId(value)
    }
}

impl From<&DataId> for DataId {
    fn from(value: &DataId) -> Self {
        value.clone()
    }
}

/// Precondition violations raised by store and writer operations.
///
/// Each variant describes a caller bug: the operation was invoked against a
/// record, field or shape that does not satisfy its contract. Operations check
/// their preconditions before mutating anything.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The target record is unknown or tombstoned.
    #[error("expected record `{id}` to exist before {op}")]
    RecordMissing {
        /// Record the operation targeted.
        id: DataId,
        /// Operation that needed the record.
        op: &'static str,
    },
    /// A referenced record does not exist.
    #[error("expected linked record `{id}` to exist before writing field `{field}` on `{parent}`")]
    LinkedRecordMissing {
        /// Record holding the link.
        parent: DataId,
        /// Missing link target.
        id: DataId,
        /// Linked field key.
        field: String,
    },
    /// A stored field does not have the shape the read expects.
    #[error("expected field `{field}` of record `{id}` to hold {expected}")]
    MalformedField {
        /// Record holding the field.
        id: DataId,
        /// Field key.
        field: String,
        /// Shape the operation required.
        expected: &'static str,
    },
    /// An edge record lacks its cursor or node link.
    #[error("edge `{id}` is malformed: {reason}")]
    MalformedEdge {
        /// Edge record.
        id: DataId,
        /// What the edge lacks.
        reason: &'static str,
    },
    /// A node root call was used without its identifying argument.
    #[error("argument to root call `{storage_key}` cannot be absent")]
    RootCallArgumentMissing {
        /// Node root call storage key.
        storage_key: String,
    },
    /// A client id record was created without a provenance path.
    #[error("client record `{id}` requires a path to the record")]
    ClientRecordPathMissing {
        /// Client record id.
        id: DataId,
    },
    /// Ranges are server-truth structures and cannot be written optimistically.
    #[error("cannot create a queued range on `{id}` during an optimistic write")]
    OptimisticRange {
        /// Connection record.
        id: DataId,
    },
    /// A committed range update targeted a connection without a range.
    #[error("connection `{id}` has no range")]
    RangeMissing {
        /// Connection record.
        id: DataId,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
