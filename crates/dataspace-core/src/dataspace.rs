//! The persistence contract a `DataBlock` depends on.
//!
//! A `DataSpace` physically stores rows keyed by
//! `(taskmanager_id, generation_id, key)`. Each row carries the stored value
//! text, the header and the metadata of one data product. The data block
//! layer never assumes anything about how rows are laid out beyond the row
//! types in this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{BackendError, Result};
use crate::header::Header;
use crate::metadata::Metadata;

/// Row identity within a dataspace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub taskmanager_id: String,
    pub generation_id: u64,
    pub key: String,
}

impl RowKey {
    pub fn new(taskmanager_id: &str, generation_id: u64, key: &str) -> Self {
        Self {
            taskmanager_id: taskmanager_id.to_string(),
            generation_id,
            key: key.to_string(),
        }
    }

    pub fn not_found(&self) -> BackendError {
        BackendError::NotFound {
            taskmanager_id: self.taskmanager_id.clone(),
            generation_id: self.generation_id,
            key: self.key.clone(),
        }
    }

    pub fn already_exists(&self) -> BackendError {
        BackendError::AlreadyExists {
            taskmanager_id: self.taskmanager_id.clone(),
            generation_id: self.generation_id,
            key: self.key.clone(),
        }
    }
}

/// Stored value row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProductRow {
    pub taskmanager_id: String,
    pub generation_id: u64,
    pub key: String,
    /// Textual form of the `StoredValue` envelope.
    pub value: String,
}

/// Header row, fields in `Header` constructor order after the row identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRow {
    pub taskmanager_id: String,
    pub generation_id: u64,
    pub key: String,
    pub create_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub scheduled_create_time: DateTime<Utc>,
    pub creator: String,
    pub schema_id: Option<i64>,
}

impl HeaderRow {
    pub fn from_header(generation_id: u64, key: &str, header: &Header) -> Self {
        Self {
            taskmanager_id: header.taskmanager_id().to_string(),
            generation_id,
            key: key.to_string(),
            create_time: header.create_time(),
            expiration_time: header.expiration_time(),
            scheduled_create_time: header.scheduled_create_time(),
            creator: header.creator().to_string(),
            schema_id: header.schema_id(),
        }
    }

    pub fn to_header(&self) -> Result<Header> {
        let mut builder = Header::builder(self.taskmanager_id.clone())
            .create_time(self.create_time)
            .expiration_time(self.expiration_time)
            .scheduled_create_time(self.scheduled_create_time)
            .creator(self.creator.clone());
        if let Some(schema_id) = self.schema_id {
            builder = builder.schema_id(schema_id);
        }
        builder.build()
    }
}

/// Metadata row. `state` is kept by name so a corrupt row fails on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub taskmanager_id: String,
    pub generation_id: u64,
    pub key: String,
    pub state: String,
    pub generation_time: DateTime<Utc>,
    pub missed_update_count: u64,
}

impl MetadataRow {
    pub fn from_metadata(generation_id: u64, key: &str, metadata: &Metadata) -> Self {
        Self {
            taskmanager_id: metadata.taskmanager_id().to_string(),
            generation_id,
            key: key.to_string(),
            state: metadata.state().as_str().to_string(),
            generation_time: metadata.generation_time(),
            missed_update_count: metadata.missed_update_count(),
        }
    }

    /// Rebuild the Metadata; its generation is the row's generation.
    pub fn to_metadata(&self) -> Result<Metadata> {
        Metadata::builder(self.taskmanager_id.clone())
            .state_name(self.state.clone())
            .generation_id(self.generation_id)
            .generation_time(self.generation_time)
            .missed_update_count(self.missed_update_count)
            .restore()
    }
}

/// Persistence operations consumed by `DataBlock`.
///
/// Implementations are shared between many data blocks of one task manager
/// and must serialize conflicting writes themselves.
pub trait DataSpace: Debug + Send + Sync {
    /// Highest generation stored for `taskmanager_id`, 0 when none.
    fn last_generation_id(&self, taskmanager_id: &str) -> Result<u64, BackendError>;

    /// Insert a new row; fails with `AlreadyExists` if the key is present.
    fn insert(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
        stored_value: &str,
        header: &Header,
        metadata: &Metadata,
    ) -> Result<(), BackendError>;

    /// Replace an existing row; fails with `NotFound` if the key is absent.
    fn update(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
        stored_value: &str,
        header: &Header,
        metadata: &Metadata,
    ) -> Result<(), BackendError>;

    fn get_dataproduct(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<DataProductRow, BackendError>;

    fn get_header(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<HeaderRow, BackendError>;

    fn get_metadata(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<MetadataRow, BackendError>;

    /// Copy every row of `from_generation_id` into `to_generation_id`.
    fn duplicate_datablock(
        &self,
        taskmanager_id: &str,
        from_generation_id: u64,
        to_generation_id: u64,
    ) -> Result<(), BackendError>;
}
