//! In-memory `DataSpace`.
//!
//! Rows live in one ordered map behind a read/write lock, so iteration is
//! deterministic (task manager, then generation, then key).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::dataspace::{DataProductRow, DataSpace, HeaderRow, MetadataRow, RowKey};
use crate::error::BackendError;
use crate::header::Header;
use crate::metadata::Metadata;

/// One persisted data product: value, header and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub product: DataProductRow,
    pub header: HeaderRow,
    pub metadata: MetadataRow,
}

impl StoredRow {
    fn build(
        row_key: &RowKey,
        stored_value: &str,
        header: &Header,
        metadata: &Metadata,
    ) -> Self {
        Self {
            product: DataProductRow {
                taskmanager_id: row_key.taskmanager_id.clone(),
                generation_id: row_key.generation_id,
                key: row_key.key.clone(),
                value: stored_value.to_string(),
            },
            header: HeaderRow::from_header(row_key.generation_id, &row_key.key, header),
            metadata: MetadataRow::from_metadata(row_key.generation_id, &row_key.key, metadata),
        }
    }

    pub fn row_key(&self) -> RowKey {
        RowKey::new(
            &self.product.taskmanager_id,
            self.product.generation_id,
            &self.product.key,
        )
    }

    fn moved_to(&self, generation_id: u64) -> Self {
        let mut row = self.clone();
        row.product.generation_id = generation_id;
        row.header.generation_id = generation_id;
        row.metadata.generation_id = generation_id;
        row
    }
}

/// Process-local dataspace holding every row in memory.
#[derive(Debug, Default)]
pub struct MemoryDataSpace {
    rows: RwLock<BTreeMap<RowKey, StoredRow>>,
}

impl MemoryDataSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataspace from existing rows; later duplicates win.
    pub fn from_rows(rows: impl IntoIterator<Item = StoredRow>) -> Self {
        let index = rows.into_iter().map(|row| (row.row_key(), row)).collect();
        Self {
            rows: RwLock::new(index),
        }
    }

    /// All rows in deterministic order.
    pub fn rows(&self) -> Vec<StoredRow> {
        self.rows.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Swap in the rows of `other`.
    pub(crate) fn replace_with(&self, other: MemoryDataSpace) {
        *self.rows.write() = other.rows.into_inner();
    }

    /// Distinct generation ids stored for `taskmanager_id`, ascending.
    pub fn generations(&self, taskmanager_id: &str) -> Vec<u64> {
        let mut generations: Vec<u64> = self
            .rows
            .read()
            .keys()
            .filter(|row_key| row_key.taskmanager_id == taskmanager_id)
            .map(|row_key| row_key.generation_id)
            .collect();
        generations.dedup();
        generations
    }

    /// Keys stored for one generation, in key order.
    pub fn keys_of(&self, taskmanager_id: &str, generation_id: u64) -> Vec<String> {
        self.rows
            .read()
            .keys()
            .filter(|row_key| {
                row_key.taskmanager_id == taskmanager_id && row_key.generation_id == generation_id
            })
            .map(|row_key| row_key.key.clone())
            .collect()
    }

    fn with_row<T>(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
        read: impl FnOnce(&StoredRow) -> T,
    ) -> Result<T, BackendError> {
        let row_key = RowKey::new(taskmanager_id, generation_id, key);
        self.rows
            .read()
            .get(&row_key)
            .map(read)
            .ok_or_else(|| row_key.not_found())
    }
}

impl DataSpace for MemoryDataSpace {
    fn last_generation_id(&self, taskmanager_id: &str) -> Result<u64, BackendError> {
        Ok(self
            .rows
            .read()
            .keys()
            .filter(|row_key| row_key.taskmanager_id == taskmanager_id)
            .map(|row_key| row_key.generation_id)
            .max()
            .unwrap_or(0))
    }

    fn insert(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
        stored_value: &str,
        header: &Header,
        metadata: &Metadata,
    ) -> Result<(), BackendError> {
        let row_key = RowKey::new(taskmanager_id, generation_id, key);
        let mut rows = self.rows.write();
        if rows.contains_key(&row_key) {
            return Err(row_key.already_exists());
        }
        let row = StoredRow::build(&row_key, stored_value, header, metadata);
        rows.insert(row_key, row);
        debug!(taskmanager_id, generation_id, key, "inserted data product");
        Ok(())
    }

    fn update(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
        stored_value: &str,
        header: &Header,
        metadata: &Metadata,
    ) -> Result<(), BackendError> {
        let row_key = RowKey::new(taskmanager_id, generation_id, key);
        let mut rows = self.rows.write();
        let Some(slot) = rows.get_mut(&row_key) else {
            return Err(row_key.not_found());
        };
        *slot = StoredRow::build(&row_key, stored_value, header, metadata);
        debug!(taskmanager_id, generation_id, key, "updated data product");
        Ok(())
    }

    fn get_dataproduct(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<DataProductRow, BackendError> {
        self.with_row(taskmanager_id, generation_id, key, |row| row.product.clone())
    }

    fn get_header(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<HeaderRow, BackendError> {
        self.with_row(taskmanager_id, generation_id, key, |row| row.header.clone())
    }

    fn get_metadata(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<MetadataRow, BackendError> {
        self.with_row(taskmanager_id, generation_id, key, |row| row.metadata.clone())
    }

    fn duplicate_datablock(
        &self,
        taskmanager_id: &str,
        from_generation_id: u64,
        to_generation_id: u64,
    ) -> Result<(), BackendError> {
        let mut rows = self.rows.write();
        let copies: Vec<StoredRow> = rows
            .iter()
            .filter(|(row_key, _)| {
                row_key.taskmanager_id == taskmanager_id
                    && row_key.generation_id == from_generation_id
            })
            .map(|(_, row)| row.moved_to(to_generation_id))
            .collect();
        let copied = copies.len();
        for row in copies {
            rows.insert(row.row_key(), row);
        }
        debug!(
            taskmanager_id,
            from_generation_id, to_generation_id, copied, "duplicated generation"
        );
        Ok(())
    }
}
