//! # dataspace-core
//!
//! Generation-versioned data blocks.
//!
//! This crate provides:
//! - `Header` and `Metadata` (provenance and lifecycle of a data product)
//! - `StoredValue` (the envelope values are persisted in)
//! - the `DataSpace` persistence contract and two implementations
//!   (`MemoryDataSpace`, `JsonlDataSpace`)
//! - `DataBlock`, which records one task manager's data products per
//!   generation and forks generations with `duplicate`
//!
//! ## Data model
//!
//! ```text
//! DataBlock (task manager, generation, keys)
//!     │  put / get / duplicate / mark_expired
//!     ▼
//! DataSpace rows keyed by (taskmanager_id, generation_id, key)
//!     value text + HeaderRow + MetadataRow
//! ```

pub mod config;
pub mod datablock;
pub mod dataspace;
pub mod error;
pub mod header;
pub mod jsonl;
pub mod memory;
pub mod metadata;
pub mod value;

pub use config::{DEFAULT_STORE_PATH, StoreConfig};
pub use datablock::{DataBlock, DataBlockSnapshot};
pub use dataspace::{DataProductRow, DataSpace, HeaderRow, MetadataRow, RowKey};
pub use error::{BackendError, DataSpaceError, Result};
pub use header::{DEFAULT_CREATOR, DEFAULT_DATA_LIFETIME_SECS, Header, HeaderBuilder};
pub use jsonl::{JsonlDataSpace, read_rows, read_rows_from_path, write_rows, write_rows_to_path};
pub use memory::{MemoryDataSpace, StoredRow};
pub use metadata::{Metadata, MetadataBuilder, MetadataState};
pub use value::StoredValue;
