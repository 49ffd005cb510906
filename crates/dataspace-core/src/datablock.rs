//! DataBlock: one task manager's data products for one generation.
//!
//! A block mediates every read, write and duplication through a shared
//! `DataSpace`. Its own bookkeeping (current generation and the keys written
//! through it) sits behind one mutex, held for the whole check-and-act
//! window of `put`, `duplicate` and `mark_expired`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dataspace::DataSpace;
use crate::error::{BackendError, DataSpaceError, Result};
use crate::header::Header;
use crate::metadata::Metadata;
use crate::value::StoredValue;

#[derive(Debug)]
struct BlockState {
    generation_id: u64,
    keys: Vec<String>,
}

/// Generation-scoped view of a task manager's data products.
#[derive(Debug)]
pub struct DataBlock {
    dataspace: Arc<dyn DataSpace>,
    taskmanager_id: String,
    state: Mutex<BlockState>,
}

/// Serializable rendering of a block and its current values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataBlockSnapshot {
    pub taskmanager_id: String,
    pub generation_id: u64,
    pub keys: Vec<String>,
    pub dataproducts: BTreeMap<String, Value>,
}

impl DataBlock {
    /// Bind a block to a task manager and generation.
    ///
    /// Without a task manager id a fresh one is generated; without a
    /// generation the block starts one past the last stored generation.
    pub fn new(
        dataspace: Arc<dyn DataSpace>,
        taskmanager_id: Option<&str>,
        generation_id: Option<u64>,
    ) -> Result<Self> {
        let taskmanager_id = match taskmanager_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string().to_uppercase(),
        };
        let generation_id = match generation_id {
            Some(id) => id,
            None => next_generation(&taskmanager_id, dataspace.last_generation_id(&taskmanager_id)?)?,
        };
        debug!(%taskmanager_id, generation_id, "opened data block");

        Ok(Self {
            dataspace,
            taskmanager_id,
            state: Mutex::new(BlockState {
                generation_id,
                keys: Vec::new(),
            }),
        })
    }

    /// Re-attach to a generation already in the dataspace, adopting `keys`
    /// as if they had been written through this block.
    pub fn resume(
        dataspace: Arc<dyn DataSpace>,
        taskmanager_id: &str,
        generation_id: u64,
        keys: Vec<String>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(&key) {
                unique.push(key);
            }
        }
        Self {
            dataspace,
            taskmanager_id: taskmanager_id.to_string(),
            state: Mutex::new(BlockState {
                generation_id,
                keys: unique,
            }),
        }
    }

    pub fn taskmanager_id(&self) -> &str {
        &self.taskmanager_id
    }

    pub fn generation_id(&self) -> u64 {
        self.state.lock().generation_id
    }

    /// Keys written through this block, in write order.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().keys.clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().keys.iter().any(|k| k == key)
    }

    pub fn dataspace(&self) -> &Arc<dyn DataSpace> {
        &self.dataspace
    }

    /// Default header owned by this block's task manager.
    pub fn new_header(&self) -> Result<Header> {
        Header::new(self.taskmanager_id.clone())
    }

    /// Store `value` under `key` in the current generation.
    ///
    /// A key already written through this block is routed to the backend's
    /// update path and keeps the header of its first write.
    pub fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        header: &Header,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let stored = StoredValue::encode(value)?.to_text()?;

        let mut state = self.state.lock();
        let generation_id = state.generation_id;
        let metadata = match metadata {
            Some(metadata) => metadata,
            None => Metadata::builder(self.taskmanager_id.clone())
                .generation_id(generation_id)
                .generation_time(Utc::now())
                .build()?,
        };

        if state.keys.iter().any(|k| k == key) {
            let first_header = self.stored_header(generation_id, key)?;
            self.dataspace
                .update(
                    &self.taskmanager_id,
                    generation_id,
                    key,
                    &stored,
                    &first_header,
                    &metadata,
                )
                .map_err(|e| self.backend_error(e))?;
            debug!(taskmanager_id = %self.taskmanager_id, generation_id, key, "updated key");
        } else {
            self.dataspace
                .insert(
                    &self.taskmanager_id,
                    generation_id,
                    key,
                    &stored,
                    header,
                    &metadata,
                )
                .map_err(|e| self.backend_error(e))?;
            state.keys.push(key.to_string());
            debug!(taskmanager_id = %self.taskmanager_id, generation_id, key, "inserted key");
        }
        Ok(())
    }

    /// Fetch the value stored under `key` in the current generation.
    ///
    /// Fails with `KeyNotFound` when absent and `ExpiredData` when the
    /// entry has expired.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.read(self.generation_id(), key, true)?.decode()
    }

    /// Like `get`, but yields `default` when the key is absent.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key) {
            Err(err) if err.is_key_not_found() => Ok(default),
            other => other,
        }
    }

    /// Untyped read of the value under `key`.
    pub fn get_value(&self, key: &str) -> Result<Value> {
        self.get(key)
    }

    pub fn get_header(&self, key: &str) -> Result<Header> {
        self.stored_header(self.generation_id(), key)
    }

    pub fn get_metadata(&self, key: &str) -> Result<Metadata> {
        self.stored_metadata(self.generation_id(), key)
    }

    /// Fork off the current generation.
    ///
    /// The backend copies the current generation's rows one generation
    /// forward and this block moves there. The returned block stays on the
    /// old generation with a copy of the key list.
    pub fn duplicate(&self) -> Result<DataBlock> {
        let mut state = self.state.lock();
        let from_generation_id = state.generation_id;
        let to_generation_id = next_generation(&self.taskmanager_id, from_generation_id)?;

        self.dataspace
            .duplicate_datablock(&self.taskmanager_id, from_generation_id, to_generation_id)?;
        state.generation_id = to_generation_id;
        info!(
            taskmanager_id = %self.taskmanager_id,
            from_generation_id,
            to_generation_id,
            keys = state.keys.len(),
            "duplicated data block"
        );

        Ok(DataBlock {
            dataspace: Arc::clone(&self.dataspace),
            taskmanager_id: self.taskmanager_id.clone(),
            state: Mutex::new(BlockState {
                generation_id: from_generation_id,
                keys: state.keys.clone(),
            }),
        })
    }

    /// Whether `key` (or, when `None`, any key of this block) has expired.
    pub fn is_expired(&self, key: Option<&str>) -> Result<bool> {
        let (generation_id, keys) = {
            let state = self.state.lock();
            (state.generation_id, state.keys.clone())
        };
        let now = Utc::now();

        match key {
            Some(key) => self.entry_expired(generation_id, key, now),
            None => {
                for key in &keys {
                    if self.entry_expired(generation_id, key, now)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Set the expiration time of every entry in the current generation.
    ///
    /// When `expiration_time` is not in the future the entries' metadata
    /// moves to `EXPIRED`.
    pub fn mark_expired(&self, expiration_time: DateTime<Utc>) -> Result<()> {
        let state = self.state.lock();
        let generation_id = state.generation_id;
        let expire_now = expiration_time <= Utc::now();

        for key in &state.keys {
            let product = self
                .dataspace
                .get_dataproduct(&self.taskmanager_id, generation_id, key)
                .map_err(|e| self.backend_error(e))?;
            let header = self
                .stored_header(generation_id, key)?
                .with_expiration_time(expiration_time);
            let mut metadata = self.stored_metadata(generation_id, key)?;
            if expire_now {
                metadata.expire();
            }
            self.dataspace
                .update(
                    &self.taskmanager_id,
                    generation_id,
                    key,
                    &product.value,
                    &header,
                    &metadata,
                )
                .map_err(|e| self.backend_error(e))?;
        }
        info!(
            taskmanager_id = %self.taskmanager_id,
            generation_id,
            %expiration_time,
            expired = expire_now,
            keys = state.keys.len(),
            "marked generation expiration"
        );
        Ok(())
    }

    /// Render this block with every value it holds, expired or not.
    pub fn snapshot(&self) -> Result<DataBlockSnapshot> {
        let (generation_id, keys) = {
            let state = self.state.lock();
            (state.generation_id, state.keys.clone())
        };
        let mut dataproducts = BTreeMap::new();
        for key in &keys {
            let value = self.read(generation_id, key, false)?.to_json()?;
            dataproducts.insert(key.clone(), value);
        }
        Ok(DataBlockSnapshot {
            taskmanager_id: self.taskmanager_id.clone(),
            generation_id,
            keys,
            dataproducts,
        })
    }

    fn read(&self, generation_id: u64, key: &str, check_fresh: bool) -> Result<StoredValue> {
        let row = self
            .dataspace
            .get_dataproduct(&self.taskmanager_id, generation_id, key)
            .map_err(|e| self.backend_error(e))?;
        if check_fresh {
            self.ensure_fresh(generation_id, key)?;
        }
        StoredValue::from_text(&row.value)
    }

    fn ensure_fresh(&self, generation_id: u64, key: &str) -> Result<()> {
        let header = self.stored_header(generation_id, key)?;
        let metadata = self.stored_metadata(generation_id, key)?;
        if metadata.is_expired() || header.is_expired_at(Utc::now()) {
            return Err(DataSpaceError::ExpiredData {
                key: key.to_string(),
                expiration_time: header.expiration_time(),
            });
        }
        Ok(())
    }

    fn entry_expired(&self, generation_id: u64, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let header = self.stored_header(generation_id, key)?;
        if header.is_expired_at(now) {
            return Ok(true);
        }
        Ok(self.stored_metadata(generation_id, key)?.is_expired())
    }

    fn stored_header(&self, generation_id: u64, key: &str) -> Result<Header> {
        self.dataspace
            .get_header(&self.taskmanager_id, generation_id, key)
            .map_err(|e| self.backend_error(e))?
            .to_header()
    }

    fn stored_metadata(&self, generation_id: u64, key: &str) -> Result<Metadata> {
        self.dataspace
            .get_metadata(&self.taskmanager_id, generation_id, key)
            .map_err(|e| self.backend_error(e))?
            .to_metadata()
    }

    fn backend_error(&self, err: BackendError) -> DataSpaceError {
        match err {
            BackendError::NotFound {
                taskmanager_id,
                generation_id,
                key,
            } => DataSpaceError::KeyNotFound {
                taskmanager_id,
                generation_id,
                key,
            },
            other => DataSpaceError::Backend(other),
        }
    }
}

fn next_generation(taskmanager_id: &str, generation_id: u64) -> Result<u64> {
    generation_id
        .checked_add(1)
        .ok_or_else(|| DataSpaceError::GenerationOverflow {
            taskmanager_id: taskmanager_id.to_string(),
            generation_id,
        })
}

impl fmt::Display for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "DataBlock(taskmanager_id={}, generation_id={}, keys=[{}])",
            self.taskmanager_id,
            state.generation_id,
            state.keys.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDataSpace;
    use chrono::Duration;
    use serde_json::json;

    fn block() -> (Arc<MemoryDataSpace>, DataBlock) {
        let space = Arc::new(MemoryDataSpace::new());
        let block = DataBlock::new(space.clone(), Some("tm-1"), None).expect("block");
        (space, block)
    }

    #[test]
    fn generation_starts_after_last_stored() {
        let space = Arc::new(MemoryDataSpace::new());
        let first = DataBlock::new(space.clone(), Some("tm-1"), None).expect("block");
        assert_eq!(first.generation_id(), 1);
        let header = first.new_header().expect("header");
        first.put("k", &json!({"a": 1}), &header, None).expect("put");

        let second = DataBlock::new(space, Some("tm-1"), None).expect("block");
        assert_eq!(second.generation_id(), 2);
    }

    #[test]
    fn missing_taskmanager_id_is_generated() {
        let space = Arc::new(MemoryDataSpace::new());
        let a = DataBlock::new(space.clone(), None, Some(1)).expect("block");
        let b = DataBlock::new(space, None, Some(1)).expect("block");
        assert_ne!(a.taskmanager_id(), b.taskmanager_id());
        assert_eq!(a.taskmanager_id(), a.taskmanager_id().to_uppercase());
        assert!(Uuid::parse_str(a.taskmanager_id()).is_ok());
    }

    #[test]
    fn put_synthesizes_new_metadata() {
        let (_, block) = block();
        let header = block.new_header().expect("header");
        block.put("k", &3.5_f64, &header, None).expect("put");

        let metadata = block.get_metadata("k").expect("metadata");
        assert_eq!(metadata.state(), crate::MetadataState::New);
        assert_eq!(metadata.generation_id(), Some(block.generation_id()));
        assert_eq!(metadata.missed_update_count(), 0);
        assert_eq!(metadata.taskmanager_id(), "tm-1");
    }

    #[test]
    fn update_keeps_first_header() {
        let (_, block) = block();
        let first = Header::builder("tm-1")
            .creator("first")
            .build()
            .expect("header");
        let second = Header::builder("tm-1")
            .creator("second")
            .build()
            .expect("header");

        block.put("k", &1_u32, &first, None).expect("insert");
        block.put("k", &2_u32, &second, None).expect("update");

        assert_eq!(block.get::<u32>("k").expect("get"), 2);
        assert_eq!(block.get_header("k").expect("header").creator(), "first");
        assert_eq!(block.keys(), vec!["k".to_string()]);
    }

    #[test]
    fn get_or_defaults_only_on_missing_key() {
        let (_, block) = block();
        assert_eq!(block.get_or("absent", 7_i32).expect("default"), 7);

        let header = block.new_header().expect("header");
        block.put("text", "hello", &header, None).expect("put");
        let err = block
            .get_or::<i32>("text", 0)
            .expect_err("decode failure must propagate");
        assert!(matches!(err, DataSpaceError::Serialization(_)));
    }

    #[test]
    fn expired_header_blocks_get_but_not_snapshot() {
        let (_, block) = block();
        let header = Header::builder("tm-1")
            .create_time(Utc::now() - Duration::hours(2))
            .lifetime(Duration::minutes(30))
            .build()
            .expect("header");
        block.put("stale", &json!({"v": 1}), &header, None).expect("put");

        assert!(matches!(
            block.get::<Value>("stale"),
            Err(DataSpaceError::ExpiredData { key, .. }) if key == "stale"
        ));
        assert!(block.is_expired(Some("stale")).expect("check"));

        let snapshot = block.snapshot().expect("snapshot");
        assert_eq!(snapshot.dataproducts["stale"], json!({"v": 1}));
    }

    #[test]
    fn mark_expired_in_future_only_moves_expiration() {
        let (_, block) = block();
        let header = block.new_header().expect("header");
        block.put("k", &json!({"v": 1}), &header, None).expect("put");

        let later = Utc::now() + Duration::days(1);
        block.mark_expired(later).expect("mark");

        assert_eq!(block.get_header("k").expect("header").expiration_time(), later);
        assert!(!block.get_metadata("k").expect("metadata").is_expired());
        assert!(!block.is_expired(None).expect("check"));
        assert_eq!(block.get::<Value>("k").expect("still readable"), json!({"v": 1}));
    }

    #[test]
    fn mark_expired_in_past_expires_generation() {
        let (_, block) = block();
        let header = block.new_header().expect("header");
        block.put("a", &1_u8, &header, None).expect("put");
        block.put("b", &2_u8, &header, None).expect("put");

        block
            .mark_expired(Utc::now() - Duration::seconds(1))
            .expect("mark");

        assert!(block.is_expired(None).expect("check"));
        for key in ["a", "b"] {
            assert!(block.get_metadata(key).expect("metadata").is_expired());
            assert!(matches!(
                block.get::<u8>(key),
                Err(DataSpaceError::ExpiredData { .. })
            ));
        }
    }

    #[test]
    fn nan_is_refused_before_anything_is_stored() {
        let (space, block) = block();
        let header = block.new_header().expect("header");
        let err = block.put("x", &f64::NAN, &header, None).expect_err("NaN must fail");
        assert!(matches!(err, DataSpaceError::Serialization(_)));
        assert!(space.is_empty());
        assert!(!block.contains("x"));
    }

    #[test]
    fn last_generation_has_no_successor() {
        let (space, block) = block();
        let header = block.new_header().expect("header");
        let last = DataBlock::new(space.clone(), Some("tm-1"), Some(u64::MAX)).expect("block");
        last.put("k", &1_u8, &header, None).expect("put");

        let err = last.duplicate().expect_err("duplicate past u64::MAX must fail");
        assert!(matches!(err, DataSpaceError::GenerationOverflow { generation_id: u64::MAX, .. }));
        assert_eq!(last.generation_id(), u64::MAX);

        let err = DataBlock::new(space, Some("tm-1"), None).expect_err("new past u64::MAX must fail");
        assert!(matches!(err, DataSpaceError::GenerationOverflow { .. }));
    }

    #[test]
    fn is_expired_without_keys_is_false() {
        let (_, block) = block();
        assert!(!block.is_expired(None).expect("check"));
    }

    #[test]
    fn is_expired_on_unknown_key_is_key_not_found() {
        let (_, block) = block();
        let err = block.is_expired(Some("nope")).expect_err("must fail");
        assert!(err.is_key_not_found());
    }

    #[test]
    fn resume_routes_existing_keys_to_update() {
        let (space, block) = block();
        let header = block.new_header().expect("header");
        block.put("k", &1_u8, &header, None).expect("put");

        let resumed = DataBlock::resume(
            space.clone(),
            "tm-1",
            block.generation_id(),
            space.keys_of("tm-1", block.generation_id()),
        );
        resumed.put("k", &9_u8, &header, None).expect("update");
        assert_eq!(resumed.keys(), vec!["k".to_string()]);
        assert_eq!(block.get::<u8>("k").expect("get"), 9);
    }

    #[test]
    fn display_lists_identity_and_keys() {
        let (_, block) = block();
        let header = block.new_header().expect("header");
        block.put("a", &1_u8, &header, None).expect("put");
        block.put("b", &2_u8, &header, None).expect("put");
        assert_eq!(
            block.to_string(),
            "DataBlock(taskmanager_id=tm-1, generation_id=1, keys=[a, b])"
        );
    }
}
