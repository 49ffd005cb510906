//! JSONL-backed `DataSpace`: one line per stored row.
//!
//! Rows are held in a `MemoryDataSpace` and the whole file is rewritten
//! after every mutation via temp file + rename, so a reader never sees a
//! half-written store. A mutation reaches memory only once its file write
//! has succeeded.

use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use crate::dataspace::{DataProductRow, DataSpace, HeaderRow, MetadataRow};
use crate::error::BackendError;
use crate::header::Header;
use crate::memory::{MemoryDataSpace, StoredRow};
use crate::metadata::Metadata;

/// Read rows from a JSONL reader. Blank lines and `#` comments are skipped.
pub fn read_rows(reader: impl BufRead) -> Result<Vec<StoredRow>, BackendError> {
    let mut rows = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| BackendError::Io(format!("line {}: {e}", line_no + 1)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row: StoredRow = serde_json::from_str(trimmed).map_err(|e| BackendError::Corrupt {
            line: line_no + 1,
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows to a JSONL writer.
pub fn write_rows(writer: &mut impl Write, rows: &[StoredRow]) -> Result<(), BackendError> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| BackendError::Io(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| BackendError::Io(e.to_string()))?;
    }
    Ok(())
}

/// Read rows from a JSONL file; a missing file is an empty store.
pub fn read_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<StoredRow>, BackendError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| BackendError::Io(format!("{}: {e}", path.display())))?;
    if std::str::from_utf8(&bytes).is_err() {
        return Err(BackendError::Corrupt {
            line: 0,
            message: format!("{}: contains non-UTF-8 byte sequence(s)", path.display()),
        });
    }
    read_rows(BufReader::new(bytes.as_slice()))
}

/// Atomically replace the JSONL file at `path` with `rows`.
pub fn write_rows_to_path(path: impl AsRef<Path>, rows: &[StoredRow]) -> Result<(), BackendError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| BackendError::Io(format!("{}: {e}", parent.display())))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), BackendError> {
        let io_err = |e: std::io::Error| BackendError::Io(format!("{}: {e}", tmp_path.display()));
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_rows(&mut writer, rows)?;
        writer.flush().map_err(io_err)?;
        let file = writer
            .into_inner()
            .map_err(|e| BackendError::Io(format!("{}: {e}", tmp_path.display())))?;
        file.sync_all().map_err(io_err)?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        BackendError::Io(format!(
            "{} -> {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir =
            File::open(parent).map_err(|e| BackendError::Io(format!("{}: {e}", parent.display())))?;
        dir.sync_all()
            .map_err(|e| BackendError::Io(format!("{}: {e}", parent.display())))?;
    }

    Ok(())
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

/// Dataspace persisted to a single JSONL file.
#[derive(Debug)]
pub struct JsonlDataSpace {
    path: PathBuf,
    rows: MemoryDataSpace,
    flush: Mutex<()>,
}

impl JsonlDataSpace {
    /// Hydrate from `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();
        let rows = read_rows_from_path(&path)?;
        info!(path = %path.display(), rows = rows.len(), "opened jsonl dataspace");
        Ok(Self {
            path,
            rows: MemoryDataSpace::from_rows(rows),
            flush: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// In-memory view of the hydrated rows.
    pub fn memory(&self) -> &MemoryDataSpace {
        &self.rows
    }

    fn mutate(
        &self,
        op: impl FnOnce(&MemoryDataSpace) -> Result<(), BackendError>,
    ) -> Result<(), BackendError> {
        let _guard = self.flush.lock();
        let staged = MemoryDataSpace::from_rows(self.rows.rows());
        op(&staged)?;
        let rows = staged.rows();
        write_rows_to_path(&self.path, &rows)?;
        self.rows.replace_with(staged);
        debug!(path = %self.path.display(), rows = rows.len(), "flushed jsonl dataspace");
        Ok(())
    }
}

impl DataSpace for JsonlDataSpace {
    fn last_generation_id(&self, taskmanager_id: &str) -> Result<u64, BackendError> {
        self.rows.last_generation_id(taskmanager_id)
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
        self.mutate(|rows| {
            rows.insert(
                taskmanager_id,
                generation_id,
                key,
                stored_value,
                header,
                metadata,
            )
        })
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
        self.mutate(|rows| {
            rows.update(
                taskmanager_id,
                generation_id,
                key,
                stored_value,
                header,
                metadata,
            )
        })
    }

    fn get_dataproduct(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<DataProductRow, BackendError> {
        self.rows.get_dataproduct(taskmanager_id, generation_id, key)
    }

    fn get_header(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<HeaderRow, BackendError> {
        self.rows.get_header(taskmanager_id, generation_id, key)
    }

    fn get_metadata(
        &self,
        taskmanager_id: &str,
        generation_id: u64,
        key: &str,
    ) -> Result<MetadataRow, BackendError> {
        self.rows.get_metadata(taskmanager_id, generation_id, key)
    }

    fn duplicate_datablock(
        &self,
        taskmanager_id: &str,
        from_generation_id: u64,
        to_generation_id: u64,
    ) -> Result<(), BackendError> {
        self.mutate(|rows| {
            rows.duplicate_datablock(taskmanager_id, from_generation_id, to_generation_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datablock::DataBlock;
    use crate::error::DataSpaceError;
    use std::sync::Arc;

    struct TempDirGuard {
        path: PathBuf,
    }

    impl TempDirGuard {
        fn new(prefix: &str) -> Self {
            let unique = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos();
            let path = std::env::temp_dir().join(format!(
                "dataspace-jsonl-{prefix}-{}-{unique}",
                std::process::id()
            ));
            fs::create_dir_all(&path).expect("temp dir should be created");
            Self { path }
        }
    }

    impl Drop for TempDirGuard {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn missing_file_opens_empty() {
        let tmp = TempDirGuard::new("missing");
        let space = JsonlDataSpace::open(tmp.path.join("rows.jsonl")).expect("open");
        assert!(space.memory().is_empty());
        assert_eq!(space.last_generation_id("tm").expect("query"), 0);
    }

    #[test]
    fn mutations_survive_reopen() {
        let tmp = TempDirGuard::new("reopen");
        let path = tmp.path.join("nested").join("rows.jsonl");
        let header = Header::new("tm").expect("header");
        let metadata = Metadata::new("tm", 1).expect("metadata");

        {
            let space = JsonlDataSpace::open(&path).expect("open");
            space
                .insert("tm", 1, "k", "{\"kind\":\"structured\",\"value\":{}}", &header, &metadata)
                .expect("insert");
            space.duplicate_datablock("tm", 1, 2).expect("duplicate");
        }

        let reopened = JsonlDataSpace::open(&path).expect("reopen");
        assert_eq!(reopened.memory().generations("tm"), vec![1, 2]);
        let header_row = reopened.get_header("tm", 2, "k").expect("header row");
        assert_eq!(header_row.to_header().expect("header"), header);
    }

    #[test]
    fn failed_flush_leaves_memory_untouched() {
        let tmp = TempDirGuard::new("failed-flush");
        let path = tmp.path.join("rows.jsonl");
        let space = Arc::new(JsonlDataSpace::open(&path).expect("open"));
        let block = DataBlock::new(space.clone(), Some("tm"), Some(1)).expect("block");
        let header = Header::new("tm").expect("header");

        // A directory in place of the store file makes the rename fail.
        fs::create_dir_all(&path).expect("blocking dir");
        let err = block.put("k", &1_u8, &header, None).expect_err("flush must fail");
        assert!(matches!(err, DataSpaceError::Backend(BackendError::Io(_))));
        assert!(space.memory().is_empty());
        assert!(block.keys().is_empty());

        fs::remove_dir_all(&path).expect("unblock");
        block.put("k", &1_u8, &header, None).expect("retry inserts");
        assert_eq!(block.get::<u8>("k").expect("get"), 1);
        assert_eq!(JsonlDataSpace::open(&path).expect("reopen").memory().len(), 1);
    }

    #[test]
    fn corrupt_line_is_reported_with_line_number() {
        let input = "\n# comment\nnot json\n";
        let err = read_rows(BufReader::new(input.as_bytes())).expect_err("must fail");
        assert!(matches!(err, BackendError::Corrupt { line: 3, .. }));
    }
}
