use crate::cli::StoreArgs;
use dataspace_core::{DataBlock, DataSpace, JsonlDataSpace, StoreConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

pub struct OpenStore {
    pub config: StoreConfig,
    pub dataspace: Arc<JsonlDataSpace>,
}

impl OpenStore {
    pub fn last_generation(&self, taskmanager_id: &str) -> u64 {
        self.dataspace
            .last_generation_id(taskmanager_id)
            .unwrap_or_else(|e| exit_with(format!("failed to query generations: {e}")))
    }

    /// Block on `generation` (or the latest one), carrying its stored keys.
    pub fn resume(&self, taskmanager_id: &str, generation: Option<u64>) -> DataBlock {
        let generation = generation.unwrap_or_else(|| self.last_generation(taskmanager_id));
        if generation == 0 {
            exit_with(format!("no generations stored for {taskmanager_id}"));
        }
        let keys = self.dataspace.memory().keys_of(taskmanager_id, generation);
        DataBlock::resume(self.dataspace.clone(), taskmanager_id, generation, keys)
    }
}

pub fn open_store_or_exit(args: &StoreArgs) -> OpenStore {
    let config = match &args.store_config {
        Some(path) => StoreConfig::load(path)
            .unwrap_or_else(|e| exit_with(format!("failed to load {path}: {e}"))),
        None => StoreConfig {
            path: PathBuf::from(&args.store),
            ..StoreConfig::default()
        },
    };
    let dataspace = config.open_dataspace().unwrap_or_else(|e| {
        exit_with(format!("failed to open {}: {e}", config.path.display()))
    });
    OpenStore {
        config,
        dataspace: Arc::new(dataspace),
    }
}

pub fn parse_entry_or_exit(entry: &str) -> (String, Value) {
    let Some((key, raw)) = entry.split_once('=') else {
        exit_with(format!("entry `{entry}` is not KEY=JSON"));
    };
    if key.is_empty() {
        exit_with(format!("entry `{entry}` has an empty key"));
    }
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|e| exit_with(format!("entry `{key}`: invalid JSON: {e}")));
    (key.to_string(), value)
}

pub fn print_json(payload: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(payload).expect("json serialization")
    );
}

pub fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}
