use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit, print_json};
use serde_json::json;

pub fn run(store: StoreArgs, key: String, full: bool) {
    let opened = open_store_or_exit(&store);
    let block = opened.resume(&store.taskmanager, store.generation);

    let value = block
        .get_value(&key)
        .unwrap_or_else(|e| exit_with(format!("failed to get {key}: {e}")));
    if !full {
        print_json(&value);
        return;
    }

    let header = block.get_header(&key).unwrap_or_else(|e| exit_with(e));
    let metadata = block.get_metadata(&key).unwrap_or_else(|e| exit_with(e));
    print_json(&json!({
        "key": key,
        "generationId": block.generation_id(),
        "value": value,
        "header": header,
        "metadata": metadata,
    }));
}
