use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit, print_json};
use serde_json::json;

pub fn run(store: StoreArgs, json_output: bool) {
    let opened = open_store_or_exit(&store);
    let block = opened.resume(&store.taskmanager, store.generation);
    let previous = block
        .duplicate()
        .unwrap_or_else(|e| exit_with(format!("failed to duplicate: {e}")));

    if json_output {
        print_json(&json!({
            "action": "duplicate",
            "taskmanagerId": block.taskmanager_id(),
            "fromGenerationId": previous.generation_id(),
            "toGenerationId": block.generation_id(),
            "keys": block.keys(),
        }));
    } else {
        println!(
            "dataspace duplicate\n  Task manager: {}\n  Generation: {} -> {}\n  Keys: {}",
            block.taskmanager_id(),
            previous.generation_id(),
            block.generation_id(),
            block.keys().len()
        );
    }
}
