use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit, parse_entry_or_exit, print_json};
use dataspace_core::{DataBlock, Metadata};
use serde_json::json;
use tracing::info;

pub struct Args {
    pub store: StoreArgs,
    pub entries: Vec<String>,
    pub creator: Option<String>,
    pub schema_id: Option<i64>,
    pub state: String,
    pub json: bool,
}

pub fn run(args: Args) {
    let entries: Vec<_> = args.entries.iter().map(|e| parse_entry_or_exit(e)).collect();
    let opened = open_store_or_exit(&args.store);
    let taskmanager_id = args.store.taskmanager.as_str();

    // An explicit generation is resumed so its stored keys take the update path.
    let block = match args.store.generation {
        Some(generation) => opened.resume(taskmanager_id, Some(generation)),
        None => DataBlock::new(opened.dataspace.clone(), Some(taskmanager_id), None)
            .unwrap_or_else(|e| exit_with(format!("failed to open data block: {e}"))),
    };

    let mut header = opened
        .config
        .header_builder(taskmanager_id)
        .unwrap_or_else(|e| exit_with(e));
    if let Some(creator) = &args.creator {
        header = header.creator(creator.clone());
    }
    if let Some(schema_id) = args.schema_id {
        header = header.schema_id(schema_id);
    }
    let header = header.build().unwrap_or_else(|e| exit_with(e));

    let mut written = Vec::new();
    for (key, value) in &entries {
        let metadata = Metadata::builder(taskmanager_id)
            .state_name(args.state.clone())
            .generation_id(block.generation_id())
            .build()
            .unwrap_or_else(|e| exit_with(e));
        let updated = block.contains(key);
        block
            .put(key, value, &header, Some(metadata))
            .unwrap_or_else(|e| exit_with(format!("failed to put {key}: {e}")));
        written.push(json!({ "key": key, "action": if updated { "update" } else { "insert" } }));
    }
    info!(taskmanager_id, generation = block.generation_id(), entries = written.len(), "put entries");

    if args.json {
        print_json(&json!({
            "action": "put",
            "storePath": opened.config.path.display().to_string(),
            "taskmanagerId": taskmanager_id,
            "generationId": block.generation_id(),
            "entries": written,
        }));
    } else {
        println!(
            "dataspace put\n  Task manager: {}\n  Generation: {}\n  Entries: {}\n  Path: {}",
            taskmanager_id,
            block.generation_id(),
            entries.len(),
            opened.config.path.display()
        );
    }
}
