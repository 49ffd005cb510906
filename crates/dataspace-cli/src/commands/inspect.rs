use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit, print_json};
use serde_json::json;

pub fn run(store: StoreArgs, json_output: bool) {
    let opened = open_store_or_exit(&store);
    let block = opened.resume(&store.taskmanager, store.generation);
    let snapshot = block
        .snapshot()
        .unwrap_or_else(|e| exit_with(format!("failed to read block: {e}")));

    let mut entries = Vec::new();
    for key in &snapshot.keys {
        let header = block.get_header(key).unwrap_or_else(|e| exit_with(e));
        let metadata = block.get_metadata(key).unwrap_or_else(|e| exit_with(e));
        let expired = block.is_expired(Some(key)).unwrap_or_else(|e| exit_with(e));
        entries.push((key.clone(), header, metadata, expired));
    }

    if json_output {
        let entries: Vec<_> = entries
            .iter()
            .map(|(key, header, metadata, expired)| {
                json!({
                    "key": key,
                    "value": snapshot.dataproducts.get(key),
                    "header": header,
                    "metadata": metadata,
                    "expired": expired,
                })
            })
            .collect();
        print_json(&json!({
            "taskmanagerId": snapshot.taskmanager_id,
            "generationId": snapshot.generation_id,
            "generations": opened.dataspace.memory().generations(&store.taskmanager),
            "entries": entries,
        }));
    } else {
        println!("{block}");
        for (key, header, metadata, expired) in &entries {
            println!(
                "  {key}: state={} expires={}{} creator={}",
                metadata.state(),
                header.expiration_time().to_rfc3339(),
                if *expired { " (expired)" } else { "" },
                header.creator()
            );
        }
    }
}
