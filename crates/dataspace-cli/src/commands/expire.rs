use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit, print_json};
use chrono::{DateTime, Utc};
use serde_json::json;

pub fn run(store: StoreArgs, at: Option<String>, json_output: bool) {
    let expiration_time = match at.as_deref() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|e| exit_with(format!("invalid --at `{raw}`: {e}"))),
        None => Utc::now(),
    };

    let opened = open_store_or_exit(&store);
    let block = opened.resume(&store.taskmanager, store.generation);
    block
        .mark_expired(expiration_time)
        .unwrap_or_else(|e| exit_with(format!("failed to mark expiration: {e}")));
    let expired = block.is_expired(None).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "expire",
            "taskmanagerId": block.taskmanager_id(),
            "generationId": block.generation_id(),
            "expirationTime": expiration_time.to_rfc3339(),
            "expired": expired,
        }));
    } else {
        println!(
            "dataspace expire\n  Task manager: {}\n  Generation: {}\n  Expires: {}\n  Expired: {}",
            block.taskmanager_id(),
            block.generation_id(),
            expiration_time.to_rfc3339(),
            expired
        );
    }
}
