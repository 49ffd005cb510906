use crate::cli::StoreArgs;
use crate::support::{exit_with, open_store_or_exit};
use chrono::Utc;
use dataspace_publish::{GraphiteSink, Publisher, PublisherConfig, format_lines, publisher_for};

pub fn run(store: StoreArgs, config: String, dry_run: bool) {
    let config = PublisherConfig::load(&config).unwrap_or_else(|e| exit_with(e));
    let mut sink = GraphiteSink::new(config.graphite_host.clone(), config.graphite_port);
    let publisher: Box<dyn Publisher> = publisher_for(config).unwrap_or_else(|e| exit_with(e));

    let opened = open_store_or_exit(&store);
    let block = opened.resume(&store.taskmanager, store.generation);

    if dry_run {
        let (context, data) = publisher
            .graphite_context(&block)
            .unwrap_or_else(|e| exit_with(format!("{}: {e}", publisher.name())));
        print!("{}", format_lines(&context, &data, Utc::now().timestamp()));
        return;
    }

    let sent = publisher
        .publish(&block, &mut sink)
        .unwrap_or_else(|e| exit_with(format!("{}: {e}", publisher.name())));
    println!(
        "dataspace publish\n  Publisher: {}\n  Generation: {}\n  Metrics sent: {}\n  Graphite: {}",
        publisher.name(),
        block.generation_id(),
        sent,
        sink.address()
    );
}
