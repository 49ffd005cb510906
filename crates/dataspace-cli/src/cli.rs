use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dataspace",
    about = "Dataspace: generation-versioned data blocks over a JSONL store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the rows live.
#[derive(clap::Args, Clone)]
pub struct StoreArgs {
    /// Path to the rows JSONL file
    #[arg(long, default_value = dataspace_core::DEFAULT_STORE_PATH)]
    pub store: String,

    /// Optional store configuration (TOML); its `path` overrides --store
    #[arg(long)]
    pub store_config: Option<String>,

    /// Task manager identity
    #[arg(long)]
    pub taskmanager: String,

    /// Generation to operate on (defaults per command)
    #[arg(long)]
    pub generation: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write KEY=JSON pairs into a generation (a new one by default)
    Put {
        #[command(flatten)]
        store: StoreArgs,

        /// Entries as KEY=JSON
        #[arg(required = true)]
        entries: Vec<String>,

        /// Header creator label
        #[arg(long)]
        creator: Option<String>,

        /// Header schema id
        #[arg(long)]
        schema_id: Option<i64>,

        /// Metadata state for the written entries
        #[arg(long, default_value = "NEW")]
        state: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read one value from a generation (the latest by default)
    Get {
        #[command(flatten)]
        store: StoreArgs,

        /// Key to read
        key: String,

        /// Print the header and metadata too
        #[arg(long)]
        full: bool,
    },

    /// Show every entry of a generation (the latest by default)
    Inspect {
        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fork a generation (the latest by default) into the next one
    Duplicate {
        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set the expiration time of a generation (the latest by default)
    Expire {
        #[command(flatten)]
        store: StoreArgs,

        /// Expiration time as RFC 3339; defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a publisher over a generation (the latest by default)
    Publish {
        #[command(flatten)]
        store: StoreArgs,

        /// Publisher configuration (TOML)
        #[arg(long)]
        config: String,

        /// Print graphite lines instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the expected publisher configuration
    ConfigTemplate {
        /// Publisher name
        #[arg(long, default_value = dataspace_publish::PUBLISHER_NAME)]
        name: String,
    },

    /// Print the configuration template with consumed products
    ConfigInfo {
        /// Publisher name
        #[arg(long, default_value = dataspace_publish::PUBLISHER_NAME)]
        name: String,
    },
}
