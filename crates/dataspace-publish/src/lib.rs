//! # dataspace-publish
//!
//! Publishers are pure consumers of finished data blocks: they read one
//! numeric field per row of a data product and forward
//! `(sanitized identifier, value)` pairs to graphite under a configured
//! namespace. Nothing here writes back to a block.

pub mod config;
pub mod error;
pub mod graphite;
pub mod price_performance;
pub mod publisher;

pub use config::{
    DEFAULT_GRAPHITE_HOST, DEFAULT_GRAPHITE_PORT, PublisherConfig, config_info, config_template,
};
pub use error::PublishError;
pub use graphite::{GraphiteSink, MetricsSink, RecordingSink, format_lines, sanitize_key};
pub use price_performance::{
    DEFAULT_GRAPHITE_CONTEXT, PRICE_PERFORMANCE_PRODUCT, PUBLISHER_NAME,
    PricePerformancePublisher,
};
pub use publisher::{Publisher, Row, read_table};

/// Build the publisher named in `config`.
pub fn publisher_for(config: PublisherConfig) -> Result<Box<dyn Publisher>, PublishError> {
    match config.name.as_str() {
        PUBLISHER_NAME => Ok(Box::new(PricePerformancePublisher::new(config))),
        other => Err(PublishError::Config(format!("unknown publisher `{other}`"))),
    }
}
