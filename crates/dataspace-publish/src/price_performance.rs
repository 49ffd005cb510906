//! Price/performance publisher for GCE entries.

use dataspace_core::DataBlock;
use std::collections::BTreeMap;

use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::graphite::sanitize_key;
use crate::publisher::{Publisher, number_field, read_table, string_field};

pub const PRICE_PERFORMANCE_PRODUCT: &str = "GCE_Price_Performance";
pub const DEFAULT_GRAPHITE_CONTEXT: &str = "hepcloud.de.gce";
pub const PUBLISHER_NAME: &str = "GCEPricePerformancePublisher";

const CONSUMES: &[&str] = &[PRICE_PERFORMANCE_PRODUCT];

/// Publishes `<EntryName>.price_perf` for every price/performance row.
#[derive(Debug, Clone)]
pub struct PricePerformancePublisher {
    config: PublisherConfig,
}

impl PricePerformancePublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self { config }
    }
}

impl Default for PricePerformancePublisher {
    fn default() -> Self {
        Self::new(PublisherConfig::new(PUBLISHER_NAME))
    }
}

impl Publisher for PricePerformancePublisher {
    fn config(&self) -> &PublisherConfig {
        &self.config
    }

    fn consumes(&self) -> &'static [&'static str] {
        CONSUMES
    }

    fn default_graphite_context(&self) -> &'static str {
        DEFAULT_GRAPHITE_CONTEXT
    }

    fn metrics(&self, block: &DataBlock) -> Result<BTreeMap<String, f64>, PublishError> {
        let rows = read_table(block, PRICE_PERFORMANCE_PRODUCT)?;
        let mut metrics = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            let entry = string_field(row, PRICE_PERFORMANCE_PRODUCT, index, "EntryName")?;
            let value = number_field(row, PRICE_PERFORMANCE_PRODUCT, index, "PricePerformance")?;
            metrics.insert(format!("{}.price_perf", sanitize_key(entry)), value);
        }
        Ok(metrics)
    }
}
