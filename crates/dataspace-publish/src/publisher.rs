//! Publisher contract: read finished data blocks, forward numeric values.

use dataspace_core::DataBlock;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::PublisherConfig;
use crate::error::PublishError;
use crate::graphite::MetricsSink;

/// One row of a tabular data product.
pub type Row = BTreeMap<String, Value>;

impl std::fmt::Debug for dyn Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher").field("config", self.config()).finish()
    }
}

/// Read-only consumer of data blocks.
pub trait Publisher {
    fn config(&self) -> &PublisherConfig;

    /// Data products this publisher reads.
    fn consumes(&self) -> &'static [&'static str];

    /// Namespace used when the configuration does not set one.
    fn default_graphite_context(&self) -> &'static str;

    /// Metrics derived from `block`, as `(identifier, value)` pairs.
    fn metrics(&self, block: &DataBlock) -> Result<BTreeMap<String, f64>, PublishError>;

    fn name(&self) -> &str {
        &self.config().name
    }

    fn graphite_context_header(&self) -> &str {
        self.config()
            .graphite_context
            .as_deref()
            .unwrap_or(self.default_graphite_context())
    }

    fn graphite_context(
        &self,
        block: &DataBlock,
    ) -> Result<(String, BTreeMap<String, f64>), PublishError> {
        Ok((self.graphite_context_header().to_string(), self.metrics(block)?))
    }

    /// Send this block's metrics to `sink` when publishing is enabled.
    ///
    /// Returns the number of metrics sent.
    fn publish(&self, block: &DataBlock, sink: &mut dyn MetricsSink) -> Result<usize, PublishError> {
        if !self.config().publish_to_graphite {
            debug!(publisher = self.name(), "graphite publishing disabled");
            return Ok(0);
        }
        let (context, data) = self.graphite_context(block)?;
        sink.send(&context, &data)?;
        Ok(data.len())
    }
}

/// Read a tabular data product from `block`.
pub fn read_table(block: &DataBlock, product: &str) -> Result<Vec<Row>, PublishError> {
    Ok(block.get(product)?)
}

pub(crate) fn string_field<'a>(
    row: &'a Row,
    product: &str,
    index: usize,
    field: &str,
) -> Result<&'a str, PublishError> {
    row.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(product, index, field, "string"))
}

pub(crate) fn number_field(
    row: &Row,
    product: &str,
    index: usize,
    field: &str,
) -> Result<f64, PublishError> {
    row.get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| missing(product, index, field, "numeric"))
}

fn missing(product: &str, row: usize, field: &str, expected: &'static str) -> PublishError {
    PublishError::MissingField {
        product: product.to_string(),
        row,
        field: field.to_string(),
        expected,
    }
}
