//! Publisher errors.

use dataspace_core::DataSpaceError;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    DataSpace(#[from] DataSpaceError),

    #[error("{product} row {row}: missing or non-{expected} field `{field}`")]
    MissingField {
        product: String,
        row: usize,
        field: String,
        expected: &'static str,
    },

    #[error("metrics sink I/O failure: {0}")]
    Io(String),

    #[error("invalid publisher configuration: {0}")]
    Config(String),
}
