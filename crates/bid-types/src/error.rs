use thiserror::Error;

/// Violations of the batch contract shared by every detector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Document at index {index} has an empty id")]
    EmptyDocumentId { index: usize },

    #[error("Duplicate document id in batch: {0}")]
    DuplicateDocumentId(String),
}
