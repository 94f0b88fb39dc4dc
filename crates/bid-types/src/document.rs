use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// One bid submission as handed over by the parsing collaborator.
///
/// Records are read-only for every detector; nothing in the engine mutates them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    /// Declared submitting company (the bidder)
    pub bidder_label: String,
    pub normalized_text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub format_descriptor: FormatDescriptor,
    /// Total price supplied by the caller; overrides the price found in the text
    #[serde(default)]
    pub declared_price: Option<f64>,
}

impl DocumentRecord {
    pub fn new(id: impl Into<String>, bidder_label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bidder_label: bidder_label.into(),
            normalized_text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_format(mut self, format_descriptor: FormatDescriptor) -> Self {
        self.format_descriptor = format_descriptor;
        self
    }

    pub fn with_declared_price(mut self, price: f64) -> Self {
        self.declared_price = Some(price);
        self
    }
}

/// File-level properties extracted from the PDF/DOCX container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub last_modified_by: Option<String>,
    #[serde(default)]
    pub created_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub modified_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub producer: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub software_version: Option<String>,
}

/// Layout fingerprint of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    #[serde(default)]
    pub fonts: Vec<String>,
    #[serde(default)]
    pub font_sizes: Vec<f64>,
    #[serde(default)]
    pub page_width: Option<f64>,
    #[serde(default)]
    pub page_height: Option<f64>,
    #[serde(default)]
    pub margins: Margins,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default)]
    pub left: Option<f64>,
    #[serde(default)]
    pub right: Option<f64>,
    #[serde(default)]
    pub top: Option<f64>,
    #[serde(default)]
    pub bottom: Option<f64>,
}

impl Margins {
    /// Margins in a fixed order: left, right, top, bottom
    pub fn as_array(&self) -> [Option<f64>; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}

/// Check the batch contract: every document has a non-empty, unique id.
pub fn validate_batch(documents: &[DocumentRecord]) -> Result<(), BatchError> {
    let mut seen = HashSet::with_capacity(documents.len());
    for (index, doc) in documents.iter().enumerate() {
        if doc.id.trim().is_empty() {
            return Err(BatchError::EmptyDocumentId { index });
        }
        if !seen.insert(doc.id.as_str()) {
            return Err(BatchError::DuplicateDocumentId(doc.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch_accepts_unique_ids() {
        let docs = vec![
            DocumentRecord::new("1", "A", "text"),
            DocumentRecord::new("2", "B", "text"),
        ];
        assert!(validate_batch(&docs).is_ok());
        assert!(validate_batch(&[]).is_ok());
    }

    #[test]
    fn test_validate_batch_rejects_duplicate_ids() {
        let docs = vec![
            DocumentRecord::new("1", "A", "text"),
            DocumentRecord::new("1", "B", "text"),
        ];
        assert_eq!(
            validate_batch(&docs),
            Err(BatchError::DuplicateDocumentId("1".to_string()))
        );
    }

    #[test]
    fn test_validate_batch_rejects_blank_id() {
        let docs = vec![DocumentRecord::new("1", "A", ""), DocumentRecord::new("  ", "B", "")];
        assert_eq!(validate_batch(&docs), Err(BatchError::EmptyDocumentId { index: 1 }));
    }

    #[test]
    fn test_deserialize_with_missing_optional_sections() {
        let json = r#"{"id":"d1","bidder_label":"甲公司","normalized_text":"投标文件"}"#;
        let doc: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(doc.metadata, DocumentMetadata::default());
        assert!(doc.format_descriptor.fonts.is_empty());
        assert_eq!(doc.declared_price, None);
    }

    #[test]
    fn test_deserialize_timestamps() {
        let json = r#"{"id":"d1","bidder_label":"A","normalized_text":"",
            "metadata":{"author":"张三","created_time":"2024-03-01T09:30:00"}}"#;
        let doc: DocumentRecord = serde_json::from_str(json).unwrap();
        let created = doc.metadata.created_time.unwrap();
        assert_eq!(created.to_string(), "2024-03-01 09:30:00");
        assert_eq!(doc.metadata.author.as_deref(), Some("张三"));
    }
}
