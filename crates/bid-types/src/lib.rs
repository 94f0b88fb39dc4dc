pub mod alert;
pub mod document;
pub mod error;
pub mod verdict;

pub use alert::{
    clamp_score, Alert, AlertKind, CostCategory, DocumentPair, EntityHit, EntityKind, Evidence,
    FieldMatch, FixedCoefficientMatch, FormatFinding, MetadataField, SimilarSegment,
    TimestampCluster, TimestampEntry, TimestampField,
};
pub use document::{validate_batch, DocumentMetadata, DocumentRecord, FormatDescriptor, Margins};
pub use error::BatchError;
pub use verdict::{Dimension, DimensionResult, RiskLevel, RiskVerdict};
