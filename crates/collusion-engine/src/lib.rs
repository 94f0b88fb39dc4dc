//! Bid collusion detection
//!
//! Analyses the bid documents of one tender along seven independent
//! dimensions (text similarity, metadata, layout, timestamps, leaked
//! entities, shared errors, prices) and fuses them into one risk verdict.

pub mod config;
pub mod detectors;
pub mod error;
pub mod extractors;
pub mod patterns;
pub mod risk;
pub mod runner;

use bid_types::{validate_batch, Dimension, DimensionResult, DocumentRecord, RiskVerdict};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detectors::entity_cross::EntityCrossDetector;
use crate::detectors::error_pattern::ErrorPatternMatcher;
use crate::detectors::format::FormatComparator;
use crate::detectors::metadata::MetadataComparator;
use crate::detectors::price::PriceAnalyzer;
use crate::detectors::similarity::SimilarityEngine;
use crate::detectors::timestamp::TimestampClusterDetector;

pub use crate::config::{AnalysisConfig, DimensionToggles, Tunables};
pub use crate::error::{ConfigError, EngineError};
pub use crate::risk::{classify, PairRisk, RiskAggregator, RiskWeights};
pub use crate::runner::{NoProgress, ProgressSink, ProgressUpdate};

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Results of the enabled dimensions, in dimension order
    pub dimensions: Vec<DimensionResult>,
    pub verdict: RiskVerdict,
}

/// CollusionEngine entry point
pub struct CollusionEngine {
    config: AnalysisConfig,
    similarity: SimilarityEngine,
    metadata: MetadataComparator,
    format: FormatComparator,
    timestamps: TimestampClusterDetector,
    entities: EntityCrossDetector,
    errors: ErrorPatternMatcher,
    prices: PriceAnalyzer,
    aggregator: RiskAggregator,
}

impl CollusionEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let tunables = &config.tunables;
        Ok(Self {
            similarity: SimilarityEngine::new(),
            metadata: MetadataComparator::new(tunables.metadata_weights, config.timestamp_diff_minutes),
            format: FormatComparator,
            timestamps: TimestampClusterDetector::new(config.timestamp_diff_minutes),
            entities: EntityCrossDetector,
            errors: ErrorPatternMatcher,
            prices: PriceAnalyzer::new(tunables.price_tolerances),
            aggregator: RiskAggregator::new(tunables.risk_weights, config.similarity_threshold),
            config,
        })
    }

    /// Replace the similarity engine, e.g. with one backed by a word list
    pub fn with_similarity_engine(mut self, similarity: SimilarityEngine) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &RiskAggregator {
        &self.aggregator
    }

    /// Run a single dimension without a panic boundary
    pub fn run_dimension(&self, dimension: Dimension, documents: &[DocumentRecord]) -> DimensionResult {
        match dimension {
            Dimension::ContentSimilarity => self.similarity.detect(documents),
            Dimension::MetadataMatch => self.metadata.detect(documents),
            Dimension::FormatMatch => self.format.detect(documents),
            Dimension::TimestampCluster => self.timestamps.detect(documents),
            Dimension::EntityCross => self.entities.detect(documents),
            Dimension::ErrorPattern => self.errors.detect(documents),
            Dimension::PriceAnalysis => self.prices.detect(documents),
        }
    }

    pub fn analyze(&self, documents: &[DocumentRecord]) -> Result<AnalysisReport, EngineError> {
        self.analyze_with_progress(documents, &NoProgress)
    }

    /// Run every enabled dimension and aggregate the results
    pub fn analyze_with_progress(
        &self,
        documents: &[DocumentRecord],
        sink: &dyn ProgressSink,
    ) -> Result<AnalysisReport, EngineError> {
        validate_batch(documents)?;
        let enabled = self.config.dimensions.enabled();
        info!(
            documents = documents.len(),
            dimensions = enabled.len(),
            parallel = self.config.parallel,
            "starting collusion analysis"
        );

        let dimensions = runner::run_dimensions(&enabled, self.config.parallel, sink, |dimension| {
            self.run_dimension(dimension, documents)
        });

        for result in dimensions.iter().filter(|r| r.degraded) {
            warn!(dimension = %result.dimension, "dimension excluded from the verdict");
        }

        let verdict = self.aggregator.aggregate(&dimensions);
        info!(
            risk_score = verdict.risk_score,
            risk_level = %verdict.risk_level,
            alerts = verdict.alert_count,
            "collusion analysis finished"
        );
        Ok(AnalysisReport { dimensions, verdict })
    }
}

impl Default for CollusionEngine {
    fn default() -> Self {
        Self {
            config: AnalysisConfig::default(),
            similarity: SimilarityEngine::default(),
            metadata: MetadataComparator::default(),
            format: FormatComparator,
            timestamps: TimestampClusterDetector::default(),
            entities: EntityCrossDetector,
            errors: ErrorPatternMatcher,
            prices: PriceAnalyzer::default(),
            aggregator: RiskAggregator::default(),
        }
    }
}
