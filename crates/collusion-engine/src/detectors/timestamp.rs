//! Batch-wide timestamp clustering
//!
//! Collects every creation and modification time in the batch, sorts them and
//! grows a cluster while consecutive gaps stay within the threshold. A cluster
//! counts when it holds at least two timestamps from at least two bidders.

use std::collections::BTreeSet;

use bid_types::{
    Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, Evidence, TimestampCluster,
    TimestampEntry, TimestampField,
};
use tracing::debug;

use super::metadata::minutes_between;

/// Every known timestamp in the batch, tagged with its document and bidder
pub fn collect_entries(documents: &[DocumentRecord]) -> Vec<TimestampEntry> {
    let mut entries = Vec::new();
    for doc in documents {
        let fields = [
            (TimestampField::Created, doc.metadata.created_time),
            (TimestampField::Modified, doc.metadata.modified_time),
        ];
        for (field, time) in fields {
            if let Some(time) = time {
                entries.push(TimestampEntry {
                    doc_id: doc.id.clone(),
                    bidder: doc.bidder_label.trim().to_string(),
                    field,
                    time,
                });
            }
        }
    }
    entries
}

/// Clusters spanning at least two distinct non-empty bidders
pub fn find_clusters(mut entries: Vec<TimestampEntry>, threshold_minutes: u32) -> Vec<TimestampCluster> {
    let threshold = f64::from(threshold_minutes);
    entries.sort_by_key(|e| e.time);

    let mut groups: Vec<Vec<TimestampEntry>> = Vec::new();
    let mut current: Vec<TimestampEntry> = Vec::new();
    for entry in entries {
        let continues = current
            .last()
            .map_or(true, |prev| minutes_between(entry.time, prev.time) <= threshold);
        if !continues {
            groups.push(std::mem::take(&mut current));
        }
        current.push(entry);
    }
    groups.push(current);

    groups
        .into_iter()
        .filter(|g| g.len() >= 2)
        .filter_map(|entries| {
            let bidders: BTreeSet<&str> = entries
                .iter()
                .map(|e| e.bidder.as_str())
                .filter(|b| !b.is_empty())
                .collect();
            if bidders.len() < 2 {
                return None;
            }
            let bidders = bidders.into_iter().map(String::from).collect();
            let start = entries.first()?.time;
            let end = entries.last()?.time;
            let span_minutes = (minutes_between(end, start) * 10.0).round() / 10.0;
            Some(TimestampCluster {
                bidders,
                start,
                end,
                span_minutes,
                entries,
            })
        })
        .collect()
}

pub struct TimestampClusterDetector {
    threshold_minutes: u32,
}

impl TimestampClusterDetector {
    pub fn new(threshold_minutes: u32) -> Self {
        Self { threshold_minutes }
    }

    pub fn clusters(&self, documents: &[DocumentRecord]) -> Vec<TimestampCluster> {
        find_clusters(collect_entries(documents), self.threshold_minutes)
    }

    /// Score 1.0 with a single batch alert when any cluster survives, otherwise 0
    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        let clusters = self.clusters(documents);
        debug!(clusters = clusters.len(), "timestamp clusters found");
        if clusters.is_empty() {
            return DimensionResult::from_alerts(Dimension::TimestampCluster, Vec::new());
        }

        let bidders: BTreeSet<&str> = clusters
            .iter()
            .flat_map(|c| c.bidders.iter().map(String::as_str))
            .collect();
        let summary = format!(
            "{} timestamp cluster(s) within {} minutes across bidders: {}",
            clusters.len(),
            self.threshold_minutes,
            bidders.into_iter().collect::<Vec<_>>().join(", ")
        );
        let alert = Alert::batch(
            AlertKind::TimestampCluster,
            1.0,
            summary,
            Evidence::TimestampClusters { clusters },
        );
        DimensionResult::from_alerts(Dimension::TimestampCluster, vec![alert])
    }
}

impl Default for TimestampClusterDetector {
    fn default() -> Self {
        Self::new(5)
    }
}
