//! Cross-bidder entity leakage
//!
//! A bid that names another bidder's project manager, phone number, mailbox or
//! bank account was most likely prepared by, or copied from, that bidder. For
//! every ordered pair (target, source) the source's entities are searched for
//! verbatim in the target's text.

use std::collections::BTreeMap;

use bid_types::{
    Alert, AlertKind, Dimension, DimensionResult, DocumentRecord, EntityHit, EntityKind, Evidence,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ordered_pairs;
use crate::extractors::entities::{extract_entities, mask_account, DocumentEntities};
use crate::patterns::context_window;

/// Characters kept on each side of a leaked name in the target text
const TARGET_CONTEXT_CHARS: usize = 30;
/// Hit severities are summed and divided by this for the alert score
const SEVERITY_DIVISOR: f64 = 3.0;

pub fn hit_severity(kind: EntityKind) -> f64 {
    match kind {
        EntityKind::PersonName | EntityKind::CompanyName => 1.0,
        EntityKind::PhoneNumber | EntityKind::BankAccount => 0.9,
        EntityKind::Email => 0.8,
        EntityKind::IdCard | EntityKind::FaxNumber => 0.0,
    }
}

/// Entity counts for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub bidder: String,
    pub counts: BTreeMap<EntityKind, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCrossReport {
    pub total_alerts: usize,
    pub max_severity: f64,
    /// Sorted by score, highest first
    pub alerts: Vec<Alert>,
    pub entity_summary: BTreeMap<String, EntitySummary>,
}

fn label(doc: &DocumentRecord) -> &str {
    let l = doc.bidder_label.trim();
    if l.is_empty() {
        doc.id.as_str()
    } else {
        l
    }
}

/// Entities of `source` that appear verbatim in the text of `target`
pub fn find_cross_entities(
    target: &DocumentRecord,
    source: &DocumentRecord,
    source_entities: &DocumentEntities,
) -> Vec<EntityHit> {
    let text = target.normalized_text.as_str();
    if text.is_empty() {
        return Vec::new();
    }
    let (target_label, source_label) = (label(target), label(source));
    let mut hits = Vec::new();

    for person in source_entities.of_kind(EntityKind::PersonName) {
        if let Some(pos) = text.find(&person.value) {
            let role = person.role.as_deref().unwrap_or("staff member");
            hits.push(EntityHit {
                kind: EntityKind::PersonName,
                entity: person.value.clone(),
                role_in_source: person.role.clone(),
                context_in_target: Some(context_window(
                    text,
                    pos,
                    pos + person.value.len(),
                    TARGET_CONTEXT_CHARS,
                )),
                severity: hit_severity(EntityKind::PersonName),
                description: format!(
                    "{source_label}'s {role} \"{}\" appears in the bid of {target_label}",
                    person.value
                ),
            });
        }
    }

    for phone in source_entities.of_kind(EntityKind::PhoneNumber) {
        if text.contains(&phone.value) || text.contains(&phone.surface) {
            hits.push(simple_hit(
                EntityKind::PhoneNumber,
                phone.value.clone(),
                format!(
                    "{source_label}'s phone number {} appears in the bid of {target_label}",
                    phone.surface
                ),
            ));
        }
    }

    let lowered = text.to_lowercase();
    for email in source_entities.of_kind(EntityKind::Email) {
        if lowered.contains(&email.value) {
            hits.push(simple_hit(
                EntityKind::Email,
                email.value.clone(),
                format!(
                    "{source_label}'s e-mail {} appears in the bid of {target_label}",
                    email.value
                ),
            ));
        }
    }

    let (own, other) = (target.bidder_label.trim(), source.bidder_label.trim());
    if !other.is_empty() && other != own && text.contains(other) {
        hits.push(simple_hit(
            EntityKind::CompanyName,
            other.to_string(),
            format!("the bid of {target_label} names competing bidder \"{other}\""),
        ));
    }

    for account in source_entities.of_kind(EntityKind::BankAccount) {
        if text.contains(&account.value) {
            hits.push(simple_hit(
                EntityKind::BankAccount,
                mask_account(&account.value),
                format!("{source_label}'s bank account appears in the bid of {target_label}"),
            ));
        }
    }

    hits
}

fn simple_hit(kind: EntityKind, entity: String, description: String) -> EntityHit {
    EntityHit {
        kind,
        entity,
        role_in_source: None,
        context_in_target: None,
        severity: hit_severity(kind),
        description,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EntityCrossDetector;

impl EntityCrossDetector {
    pub fn extract_all(&self, documents: &[DocumentRecord]) -> Vec<DocumentEntities> {
        documents
            .iter()
            .map(|d| extract_entities(&d.normalized_text, &d.bidder_label))
            .collect()
    }

    /// One alert per ordered pair with at least one leaked entity
    pub fn cross_check(&self, documents: &[DocumentRecord], entities: &[DocumentEntities]) -> Vec<Alert> {
        ordered_pairs(documents.len())
            .filter_map(|(i, j)| {
                let (target, source) = (&documents[i], &documents[j]);
                let hits = find_cross_entities(target, source, &entities[j]);
                if hits.is_empty() {
                    return None;
                }
                let total: f64 = hits.iter().map(|h| h.severity).sum();
                let summary = format!(
                    "The bid of {} contains {} entities of {}",
                    label(target),
                    hits.len(),
                    label(source)
                );
                Some(Alert::pairwise(
                    AlertKind::EntityLeak,
                    target,
                    source,
                    (total / SEVERITY_DIVISOR).min(1.0),
                    summary,
                    Evidence::EntityLeak { hits },
                ))
            })
            .collect()
    }

    pub fn analyze(&self, documents: &[DocumentRecord]) -> EntityCrossReport {
        let entities = self.extract_all(documents);
        let mut alerts = self.cross_check(documents, &entities);
        alerts.sort_by(|a, b| b.score.total_cmp(&a.score));
        let max_severity = alerts.iter().map(|a| a.score).fold(0.0, f64::max);

        let entity_summary = documents
            .iter()
            .zip(&entities)
            .map(|(doc, ents)| {
                (
                    doc.id.clone(),
                    EntitySummary {
                        bidder: doc.bidder_label.clone(),
                        counts: ents.counts(),
                    },
                )
            })
            .collect();

        debug!(
            documents = documents.len(),
            leaks = alerts.len(),
            "entity cross-check finished"
        );
        EntityCrossReport {
            total_alerts: alerts.len(),
            max_severity,
            alerts,
            entity_summary,
        }
    }

    pub fn detect(&self, documents: &[DocumentRecord]) -> DimensionResult {
        DimensionResult::from_alerts(Dimension::EntityCross, self.analyze(documents).alerts)
    }
}
