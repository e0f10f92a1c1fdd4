//! Ranking, filtering and summary statistics over enriched records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::EnrichedRecord;

/// Aggregate view of a set of enriched records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub category_distribution: BTreeMap<String, usize>,
    pub average: f32,
    pub min: f32,
    pub max: f32,
    pub high_quality_count: usize,
}

/// The `n` records with the highest importance score, best first.
pub fn top_by_importance(records: &[EnrichedRecord], n: usize) -> Vec<&EnrichedRecord> {
    let mut sorted: Vec<&EnrichedRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        b.payload
            .importance_score
            .total_cmp(&a.payload.importance_score)
    });
    sorted.truncate(n);
    sorted
}

pub fn filter_by_min_score(records: &[EnrichedRecord], min_score: f32) -> Vec<&EnrichedRecord> {
    records
        .iter()
        .filter(|r| r.payload.importance_score >= min_score)
        .collect()
}

/// Exact, case-sensitive category match.
pub fn filter_by_category<'a>(
    records: &'a [EnrichedRecord],
    category: &str,
) -> Vec<&'a EnrichedRecord> {
    records
        .iter()
        .filter(|r| r.payload.category == category)
        .collect()
}

/// `None` for an empty slice.
pub fn statistics(records: &[EnrichedRecord], high_quality_threshold: f32) -> Option<Statistics> {
    if records.is_empty() {
        return None;
    }

    let mut category_distribution = BTreeMap::new();
    let mut sum = 0.0_f32;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut high_quality_count = 0;

    for record in records {
        let score = record.payload.importance_score;
        *category_distribution
            .entry(record.payload.category.clone())
            .or_insert(0) += 1;
        sum += score;
        min = min.min(score);
        max = max.max(score);
        if score >= high_quality_threshold {
            high_quality_count += 1;
        }
    }

    Some(Statistics {
        total: records.len(),
        category_distribution,
        average: sum / records.len() as f32,
        min,
        max,
        high_quality_count,
    })
}
