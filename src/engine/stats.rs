//! Per-field statistics over a post-eviction window.
//!
//! Fields with no samples are omitted from the record entirely: "no data"
//! must never be published as a zero.

use crate::engine::reading::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary statistics for one field's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub percentile: f64,
    pub count: usize,
}

/// One key's per-cycle statistical summary. Produced fresh each flush,
/// published once, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub key: String,
    pub as_of: DateTime<Utc>,
    pub window_size_secs: u64,
    /// Which percentile the per-field `percentile` values report
    pub percentile: f64,
    pub fields: BTreeMap<String, FieldStats>,
}

impl AggregateRecord {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compute an aggregate record for `window`.
///
/// `field_names` selects which fields are summarized; an empty slice means
/// every numeric field observed in the window. Returns `None` when no
/// selected field has any samples.
pub fn aggregate(
    key: &str,
    window: &[Reading],
    as_of: DateTime<Utc>,
    window_size: Duration,
    percentile: f64,
    field_names: &[String],
) -> Option<AggregateRecord> {
    let names: Vec<String> = if field_names.is_empty() {
        let mut observed: Vec<String> = window
            .iter()
            .flat_map(|r| r.fields.keys().cloned())
            .collect();
        observed.sort();
        observed.dedup();
        observed
    } else {
        field_names.to_vec()
    };

    let mut fields = BTreeMap::new();
    for name in names {
        let samples: Vec<f64> = window
            .iter()
            .filter_map(|reading| reading.fields.get(&name).copied())
            .collect();

        if let Some(stats) = field_stats(&samples, percentile) {
            fields.insert(name, stats);
        }
    }

    if fields.is_empty() {
        return None;
    }

    Some(AggregateRecord {
        key: key.to_string(),
        as_of,
        window_size_secs: window_size.as_secs(),
        percentile,
        fields,
    })
}

/// Summarize one sample list. Empty lists yield `None` rather than zeros.
fn field_stats(samples: &[f64], percentile: f64) -> Option<FieldStats> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    Some(FieldStats {
        min: Statistics::min(samples.iter()),
        max: Statistics::max(samples.iter()),
        mean: Statistics::mean(samples.iter()),
        median: rank_percentile(&sorted, 50.0),
        percentile: rank_percentile(&sorted, percentile),
        count: samples.len(),
    })
}

/// Percentile with linear rank interpolation over a sorted sample list.
fn rank_percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }

    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn window_of(field: &str, values: &[f64]) -> Vec<Reading> {
        values
            .iter()
            .map(|&v| Reading {
                key: "k".to_string(),
                timestamp: Utc::now(),
                fields: BTreeMap::from([(field.to_string(), v)]),
            })
            .collect()
    }

    fn all_fields() -> Vec<String> {
        Vec::new()
    }

    #[test]
    fn test_single_sample() {
        let window = window_of("temperature", &[50.0]);
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &all_fields(),
        )
        .unwrap();

        let stats = &record.fields["temperature"];
        assert_eq!(stats.min, 50.0);
        assert_eq!(stats.max, 50.0);
        assert_eq!(stats.mean, 50.0);
        assert_eq!(stats.median, 50.0);
        assert_eq!(stats.percentile, 50.0);
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_two_samples() {
        let window = window_of("temperature", &[50.0, 70.0]);
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &all_fields(),
        )
        .unwrap();

        let stats = &record.fields["temperature"];
        assert_eq!(stats.min, 50.0);
        assert_eq!(stats.max, 70.0);
        assert_eq!(stats.mean, 60.0);
        assert_eq!(stats.median, 60.0);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn test_percentile_interpolation() {
        // Linear rank interpolation: p75 of [1,2,3,4] sits at rank 2.25.
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(rank_percentile(&sorted, 75.0), 3.25);
        assert_eq!(rank_percentile(&sorted, 50.0), 2.5);
        assert_eq!(rank_percentile(&sorted, 0.0), 1.0);
        assert_eq!(rank_percentile(&sorted, 100.0), 4.0);
    }

    #[test]
    fn test_stat_ordering_invariants() {
        let window = window_of("vibration", &[3.2, 0.5, 9.1, 4.4, 4.4, 7.0]);
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            90.0,
            &all_fields(),
        )
        .unwrap();

        let stats = &record.fields["vibration"];
        assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        assert!(stats.min <= stats.median && stats.median <= stats.max);
        assert!(stats.min <= stats.percentile && stats.percentile <= stats.max);
        assert_eq!(stats.count, 6);
    }

    #[test]
    fn test_empty_window_produces_no_record() {
        let record = aggregate(
            "k",
            &[],
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &all_fields(),
        );
        assert!(record.is_none());
    }

    #[test]
    fn test_field_without_samples_omitted() {
        let window = window_of("temperature", &[20.0]);
        let names = vec!["temperature".to_string(), "pressure".to_string()];
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &names,
        )
        .unwrap();

        assert!(record.fields.contains_key("temperature"));
        assert!(!record.fields.contains_key("pressure"));
    }

    #[test]
    fn test_configured_fields_filter_output() {
        let mut window = window_of("temperature", &[20.0]);
        window.extend(window_of("humidity", &[0.4]));

        let names = vec!["temperature".to_string()];
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &names,
        )
        .unwrap();

        assert_eq!(record.fields.len(), 1);
        assert!(record.fields.contains_key("temperature"));
    }

    #[test]
    fn test_sparse_fields_across_readings() {
        // Readings carry different field subsets; counts reflect presence.
        let mut window = window_of("temperature", &[10.0, 20.0]);
        window.extend(window_of("pressure", &[101.0]));

        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &all_fields(),
        )
        .unwrap();

        assert_eq!(record.fields["temperature"].count, 2);
        assert_eq!(record.fields["pressure"].count, 1);
    }

    #[test]
    fn test_record_serializes_without_empty_fields() {
        let window = window_of("temperature", &[20.0]);
        let record = aggregate(
            "k",
            &window,
            Utc::now(),
            Duration::from_secs(30),
            75.0,
            &all_fields(),
        )
        .unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["fields"].get("pressure").is_none());
        assert_eq!(json["window_size_secs"], 30);
    }
}
