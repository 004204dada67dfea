// 🗺️ Location Fusion Engine
// Merges ranked crowd-mapped feeds into one location per invader.
//
// Precedence rule: feeds are processed in priority order (index 0 first) and
// the first claim for an id wins across the whole merge, not per feed.

use crate::catalog::{Catalog, Coordinate};
use crate::error::InvaderError;
use crate::identifier::{normalize_loose, CanonicalId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// INPUT TYPES
// ============================================================================

/// One placemark of a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFeature {
    pub raw_name: String,

    /// None when the source had no usable point geometry
    pub coordinate: Option<Coordinate>,
}

impl LocationFeature {
    pub fn new(raw_name: &str, longitude: f64, latitude: f64) -> Self {
        LocationFeature {
            raw_name: raw_name.to_string(),
            coordinate: Some(Coordinate::new(longitude, latitude)),
        }
    }
}

/// A whole feed, already fetched and decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFeed {
    pub name: String,
    pub features: Vec<LocationFeature>,
}

impl LocationFeed {
    pub fn new(name: &str, features: Vec<LocationFeature>) -> Self {
        LocationFeed {
            name: name.to_string(),
            features,
        }
    }
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: CanonicalId,

    /// Raw feature name, kept for operators
    pub description: String,

    pub coordinate: Coordinate,
}

/// A claim rejected because an earlier source already located the id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateClaim {
    pub id: CanonicalId,
    pub feed: String,
    pub raw_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub records: HashMap<CanonicalId, LocationRecord>,

    /// Feature names without an identifier
    pub ignored: Vec<String>,

    /// Feature names without a usable coordinate
    pub malformed: Vec<String>,

    /// Feature names whose id is not in the catalog
    pub unknown: Vec<String>,

    pub duplicates: Vec<DuplicateClaim>,
}

impl FusionOutcome {
    pub fn located(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// FUSION ENGINE
// ============================================================================

pub struct LocationFusionEngine {
    catalog_ids: HashSet<CanonicalId>,
}

impl LocationFusionEngine {
    pub fn new(catalog_ids: HashSet<CanonicalId>) -> Self {
        LocationFusionEngine { catalog_ids }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        LocationFusionEngine::new(catalog.ids().cloned().collect())
    }

    /// Merge feeds in the given priority order
    pub fn fuse(&self, feeds: &[LocationFeed]) -> FusionOutcome {
        let mut outcome = FusionOutcome::default();

        for feed in feeds {
            let before = outcome.records.len();

            for feature in &feed.features {
                self.fuse_feature(feed, feature, &mut outcome);
            }

            tracing::info!(
                feed = %feed.name,
                features = feed.features.len(),
                claimed = outcome.records.len() - before,
                "Feed merged"
            );
        }

        outcome
    }

    fn fuse_feature(&self, feed: &LocationFeed, feature: &LocationFeature, outcome: &mut FusionOutcome) {
        let id = match normalize_loose(&feature.raw_name) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(feed = %feed.name, error = %err, "Ignored");
                outcome.ignored.push(feature.raw_name.clone());
                return;
            }
        };

        let coordinate = match feature.coordinate.filter(Coordinate::is_usable) {
            Some(coordinate) => coordinate,
            None => {
                let err = InvaderError::MalformedCoordinate(feature.raw_name.clone());
                tracing::warn!(feed = %feed.name, error = %err, "Skipped");
                outcome.malformed.push(feature.raw_name.clone());
                return;
            }
        };

        if !self.catalog_ids.contains(&id) {
            tracing::debug!(feed = %feed.name, %id, "Skipped: not in catalog");
            outcome.unknown.push(feature.raw_name.clone());
            return;
        }

        if outcome.records.contains_key(&id) {
            let err = InvaderError::DuplicateClaim {
                id: id.to_string(),
                feed: feed.name.clone(),
            };
            tracing::debug!(error = %err, "Skipped");
            outcome.duplicates.push(DuplicateClaim {
                id,
                feed: feed.name.clone(),
                raw_name: feature.raw_name.clone(),
            });
            return;
        }

        outcome.records.insert(
            id.clone(),
            LocationRecord {
                id,
                description: feature.raw_name.clone(),
                coordinate,
            },
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_for(ids: &[&str]) -> LocationFusionEngine {
        LocationFusionEngine::new(ids.iter().map(|raw| normalize_loose(raw).unwrap()).collect())
    }

    #[test]
    fn test_first_source_wins() {
        let engine = engine_for(&["AB_01"]);
        let feeds = vec![
            LocationFeed::new("feedA", vec![LocationFeature::new("AB_01", 1.0, 2.0)]),
            LocationFeed::new("feedB", vec![LocationFeature::new("AB_01", 9.0, 9.0)]),
        ];

        let outcome = engine.fuse(&feeds);

        let record = &outcome.records[&CanonicalId::new("AB", 1)];
        assert_eq!(record.coordinate, Coordinate::new(1.0, 2.0));
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].feed, "feedB");
    }

    #[test]
    fn test_precedence_across_padding_variants() {
        let engine = engine_for(&["PA_12"]);
        let feeds = vec![
            LocationFeed::new("high", vec![LocationFeature::new("pa-0012 rue X", 2.3, 48.8)]),
            LocationFeed::new("low", vec![LocationFeature::new("PA_12", 5.0, 5.0)]),
        ];

        let outcome = engine.fuse(&feeds);

        let record = &outcome.records[&CanonicalId::new("PA", 12)];
        assert_eq!(record.coordinate, Coordinate::new(2.3, 48.8));
        assert_eq!(record.description, "pa-0012 rue X");
    }

    #[test]
    fn test_lower_priority_fills_gaps() {
        let engine = engine_for(&["PA_1", "PA_2"]);
        let feeds = vec![
            LocationFeed::new("high", vec![LocationFeature::new("PA_1", 1.0, 1.0)]),
            LocationFeed::new(
                "low",
                vec![
                    LocationFeature::new("PA_1", 7.0, 7.0),
                    LocationFeature::new("PA_2", 3.0, 4.0),
                ],
            ),
        ];

        let outcome = engine.fuse(&feeds);

        assert_eq!(outcome.located(), 2);
        assert_eq!(outcome.records[&CanonicalId::new("PA", 1)].coordinate, Coordinate::new(1.0, 1.0));
        // Longitude first, latitude second, unchanged
        assert_eq!(outcome.records[&CanonicalId::new("PA", 2)].coordinate, Coordinate::new(3.0, 4.0));
    }

    #[test]
    fn test_duplicate_within_same_feed() {
        let engine = engine_for(&["PA_5"]);
        let feeds = vec![LocationFeed::new(
            "only",
            vec![
                LocationFeature::new("PA_05", 1.0, 1.0),
                LocationFeature::new("PA_5", 2.0, 2.0),
            ],
        )];

        let outcome = engine.fuse(&feeds);

        assert_eq!(outcome.records[&CanonicalId::new("PA", 5)].coordinate, Coordinate::new(1.0, 1.0));
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[test]
    fn test_ignored_malformed_and_unknown() {
        let engine = engine_for(&["PA_1", "PA_2"]);
        let feeds = vec![LocationFeed::new(
            "feed",
            vec![
                LocationFeature::new("Mystery mosaic", 1.0, 1.0),
                LocationFeature {
                    raw_name: "PA_1".to_string(),
                    coordinate: None,
                },
                LocationFeature::new("PA_2", f64::NAN, 1.0),
                LocationFeature::new("LDN_9", 0.1, 51.5),
                // Malformed claim did not block the later valid one
                LocationFeature::new("PA_1", 2.0, 3.0),
            ],
        )];

        let outcome = engine.fuse(&feeds);

        assert_eq!(outcome.ignored, vec!["Mystery mosaic".to_string()]);
        assert_eq!(outcome.malformed.len(), 2);
        assert_eq!(outcome.unknown, vec!["LDN_9".to_string()]);
        assert_eq!(outcome.located(), 1);
        assert_eq!(outcome.records[&CanonicalId::new("PA", 1)].coordinate, Coordinate::new(2.0, 3.0));
    }

    #[test]
    fn test_records_are_subset_of_catalog() {
        let engine = engine_for(&["PA_1"]);
        let feeds = vec![LocationFeed::new(
            "feed",
            vec![
                LocationFeature::new("PA_1", 1.0, 1.0),
                LocationFeature::new("PA_2", 1.0, 1.0),
                LocationFeature::new("ROM_3", 1.0, 1.0),
            ],
        )];

        let outcome = engine.fuse(&feeds);

        assert!(outcome.records.keys().all(|id| engine.catalog_ids.contains(id)));
    }
}
