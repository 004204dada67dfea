// 📚 Invader Catalog
// Ordered, id-keyed collection of scraped invaders. Entries are never removed;
// fusion fills in locations, reconciliation only filters its output.

use crate::fusion::LocationRecord;
use crate::identifier::{normalize_strict, CanonicalId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// RECORD TYPES
// ============================================================================

/// (longitude, latitude) in that order, as GeoJSON stores it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Coordinate { longitude, latitude }
    }

    /// Both components are finite numbers
    pub fn is_usable(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// Row as written by the scraper, before validation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCatalogRecord {
    pub name: String,

    /// Usually "100", "50"... the site prints "??" for unrated invaders
    pub points: String,

    pub status_description: String,

    #[serde(default)]
    pub picture_url: Option<String>,
}

/// Validated catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CanonicalId,
    pub points: u32,
    pub status_description: String,
    pub picture_url: Option<String>,

    /// Label of the feed feature the location came from
    pub description: Option<String>,

    pub location: Option<Coordinate>,
}

impl CatalogEntry {
    pub fn new(id: CanonicalId, points: u32, status_description: &str) -> Self {
        CatalogEntry {
            id,
            points,
            status_description: status_description.to_string(),
            picture_url: None,
            description: None,
            location: None,
        }
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }
}

/// What happened while turning raw records into a catalog
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Raw names with no identifier in their first token
    pub unresolved: Vec<String>,

    /// Raw names whose points could not be read (stored as 0)
    pub unparsed_points: Vec<String>,

    /// Records that replaced an earlier record with the same id
    pub overwritten: usize,
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<CanonicalId, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Build a catalog from already validated entries (e.g. a located CSV)
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        let mut catalog = Catalog::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Validate scraped records in strict mode
    ///
    /// Unresolved names are reported and left out: they would all collapse
    /// onto the same sentinel key.
    pub fn ingest(records: &[RawCatalogRecord]) -> (Catalog, IngestReport) {
        let mut catalog = Catalog::new();
        let mut report = IngestReport::default();

        for record in records {
            let id = normalize_strict(&record.name);
            if id.is_unresolved() {
                report.unresolved.push(record.name.clone());
                continue;
            }

            let points = match record.points.trim().parse::<u32>() {
                Ok(points) => points,
                Err(_) => {
                    tracing::warn!(name = %record.name, points = %record.points, "Unreadable points, using 0");
                    report.unparsed_points.push(record.name.clone());
                    0
                }
            };

            let entry = CatalogEntry {
                id,
                points,
                status_description: record.status_description.clone(),
                picture_url: record.picture_url.clone().filter(|url| !url.is_empty()),
                description: None,
                location: None,
            };

            if catalog.insert(entry) {
                report.overwritten += 1;
            }
        }

        tracing::info!(
            entries = catalog.len(),
            unresolved = report.unresolved.len(),
            overwritten = report.overwritten,
            "Catalog ingested"
        );

        (catalog, report)
    }

    /// Insert or overwrite. An overwritten entry keeps its original position.
    /// Returns true when an earlier entry was replaced.
    pub fn insert(&mut self, entry: CatalogEntry) -> bool {
        match self.index.get(&entry.id) {
            Some(&position) => {
                self.entries[position] = entry;
                true
            }
            None => {
                self.index.insert(entry.id.clone(), self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }

    pub fn get(&self, id: &CanonicalId) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, id: &CanonicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Entries in ingestion order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = &CanonicalId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy fused locations onto their entries. Records for ids outside the
    /// catalog are ignored. Returns the number of entries updated.
    pub fn apply_locations(&mut self, records: &HashMap<CanonicalId, LocationRecord>) -> usize {
        let mut updated = 0;
        for (id, record) in records {
            if let Some(&position) = self.index.get(id) {
                let entry = &mut self.entries[position];
                entry.location = Some(record.coordinate);
                entry.description = Some(record.description.clone());
                updated += 1;
            }
        }
        updated
    }

    pub fn located_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_located()).count()
    }

    /// Ids without a location, grouped by status
    pub fn missing_locations_by_status(&self) -> BTreeMap<String, Vec<CanonicalId>> {
        let mut missing: BTreeMap<String, Vec<CanonicalId>> = BTreeMap::new();
        for entry in self.entries.iter().filter(|e| !e.is_located()) {
            missing
                .entry(entry.status_description.clone())
                .or_default()
                .push(entry.id.clone());
        }
        missing
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_raw_record(name: &str, points: &str, status: &str) -> RawCatalogRecord {
        RawCatalogRecord {
            name: name.to_string(),
            points: points.to_string(),
            status_description: status.to_string(),
            picture_url: Some(format!("https://example.org/{}.jpg", name)),
        }
    }

    #[test]
    fn test_ingest_normalizes_ids() {
        let records = vec![
            create_raw_record("PA_0012", "100", "OK"),
            create_raw_record("LDN_2", "50", "Degraded"),
        ];

        let (catalog, report) = Catalog::ingest(&records);

        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(&CanonicalId::new("PA", 12)));
        assert!(catalog.contains(&CanonicalId::new("LDN", 2)));
        assert!(report.unresolved.is_empty());
        assert_eq!(report.overwritten, 0);
    }

    #[test]
    fn test_ingest_later_duplicate_overwrites_in_place() {
        let records = vec![
            create_raw_record("PA_12", "50", "OK"),
            create_raw_record("PA_13", "20", "OK"),
            create_raw_record("PA_012", "100", "Degraded"),
        ];

        let (catalog, report) = Catalog::ingest(&records);

        assert_eq!(catalog.len(), 2);
        assert_eq!(report.overwritten, 1);

        let first = &catalog.entries()[0];
        assert_eq!(first.id.to_string(), "PA_12");
        assert_eq!(first.points, 100);
        assert_eq!(first.status_description, "Degraded");
    }

    #[test]
    fn test_ingest_flags_unresolved_and_bad_points() {
        let records = vec![
            create_raw_record("not an invader", "100", "OK"),
            create_raw_record("PA_7", "??", "OK"),
        ];

        let (catalog, report) = Catalog::ingest(&records);

        assert_eq!(catalog.len(), 1);
        assert_eq!(report.unresolved, vec!["not an invader".to_string()]);
        assert_eq!(report.unparsed_points, vec!["PA_7".to_string()]);
        assert_eq!(catalog.get(&CanonicalId::new("PA", 7)).unwrap().points, 0);
    }

    #[test]
    fn test_apply_locations_and_missing_report() {
        let mut catalog = Catalog::from_entries(vec![
            CatalogEntry::new(CanonicalId::new("PA", 1), 10, "OK"),
            CatalogEntry::new(CanonicalId::new("PA", 2), 10, "OK"),
            CatalogEntry::new(CanonicalId::new("PA", 3), 10, "Destroyed"),
        ]);

        let mut records = HashMap::new();
        records.insert(
            CanonicalId::new("PA", 1),
            LocationRecord {
                id: CanonicalId::new("PA", 1),
                description: "PA_01 rue X".to_string(),
                coordinate: Coordinate::new(2.35, 48.85),
            },
        );
        records.insert(
            CanonicalId::new("XX", 9),
            LocationRecord {
                id: CanonicalId::new("XX", 9),
                description: "XX_09".to_string(),
                coordinate: Coordinate::new(0.0, 0.0),
            },
        );

        let updated = catalog.apply_locations(&records);

        assert_eq!(updated, 1);
        assert_eq!(catalog.located_count(), 1);
        let located = catalog.get(&CanonicalId::new("PA", 1)).unwrap();
        assert_eq!(located.location, Some(Coordinate::new(2.35, 48.85)));
        assert_eq!(located.description.as_deref(), Some("PA_01 rue X"));

        let missing = catalog.missing_locations_by_status();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing["OK"], vec![CanonicalId::new("PA", 2)]);
        assert_eq!(missing["Destroyed"], vec![CanonicalId::new("PA", 3)]);
    }

    #[test]
    fn test_empty_picture_url_is_none() {
        let mut record = create_raw_record("PA_1", "10", "OK");
        record.picture_url = Some(String::new());

        let (catalog, _) = Catalog::ingest(&[record]);
        assert_eq!(catalog.entries()[0].picture_url, None);
    }
}
