// ⚖️ Catalog Reconciliation
// Produces the list of invaders still to flash:
//   not flashed AND not excluded AND not destroyed/invisible
//
// Pure filter over the located catalog. Output keeps catalog order and never
// alters entry fields; the style category is derived on the way out.

use crate::catalog::{Catalog, CatalogEntry};
use crate::identifier::{normalize_loose, CanonicalId};
use crate::status::{classify, is_unflashable, StatusCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// RECONCILED ENTRY
// ============================================================================

/// One row handed to the output writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntry {
    pub name: String,
    pub points: u32,
    pub status_description: String,
    pub picture_url: Option<String>,
    pub description: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub category: StatusCategory,
}

impl From<&CatalogEntry> for ReconciledEntry {
    fn from(entry: &CatalogEntry) -> Self {
        ReconciledEntry {
            name: entry.id.to_string(),
            points: entry.points,
            status_description: entry.status_description.clone(),
            picture_url: entry.picture_url.clone(),
            description: entry.description.clone(),
            lon: entry.location.map(|c| c.longitude),
            lat: entry.location.map(|c| c.latitude),
            category: classify(&entry.status_description, entry.points),
        }
    }
}

// ============================================================================
// RECONCILIATION
// ============================================================================

/// Why an entry was left out, first reason wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Flashed,
    Excluded,
    Unflashable,
}

/// Decide whether an entry is still to flash
pub fn exclusion_reason(
    entry: &CatalogEntry,
    flashed: &HashSet<CanonicalId>,
    excluded: Option<&HashSet<CanonicalId>>,
) -> Option<Exclusion> {
    if flashed.contains(&entry.id) {
        return Some(Exclusion::Flashed);
    }
    if excluded.is_some_and(|set| set.contains(&entry.id)) {
        return Some(Exclusion::Excluded);
    }
    if is_unflashable(&entry.status_description) {
        return Some(Exclusion::Unflashable);
    }
    None
}

/// Filter the catalog down to the invaders left to flash
pub fn reconcile(
    catalog: &Catalog,
    flashed: &HashSet<CanonicalId>,
    excluded: Option<&HashSet<CanonicalId>>,
) -> Vec<ReconciledEntry> {
    let remaining: Vec<ReconciledEntry> = catalog
        .entries()
        .iter()
        .filter(|entry| exclusion_reason(entry, flashed, excluded).is_none())
        .map(ReconciledEntry::from)
        .collect();

    tracing::info!(
        catalog = catalog.len(),
        remaining = remaining.len(),
        "Catalog reconciled"
    );

    remaining
}

/// Normalize an exclusion list. Unparsable names are logged and dropped.
pub fn exclusion_set<N, S>(names: N) -> HashSet<CanonicalId>
where
    N: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| match normalize_loose(name.as_ref()) {
            Ok(id) => Some(id),
            Err(err) => {
                tracing::warn!(error = %err, "Ignored exclusion entry");
                None
            }
        })
        .collect()
}

/// Count of entries per style category, in a stable order
pub fn category_counts(entries: &[ReconciledEntry]) -> Vec<(StatusCategory, usize)> {
    let order = [
        StatusCategory::TopTier,
        StatusCategory::MidTier,
        StatusCategory::Degraded,
        StatusCategory::Destroyed,
        StatusCategory::Unknown,
    ];
    order
        .iter()
        .map(|category| (*category, entries.iter().filter(|e| e.category == *category).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Coordinate;
    use crate::matcher::FlashedMatcher;

    fn create_test_entry(name: &str, points: u32, status: &str) -> CatalogEntry {
        CatalogEntry::new(normalize_loose(name).unwrap(), points, status)
    }

    #[test]
    fn test_destroyed_entries_are_dropped() {
        let catalog = Catalog::from_entries(vec![
            create_test_entry("PA_12", 100, "OK"),
            create_test_entry("PA_05", 50, "Destroyed"),
        ]);

        let result = reconcile(&catalog, &HashSet::new(), None);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "PA_12");
        assert_eq!(result[0].category, StatusCategory::TopTier);
    }

    #[test]
    fn test_flashed_entry_is_dropped() {
        let catalog = Catalog::from_entries(vec![
            create_test_entry("PA_12", 100, "OK"),
            create_test_entry("PA_13", 50, "OK"),
        ]);

        let outcome = FlashedMatcher::new(&catalog).match_names(["pa-0012 extra text"]);
        let result = reconcile(&catalog, &outcome.flashed, None);

        let names: Vec<&str> = result.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["PA_13"]);
    }

    #[test]
    fn test_flashed_and_excluded_counted_once() {
        let catalog = Catalog::from_entries(vec![
            create_test_entry("PA_1", 10, "OK"),
            create_test_entry("PA_2", 10, "OK"),
        ]);
        let flashed: HashSet<CanonicalId> = [CanonicalId::new("PA", 1)].into_iter().collect();
        let excluded = exclusion_set(["PA_001", "not an id"]);

        let result = reconcile(&catalog, &flashed, Some(&excluded));

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "PA_02");
        assert_eq!(excluded.len(), 1);
        assert_eq!(
            exclusion_reason(&catalog.entries()[0], &flashed, Some(&excluded)),
            Some(Exclusion::Flashed)
        );
    }

    #[test]
    fn test_order_and_fields_preserved() {
        let mut located = create_test_entry("LDN_3", 50, "OK");
        located.location = Some(Coordinate::new(-0.12, 51.5));
        located.description = Some("LDN_03 Soho".to_string());
        located.picture_url = Some("https://example.org/ldn3.jpg".to_string());

        let catalog = Catalog::from_entries(vec![
            create_test_entry("PA_9", 20, "Degraded"),
            located,
            create_test_entry("AMI_1", 30, "Non visible"),
            create_test_entry("PA_2", 10, "Unknown"),
        ]);

        let result = reconcile(&catalog, &HashSet::new(), None);

        let names: Vec<&str> = result.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["PA_09", "LDN_03", "PA_02"]);

        let ldn = &result[1];
        assert_eq!(ldn.lon, Some(-0.12));
        assert_eq!(ldn.lat, Some(51.5));
        assert_eq!(ldn.description.as_deref(), Some("LDN_03 Soho"));
        assert_eq!(ldn.category, StatusCategory::MidTier);
        assert_eq!(result[0].category, StatusCategory::Degraded);
    }

    #[test]
    fn test_category_counts() {
        let catalog = Catalog::from_entries(vec![
            create_test_entry("PA_1", 100, "OK"),
            create_test_entry("PA_2", 100, "OK"),
            create_test_entry("PA_3", 20, "Degraded"),
        ]);
        let result = reconcile(&catalog, &HashSet::new(), None);

        assert_eq!(
            category_counts(&result),
            vec![(StatusCategory::TopTier, 2), (StatusCategory::Degraded, 1)]
        );
    }
}
