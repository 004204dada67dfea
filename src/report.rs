// 📋 Diagnostic Report
// Printed on completion of every run: what was ignored, not found, claimed
// twice, and which invaders still have no location.

use crate::catalog::{Catalog, IngestReport};
use crate::fusion::{DuplicateClaim, FusionOutcome};
use crate::matcher::MatchOutcome;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub generated_at: DateTime<Utc>,

    /// Catalog names with no identifier in their first token
    pub unresolved: Vec<String>,

    /// Feed or list names with no identifier at all
    pub ignored: Vec<String>,

    /// Flashed names that matched nothing, even after padding repair
    pub not_found: Vec<String>,

    /// Feed features whose id is not in the catalog
    pub unknown: Vec<String>,

    /// Feed features without a usable coordinate
    pub malformed: Vec<String>,

    pub duplicates: Vec<DuplicateClaim>,

    /// Status -> number of entries without a location
    pub missing_locations_by_status: BTreeMap<String, usize>,

    pub catalog_size: usize,
    pub located: usize,

    /// Set once reconciliation ran
    pub remaining: Option<usize>,
}

impl DiagnosticReport {
    pub fn new(catalog: &Catalog) -> Self {
        let mut report = DiagnosticReport {
            generated_at: Utc::now(),
            unresolved: Vec::new(),
            ignored: Vec::new(),
            not_found: Vec::new(),
            unknown: Vec::new(),
            malformed: Vec::new(),
            duplicates: Vec::new(),
            missing_locations_by_status: BTreeMap::new(),
            catalog_size: 0,
            located: 0,
            remaining: None,
        };
        report.refresh_locations(catalog);
        report
    }

    /// Recount location coverage after fusion was applied
    pub fn refresh_locations(&mut self, catalog: &Catalog) {
        self.catalog_size = catalog.len();
        self.located = catalog.located_count();
        self.missing_locations_by_status = catalog
            .missing_locations_by_status()
            .into_iter()
            .map(|(status, ids)| (status, ids.len()))
            .collect();
    }

    pub fn with_ingest(mut self, ingest: &IngestReport) -> Self {
        self.unresolved.extend(ingest.unresolved.iter().cloned());
        self
    }

    pub fn with_fusion(mut self, fusion: &FusionOutcome) -> Self {
        self.ignored.extend(fusion.ignored.iter().cloned());
        self.unknown.extend(fusion.unknown.iter().cloned());
        self.malformed.extend(fusion.malformed.iter().cloned());
        self.duplicates.extend(fusion.duplicates.iter().cloned());
        self
    }

    pub fn with_matches(mut self, matches: &MatchOutcome) -> Self {
        self.ignored.extend(matches.ignored.iter().cloned());
        self.not_found.extend(matches.not_found.iter().cloned());
        self
    }

    pub fn with_remaining(mut self, remaining: usize) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn missing_locations(&self) -> usize {
        self.missing_locations_by_status.values().sum()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} invaders, {} located, {} ignored, {} not found, {} duplicate claims",
            self.catalog_size,
            self.located,
            self.ignored.len(),
            self.not_found.len(),
            self.duplicates.len()
        );
        if let Some(remaining) = self.remaining {
            summary.push_str(&format!(", {} left to flash", remaining));
        }
        summary
    }

    /// Markdown table of missing locations, biggest groups first
    pub fn render_table(&self) -> String {
        let mut rows: Vec<(&String, &usize)> = self.missing_locations_by_status.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let status_width = rows
            .iter()
            .map(|(status, _)| status.chars().count())
            .chain(std::iter::once("Status".len()))
            .max()
            .unwrap_or(0);
        let count_header = "# of missing locations";

        let mut out = String::new();
        out.push_str(&format!("| {:<w$} | {} |\n", "Status", count_header, w = status_width));
        out.push_str(&format!(
            "|:{}-|-{}:|\n",
            "-".repeat(status_width),
            "-".repeat(count_header.len())
        ));
        for (status, count) in rows {
            out.push_str(&format!(
                "| {:<w$} | {:>c$} |\n",
                status,
                count,
                w = status_width,
                c = count_header.len()
            ));
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogEntry, Coordinate};
    use crate::identifier::CanonicalId;

    fn create_test_catalog() -> Catalog {
        let mut located = CatalogEntry::new(CanonicalId::new("PA", 1), 100, "OK");
        located.location = Some(Coordinate::new(2.3, 48.8));

        Catalog::from_entries(vec![
            located,
            CatalogEntry::new(CanonicalId::new("PA", 2), 50, "OK"),
            CatalogEntry::new(CanonicalId::new("PA", 3), 50, "Destroyed"),
            CatalogEntry::new(CanonicalId::new("PA", 4), 50, "Destroyed"),
        ])
    }

    #[test]
    fn test_missing_locations_grouped() {
        let report = DiagnosticReport::new(&create_test_catalog());

        assert_eq!(report.catalog_size, 4);
        assert_eq!(report.located, 1);
        assert_eq!(report.missing_locations(), 3);
        assert_eq!(report.missing_locations_by_status["Destroyed"], 2);
        assert_eq!(report.missing_locations_by_status["OK"], 1);
    }

    #[test]
    fn test_table_sorted_by_count() {
        let report = DiagnosticReport::new(&create_test_catalog());
        let table = report.render_table();
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("# of missing locations"));
        assert!(lines[2].starts_with("| Destroyed"));
        assert!(lines[2].trim_end().ends_with("2 |"));
        assert!(lines[3].starts_with("| OK"));
    }

    #[test]
    fn test_summary_and_json() {
        let matches = MatchOutcome {
            ignored: vec!["hello".to_string()],
            not_found: vec!["ROM_1".to_string()],
            ..MatchOutcome::default()
        };
        let report = DiagnosticReport::new(&create_test_catalog())
            .with_matches(&matches)
            .with_remaining(2);

        assert_eq!(
            report.summary(),
            "4 invaders, 1 located, 1 ignored, 1 not found, 0 duplicate claims, 2 left to flash"
        );

        let json = report.to_json().unwrap();
        assert_eq!(json["not_found"][0], "ROM_1");
        assert_eq!(json["remaining"], 2);
    }
}
