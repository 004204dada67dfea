// 🔗 Pipeline
// Stages threaded through explicit inputs and outputs:
//   raw records -> Catalog -> fusion -> located Catalog
//   located Catalog + flashed names + exclusions -> to-flash list

use crate::catalog::{Catalog, RawCatalogRecord};
use crate::error::Result;
use crate::feeds::{fetch_all, FeedProvider};
use crate::fusion::{LocationFeed, LocationFusionEngine};
use crate::matcher::FlashedMatcher;
use crate::reconciliation::{exclusion_set, reconcile, ReconciledEntry};
use crate::report::DiagnosticReport;

/// Ingest the scraper dump and attach locations from already fetched feeds
pub fn locate(records: &[RawCatalogRecord], feeds: &[LocationFeed]) -> (Catalog, DiagnosticReport) {
    let (mut catalog, ingest) = Catalog::ingest(records);

    let fusion = LocationFusionEngine::from_catalog(&catalog).fuse(feeds);
    catalog.apply_locations(&fusion.records);

    let report = DiagnosticReport::new(&catalog)
        .with_ingest(&ingest)
        .with_fusion(&fusion);

    (catalog, report)
}

/// Fetch every provider, then locate. A failed fetch aborts before fusion.
pub fn fetch_and_locate(
    records: &[RawCatalogRecord],
    providers: &[Box<dyn FeedProvider>],
) -> Result<(Catalog, DiagnosticReport)> {
    let feeds = fetch_all(providers)?;
    Ok(locate(records, &feeds))
}

/// Match flashed names, apply exclusions and keep what is left to flash
pub fn to_flash(
    catalog: &Catalog,
    flashed_names: &[String],
    exclusion_names: Option<&[String]>,
) -> (Vec<ReconciledEntry>, DiagnosticReport) {
    let matches = FlashedMatcher::new(catalog).match_names(flashed_names);
    let excluded = exclusion_names.map(exclusion_set);

    let remaining = reconcile(catalog, &matches.flashed, excluded.as_ref());

    let report = DiagnosticReport::new(catalog)
        .with_matches(&matches)
        .with_remaining(remaining.len());

    (remaining, report)
}
