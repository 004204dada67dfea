// Invader Tracker - Core Library
// Reconciles the scraped invader catalog with crowd-mapped locations and the
// user's flashed lists. Used by the CLI and the tests.

pub mod error;
pub mod identifier;     // Label normalization
pub mod status;         // Status -> style category
pub mod catalog;        // Ordered, id-keyed catalog
pub mod fusion;         // Ranked location feeds -> one location per id
pub mod feeds;          // Feed providers, parallel fetch
pub mod matcher;        // Flashed labels -> catalog ids
pub mod reconciliation; // What is left to flash
pub mod report;         // Diagnostics printed after every run
pub mod pipeline;
pub mod files;
pub mod store;
pub mod config;

// Re-export commonly used types
pub use error::InvaderError;
pub use identifier::{
    normalize_loose, normalize_strict, repair_names, scan, CanonicalId, RepairedName, ScannedLabel,
};
pub use status::{classify, is_unflashable, StatusCategory};
pub use catalog::{Catalog, CatalogEntry, Coordinate, IngestReport, RawCatalogRecord};
pub use fusion::{DuplicateClaim, FusionOutcome, LocationFeature, LocationFeed, LocationFusionEngine, LocationRecord};
pub use feeds::{fetch_all, parse_geojson, FeedProvider, GeoJsonFileFeed, HttpGeoJsonFeed};
pub use matcher::{CatalogIndex, FlashedMatcher, MatchOutcome, Resolution};
pub use reconciliation::{category_counts, exclusion_set, reconcile, ReconciledEntry};
pub use report::DiagnosticReport;
pub use pipeline::{fetch_and_locate, locate, to_flash};
pub use files::{
    load_catalog_csv, load_located_csv, load_names, read_name_slots, write_located_csv,
    write_reconciled_csv,
};
pub use store::{
    catalog_count, load_catalog, recent_runs, record_run, save_catalog, setup_database, RunRecord,
};
pub use config::{Config, FeedConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
