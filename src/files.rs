// 📂 CSV files
// Reading the scraper dump and user lists, writing the located catalog and the
// to-flash list. Plain logical records only; KML/GPX encoding lives elsewhere.

use crate::catalog::{Catalog, CatalogEntry, Coordinate, RawCatalogRecord};
use crate::identifier::CanonicalId;
use crate::reconciliation::ReconciledEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Row of the located catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedRow {
    pub name: CanonicalId,
    pub points: u32,
    pub status_description: String,
    pub picture_url: Option<String>,
    pub description: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl From<&CatalogEntry> for LocatedRow {
    fn from(entry: &CatalogEntry) -> Self {
        LocatedRow {
            name: entry.id.clone(),
            points: entry.points,
            status_description: entry.status_description.clone(),
            picture_url: entry.picture_url.clone(),
            description: entry.description.clone(),
            lon: entry.location.map(|c| c.longitude),
            lat: entry.location.map(|c| c.latitude),
        }
    }
}

impl From<LocatedRow> for CatalogEntry {
    fn from(row: LocatedRow) -> Self {
        let location = match (row.lon, row.lat) {
            (Some(lon), Some(lat)) => Some(Coordinate::new(lon, lat)),
            _ => None,
        };
        CatalogEntry {
            id: row.name,
            points: row.points,
            status_description: row.status_description,
            picture_url: row.picture_url,
            description: row.description,
            location,
        }
    }
}

/// Load the scraper dump (`name,points,status_description,picture_url`)
pub fn load_catalog_csv(csv_path: &Path) -> Result<Vec<RawCatalogRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open catalog CSV: {}", csv_path.display()))?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawCatalogRecord = result.context("Failed to deserialize catalog record")?;
        records.push(record);
    }

    Ok(records)
}

pub fn write_located_csv(csv_path: &Path, catalog: &Catalog) -> Result<()> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    for entry in catalog.entries() {
        wtr.serialize(LocatedRow::from(entry))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Load a catalog previously written by `write_located_csv`
pub fn load_located_csv(csv_path: &Path) -> Result<Catalog> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open located catalog: {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for result in rdr.deserialize() {
        let row: LocatedRow = result.context("Failed to deserialize located row")?;
        entries.push(CatalogEntry::from(row));
    }

    Ok(Catalog::from_entries(entries))
}

pub fn write_reconciled_csv(csv_path: &Path, entries: &[ReconciledEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    for entry in entries {
        wtr.serialize(entry)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read one name per slot, keeping blanks as `None`
///
/// Accepts a CSV with a `name` column, or plain text with one name per line.
pub fn read_name_slots(path: &Path) -> Result<Vec<Option<String>>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read name list: {}", path.display()))?;
    parse_name_slots(&content)
}

fn parse_name_slots(content: &str) -> Result<Vec<Option<String>>> {
    let non_blank = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };

    let first_line = content.lines().next().unwrap_or_default();
    let has_name_header = first_line
        .split(',')
        .any(|column| column.trim().eq_ignore_ascii_case("name"));

    if !has_name_header {
        return Ok(content.lines().map(non_blank).collect());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let column = rdr
        .headers()?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("name"))
        .context("Missing 'name' column")?;

    let mut names = Vec::new();
    for record in rdr.records() {
        let record = record.context("Failed to read name list row")?;
        names.push(record.get(column).and_then(non_blank));
    }
    Ok(names)
}

/// Non-blank names of a list
pub fn load_names(path: &Path) -> Result<Vec<String>> {
    Ok(read_name_slots(path)?.into_iter().flatten().collect())
}
