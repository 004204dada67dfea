// 🗄️ SQLite snapshot store
// Keeps the last located catalog and an audit trail of pipeline runs.

use crate::catalog::{Catalog, CatalogEntry, Coordinate};
use crate::identifier::CanonicalId;
use crate::report::DiagnosticReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// One audited pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,

    /// "locate" or "to-flash"
    pub kind: String,

    pub summary: serde_json::Value,
}

impl RunRecord {
    pub fn new(kind: &str, report: &DiagnosticReport) -> Result<Self> {
        Ok(RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: report.generated_at,
            kind: kind.to_string(),
            summary: report.to_json()?,
        })
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Catalog snapshot, position keeps ingestion order
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS invaders (
            name TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            points INTEGER NOT NULL,
            status_description TEXT NOT NULL,
            picture_url TEXT,
            description TEXT,
            lon REAL,
            lat REAL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Run audit trail
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            kind TEXT NOT NULL,
            summary TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_invaders_position ON invaders(position)",
        [],
    )?;

    Ok(())
}

/// Mirror the catalog: upsert every entry, drop rows no longer in it.
/// Existing rows keep their position.
pub fn save_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let stored: Vec<String> = {
            let mut stmt = tx.prepare("SELECT name FROM invaders")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            names
        };

        let mut delete = tx.prepare("DELETE FROM invaders WHERE name = ?1")?;
        let mut removed = 0;
        for name in stored {
            let still_listed = name
                .parse::<CanonicalId>()
                .map(|id| catalog.contains(&id))
                .unwrap_or(false);
            if !still_listed {
                delete.execute(params![name])?;
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "Dropped invaders no longer in the catalog");
        }

        let next_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM invaders",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = tx.prepare(
            "INSERT INTO invaders (
                name, position, points, status_description, picture_url, description, lon, lat
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(name) DO UPDATE SET
                points = excluded.points,
                status_description = excluded.status_description,
                picture_url = excluded.picture_url,
                description = excluded.description,
                lon = excluded.lon,
                lat = excluded.lat,
                updated_at = CURRENT_TIMESTAMP",
        )?;

        for (offset, entry) in catalog.entries().iter().enumerate() {
            stmt.execute(params![
                entry.id.to_string(),
                next_position + offset as i64,
                entry.points,
                entry.status_description,
                entry.picture_url,
                entry.description,
                entry.location.map(|c| c.longitude),
                entry.location.map(|c| c.latitude),
            ])?;
        }
    }
    tx.commit()?;

    Ok(catalog.len())
}

/// Load the snapshot in ingestion order
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut stmt = conn.prepare(
        "SELECT name, points, status_description, picture_url, description, lon, lat
         FROM invaders
         ORDER BY position ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<f64>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for (name, points, status_description, picture_url, description, lon, lat) in rows {
        let id: CanonicalId = name
            .parse()
            .with_context(|| format!("Corrupt invader name in store: {}", name))?;
        let location = match (lon, lat) {
            (Some(lon), Some(lat)) => Some(Coordinate::new(lon, lat)),
            _ => None,
        };
        entries.push(CatalogEntry {
            id,
            points,
            status_description,
            picture_url,
            description,
            location,
        });
    }

    Ok(Catalog::from_entries(entries))
}

pub fn catalog_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM invaders", [], |row| row.get(0))?;
    Ok(count)
}

pub fn record_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    let summary_json = serde_json::to_string(&run.summary)?;

    conn.execute(
        "INSERT INTO runs (run_id, timestamp, kind, summary) VALUES (?1, ?2, ?3, ?4)",
        params![run.run_id, run.timestamp.to_rfc3339(), run.kind, summary_json],
    )?;

    Ok(())
}

/// Most recent runs first
pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, timestamp, kind, summary FROM runs ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(run_id, timestamp, kind, summary)| {
            Ok(RunRecord {
                run_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .context("Corrupt run timestamp")?
                    .with_timezone(&Utc),
                kind,
                summary: serde_json::from_str(&summary).context("Corrupt run summary")?,
            })
        })
        .collect()
}
