// 🔍 Flashed Matcher
// Resolves "already flashed" labels from user lists to catalog ids.
//
// Labels are normalized first. When the normalized id is not in the catalog,
// a bounded padding repair strips leading zeros from the raw digit run, one
// at a time, and re-checks membership. PA_00012 is read as PA_01 (four digit
// cap) but repaired to PA_12.

use crate::catalog::Catalog;
use crate::error::InvaderError;
use crate::identifier::{scan, CanonicalId, MAX_CODE_DIGITS};
use serde::Serialize;
use std::collections::HashSet;

/// Shortest code the repair loop will strip down to
const MIN_CODE_DIGITS: usize = 2;

// ============================================================================
// CATALOG INDEX
// ============================================================================

/// Membership lookup used by the matcher
pub trait CatalogIndex {
    fn contains_id(&self, id: &CanonicalId) -> bool;
}

impl CatalogIndex for Catalog {
    fn contains_id(&self, id: &CanonicalId) -> bool {
        self.contains(id)
    }
}

impl CatalogIndex for HashSet<CanonicalId> {
    fn contains_id(&self, id: &CanonicalId) -> bool {
        self.contains(id)
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Final result for one raw label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    /// Found in the catalog after `retries` padding repairs
    Matched { id: CanonicalId, retries: usize },

    /// No identifier in the label at all
    Ignored,

    /// Identifier found but no catalog entry, even after repair
    NotFound { retries: usize },
}

/// Padding repair state machine
///
/// `retries` counts membership checks after the normalized one. Candidates
/// that derive the id already checked are skipped without a lookup.
#[derive(Debug, Clone, PartialEq)]
enum RepairState {
    Unresolved {
        candidate: String,
        steps: usize,
        retries: usize,
        last_checked: CanonicalId,
    },
    Matched { id: CanonicalId, retries: usize },
    ExhaustedRetries { retries: usize },
}

/// A candidate can lose a zero while it keeps more than two digits
fn is_reducible(candidate: &str) -> bool {
    candidate.len() > MIN_CODE_DIGITS && candidate.starts_with('0')
}

/// Aggregated result for a batch of labels
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub flashed: HashSet<CanonicalId>,

    /// Labels without an identifier
    pub ignored: Vec<String>,

    /// Labels with an identifier missing from the catalog
    pub not_found: Vec<String>,
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct FlashedMatcher<'a, I: CatalogIndex + ?Sized> {
    index: &'a I,
}

impl<'a, I: CatalogIndex + ?Sized> FlashedMatcher<'a, I> {
    pub fn new(index: &'a I) -> Self {
        FlashedMatcher { index }
    }

    /// Resolve every label, collecting matches and diagnostics
    pub fn match_names<N, S>(&self, names: N) -> MatchOutcome
    where
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = MatchOutcome::default();

        for name in names {
            let raw = name.as_ref();
            match self.resolve(raw) {
                Resolution::Matched { id, retries } => {
                    if retries > 0 {
                        tracing::debug!(raw = %raw, %id, retries, "Matched after padding repair");
                    }
                    outcome.flashed.insert(id);
                }
                Resolution::Ignored => {
                    tracing::warn!(raw = %raw, "Ignored: no identifier");
                    outcome.ignored.push(raw.to_string());
                }
                Resolution::NotFound { retries } => {
                    let err = InvaderError::RetryExhausted {
                        raw: raw.to_string(),
                        attempts: retries,
                    };
                    tracing::warn!(error = %err, "Not found in catalog");
                    outcome.not_found.push(raw.to_string());
                }
            }
        }

        tracing::info!(
            flashed = outcome.flashed.len(),
            ignored = outcome.ignored.len(),
            not_found = outcome.not_found.len(),
            "Flashed names matched"
        );

        outcome
    }

    /// Resolve a single label
    pub fn resolve(&self, raw: &str) -> Resolution {
        let label = match scan(raw) {
            Some(label) => label,
            None => return Resolution::Ignored,
        };

        let id = label.canonical();
        if self.index.contains_id(&id) {
            return Resolution::Matched { id, retries: 0 };
        }

        // Bounded by the digit count so adversarial runs of zeros terminate
        let max_steps = label.digit_run.len();
        let mut state = RepairState::Unresolved {
            candidate: label.digit_run.clone(),
            steps: 0,
            retries: 0,
            last_checked: id,
        };

        loop {
            state = match state {
                RepairState::Unresolved {
                    candidate,
                    steps,
                    retries,
                    last_checked,
                } => {
                    if steps >= max_steps || !is_reducible(&candidate) {
                        RepairState::ExhaustedRetries { retries }
                    } else {
                        self.repair_step(&label.prefix, &candidate, steps + 1, retries, last_checked)
                    }
                }
                RepairState::Matched { id, retries } => {
                    return Resolution::Matched { id, retries };
                }
                RepairState::ExhaustedRetries { retries } => {
                    return Resolution::NotFound { retries };
                }
            };
        }
    }

    /// Strip one leading zero and re-check membership when the id changed
    fn repair_step(
        &self,
        prefix: &str,
        candidate: &str,
        steps: usize,
        mut retries: usize,
        mut last_checked: CanonicalId,
    ) -> RepairState {
        let next = &candidate[1..];

        // Longer runs cannot be an id yet, keep stripping
        if next.len() <= MAX_CODE_DIGITS {
            if let Ok(code) = next.parse::<u32>() {
                let id = CanonicalId::new(prefix, code);
                if id != last_checked {
                    retries += 1;
                    if self.index.contains_id(&id) {
                        return RepairState::Matched { id, retries };
                    }
                    last_checked = id;
                }
            }
        }

        RepairState::Unresolved {
            candidate: next.to_string(),
            steps,
            retries,
            last_checked,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
