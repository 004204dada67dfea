// 🏷️ Identifier Normalization
// Canonicalizes loosely-formatted invader labels ("pa-0012 rue X", "PA_12")
// into a structured CanonicalId. Identity is numeric: PA_0012 == PA_012 == PA_12.

use crate::error::{InvaderError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix, underscore, then the digit run. The code itself is capped to the
/// first four digits of the run.
static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]+)_([0-9]+)").expect("label pattern is valid"));

/// Maximum number of digits taken as the numeric code
pub const MAX_CODE_DIGITS: usize = 4;

const UNRESOLVED_PREFIX: &str = "ERR";
const UNRESOLVED_CODE: u32 = 404;

// ============================================================================
// CANONICAL ID
// ============================================================================

/// Normalized invader identifier, e.g. `PA_12`, `LDN_02`
///
/// Equality and hashing use the numeric code, never the original string, so
/// every padding variant of a label maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId {
    prefix: String,
    code: u32,
}

impl CanonicalId {
    /// Build an id from already-validated parts. The prefix is uppercased.
    pub fn new(prefix: &str, code: u32) -> Self {
        CanonicalId {
            prefix: prefix.to_uppercase(),
            code,
        }
    }

    /// Sentinel used by catalog repair when a label cannot be parsed
    pub fn unresolved() -> Self {
        CanonicalId::new(UNRESOLVED_PREFIX, UNRESOLVED_CODE)
    }

    pub fn is_unresolved(&self) -> bool {
        self.prefix == UNRESOLVED_PREFIX && self.code == UNRESOLVED_CODE
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn code(&self) -> u32 {
        self.code
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:02}", self.prefix, self.code)
    }
}

impl FromStr for CanonicalId {
    type Err = InvaderError;

    fn from_str(s: &str) -> Result<Self> {
        normalize_loose(s)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = InvaderError;

    fn try_from(value: String) -> Result<Self> {
        normalize_loose(&value)
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// SCANNING
// ============================================================================

/// Raw pieces of the first identifier found in a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLabel {
    /// Uppercase letters before the underscore
    pub prefix: String,

    /// First 1-4 digits after the underscore, as written
    pub code_digits: String,

    /// Every consecutive digit after the underscore, as written
    pub digit_run: String,
}

impl ScannedLabel {
    /// Canonical id derived from the numeric value of `code_digits`
    pub fn canonical(&self) -> CanonicalId {
        // At most four ASCII digits, always fits
        let code = self.code_digits.parse::<u32>().unwrap_or_default();
        CanonicalId::new(&self.prefix, code)
    }
}

/// Uppercase and turn hyphens into underscores
fn preprocess(raw: &str) -> String {
    raw.to_uppercase().replace('-', "_")
}

/// Find the leftmost `PREFIX_DIGITS` in an already preprocessed string
fn scan_preprocessed(text: &str) -> Option<ScannedLabel> {
    let caps = LABEL_PATTERN.captures(text)?;
    let prefix = caps.get(1)?.as_str();
    let digit_run = caps.get(2)?.as_str();
    let code_len = digit_run.len().min(MAX_CODE_DIGITS);

    Some(ScannedLabel {
        prefix: prefix.to_string(),
        code_digits: digit_run[..code_len].to_string(),
        digit_run: digit_run.to_string(),
    })
}

/// Preprocess a raw label and scan the whole string for an identifier
pub fn scan(raw: &str) -> Option<ScannedLabel> {
    scan_preprocessed(&preprocess(raw))
}

// ============================================================================
// NORMALIZATION MODES
// ============================================================================

/// Loose mode: search the whole label, fail when nothing matches
///
/// Used for location feeds, flashed lists and exclusion lists, where the
/// caller skips the item and logs it as ignored.
pub fn normalize_loose(raw: &str) -> Result<CanonicalId> {
    scan(raw)
        .map(|label| label.canonical())
        .ok_or_else(|| InvaderError::NoIdentifierFound(raw.to_string()))
}

/// Strict mode: only the first whitespace-delimited token is considered
///
/// Never fails. Labels without an identifier yield `CanonicalId::unresolved()`
/// so catalog repair can flag them instead of aborting.
pub fn normalize_strict(raw: &str) -> CanonicalId {
    let text = preprocess(raw);
    let label = text.split_whitespace().next().and_then(scan_preprocessed);

    match label {
        Some(label) => label.canonical(),
        None => {
            tracing::warn!(raw = %raw, "Unresolved identifier, substituting sentinel");
            CanonicalId::unresolved()
        }
    }
}

// ============================================================================
// NAME REPAIR
// ============================================================================

/// One `before -> after` line of a repair pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairedName {
    pub original: Option<String>,
    pub repaired: CanonicalId,
}

impl RepairedName {
    pub fn was_unresolved(&self) -> bool {
        self.repaired.is_unresolved()
    }
}

/// Rewrite waypoint-style names to their canonical form
///
/// Missing names and names without an identifier in their first token become
/// the `ERR_404` sentinel.
pub fn repair_names(names: &[Option<String>]) -> Vec<RepairedName> {
    names
        .iter()
        .map(|name| RepairedName {
            original: name.clone(),
            repaired: name
                .as_deref()
                .map(normalize_strict)
                .unwrap_or_else(CanonicalId::unresolved),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
