// 🎨 Status Classification
// Maps (status, points) to a presentation category. Only the destroyed
// detection is shared with reconciliation; the rest is styling.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCategory {
    /// Intact, 100 points
    TopTier,

    /// Intact, 50 points
    MidTier,

    /// Destroyed or not visible anymore, cannot be flashed
    Destroyed,

    /// Still there but damaged
    Degraded,

    Unknown,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::TopTier => "top-tier",
            StatusCategory::MidTier => "mid-tier",
            StatusCategory::Destroyed => "destroyed",
            StatusCategory::Degraded => "degraded",
            StatusCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// The catalog site publishes French statuses, English ones come from
// hand-maintained lists. Both are accepted.
const STATUS_OK: &str = "OK";
const DESTROYED_PREFIXES: [&str; 2] = ["Destroyed", "Détruit"];
const NOT_VISIBLE: [&str; 2] = ["Not visible", "Non visible"];
const DEGRADED: [&str; 4] = ["Degraded", "Very degraded", "Dégradé", "Très dégradé"];

/// True when the invader can no longer be flashed
pub fn is_unflashable(status: &str) -> bool {
    DESTROYED_PREFIXES.iter().any(|p| status.starts_with(p)) || NOT_VISIBLE.contains(&status)
}

/// Classify a status, first matching rule wins
pub fn classify(status: &str, points: u32) -> StatusCategory {
    if status == STATUS_OK && points == 100 {
        return StatusCategory::TopTier;
    }
    if status == STATUS_OK && points == 50 {
        return StatusCategory::MidTier;
    }
    if is_unflashable(status) {
        return StatusCategory::Destroyed;
    }
    if DEGRADED.contains(&status) {
        return StatusCategory::Degraded;
    }
    StatusCategory::Unknown
}
