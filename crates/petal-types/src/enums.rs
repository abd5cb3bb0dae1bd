//! Enumeration types for the petal economy engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Daily cap categories
// ---------------------------------------------------------------------------

/// The category a ledger source maps to for daily earn-cap enforcement.
///
/// Every earn source resolves to exactly one category via the explicit
/// mapping table in the economy engine; each category has a fixed per-day
/// ceiling from configuration. Sources without an explicit mapping fall
/// into [`CapCategory::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum CapCategory {
    /// Mini-game winnings.
    Game,
    /// Achievement unlock rewards.
    Achievement,
    /// Homepage daily collection.
    DailyBonus,
    /// Bonus petals attached to shop purchases.
    PurchaseBonus,
    /// Everything without an explicit mapping (social actions, streak
    /// bonuses, one-off promotions).
    Other,
}

impl CapCategory {
    /// All categories, in a fixed order (used when reporting headroom).
    pub const ALL: [Self; 5] = [
        Self::Game,
        Self::Achievement,
        Self::DailyBonus,
        Self::PurchaseBonus,
        Self::Other,
    ];

    /// Stable string name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::Achievement => "achievement",
            Self::DailyBonus => "daily_bonus",
            Self::PurchaseBonus => "purchase_bonus",
            Self::Other => "other",
        }
    }
}

impl core::fmt::Display for CapCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serde_uses_snake_case() {
        let json = serde_json::to_string(&CapCategory::DailyBonus).ok();
        assert_eq!(json.as_deref(), Some("\"daily_bonus\""));
    }

    #[test]
    fn as_str_matches_serde() {
        for category in CapCategory::ALL {
            let json = serde_json::to_string(&category).unwrap_or_default();
            assert_eq!(json, format!("\"{category}\""));
        }
    }
}
