//! Well-known ledger source tags.
//!
//! A source is the semantic tag a feature attaches to every balance change
//! it produces. Feature modules should use these constants rather than
//! spelling tags inline; the cap-category mapping in the economy engine is
//! keyed on them.

/// Mini-game winnings.
pub const MINI_GAME: &str = "mini_game";

/// Praise received on a community soapstone message.
pub const SOAPSTONE_PRAISE: &str = "soapstone_praise";

/// Homepage daily collection.
pub const DAILY_BONUS: &str = "daily_bonus";

/// Consecutive-day bonus attached to a daily collection.
pub const STREAK_BONUS: &str = "streak_bonus";

/// Bonus petals attached to a shop purchase.
pub const PURCHASE_BONUS: &str = "purchase_bonus";

/// Prefix for achievement unlock rewards; the suffix names the
/// achievement, e.g. `achievement:first_win`.
pub const ACHIEVEMENT_PREFIX: &str = "achievement:";

/// Prefix for shop spends; the suffix is the SKU, e.g. `purchase:sku-123`.
pub const PURCHASE_PREFIX: &str = "purchase:";
