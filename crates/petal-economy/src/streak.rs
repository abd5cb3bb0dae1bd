//! Consecutive-day streak math.
//!
//! The streak is derived from the ledger, not from a counter that could
//! drift: a collection today continues the streak only if a
//! daily-bonus-class ledger entry exists in yesterday's local calendar
//! day. The grant service performs that probe and persists the new
//! counter; the functions here are the pure arithmetic.

use crate::config::StreakConfig;

/// The streak value after today's collection.
///
/// Continues the streak when yesterday had a qualifying collection,
/// otherwise resets to 1. A fresh wallet (streak 0) starts at 1 either
/// way.
pub const fn next_streak(collected_yesterday: bool, current: i32) -> i32 {
    if collected_yesterday {
        let next = current.saturating_add(1);
        // A corrupted non-positive counter still yields a valid streak.
        if next < 1 { 1 } else { next }
    } else {
        1
    }
}

/// Bonus petals for a streak of the given length.
///
/// Linear in the streak length, clamped at `max_bonus_days` so the bonus
/// stops growing on very long streaks.
pub fn bonus_for(streak: i32, config: &StreakConfig) -> i64 {
    let effective = streak.clamp(0, config.max_bonus_days.max(0));
    i64::from(effective).saturating_mul(config.per_day_bonus.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(per_day_bonus: i64, max_bonus_days: i32) -> StreakConfig {
        StreakConfig {
            per_day_bonus,
            max_bonus_days,
        }
    }

    #[test]
    fn first_collection_starts_at_one() {
        assert_eq!(next_streak(false, 0), 1);
    }

    #[test]
    fn consecutive_days_increment() {
        assert_eq!(next_streak(true, 1), 2);
        assert_eq!(next_streak(true, 2), 3);
        assert_eq!(next_streak(true, 29), 30);
    }

    #[test]
    fn missed_day_resets_to_one() {
        assert_eq!(next_streak(false, 7), 1);
    }

    #[test]
    fn corrupted_counter_recovers() {
        assert_eq!(next_streak(true, -3), 1);
        assert_eq!(next_streak(true, i32::MAX), i32::MAX);
    }

    #[test]
    fn bonus_grows_linearly() {
        let cfg = config(5, 30);
        assert_eq!(bonus_for(1, &cfg), 5);
        assert_eq!(bonus_for(2, &cfg), 10);
        assert_eq!(bonus_for(7, &cfg), 35);
    }

    #[test]
    fn bonus_stops_growing_at_max_days() {
        let cfg = config(5, 30);
        assert_eq!(bonus_for(30, &cfg), 150);
        assert_eq!(bonus_for(31, &cfg), 150);
        assert_eq!(bonus_for(365, &cfg), 150);
    }

    #[test]
    fn degenerate_config_yields_no_bonus() {
        assert_eq!(bonus_for(10, &config(0, 30)), 0);
        assert_eq!(bonus_for(10, &config(-5, 30)), 0);
        assert_eq!(bonus_for(10, &config(5, 0)), 0);
    }
}
