//! Daily earn-cap mapping and calendar-day window computation.
//!
//! Caps are enforced retroactively from the ledger itself: headroom for a
//! category is its configured ceiling minus the sum of today's earn
//! entries whose source maps to that category. The ledger is the source
//! of truth, so a manual correction automatically adjusts the remaining
//! headroom -- there is no separate counter to drift out of sync.
//!
//! # Design Principles
//!
//! - The mapping is applied entry-by-entry and compared against the
//!   entry's own category ceiling. Sources are never lumped together
//!   under one ceiling.
//! - Day boundaries are local midnight under a fixed UTC offset; the
//!   window arithmetic is pure integer math on Unix timestamps, checked
//!   against overflow.

use chrono::{DateTime, Utc};

use petal_db::SourceEarned;
use petal_types::{sources, CapCategory};

/// Seconds in one calendar day.
const SECS_PER_DAY: i64 = 86_400;

/// Resolve a ledger source tag to its cap category.
///
/// The table is explicit: exact matches first, then the `achievement:`
/// prefix family. Anything else -- social actions, promotions, and the
/// `streak_bonus` tag, which deliberately has no entry so the bonus is
/// capped independently of the `daily_bonus` ceiling -- falls into
/// [`CapCategory::Other`].
pub fn category_for_source(source: &str) -> CapCategory {
    if source.starts_with(sources::ACHIEVEMENT_PREFIX) {
        return CapCategory::Achievement;
    }
    match source {
        sources::MINI_GAME => CapCategory::Game,
        sources::DAILY_BONUS => CapCategory::DailyBonus,
        sources::PURCHASE_BONUS => CapCategory::PurchaseBonus,
        _ => CapCategory::Other,
    }
}

/// Whether a source belongs to the streak class: collecting it advances
/// the consecutive-day streak.
pub fn is_streak_source(source: &str) -> bool {
    source == sources::DAILY_BONUS
}

/// The current local calendar day as a `[start, end)` pair of UTC
/// instants, where "local" is `utc_offset_minutes` east of UTC.
///
/// Uses Euclidean division so days west of UTC (negative offsets) and
/// instants before the epoch both land in the correct day.
pub fn local_day_window(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset_secs = i64::from(utc_offset_minutes).saturating_mul(60);
    let shifted = now.timestamp().saturating_add(offset_secs);
    let day_index = shifted.div_euclid(SECS_PER_DAY);
    let start_secs = day_index
        .saturating_mul(SECS_PER_DAY)
        .saturating_sub(offset_secs);
    let end_secs = start_secs.saturating_add(SECS_PER_DAY);

    let start = DateTime::<Utc>::from_timestamp(start_secs, 0).unwrap_or(now);
    let end = DateTime::<Utc>::from_timestamp(end_secs, 0).unwrap_or(now);
    (start, end)
}

/// Yesterday's local calendar day as a `[start, end)` pair of UTC
/// instants. The streak tracker probes this window for a daily-bonus
/// collection.
pub fn previous_day_window(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let (today_start, _) = local_day_window(now, utc_offset_minutes);
    let start_secs = today_start.timestamp().saturating_sub(SECS_PER_DAY);
    let start = DateTime::<Utc>::from_timestamp(start_secs, 0).unwrap_or(today_start);
    (start, today_start)
}

/// Sum the window's per-source earn totals that map to `category`.
///
/// This is the mapping-then-compare half of cap enforcement: every source
/// is resolved to its own category before its earnings count against that
/// category's ceiling.
pub fn earned_in_category(sums: &[SourceEarned], category: CapCategory) -> i64 {
    sums.iter()
        .filter(|row| category_for_source(&row.source) == category)
        .fold(0_i64, |total, row| total.saturating_add(row.earned))
}

/// Headroom left under a ceiling, floored at zero.
pub const fn remaining(ceiling: i64, earned: i64) -> i64 {
    let headroom = ceiling.saturating_sub(earned);
    if headroom < 0 { 0 } else { headroom }
}

/// Clamp a requested earn to the remaining headroom.
///
/// Returns `(granted, limited)`: `granted` is the credit that may
/// actually happen, and `limited` is true when the cap reduced or zeroed
/// it.
pub const fn clamp_to_remaining(amount: i64, headroom: i64) -> (i64, bool) {
    if amount <= headroom {
        (amount, false)
    } else {
        (headroom, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sums(rows: &[(&str, i64)]) -> Vec<SourceEarned> {
        rows.iter()
            .map(|(source, earned)| SourceEarned {
                source: (*source).to_owned(),
                earned: *earned,
            })
            .collect()
    }

    #[test]
    fn exact_sources_map_to_their_categories() {
        assert_eq!(category_for_source("mini_game"), CapCategory::Game);
        assert_eq!(category_for_source("daily_bonus"), CapCategory::DailyBonus);
        assert_eq!(
            category_for_source("purchase_bonus"),
            CapCategory::PurchaseBonus
        );
    }

    #[test]
    fn achievement_prefix_maps_to_achievement() {
        assert_eq!(
            category_for_source("achievement:first_win"),
            CapCategory::Achievement
        );
        assert_eq!(
            category_for_source("achievement:collector_10"),
            CapCategory::Achievement
        );
        // The bare prefix with no suffix still counts as an achievement.
        assert_eq!(category_for_source("achievement:"), CapCategory::Achievement);
    }

    #[test]
    fn unmapped_sources_fall_into_other() {
        assert_eq!(category_for_source("soapstone_praise"), CapCategory::Other);
        assert_eq!(category_for_source("streak_bonus"), CapCategory::Other);
        assert_eq!(category_for_source("summer_event_2026"), CapCategory::Other);
        assert_eq!(category_for_source(""), CapCategory::Other);
    }

    #[test]
    fn streak_class_is_daily_bonus_only() {
        assert!(is_streak_source("daily_bonus"));
        assert!(!is_streak_source("streak_bonus"));
        assert!(!is_streak_source("mini_game"));
    }

    #[test]
    fn utc_window_starts_at_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).single();
        assert!(now.is_some());
        let Some(now) = now else { return };

        let (start, end) = local_day_window(now, 0);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).single().unwrap_or(now));
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).single().unwrap_or(now));
    }

    #[test]
    fn positive_offset_shifts_the_boundary_west() {
        // 23:30 UTC on March 14 is already 08:30 March 15 in UTC+9.
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 23, 30, 0).single();
        let Some(now) = now else { return };

        let (start, end) = local_day_window(now, 540);
        // Local March 15 runs from 15:00 UTC March 14 to 15:00 UTC March 15.
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).single().unwrap_or(now)
        );
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2026, 3, 15, 15, 0, 0).single().unwrap_or(now)
        );
    }

    #[test]
    fn negative_offset_shifts_the_boundary_east() {
        // 02:00 UTC on March 15 is still 21:00 March 14 in UTC-5.
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 2, 0, 0).single();
        let Some(now) = now else { return };

        let (start, end) = local_day_window(now, -300);
        // Local March 14 runs from 05:00 UTC March 14 to 05:00 UTC March 15.
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2026, 3, 14, 5, 0, 0).single().unwrap_or(now)
        );
        assert_eq!(
            end,
            Utc.with_ymd_and_hms(2026, 3, 15, 5, 0, 0).single().unwrap_or(now)
        );
    }

    #[test]
    fn window_covers_exactly_one_day() {
        let now = Utc::now();
        for offset in [-720, -300, 0, 330, 540, 720] {
            let (start, end) = local_day_window(now, offset);
            assert_eq!(end.timestamp().saturating_sub(start.timestamp()), SECS_PER_DAY);
            assert!(start <= now && now < end, "offset {offset} window misses now");
        }
    }

    #[test]
    fn previous_window_abuts_current_window() {
        let now = Utc::now();
        let (today_start, _) = local_day_window(now, 540);
        let (yesterday_start, yesterday_end) = previous_day_window(now, 540);
        assert_eq!(yesterday_end, today_start);
        assert_eq!(
            yesterday_end.timestamp().saturating_sub(yesterday_start.timestamp()),
            SECS_PER_DAY
        );
    }

    #[test]
    fn year_boundary_window_is_correct() {
        let now = Utc.with_ymd_and_hms(2027, 1, 1, 0, 30, 0).single();
        let Some(now) = now else { return };

        let (yesterday_start, yesterday_end) = previous_day_window(now, 0);
        assert_eq!(
            yesterday_start,
            Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).single().unwrap_or(now)
        );
        assert_eq!(
            yesterday_end,
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).single().unwrap_or(now)
        );
    }

    #[test]
    fn earned_in_category_folds_through_the_mapping() {
        let rows = sums(&[
            ("mini_game", 300),
            ("achievement:first_win", 50),
            ("achievement:collector_10", 25),
            ("soapstone_praise", 10),
            ("streak_bonus", 15),
        ]);

        assert_eq!(earned_in_category(&rows, CapCategory::Game), 300);
        assert_eq!(earned_in_category(&rows, CapCategory::Achievement), 75);
        // Praise and streak bonus both land in Other; daily_bonus saw nothing.
        assert_eq!(earned_in_category(&rows, CapCategory::Other), 25);
        assert_eq!(earned_in_category(&rows, CapCategory::DailyBonus), 0);
    }

    #[test]
    fn remaining_floors_at_zero() {
        assert_eq!(remaining(2000, 0), 2000);
        assert_eq!(remaining(2000, 1999), 1);
        assert_eq!(remaining(2000, 2000), 0);
        assert_eq!(remaining(2000, 2500), 0);
    }

    #[test]
    fn clamp_grants_in_full_under_the_cap() {
        assert_eq!(clamp_to_remaining(100, 2000), (100, false));
        assert_eq!(clamp_to_remaining(2000, 2000), (2000, false));
    }

    #[test]
    fn clamp_limits_partial_and_exhausted_grants() {
        assert_eq!(clamp_to_remaining(2500, 2000), (2000, true));
        assert_eq!(clamp_to_remaining(1, 0), (0, true));
    }
}
