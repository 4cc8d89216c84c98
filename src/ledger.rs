use chrono::{DateTime, Duration, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Hard cap per class session.
pub const SLOT_CAPACITY: usize = 6;

/// Students may book from tomorrow up to this many days ahead.
pub const BOOKING_HORIZON_DAYS: i64 = 14;

/// At or below this remaining balance the caller is told to surface a
/// renewal reminder. Advisory only; nothing is written.
pub const LOW_BALANCE_THRESHOLD: i64 = 1;

/// Fixed time-of-day labels. The full slot string is exact-match everywhere,
/// so these must never be reformatted once records carry them.
pub const TIME_SLOTS: [&str; 4] = [
    "10:00 (morning)",
    "13:00 (early afternoon)",
    "15:30 (late afternoon)",
    "19:00 (evening)",
];

static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit-run pattern"));

/// The studio keeps all dates in UTC+9 regardless of host timezone.
pub fn studio_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 offset")
}

pub fn studio_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&studio_offset())
}

pub fn today_string(now: DateTime<FixedOffset>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Lenient credit parse: sum every maximal digit run in the stored text.
/// Balances are kept as free text so the front desk can annotate them
/// ("28+1" reads as 29); empty, "-", and whitespace-only read as 0.
pub fn parse_credits(text: &str) -> i64 {
    let t = text.trim();
    if t.is_empty() || t == "-" {
        return 0;
    }
    DIGIT_RUNS
        .find_iter(t)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttendanceOutcome {
    pub remaining: i64,
    pub total: i64,
    pub low_balance: bool,
}

/// One attendance event: remaining goes down by one, lifetime total goes up
/// by one. No floor on remaining; over-attending a spent pass goes negative.
pub fn apply_attendance(remaining_text: &str, total_text: &str) -> AttendanceOutcome {
    let remaining = parse_credits(remaining_text) - 1;
    let total = parse_credits(total_text) + 1;
    AttendanceOutcome {
        remaining,
        total,
        low_balance: remaining <= LOW_BALANCE_THRESHOLD,
    }
}

/// Every bookable slot as seen from `now`: the next fourteen calendar days
/// crossed with the fixed time labels, in date-major order.
pub fn enumerate_slots(now: DateTime<FixedOffset>) -> Vec<String> {
    let mut out = Vec::with_capacity(BOOKING_HORIZON_DAYS as usize * TIME_SLOTS.len());
    for day in 1..=BOOKING_HORIZON_DAYS {
        let date = now + Duration::days(day);
        let label = date.format("%m/%d (%a)").to_string();
        for t in TIME_SLOTS {
            out.push(format!("{} {}", label, t));
        }
    }
    out
}

/// Initial credit balance granted by each price plan at registration.
pub fn initial_credits_for_plan(plan: &str) -> Option<i64> {
    match plan {
        "monthly-4" => Some(4),
        "monthly-8" => Some(8),
        "monthly-12" => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<FixedOffset> {
        studio_offset()
            .with_ymd_and_hms(2026, 8, 24, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_credits_sums_digit_runs() {
        assert_eq!(parse_credits("28+1"), 29);
        assert_eq!(parse_credits("4"), 4);
        assert_eq!(parse_credits("10 (2 gifted)"), 12);
        assert_eq!(parse_credits("-"), 0);
        assert_eq!(parse_credits(""), 0);
        assert_eq!(parse_credits("   "), 0);
        assert_eq!(parse_credits("no digits"), 0);
    }

    #[test]
    fn attendance_decrements_and_increments_once() {
        let out = apply_attendance("28+1", "3");
        assert_eq!(out.remaining, 28);
        assert_eq!(out.total, 4);
        assert!(!out.low_balance);
    }

    #[test]
    fn low_balance_at_one_or_below() {
        assert!(!apply_attendance("3", "0").low_balance); // 2 left
        assert!(apply_attendance("2", "0").low_balance); // 1 left
        assert!(apply_attendance("1", "0").low_balance); // 0 left
        assert!(apply_attendance("0", "0").low_balance); // -1 left, no floor
        assert_eq!(apply_attendance("0", "0").remaining, -1);
    }

    #[test]
    fn slots_cover_fourteen_days_by_four_labels() {
        let slots = enumerate_slots(fixed_now());
        assert_eq!(slots.len(), 56);
        // 2026-08-24 is a Monday, so booking opens on Tue 08/25.
        assert_eq!(slots[0], "08/25 (Tue) 10:00 (morning)");
        assert_eq!(slots[3], "08/25 (Tue) 19:00 (evening)");
        assert_eq!(slots[55], "09/07 (Mon) 19:00 (evening)");
        let mut dedup = slots.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 56);
    }

    #[test]
    fn plan_credit_table() {
        assert_eq!(initial_credits_for_plan("monthly-4"), Some(4));
        assert_eq!(initial_credits_for_plan("monthly-8"), Some(8));
        assert_eq!(initial_credits_for_plan("monthly-12"), Some(12));
        assert_eq!(initial_credits_for_plan("weekly"), None);
    }
}
