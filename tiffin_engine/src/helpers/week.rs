//! Settlement-week arithmetic.
//!
//! A settlement week runs Thursday 00:00:00 through the following Wednesday 23:59:59, in IST. India does not observe
//! DST, so a fixed +05:30 offset is exact and avoids dragging in a timezone database. Every cutoff computation in the
//! system goes through this module rather than server-local time.
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

/// Asia/Kolkata as a fixed offset.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("+05:30 is a valid offset")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The most recently *completed* Thursday–Wednesday window before `now`, no matter which day the batch actually runs.
pub fn last_settlement_window(now: DateTime<Utc>) -> SettlementWindow {
    let current_thursday = start_of_current_week(now);
    SettlementWindow { start: current_thursday - Duration::days(7), end: current_thursday - Duration::seconds(1) }
}

/// The window currently being accumulated (used for the hotel-facing running revenue report).
pub fn running_window(now: DateTime<Utc>) -> SettlementWindow {
    let current_thursday = start_of_current_week(now);
    SettlementWindow { start: current_thursday, end: current_thursday + Duration::days(7) - Duration::seconds(1) }
}

/// Thursday 00:00:00 IST of the week containing `now`, expressed in UTC.
fn start_of_current_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let ist_now = now.with_timezone(&ist());
    // Weekday as Sunday=0..Saturday=6; Thursday is 4, so (day + 3) % 7 counts days since the last Thursday.
    let days_since_thursday = (ist_now.weekday().num_days_from_sunday() + 3) % 7;
    let thursday = ist_now.date_naive() - Duration::days(i64::from(days_since_thursday));
    ist()
        .from_local_datetime(&thursday.and_hms_opt(0, 0, 0).expect("midnight exists"))
        .single()
        .expect("fixed offsets are unambiguous")
        .with_timezone(&Utc)
}

/// True when the current IST wall-clock time is at or past `cutoff` (used for the COD evening cutoff).
pub fn is_after_cutoff_ist(now: DateTime<Utc>, cutoff: NaiveTime) -> bool {
    let ist_now = now.with_timezone(&ist());
    let t = ist_now.time();
    (t.hour(), t.minute()) >= (cutoff.hour(), cutoff.minute())
}

#[cfg(test)]
mod test {
    use chrono::Datelike;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn window_when_run_on_thursday() {
        // 2025-06-26 is a Thursday. Run just after midnight IST (18:31 UTC Wednesday).
        let now = utc(2025, 6, 25, 18, 31);
        let w = last_settlement_window(now);
        let start_ist = w.start.with_timezone(&ist());
        let end_ist = w.end.with_timezone(&ist());
        assert_eq!((start_ist.day(), start_ist.month()), (19, 6));
        assert_eq!((start_ist.hour(), start_ist.minute(), start_ist.second()), (0, 0, 0));
        assert_eq!((end_ist.day(), end_ist.month()), (25, 6));
        assert_eq!((end_ist.hour(), end_ist.minute(), end_ist.second()), (23, 59, 59));
    }

    #[test]
    fn window_is_stable_across_the_week() {
        // Whether the batch fires Friday, Sunday or Wednesday, the window is the same completed week.
        let friday = utc(2025, 6, 27, 9, 0);
        let sunday = utc(2025, 6, 29, 9, 0);
        let wednesday = utc(2025, 7, 2, 9, 0);
        let w1 = last_settlement_window(friday);
        assert_eq!(w1, last_settlement_window(sunday));
        assert_eq!(w1, last_settlement_window(wednesday));
        let start_ist = w1.start.with_timezone(&ist());
        assert_eq!((start_ist.day(), start_ist.month()), (19, 6));
    }

    #[test]
    fn next_thursday_rolls_the_window() {
        let before = last_settlement_window(utc(2025, 7, 2, 9, 0));
        let after = last_settlement_window(utc(2025, 7, 3, 9, 0));
        assert_eq!(after.start, before.start + Duration::days(7));
    }

    #[test]
    fn running_window_contains_now() {
        let now = utc(2025, 6, 28, 9, 0);
        let w = running_window(now);
        assert!(w.start <= now && now <= w.end);
    }

    #[test]
    fn cod_cutoff_is_ist_wall_clock() {
        let cutoff = NaiveTime::from_hms_opt(20, 30, 0).unwrap();
        // 15:05 UTC = 20:35 IST -> past cutoff.
        assert!(is_after_cutoff_ist(utc(2025, 6, 25, 15, 5), cutoff));
        // 14:45 UTC = 20:15 IST -> before cutoff.
        assert!(!is_after_cutoff_ist(utc(2025, 6, 25, 14, 45), cutoff));
        // Exactly 20:30 IST counts as after.
        assert!(is_after_cutoff_ist(utc(2025, 6, 25, 15, 0), cutoff));
    }
}
