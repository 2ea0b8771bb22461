//! Recurrence engine: pure next-occurrence computation.
//!
//! Consults no external clock. Daily/weekly/monthly rules are calendar
//! arithmetic at the same wall-clock time in the provided offset; hourly is
//! absolute. Monthly clamps to the last valid day of the shorter month
//! (Jan 31 → Feb 28/29, never rolling into March).

use chrono::{DateTime, Days, Duration, FixedOffset, Months, NaiveDateTime, Utc};

use crate::types::Recurrence;

/// Next occurrence after one firing of `current`, or `None` for one-shots.
pub fn next_occurrence(
    current: DateTime<Utc>,
    rule: Recurrence,
    tz: FixedOffset,
) -> Option<DateTime<Utc>> {
    match rule {
        Recurrence::Once => None,
        Recurrence::Hourly => current.checked_add_signed(Duration::hours(1)),
        Recurrence::Daily => shift_calendar(current, tz, Shift::Days(1)),
        Recurrence::Weekly => shift_calendar(current, tz, Shift::Days(7)),
        Recurrence::Monthly => shift_calendar(current, tz, Shift::Months(1)),
    }
}

/// Apply `next_occurrence` repeatedly until the result is strictly later
/// than `after`. Used post-fire (the new `scheduled_at` must exceed the fire
/// time) and when silently advancing a missed recurring alarm.
pub fn advance_past(
    current: DateTime<Utc>,
    rule: Recurrence,
    after: DateTime<Utc>,
    tz: FixedOffset,
) -> Option<DateTime<Utc>> {
    let mut next = next_occurrence(current, rule, tz)?;
    while next <= after {
        next = next_occurrence(next, rule, tz)?;
    }
    Some(next)
}

enum Shift {
    Days(u64),
    Months(u32),
}

fn shift_calendar(current: DateTime<Utc>, tz: FixedOffset, shift: Shift) -> Option<DateTime<Utc>> {
    let local = current.with_timezone(&tz);
    let date = local.date_naive();
    let new_date = match shift {
        Shift::Days(n) => date.checked_add_days(Days::new(n))?,
        // checked_add_months clamps to the target month's last valid day.
        Shift::Months(n) => date.checked_add_months(Months::new(n))?,
    };
    let naive = NaiveDateTime::new(new_date, local.time());
    let utc_naive = naive - Duration::seconds(i64::from(tz.local_minus_utc()));
    Some(DateTime::<Utc>::from_naive_utc_and_offset(utc_naive, Utc))
}
