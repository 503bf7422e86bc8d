use chrono::{DateTime, Offset, TimeZone};

/// Minutes to add to local time to get UTC.
///
/// Positive west of Greenwich: UTC-5 gives 300, UTC+5:30 gives -330.
pub fn timezone_offset_minutes<Tz: TimeZone>(at: &DateTime<Tz>) -> i32 {
    -at.offset().fix().local_minus_utc() / 60
}
