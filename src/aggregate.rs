//! Weekday histogram for the dashboard chart.
//!
//! Records are bucketed by the weekday of their decrypted prescription
//! date. Dates that cannot be parsed (including the "Unknown" sentinel)
//! are left out of every bucket and of the total.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::models::PrescriptionRecord;

/// Monday–Sunday display order.
pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Counts per weekday, indexed Monday = 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayHistogram {
    counts: [u32; 7],
}

impl WeekdayHistogram {
    pub fn count(&self, day: Weekday) -> u32 {
        self.counts[day.num_days_from_monday() as usize]
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// `(weekday, count)` pairs in Monday–Sunday order, all seven present.
    pub fn buckets(&self) -> impl Iterator<Item = (Weekday, u32)> + '_ {
        WEEK.iter().map(|day| (*day, self.count(*day)))
    }

    fn record(&mut self, day: Weekday) {
        self.counts[day.num_days_from_monday() as usize] += 1;
    }
}

/// Chart row: `{ "weekday": "Monday", "prescriptions": 3 }`.
#[derive(Serialize)]
struct ChartRow {
    weekday: &'static str,
    prescriptions: u32,
}

impl Serialize for WeekdayHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(WEEK.len()))?;
        for (day, prescriptions) in self.buckets() {
            seq.serialize_element(&ChartRow {
                weekday: weekday_name(day),
                prescriptions,
            })?;
        }
        seq.end()
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a decrypted prescription date into a calendar date.
///
/// Accepts RFC 3339, ISO dates/datetimes, US `M/D/YYYY` and epoch
/// milliseconds. Offsets are respected: the date is the one written.
pub fn parse_prescription_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
    {
        return Some(date);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
    {
        return Some(dt.date());
    }
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive());
    }
    None
}

/// Bucket every record with a parseable date by its weekday.
pub fn aggregate_by_weekday(records: &[PrescriptionRecord]) -> WeekdayHistogram {
    let mut histogram = WeekdayHistogram::default();
    let mut skipped = 0usize;

    for record in records {
        match parse_prescription_date(&record.prescription_date) {
            Some(date) => histogram.record(date.weekday()),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, counted = histogram.total(), "Records without a usable date left out of weekday chart");
    }
    histogram
}
