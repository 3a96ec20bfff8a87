//! Temporal kinds: `date`, `dateRange` and `month`.
//!
//! Dates are normalized to a canonical ISO-8601 string in UTC with millisecond
//! precision (`2024-03-01T12:00:00.000Z`) and stored as `{ iso }`.

use bson::Bson;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use super::{KindCodec, accept, from_stored, to_business, to_stored};
use crate::error::{KindError, KindResult};

static MONTH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid month pattern"));

/// Canonical date shape, both in business values and in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub iso: String,
}

impl DateValue {
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self { iso: format_iso(&datetime) }
    }

    pub fn parse(text: &str) -> Option<Self> {
        parse_iso(text).map(Self::from_datetime)
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        parse_iso(&self.iso)
    }
}

/// Current time truncated to the millisecond precision timestamps are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Formats a timestamp the way every date is stored.
pub fn format_iso(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses RFC 3339 with any offset, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (taken as UTC)
/// or a bare `YYYY-MM-DD` (UTC midnight).
pub fn parse_iso(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    DateTime::parse_from_rfc3339(text)
        .map(|datetime| datetime.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DateInput {
    EpochMillis(i64),
    Text(String),
    Entry { iso: String },
}

impl DateInput {
    fn normalize(self) -> KindResult<DateValue> {
        let parsed = match self {
            DateInput::EpochMillis(millis) => DateTime::from_timestamp_millis(millis),
            DateInput::Text(text) | DateInput::Entry { iso: text } => parse_iso(&text),
        };

        let datetime =
            parsed.ok_or_else(|| KindError::invalid_format(super::DATE, "unparsable date"))?;

        // The canonical format only has room for four-digit years.
        if !(0..=9999).contains(&datetime.year()) {
            return Err(KindError::out_of_range(
                super::DATE,
                format!("year {} is outside 0..=9999", datetime.year()),
            ));
        }

        Ok(DateValue::from_datetime(datetime))
    }
}

const DATE_EXPECTED: &str = "an ISO date string, epoch milliseconds or { iso }";

fn accept_date(value: &Value) -> KindResult<DateValue> {
    accept::<DateInput>(super::DATE, DATE_EXPECTED, value)?.normalize()
}

fn stored_date(stored: &Bson) -> KindResult<DateValue> {
    match stored {
        Bson::DateTime(datetime) => Ok(DateValue::from_datetime(datetime.to_chrono())),
        stored => {
            let value: DateValue = from_stored(super::DATE, "a stored { iso } document", stored)?;

            DateValue::parse(&value.iso)
                .ok_or_else(|| KindError::invalid_format(super::DATE, "malformed stored date"))
        }
    }
}

/// A point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

impl KindCodec for DateCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        to_stored(super::DATE, &accept_date(value)?).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        to_business(super::DATE, &stored_date(stored)?).map(Some)
    }
}

/// Ordered pair of dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateValue,
    pub end: DateValue,
}

impl DateRange {
    fn ensure_ordered(self) -> KindResult<Self> {
        match (self.start.datetime(), self.end.datetime()) {
            (Some(start), Some(end)) if start <= end => Ok(self),
            (Some(_), Some(_)) => Err(KindError::out_of_range(
                super::DATE_RANGE,
                format!("start {} is after end {}", self.start.iso, self.end.iso),
            )),
            _ => Err(KindError::invalid_format(super::DATE_RANGE, "unparsable date bound")),
        }
    }
}

#[derive(Deserialize)]
struct DateRangeInput {
    start: Value,
    end: Value,
}

#[derive(Deserialize)]
struct StoredDateRange {
    start: Bson,
    end: Bson,
}

/// A `{ start, end }` pair of dates with `start <= end`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRangeCodec;

impl KindCodec for DateRangeCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let input: DateRangeInput =
            accept(super::DATE_RANGE, "an object with `start` and `end` dates", value)?;
        let range = DateRange {
            start: accept_date(&input.start)?,
            end: accept_date(&input.end)?,
        }
        .ensure_ordered()?;

        to_stored(super::DATE_RANGE, &range).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let stored: StoredDateRange =
            from_stored(super::DATE_RANGE, "a stored { start, end } document", stored)?;
        let range = DateRange {
            start: stored_date(&stored.start)?,
            end: stored_date(&stored.end)?,
        }
        .ensure_ordered()?;

        to_business(super::DATE_RANGE, &range).map(Some)
    }
}

/// Calendar month in `YYYY-MM` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthValue {
    pub month: String,
}

impl MonthValue {
    fn validated(month: String) -> KindResult<Self> {
        if !MONTH_PATTERN.is_match(&month) {
            return Err(KindError::invalid_format(
                super::MONTH,
                format!("\"{month}\" does not match YYYY-MM"),
            ));
        }

        Ok(Self { month })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MonthInput {
    Text(String),
    Entry { month: String },
}

/// A `YYYY-MM` month, accepted bare or as `{ month }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthCodec;

impl KindCodec for MonthCodec {
    fn encode_present(&self, value: &Value) -> KindResult<Option<Bson>> {
        let month = match accept(super::MONTH, "a YYYY-MM string or { month }", value)? {
            MonthInput::Text(month) | MonthInput::Entry { month } => MonthValue::validated(month)?,
        };

        to_stored(super::MONTH, &month).map(Some)
    }

    fn decode_present(&self, stored: &Bson) -> KindResult<Option<Value>> {
        let stored: MonthValue = from_stored(super::MONTH, "a stored { month } document", stored)?;

        to_business(super::MONTH, &MonthValue::validated(stored.month)?).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn date_normalizes_every_input_shape() {
        let expected = Some(Bson::Document(doc! { "iso": "2024-03-01T12:00:00.000Z" }));

        assert_eq!(DateCodec.encode(&json!("2024-03-01T12:00:00Z")), Ok(expected.clone()));
        assert_eq!(DateCodec.encode(&json!("2024-03-01T13:00:00+01:00")), Ok(expected.clone()));
        assert_eq!(DateCodec.encode(&json!({ "iso": "2024-03-01T12:00:00.000Z" })), Ok(expected.clone()));
        assert_eq!(DateCodec.encode(&json!(1709294400000i64)), Ok(expected));
        assert_eq!(
            DateCodec.encode(&json!("2024-03-01")),
            Ok(Some(Bson::Document(doc! { "iso": "2024-03-01T00:00:00.000Z" })))
        );
    }

    #[test]
    fn date_rejects_garbage() {
        assert!(DateCodec.encode(&json!("yesterday")).is_err());
        assert!(DateCodec.encode(&json!(true)).is_err());
        assert!(DateCodec.decode(&Bson::Document(doc! { "iso": "not a date" })).is_err());
    }

    #[test]
    fn date_rejects_years_without_four_digits() {
        assert!(matches!(
            DateCodec.encode(&json!(300000000000000i64)),
            Err(KindError::OutOfRange { kind: "date", .. })
        ));
        assert!(matches!(
            DateCodec.encode(&json!(-62198755200000i64)),
            Err(KindError::OutOfRange { kind: "date", .. })
        ));

        let latest = DateCodec.encode(&json!("9999-12-31T23:59:59.999Z")).unwrap().unwrap();
        assert_eq!(
            DateCodec.decode(&latest),
            Ok(Some(json!({ "iso": "9999-12-31T23:59:59.999Z" })))
        );
    }

    #[test]
    fn date_decodes_native_bson_datetimes() {
        let datetime = bson::DateTime::from_millis(1709294400000);

        assert_eq!(
            DateCodec.decode(&Bson::DateTime(datetime)),
            Ok(Some(json!({ "iso": "2024-03-01T12:00:00.000Z" })))
        );
    }

    #[test]
    fn date_range_enforces_ordering() {
        let stored = DateRangeCodec
            .encode(&json!({ "start": "2024-01-01", "end": { "iso": "2024-02-01T00:00:00Z" } }))
            .unwrap()
            .unwrap();

        assert_eq!(
            stored,
            Bson::Document(doc! {
                "start": { "iso": "2024-01-01T00:00:00.000Z" },
                "end": { "iso": "2024-02-01T00:00:00.000Z" },
            })
        );
        assert_eq!(
            DateRangeCodec.decode(&stored),
            Ok(Some(json!({
                "start": { "iso": "2024-01-01T00:00:00.000Z" },
                "end": { "iso": "2024-02-01T00:00:00.000Z" },
            })))
        );
        assert!(DateRangeCodec.encode(&json!({ "start": "2024-02-01", "end": "2024-01-01" })).is_err());
        assert!(DateRangeCodec.encode(&json!({ "start": "2024-02-01" })).is_err());
    }

    #[test]
    fn month_is_pattern_checked() {
        assert_eq!(MonthCodec.encode(&json!("2024-12")), Ok(Some(Bson::Document(doc! { "month": "2024-12" }))));
        assert_eq!(MonthCodec.encode(&json!({ "month": "2024-01" })), Ok(Some(Bson::Document(doc! { "month": "2024-01" }))));
        assert!(MonthCodec.encode(&json!("2024-13")).is_err());
        assert!(MonthCodec.encode(&json!("2024-1")).is_err());
        assert!(MonthCodec.encode(&json!({ "month": 202401 })).is_err());
        assert_eq!(
            MonthCodec.decode(&Bson::Document(doc! { "month": "2024-06" })),
            Ok(Some(json!({ "month": "2024-06" })))
        );
    }

    proptest! {
        #[test]
        fn dates_with_four_digit_years_round_trip(
            millis in -62_167_219_200_000i64..=253_402_300_799_999
        ) {
            let stored = DateCodec.encode(&json!(millis)).unwrap().unwrap();
            let decoded = DateCodec.decode(&stored).unwrap().unwrap();

            prop_assert_eq!(DateCodec.encode(&decoded).unwrap(), Some(stored));
        }
    }
}
