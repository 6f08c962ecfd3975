//! Date and size queries.
//!
//! Date syntax: `date:2024-01-15`, `date:2024-01`, `date:2024`,
//! `date:2024-01..2024-06-30`, `before:2024-06-01`, `after:2024-01-01`.
//! Size syntax: `size:>1mb`, `size:<100kb`, `size:>512`.
//!
//! Dates are calendar days in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::index::{DbQueryOperation, QueryOperation};

/// Years accepted by the bare `date:YYYY` and `date:YYYY-MM` forms.
const YEARS: std::ops::RangeInclusive<i32> = 1970..=2100;

/// Which days a date query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateQuery {
    /// Single day.
    On(NaiveDate),
    /// Inclusive range of days.
    Between(NaiveDate, NaiveDate),
    /// Before a day (exclusive).
    Before(NaiveDate),
    /// After a day (exclusive).
    After(NaiveDate),
    /// All days in a month.
    Month(i32, u32),
    /// All days in a year.
    Year(i32),
}

impl DateQuery {
    /// Parse the value of a `date:` field.
    pub fn parse_date(value: &str) -> Option<Self> {
        if let Some((start, end)) = value.split_once("..") {
            let s = parse_flexible_date_start(start)?;
            let e = parse_flexible_date_end(end)?;
            return Self::Between(s, e).bounded();
        }

        if let Some(d) = parse_naive_date(value) {
            return Self::On(d).bounded();
        }

        let parts: Vec<&str> = value.split('-').collect();
        let query = match parts.as_slice() {
            [year, month] => {
                let year: i32 = year.parse().ok()?;
                let month: u32 = month.parse().ok()?;
                (YEARS.contains(&year) && (1..=12).contains(&month))
                    .then_some(Self::Month(year, month))
            }
            [year] => {
                let year: i32 = year.parse().ok()?;
                YEARS.contains(&year).then_some(Self::Year(year))
            }
            _ => None,
        };
        query.and_then(Self::bounded)
    }

    pub fn parse_before(value: &str) -> Option<Self> {
        parse_naive_date(value).map(Self::Before)?.bounded()
    }

    pub fn parse_after(value: &str) -> Option<Self> {
        parse_naive_date(value).map(Self::After)?.bounded()
    }

    /// Reject a query whose closed ends fall outside the representable
    /// calendar, which would otherwise compile to an open range.
    fn bounded(self) -> Option<Self> {
        let (lower, upper) = self.bounds();
        let ok = match self {
            Self::Before(_) => upper.is_some(),
            Self::After(_) => lower.is_some(),
            _ => lower.is_some() && upper.is_some(),
        };
        ok.then_some(self)
    }

    /// `[start, end)` instants; `None` is open-ended.
    fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match *self {
            Self::On(d) => (Some(midnight(d)), next_midnight(d)),
            Self::Between(s, e) => (Some(midnight(s)), next_midnight(e)),
            Self::Before(d) => (None, Some(midnight(d))),
            Self::After(d) => (next_midnight(d), None),
            Self::Month(y, m) => {
                let first = NaiveDate::from_ymd_opt(y, m, 1);
                let (ny, nm) = if m == 12 { (y + 1, 1) } else { (y, m + 1) };
                let next = NaiveDate::from_ymd_opt(ny, nm, 1);
                (first.map(midnight), next.map(midnight))
            }
            Self::Year(y) => (
                NaiveDate::from_ymd_opt(y, 1, 1).map(midnight),
                NaiveDate::from_ymd_opt(y + 1, 1, 1).map(midnight),
            ),
        }
    }

    pub(crate) fn compile(&self, bool: bool) -> QueryOperation {
        let (lower, upper) = self.bounds();
        let mut op = DbQueryOperation::new();
        op.add_date_range(lower, true, upper, false, bool);
        QueryOperation::Db(op)
    }

    pub(crate) fn dump(&self, out: &mut String) {
        let text = match self {
            Self::On(d) => format!("DATE:{d}"),
            Self::Between(s, e) => format!("DATE:{s}..{e}"),
            Self::Before(d) => format!("BEFORE:{d}"),
            Self::After(d) => format!("AFTER:{d}"),
            Self::Month(y, m) => format!("DATE:{y:04}-{m:02}"),
            Self::Year(y) => format!("DATE:{y:04}"),
        };
        out.push_str(&text);
    }
}

/// Size comparison in bytes (both exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeQuery {
    GreaterThan(u64),
    LessThan(u64),
}

impl SizeQuery {
    /// Parse the value of a `size:` field, e.g. `>1mb` or `<100kb`.
    pub fn parse(value: &str) -> Option<Self> {
        let (greater, rest) = if let Some(r) = value.strip_prefix('>') {
            (true, r)
        } else if let Some(r) = value.strip_prefix('<') {
            (false, r)
        } else {
            return None;
        };

        let rest_lower = rest.to_lowercase();
        let (num_str, multiplier) = if let Some(n) = rest_lower.strip_suffix("gb") {
            (n, 1024 * 1024 * 1024)
        } else if let Some(n) = rest_lower.strip_suffix("mb") {
            (n, 1024 * 1024)
        } else if let Some(n) = rest_lower.strip_suffix("kb") {
            (n, 1024)
        } else if let Some(n) = rest_lower.strip_suffix('b') {
            (n, 1u64)
        } else {
            (rest_lower.as_str(), 1u64)
        };

        let num: u64 = num_str.parse().ok()?;
        let bytes = num.checked_mul(multiplier)?;

        Some(if greater {
            Self::GreaterThan(bytes)
        } else {
            Self::LessThan(bytes)
        })
    }

    pub(crate) fn compile(&self, bool: bool) -> QueryOperation {
        let mut op = DbQueryOperation::new();
        match *self {
            Self::GreaterThan(n) => op.add_size_range(Some(n), None, bool),
            Self::LessThan(n) => op.add_size_range(None, Some(n), bool),
        }
        QueryOperation::Db(op)
    }

    pub(crate) fn dump(&self, out: &mut String) {
        let text = match self {
            Self::GreaterThan(n) => format!("SIZE:>{n}"),
            Self::LessThan(n) => format!("SIZE:<{n}"),
        };
        out.push_str(&text);
    }
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_time(NaiveTime::default()))
}

fn next_midnight(d: NaiveDate) -> Option<DateTime<Utc>> {
    d.succ_opt().map(midnight)
}

/// Parse a date string like `2024-01-04`.
fn parse_naive_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Parse a flexible date, returning the first day of the period.
/// Accepts `YYYY-MM-DD`, `YYYY-MM` (→ first of month), `YYYY` (→ Jan 1).
fn parse_flexible_date_start(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_naive_date(s) {
        return Some(d);
    }
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month] => NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1),
        [year] => NaiveDate::from_ymd_opt(year.parse().ok()?, 1, 1),
        _ => None,
    }
}

/// Parse a flexible date, returning the last day of the period.
/// Accepts `YYYY-MM-DD`, `YYYY-MM` (→ last of month), `YYYY` (→ Dec 31).
fn parse_flexible_date_end(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_naive_date(s) {
        return Some(d);
    }
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month] => {
            let year: i32 = year.parse().ok()?;
            let month: u32 = month.parse().ok()?;
            let (ny, nm) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
            NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
        }
        [year] => NaiveDate::from_ymd_opt(year.parse().ok()?, 12, 31),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        parse_naive_date(s).unwrap()
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(DateQuery::parse_date("2024-01-15"), Some(DateQuery::On(day("2024-01-15"))));
        assert_eq!(DateQuery::parse_date("2024-01"), Some(DateQuery::Month(2024, 1)));
        assert_eq!(DateQuery::parse_date("2024"), Some(DateQuery::Year(2024)));
        assert_eq!(
            DateQuery::parse_date("2024-01..2024-06"),
            Some(DateQuery::Between(day("2024-01-01"), day("2024-06-30")))
        );
        assert_eq!(DateQuery::parse_date("2024-13"), None);
        assert_eq!(DateQuery::parse_date("300000-01"), None);
        assert_eq!(DateQuery::parse_date("1900-05"), None);
        assert_eq!(DateQuery::parse_date("2101"), None);
        assert_eq!(DateQuery::parse_date("soon"), None);
    }

    #[test]
    fn test_day_bounds_are_half_open() {
        let (lower, upper) = DateQuery::On(day("2024-02-29")).bounds();
        assert_eq!(lower, Some(midnight(day("2024-02-29"))));
        assert_eq!(upper, Some(midnight(day("2024-03-01"))));
    }

    #[test]
    fn test_last_representable_day_is_rejected() {
        assert_eq!(DateQuery::On(NaiveDate::MAX).bounded(), None);
        assert_eq!(DateQuery::After(NaiveDate::MAX).bounded(), None);
        assert!(DateQuery::Before(NaiveDate::MAX).bounded().is_some());
    }

    #[test]
    fn test_december_month_bounds() {
        let (lower, upper) = DateQuery::Month(2023, 12).bounds();
        assert_eq!(lower, Some(midnight(day("2023-12-01"))));
        assert_eq!(upper, Some(midnight(day("2024-01-01"))));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(SizeQuery::parse(">1mb"), Some(SizeQuery::GreaterThan(1024 * 1024)));
        assert_eq!(SizeQuery::parse("<100KB"), Some(SizeQuery::LessThan(100 * 1024)));
        assert_eq!(SizeQuery::parse(">512"), Some(SizeQuery::GreaterThan(512)));
        assert_eq!(SizeQuery::parse("1mb"), None);
        assert_eq!(SizeQuery::parse(">99999999999999gb"), None);
    }

    #[test]
    fn test_dump_forms() {
        let mut out = String::new();
        DateQuery::Month(2024, 3).dump(&mut out);
        assert_eq!(out, "DATE:2024-03");

        let mut out = String::new();
        SizeQuery::GreaterThan(2048).dump(&mut out);
        assert_eq!(out, "SIZE:>2048");
    }
}
