use chrono::{DateTime, Datelike, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ConfigError;

/// Candle bucket length, from one minute to one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
    OneWeek,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::OneMin,
        Resolution::FiveMin,
        Resolution::FifteenMin,
        Resolution::OneHour,
        Resolution::FourHour,
        Resolution::OneDay,
        Resolution::OneWeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneMin => "1min",
            Resolution::FiveMin => "5min",
            Resolution::FifteenMin => "15min",
            Resolution::OneHour => "1hr",
            Resolution::FourHour => "4hr",
            Resolution::OneDay => "1day",
            Resolution::OneWeek => "1wk",
        }
    }

    /// `True` for every value in [`Resolution::ALL`] — fixing the apparent
    /// inverted-boolean bug in the source validator (see DESIGN.md).
    pub fn is_valid_candlesize(candlesize: &str) -> bool {
        Resolution::ALL.iter().any(|r| r.as_str() == candlesize)
    }

    /// Two timestamps belong to the same bucket iff they agree on the prefix
    /// appropriate to this resolution. Year and month are always part of the
    /// prefix; finer resolutions add day/hour/hour-div-4/minute-div-15/
    /// minute-div-5/minute using integer floor division.
    pub fn same_bucket(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        if a.year() != b.year() || a.month() != b.month() {
            return false;
        }
        match self {
            Resolution::OneWeek => week_number(a) == week_number(b),
            Resolution::OneDay => a.day() == b.day(),
            Resolution::FourHour => a.day() == b.day() && (a.hour() / 4) == (b.hour() / 4),
            Resolution::OneHour => a.day() == b.day() && a.hour() == b.hour(),
            Resolution::FifteenMin => {
                a.day() == b.day() && a.hour() == b.hour() && (a.minute() / 15) == (b.minute() / 15)
            }
            Resolution::FiveMin => {
                a.day() == b.day() && a.hour() == b.hour() && (a.minute() / 5) == (b.minute() / 5)
            }
            Resolution::OneMin => {
                a.day() == b.day() && a.hour() == b.hour() && a.minute() == b.minute()
            }
        }
    }
}

/// Week-of-year number matching the `%W` strftime convention used by the
/// original importer (Monday as the first day of the week; days before the
/// year's first Monday fall in week 0).
pub fn week_number(t: DateTime<Utc>) -> u32 {
    let date = t.date_naive();
    let jan1 = chrono::NaiveDate::from_ymd_opt(date.year(), 1, 1).expect("valid Jan 1");
    let jan1_mon0 = jan1.weekday().num_days_from_monday() as i64;
    let yday0 = date.ordinal0() as i64;
    let since_first_monday = yday0 - ((7 - jan1_mon0) % 7);
    if since_first_monday < 0 {
        0
    } else {
        (since_first_monday / 7) as u32 + 1
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidResolution(s.to_string()))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
