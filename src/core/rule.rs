//! Bucketing rules: how raw timestamps are floored into time buckets.

use crate::core::period::{Period, PeriodFreq};
use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frequency rule used to bucket timestamps.
///
/// Codes are the usual offset aliases: `D`, `MS`, `QE`, `QS`, `YS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rule {
    /// Calendar day ("D").
    #[default]
    #[serde(rename = "D")]
    Day,
    /// Month, labelled by its first day ("MS").
    #[serde(rename = "MS")]
    MonthStart,
    /// Quarter, labelled by its last day ("QE", also "Q").
    #[serde(rename = "QE", alias = "Q")]
    QuarterEnd,
    /// Quarter, labelled by its first day ("QS").
    #[serde(rename = "QS")]
    QuarterStart,
    /// Year, labelled by January 1st ("YS").
    #[serde(rename = "YS")]
    YearStart,
}

impl Rule {
    /// All supported rules.
    pub const ALL: [Rule; 5] = [
        Rule::Day,
        Rule::MonthStart,
        Rule::QuarterEnd,
        Rule::QuarterStart,
        Rule::YearStart,
    ];

    /// Offset alias of the rule.
    pub fn code(&self) -> &'static str {
        match self {
            Rule::Day => "D",
            Rule::MonthStart => "MS",
            Rule::QuarterEnd => "QE",
            Rule::QuarterStart => "QS",
            Rule::YearStart => "YS",
        }
    }

    /// Granularity of the periods this rule produces.
    pub fn period_freq(&self) -> PeriodFreq {
        match self {
            Rule::Day => PeriodFreq::Day,
            Rule::MonthStart => PeriodFreq::Month,
            Rule::QuarterEnd | Rule::QuarterStart => PeriodFreq::Quarter,
            Rule::YearStart => PeriodFreq::Year,
        }
    }

    /// Seasonal periods that describe a cycle at this granularity.
    ///
    /// `1` (non-seasonal) is accepted for every rule.
    pub fn seasonal_periods(&self) -> &'static [usize] {
        match self {
            Rule::Day => &[1, 7],
            Rule::MonthStart => &[1, 3, 6, 12, 24],
            Rule::QuarterEnd | Rule::QuarterStart => &[1, 4],
            Rule::YearStart => &[1],
        }
    }

    /// Bucket label of a timestamp.
    pub fn floor(&self, timestamp: NaiveDateTime) -> NaiveDate {
        self.floor_date(timestamp.date())
    }

    /// Bucket label of a date.
    pub fn floor_date(&self, date: NaiveDate) -> NaiveDate {
        let period = self.to_period(date);
        match self {
            Rule::QuarterEnd => period.end_date(),
            _ => period.start_date(),
        }
    }

    /// Period containing `date`.
    pub fn to_period(&self, date: NaiveDate) -> Period {
        match self.period_freq() {
            PeriodFreq::Day => Period::day(date),
            // month() and quarter() only reject out-of-range inputs, which
            // chrono dates never produce
            PeriodFreq::Month => {
                Period::month(date.year(), date.month()).unwrap_or(Period::year(date.year()))
            }
            PeriodFreq::Quarter => Period::quarter(date.year(), (date.month() - 1) / 3 + 1)
                .unwrap_or(Period::year(date.year())),
            PeriodFreq::Year => Period::year(date.year()),
        }
    }

    /// Bucket label of a period; inverse of [`Rule::to_period`] on bucket labels.
    pub fn bucket_of(&self, period: &Period) -> NaiveDate {
        match self {
            Rule::QuarterEnd => self.floor_date(period.end_date()),
            _ => self.floor_date(period.start_date()),
        }
    }

    /// Label of the bucket following the one containing `date`; stays on the
    /// last representable bucket at the end of chrono's range.
    pub fn next(&self, date: NaiveDate) -> NaiveDate {
        self.bucket_of(&self.to_period(date).succ())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Rule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "D" => Ok(Rule::Day),
            "MS" => Ok(Rule::MonthStart),
            "QE" | "Q" => Ok(Rule::QuarterEnd),
            "QS" => Ok(Rule::QuarterStart),
            "YS" => Ok(Rule::YearStart),
            other => Err(Error::invalid(format!(
                "unsupported rule '{other}', expected one of D, MS, QE, Q, QS, YS"
            ))),
        }
    }
}
