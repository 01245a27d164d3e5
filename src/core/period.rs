//! Discrete calendar periods and the time keys that index summaries.
//!
//! A [`Period`] names a bucket ("2015-03", "2015Q1") without carrying an
//! intra-bucket timestamp. Internally it is an ordinal count of periods of a
//! given [`PeriodFreq`], so ordering and stepping are integer operations.

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Granularity of a [`Period`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodFreq {
    Day,
    Month,
    Quarter,
    Year,
}

/// A calendar period of fixed granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    freq: PeriodFreq,
    /// Days since CE, months since year 0, quarters since year 0 or the year.
    ordinal: i64,
}


impl Period {
    /// Daily period containing `date`.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            freq: PeriodFreq::Day,
            ordinal: date.num_days_from_ce() as i64,
        }
    }

    /// Monthly period, `None` when `month` is outside 1..=12.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then(|| Self {
            freq: PeriodFreq::Month,
            ordinal: year as i64 * 12 + (month as i64 - 1),
        })
    }

    /// Quarterly period, `None` when `quarter` is outside 1..=4.
    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        (1..=4).contains(&quarter).then(|| Self {
            freq: PeriodFreq::Quarter,
            ordinal: year as i64 * 4 + (quarter as i64 - 1),
        })
    }

    /// Annual period.
    pub fn year(year: i32) -> Self {
        Self {
            freq: PeriodFreq::Year,
            ordinal: year as i64,
        }
    }

    pub fn freq(&self) -> PeriodFreq {
        self.freq
    }

    /// Calendar year the period falls in.
    pub fn year_number(&self) -> i32 {
        match self.freq {
            PeriodFreq::Day => self.start_date().year(),
            PeriodFreq::Month => self.ordinal.div_euclid(12) as i32,
            PeriodFreq::Quarter => self.ordinal.div_euclid(4) as i32,
            PeriodFreq::Year => self.ordinal as i32,
        }
    }

    /// Position inside the year: day-of-year, month, quarter, or 1 for years.
    pub fn sub_period(&self) -> u32 {
        match self.freq {
            PeriodFreq::Day => self.start_date().ordinal(),
            PeriodFreq::Month => self.ordinal.rem_euclid(12) as u32 + 1,
            PeriodFreq::Quarter => self.ordinal.rem_euclid(4) as u32 + 1,
            PeriodFreq::Year => 1,
        }
    }

    /// First day of the period, `None` outside chrono's date range.
    fn checked_start_date(&self) -> Option<NaiveDate> {
        let month = match self.freq {
            PeriodFreq::Day => {
                return i32::try_from(self.ordinal)
                    .ok()
                    .and_then(NaiveDate::from_num_days_from_ce_opt)
            }
            PeriodFreq::Month => self.sub_period(),
            PeriodFreq::Quarter => (self.sub_period() - 1) * 3 + 1,
            PeriodFreq::Year => 1,
        };
        let year = i32::try_from(self.ordinal.div_euclid(self.per_year())).ok()?;
        NaiveDate::from_ymd_opt(year, month, 1)
    }

    fn per_year(&self) -> i64 {
        match self.freq {
            PeriodFreq::Month => 12,
            PeriodFreq::Quarter => 4,
            PeriodFreq::Day | PeriodFreq::Year => 1,
        }
    }

    /// Nearest representable date for periods outside chrono's range.
    fn saturated(&self) -> NaiveDate {
        if self.ordinal < 0 {
            NaiveDate::MIN
        } else {
            NaiveDate::MAX
        }
    }

    /// First day of the period; saturates at `NaiveDate::MIN`/`MAX`.
    pub fn start_date(&self) -> NaiveDate {
        self.checked_start_date().unwrap_or_else(|| self.saturated())
    }

    /// Last day of the period; saturates at `NaiveDate::MIN`/`MAX`.
    pub fn end_date(&self) -> NaiveDate {
        match self.freq {
            PeriodFreq::Day => self.start_date(),
            _ => match self.checked_start_date() {
                None => self.saturated(),
                Some(_) => self
                    .succ()
                    .checked_start_date()
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(NaiveDate::MAX),
            },
        }
    }

    /// The following period of the same granularity.
    pub fn succ(&self) -> Self {
        Self {
            freq: self.freq,
            ordinal: self.ordinal + 1,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.freq {
            PeriodFreq::Day => write!(f, "{}", self.start_date().format("%Y-%m-%d")),
            PeriodFreq::Month => write!(f, "{:04}-{:02}", self.year_number(), self.sub_period()),
            PeriodFreq::Quarter => write!(f, "{:04}Q{}", self.year_number(), self.sub_period()),
            PeriodFreq::Year => write!(f, "{:04}", self.year_number()),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || Error::invalid(format!("cannot parse period '{s}'"));

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Period::day(date));
        }
        if let Some((year, quarter)) = s.split_once('Q') {
            let year = year.parse::<i32>().map_err(|_| bad())?;
            let quarter = quarter.parse::<u32>().map_err(|_| bad())?;
            return Period::quarter(year, quarter).ok_or_else(bad);
        }
        if let Some((year, month)) = s.split_once('-') {
            let year = year.parse::<i32>().map_err(|_| bad())?;
            let month = month.parse::<u32>().map_err(|_| bad())?;
            return Period::month(year, month).ok_or_else(bad);
        }
        s.parse::<i32>().map(Period::year).map_err(|_| bad())
    }
}

/// Row label of a time-indexed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeKey {
    /// Absolute bucket label (the bucket's anchor date).
    Date(NaiveDate),
    /// Discrete period.
    Period(Period),
}

impl TimeKey {
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            TimeKey::Date(d) => Some(*d),
            TimeKey::Period(_) => None,
        }
    }

    pub fn as_period(&self) -> Option<Period> {
        match self {
            TimeKey::Date(_) => None,
            TimeKey::Period(p) => Some(*p),
        }
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeKey::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            TimeKey::Period(p) => p.fmt(f),
        }
    }
}

impl Serialize for TimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
