//! Academic-period labels derived from a calendar date.
//!
//! Label text is kept verbatim for compatibility with existing logs, including
//! the overlapping "Aug" in the autumn label. Labels order by year and then by
//! the period text compared as a string, so within a year the order is
//! `Aug–Dec`, `Jan–May`, `June–Aug`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::SotdError;

/// Selector value meaning "no semester refinement".
pub const ALL_SEMESTERS: &str = "All Semesters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    JanMay,
    JuneAug,
    AugDec,
}

impl Period {
    pub fn label(self) -> &'static str {
        match self {
            Period::JanMay => "Jan–May",
            Period::JuneAug => "June–Aug",
            Period::AugDec => "Aug–Dec",
        }
    }

    fn from_month(month: u32) -> Self {
        match month {
            1..=5 => Period::JanMay,
            6..=8 => Period::JuneAug,
            _ => Period::AugDec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semester {
    pub year: i32,
    pub period: Period,
}

impl Semester {
    pub fn of(date: NaiveDate) -> Self {
        Semester {
            year: date.year(),
            period: Period::from_month(date.month()),
        }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

/// Classifies an optional date; unparseable dates have no semester.
pub fn classify(date: Option<NaiveDate>) -> Option<Semester> {
    date.map(Semester::of)
}

impl Ord for Semester {
    fn cmp(&self, other: &Self) -> Ordering {
        self.year
            .cmp(&other.year)
            .then_with(|| self.period.label().cmp(other.period.label()))
    }
}

impl PartialOrd for Semester {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.year, self.period.label())
    }
}

impl FromStr for Semester {
    type Err = SotdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SotdError::InvalidArgument(format!("unknown semester '{s}'"));

        let (year, period) = s.trim().split_once(" - ").ok_or_else(invalid)?;
        let year = year.trim().parse::<i32>().map_err(|_| invalid())?;
        let period = [Period::JanMay, Period::JuneAug, Period::AugDec]
            .into_iter()
            .find(|p| p.label() == period.trim())
            .ok_or_else(invalid)?;

        Ok(Semester { year, period })
    }
}

/// Semester refinement applied on top of a date filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SemesterFilter {
    #[default]
    All,
    Only(Semester),
}

impl SemesterFilter {
    pub fn matches(&self, semester: Option<Semester>) -> bool {
        match self {
            SemesterFilter::All => true,
            SemesterFilter::Only(wanted) => semester == Some(*wanted),
        }
    }
}

impl FromStr for SemesterFilter {
    type Err = SotdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == ALL_SEMESTERS {
            Ok(SemesterFilter::All)
        } else {
            s.parse().map(SemesterFilter::Only)
        }
    }
}
