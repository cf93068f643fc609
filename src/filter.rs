//! Date-range selection over the log, plus optional semester refinement.
//!
//! Entries without a usable date never pass any filter.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};

use crate::entry::Entry;
use crate::error::{Result, SotdError};
use crate::log::SongLog;
use crate::semester::{Semester, SemesterFilter};

pub const RECENT_WEEKS: i64 = 4;
pub const RECENT_MONTHS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    LastNWeeks(i64),
    LastNMonths(u32),
    CalendarYear(i32),
    /// Inclusive; a missing bound defaults to the log's earliest or latest date.
    CustomRange {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

impl FilterMode {
    pub fn last_four_weeks() -> Self {
        FilterMode::LastNWeeks(RECENT_WEEKS)
    }

    pub fn last_six_months() -> Self {
        FilterMode::LastNMonths(RECENT_MONTHS)
    }
}

/// Start of a window ending at `now`. Windows are relative to the evaluation
/// instant, not to the newest entry.
fn window_start(mode: FilterMode, now: NaiveDateTime) -> Option<NaiveDateTime> {
    match mode {
        FilterMode::LastNWeeks(weeks) => {
            Duration::try_weeks(weeks).and_then(|window| now.checked_sub_signed(window))
        }
        FilterMode::LastNMonths(months) => now.checked_sub_months(Months::new(months)),
        _ => None,
    }
}

/// Entries matching `mode` and `semester`, in log order.
pub fn filter<'a>(
    log: &'a SongLog,
    mode: FilterMode,
    semester: SemesterFilter,
    now: NaiveDateTime,
) -> Result<Vec<&'a Entry>> {
    let in_range: Box<dyn Fn(NaiveDate) -> bool> = match mode {
        FilterMode::LastNWeeks(_) | FilterMode::LastNMonths(_) => {
            let Some(start) = window_start(mode, now) else {
                return Err(SotdError::InvalidArgument(format!("window {mode:?} out of range")));
            };
            Box::new(move |date| date.and_time(chrono::NaiveTime::MIN) >= start)
        }
        FilterMode::CalendarYear(year) => Box::new(move |date| date.year() == year),
        FilterMode::CustomRange { start, end } => {
            let Some((first, last)) = date_bounds(log) else {
                return Ok(Vec::new());
            };
            let start = start.unwrap_or(first);
            let end = end.unwrap_or(last);
            if start > end {
                return Err(SotdError::InvalidArgument(format!(
                    "range start {start} is after end {end}"
                )));
            }
            Box::new(move |date| start <= date && date <= end)
        }
    };

    Ok(log
        .into_iter()
        .filter(|e| e.date.is_some_and(|d| in_range(d)))
        .filter(|e| semester.matches(e.semester()))
        .collect())
}

/// Distinct years present in the log, newest first.
pub fn available_years(log: &SongLog) -> Vec<i32> {
    let years: BTreeSet<i32> = log.into_iter().filter_map(|e| e.date).map(|d| d.year()).collect();
    years.into_iter().rev().collect()
}

/// Earliest and latest dated entries.
pub fn date_bounds(log: &SongLog) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = log.into_iter().filter_map(|e| e.date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

/// Sorted, distinct semesters of a (usually already filtered) set of entries.
pub fn semester_options<'a, I>(entries: I) -> Vec<Semester>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let semesters: BTreeSet<Semester> = entries.into_iter().filter_map(Entry::semester).collect();
    semesters.into_iter().collect()
}
