use chrono::NaiveDate;
use tracing::warn;

use crate::entry::{Entry, NewEntry, Row};
use crate::error::Result;

/// The song log in append order. Not guaranteed to be sorted by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongLog {
    entries: Vec<Entry>,
}

impl SongLog {
    pub fn new(entries: Vec<Entry>) -> Self {
        SongLog { entries }
    }

    /// Parses table rows, dropping rows that are entirely empty.
    pub fn from_rows(rows: &[Row]) -> Result<Self> {
        let mut entries = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if row.is_blank() {
                continue;
            }
            let entry = Entry::from_row(index + 1, row)?;
            if entry.date.is_none() {
                warn!(
                    row = index + 1,
                    raw = row.date.as_deref().unwrap_or_default(),
                    "row has no usable date; excluded from date-based views"
                );
            }
            entries.push(entry);
        }
        Ok(SongLog { entries })
    }

    pub fn to_rows(&self) -> Vec<Row> {
        self.entries.iter().map(Entry::to_row).collect()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry logged for `date`, if any.
    pub fn find_by_date(&self, date: NaiveDate) -> Option<&Entry> {
        self.entries.iter().find(|e| e.date == Some(date))
    }

    /// `max(existing ids) + 1`, or 1 for a log without ids.
    pub fn next_id(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|e| e.id)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Appends without checking for an existing entry on the same date.
    pub fn append(&self, new: NewEntry) -> SongLog {
        let mut entries = self.entries.clone();
        entries.push(new.with_id(self.next_id()));
        SongLog { entries }
    }

    /// Drops every entry logged for `date`.
    pub fn remove_by_date(&self, date: NaiveDate) -> SongLog {
        SongLog {
            entries: self
                .entries
                .iter()
                .filter(|e| e.date != Some(date))
                .cloned()
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SongLog {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
