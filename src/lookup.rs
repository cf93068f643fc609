use std::cmp::Reverse;

use chrono::{Datelike, NaiveDate};

use crate::entry::Entry;

/// Entries from any year sharing the reference date's month and day, in log order.
pub fn on_this_day<'a, I>(entries: I, reference: NaiveDate) -> Vec<&'a Entry>
where
    I: IntoIterator<Item = &'a Entry>,
{
    entries
        .into_iter()
        .filter(|e| {
            e.date
                .is_some_and(|d| d.month() == reference.month() && d.day() == reference.day())
        })
        .collect()
}

/// Case-insensitive match on title, artist or notes. No keyword returns everything.
pub fn search<'a, I>(entries: I, keyword: Option<&str>) -> Vec<&'a Entry>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let needle = match keyword.filter(|k| !k.is_empty()) {
        Some(k) => k.to_lowercase(),
        None => return entries.into_iter().collect(),
    };

    entries
        .into_iter()
        .filter(|e| {
            [&e.song_title, &e.artist, &e.notes]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Newest first; undated entries go last, ties keep their order.
pub fn sort_newest_first(entries: &mut [&Entry]) {
    entries.sort_by_key(|e| Reverse(e.date));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::entry;
    use crate::log::SongLog;

    fn titles(entries: &[&Entry]) -> Vec<String> {
        entries.iter().map(|e| e.song_title.clone()).collect()
    }

    #[test]
    fn matches_month_and_day_across_years() {
        let log = SongLog::new(vec![
            entry("2023-03-15", "B", "Y"),
            entry("2023-03-16", "C", "Z"),
            entry("2021-03-15", "A", "X"),
            entry("2023-04-15", "D", "W"),
            entry("undated", "E", "V"),
        ]);
        let reference = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        assert_eq!(titles(&on_this_day(&log, reference)), vec!["B", "A"]);
        assert!(on_this_day(&SongLog::default(), reference).is_empty());
    }

    #[test]
    fn leap_day_only_matches_leap_day() {
        let log = SongLog::new(vec![
            entry("2020-02-29", "Leap", "X"),
            entry("2021-02-28", "Not leap", "Y"),
        ]);
        let reference = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(titles(&on_this_day(&log, reference)), vec!["Leap"]);
    }

    #[test]
    fn searches_notes_case_insensitively() {
        let mut blue = entry("2024-01-01", "Song", "Artist");
        blue.notes = "feeling Blue today".into();
        let mut red = entry("2024-01-02", "Other", "Someone");
        red.notes = "red sky".into();
        let log = SongLog::new(vec![blue, red]);

        assert_eq!(titles(&search(&log, Some("blue"))), vec!["Song"]);
        assert_eq!(titles(&search(&log, Some("SOMEONE"))), vec!["Other"]);
        assert!(search(&log, Some("green")).is_empty());
    }

    #[test]
    fn empty_keyword_returns_whole_log() {
        let log = SongLog::new(vec![entry("2024-01-01", "A", "X"), entry("2024-01-02", "B", "Y")]);
        assert_eq!(search(&log, None).len(), 2);
        assert_eq!(search(&log, Some("")).len(), 2);
    }

    #[test]
    fn sorts_newest_first_with_undated_last() {
        let log = SongLog::new(vec![
            entry("2023-05-01", "Old", "X"),
            entry("?", "Undated", "Y"),
            entry("2024-05-01", "New", "Z"),
        ]);
        let mut found = search(&log, None);
        sort_newest_first(&mut found);
        assert_eq!(titles(&found), vec!["New", "Old", "Undated"]);
    }
}
