use std::collections::HashMap;
use std::hash::Hash;

use chrono::NaiveDate;

use crate::entry::Entry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCount {
    pub artist: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongCount {
    pub song_title: String,
    pub artist: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongChoices {
    pub song_title: String,
    pub times_chosen: usize,
    /// Ascending.
    pub dates: Vec<NaiveDate>,
}

/// Occurrence counts in first-encounter order.
fn tally<'a, K, I, F>(entries: I, key: F) -> Vec<(K, usize)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = &'a Entry>,
    F: Fn(&'a Entry) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for entry in entries {
        let k = key(entry);
        match slots.get(&k).copied() {
            Some(slot) => counts[slot].1 += 1,
            None => {
                slots.insert(k.clone(), counts.len());
                counts.push((k, 1));
            }
        }
    }
    counts
}

/// Stable sort by descending count.
fn by_count<K>(mut counts: Vec<(K, usize)>) -> Vec<(K, usize)> {
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Most frequent artists, ties in encounter order.
pub fn top_artists<'a, I>(entries: I, n: usize) -> Vec<ArtistCount>
where
    I: IntoIterator<Item = &'a Entry>,
{
    by_count(tally(entries, |e| e.artist.as_str()))
        .into_iter()
        .take(n)
        .map(|(artist, count)| ArtistCount {
            artist: artist.to_owned(),
            count,
        })
        .collect()
}

/// Most frequent songs. The same title by different artists counts separately.
/// Ties are ordered by title, then artist.
pub fn top_songs<'a, I>(entries: I, n: usize) -> Vec<SongCount>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut counts = tally(entries, |e| (e.song_title.as_str(), e.artist.as_str()));
    counts.sort_by(|a, b| a.0.cmp(&b.0));
    by_count(counts)
        .into_iter()
        .take(n)
        .map(|((song_title, artist), count)| SongCount {
            song_title: song_title.to_owned(),
            artist: artist.to_owned(),
            count,
        })
        .collect()
}

/// Songs by every artist whose name contains `query`, case-insensitively,
/// grouped by title in title order. A blank query matches nothing.
pub fn songs_by_artist<'a, I>(entries: I, query: &str) -> Vec<SongChoices>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut by_title: HashMap<&str, SongChoices> = HashMap::new();
    for entry in entries {
        if !entry.artist.to_lowercase().contains(&needle) {
            continue;
        }
        let choices = by_title
            .entry(entry.song_title.as_str())
            .or_insert_with(|| SongChoices {
                song_title: entry.song_title.clone(),
                times_chosen: 0,
                dates: Vec::new(),
            });
        choices.times_chosen += 1;
        choices.dates.extend(entry.date);
    }

    let mut songs: Vec<SongChoices> = by_title.into_values().collect();
    for song in &mut songs {
        song.dates.sort();
    }
    songs.sort_by(|a, b| a.song_title.cmp(&b.song_title));
    songs
}
