use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SotdError};
use crate::semester::{self, Semester};
use crate::spotify::TrackDescriptor;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column names of the backing table, in write order. Exact-match contract.
pub const COLUMNS: [&str; 13] = [
    "Date",
    "Song Title",
    "Artist",
    "Album Title",
    "Album Art",
    "Duration (ms)",
    "Explicit",
    "Popularity",
    "Release Date",
    "ID",
    "Track ID",
    "URI",
    "Notes",
];

const DATE_FORMATS: [&str; 3] = [DATE_FORMAT, "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// One untyped row as stored in the backing table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "Date", default, deserialize_with = "cell")]
    pub date: Option<String>,
    #[serde(rename = "Song Title", default, deserialize_with = "cell")]
    pub song_title: Option<String>,
    #[serde(rename = "Artist", default, deserialize_with = "cell")]
    pub artist: Option<String>,
    #[serde(rename = "Album Title", default, deserialize_with = "cell")]
    pub album_title: Option<String>,
    #[serde(rename = "Album Art", default, deserialize_with = "cell")]
    pub album_art: Option<String>,
    #[serde(rename = "Duration (ms)", default, deserialize_with = "cell")]
    pub duration_ms: Option<String>,
    #[serde(rename = "Explicit", default, deserialize_with = "cell")]
    pub explicit: Option<String>,
    #[serde(rename = "Popularity", default, deserialize_with = "cell")]
    pub popularity: Option<String>,
    #[serde(rename = "Release Date", default, deserialize_with = "cell")]
    pub release_date: Option<String>,
    #[serde(rename = "ID", default, deserialize_with = "cell")]
    pub id: Option<String>,
    #[serde(rename = "Track ID", default, deserialize_with = "cell")]
    pub track_id: Option<String>,
    #[serde(rename = "URI", default, deserialize_with = "cell")]
    pub uri: Option<String>,
    #[serde(rename = "Notes", default, deserialize_with = "cell")]
    pub notes: Option<String>,
}

// Spreadsheet exports mix strings, numbers and booleans in the same column.
fn cell<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl Row {
    fn cells(&self) -> [&Option<String>; 13] {
        [
            &self.date,
            &self.song_title,
            &self.artist,
            &self.album_title,
            &self.album_art,
            &self.duration_ms,
            &self.explicit,
            &self.popularity,
            &self.release_date,
            &self.id,
            &self.track_id,
            &self.uri,
            &self.notes,
        ]
    }

    fn cell_mut(&mut self, column: &str) -> Option<&mut Option<String>> {
        Some(match column {
            "Date" => &mut self.date,
            "Song Title" => &mut self.song_title,
            "Artist" => &mut self.artist,
            "Album Title" => &mut self.album_title,
            "Album Art" => &mut self.album_art,
            "Duration (ms)" => &mut self.duration_ms,
            "Explicit" => &mut self.explicit,
            "Popularity" => &mut self.popularity,
            "Release Date" => &mut self.release_date,
            "ID" => &mut self.id,
            "Track ID" => &mut self.track_id,
            "URI" => &mut self.uri,
            "Notes" => &mut self.notes,
            _ => return None,
        })
    }

    /// True when every cell is missing or whitespace.
    pub fn is_blank(&self) -> bool {
        self.cells()
            .iter()
            .all(|c| c.as_deref().map_or(true, |s| s.trim().is_empty()))
    }

    /// Builds a row from positional cells under a header; unknown columns are ignored.
    pub fn from_cells<S: AsRef<str>>(header: &[S], cells: &[S]) -> Row {
        let mut row = Row::default();
        for (name, value) in header.iter().zip(cells) {
            if let Some(slot) = row.cell_mut(name.as_ref().trim()) {
                let value = value.as_ref();
                *slot = (!value.is_empty()).then(|| value.to_owned());
            }
        }
        row
    }

    /// Cells in [`COLUMNS`] order, missing cells as empty strings.
    pub fn to_cells(&self) -> Vec<String> {
        self.cells()
            .iter()
            .map(|c| c.as_deref().unwrap_or_default().to_owned())
            .collect()
    }
}

/// One logged song of the day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// `None` when the stored date could not be parsed.
    pub date: Option<NaiveDate>,
    pub song_title: String,
    pub artist: String,
    pub album_title: String,
    pub album_art_url: String,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u32,
    pub release_date: String,
    pub id: Option<u64>,
    pub track_id: String,
    pub uri: String,
    pub notes: String,
}

impl Entry {
    pub fn semester(&self) -> Option<Semester> {
        semester::classify(self.date)
    }

    pub fn date_label(&self) -> String {
        self.date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Parses a stored row. `index` is the 1-based row position, used in errors.
    pub fn from_row(index: usize, row: &Row) -> Result<Entry> {
        let text = |cell: &Option<String>| cell.clone().unwrap_or_default();

        Ok(Entry {
            date: row.date.as_deref().and_then(parse_date),
            song_title: text(&row.song_title),
            artist: text(&row.artist),
            album_title: text(&row.album_title),
            album_art_url: text(&row.album_art),
            duration_ms: parse_whole(index, "Duration (ms)", &row.duration_ms)?.unwrap_or(0),
            explicit: parse_flag(index, &row.explicit)?,
            popularity: match parse_whole(index, "Popularity", &row.popularity)? {
                Some(value) => u32::try_from(value).map_err(|_| SotdError::MalformedRow {
                    row: index,
                    column: "Popularity",
                    value: value.to_string(),
                })?,
                None => 0,
            },
            release_date: text(&row.release_date),
            id: parse_whole(index, "ID", &row.id)?,
            track_id: text(&row.track_id),
            uri: text(&row.uri),
            notes: text(&row.notes),
        })
    }

    pub fn to_row(&self) -> Row {
        Row {
            date: self.date.map(|d| d.format(DATE_FORMAT).to_string()),
            song_title: Some(self.song_title.clone()),
            artist: Some(self.artist.clone()),
            album_title: Some(self.album_title.clone()),
            album_art: Some(self.album_art_url.clone()),
            duration_ms: Some(self.duration_ms.to_string()),
            explicit: Some(if self.explicit { "Yes" } else { "No" }.to_owned()),
            popularity: Some(self.popularity.to_string()),
            release_date: Some(self.release_date.clone()),
            id: self.id.map(|id| id.to_string()),
            track_id: Some(self.track_id.clone()),
            uri: Some(self.uri.clone()),
            notes: Some(self.notes.clone()),
        }
    }
}

/// An entry about to be logged; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub song_title: String,
    pub artist: String,
    pub album_title: String,
    pub album_art_url: String,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u32,
    pub release_date: String,
    pub track_id: String,
    pub uri: String,
    pub notes: String,
}

impl NewEntry {
    pub fn from_track(date: NaiveDate, track: &TrackDescriptor, notes: &str) -> Self {
        NewEntry {
            date,
            song_title: track.name.clone(),
            artist: track.primary_artist().to_owned(),
            album_title: track.album.name.clone(),
            album_art_url: track.album.images.first().cloned().unwrap_or_default(),
            duration_ms: track.duration_ms,
            explicit: track.explicit,
            popularity: track.popularity,
            release_date: track.album.release_date.clone().unwrap_or_default(),
            track_id: track.id.clone(),
            uri: track.uri.clone(),
            notes: notes.to_owned(),
        }
    }

    pub fn with_id(self, id: u64) -> Entry {
        Entry {
            date: Some(self.date),
            song_title: self.song_title,
            artist: self.artist,
            album_title: self.album_title,
            album_art_url: self.album_art_url,
            duration_ms: self.duration_ms,
            explicit: self.explicit,
            popularity: self.popularity,
            release_date: self.release_date,
            id: Some(id),
            track_id: self.track_id,
            uri: self.uri,
            notes: self.notes,
        }
    }
}

/// Normalizes the date formats found in hand-edited sheets.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_whole(index: usize, column: &'static str, cell: &Option<String>) -> Result<Option<u64>> {
    let Some(raw) = cell.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(value) = raw.parse::<u64>() {
        return Ok(Some(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            Ok(Some(value as u64))
        }
        _ => Err(SotdError::MalformedRow {
            row: index,
            column,
            value: raw.to_owned(),
        }),
    }
}

fn parse_flag(index: usize, cell: &Option<String>) -> Result<bool> {
    let raw = cell.as_deref().map(str::trim).unwrap_or_default();
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" | "" => Ok(false),
        _ => Err(SotdError::MalformedRow {
            row: index,
            column: "Explicit",
            value: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn entry(date: &str, title: &str, artist: &str) -> Entry {
        Entry {
            date: parse_date(date),
            song_title: title.to_owned(),
            artist: artist.to_owned(),
            album_title: format!("{title} (album)"),
            album_art_url: "https://i.scdn.co/image/abc".to_owned(),
            duration_ms: 215_000,
            explicit: false,
            popularity: 61,
            release_date: "2019-05-03".to_owned(),
            id: None,
            track_id: format!("track-{title}"),
            uri: format!("spotify:track:{title}"),
            notes: String::new(),
        }
    }

    #[test]
    fn normalizes_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_date("2024-03-05"), expected);
        assert_eq!(parse_date("2024/03/05"), expected);
        assert_eq!(parse_date("03/05/2024"), expected);
        assert_eq!(parse_date("2024-03-05 00:00:00"), expected);
        assert_eq!(parse_date("  2024-03-05 "), expected);
        assert_eq!(parse_date("someday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn parses_spreadsheet_row() {
        let row = Row {
            date: Some("2024-03-15 00:00:00".into()),
            song_title: Some("Blue".into()),
            artist: Some("Joni Mitchell".into()),
            duration_ms: Some("181000.0".into()),
            explicit: Some("Yes".into()),
            popularity: Some("55".into()),
            id: Some("7.0".into()),
            ..Row::default()
        };

        let entry = Entry::from_row(1, &row).unwrap();
        assert_eq!(entry.date_label(), "2024-03-15");
        assert_eq!(entry.duration_ms, 181_000);
        assert!(entry.explicit);
        assert_eq!(entry.popularity, 55);
        assert_eq!(entry.id, Some(7));
        assert_eq!(entry.notes, "");
    }

    #[test]
    fn keeps_unparseable_date_as_sentinel() {
        let row = Row {
            date: Some("the day after".into()),
            song_title: Some("Song".into()),
            ..Row::default()
        };
        let entry = Entry::from_row(1, &row).unwrap();
        assert_eq!(entry.date, None);
        assert_eq!(entry.semester(), None);
        assert_eq!(entry.date_label(), "");
    }

    #[test]
    fn rejects_malformed_numbers() {
        let row = Row {
            date: Some("2024-03-15".into()),
            popularity: Some("very".into()),
            ..Row::default()
        };
        match Entry::from_row(3, &row) {
            Err(SotdError::MalformedRow { row, column, value }) => {
                assert_eq!(row, 3);
                assert_eq!(column, "Popularity");
                assert_eq!(value, "very");
            }
            other => panic!("expected malformed row, got {other:?}"),
        }

        let row = Row {
            explicit: Some("maybe".into()),
            ..Row::default()
        };
        assert!(Entry::from_row(1, &row).is_err());

        let row = Row {
            id: Some("2.5".into()),
            ..Row::default()
        };
        assert!(Entry::from_row(1, &row).is_err());
    }

    #[test]
    fn row_round_trip_preserves_entry() {
        let mut original = entry("2023-11-02", "Heroes", "David Bowie");
        original.id = Some(12);
        original.explicit = true;
        original.notes = "rainy".into();

        let back = Entry::from_row(1, &original.to_row()).unwrap();
        assert_eq!(back, original);

        let mut undated = entry("not a date", "Low", "David Bowie");
        undated.id = None;
        let back = Entry::from_row(1, &undated.to_row()).unwrap();
        assert_eq!(back, undated);
    }

    #[test]
    fn unparseable_date_is_written_back_empty() {
        let row = Row {
            date: Some("sometime in March".into()),
            song_title: Some("Low".into()),
            ..Row::default()
        };
        let entry = Entry::from_row(1, &row).unwrap();
        assert_eq!(entry.date, None);

        let written = entry.to_row();
        assert_eq!(written.date, None);
        assert_eq!(written.to_cells()[0], "");
        assert_eq!(written.song_title.as_deref(), Some("Low"));
    }

    #[test]
    fn detects_blank_rows() {
        assert!(Row::default().is_blank());
        let row = Row {
            notes: Some("   ".into()),
            ..Row::default()
        };
        assert!(row.is_blank());
        assert!(!entry("2024-01-01", "A", "B").to_row().is_blank());
    }

    #[test]
    fn maps_cells_by_header() {
        let header = vec!["Artist", "Date", "Semester", "Song Title"];
        let cells = vec!["Björk", "2024-02-02", "2024 - Jan–May", "Joga"];
        let row = Row::from_cells(&header, &cells);

        assert_eq!(row.artist.as_deref(), Some("Björk"));
        assert_eq!(row.date.as_deref(), Some("2024-02-02"));
        assert_eq!(row.song_title.as_deref(), Some("Joga"));
        assert_eq!(row.notes, None);

        let cells = row.to_cells();
        assert_eq!(cells.len(), COLUMNS.len());
        assert_eq!(cells[0], "2024-02-02");
        assert_eq!(cells[2], "Björk");
        assert_eq!(cells[12], "");
        assert_eq!(cells.iter().filter(|c| c.is_empty()).count(), COLUMNS.len() - 3);
    }

    #[test]
    fn deserializes_mixed_cell_types() {
        let json = r#"{"Date": "2024-01-01", "Duration (ms)": 200000, "Explicit": false, "ID": 3.0, "Notes": null}"#;
        let row: Row = serde_json::from_str(json).unwrap();
        assert_eq!(row.duration_ms.as_deref(), Some("200000"));
        assert_eq!(row.explicit.as_deref(), Some("false"));
        assert_eq!(row.notes, None);

        let entry = Entry::from_row(1, &row).unwrap();
        assert_eq!(entry.id, Some(3));
        assert!(!entry.explicit);
    }
}
