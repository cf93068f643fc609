//! Request handlers for one user session.
//!
//! Each handler runs against the session's in-memory log snapshot. Only the
//! mutating handlers touch the backing table, and only the catalog-facing ones
//! reach the catalog.

use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::aggregate::{self, ArtistCount, SongChoices, SongCount};
use crate::entry::{Entry, NewEntry};
use crate::error::{Result, SotdError};
use crate::filter::{self, FilterMode};
use crate::log::SongLog;
use crate::lookup;
use crate::semester::{Semester, SemesterFilter};
use crate::spotify::{self, Catalog, TrackDescriptor};
use crate::store::{BackingTable, SongLogStore};

pub const SEARCH_LIMIT: u32 = 5;
pub const TABLE_SIZE: usize = 10;
pub const PODIUM_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateStatus {
    Logged(Entry),
    Vacant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsRequest {
    pub mode: FilterMode,
    pub semester: SemesterFilter,
}

/// A podium place with its decorative image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed<T> {
    pub item: T,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsView {
    pub entries: usize,
    /// Semesters present under the date filter alone, for the refinement picker.
    pub semester_options: Vec<Semester>,
    pub top_artists: Vec<ArtistCount>,
    pub top_songs: Vec<SongCount>,
    pub artist_podium: Vec<Placed<ArtistCount>>,
    pub song_podium: Vec<Placed<SongCount>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistBreakdown {
    pub total: usize,
    pub songs: Vec<SongChoices>,
}

pub struct Session<T, C> {
    store: SongLogStore<T>,
    catalog: C,
    playlist_id: Option<String>,
}

impl<T: BackingTable, C: Catalog> Session<T, C> {
    pub fn new(store: SongLogStore<T>, catalog: C, playlist_id: Option<String>) -> Self {
        Session {
            store,
            catalog,
            playlist_id,
        }
    }

    pub fn log(&self) -> &SongLog {
        self.store.log()
    }

    fn playlist(&self) -> Result<&str> {
        self.playlist_id
            .as_deref()
            .ok_or(SotdError::MissingConfig("PLAYLIST_ID"))
    }

    pub fn date_status(&self, date: NaiveDate) -> DateStatus {
        match self.store.find_by_date(date) {
            Some(entry) => DateStatus::Logged(entry.clone()),
            None => DateStatus::Vacant,
        }
    }

    /// Clears the date so a new song can be saved for it.
    pub async fn overwrite(&mut self, date: NaiveDate) -> Result<usize> {
        self.store.remove_by_date(date).await
    }

    pub async fn search_tracks(&self, query: &str) -> Result<Vec<TrackDescriptor>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.catalog.search_tracks(query, SEARCH_LIMIT).await
    }

    pub async fn playlist_status(&self, track: &TrackDescriptor) -> Result<bool> {
        spotify::is_in_playlist(&self.catalog, self.playlist()?, &track.id).await
    }

    pub async fn add_to_playlist(&self, track: &TrackDescriptor) -> Result<()> {
        self.catalog
            .add_to_playlist(self.playlist()?, &[track.uri.clone()])
            .await
    }

    #[instrument(skip(self, track, notes), fields(track = %track.label()))]
    pub async fn save(
        &mut self,
        date: NaiveDate,
        track: &TrackDescriptor,
        notes: &str,
    ) -> Result<Entry> {
        self.store
            .append(NewEntry::from_track(date, track, notes))
            .await
    }

    #[instrument(skip(self))]
    pub async fn analytics(
        &self,
        request: &AnalyticsRequest,
        now: NaiveDateTime,
    ) -> Result<AnalyticsView> {
        let log = self.store.log();
        let in_range = filter::filter(log, request.mode, SemesterFilter::All, now)?;
        let semester_options = filter::semester_options(in_range.iter().copied());
        let selected = filter::filter(log, request.mode, request.semester, now)?;
        debug!(in_range = in_range.len(), selected = selected.len(), "filtered log");

        let top_artists = aggregate::top_artists(selected.iter().copied(), TABLE_SIZE);
        let top_songs = aggregate::top_songs(selected.iter().copied(), TABLE_SIZE);

        let artist_images = join_all(
            top_artists
                .iter()
                .take(PODIUM_SIZE)
                .map(|a| spotify::artist_image(&self.catalog, &a.artist)),
        )
        .await;
        let song_images = join_all(
            top_songs
                .iter()
                .take(PODIUM_SIZE)
                .map(|s| spotify::track_image(&self.catalog, &s.song_title, &s.artist)),
        )
        .await;

        Ok(AnalyticsView {
            entries: selected.len(),
            semester_options,
            artist_podium: podium(&top_artists, artist_images),
            song_podium: podium(&top_songs, song_images),
            top_artists,
            top_songs,
        })
    }

    pub fn artist_breakdown(
        &self,
        query: &str,
        request: &AnalyticsRequest,
        now: NaiveDateTime,
    ) -> Result<ArtistBreakdown> {
        let selected = filter::filter(self.store.log(), request.mode, request.semester, now)?;
        let songs = aggregate::songs_by_artist(selected, query);
        Ok(ArtistBreakdown {
            total: songs.iter().map(|s| s.times_chosen).sum(),
            songs,
        })
    }

    pub fn on_this_day(&self, date: NaiveDate) -> Vec<&Entry> {
        lookup::on_this_day(self.store.log(), date)
    }

    /// Keyword search over the whole log, newest first.
    pub fn history(&self, keyword: Option<&str>) -> Vec<&Entry> {
        let mut found = lookup::search(self.store.log(), keyword);
        lookup::sort_newest_first(&mut found);
        found
    }
}

fn podium<T: Clone>(ranked: &[T], images: Vec<String>) -> Vec<Placed<T>> {
    ranked
        .iter()
        .zip(images)
        .map(|(item, image_url)| Placed {
            item: item.clone(),
            image_url,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::tests::entry;
    use crate::spotify::tests::{track, FakeCatalog};
    use crate::spotify::{ArtistDescriptor, PLACEHOLDER_IMAGE};
    use crate::store::MemoryTable;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> NaiveDateTime {
        date("2024-03-25").and_hms_opt(9, 30, 0).unwrap()
    }

    async fn session_with(
        entries: Vec<Entry>,
        catalog: FakeCatalog,
    ) -> (Session<MemoryTable, FakeCatalog>, MemoryTable) {
        let table = MemoryTable::with_rows(entries.iter().map(Entry::to_row).collect());
        let store = SongLogStore::load(table.clone()).await.unwrap();
        (Session::new(store, catalog, Some("playlist".into())), table)
    }

    fn all_of(year: i32) -> AnalyticsRequest {
        AnalyticsRequest {
            mode: FilterMode::CalendarYear(year),
            semester: SemesterFilter::All,
        }
    }

    #[tokio::test]
    async fn add_entry_flow() {
        let catalog = FakeCatalog {
            tracks: vec![track("t1", "Blue", "Joni Mitchell"), track("t2", "River", "Joni Mitchell")],
            ..Default::default()
        };
        let (mut session, table) = session_with(Vec::new(), catalog).await;

        assert_eq!(session.date_status(date("2024-03-15")), DateStatus::Vacant);

        let found = session.search_tracks("joni").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(!session.playlist_status(&found[0]).await.unwrap());
        session.add_to_playlist(&found[0]).await.unwrap();
        assert!(session.playlist_status(&found[0]).await.unwrap());

        let saved = session
            .save(date("2024-03-15"), &found[0], "first warm day")
            .await
            .unwrap();
        assert_eq!(saved.id, Some(1));
        assert_eq!(saved.album_art_url, "https://i.scdn.co/image/t1");
        assert_eq!(saved.uri, "spotify:track:t1");
        assert_eq!(table.rows()[0].notes.as_deref(), Some("first warm day"));

        match session.date_status(date("2024-03-15")) {
            DateStatus::Logged(entry) => assert_eq!(entry.song_title, "Blue"),
            DateStatus::Vacant => panic!("expected logged entry"),
        }

        let again = session.save(date("2024-03-15"), &found[1], "").await;
        assert!(matches!(again, Err(SotdError::DuplicateDate(_))));

        assert_eq!(session.overwrite(date("2024-03-15")).await.unwrap(), 1);
        let replaced = session.save(date("2024-03-15"), &found[1], "").await.unwrap();
        assert_eq!(replaced.song_title, "River");
        assert_eq!(replaced.id, Some(1));
    }

    #[tokio::test]
    async fn blank_search_skips_catalog() {
        let (session, _) = session_with(Vec::new(), FakeCatalog::default()).await;
        assert!(session.search_tracks("  ").await.unwrap().is_empty());
        assert!(session.catalog.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn playlist_requires_configuration() {
        let table = MemoryTable::default();
        let store = SongLogStore::load(table).await.unwrap();
        let session = Session::new(store, FakeCatalog::default(), None);
        let result = session.playlist_status(&track("t1", "Blue", "Joni")).await;
        assert!(matches!(result, Err(SotdError::MissingConfig("PLAYLIST_ID"))));
    }

    #[tokio::test]
    async fn catalog_failure_on_primary_operation_propagates() {
        let catalog = FakeCatalog {
            offline: true,
            ..Default::default()
        };
        let (session, _) = session_with(Vec::new(), catalog).await;
        assert!(session.search_tracks("joni").await.is_err());
        assert!(session.add_to_playlist(&track("t1", "Blue", "Joni")).await.is_err());
    }

    #[tokio::test]
    async fn analytics_builds_tables_and_podiums() {
        let catalog = FakeCatalog {
            artists: vec![ArtistDescriptor {
                name: "David Bowie".into(),
                images: vec!["https://i.scdn.co/image/bowie".into()],
            }],
            ..Default::default()
        };
        let (session, _) = session_with(
            vec![
                entry("2023-02-01", "Heroes", "David Bowie"),
                entry("2023-07-01", "Heroes", "David Bowie"),
                entry("2023-10-01", "Joga", "Björk"),
                entry("2024-01-01", "Blue", "Joni Mitchell"),
            ],
            catalog,
        )
        .await;

        let view = session.analytics(&all_of(2023), now()).await.unwrap();
        assert_eq!(view.entries, 3);
        assert_eq!(view.semester_options.len(), 3);
        assert_eq!(view.top_artists[0].artist, "David Bowie");
        assert_eq!(view.top_songs[0].count, 2);
        assert_eq!(view.artist_podium.len(), 2);
        assert_eq!(view.artist_podium[0].image_url, "https://i.scdn.co/image/bowie");
        assert_eq!(view.song_podium.len(), 2);
        assert_eq!(view.song_podium[0].image_url, PLACEHOLDER_IMAGE);

        let refined = AnalyticsRequest {
            mode: FilterMode::CalendarYear(2023),
            semester: SemesterFilter::Only("2023 - Aug–Dec".parse().unwrap()),
        };
        let view = session.analytics(&refined, now()).await.unwrap();
        assert_eq!(view.entries, 1);
        assert_eq!(view.semester_options.len(), 3);
        assert_eq!(view.top_artists[0].artist, "Björk");
    }

    #[tokio::test]
    async fn analytics_survives_offline_catalog() {
        let catalog = FakeCatalog {
            offline: true,
            ..Default::default()
        };
        let (session, _) = session_with(vec![entry("2024-03-20", "Joga", "Björk")], catalog).await;

        let request = AnalyticsRequest {
            mode: FilterMode::last_four_weeks(),
            semester: SemesterFilter::All,
        };
        let view = session.analytics(&request, now()).await.unwrap();
        assert_eq!(view.artist_podium[0].image_url, PLACEHOLDER_IMAGE);
        assert_eq!(view.song_podium[0].image_url, PLACEHOLDER_IMAGE);
    }

    #[tokio::test]
    async fn empty_log_views_are_empty() {
        let (session, _) = session_with(Vec::new(), FakeCatalog::default()).await;

        let view = session.analytics(&all_of(2024), now()).await.unwrap();
        assert_eq!(view.entries, 0);
        assert!(view.top_artists.is_empty());
        assert!(view.artist_podium.is_empty());
        assert!(session.on_this_day(date("2024-03-15")).is_empty());
        assert!(session.history(Some("anything")).is_empty());
        assert!(session
            .artist_breakdown("bowie", &all_of(2024), now())
            .unwrap()
            .songs
            .is_empty());
    }

    #[tokio::test]
    async fn artist_breakdown_respects_filter() {
        let (session, _) = session_with(
            vec![
                entry("2023-02-01", "Heroes", "David Bowie"),
                entry("2023-07-01", "Heroes", "David Bowie"),
                entry("2024-01-01", "Changes", "David Bowie"),
            ],
            FakeCatalog::default(),
        )
        .await;

        let breakdown = session.artist_breakdown("BOWIE", &all_of(2023), now()).unwrap();
        assert_eq!(breakdown.total, 2);
        assert_eq!(breakdown.songs.len(), 1);
        assert_eq!(breakdown.songs[0].dates.len(), 2);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let mut rainy = entry("2023-03-15", "Riders on the Storm", "The Doors");
        rainy.notes = "Rain all day".into();
        let (session, _) = session_with(
            vec![
                rainy,
                entry("2024-03-15", "Here Comes the Sun", "The Beatles"),
                entry("2022-03-15", "Purple Rain", "Prince"),
            ],
            FakeCatalog::default(),
        )
        .await;

        let titles: Vec<&str> = session
            .history(Some("rain"))
            .into_iter()
            .map(|e| e.song_title.as_str())
            .collect();
        assert_eq!(titles, vec!["Riders on the Storm", "Purple Rain"]);

        let today = session.on_this_day(date("2025-03-15"));
        assert_eq!(today.len(), 3);
        assert_eq!(today[0].song_title, "Riders on the Storm");
    }
}
