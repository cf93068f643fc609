use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rspotify::clients::{BaseClient, OAuthClient};
use rspotify::model::{
    FullTrack, PlayableId, PlayableItem, PlaylistId, SearchResult, SearchType, TrackId,
};
use rspotify::prelude::Id;
use rspotify::AuthCodeSpotify;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SotdError};

pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

const PLAYLIST_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlbumDescriptor {
    pub name: String,
    /// Image URLs, largest first as the catalog reports them.
    pub images: Vec<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackDescriptor {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: AlbumDescriptor,
    pub duration_ms: u64,
    pub explicit: bool,
    pub popularity: u32,
    pub uri: String,
}

impl TrackDescriptor {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or_default()
    }

    /// "Title - Artist", as offered when picking a search result.
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.primary_artist())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtistDescriptor {
    pub name: String,
    pub images: Vec<String>,
}

/// Track search and playlist membership.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackDescriptor>>;
    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistDescriptor>>;
    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<Vec<String>>;
    async fn add_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
}

#[async_trait]
impl<C: Catalog + ?Sized> Catalog for Box<C> {
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackDescriptor>> {
        (**self).search_tracks(query, limit).await
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistDescriptor>> {
        (**self).search_artists(query, limit).await
    }

    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        (**self).playlist_track_ids(playlist_id).await
    }

    async fn add_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        (**self).add_to_playlist(playlist_id, uris).await
    }
}

/// Stand-in for sessions that never authorize against Spotify. Every call
/// fails, so enrichment degrades to placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineCatalog;

#[async_trait]
impl Catalog for OfflineCatalog {
    async fn search_tracks(&self, _query: &str, _limit: u32) -> Result<Vec<TrackDescriptor>> {
        Err(SotdError::CatalogUnavailable)
    }

    async fn search_artists(&self, _query: &str, _limit: u32) -> Result<Vec<ArtistDescriptor>> {
        Err(SotdError::CatalogUnavailable)
    }

    async fn playlist_track_ids(&self, _playlist_id: &str) -> Result<Vec<String>> {
        Err(SotdError::CatalogUnavailable)
    }

    async fn add_to_playlist(&self, _playlist_id: &str, _uris: &[String]) -> Result<()> {
        Err(SotdError::CatalogUnavailable)
    }
}

pub struct SpotifyCatalog {
    spotify: AuthCodeSpotify,
    timeout: Duration,
}

impl SpotifyCatalog {
    pub fn new(spotify: AuthCodeSpotify, timeout: Duration) -> Self {
        SpotifyCatalog { spotify, timeout }
    }

    async fn bounded<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = rspotify::ClientResult<T>> + Send,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| SotdError::CatalogTimeout)?
            .map_err(SotdError::from)
    }
}

fn track_descriptor(track: FullTrack) -> Option<TrackDescriptor> {
    let id = track.id?;
    Some(TrackDescriptor {
        id: id.id().to_owned(),
        uri: id.uri(),
        name: track.name,
        artists: track.artists.into_iter().map(|a| a.name).collect(),
        album: AlbumDescriptor {
            name: track.album.name,
            images: track.album.images.into_iter().map(|i| i.url).collect(),
            release_date: track.album.release_date,
        },
        duration_ms: u64::try_from(track.duration.num_milliseconds()).unwrap_or(0),
        explicit: track.explicit,
        popularity: track.popularity,
    })
}

#[async_trait]
impl Catalog for SpotifyCatalog {
    #[instrument(skip(self))]
    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<TrackDescriptor>> {
        let result = self
            .bounded(self.spotify.search(query, SearchType::Track, None, None, Some(limit), None))
            .await?;
        match result {
            SearchResult::Tracks(page) => {
                Ok(page.items.into_iter().filter_map(track_descriptor).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self))]
    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistDescriptor>> {
        let result = self
            .bounded(self.spotify.search(query, SearchType::Artist, None, None, Some(limit), None))
            .await?;
        match result {
            SearchResult::Artists(page) => Ok(page
                .items
                .into_iter()
                .map(|artist| ArtistDescriptor {
                    name: artist.name,
                    images: artist.images.into_iter().map(|i| i.url).collect(),
                })
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self))]
    async fn playlist_track_ids(&self, playlist_id: &str) -> Result<Vec<String>> {
        let playlist = PlaylistId::from_id_or_uri(playlist_id)?;
        let mut track_ids = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .bounded(self.spotify.playlist_items_manual(
                    playlist.clone(),
                    None,
                    None,
                    Some(PLAYLIST_PAGE_SIZE),
                    Some(offset),
                ))
                .await?;

            for item in page.items {
                match item.track {
                    Some(PlayableItem::Track(track)) => {
                        if let Some(id) = track.id {
                            track_ids.push(id.id().to_owned());
                        }
                    }
                    Some(_) => debug!("skipping non-track playlist item"),
                    None => debug!("playlist item has no track"),
                }
            }

            if page.next.is_none() {
                break;
            }
            offset += PLAYLIST_PAGE_SIZE;
        }

        debug!(tracks = track_ids.len(), "read playlist");
        Ok(track_ids)
    }

    #[instrument(skip(self))]
    async fn add_to_playlist(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let playlist = PlaylistId::from_id_or_uri(playlist_id)?;
        let ids = uris
            .iter()
            .map(|uri| TrackId::from_id_or_uri(uri).map(PlayableId::from))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for chunk in ids.chunks(PLAYLIST_PAGE_SIZE as usize) {
            self.bounded(
                self.spotify
                    .playlist_add_items(playlist.clone(), chunk.to_vec(), None),
            )
            .await?;
        }
        Ok(())
    }
}

pub async fn is_in_playlist<C: Catalog + ?Sized>(
    catalog: &C,
    playlist_id: &str,
    track_id: &str,
) -> Result<bool> {
    let ids = catalog.playlist_track_ids(playlist_id).await?;
    Ok(ids.iter().any(|id| id == track_id))
}

/// First image of the best artist match, or the placeholder on any failure.
pub async fn artist_image<C: Catalog + ?Sized>(catalog: &C, artist: &str) -> String {
    match catalog.search_artists(&format!("artist:{artist}"), 1).await {
        Ok(artists) => artists
            .into_iter()
            .next()
            .and_then(|a| a.images.into_iter().next())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_owned()),
        Err(err) => {
            warn!(%artist, %err, "artist image lookup failed");
            PLACEHOLDER_IMAGE.to_owned()
        }
    }
}

/// Album art of the best track match, or the placeholder on any failure.
pub async fn track_image<C: Catalog + ?Sized>(catalog: &C, title: &str, artist: &str) -> String {
    match catalog
        .search_tracks(&format!("track:{title} artist:{artist}"), 1)
        .await
    {
        Ok(tracks) => tracks
            .into_iter()
            .next()
            .and_then(|t| t.album.images.into_iter().next())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_owned()),
        Err(err) => {
            warn!(%title, %artist, %err, "track image lookup failed");
            PLACEHOLDER_IMAGE.to_owned()
        }
    }
}
