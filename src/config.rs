use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;

use crate::error::{Result, SotdError};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
pub const DEFAULT_TABLE_PATH: &str = "sotd.json";
pub const DEFAULT_SHEETS_RANGE: &str = "Sheet1";
pub const DEFAULT_TOKEN_CACHE: &str = "spotify_cache/.spotify_token_cache.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub token_cache: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub access_token: String,
    pub range: String,
}

/// Where the log is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSettings {
    JsonFile(PathBuf),
    Sheets(SheetsSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: String,
    token_cache: PathBuf,
    playlist_id: Option<String>,
    pub table: TableSettings,
    pub timeout: Duration,
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let table = match get("SHEETS_SPREADSHEET_ID") {
            Some(spreadsheet_id) => TableSettings::Sheets(SheetsSettings {
                spreadsheet_id,
                access_token: get("SHEETS_ACCESS_TOKEN")
                    .ok_or(SotdError::MissingConfig("SHEETS_ACCESS_TOKEN"))?,
                range: get("SHEETS_RANGE").unwrap_or_else(|| DEFAULT_SHEETS_RANGE.to_owned()),
            }),
            None => TableSettings::JsonFile(PathBuf::from(
                get("SOTD_TABLE").unwrap_or_else(|| DEFAULT_TABLE_PATH.to_owned()),
            )),
        };

        let timeout = match get("SOTD_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(SotdError::InvalidConfig {
                        key: "SOTD_HTTP_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Config {
            client_id: get("CLIENT_ID"),
            client_secret: get("CLIENT_SECRET"),
            redirect_uri: get("REDIRECT_URI").unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_owned()),
            token_cache: PathBuf::from(
                get("SPOTIFY_TOKEN_CACHE").unwrap_or_else(|| DEFAULT_TOKEN_CACHE.to_owned()),
            ),
            playlist_id: get("PLAYLIST_ID"),
            table,
            timeout,
        })
    }

    /// Spotify credentials are only needed by catalog operations.
    pub fn spotify(&self) -> Result<SpotifySettings> {
        Ok(SpotifySettings {
            client_id: self
                .client_id
                .clone()
                .ok_or(SotdError::MissingConfig("CLIENT_ID"))?,
            client_secret: self
                .client_secret
                .clone()
                .ok_or(SotdError::MissingConfig("CLIENT_SECRET"))?,
            redirect_uri: self.redirect_uri.clone(),
            token_cache: self.token_cache.clone(),
        })
    }

    pub fn playlist_id(&self) -> Result<&str> {
        self.playlist_id
            .as_deref()
            .ok_or(SotdError::MissingConfig("PLAYLIST_ID"))
    }
}
