//! Google Sheets as the backing table, through the v4 values API.
//!
//! The first sheet row is the header; columns are matched by name, so column
//! order in the sheet does not matter on read. A write puts the header plus
//! every row back from `A1` in a single update, blanking whatever rows of the
//! previous table lie below, and only then clears the rest of the sheet.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::SheetsSettings;
use crate::entry::{Row, COLUMNS};
use crate::error::{Result, SotdError};
use crate::store::BackingTable;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Column letter of the last entry of [`COLUMNS`].
const LAST_COLUMN: char = 'M';

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueUpdate<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<String>>,
}

pub struct SheetsTable {
    client: Client,
    settings: SheetsSettings,
    base_url: String,
    /// Rows (header included) the sheet held at the last read or write.
    height: AtomicUsize,
}

impl SheetsTable {
    pub fn new(settings: SheetsSettings, timeout: Duration) -> Result<Self> {
        Self::with_base_url(settings, timeout, API_BASE)
    }

    pub fn with_base_url(
        settings: SheetsSettings,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::from_client(client, settings, base_url))
    }

    fn from_client(client: Client, settings: SheetsSettings, base_url: impl Into<String>) -> Self {
        SheetsTable {
            client,
            settings,
            base_url: base_url.into(),
            height: AtomicUsize::new(0),
        }
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            self.base_url, self.settings.spreadsheet_id, range, suffix
        )
    }

    fn sheet_name(&self) -> &str {
        let range = self.settings.range.as_str();
        range.split_once('!').map_or(range, |(sheet, _)| sheet)
    }

    /// Everything from row `first` down, across the table's columns.
    fn rows_from(&self, first: usize) -> String {
        format!("{}!A{}:{}", self.sheet_name(), first, LAST_COLUMN)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Header-keyed rows from a raw value grid. Short rows are padded.
fn rows_from_grid(grid: &[Vec<Value>]) -> Vec<Row> {
    let Some((header, body)) = grid.split_first() else {
        return Vec::new();
    };
    let header: Vec<String> = header.iter().map(cell_text).collect();
    body.iter()
        .map(|cells| {
            let mut cells: Vec<String> = cells.iter().map(cell_text).collect();
            cells.resize(header.len(), String::new());
            Row::from_cells(&header, &cells)
        })
        .collect()
}

fn grid_from_rows(rows: &[Row]) -> Vec<Vec<String>> {
    std::iter::once(COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<String>>())
        .chain(rows.iter().map(Row::to_cells))
        .collect()
}

async fn ensure_success(response: Response, action: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SotdError::Persistence(format!(
        "sheet {action} failed with {status}: {body}"
    )))
}

#[async_trait]
impl BackingTable for SheetsTable {
    #[instrument(skip(self), fields(range = %self.settings.range))]
    async fn read(&self) -> Result<Vec<Row>> {
        let response = self
            .client
            .get(self.values_url(&self.settings.range, ""))
            .bearer_auth(&self.settings.access_token)
            .send()
            .await?
            .error_for_status()?;
        let range: ValueRange = response.json().await?;
        debug!(rows = range.values.len(), "read sheet");
        self.height.store(range.values.len(), Ordering::Relaxed);
        Ok(rows_from_grid(&range.values))
    }

    #[instrument(skip(self, rows), fields(range = %self.settings.range, rows = rows.len()))]
    async fn write(&self, rows: &[Row]) -> Result<()> {
        let mut values = grid_from_rows(rows);
        let written = values.len();
        let previous = self.height.load(Ordering::Relaxed);
        if previous > written {
            values.resize(previous, vec![String::new(); COLUMNS.len()]);
        }

        let anchor = format!("{}!A1", self.sheet_name());
        let update = ValueUpdate {
            range: &anchor,
            major_dimension: "ROWS",
            values,
        };
        let response = self
            .client
            .put(self.values_url(&anchor, "?valueInputOption=RAW"))
            .bearer_auth(&self.settings.access_token)
            .json(&update)
            .send()
            .await?;
        ensure_success(response, "update").await?;
        self.height.store(written, Ordering::Relaxed);

        // Only rows added to the sheet since the last read can live down here.
        let tail = self.rows_from(written + 1);
        let cleared = match self
            .client
            .post(self.values_url(&tail, ":clear"))
            .bearer_auth(&self.settings.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
        {
            Ok(response) => ensure_success(response, "clear").await,
            Err(err) => Err(err.into()),
        };
        if let Err(err) = cleared {
            warn!(%tail, error = %err, "could not clear rows below the table");
        }
        Ok(())
    }
}
