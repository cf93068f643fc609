use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::entry::{Entry, NewEntry, Row};
use crate::error::{Result, SotdError};
use crate::log::SongLog;

/// Persistent table holding the log. `write` replaces the whole table.
#[async_trait]
pub trait BackingTable: Send + Sync {
    async fn read(&self) -> Result<Vec<Row>>;
    async fn write(&self, rows: &[Row]) -> Result<()>;
}

#[async_trait]
impl<T: BackingTable + ?Sized> BackingTable for Box<T> {
    async fn read(&self) -> Result<Vec<Row>> {
        (**self).read().await
    }

    async fn write(&self, rows: &[Row]) -> Result<()> {
        (**self).write(rows).await
    }
}

/// JSON array of row objects keyed by column name.
#[derive(Debug, Clone)]
pub struct JsonFileTable {
    path: PathBuf,
}

impl JsonFileTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileTable { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BackingTable for JsonFileTable {
    async fn read(&self) -> Result<Vec<Row>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    async fn write(&self, rows: &[Row]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            serde_json::to_writer_pretty(&mut writer, rows)?;
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// In-process table. Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Arc<Mutex<Vec<Row>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryTable {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        MemoryTable {
            rows: Arc::new(Mutex::new(rows)),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Makes every following write fail, to exercise persistence errors.
    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_writes.lock() {
            *flag = fail;
        }
    }
}

#[async_trait]
impl BackingTable for MemoryTable {
    async fn read(&self) -> Result<Vec<Row>> {
        self.rows
            .lock()
            .map(|rows| rows.clone())
            .map_err(|_| SotdError::Persistence("memory table poisoned".into()))
    }

    async fn write(&self, rows: &[Row]) -> Result<()> {
        if self.fail_writes.lock().map(|f| *f).unwrap_or(true) {
            return Err(SotdError::Persistence("write rejected".into()));
        }
        let mut stored = self
            .rows
            .lock()
            .map_err(|_| SotdError::Persistence("memory table poisoned".into()))?;
        *stored = rows.to_vec();
        Ok(())
    }
}

/// Owns the in-session log and persists every mutation as a full-table write.
///
/// A mutation only replaces the in-memory log once its write succeeded, so a
/// failed write leaves the session where it was.
pub struct SongLogStore<T> {
    table: T,
    log: SongLog,
}

impl<T: BackingTable> SongLogStore<T> {
    #[instrument(skip(table))]
    pub async fn load(table: T) -> Result<Self> {
        let rows = table.read().await?;
        let log = SongLog::from_rows(&rows)?;
        debug!(rows = rows.len(), entries = log.len(), "loaded song log");
        Ok(SongLogStore { table, log })
    }

    /// Re-reads the backing table, discarding the in-memory snapshot.
    pub async fn reload(&mut self) -> Result<()> {
        let rows = self.table.read().await?;
        self.log = SongLog::from_rows(&rows)?;
        Ok(())
    }

    pub fn log(&self) -> &SongLog {
        &self.log
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn find_by_date(&self, date: NaiveDate) -> Option<&Entry> {
        self.log.find_by_date(date)
    }

    /// Logs a new entry. Fails with `DuplicateDate` if the date is taken.
    #[instrument(skip(self, new), fields(date = %new.date))]
    pub async fn append(&mut self, new: NewEntry) -> Result<Entry> {
        if self.log.find_by_date(new.date).is_some() {
            return Err(SotdError::DuplicateDate(new.date));
        }
        let next = self.log.append(new);
        self.commit(next).await?;
        let entry = self.last_entry()?;
        info!(id = ?entry.id, title = %entry.song_title, "logged song");
        Ok(entry)
    }

    /// Removes every entry for `date`, returning how many were dropped.
    #[instrument(skip(self))]
    pub async fn remove_by_date(&mut self, date: NaiveDate) -> Result<usize> {
        let next = self.log.remove_by_date(date);
        let removed = self.log.len() - next.len();
        self.commit(next).await?;
        info!(removed, "removed entries");
        Ok(removed)
    }

    /// Swaps whatever is logged for the date with `new` in a single write.
    #[instrument(skip(self, new), fields(date = %new.date))]
    pub async fn replace(&mut self, new: NewEntry) -> Result<Entry> {
        let next = self.log.remove_by_date(new.date).append(new);
        self.commit(next).await?;
        let entry = self.last_entry()?;
        info!(id = ?entry.id, title = %entry.song_title, "replaced song");
        Ok(entry)
    }

    async fn commit(&mut self, next: SongLog) -> Result<()> {
        self.table.write(&next.to_rows()).await?;
        self.log = next;
        Ok(())
    }

    fn last_entry(&self) -> Result<Entry> {
        self.log
            .entries()
            .last()
            .cloned()
            .ok_or_else(|| SotdError::Persistence("log empty after append".into()))
    }
}
