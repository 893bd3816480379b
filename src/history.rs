//! Durable, append-only command history.
//!
//! Two backends share the [`HistoryLog`] contract: a pretty-printed JSON
//! array rewritten on every append (the default, human-readable format) and a
//! line-delimited journal that only ever appends. Both load a missing,
//! unreadable or malformed file as an empty history; the journal then
//! replaces the bad file on its next append.

use crate::error::HistoryError;
use crate::storage::CommandRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFormat {
    #[default]
    Json,
    Journal,
}

pub trait HistoryLog {
    /// Adds a record and persists it before returning.
    fn append(&mut self, record: CommandRecord) -> Result<(), HistoryError>;

    /// All records, oldest first.
    fn all(&self) -> &[CommandRecord];

    fn path(&self) -> &Path;

    fn len(&self) -> usize {
        self.all().len()
    }

    fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// The last `n` records, oldest first.
    fn recent(&self, n: usize) -> &[CommandRecord] {
        let all = self.all();
        &all[all.len().saturating_sub(n)..]
    }
}

pub fn open(path: impl Into<PathBuf>, format: HistoryFormat) -> Box<dyn HistoryLog> {
    match format {
        HistoryFormat::Json => Box::new(JsonHistoryStore::open(path)),
        HistoryFormat::Journal => Box::new(JournalHistoryStore::open(path)),
    }
}

// Keeps timestamps non-decreasing even when the wall clock steps back.
fn clamp_timestamp(records: &[CommandRecord], record: &mut CommandRecord) {
    if let Some(last) = records.last() {
        if record.timestamp < last.timestamp {
            record.timestamp = last.timestamp;
        }
    }
}

// Writes `bytes` to a sibling temp file and renames it over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), HistoryError> {
    ensure_parent(path)?;
    let dir = match path.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => PathBuf::from("."),
    };
    let write_err = |source: std::io::Error| HistoryError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), HistoryError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| HistoryError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub struct JsonHistoryStore {
    path: PathBuf,
    records: Vec<CommandRecord>,
}

impl JsonHistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load(&path);
        Self { path, records }
    }

    fn load(path: &Path) -> Vec<CommandRecord> {
        if !path.exists() {
            return Vec::new();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history unreadable, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history malformed, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self) -> Result<(), HistoryError> {
        let mut content = serde_json::to_vec_pretty(&self.records)?;
        content.push(b'\n');
        replace_file(&self.path, &content)
    }
}

impl HistoryLog for JsonHistoryStore {
    fn append(&mut self, mut record: CommandRecord) -> Result<(), HistoryError> {
        clamp_timestamp(&self.records, &mut record);
        self.records.push(record);
        if let Err(e) = self.save() {
            self.records.pop();
            return Err(e);
        }
        debug!(path = %self.path.display(), count = self.records.len(), "history saved");
        Ok(())
    }

    fn all(&self) -> &[CommandRecord] {
        &self.records
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

pub struct JournalHistoryStore {
    path: PathBuf,
    records: Vec<CommandRecord>,
    // Set when the file on disk could not be loaded; the next append
    // replaces it instead of appending after the bad content.
    rewrite: bool,
}

impl JournalHistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (records, rewrite) = match Self::load(&path) {
            Some(records) => (records, false),
            None => (Vec::new(), true),
        };
        Self {
            path,
            records,
            rewrite,
        }
    }

    // `None` when the file exists but cannot be used.
    fn load(path: &Path) -> Option<Vec<CommandRecord>> {
        if !path.exists() {
            return Some(Vec::new());
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "journal unreadable, starting empty");
                return None;
            }
        };
        let parsed: Result<Vec<CommandRecord>, _> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<CommandRecord>(line))
            .collect();
        match parsed {
            Ok(records) => Some(records),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "journal malformed, starting empty");
                None
            }
        }
    }

    fn encode(record: &CommandRecord) -> Result<Vec<u8>, HistoryError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        Ok(line)
    }

    fn rewrite_with(&self, record: &CommandRecord) -> Result<(), HistoryError> {
        let mut content = Vec::new();
        for existing in self.records.iter().chain(std::iter::once(record)) {
            content.extend(Self::encode(existing)?);
        }
        replace_file(&self.path, &content)
    }

    fn write_line(&self, record: &CommandRecord) -> Result<(), HistoryError> {
        ensure_parent(&self.path)?;
        let line = Self::encode(record)?;
        let write_err = |source: std::io::Error| HistoryError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        file.write_all(&line).map_err(write_err)?;
        file.flush().map_err(write_err)?;
        Ok(())
    }
}

impl HistoryLog for JournalHistoryStore {
    fn append(&mut self, mut record: CommandRecord) -> Result<(), HistoryError> {
        clamp_timestamp(&self.records, &mut record);
        if self.rewrite {
            self.rewrite_with(&record)?;
            self.rewrite = false;
            debug!(path = %self.path.display(), "journal rewritten");
        } else {
            self.write_line(&record)?;
        }
        self.records.push(record);
        Ok(())
    }

    fn all(&self) -> &[CommandRecord] {
        &self.records
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
