use crate::error::{AppError, Result};
use crate::sheets::FileMetadata;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Office Open XML spreadsheet, the only export format this tool requests
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLSX_EXTENSION: &str = "xlsx";

/// Opaque identifier of a remote spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkbookId(String);

impl WorkbookId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(AppError::Invalid(
                "workbook id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkbookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata snapshot of a remote workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workbook {
    title: String,
    file_size: u64,
    /// Milliseconds since Unix epoch
    updated_at: i64,
}

impl Workbook {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_at)
    }
}

impl From<FileMetadata> for Workbook {
    fn from(file: FileMetadata) -> Self {
        Workbook {
            title: file.name,
            file_size: file.size,
            updated_at: file.modified_time.timestamp_millis(),
        }
    }
}

/// Local file for one downloaded export: `<uuid>.xlsx` inside a directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filename {
    value: String,
    path: PathBuf,
}

impl Filename {
    pub fn generate_in(dir: &Path) -> Self {
        let value = format!("{}.{}", Uuid::new_v4(), XLSX_EXTENSION);
        Filename {
            path: dir.join(&value),
            value,
        }
    }

    /// Bare file name, `<uuid>.xlsx`
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Where the file lives, usable as given
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
