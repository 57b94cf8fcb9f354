//! Import/Export pipeline
//!
//! Rows move between the store and two interchange formats:
//! - JSON: a pretty-printed array of row objects, null columns left out
//! - CSV: a header taken from the first row's columns, one line per row
//!
//! Export files are named `{table}_{YYYYMMDD_HHMMSS}.{json|csv}`.

pub mod export;
pub mod import;

pub use export::{ExportOutcome, Exporter};
pub use import::{ImportReport, Importer};

use std::path::Path;
use std::str::FromStr;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use crate::entity::Entity;
use crate::{Error, Result};

/// Interchange format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Csv,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }

    pub fn all() -> &'static [Format] {
        &[Format::Json, Format::Csv]
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            _ => Err(Error::Validation(format!("Unknown format: {}", s))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// `{table}_{YYYYMMDD_HHMMSS}.{ext}` for an export taken at `at`
pub fn export_file_name(entity: Entity, format: Format, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        entity.table(),
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    #[test]
    fn test_export_file_name() {
        let at = Local.with_ymd_and_hms(2024, 11, 3, 9, 5, 7).unwrap();
        assert_eq!(
            export_file_name(Entity::Tournament, Format::Csv, at),
            "tournaments_20241103_090507.csv"
        );
        assert_eq!(
            export_file_name(Entity::Account, Format::Json, at),
            "users_20241103_090507.json"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(&PathBuf::from("teams.JSON")), Some(Format::Json));
        assert_eq!(Format::from_path(&PathBuf::from("dump/players.csv")), Some(Format::Csv));
        assert_eq!(Format::from_path(&PathBuf::from("players.xlsx")), None);
        assert_eq!(Format::from_path(&PathBuf::from("players")), None);
    }
}
