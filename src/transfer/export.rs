//! Export: store rows -> JSON / CSV

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use chrono::Local;
use serde_json::Value as Json;
use crate::entity::Entity;
use crate::query::FilterSet;
use crate::repository::Repository;
use crate::serializer;
use crate::value::Row;
use crate::Result;
use super::{export_file_name, Format};

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Written {
        path: PathBuf,
        rows: usize,
        /// Rows left out because a value could not be serialized
        skipped: usize,
    },
    /// Nothing to write (empty tabular export)
    Empty,
}

impl std::fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportOutcome::Written { path, rows, skipped: 0 } => {
                write!(f, "{} rows -> {}", rows, path.display())
            }
            ExportOutcome::Written { path, rows, skipped } => {
                write!(f, "{} rows -> {} ({} skipped)", rows, path.display(), skipped)
            }
            ExportOutcome::Empty => write!(f, "no rows to export"),
        }
    }
}

/// Writes entity tables into an export directory
pub struct Exporter<'a> {
    repo: Repository<'a>,
    dir: PathBuf,
}

impl<'a> Exporter<'a> {
    pub fn new(repo: Repository<'a>, dir: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export every row of `entity`, inactive ones included
    pub fn export_entity(&self, entity: Entity, format: Format) -> Result<ExportOutcome> {
        let scanned = self
            .repo
            .scan(entity, &FilterSet::new().include_inactive(true))?;
        let mut rows = Vec::with_capacity(scanned.len());
        let mut unreadable = 0;
        for (idx, row) in scanned.into_iter().enumerate() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!("Skipping {} row {} on export: {}", entity.table(), idx + 1, e);
                    unreadable += 1;
                }
            }
        }

        if rows.is_empty() && unreadable == 0 && format == Format::Csv {
            tracing::info!("{}: nothing to export", entity.table());
            return Ok(ExportOutcome::Empty);
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(export_file_name(entity, format, Local::now()));
        let mut out = BufWriter::new(File::create(&path)?);

        let (written, skipped) = match format {
            Format::Json => write_json(&rows, &mut out)?,
            Format::Csv => write_csv(&rows, &mut out)?,
        };
        out.flush()?;

        tracing::info!("Exported {} {} rows to {}", written, entity.table(), path.display());
        Ok(ExportOutcome::Written {
            path,
            rows: written,
            skipped: skipped + unreadable,
        })
    }

    /// Export every entity, one file each
    pub fn export_all(&self, format: Format) -> Result<Vec<(Entity, ExportOutcome)>> {
        Entity::all()
            .iter()
            .map(|&entity| Ok((entity, self.export_entity(entity, format)?)))
            .collect()
    }
}

/// Serialize rows one at a time, dropping (and logging) rows that fail
fn serialize_rows<T>(rows: &[Row], encode: impl Fn(&Row) -> Result<T>) -> (Vec<T>, usize) {
    let mut encoded = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (idx, row) in rows.iter().enumerate() {
        match encode(row) {
            Ok(item) => encoded.push(item),
            Err(e) => {
                tracing::warn!("Skipping row {} on export: {}", idx + 1, e);
                skipped += 1;
            }
        }
    }
    (encoded, skipped)
}

/// Write rows as a pretty JSON array; returns (written, skipped)
pub fn write_json<W: Write>(rows: &[Row], out: W) -> Result<(usize, usize)> {
    let (objects, skipped) = serialize_rows(rows, serializer::row_to_object);
    let array: Vec<Json> = objects.into_iter().map(Json::Object).collect();
    serde_json::to_writer_pretty(out, &array)?;
    Ok((array.len(), skipped))
}

/// Write rows as CSV with a header from the first row's columns; returns
/// (written, skipped). Writes nothing for an empty row set.
pub fn write_csv<W: Write>(rows: &[Row], out: W) -> Result<(usize, usize)> {
    let Some(first) = rows.first() else {
        return Ok((0, 0));
    };

    let (records, skipped) = serialize_rows(rows, serializer::row_to_record);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(first.keys())?;
    for record in &records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok((records.len(), skipped))
}
