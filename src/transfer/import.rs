//! Import: JSON / CSV -> store rows
//!
//! Each payload row is handled on its own:
//! 1. the primary key is dropped (ids are always store-assigned)
//! 2. keys outside the insert whitelist are dropped
//! 3. placeholders (`""`, `None`, `null`) become null, other values are
//!    decoded by column kind
//! 4. rows left without any value are skipped
//! 5. the row goes through the repository (guard + insert)
//!
//! A failing row is recorded and the batch carries on.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use serde_json::{Map, Value as Json};
use crate::entity::{Entity, EntitySpec};
use crate::repository::Repository;
use crate::serializer;
use crate::value::FieldMap;
use crate::{Error, Result};
use super::Format;

type PayloadRow = Map<String, Json>;

/// Outcome of one import batch
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub total: usize,
    /// Rows that carried no insertable data
    pub skipped: usize,
    /// One `Error::ImportRow` per failed row, in payload order
    pub failures: Vec<Error>,
}

impl ImportReport {
    /// `(imported, total)`
    pub fn counts(&self) -> (usize, usize) {
        (self.imported, self.total)
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for ImportReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} of {} rows imported ({} skipped, {} failed)",
            self.imported,
            self.total,
            self.skipped,
            self.failed()
        )
    }
}

/// Feeds interchange payloads through the repository
pub struct Importer<'a> {
    repo: Repository<'a>,
    on_row: Option<Box<dyn FnMut(usize, usize) + 'a>>,
}

impl<'a> Importer<'a> {
    pub fn new(repo: Repository<'a>) -> Self {
        Self { repo, on_row: None }
    }

    /// Call `f(done, total)` after every processed row
    pub fn on_progress(mut self, f: impl FnMut(usize, usize) + 'a) -> Self {
        self.on_row = Some(Box::new(f));
        self
    }

    /// Import a file, taking the format from its extension when not given
    pub fn import_file(&mut self, entity: Entity, path: &Path, format: Option<Format>) -> Result<ImportReport> {
        let format = format.or_else(|| Format::from_path(path)).ok_or_else(|| {
            Error::Validation(format!("Cannot tell the format of {}", path.display()))
        })?;
        let reader = BufReader::new(File::open(path)?);

        tracing::info!("Importing {} rows from {} ({})", entity.table(), path.display(), format);
        match format {
            Format::Json => self.import_json(entity, reader),
            Format::Csv => self.import_csv(entity, reader),
        }
    }

    /// Import a JSON array of row objects.
    ///
    /// A payload that is not an array fails as a whole; an element that is
    /// not an object fails as a row.
    pub fn import_json<R: Read>(&mut self, entity: Entity, reader: R) -> Result<ImportReport> {
        let payload: Vec<Json> = serde_json::from_reader(reader)?;
        let rows: Vec<Result<PayloadRow>> = payload
            .into_iter()
            .map(|item| match item {
                Json::Object(map) => Ok(map),
                other => Err(Error::serialization(
                    entity.spec().primary_key,
                    format!("expected a row object, found {}", other),
                )),
            })
            .collect();
        Ok(self.import_rows(entity, rows))
    }

    /// Import CSV with a header line; every cell is decoded from text
    pub fn import_csv<R: Read>(&mut self, entity: Entity, reader: R) -> Result<ImportReport> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let rows: Vec<Result<PayloadRow>> = csv_reader
            .records()
            .map(|record| -> Result<PayloadRow> {
                let record = record?;
                Ok(headers
                    .iter()
                    .zip(record.iter())
                    .map(|(key, cell)| (key.to_string(), Json::String(cell.to_string())))
                    .collect::<PayloadRow>())
            })
            .collect();
        Ok(self.import_rows(entity, rows))
    }

    /// Insert pre-parsed rows one by one
    pub fn import_rows(&mut self, entity: Entity, rows: Vec<Result<PayloadRow>>) -> ImportReport {
        let spec = entity.spec();
        let mut report = ImportReport {
            total: rows.len(),
            ..Default::default()
        };

        for (idx, row) in rows.into_iter().enumerate() {
            let line = idx + 1;
            let outcome = row.and_then(|row| project_row(spec, &row)).and_then(|fields| {
                if fields.is_empty() {
                    Ok(None)
                } else {
                    self.repo.create(entity, &fields).map(Some)
                }
            });

            match outcome {
                Ok(Some(_)) => report.imported += 1,
                Ok(None) => {
                    tracing::debug!("{} row {}: no insertable data, skipped", entity.table(), line);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("{} row {} failed: {}", entity.table(), line, e);
                    report.failures.push(Error::ImportRow {
                        row: line,
                        source: Box::new(e),
                    });
                }
            }

            if let Some(on_row) = self.on_row.as_mut() {
                on_row(line, report.total);
            }
        }

        tracing::info!("{}: {}", entity.table(), report);
        report
    }
}

/// Strip the key, keep whitelisted columns, decode values and drop nulls so
/// store defaults apply.
///
/// Dropping a null is deliberate: an empty `tier`, `status`, `best_of`,
/// score or `role` cell would otherwise hit the NOT NULL constraint, so the
/// column default is stored in its place. A null in a nullable column is
/// left out too and ends up NULL either way.
fn project_row(spec: &EntitySpec, row: &PayloadRow) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for (key, raw) in row {
        if key == spec.primary_key {
            continue;
        }
        let Some(column) = spec.insertable(key) else {
            continue;
        };
        let value = serializer::from_interchange(column, raw)?;
        if !value.is_null() {
            fields.insert(column.name, value);
        }
    }
    Ok(fields)
}
