// Reading the dataset and reading/writing the annotations table.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use snafu::prelude::*;

use annotation_session::{AnnotationTable, SessionSchema, SourceTable, EMPTY_CELL};

use crate::session::*;

/// Loads the whole dataset. Columns named by the schema that are missing
/// from the file are synthesized with the placeholder, and blank cells in
/// them get the placeholder too, so the form never shows an empty field.
/// Rows shorter than the header are padded with blank cells.
pub fn read_source(path: &str, schema: &SessionSchema) -> BAnnResult<SourceTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(OpeningDatasetSnafu { path })?;
    let headers = rdr
        .headers()
        .context(ParsingDatasetSnafu { path })?
        .clone();
    let mut columns: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if columns.iter().all(|c| c.trim().is_empty()) {
        return Err(Box::new(AnnError::EmptyDatasetHeader {
            path: path.to_string(),
        }));
    }
    let mut rows: Vec<Vec<String>> = Vec::new();
    for (idx, record) in rdr.into_records().enumerate() {
        let record = record.context(ParsingDatasetSnafu { path })?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        if row.len() > columns.len() {
            warn!(
                "read_source: row {} has {} cells for {} columns, dropping the extras",
                idx,
                row.len(),
                columns.len()
            );
            row.truncate(columns.len());
        }
        while row.len() < columns.len() {
            row.push(String::new());
        }
        rows.push(row);
    }
    for display_col in &schema.display_columns {
        match columns.iter().position(|c| c == display_col) {
            Some(ci) => {
                for row in rows.iter_mut() {
                    if row[ci].trim().is_empty() {
                        row[ci] = EMPTY_CELL.to_string();
                    }
                }
            }
            None => {
                info!(
                    "read_source: column {:?} is missing from {:?}, synthesizing it",
                    display_col, path
                );
                columns.push(display_col.clone());
                for row in rows.iter_mut() {
                    row.push(EMPTY_CELL.to_string());
                }
            }
        }
    }
    debug!("read_source: {} rows, columns {:?}", rows.len(), columns);
    Ok(SourceTable { columns, rows })
}

/// Loads the annotations table if the file exists. An absent or empty file
/// means a fresh table; a file with a different header is rejected so that
/// no data gets silently realigned or dropped.
pub fn read_annotations(
    path: &Path,
    expected_columns: &[String],
) -> BAnnResult<Option<AnnotationTable>> {
    if !path.exists() {
        debug!("read_annotations: no file at {:?}, starting fresh", path);
        return Ok(None);
    }
    let shown = path.display().to_string();
    let mut rdr = csv::ReaderBuilder::new()
        .from_path(path)
        .context(OpeningAnnotationsSnafu { path: shown.clone() })?;
    let headers = rdr
        .headers()
        .context(ParsingAnnotationsSnafu { path: shown.clone() })?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        debug!("read_annotations: {:?} is empty, starting fresh", path);
        return Ok(None);
    }
    let columns: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if columns.as_slice() != expected_columns {
        return Err(Box::new(AnnError::AnnotationsHeaderMismatch {
            path: shown,
            expected: expected_columns.join(", "),
            found: columns.join(", "),
        }));
    }
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in rdr.into_records() {
        let record = record.context(ParsingAnnotationsSnafu { path: shown.clone() })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    debug!("read_annotations: {} rows from {:?}", rows.len(), path);
    Ok(Some(AnnotationTable { columns, rows }))
}

/// Rewrites the whole annotations file. The table lands first in a sibling
/// temporary file which then replaces the target, so a crash mid-write
/// cannot truncate the committed table.
pub fn write_annotations(path: &Path, table: &AnnotationTable) -> BAnnResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(CreatingOutputDirSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "annotations.csv".into());
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    {
        let mut wtr = csv::Writer::from_path(&tmp).context(WritingAnnotationsSnafu {
            path: tmp.display().to_string(),
        })?;
        wtr.write_record(&table.columns)
            .context(WritingAnnotationsSnafu {
                path: tmp.display().to_string(),
            })?;
        for row in &table.rows {
            wtr.write_record(row).context(WritingAnnotationsSnafu {
                path: tmp.display().to_string(),
            })?;
        }
        wtr.flush().context(PersistingAnnotationsSnafu {
            path: tmp.display().to_string(),
        })?;
    }
    fs::rename(&tmp, path).context(PersistingAnnotationsSnafu {
        path: path.display().to_string(),
    })?;
    debug!("write_annotations: {} rows written to {:?}", table.rows.len(), path);
    Ok(())
}
