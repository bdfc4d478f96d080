mod config;
pub mod manual;

use log::{debug, info, warn};

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;

pub use crate::config::*;

/// One single-user annotation pass over a dataset.
///
/// The session owns the loaded dataset, the cursor and the duration clock.
/// It never touches the filesystem: callers load the dataset and the output
/// table, pass the table into [`submit`](Session::submit) and
/// [`go_back`](Session::go_back), and persist it after every change.
///
/// The cursor lives in `[0, total]`; `total` is the terminal state and every
/// payload produced there carries `end_of_data`.
#[derive(Debug, Clone)]
pub struct Session {
    schema: SessionSchema,
    source: SourceTable,
    annotator: String,
    cursor: usize,
    // Instant of the last display change, the basis of annotation_time.
    last_event: Instant,
}

impl Session {
    pub fn new(
        schema: SessionSchema,
        source: SourceTable,
        annotator: &str,
    ) -> Result<Session, SessionError> {
        schema.validate()?;
        if annotator.trim().is_empty() {
            return Err(SessionError::EmptyAnnotator);
        }
        if source.is_empty() {
            return Err(SessionError::EmptyDataset);
        }
        Ok(Session {
            schema,
            source,
            annotator: annotator.trim().to_string(),
            cursor: 0,
            last_event: Instant::now(),
        })
    }

    pub fn schema(&self) -> &SessionSchema {
        &self.schema
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.source.len()
    }

    /// Header of the output table for this dataset and schema.
    pub fn output_columns(&self) -> Vec<String> {
        self.schema.output_columns(&self.source.columns)
    }

    /// Places the cursor and returns the first payload.
    ///
    /// The cursor is the larger of `start_index` and one past the largest
    /// source index recorded in `existing`. A progress marker takes
    /// precedence when it is in range; anything else falls back to the scan.
    pub fn resume(
        &mut self,
        start_index: usize,
        existing: &AnnotationTable,
        marker: Option<usize>,
    ) -> DisplayPayload {
        let scanned = match existing.max_source_index() {
            Some(max) => start_index.max(max + 1),
            None => start_index,
        };
        let resolved = match marker {
            Some(m) if m <= self.source.len() => {
                debug!("resume: progress marker {} overrides the scan result {}", m, scanned);
                m
            }
            Some(m) => {
                warn!("resume: progress marker {} is out of range, using the output scan", m);
                scanned
            }
            None => scanned,
        };
        self.cursor = resolved.min(self.source.len());
        info!(
            "Resuming annotation session from index {} of {}",
            self.cursor,
            self.source.len()
        );
        self.display()
    }

    /// Payload for the row under the cursor. Restarts the duration clock.
    pub fn display(&mut self) -> DisplayPayload {
        self.last_event = Instant::now();
        self.payload_at(self.cursor)
    }

    /// Stores one annotation and advances.
    ///
    /// Every rating field must carry one of its declared choices, otherwise
    /// nothing is stored and the current view comes back unchanged with the
    /// partial selections echoed. On success the record overwrites the row
    /// with the same source index in `table` or is appended, and the payload
    /// for `cur_index + 1` (or the terminal payload) is returned.
    pub fn submit(
        &mut self,
        cur_index: usize,
        ratings: &HashMap<String, String>,
        comments: &str,
        table: &mut AnnotationTable,
    ) -> SubmitOutcome {
        if cur_index >= self.source.len() {
            debug!("submit: index {} is past the last row, nothing to store", cur_index);
            return SubmitOutcome::Blocked(self.payload_at(cur_index));
        }
        let mut values: Vec<String> = Vec::with_capacity(self.schema.rating_fields.len());
        for field in &self.schema.rating_fields {
            let picked = ratings.get(&field.column).map(|v| v.trim()).unwrap_or("");
            if picked.is_empty() {
                debug!(
                    "submit: row {} has no selection for {:?}, keeping the current view",
                    cur_index, field.column
                );
                return SubmitOutcome::Blocked(self.echo_payload(cur_index, ratings, comments));
            }
            if !field.choices.iter().any(|c| c == picked) {
                warn!(
                    "submit: {:?} is not a choice of {:?}, keeping the current view",
                    picked, field.column
                );
                return SubmitOutcome::Blocked(self.echo_payload(cur_index, ratings, comments));
            }
            values.push(picked.to_string());
        }
        let now = Instant::now();
        let annotation_secs = now.duration_since(self.last_event).as_secs_f64();
        let record = self.build_record(cur_index, &values, comments, annotation_secs);
        let merge = table.merge_record(record, cur_index);
        self.last_event = now;
        self.cursor = cur_index + 1;
        debug!("submit: row {} stored as {:?}, cursor now {}", cur_index, merge, self.cursor);
        SubmitOutcome::Saved {
            merge,
            payload: self.payload_at(self.cursor),
        }
    }

    /// Steps back one row, reloading its saved annotation when one exists.
    ///
    /// At the first row the form is redisplayed cleared. Stepping back from
    /// the terminal state reopens the last row.
    pub fn go_back(&mut self, cur_index: usize, existing: &AnnotationTable) -> DisplayPayload {
        if cur_index == 0 {
            debug!("go_back: already at the first row");
            self.cursor = 0;
            return self.display();
        }
        let prev = cur_index.min(self.source.len()) - 1;
        self.cursor = prev;
        self.last_event = Instant::now();
        let mut payload = self.payload_at(prev);
        if let Some(pos) = existing.row_position(prev) {
            for (column, selection) in payload.ratings.iter_mut() {
                *selection = existing
                    .value_at(pos, column.as_str())
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string());
            }
            if let Some(saved) = existing.value_at(pos, COMMENTS_COLUMN) {
                payload.comments = saved.to_string();
            }
            debug!("go_back: row {} reloaded with its saved annotation", prev);
        } else {
            debug!("go_back: row {} has no saved annotation", prev);
        }
        payload
    }

    fn payload_at(&self, idx: usize) -> DisplayPayload {
        let total = self.source.len();
        if idx >= total {
            return DisplayPayload {
                index: total,
                total,
                fields: self
                    .schema
                    .display_columns
                    .iter()
                    .map(|c| (c.clone(), END_OF_DATASET.to_string()))
                    .collect(),
                ratings: self
                    .schema
                    .rating_fields
                    .iter()
                    .map(|f| (f.column.clone(), None))
                    .collect(),
                comments: END_OF_DATASET.to_string(),
                end_of_data: true,
            };
        }
        DisplayPayload {
            index: idx,
            total,
            fields: self
                .schema
                .display_columns
                .iter()
                .map(|c| {
                    let cell = self
                        .source
                        .value(idx, c)
                        .filter(|v| !v.is_empty())
                        .unwrap_or(EMPTY_CELL);
                    (c.clone(), cell.to_string())
                })
                .collect(),
            ratings: self
                .schema
                .rating_fields
                .iter()
                .map(|f| (f.column.clone(), None))
                .collect(),
            comments: String::new(),
            end_of_data: false,
        }
    }

    // The blocked view: same row, the caller's selections kept.
    fn echo_payload(
        &self,
        cur_index: usize,
        ratings: &HashMap<String, String>,
        comments: &str,
    ) -> DisplayPayload {
        let mut payload = self.payload_at(cur_index);
        for (column, selection) in payload.ratings.iter_mut() {
            *selection = ratings
                .get(column.as_str())
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string());
        }
        payload.comments = comments.to_string();
        payload
    }

    // Output row aligned to output_columns: retained dataset cells, then
    // timestamp, annotator, comments, ratings, annotation_time, source_index.
    fn build_record(
        &self,
        cur_index: usize,
        rating_values: &[String],
        comments: &str,
        annotation_secs: f64,
    ) -> Vec<String> {
        let row = &self.source.rows[cur_index];
        let mut record: Vec<String> = Vec::new();
        for (idx, col) in self.source.columns.iter().enumerate() {
            if self.schema.keeps_column(col) {
                record.push(row.get(idx).cloned().unwrap_or_default());
            }
        }
        record.push(Utc::now().timestamp().to_string());
        record.push(self.annotator.clone());
        if comments.trim().is_empty() {
            record.push(NO_COMMENTS.to_string());
        } else {
            record.push(comments.to_string());
        }
        record.extend(rating_values.iter().cloned());
        record.push(format!("{:.3}", annotation_secs));
        record.push(cur_index.to_string());
        record
    }
}
