// ********* Schema structures ***********

use log::warn;
use std::error::Error;
use std::fmt::Display;

/// Cell content used when an expected column is missing from the dataset
/// or when a cell of an expected column is blank.
pub const EMPTY_CELL: &str = "[empty]";

/// Stored in the comments column when the annotator left it blank.
pub const NO_COMMENTS: &str = "No Comments";

/// Shown in every display field once the cursor moves past the last row.
pub const END_OF_DATASET: &str = "End of dataset";

pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const ANNOTATOR_COLUMN: &str = "annotator";
pub const COMMENTS_COLUMN: &str = "comments";
pub const ANNOTATION_TIME_COLUMN: &str = "annotation_time";
pub const SOURCE_INDEX_COLUMN: &str = "source_index";

/// One single-choice rating control: the output column it fills and the
/// closed vocabulary it accepts.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RatingField {
    pub column: String,
    pub choices: Vec<String>,
}

/// Declarative description of one annotation task.
///
/// The same session machinery runs every task; only the schema changes:
/// which dataset columns are shown, which rating columns are collected and
/// with which vocabulary, and which dataset columns are dropped from the
/// output.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SessionSchema {
    pub name: String,
    pub display_columns: Vec<String>,
    pub rating_fields: Vec<RatingField>,
    pub exclude_columns: Vec<String>,
    /// File holding the next row index, for resuming without scanning the
    /// output table. Relative paths are resolved by the caller.
    pub progress_file: Option<String>,
}

impl SessionSchema {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.display_columns.is_empty() {
            return Err(SessionError::NoDisplayColumns);
        }
        if self.rating_fields.is_empty() {
            return Err(SessionError::NoRatingFields);
        }
        for (idx, field) in self.rating_fields.iter().enumerate() {
            if field.choices.is_empty() {
                return Err(SessionError::NoChoices {
                    field: field.column.clone(),
                });
            }
            if self.rating_fields[..idx]
                .iter()
                .any(|f| f.column == field.column)
            {
                return Err(SessionError::DuplicateRatingColumn {
                    field: field.column.clone(),
                });
            }
        }
        Ok(())
    }

    /// The columns appended after the retained dataset columns, in output
    /// order.
    pub fn metadata_columns(&self) -> Vec<String> {
        let mut cols = vec![
            TIMESTAMP_COLUMN.to_string(),
            ANNOTATOR_COLUMN.to_string(),
            COMMENTS_COLUMN.to_string(),
        ];
        cols.extend(self.rating_fields.iter().map(|f| f.column.clone()));
        cols.push(ANNOTATION_TIME_COLUMN.to_string());
        cols.push(SOURCE_INDEX_COLUMN.to_string());
        cols
    }

    fn is_metadata_column(&self, name: &str) -> bool {
        name == TIMESTAMP_COLUMN
            || name == ANNOTATOR_COLUMN
            || name == COMMENTS_COLUMN
            || name == ANNOTATION_TIME_COLUMN
            || name == SOURCE_INDEX_COLUMN
            || self.rating_fields.iter().any(|f| f.column == name)
    }

    /// Whether a dataset column is carried into the output. Excluded columns
    /// are dropped; a dataset column named like a metadata column is shadowed
    /// by the metadata value.
    pub fn keeps_column(&self, name: &str) -> bool {
        !self.exclude_columns.iter().any(|c| c == name) && !self.is_metadata_column(name)
    }

    /// Header of the output table for a dataset with the given columns.
    pub fn output_columns(&self, source_columns: &[String]) -> Vec<String> {
        let mut cols: Vec<String> = source_columns
            .iter()
            .filter(|c| self.keeps_column(c))
            .cloned()
            .collect();
        cols.extend(self.metadata_columns());
        cols
    }
}

// ********* Table structures ***********

/// The dataset, fully loaded. Rows are aligned to the header and are never
/// renumbered; a row is identified by its position.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SourceTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(|s| s.as_str())
    }
}

/// The output table held in memory between a read and a rewrite.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnnotationTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AnnotationTable {
    pub fn new(columns: Vec<String>) -> AnnotationTable {
        AnnotationTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value_at(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(|s| s.as_str())
    }

    /// Largest source index recorded in the table, the basis of the resume
    /// rule. Rows with an unparseable index are skipped.
    pub fn max_source_index(&self) -> Option<usize> {
        let idx = self.column_index(SOURCE_INDEX_COLUMN)?;
        let mut max: Option<usize> = None;
        for (pos, row) in self.rows.iter().enumerate() {
            match row.get(idx).and_then(|v| v.trim().parse::<usize>().ok()) {
                Some(v) => max = Some(max.map_or(v, |m| m.max(v))),
                None => warn!("max_source_index: row {} has no numeric source index", pos),
            }
        }
        max
    }

    /// Position of the row annotating the given source index, if any.
    pub fn row_position(&self, source_index: usize) -> Option<usize> {
        let idx = self.column_index(SOURCE_INDEX_COLUMN)?;
        let key = source_index.to_string();
        self.rows
            .iter()
            .position(|r| r.get(idx).map(|v| v.trim()) == Some(key.as_str()))
    }

    /// Overwrites the row with the same source index, or appends.
    /// Invariant: at most one row per source index.
    pub fn merge_record(&mut self, record: Vec<String>, source_index: usize) -> MergeOutcome {
        match self.row_position(source_index) {
            Some(pos) => {
                self.rows[pos] = record;
                MergeOutcome::Updated { row: pos }
            }
            None => {
                self.rows.push(record);
                MergeOutcome::Appended
            }
        }
    }
}

// ********* Display payloads ***********

/// Everything a renderer needs to present one step of the session.
/// Pure data; no widget state lives in the session.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DisplayPayload {
    /// Row the payload describes, equal to the cursor. Passed back verbatim
    /// as `cur_index` on the next submit or go-back call.
    pub index: usize,
    pub total: usize,
    /// Display column name and cell text, in schema order.
    pub fields: Vec<(String, String)>,
    /// Rating column name and current selection, in schema order.
    pub ratings: Vec<(String, Option<String>)>,
    pub comments: String,
    pub end_of_data: bool,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum MergeOutcome {
    Updated { row: usize },
    Appended,
}

/// Result of a submit call. A blocked submit stored nothing and echoes the
/// current view back, selections included.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SubmitOutcome {
    Blocked(DisplayPayload),
    Saved {
        merge: MergeOutcome,
        payload: DisplayPayload,
    },
}

// ********* Errors ***********

/// Errors that prevent a session from being constructed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum SessionError {
    EmptyAnnotator,
    EmptyDataset,
    NoDisplayColumns,
    NoRatingFields,
    NoChoices { field: String },
    DuplicateRatingColumn { field: String },
}

impl Error for SessionError {}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyAnnotator => write!(f, "the annotator name is empty"),
            SessionError::EmptyDataset => write!(f, "the dataset has no rows"),
            SessionError::NoDisplayColumns => {
                write!(f, "the schema declares no display columns")
            }
            SessionError::NoRatingFields => write!(f, "the schema declares no rating fields"),
            SessionError::NoChoices { field } => {
                write!(f, "the rating field {:?} has an empty choice list", field)
            }
            SessionError::DuplicateRatingColumn { field } => {
                write!(f, "the rating column {:?} is declared more than once", field)
            }
        }
    }
}
