use log::{debug, info};

use annotation_session::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::args::Args;

pub mod console;
pub mod io_csv;
pub mod progress;
pub mod schema_reader;

#[derive(Debug, Snafu)]
pub enum AnnError {
    #[snafu(display("Error opening dataset file {path}"))]
    OpeningDataset { source: csv::Error, path: String },
    #[snafu(display("Error reading dataset file {path}"))]
    ParsingDataset { source: csv::Error, path: String },
    #[snafu(display("Dataset file {path} has no header row"))]
    EmptyDatasetHeader { path: String },
    #[snafu(display("Error opening annotations file {path}"))]
    OpeningAnnotations { source: csv::Error, path: String },
    #[snafu(display("Error reading annotations file {path}"))]
    ParsingAnnotations { source: csv::Error, path: String },
    #[snafu(display(
        "Annotations file {path} holds columns [{found}] but this session expects [{expected}]"
    ))]
    AnnotationsHeaderMismatch {
        path: String,
        expected: String,
        found: String,
    },
    #[snafu(display("Error writing annotations file {path}"))]
    WritingAnnotations { source: csv::Error, path: String },
    #[snafu(display("Error replacing annotations file {path}"))]
    PersistingAnnotations {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error creating output directory {path}"))]
    CreatingOutputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening schema file {path}"))]
    OpeningSchema {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing schema file {path}"))]
    ParsingSchema {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("{name:?} is not a built-in schema (try text, triples or model-compare)"))]
    UnknownSchema { name: String },
    #[snafu(display("The session cannot start: {source}"))]
    InvalidSession { source: SessionError },
    #[snafu(display("Error saving the progress marker {path}"))]
    SavingProgress {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AnnResult<T> = Result<T, AnnError>;
pub type BAnnResult<T> = Result<T, Box<AnnError>>;

/// Location of the output table for a dataset: `annotations_<file name>`
/// under the output directory.
pub fn annotations_path_for(input_path: &str, out_dir: &str) -> PathBuf {
    let name = Path::new(input_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| input_path.to_string());
    Path::new(out_dir).join(format!("annotations_{}", name))
}

/// The file-owning side of a session: wraps the in-memory state machine with
/// the read-merge-write cycle on the annotations table and the optional
/// progress marker.
pub struct AnnotationSession {
    core: Session,
    annotations_path: PathBuf,
    progress_path: Option<PathBuf>,
}

impl AnnotationSession {
    /// Loads the dataset, derives the resume position and returns the first
    /// payload together with the session.
    pub fn open(
        schema: SessionSchema,
        input_path: &str,
        out_dir: &str,
        annotator: &str,
        start_index: usize,
    ) -> BAnnResult<(AnnotationSession, DisplayPayload)> {
        let progress_path = schema.progress_file.as_ref().map(PathBuf::from);
        let source = io_csv::read_source(input_path, &schema)?;
        let core = Session::new(schema, source, annotator).context(InvalidSessionSnafu {})?;
        let annotations_path = annotations_path_for(input_path, out_dir);
        info!(
            "open: dataset {:?} ({} rows), annotations {:?}",
            input_path,
            core.total(),
            annotations_path
        );
        let expected = core.output_columns();
        let existing = io_csv::read_annotations(&annotations_path, &expected)?
            .unwrap_or_else(|| AnnotationTable::new(expected));
        let marker = progress_path.as_deref().and_then(progress::read_marker);
        let mut session = AnnotationSession {
            core,
            annotations_path,
            progress_path,
        };
        let payload = session.core.resume(start_index, &existing, marker);
        Ok((session, payload))
    }

    /// Stores one annotation and returns the next payload. A submission that
    /// fails the completeness check changes nothing on disk and echoes the
    /// current view back.
    pub fn submit(
        &mut self,
        cur_index: usize,
        ratings: &HashMap<String, String>,
        comments: &str,
    ) -> BAnnResult<DisplayPayload> {
        let expected = self.core.output_columns();
        let mut table = io_csv::read_annotations(&self.annotations_path, &expected)?
            .unwrap_or_else(|| AnnotationTable::new(expected));
        match self.core.submit(cur_index, ratings, comments, &mut table) {
            SubmitOutcome::Blocked(payload) => Ok(payload),
            SubmitOutcome::Saved { merge, payload } => {
                io_csv::write_annotations(&self.annotations_path, &table)?;
                debug!("submit: row {} persisted as {:?}", cur_index, merge);
                self.save_marker()?;
                Ok(payload)
            }
        }
    }

    /// Steps back one row, reloading the saved annotation when one exists.
    pub fn go_back(&mut self, cur_index: usize) -> BAnnResult<DisplayPayload> {
        let expected = self.core.output_columns();
        let table = io_csv::read_annotations(&self.annotations_path, &expected)?
            .unwrap_or_else(|| AnnotationTable::new(expected));
        let payload = self.core.go_back(cur_index, &table);
        self.save_marker()?;
        Ok(payload)
    }

    pub fn schema(&self) -> &SessionSchema {
        self.core.schema()
    }

    pub fn choices_for(&self, column: &str) -> &[String] {
        self.core
            .schema()
            .rating_fields
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.choices.as_slice())
            .unwrap_or(&[])
    }

    pub fn annotations_path(&self) -> &Path {
        &self.annotations_path
    }

    pub fn output_columns(&self) -> Vec<String> {
        self.core.output_columns()
    }

    fn save_marker(&self) -> BAnnResult<()> {
        if let Some(path) = &self.progress_path {
            progress::write_marker(path, self.core.cursor())?;
        }
        Ok(())
    }
}

/// Entry point of the command line tool: resolves the schema, opens the
/// session and hands it to the console front end.
pub fn run_annotation(args: &Args) -> BAnnResult<()> {
    let schema = match &args.schema_file {
        Some(path) => schema_reader::read_schema_file(path)?,
        None => schema_reader::preset(&args.schema)?,
    };
    schema.validate().context(InvalidSessionSnafu {})?;
    info!("run_annotation: using schema {:?}", schema.name);
    let (mut session, first) = AnnotationSession::open(
        schema,
        &args.input,
        &args.out_dir,
        &args.annotator,
        args.start_index,
    )?;
    console::run_loop(&mut session, first)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use tempfile::tempdir;

    fn small_schema() -> SessionSchema {
        SessionSchema {
            name: "unit".to_string(),
            display_columns: vec!["prompt".to_string(), "answer".to_string()],
            rating_fields: vec![RatingField {
                column: "Answer Rating".to_string(),
                choices: vec![
                    "A".to_string(),
                    "B".to_string(),
                    "F".to_string(),
                    "Skipping".to_string(),
                ],
            }],
            exclude_columns: vec![],
            progress_file: None,
        }
    }

    fn ratings(value: &str) -> HashMap<String, String> {
        HashMap::from([("Answer Rating".to_string(), value.to_string())])
    }

    fn write_dataset(dir: &Path) -> String {
        let path = dir.join("reviews.csv");
        fs::write(&path, "prompt,answer\np0,a0\np1,a1\np2,a2\n").unwrap();
        path.to_string_lossy().to_string()
    }

    fn out_dir(dir: &Path) -> String {
        dir.join("annotations").to_string_lossy().to_string()
    }

    fn read_back(session: &AnnotationSession) -> AnnotationTable {
        io_csv::read_annotations(session.annotations_path(), &session.output_columns())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn output_path_is_derived_from_the_dataset_name() {
        assert_eq!(
            annotations_path_for("data/reviews.csv", "annotations"),
            PathBuf::from("annotations/annotations_reviews.csv")
        );
        assert_eq!(
            annotations_path_for("reviews.csv", "out"),
            PathBuf::from("out/annotations_reviews.csv")
        );
    }

    #[test]
    fn open_errors_without_a_dataset() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.csv").to_string_lossy().to_string();
        let err = AnnotationSession::open(small_schema(), &missing, &out_dir(dir.path()), "sam", 0)
            .err()
            .unwrap();
        assert!(matches!(*err, AnnError::OpeningDataset { .. }));
    }

    #[test]
    fn first_payload_shows_the_first_row() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let (_, payload) =
            AnnotationSession::open(small_schema(), &input, &out_dir(dir.path()), "sam", 0)
                .unwrap();
        assert_eq!(payload.index, 0);
        assert_eq!(payload.total, 3);
        assert_eq!(payload.fields[0], ("prompt".to_string(), "p0".to_string()));
        assert_eq!(payload.fields[1], ("answer".to_string(), "a0".to_string()));
    }

    #[test]
    fn submit_grows_the_file_and_resume_skips_past_it() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let out = out_dir(dir.path());
        let (mut session, payload) =
            AnnotationSession::open(small_schema(), &input, &out, "sam", 0).unwrap();
        let payload = session.submit(payload.index, &ratings("A"), "first").unwrap();
        session.submit(payload.index, &ratings("B"), "").unwrap();
        let table = read_back(&session);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.value_at(0, COMMENTS_COLUMN), Some("first"));
        assert_eq!(table.value_at(1, COMMENTS_COLUMN), Some(NO_COMMENTS));
        // a rewrite leaves exactly the annotations file behind
        let entries: Vec<_> = fs::read_dir(&out).unwrap().collect();
        assert_eq!(entries.len(), 1);
        // a fresh session carries on after the last annotated row
        let (_, resumed) =
            AnnotationSession::open(small_schema(), &input, &out, "sam", 0).unwrap();
        assert_eq!(resumed.index, 2);
    }

    #[test]
    fn blocked_submit_leaves_no_file_behind() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let out = out_dir(dir.path());
        let (mut session, payload) =
            AnnotationSession::open(small_schema(), &input, &out, "sam", 0).unwrap();
        let echoed = session
            .submit(payload.index, &HashMap::new(), "not ready")
            .unwrap();
        assert_eq!(echoed.index, 0);
        assert_eq!(echoed.comments, "not ready");
        assert!(fs::metadata(session.annotations_path()).is_err());
    }

    #[test]
    fn reannotating_a_row_overwrites_it() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let (mut session, payload) =
            AnnotationSession::open(small_schema(), &input, &out_dir(dir.path()), "sam", 0)
                .unwrap();
        session.submit(payload.index, &ratings("A"), "first try").unwrap();
        let back = session.go_back(1).unwrap();
        assert_eq!(back.index, 0);
        assert_eq!(back.ratings[0].1.as_deref(), Some("A"));
        assert_eq!(back.comments, "first try");
        session.submit(back.index, &ratings("F"), "changed my mind").unwrap();
        let table = read_back(&session);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.value_at(0, "Answer Rating"), Some("F"));
        assert_eq!(table.value_at(0, COMMENTS_COLUMN), Some("changed my mind"));
    }

    #[test]
    fn foreign_output_file_fails_fast() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let out = out_dir(dir.path());
        let target = annotations_path_for(&input, &out);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, "something,else\n1,2\n").unwrap();
        let err = AnnotationSession::open(small_schema(), &input, &out, "sam", 0)
            .err()
            .unwrap();
        assert!(matches!(*err, AnnError::AnnotationsHeaderMismatch { .. }));
    }

    #[test]
    fn progress_marker_guides_the_resume() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let out = out_dir(dir.path());
        let marker = dir.path().join("progress.txt");
        let mut schema = small_schema();
        schema.progress_file = Some(marker.to_string_lossy().to_string());
        let (mut session, payload) =
            AnnotationSession::open(schema.clone(), &input, &out, "sam", 0).unwrap();
        session.submit(payload.index, &ratings("A"), "").unwrap();
        assert_eq!(fs::read_to_string(&marker).unwrap().trim(), "1");
        // the marker wins over the output scan
        fs::write(&marker, "0\n").unwrap();
        let (_, rewound) =
            AnnotationSession::open(schema.clone(), &input, &out, "sam", 0).unwrap();
        assert_eq!(rewound.index, 0);
        // an unreadable marker falls back to the scan
        fs::write(&marker, "banana\n").unwrap();
        let (_, scanned) = AnnotationSession::open(schema, &input, &out, "sam", 0).unwrap();
        assert_eq!(scanned.index, 1);
    }

    #[test]
    fn finishing_the_dataset_ends_the_session() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.csv");
        fs::write(&path, "prompt,answer\np0,a0\np1,a1\n").unwrap();
        let input = path.to_string_lossy().to_string();
        let out = out_dir(dir.path());
        let (mut session, payload) =
            AnnotationSession::open(small_schema(), &input, &out, "sam", 0).unwrap();
        let payload = session.submit(payload.index, &ratings("A"), "").unwrap();
        let done = session.submit(payload.index, &ratings("B"), "").unwrap();
        assert!(done.end_of_data);
        assert!(done.fields.iter().all(|(_, v)| v == END_OF_DATASET));
        assert_eq!(read_back(&session).rows.len(), 2);
        // reopening goes straight to the terminal state
        let (_, resumed) = AnnotationSession::open(small_schema(), &input, &out, "sam", 0).unwrap();
        assert!(resumed.end_of_data);
    }

    #[test]
    fn a_schema_file_drives_the_session() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let schema_path = dir.path().join("schema.json");
        fs::write(
            &schema_path,
            r#"{
                "name": "reviews",
                "displayColumns": ["prompt"],
                "ratingFields": [
                    { "column": "Answer Rating", "choices": ["yes", "no"] }
                ]
            }"#,
        )
        .unwrap();
        let schema = schema_reader::read_schema_file(schema_path.to_str().unwrap()).unwrap();
        let (mut session, payload) =
            AnnotationSession::open(schema, &input, &out_dir(dir.path()), "sam", 0).unwrap();
        assert_eq!(payload.fields.len(), 1);
        let next = session.submit(payload.index, &ratings("yes"), "").unwrap();
        assert_eq!(next.index, 1);
        assert_eq!(read_back(&session).value_at(0, "Answer Rating"), Some("yes"));
    }

    #[test]
    fn annotator_name_must_not_be_blank() {
        let dir = tempdir().unwrap();
        let input = write_dataset(dir.path());
        let err = AnnotationSession::open(small_schema(), &input, &out_dir(dir.path()), "  ", 0)
            .err()
            .unwrap();
        assert!(matches!(
            *err,
            AnnError::InvalidSession {
                source: SessionError::EmptyAnnotator
            }
        ));
    }
}
