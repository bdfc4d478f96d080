// Schema files and the built-in presets.

use std::fs;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use annotation_session::{RatingField, SessionSchema};

use crate::session::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRatingField {
    pub column: String,
    pub choices: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub name: Option<String>,
    #[serde(rename = "displayColumns")]
    pub display_columns: Vec<String>,
    #[serde(rename = "ratingFields")]
    pub rating_fields: Vec<SchemaRatingField>,
    #[serde(rename = "excludeColumns")]
    pub exclude_columns: Option<Vec<String>>,
    #[serde(rename = "progressFile")]
    pub progress_file: Option<String>,
}

impl SchemaFile {
    fn into_schema(self, fallback_name: &str) -> SessionSchema {
        SessionSchema {
            name: self.name.unwrap_or_else(|| fallback_name.to_string()),
            display_columns: self.display_columns,
            rating_fields: self
                .rating_fields
                .into_iter()
                .map(|f| RatingField {
                    column: f.column,
                    choices: f.choices,
                })
                .collect(),
            exclude_columns: self.exclude_columns.unwrap_or_default(),
            progress_file: self.progress_file,
        }
    }
}

pub fn read_schema_file(path: &str) -> BAnnResult<SessionSchema> {
    let contents = fs::read_to_string(path).context(OpeningSchemaSnafu { path })?;
    let sf: SchemaFile =
        serde_json::from_str(contents.as_str()).context(ParsingSchemaSnafu { path })?;
    debug!("read_schema_file: loaded schema from {:?}", path);
    Ok(sf.into_schema(path))
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn letter_grades() -> Vec<String> {
    strings(&["A", "B", "F", "Skipping"])
}

/// The built-in schemas. The column vocabularies replicate the datasets these
/// campaigns were run on, misspellings included, so existing annotation files
/// keep loading.
pub fn preset(name: &str) -> BAnnResult<SessionSchema> {
    let schema = match name {
        "text" => SessionSchema {
            name: name.to_string(),
            display_columns: strings(&["initial_text", "input_text"]),
            rating_fields: vec![
                RatingField {
                    column: "Content and Related Accuracy Rating".to_string(),
                    choices: letter_grades(),
                },
                RatingField {
                    column: "Structure, Grammar, and Fluency Rating".to_string(),
                    choices: letter_grades(),
                },
                RatingField {
                    column: "Originality, Engagement, and Creativity Rating".to_string(),
                    choices: letter_grades(),
                },
            ],
            exclude_columns: strings(&["generated triple"]),
            progress_file: None,
        },
        "triples" => SessionSchema {
            name: name.to_string(),
            display_columns: strings(&["oreginal triple", "generated text", "generated triple"]),
            rating_fields: vec![
                RatingField {
                    column: "Generated Text Rating".to_string(),
                    choices: letter_grades(),
                },
                RatingField {
                    column: "Generated Triple Rating".to_string(),
                    choices: letter_grades(),
                },
            ],
            exclude_columns: vec![],
            progress_file: None,
        },
        "model-compare" => SessionSchema {
            name: name.to_string(),
            display_columns: strings(&["input_text", "generated_text_base", "generated_text_lora"]),
            rating_fields: vec![
                RatingField {
                    column: "rating_model_kg_mian".to_string(),
                    choices: strings(&["A", "B", "C", "D", "E"]),
                },
                RatingField {
                    column: "rating_model_kg_lora".to_string(),
                    choices: strings(&["A", "B", "C", "D", "E"]),
                },
                RatingField {
                    column: "preferred_kg".to_string(),
                    choices: strings(&["Model 1", "Model 2"]),
                },
            ],
            exclude_columns: vec![],
            progress_file: Some("progress.txt".to_string()),
        },
        _ => {
            return Err(Box::new(AnnError::UnknownSchema {
                name: name.to_string(),
            }))
        }
    };
    Ok(schema)
}
