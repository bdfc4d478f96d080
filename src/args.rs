use clap::Parser;

/// This is a form-based annotation program for CSV datasets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The CSV dataset to annotate. The first row must name the columns.
    #[clap(short, long, value_parser)]
    pub input: String,

    /// The name recorded with every saved annotation.
    #[clap(short, long, value_parser)]
    pub annotator: String,

    /// (default 0) The index of the first example to present. Examples already in the
    /// annotations file are skipped on top of this.
    #[clap(long, value_parser, default_value_t = 0)]
    pub start_index: usize,

    /// (default text) The built-in schema to annotate with. See the documentation for
    /// the list of schemas.
    #[clap(short, long, value_parser, default_value = "text")]
    pub schema: String,

    /// (file path, optional) A JSON description of the columns to display and the
    /// ratings to collect. Setting this option overrides the --schema option.
    #[clap(long, value_parser)]
    pub schema_file: Option<String>,

    /// (default annotations) The directory receiving the annotations file.
    #[clap(long, value_parser, default_value = "annotations")]
    pub out_dir: String,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
