/*!

This is the long-form manual for `annotation_session` and `textannot`.

## Workflow

The session walks a CSV dataset one row at a time. For each row the
annotator picks one choice per rating field and may leave a free-text
comment. Saving a row appends it to the output table (or overwrites the
previous annotation of the same row) and moves on to the next one. Closing
the program loses nothing: the next run resumes right after the last
annotated row.

## Input format

A CSV file with a header row. The schema names the columns that are shown
to the annotator; a named column that is missing from the file, or a blank
cell in one of them, is presented as `[empty]`. Columns the schema does not
mention ride along unchanged into the output. Rows shorter than the header
are padded with blank cells.

## Output format

One CSV per dataset, written as `annotations_<dataset file name>` under the
output directory (`annotations/` by default). Each row holds:

| columns                  | content                                         |
|--------------------------|-------------------------------------------------|
| dataset columns          | copied from the source row (minus exclusions)   |
| `timestamp`              | unix seconds at save time                       |
| `annotator`              | the name passed on the command line             |
| `comments`               | free text, `No Comments` when left blank        |
| one column per rating    | the selected choice                             |
| `annotation_time`        | seconds spent on the row                        |
| `source_index`           | zero-based row position in the dataset          |

There is at most one output row per `source_index`: re-annotating a row
replaces its previous record. The whole table is rewritten on every save,
through a temporary file in the same directory.

## Schema configuration

Built-in schemas are selected with `--schema` (`text`, `triples`,
`model-compare`). A custom schema is a JSON file passed with
`--schema-file`:

```json
{
  "name": "my-task",
  "displayColumns": ["prompt", "answer"],
  "ratingFields": [
    { "column": "Answer Rating", "choices": ["A", "B", "F", "Skipping"] }
  ],
  "excludeColumns": ["internal notes"],
  "progressFile": "progress.txt"
}
```

`excludeColumns` drops dataset columns from the output. `progressFile`
names a plain-text file holding the next row index; when present and valid
it takes precedence over scanning the output table at startup.

## Renderer contract

The session itself renders nothing. It produces one
[`DisplayPayload`](crate::DisplayPayload) per step: the display fields, the
current rating selections, the comment text and an end-of-dataset flag. A
renderer shows the payload, collects the selections and calls
[`submit`](crate::Session::submit) or [`go_back`](crate::Session::go_back)
with the payload's `index`. A submit with an incomplete or unknown
selection stores nothing and returns the same view, selections included.
The bundled console front end in `textannot` is one such renderer.

 */
