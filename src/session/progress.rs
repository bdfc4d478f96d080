// The resume marker: a one-line file holding the next index to annotate.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use snafu::prelude::*;

use crate::session::*;

/// Reads the marker if it is present and holds a number. Anything else is
/// treated as no marker, since the annotations file alone is enough to
/// resume from.
pub fn read_marker(path: &Path) -> Option<usize> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!("read_marker: no usable marker at {:?}: {}", path, e);
            return None;
        }
    };
    match content.trim().parse::<usize>() {
        Ok(idx) => {
            debug!("read_marker: {:?} points at index {}", path, idx);
            Some(idx)
        }
        Err(_) => {
            warn!(
                "read_marker: {:?} does not hold an index ({:?}), ignoring it",
                path,
                content.trim()
            );
            None
        }
    }
}

/// Records the next index to annotate. Called after every saved annotation
/// and every step back, so the marker always matches the cursor.
pub fn write_marker(path: &Path, next_index: usize) -> BAnnResult<()> {
    fs::write(path, format!("{}\n", next_index)).context(SavingProgressSnafu {
        path: path.display().to_string(),
    })?;
    debug!("write_marker: {:?} set to {}", path, next_index);
    Ok(())
}
