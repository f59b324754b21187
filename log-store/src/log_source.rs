//! Log file reading.

use std::{
    borrow::Cow,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, warn};

use crate::errors::StoreError;

/// Reads every non-blank line of a log file.
///
/// Lines are decoded one by one; invalid UTF-8 is replaced with U+FFFD and
/// never fails the whole file.
///
/// # Errors
/// `StoreError::Io` if the file cannot be read.
pub fn read_log_lines(path: impl AsRef<Path>) -> Result<Vec<String>, StoreError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    let mut lossy = 0usize;
    for chunk in reader.split(b'\n') {
        let bytes = chunk?;
        let line = String::from_utf8_lossy(&bytes);
        if matches!(line, Cow::Owned(_)) {
            lossy += 1;
        }
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            lines.push(line.to_string());
        }
    }
    if lossy > 0 {
        warn!(path = %path.display(), lossy, "lines with invalid UTF-8 were decoded lossily");
    }
    debug!(path = %path.display(), lines = lines.len(), "log file read");
    Ok(lines)
}
