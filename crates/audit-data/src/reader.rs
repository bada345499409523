//! Log file discovery and line streaming.
//!
//! Inputs may be plain text or gzip; the format is chosen from the first two
//! bytes of the file, never from its extension.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use audit_core::error::{AuditError, Result};
use flate2::read::MultiGzDecoder;
use tracing::{debug, warn};

/// Magic number at the start of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// ── Public API ────────────────────────────────────────────────────────────────

/// Expand `inputs` into a sorted, de-duplicated list of files.
///
/// Directories are walked recursively and every regular file below them is
/// included. A path that does not exist is an error.
pub fn collect_log_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();

    for input in inputs {
        if !input.exists() {
            return Err(AuditError::PathNotFound(input.clone()));
        }

        if input.is_dir() {
            let before = files.len();
            for entry in walkdir::WalkDir::new(input).follow_links(true) {
                let entry = entry.map_err(|e| walk_error(input, e))?;
                if entry.file_type().is_file() {
                    files.insert(entry.into_path());
                }
            }
            debug!(
                "Found {} files under {}",
                files.len() - before,
                input.display()
            );
        } else {
            files.insert(input.clone());
        }
    }

    Ok(files.into_iter().collect())
}

/// Open `path` for line-by-line reading, decompressing gzip transparently.
///
/// Every call opens a fresh handle, so the returned sequence can be
/// re-created at will.
pub fn open_log(path: &Path) -> Result<LogLines> {
    let file = File::open(path).map_err(|source| AuditError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut raw = BufReader::new(file);

    let reader: Box<dyn BufRead> = if starts_with_gzip_magic(&mut raw, path)? {
        debug!("Reading {} as gzip", path.display());
        Box::new(BufReader::new(MultiGzDecoder::new(raw)))
    } else {
        Box::new(raw)
    };

    Ok(LogLines::new(path.to_path_buf(), reader))
}

/// Peek at the buffered head of `raw` without consuming it.
fn starts_with_gzip_magic<R: BufRead>(raw: &mut R, path: &Path) -> Result<bool> {
    let head = raw.fill_buf().map_err(|source| AuditError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(head.starts_with(&GZIP_MAGIC))
}

/// A path below a directory input that cannot be visited fails the run.
fn walk_error(input: &Path, err: walkdir::Error) -> AuditError {
    let path = err.path().unwrap_or(input).to_path_buf();
    let source = std::io::Error::from(err);
    if source.kind() == std::io::ErrorKind::NotFound {
        AuditError::PathNotFound(path)
    } else {
        AuditError::FileRead { path, source }
    }
}

// ── LogLines ──────────────────────────────────────────────────────────────────

/// Iterator over the decoded lines of one log source.
///
/// A line that is not valid UTF-8 yields [`AuditError::LineDecode`] and
/// iteration continues with the next line. A read failure of the underlying
/// stream yields [`AuditError::FileRead`] once and then ends the sequence.
pub struct LogLines {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl LogLines {
    /// Wrap an arbitrary reader; `path` is only used for error reporting.
    pub fn new(path: PathBuf, reader: Box<dyn BufRead>) -> Self {
        Self {
            path,
            reader,
            buf: Vec::new(),
            line_no: 0,
            done: false,
        }
    }
}

impl Iterator for LogLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                self.line_no += 1;
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                match std::str::from_utf8(&self.buf) {
                    Ok(line) => Some(Ok(line.to_string())),
                    Err(_) => Some(Err(AuditError::LineDecode {
                        path: self.path.clone(),
                        line: self.line_no,
                    })),
                }
            }
            Err(source) => {
                warn!(
                    "Read error in {} after line {}: {}",
                    self.path.display(),
                    self.line_no,
                    source
                );
                self.done = true;
                Some(Err(AuditError::FileRead {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
