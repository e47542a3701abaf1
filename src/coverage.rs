//! Streaming reader for sorted per-cytosine coverage files.
//!
//! Each data line is tab-delimited with at least six columns:
//! chromosome, position, two unused columns, coverage, methylated count.
//! The reader exposes a chromosome-aware cursor that the window scanner
//! drains one window at a time.

use crate::streaming::buffers::{
    DEFAULT_BATCH_CAPACITY, DEFAULT_CHROM_BUFFER, DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER,
};
use crate::streaming::parsing::{
    parse_u64_fast, should_skip_line, split_fields, trim_line_end, CHROM_COLUMN,
    COVERAGE_COLUMN, COVERAGE_COLUMNS, METHYLATED_COLUMN, POSITION_COLUMN,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading inputs or writing regions.
#[derive(Error, Debug)]
pub enum DmapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot open input file '{}': {source}", .path.display())]
    MissingInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Inputs start on different chromosomes (test: '{test}', control: '{control}'); \
         both files must be sorted with the same chromosome order"
    )]
    UnalignedInputs { test: String, control: String },
}

pub type Result<T> = std::result::Result<T, DmapError>;

/// Open a file for reading, mapping failure to [`DmapError::MissingInput`].
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<File> {
    let path = path.as_ref();
    File::open(path).map_err(|source| DmapError::MissingInput {
        path: path.to_path_buf(),
        source,
    })
}

/// One coverage line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageRecord {
    pub chrom: String,
    pub position: u64,
    pub coverage: u64,
    pub methylated: u64,
}

impl CoverageRecord {
    pub fn new(chrom: impl Into<String>, position: u64, coverage: u64, methylated: u64) -> Self {
        Self {
            chrom: chrom.into(),
            position,
            coverage,
            methylated,
        }
    }

    /// Reads without the methylation mark.
    #[inline]
    pub fn unmethylated(&self) -> u64 {
        self.coverage - self.methylated
    }

    #[inline]
    pub fn site(&self) -> Site {
        Site {
            position: self.position,
            coverage: self.coverage,
            methylated: self.methylated,
        }
    }
}

/// A cytosine site inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub position: u64,
    pub coverage: u64,
    pub methylated: u64,
}

impl Site {
    pub fn new(position: u64, coverage: u64, methylated: u64) -> Self {
        Self {
            position,
            coverage,
            methylated,
        }
    }

    #[inline]
    pub fn unmethylated(&self) -> u64 {
        self.coverage - self.methylated
    }
}

/// Result of draining one window from a reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowBatch {
    /// The stream has ended.
    Exhausted,
    /// The cursor is on another chromosome; carries its name.
    ChromosomeMismatch(String),
    /// Every site on the requested chromosome before the window end.
    /// May be empty.
    Records(Vec<Site>),
}

#[derive(Debug)]
enum Cursor {
    Unread,
    At,
    Exhausted,
}

/// Pull-based cursor over one sorted coverage source.
///
/// Sort order is assumed, not checked: records must be grouped by
/// chromosome and non-decreasing by position within each chromosome.
pub struct CoverageReader<R: BufRead> {
    reader: R,
    line_number: usize,
    buffer: Vec<u8>,
    current: CoverageRecord,
    cursor: Cursor,
}

impl CoverageReader<BufReader<File>> {
    /// Open a coverage file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = open_input(path)?;
        Ok(Self::new(BufReader::with_capacity(DEFAULT_INPUT_BUFFER, file)))
    }
}

impl<R: BufRead> CoverageReader<R> {
    /// Create a reader over any buffered source.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: Vec::with_capacity(DEFAULT_LINE_BUFFER),
            current: CoverageRecord {
                chrom: String::with_capacity(DEFAULT_CHROM_BUFFER),
                ..CoverageRecord::default()
            },
            cursor: Cursor::Unread,
        }
    }

    /// Move to the next record.
    ///
    /// Returns `Ok(false)` once the stream is exhausted; every later call is a
    /// no-op that also returns `Ok(false)`.
    pub fn advance(&mut self) -> Result<bool> {
        if matches!(self.cursor, Cursor::Exhausted) {
            return Ok(false);
        }
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if bytes_read == 0 {
                self.cursor = Cursor::Exhausted;
                return Ok(false);
            }
            self.line_number += 1;

            if should_skip_line(trim_line_end(&self.buffer)) {
                continue;
            }

            self.parse_current()?;
            self.cursor = Cursor::At;
            return Ok(true);
        }
    }

    /// The record under the cursor, or `None` once exhausted.
    pub fn current(&mut self) -> Result<Option<&CoverageRecord>> {
        self.prime()?;
        Ok(match self.cursor {
            Cursor::At => Some(&self.current),
            _ => None,
        })
    }

    /// Chromosome under the cursor, or `None` once exhausted.
    pub fn current_chrom(&mut self) -> Result<Option<&str>> {
        Ok(self.current()?.map(|rec| rec.chrom.as_str()))
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        matches!(self.cursor, Cursor::Exhausted)
    }

    /// Number of lines consumed so far, including skipped ones.
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Discard records until the cursor sits on `target` or the stream ends.
    pub fn skip_to_chromosome(&mut self, target: &str) -> Result<()> {
        self.prime()?;
        while matches!(self.cursor, Cursor::At) && self.current.chrom != target {
            self.advance()?;
        }
        Ok(())
    }

    /// Consume every record on `chrom` with position below `limit`.
    ///
    /// Leaves the cursor on the first record at or past `limit`, or on the
    /// first record of the next chromosome.
    pub fn collect_until(&mut self, chrom: &str, limit: u64) -> Result<WindowBatch> {
        self.prime()?;
        match self.cursor {
            Cursor::Exhausted => return Ok(WindowBatch::Exhausted),
            _ if self.current.chrom != chrom => {
                return Ok(WindowBatch::ChromosomeMismatch(self.current.chrom.clone()))
            }
            _ => {}
        }

        let mut sites = Vec::with_capacity(DEFAULT_BATCH_CAPACITY);
        while matches!(self.cursor, Cursor::At)
            && self.current.chrom == chrom
            && self.current.position < limit
        {
            sites.push(self.current.site());
            self.advance()?;
        }
        Ok(WindowBatch::Records(sites))
    }

    /// Read the first record if nothing has been read yet.
    #[inline]
    fn prime(&mut self) -> Result<()> {
        if matches!(self.cursor, Cursor::Unread) {
            self.advance()?;
        }
        Ok(())
    }

    fn parse_current(&mut self) -> Result<()> {
        let line = trim_line_end(&self.buffer);
        let mut fields: [&[u8]; COVERAGE_COLUMNS] = [b"".as_slice(); COVERAGE_COLUMNS];
        let found = split_fields(line, &mut fields);
        if found < COVERAGE_COLUMNS {
            return Err(DmapError::MalformedRecord {
                line: self.line_number,
                message: format!(
                    "Expected at least {} tab-separated fields, got {}",
                    COVERAGE_COLUMNS, found
                ),
            });
        }

        let position = self.parse_field(fields[POSITION_COLUMN], "position")?;
        let coverage = self.parse_field(fields[COVERAGE_COLUMN], "coverage")?;
        let methylated = self.parse_field(fields[METHYLATED_COLUMN], "methylated count")?;
        if methylated > coverage {
            return Err(DmapError::MalformedRecord {
                line: self.line_number,
                message: format!(
                    "Methylated count ({}) exceeds coverage ({})",
                    methylated, coverage
                ),
            });
        }

        let chrom = std::str::from_utf8(fields[CHROM_COLUMN]).map_err(|_| {
            DmapError::MalformedRecord {
                line: self.line_number,
                message: "Chromosome name is not valid UTF-8".to_string(),
            }
        })?;
        if self.current.chrom != chrom {
            self.current.chrom.clear();
            self.current.chrom.push_str(chrom);
        }
        self.current.position = position;
        self.current.coverage = coverage;
        self.current.methylated = methylated;
        Ok(())
    }

    fn parse_field(&self, bytes: &[u8], field_name: &str) -> Result<u64> {
        parse_u64_fast(bytes).ok_or_else(|| DmapError::MalformedRecord {
            line: self.line_number,
            message: format!(
                "Invalid {}: '{}'",
                field_name,
                String::from_utf8_lossy(bytes)
            ),
        })
    }
}
