//! Random-access merge of two methylation matrix ("mat") files.
//!
//! A mat file has a header line whose columns from the fifth onward name the
//! replicates, followed by one row per site:
//! `chrom  pos  avg  stdev  rep1  rep2 ...`.
//!
//! # Algorithm
//!
//! 1. Index both mat files: (chrom, pos) key -> byte offset of the row
//! 2. Stream the comparison file (a header, then rows keyed by chrom and pos)
//! 3. For each site present in both indexes, write the full row of the first
//!    file followed by the second file's row without its key columns
//!
//! Large mat files are memory-mapped so rows can be fetched by offset
//! without re-reading the file.

use crate::coverage::{open_input, DmapError, Result};
use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, DEFAULT_LINE_BUFFER, DEFAULT_OUTPUT_BUFFER};
use crate::streaming::parsing::trim_line_end;
use log::info;
use memchr::memchr;
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::ops::Deref;
use std::path::Path;

/// Minimum file size to use mmap (smaller files are read into memory).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Number of leading header columns that are not replicate names.
const MAT_FIXED_COLUMNS: usize = 4;

/// Contents of a mat file, either mapped or read into memory.
enum MatData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl MatData {
    fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = open_input(path)?;
        let size = file.metadata()?.len();
        if size >= MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(MatData::Mapped(mmap))
        } else {
            let mut buf = Vec::with_capacity(size as usize);
            file.read_to_end(&mut buf)?;
            Ok(MatData::Owned(buf))
        }
    }
}

impl Deref for MatData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            MatData::Mapped(m) => m,
            MatData::Owned(v) => v,
        }
    }
}

/// The first two tab-separated columns of a row (`chrom\tpos`).
#[inline]
fn site_key(line: &[u8]) -> Option<&[u8]> {
    let tab1 = memchr(b'\t', line)?;
    let rest = &line[tab1 + 1..];
    let pos_len = memchr(b'\t', rest).unwrap_or(rest.len());
    if tab1 == 0 || pos_len == 0 {
        return None;
    }
    Some(&line[..tab1 + 1 + pos_len])
}

/// Everything after the second column, without the separating tab.
#[inline]
fn after_key(line: &[u8]) -> &[u8] {
    match memchr(b'\t', line) {
        Some(tab1) => {
            let rest = &line[tab1 + 1..];
            match memchr(b'\t', rest) {
                Some(tab2) => &rest[tab2 + 1..],
                None => b"",
            }
        }
        None => b"",
    }
}

/// Site index over one mat file held in memory.
pub struct MatIndex<'a> {
    data: &'a [u8],
    samples: Vec<String>,
    offsets: FxHashMap<&'a [u8], usize>,
}

impl<'a> MatIndex<'a> {
    /// Index every row of `data`. The first line is the header.
    pub fn build(data: &'a [u8]) -> Result<Self> {
        let header_end = match memchr(b'\n', data) {
            Some(i) => i + 1,
            None if data.is_empty() => {
                return Err(DmapError::MalformedRecord {
                    line: 1,
                    message: "mat file has no header line".to_string(),
                })
            }
            None => data.len(),
        };
        let samples = trim_line_end(&data[..header_end])
            .split(|&b| b == b'\t')
            .skip(MAT_FIXED_COLUMNS)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();

        let mut offsets = FxHashMap::default();
        let mut pos = header_end;
        let mut line_number = 1;
        while pos < data.len() {
            let end = memchr(b'\n', &data[pos..]).map_or(data.len(), |i| pos + i + 1);
            line_number += 1;
            let line = trim_line_end(&data[pos..end]);
            if !line.is_empty() {
                let key = site_key(line).ok_or_else(|| DmapError::MalformedRecord {
                    line: line_number,
                    message: "expected chromosome and position columns".to_string(),
                })?;
                // Later duplicates replace earlier rows.
                offsets.insert(key, pos);
            }
            pos = end;
        }

        Ok(Self {
            data,
            samples,
            offsets,
        })
    }

    /// Replicate names from the header.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Number of indexed sites.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The row for `key` (`chrom\tpos`), without its line ending.
    pub fn row(&self, key: &[u8]) -> Option<&'a [u8]> {
        let start = *self.offsets.get(key)?;
        let rest = &self.data[start..];
        let end = memchr(b'\n', rest).unwrap_or(rest.len());
        Some(trim_line_end(&rest[..end]))
    }
}

/// Merge command for two mat files at the sites of a comparison file.
#[derive(Debug, Clone, Default)]
pub struct MatMergeCommand;

impl MatMergeCommand {
    pub fn new() -> Self {
        Self
    }

    /// Merge `mat1` and `mat2` at every site listed in `mcomp`.
    pub fn run<P: AsRef<Path>, W: Write>(
        &self,
        mcomp: P,
        mat1: P,
        mat2: P,
        output: W,
    ) -> Result<MatMergeStats> {
        let comparison = open_input(&mcomp)?;
        let data1 = MatData::open(&mat1)?;
        let data2 = MatData::open(&mat2)?;

        let (index1, index2) = rayon::join(|| MatIndex::build(&data1), || MatIndex::build(&data2));
        let index1 = index1?;
        info!(
            "Indexed {} sites in '{}'",
            index1.len(),
            mat1.as_ref().display()
        );
        let index2 = index2?;
        info!(
            "Indexed {} sites in '{}'",
            index2.len(),
            mat2.as_ref().display()
        );

        let reader = BufReader::with_capacity(DEFAULT_INPUT_BUFFER, comparison);
        let stats = self.merge(reader, &index1, &index2, output)?;
        info!(
            "Wrote {} of {} sites from '{}'",
            stats.sites_written,
            stats.sites_compared,
            mcomp.as_ref().display()
        );
        Ok(stats)
    }

    /// Write the merged header and one row per comparison site found in both indexes.
    pub fn merge<R: BufRead, W: Write>(
        &self,
        mut comparison: R,
        index1: &MatIndex<'_>,
        index2: &MatIndex<'_>,
        output: W,
    ) -> Result<MatMergeStats> {
        let mut writer = BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output);
        write_header(&mut writer, index1.samples(), index2.samples())?;

        let mut stats = MatMergeStats {
            sites_mat1: index1.len(),
            sites_mat2: index2.len(),
            ..MatMergeStats::default()
        };
        let mut buffer = Vec::with_capacity(DEFAULT_LINE_BUFFER);
        let mut line_number = 0;
        loop {
            buffer.clear();
            if comparison.read_until(b'\n', &mut buffer)? == 0 {
                break;
            }
            line_number += 1;
            let line = trim_line_end(&buffer);
            if line_number == 1 || line.is_empty() {
                continue;
            }

            let key = site_key(line).ok_or_else(|| DmapError::MalformedRecord {
                line: line_number,
                message: "expected chromosome and position columns".to_string(),
            })?;
            stats.sites_compared += 1;

            if let (Some(row1), Some(row2)) = (index1.row(key), index2.row(key)) {
                writer.write_all(row1)?;
                writer.write_all(b"\t")?;
                writer.write_all(after_key(row2))?;
                writer.write_all(b"\n")?;
                stats.sites_written += 1;
            }
        }

        writer.flush()?;
        Ok(stats)
    }
}

fn write_header<W: Write>(writer: &mut W, samples1: &[String], samples2: &[String]) -> Result<()> {
    writer.write_all(b"Chrom\tPos\tC1:Avg\tC1:Stdev")?;
    for name in samples1 {
        write!(writer, "\tC1:{}", name)?;
    }
    writer.write_all(b"\tC2:Avg\tC2:Stdev")?;
    for name in samples2 {
        write!(writer, "\tC2:{}", name)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

/// Statistics from a mat merge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatMergeStats {
    /// Sites indexed in the first mat file
    pub sites_mat1: usize,
    /// Sites indexed in the second mat file
    pub sites_mat2: usize,
    /// Sites listed in the comparison file
    pub sites_compared: usize,
    /// Sites found in both mat files and written
    pub sites_written: usize,
}

impl fmt::Display for MatMergeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mat1 sites: {}, Mat2 sites: {}, Compared: {}, Written: {}",
            self.sites_mat1, self.sites_mat2, self.sites_compared, self.sites_written
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAT1: &str = "Chrom\tPos\tAvg\tStdev\tr1\tr2\n\
                        chr1\t100\t0.5\t0.1\t0.4\t0.6\n\
                        chr1\t200\t0.2\t0.0\t0.2\t0.2\n\
                        chr2\t50\t0.9\t0.05\t0.85\t0.95\n";

    const MAT2: &str = "Chrom\tPos\tAvg\tStdev\tk1\n\
                        chr1\t100\t0.1\t0.0\t0.1\n\
                        chr2\t50\t0.3\t0.0\t0.3\n";

    const MCOMP: &str = "Chrom\tPos\tDiff\n\
                         chr1\t100\t0.4\n\
                         chr1\t200\t0.3\n\
                         chr2\t50\t0.6\n\
                         chr3\t10\t0.5\n";

    #[test]
    fn test_index_build() {
        let index = MatIndex::build(MAT1.as_bytes()).unwrap();
        assert_eq!(index.samples(), &["r1".to_string(), "r2".to_string()]);
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.row(b"chr1\t200"),
            Some(&b"chr1\t200\t0.2\t0.0\t0.2\t0.2"[..])
        );
        assert_eq!(index.row(b"chr1\t20"), None);
    }

    #[test]
    fn test_index_rejects_empty_file() {
        assert!(matches!(
            MatIndex::build(b""),
            Err(DmapError::MalformedRecord { line: 1, .. })
        ));
    }

    #[test]
    fn test_index_rejects_keyless_row() {
        let data = b"Chrom\tPos\tAvg\tStdev\nchr1\n";
        assert!(matches!(
            MatIndex::build(data),
            Err(DmapError::MalformedRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_merge_sites_in_both() {
        let index1 = MatIndex::build(MAT1.as_bytes()).unwrap();
        let index2 = MatIndex::build(MAT2.as_bytes()).unwrap();
        let mut output = Vec::new();
        let stats = MatMergeCommand::new()
            .merge(MCOMP.as_bytes(), &index1, &index2, &mut output)
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Chrom\tPos\tC1:Avg\tC1:Stdev\tC1:r1\tC1:r2\tC2:Avg\tC2:Stdev\tC2:k1"
        );
        assert_eq!(lines[1], "chr1\t100\t0.5\t0.1\t0.4\t0.6\t0.1\t0.0\t0.1");
        assert_eq!(lines[2], "chr2\t50\t0.9\t0.05\t0.85\t0.95\t0.3\t0.0\t0.3");
        assert_eq!(lines.len(), 3);
        assert_eq!(stats.sites_compared, 4);
        assert_eq!(stats.sites_written, 2);
    }

    #[test]
    fn test_site_key_and_after_key() {
        assert_eq!(site_key(b"chr1\t100\t0.5"), Some(&b"chr1\t100"[..]));
        assert_eq!(site_key(b"chr1\t100"), Some(&b"chr1\t100"[..]));
        assert_eq!(site_key(b"chr1"), None);
        assert_eq!(after_key(b"chr1\t100\t0.5\t0.1"), b"0.5\t0.1");
        assert_eq!(after_key(b"chr1\t100"), b"");
    }
}
