//! Zero-allocation parsing utilities for tab-delimited coverage lines.
//!
//! These functions work on raw bytes and never allocate in the hot path.

use memchr::memchr;

/// Minimum number of columns in a coverage record.
pub const COVERAGE_COLUMNS: usize = 6;

/// Column holding the chromosome name.
pub const CHROM_COLUMN: usize = 0;
/// Column holding the site position.
pub const POSITION_COLUMN: usize = 1;
/// Column holding the total coverage.
pub const COVERAGE_COLUMN: usize = 4;
/// Column holding the methylated read count.
pub const METHYLATED_COLUMN: usize = 5;

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty, contains non-digit characters,
/// or overflows.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Split the first `N` tab-separated fields of `line` into `fields`.
///
/// Returns the number of fields found (at most `N`). The last stored field
/// stops at the next tab, so trailing columns are ignored.
#[inline]
pub fn split_fields<'a, const N: usize>(line: &'a [u8], fields: &mut [&'a [u8]; N]) -> usize {
    let mut rest = line;
    let mut count = 0;
    while count < N {
        match memchr(b'\t', rest) {
            Some(tab) => {
                fields[count] = &rest[..tab];
                rest = &rest[tab + 1..];
                count += 1;
            }
            None => {
                fields[count] = rest;
                count += 1;
                break;
            }
        }
    }
    count
}

/// Strip a trailing `\n` or `\r\n`.
#[inline(always)]
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Check if a line should be skipped (empty or comment/header).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_fast() {
        assert_eq!(parse_u64_fast(b"12345"), Some(12345));
        assert_eq!(parse_u64_fast(b"0"), Some(0));
        assert_eq!(parse_u64_fast(b""), None);
        assert_eq!(parse_u64_fast(b"abc"), None);
        assert_eq!(parse_u64_fast(b"-1"), None);
        assert_eq!(parse_u64_fast(b"12.5"), None);
        assert_eq!(parse_u64_fast(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_u64_fast(b"18446744073709551616"), None);
    }

    #[test]
    fn test_split_fields() {
        let mut fields: [&[u8]; COVERAGE_COLUMNS] = [b"".as_slice(); COVERAGE_COLUMNS];
        let n = split_fields(b"chr1\t100\t+\tCG\t10\t4\textra", &mut fields);
        assert_eq!(n, 6);
        assert_eq!(fields[CHROM_COLUMN], b"chr1");
        assert_eq!(fields[POSITION_COLUMN], b"100");
        assert_eq!(fields[COVERAGE_COLUMN], b"10");
        assert_eq!(fields[METHYLATED_COLUMN], b"4");
    }

    #[test]
    fn test_split_fields_short_line() {
        let mut fields: [&[u8]; COVERAGE_COLUMNS] = [b"".as_slice(); COVERAGE_COLUMNS];
        assert_eq!(split_fields(b"chr1\t100\t+", &mut fields), 3);
        assert_eq!(fields[2], b"+");
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"chr1\t1\n"), b"chr1\t1");
        assert_eq!(trim_line_end(b"chr1\t1\r\n"), b"chr1\t1");
        assert_eq!(trim_line_end(b"chr1\t1"), b"chr1\t1");
    }

    #[test]
    fn test_should_skip_line() {
        assert!(should_skip_line(b""));
        assert!(should_skip_line(b"#chrom\tpos"));
        assert!(!should_skip_line(b"chr1\t100\t+\tCG\t10\t4"));
    }
}
