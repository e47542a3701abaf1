//! Efficient output formatting for region streams.
//!
//! Uses itoa for integer formatting and ryu for float formatting
//! to avoid allocation in the hot path.

use crate::coverage::DmapError;
use crate::region::Region;
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use std::io::{BufWriter, Write};

/// Header line of the region output.
pub const REGION_HEADER: &[u8] = b"#Chrom\tStart\tEnd\tDiff\tPval\n";

/// Destination for finished regions.
pub trait RegionSink {
    fn emit(&mut self, region: &Region) -> Result<(), DmapError>;
}

impl RegionSink for Vec<Region> {
    fn emit(&mut self, region: &Region) -> Result<(), DmapError> {
        self.push(region.clone());
        Ok(())
    }
}

impl<S: RegionSink + ?Sized> RegionSink for &mut S {
    fn emit(&mut self, region: &Region) -> Result<(), DmapError> {
        (**self).emit(region)
    }
}

/// Buffered tab-delimited region writer.
pub struct RegionWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
    written: usize,
}

impl<W: Write> RegionWriter<W> {
    /// Create a new RegionWriter with the default output buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    /// Create a new RegionWriter with specified buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
            written: 0,
        }
    }

    /// Write the `#Chrom Start End Diff Pval` header line.
    pub fn write_header(&mut self) -> Result<(), DmapError> {
        self.writer.write_all(REGION_HEADER).map_err(DmapError::Io)
    }

    /// Write one region row.
    #[inline]
    pub fn write_region(&mut self, region: &Region) -> Result<(), DmapError> {
        self.writer
            .write_all(region.chrom.as_bytes())
            .map_err(DmapError::Io)?;
        self.write_tab()?;
        self.write_int(region.start)?;
        self.write_tab()?;
        self.write_int(region.end)?;
        self.write_tab()?;
        self.write_float(region.diff)?;
        self.write_tab()?;
        self.write_float(region.pvalue)?;
        self.writer.write_all(b"\n").map_err(DmapError::Io)?;
        self.written += 1;
        Ok(())
    }

    #[inline]
    fn write_tab(&mut self) -> Result<(), DmapError> {
        self.writer.write_all(b"\t").map_err(DmapError::Io)
    }

    #[inline]
    fn write_int(&mut self, n: u64) -> Result<(), DmapError> {
        self.writer
            .write_all(self.itoa_buf.format(n).as_bytes())
            .map_err(DmapError::Io)
    }

    #[inline]
    fn write_float(&mut self, f: f64) -> Result<(), DmapError> {
        self.writer
            .write_all(self.ryu_buf.format(f).as_bytes())
            .map_err(DmapError::Io)
    }

    /// Number of region rows written so far.
    pub fn regions_written(&self) -> usize {
        self.written
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<(), DmapError> {
        self.writer.flush().map_err(DmapError::Io)
    }
}

impl<W: Write> RegionSink for RegionWriter<W> {
    fn emit(&mut self, region: &Region) -> Result<(), DmapError> {
        self.write_region(region)
    }
}
