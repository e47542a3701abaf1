//! Buffer size constants for streaming operations.

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default input buffer size (256 KB).
/// Good balance for reading sorted coverage files.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Default line buffer capacity (1 KB).
pub const DEFAULT_LINE_BUFFER: usize = 1024;

/// Default chromosome name buffer (64 bytes).
pub const DEFAULT_CHROM_BUFFER: usize = 64;

/// Initial capacity of a per-window site batch.
pub const DEFAULT_BATCH_CAPACITY: usize = 64;
