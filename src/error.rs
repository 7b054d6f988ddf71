/*! Error types shared by every layer of the harness.

The frame codec and chunker are pure and return errors directly; the
session surfaces transport errors unchanged (it never retries); and
experiment drivers propagate everything up to the orchestrator, which
keeps going after a single DUT fails.
*/

/// Everything that can go wrong talking to, or reasoning about, a DUT.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Open failed, write/read failed, or the port closed unexpectedly.
    #[error("transport error: {0}")]
    Transport(String),

    /// Received byte count was not a multiple of the 3-byte frame size.
    #[error("frame alignment error: {len} bytes is not a multiple of 3")]
    FrameAlignment {
        /// Length of the buffer that failed to align.
        len: usize,
    },

    /// `encode()` was asked for a `(reg, adr, data)` triple that doesn't fit
    /// the wire format.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A decoded DUT header word has impossible field values.
    #[error("invalid header: {0}")]
    HeaderInvalid(String),

    /// The DUT's `dut_type` isn't one this harness knows how to drive.
    #[error("unsupported DUT type {0}")]
    UnsupportedDut(u8),

    /// A persisted settings file's top-level keys don't match the built-in
    /// default's.
    #[error("config schema mismatch in {0}")]
    ConfigSchemaMismatch(String),

    /// A frame builder's response cadence doesn't divide the number of
    /// frames actually returned.
    #[error("pipeline mismatch: {frames} response frames not divisible by period {period}")]
    PipelineMismatch {
        /// Number of response frames actually received.
        frames: usize,
        /// Expected repeat period of the driver's post-processing.
        period: usize,
    },

    /// Wraps I/O failures from a reference transport or config store.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wraps (de)serialization failures from the JSON config store.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
