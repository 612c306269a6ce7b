//! Error types for lumajpeg.

use std::fmt;

/// Result type for lumajpeg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the encoder.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// XYB mode was selected with an input that is not 3-channel RGB.
    XybRequiresRgb,
    /// The input has more components than the encoder supports.
    InvalidComponents {
        /// Number of components provided
        count: usize,
    },
    /// A component has different horizontal and vertical sampling factors.
    UnsupportedSubsampling {
        /// Horizontal sampling factor
        h_samp_factor: u8,
        /// Vertical sampling factor
        v_samp_factor: u8,
    },
    /// The maximum sampling factor is not an integer multiple of a
    /// component's sampling factor.
    NonIntegralSubsamplingRatio {
        /// The offending component's sampling factor
        samp_factor: u8,
    },
    /// A sampling ratio is not a power of two in {1, 2, 4, 8}.
    InvalidSamplingFactor {
        /// The offending ratio
        factor: u8,
    },
    /// Marker payload exceeds the 65533-byte limit.
    InvalidMarkerLength {
        /// Requested payload length
        datalen: usize,
    },
    /// Marker is neither COM nor APP0..APP15.
    UnsupportedMarker {
        /// The marker code provided
        marker: u8,
    },
    /// `write_m_byte` was called without an open marker header.
    MarkerHeaderMissing,
    /// Chunked marker data (e.g. an ICC profile) failed to parse.
    CorruptIcc {
        /// What was wrong with the chunk sequence
        reason: &'static str,
    },
    /// Progressive level must be non-negative.
    InvalidProgressiveLevel {
        /// The level provided
        level: i32,
    },
    /// The entropy writer refused to encode a scan.
    ScanEncodingFailed {
        /// Why the scan could not be encoded
        reason: &'static str,
    },
    /// A user-supplied scan script is structurally invalid.
    InvalidScanScript {
        /// Why the script was rejected
        reason: &'static str,
    },
    /// An API call arrived in the wrong encoder state.
    BadCallSequence {
        /// The call that was attempted
        call: &'static str,
        /// What the encoder expected instead
        expected: &'static str,
    },
    /// A scanline buffer is too short for the configured row layout.
    BufferTooSmall {
        /// Bytes required per row
        expected: usize,
        /// Bytes provided
        actual: usize,
    },
    /// Image dimensions are zero or exceed supported limits.
    InvalidDimensions {
        /// Width provided
        width: u32,
        /// Height provided
        height: u32,
    },
    /// A size computation overflowed.
    SizeOverflow {
        /// Context where the overflow occurred
        context: &'static str,
    },
    /// Writing to the destination sink failed.
    DestinationFailed {
        /// Description from the sink
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XybRequiresRgb => {
                write!(f, "only RGB input is supported in XYB mode")
            }
            Self::InvalidComponents { count } => {
                write!(f, "invalid number of components: {}", count)
            }
            Self::UnsupportedSubsampling {
                h_samp_factor,
                v_samp_factor,
            } => {
                write!(
                    f,
                    "horizontal- or vertical-only subsampling is not supported ({}x{})",
                    h_samp_factor, v_samp_factor
                )
            }
            Self::NonIntegralSubsamplingRatio { samp_factor } => {
                write!(
                    f,
                    "non-integral sampling ratios are not supported (factor {})",
                    samp_factor
                )
            }
            Self::InvalidSamplingFactor { factor } => {
                write!(f, "invalid sampling factor {}", factor)
            }
            Self::InvalidMarkerLength { datalen } => {
                write!(f, "invalid marker length {}", datalen)
            }
            Self::UnsupportedMarker { marker } => {
                write!(
                    f,
                    "only APP and COM markers are supported, got 0x{:02X}",
                    marker
                )
            }
            Self::MarkerHeaderMissing => write!(f, "marker header missing"),
            Self::CorruptIcc { reason } => write!(f, "corrupt ICC data: {}", reason),
            Self::InvalidProgressiveLevel { level } => {
                write!(f, "invalid progressive level {}", level)
            }
            Self::ScanEncodingFailed { reason } => {
                write!(f, "failed to encode scan: {}", reason)
            }
            Self::InvalidScanScript { reason } => {
                write!(f, "invalid scan script: {}", reason)
            }
            Self::BadCallSequence { call, expected } => {
                write!(f, "{} called out of order, expected {}", call, expected)
            }
            Self::BufferTooSmall { expected, actual } => {
                write!(
                    f,
                    "scanline buffer too small: need {} bytes, got {}",
                    expected, actual
                )
            }
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid image dimensions {}x{}", width, height)
            }
            Self::SizeOverflow { context } => {
                write!(f, "size calculation overflow while {}", context)
            }
            Self::DestinationFailed { reason } => {
                write!(f, "destination write failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::DestinationFailed {
            reason: err.to_string(),
        }
    }
}
