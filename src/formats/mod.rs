//! Raw-data format parsers.
//!
//! Parsers consume instrument files and produce [`RawData`](crate::raw::RawData):
//!
//! - [`jcamp`] - JCAMP-DX text files (`.jdx`)
//! - [`mzml`] - mzML XML files (feature `mzml`)
//!
//! ANDI/netCDF ingestion is left to external converters; the validation
//! contract (equal scan/time counts, strictly increasing times) is
//! enforced by `RawData` regardless of the source format.

pub mod jcamp;

#[cfg(feature = "mzml")]
pub mod mzml;

use crate::raw::RawDataError;

/// Errors raised while parsing raw-data files.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// I/O error while reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An XYDATA block whose values do not pair up.
    #[error("scan {scan}: data not in (mass, intensity) pairs ({count} values)")]
    OddPairCount { scan: usize, count: usize },

    /// A numeric field that failed to parse.
    #[error("line {line}: invalid number {value:?}")]
    InvalidNumber { line: usize, value: String },

    /// A required tag or attribute was absent.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Scan and retention-time counts disagree.
    #[error("{times} retention time(s) do not match {scans} scan(s)")]
    CountMismatch { times: usize, scans: usize },

    /// Structural problem in the file.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The assembled data violated the raw-data contract.
    #[error(transparent)]
    RawData(#[from] RawDataError),

    /// XML parsing error.
    #[cfg(feature = "mzml")]
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Base64 payload decoding error.
    #[cfg(feature = "mzml")]
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Text that is not valid UTF-8.
    #[cfg(feature = "mzml")]
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}
