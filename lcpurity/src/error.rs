//! Error types for each stage of the purity pipeline
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A locale-formatted number that could not be read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NumericParseError {
    #[error("Expected a number but found an empty field")]
    Empty,
    #[error("Failed to parse {0:?} as a decimal number")]
    Malformed(String),
    #[error("No number found in {0:?}")]
    NotFound(String),
}

/// An m/z value that does not belong to the configured grid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("m/z {mz} lies outside of the grid range {start}-{end}")]
    OutOfRange { mz: f64, start: f64, end: f64 },
    #[error("m/z {mz} does not land on a grid bin (nearest bin is {nearest})")]
    OffGrid { mz: f64, nearest: f64 },
    #[error("Invalid grid definition: {0}")]
    InvalidDefinition(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UvParseError {
    #[error("The {0} section is missing")]
    MissingSection(&'static str),
    #[error("The {section} section is too short, expected line {line}")]
    TruncatedSection { section: &'static str, line: usize },
    #[error("Malformed metadata in {section}: {detail}")]
    MalformedMetadata {
        section: &'static str,
        detail: String,
    },
    #[error("Row {row} of the PDA data has {found} intensities, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("The PDA section contains no data rows")]
    NoData,
    #[error("Failed to read a number in the PDA data (row {row}): {source}")]
    Numeric {
        row: usize,
        #[source]
        source: NumericParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MsParseError {
    #[error("Scan {scan} has no retention time line")]
    MissingRetentionTime { scan: usize },
    #[error("Scan {scan} has a malformed retention time: {source}")]
    RetentionTime {
        scan: usize,
        #[source]
        source: NumericParseError,
    },
    #[error("Scan {scan} line {line:?} is not an m/z, intensity pair")]
    MalformedPair { scan: usize, line: String },
    #[error("Scan {scan} has a malformed data point: {source}")]
    Numeric {
        scan: usize,
        #[source]
        source: NumericParseError,
    },
    #[error("Scan {scan} has an m/z that does not fit the grid: {source}")]
    OffGrid {
        scan: usize,
        #[source]
        source: GridError,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdductConfigError {
    #[error("Adduct {name} must be written as \"offset, factor\", found {value:?}")]
    MalformedRule { name: String, value: String },
    #[error("Adduct {name} has an invalid {field}: {value:?}")]
    InvalidNumber {
        name: String,
        field: &'static str,
        value: String,
    },
    #[error("Adduct {name} has a zero denominator in its factor")]
    ZeroDenominator { name: String },
    #[error("Failed to read the adduct table: {0}")]
    Toml(String),
}

/// A failure that aborts the processing of one sample, but not the batch
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Failed to read {path}: {source}")]
    IO {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse UV file {path}: {source}")]
    Uv {
        path: PathBuf,
        #[source]
        source: UvParseError,
    },
    #[error("Failed to parse MS file {path}: {source}")]
    Ms {
        path: PathBuf,
        #[source]
        source: MsParseError,
    },
}
