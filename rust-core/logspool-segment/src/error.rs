// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Error types
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-side errors (`DecodeError`, `SegmentError`, `ScanError`) propagate to
// the caller. Write-side failures are values (`SpoolFailure`) handed to a
// `FailureReporter`; they are never returned to the event source.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::Column;

/// A segment line that could not be turned back into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The line has the wrong number of fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        expected: usize,
        found: usize,
    },

    /// A quoted field is still open at the end of the line.
    #[error("unterminated quoted field starting at byte {offset}")]
    UnterminatedQuote { offset: usize },

    /// Characters follow a closing quote before the next separator.
    #[error("unexpected character after closing quote at byte {offset}")]
    TrailingGarbage { offset: usize },

    /// An integer column holds something that is not a decimal integer.
    #[error("invalid integer in column {column}: {value:?}")]
    InvalidInteger { column: Column, value: String },

    /// A timestamp column could not be parsed.
    #[error("invalid timestamp in column {column}: {value:?}")]
    InvalidTimestamp { column: Column, value: String },

    /// A timestamp carries a zone token the codec cannot resolve.
    #[error("unsupported time zone {zone:?} in column {column}")]
    UnsupportedZone { column: Column, zone: String },

    /// A NOT NULL column was empty.
    #[error("column {0} must not be null")]
    NullInNotNull(Column),

    /// A row cell holds a value of the wrong kind for its column.
    #[error("value of the wrong type for column {0}")]
    TypeMismatch(Column),
}

/// Errors listing the segments of a directory.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The directory exists but could not be read (for example a
    /// permission failure). Worth retrying once the cause is fixed.
    #[error("could not list segment directory {dir}: {source}")]
    List {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SegmentError {
    /// Listing failures are transient from the caller's point of view.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SegmentError::List { .. })
    }
}

/// Errors raised while scanning segments.
#[derive(Debug, Error)]
pub enum ScanError {
    /// `open` was called with an empty segment list. The scan is left
    /// exhausted; zero rows is a valid outcome.
    #[error("no segments to scan")]
    NoSegments,

    #[error("could not open segment {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read segment {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A write-side failure, reported once through the fallback channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpoolFailure {
    /// The spool directory is unusable (missing, not a directory, or not
    /// writable).
    #[error("spool directory {dir} is unusable: {message}")]
    Config { dir: PathBuf, message: String },

    #[error("could not open spool file {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("could not write spool file {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Convenience alias for listing results.
pub type SegmentResult<T> = Result<T, SegmentError>;

/// Convenience alias for scan results.
pub type ScanResult<T> = Result<T, ScanError>;
