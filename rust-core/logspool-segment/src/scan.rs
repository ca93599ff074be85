// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Multi-segment scan
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A `SegmentScan` walks a fixed list of segments in order and yields one
// `Row` per decodable record. Records that fail to decode are skipped and
// counted. An incomplete final record (a write still in progress) ends that
// segment.
//
// Lifecycle: Unopened -> Reading -> Exhausted. Once exhausted the scan keeps
// returning `Ok(None)` until it is `reset` with a new segment list.

use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::codec::{self, RecordReader};
use crate::error::{DecodeError, ScanError, ScanResult};
use crate::record::{Column, LogRecord, Value, COLUMN_COUNT};
use crate::segment::SegmentInfo;
use crate::severity::SeverityTag;

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One scanned record, restricted to the projected columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub columns: Arc<[Column]>,
    pub values: Vec<Value>,
}

impl Row {
    /// The value of `column`, or `None` if it was not projected.
    pub fn get(&self, column: Column) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<Row> for LogRecord {
    type Error = DecodeError;

    /// Rebuild a record from a full-width row in schema order.
    fn try_from(row: Row) -> Result<Self, Self::Error> {
        if row.columns.len() != COLUMN_COUNT || row.columns.iter().ne(Column::ALL.iter()) {
            return Err(DecodeError::FieldCount {
                expected: COLUMN_COUNT,
                found: row.columns.len(),
            });
        }
        if row.values.len() != COLUMN_COUNT {
            return Err(DecodeError::FieldCount {
                expected: COLUMN_COUNT,
                found: row.values.len(),
            });
        }

        let mut cells = row.values.into_iter();
        let mut cell = move || cells.next().unwrap_or(Value::Null);

        Ok(LogRecord {
            log_time: timestamp(cell(), Column::LogTime)?,
            user_name: text(cell(), Column::UserName)?,
            database_name: text(cell(), Column::DatabaseName)?,
            process_id: integer(cell(), Column::ProcessId)?,
            connection_from: text(cell(), Column::ConnectionFrom)?,
            session_id: required(text(cell(), Column::SessionId)?, Column::SessionId)?,
            session_line_num: required(
                integer(cell(), Column::SessionLineNum)?,
                Column::SessionLineNum,
            )?,
            command_tag: text(cell(), Column::CommandTag)?,
            session_start_time: timestamp(cell(), Column::SessionStartTime)?,
            virtual_transaction_id: text(cell(), Column::VirtualTransactionId)?,
            transaction_id: required(
                integer(cell(), Column::TransactionId)?,
                Column::TransactionId,
            )?,
            error_severity: severity(cell(), Column::ErrorSeverity)?,
            sql_state_code: required(text(cell(), Column::SqlStateCode)?, Column::SqlStateCode)?,
            message: text(cell(), Column::Message)?,
            detail: text(cell(), Column::Detail)?,
            hint: text(cell(), Column::Hint)?,
            internal_query: text(cell(), Column::InternalQuery)?,
            internal_query_pos: integer(cell(), Column::InternalQueryPos)?,
            context: text(cell(), Column::Context)?,
            query: text(cell(), Column::Query)?,
            query_pos: integer(cell(), Column::QueryPos)?,
            location: text(cell(), Column::Location)?,
            application_name: text(cell(), Column::ApplicationName)?,
        })
    }
}

fn text(value: Value, column: Column) -> Result<Option<String>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        _ => Err(DecodeError::TypeMismatch(column)),
    }
}

fn integer(value: Value, column: Column) -> Result<Option<i64>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(i)),
        _ => Err(DecodeError::TypeMismatch(column)),
    }
}

fn timestamp(value: Value, column: Column) -> Result<DateTime<Utc>, DecodeError> {
    match value {
        Value::Null => Err(DecodeError::NullInNotNull(column)),
        Value::Timestamp(ts) => Ok(ts),
        _ => Err(DecodeError::TypeMismatch(column)),
    }
}

fn severity(value: Value, column: Column) -> Result<SeverityTag, DecodeError> {
    match value {
        Value::Null => Err(DecodeError::NullInNotNull(column)),
        Value::Severity(tag) => Ok(tag),
        _ => Err(DecodeError::TypeMismatch(column)),
    }
}

fn required<T>(value: Option<T>, column: Column) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::NullInNotNull(column))
}

// ---------------------------------------------------------------------------
// SegmentScan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Unopened,
    Reading,
    Exhausted,
}

/// Iterates the records of several segments in list order.
pub struct SegmentScan {
    segments: Vec<SegmentInfo>,
    columns: Arc<[Column]>,
    state: ScanState,
    index: usize,
    reader: Option<RecordReader<BufReader<File>>>,
    skipped: u64,
}

impl SegmentScan {
    /// Create an unopened scan over `segments`, yielding only `projection`.
    pub fn new(segments: Vec<SegmentInfo>, projection: &[Column]) -> Self {
        Self {
            segments,
            columns: Arc::from(projection),
            state: ScanState::Unopened,
            index: 0,
            reader: None,
            skipped: 0,
        }
    }

    /// A scan projecting every column.
    pub fn full(segments: Vec<SegmentInfo>) -> Self {
        Self::new(segments, &Column::ALL)
    }

    /// Position at the first segment.
    ///
    /// An empty segment list fails with `NoSegments` and leaves the scan
    /// exhausted.
    pub fn open(&mut self) -> ScanResult<()> {
        self.reader = None;
        self.index = 0;
        if self.segments.is_empty() {
            self.state = ScanState::Exhausted;
            return Err(ScanError::NoSegments);
        }
        self.state = ScanState::Reading;
        debug!(segments = self.segments.len(), "Opened segment scan");
        Ok(())
    }

    /// The next row, or `None` once every segment has been read.
    pub fn next_row(&mut self) -> ScanResult<Option<Row>> {
        loop {
            match self.state {
                ScanState::Exhausted => return Ok(None),
                ScanState::Unopened => {
                    if let Err(ScanError::NoSegments) = self.open() {
                        return Ok(None);
                    }
                }
                ScanState::Reading => {}
            }

            if self.reader.is_none() {
                let Some(segment) = self.segments.get(self.index) else {
                    self.state = ScanState::Exhausted;
                    debug!(skipped = self.skipped, "Segment scan exhausted");
                    return Ok(None);
                };
                let path = segment.path.clone();

                match File::open(&path) {
                    Ok(file) => {
                        debug!(segment = %path.display(), index = self.index, "Scanning segment");
                        self.reader = Some(RecordReader::new(BufReader::new(file)));
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        warn!(
                            segment = %path.display(),
                            "Segment vanished since listing, skipping"
                        );
                        self.index += 1;
                        continue;
                    }
                    Err(source) => {
                        self.index += 1;
                        return Err(ScanError::Open { path, source });
                    }
                }
            }

            let Some(reader) = self.reader.as_mut() else {
                continue;
            };

            match reader.next_record() {
                Ok(Some(line)) => match codec::decode(&line) {
                    Ok(record) => return Ok(Some(self.project(record))),
                    Err(error) => {
                        if reader.unjoin() {
                            debug!(%error, "Joined record failed to decode, reframing its lines");
                            continue;
                        }
                        self.skipped += 1;
                        warn!(
                            segment = %self.segments[self.index].path.display(),
                            record = reader_position(self.reader.as_ref()),
                            %error,
                            "Skipping malformed record"
                        );
                    }
                },
                Ok(None) => {
                    self.reader = None;
                    self.index += 1;
                }
                Err(source) => {
                    let path = self.segments[self.index].path.clone();
                    self.reader = None;
                    self.index += 1;
                    return Err(ScanError::Read { path, source });
                }
            }
        }
    }

    /// Restart from the first of `segments`, discarding the current cursor.
    pub fn reset(&mut self, segments: Vec<SegmentInfo>) {
        self.segments = segments;
        self.reader = None;
        self.index = 0;
        self.skipped = 0;
        self.state = ScanState::Unopened;
        debug!(segments = self.segments.len(), "Reset segment scan");
    }

    /// Release the open segment. Safe to call more than once.
    pub fn close(&mut self) {
        self.reader = None;
        self.state = ScanState::Exhausted;
    }

    /// Records skipped because they failed to decode.
    pub fn skipped_records(&self) -> u64 {
        self.skipped
    }

    /// The segment the cursor is on, while reading.
    pub fn current_segment(&self) -> Option<&Path> {
        match self.state {
            ScanState::Reading => self.segments.get(self.index).map(|s| s.path.as_path()),
            _ => None,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn segments(&self) -> &[SegmentInfo] {
        &self.segments
    }

    fn project(&self, record: LogRecord) -> Row {
        let full_row =
            self.columns.len() == COLUMN_COUNT && self.columns.iter().eq(Column::ALL.iter());
        let values = if full_row {
            record.into_values()
        } else {
            self.columns.iter().map(|c| record.value(*c)).collect()
        };
        Row {
            columns: Arc::clone(&self.columns),
            values,
        }
    }
}

fn reader_position(reader: Option<&RecordReader<BufReader<File>>>) -> u64 {
    reader.map(RecordReader::records_read).unwrap_or(0)
}

impl Iterator for SegmentScan {
    type Item = ScanResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl std::fmt::Debug for SegmentScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentScan")
            .field("segments", &self.segments.len())
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("index", &self.index)
            .field("skipped", &self.skipped)
            .finish()
    }
}
