// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool segment crate
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Writes diagnostic events to a directory of rotating, append-only segment
// files and reads them back as rows.
//
// # Architecture
//
// The spool is a directory of **segment files**. Each segment holds one
// encoded record per line and is named after the moment it was opened, so
// names sort chronologically. A single `SpoolWriter` appends to the newest
// segment and rotates on request. Readers list the directory through a
// `SegmentCatalog` and walk the listed segments with a `SegmentScan`,
// concurrently with the writer and without locking.
//
// ## Line format
//
// ```text
// <log_time>,"<user>","<database>",<pid>,"<connection>","<session_id>",<line>,
// "<command_tag>",<session_start>,"<vxid>",<txid>,<SEVERITY>,"<sqlstate>",
// "<message>","<detail>","<hint>","<internal_query>",<internal_pos>,
// "<context>","<query>",<query_pos>,"<location>","<application_name>"\n
// ```
//
// Text fields are quoted with `"` doubled inside; an absent value is an
// empty unquoted field. Timestamps are written in UTC.
//
// ## Usage
//
// ```no_run
// use logspool_segment::{
//     Column, LogEvent, SegmentCatalog, SegmentLayout, SegmentScan, Severity, SpoolConfig,
//     SpoolWriter,
// };
//
// let mut writer = SpoolWriter::new(SpoolConfig::new("/tmp/logspool"));
// writer.append(&LogEvent::new(Severity::Error, "relation \"t\" does not exist"));
// writer.close();
//
// let segments = SegmentCatalog::new("/tmp/logspool", SegmentLayout::default())
//     .list()
//     .unwrap();
// for row in SegmentScan::new(segments, &[Column::ErrorSeverity, Column::Message]) {
//     let row = row.unwrap();
//     println!("{:?}", row.get(Column::Message));
// }
// ```

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod scan;
pub mod segment;
pub mod severity;
pub mod sink;
pub mod writer;

// Re-export the primary public API for ergonomic imports.
pub use codec::{decode, encode, RecordReader};
pub use config::{SpoolConfig, SyncMode};
pub use error::{DecodeError, ScanError, ScanResult, SegmentError, SegmentResult, SpoolFailure};
pub use event::{LogEvent, RecordFormatter, SessionContext};
pub use record::{Column, ColumnKind, LogRecord, Value, COLUMN_COUNT};
pub use scan::{Row, SegmentScan};
pub use segment::{
    segment_filename, segment_path, CatalogOrder, SegmentCatalog, SegmentInfo, SegmentLayout,
    DEFAULT_MAX_SEGMENTS,
};
pub use severity::{should_emit, Severity, SeverityTag};
pub use sink::{
    CollectingReporter, EventSink, FailureReporter, FnSink, NullSink, SinkChain, TracingReporter,
};
pub use writer::{AppendOutcome, ReloadHandle, SpoolStats, SpoolWriter};
