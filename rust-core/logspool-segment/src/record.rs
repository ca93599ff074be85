// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Record model
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The schema shared by the spool writer and the scan. A record is a fixed
// list of 23 columns; the order of `Column::ALL` is the order fields appear
// on a segment line and must not change within a schema version.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::severity::SeverityTag;

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// Physical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Timestamp,
    Text,
    Integer,
    Severity,
}

/// One column of the record schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    LogTime,
    UserName,
    DatabaseName,
    ProcessId,
    ConnectionFrom,
    SessionId,
    SessionLineNum,
    CommandTag,
    SessionStartTime,
    VirtualTransactionId,
    TransactionId,
    ErrorSeverity,
    SqlStateCode,
    Message,
    Detail,
    Hint,
    InternalQuery,
    InternalQueryPos,
    Context,
    Query,
    QueryPos,
    Location,
    ApplicationName,
}

/// Number of columns in the schema.
pub const COLUMN_COUNT: usize = 23;

impl Column {
    /// All columns in wire order.
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::LogTime,
        Column::UserName,
        Column::DatabaseName,
        Column::ProcessId,
        Column::ConnectionFrom,
        Column::SessionId,
        Column::SessionLineNum,
        Column::CommandTag,
        Column::SessionStartTime,
        Column::VirtualTransactionId,
        Column::TransactionId,
        Column::ErrorSeverity,
        Column::SqlStateCode,
        Column::Message,
        Column::Detail,
        Column::Hint,
        Column::InternalQuery,
        Column::InternalQueryPos,
        Column::Context,
        Column::Query,
        Column::QueryPos,
        Column::Location,
        Column::ApplicationName,
    ];

    /// Zero-based position on the wire.
    pub fn position(self) -> usize {
        self as usize
    }

    /// The column's relational name.
    pub fn name(self) -> &'static str {
        match self {
            Column::LogTime => "log_time",
            Column::UserName => "user_name",
            Column::DatabaseName => "database_name",
            Column::ProcessId => "process_id",
            Column::ConnectionFrom => "connection_from",
            Column::SessionId => "session_id",
            Column::SessionLineNum => "session_line_num",
            Column::CommandTag => "command_tag",
            Column::SessionStartTime => "session_start_time",
            Column::VirtualTransactionId => "virtual_transaction_id",
            Column::TransactionId => "transaction_id",
            Column::ErrorSeverity => "error_severity",
            Column::SqlStateCode => "sql_state_code",
            Column::Message => "message",
            Column::Detail => "detail",
            Column::Hint => "hint",
            Column::InternalQuery => "internal_query",
            Column::InternalQueryPos => "internal_query_pos",
            Column::Context => "context",
            Column::Query => "query",
            Column::QueryPos => "query_pos",
            Column::Location => "location",
            Column::ApplicationName => "application_name",
        }
    }

    /// Look a column up by its relational name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::ALL.into_iter().find(|c| c.name() == lowered)
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::LogTime | Column::SessionStartTime => ColumnKind::Timestamp,
            Column::ProcessId
            | Column::SessionLineNum
            | Column::TransactionId
            | Column::InternalQueryPos
            | Column::QueryPos => ColumnKind::Integer,
            Column::ErrorSeverity => ColumnKind::Severity,
            _ => ColumnKind::Text,
        }
    }

    pub fn is_nullable(self) -> bool {
        !matches!(
            self,
            Column::LogTime
                | Column::SessionId
                | Column::SessionLineNum
                | Column::SessionStartTime
                | Column::TransactionId
                | Column::ErrorSeverity
                | Column::SqlStateCode
        )
    }

    /// Average stored width in bytes, used for tuple-size estimates when no
    /// statistics exist. Variable-length text uses a flat 32 bytes.
    pub fn avg_width(self) -> u32 {
        match self {
            Column::LogTime | Column::SessionStartTime => 8,
            Column::SessionLineNum | Column::TransactionId => 8,
            Column::ProcessId | Column::InternalQueryPos | Column::QueryPos => 4,
            Column::ErrorSeverity => 4,
            Column::SqlStateCode => 6,
            _ => 32,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    Severity(SeverityTag),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map(Value::Text).unwrap_or(Value::Null)
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map(Value::Integer).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

/// One diagnostic event as stored in a segment.
///
/// `log_time` carries millisecond precision and `session_start_time`
/// second precision; finer parts are dropped by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub log_time: DateTime<Utc>,
    pub user_name: Option<String>,
    pub database_name: Option<String>,
    pub process_id: Option<i64>,
    /// `host` or `host:port` of the client.
    pub connection_from: Option<String>,
    pub session_id: String,
    /// Per-process line counter, starting at 1.
    pub session_line_num: i64,
    pub command_tag: Option<String>,
    pub session_start_time: DateTime<Utc>,
    pub virtual_transaction_id: Option<String>,
    /// Top-level transaction id, 0 when none was assigned.
    pub transaction_id: i64,
    pub error_severity: SeverityTag,
    pub sql_state_code: String,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub internal_query: Option<String>,
    pub internal_query_pos: Option<i64>,
    pub context: Option<String>,
    pub query: Option<String>,
    pub query_pos: Option<i64>,
    pub location: Option<String>,
    pub application_name: Option<String>,
}

impl LogRecord {
    /// Project a single column.
    pub fn value(&self, column: Column) -> Value {
        match column {
            Column::LogTime => Value::Timestamp(self.log_time),
            Column::UserName => self.user_name.clone().into(),
            Column::DatabaseName => self.database_name.clone().into(),
            Column::ProcessId => self.process_id.into(),
            Column::ConnectionFrom => self.connection_from.clone().into(),
            Column::SessionId => Value::Text(self.session_id.clone()),
            Column::SessionLineNum => Value::Integer(self.session_line_num),
            Column::CommandTag => self.command_tag.clone().into(),
            Column::SessionStartTime => Value::Timestamp(self.session_start_time),
            Column::VirtualTransactionId => self.virtual_transaction_id.clone().into(),
            Column::TransactionId => Value::Integer(self.transaction_id),
            Column::ErrorSeverity => Value::Severity(self.error_severity),
            Column::SqlStateCode => Value::Text(self.sql_state_code.clone()),
            Column::Message => self.message.clone().into(),
            Column::Detail => self.detail.clone().into(),
            Column::Hint => self.hint.clone().into(),
            Column::InternalQuery => self.internal_query.clone().into(),
            Column::InternalQueryPos => self.internal_query_pos.into(),
            Column::Context => self.context.clone().into(),
            Column::Query => self.query.clone().into(),
            Column::QueryPos => self.query_pos.into(),
            Column::Location => self.location.clone().into(),
            Column::ApplicationName => self.application_name.clone().into(),
        }
    }

    /// Consume the record into its cells, in wire order.
    pub fn into_values(self) -> Vec<Value> {
        vec![
            Value::Timestamp(self.log_time),
            self.user_name.into(),
            self.database_name.into(),
            self.process_id.into(),
            self.connection_from.into(),
            Value::Text(self.session_id),
            Value::Integer(self.session_line_num),
            self.command_tag.into(),
            Value::Timestamp(self.session_start_time),
            self.virtual_transaction_id.into(),
            Value::Integer(self.transaction_id),
            Value::Severity(self.error_severity),
            Value::Text(self.sql_state_code),
            self.message.into(),
            self.detail.into(),
            self.hint.into(),
            self.internal_query.into(),
            self.internal_query_pos.into(),
            self.context.into(),
            self.query.into(),
            self.query_pos.into(),
            self.location.into(),
            self.application_name.into(),
        ]
    }
}
