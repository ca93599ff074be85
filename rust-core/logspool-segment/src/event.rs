// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Event input and record formatting
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A `LogEvent` is what the host's event source hands to the spool: the
// diagnostic itself. A `SessionContext` describes the process and client
// connection that raised it. `RecordFormatter` merges the two into the
// `LogRecord` that gets encoded.

use chrono::{DateTime, SubsecRound, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SpoolConfig;
use crate::record::LogRecord;
use crate::severity::{should_emit, Severity};

/// SQLSTATE used when an event does not carry one.
pub const SUCCESSFUL_COMPLETION: &str = "00000";

// ---------------------------------------------------------------------------
// LogEvent
// ---------------------------------------------------------------------------

/// One diagnostic raised by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub severity: Severity,
    /// When the event was raised. The writer's clock is used if absent.
    pub timestamp: Option<DateTime<Utc>>,
    pub sql_state: String,
    pub message: Option<String>,
    pub detail: Option<String>,
    /// Detail meant for the server log only; preferred over `detail`.
    pub detail_log: Option<String>,
    pub hint: Option<String>,
    pub internal_query: Option<String>,
    /// 1-based cursor position in `internal_query`, 0 when unknown.
    pub internal_pos: i32,
    pub context: Option<String>,
    /// The statement being executed when the event was raised.
    pub statement: Option<String>,
    /// 1-based cursor position in `statement`, 0 when unknown.
    pub cursor_pos: i32,
    /// Suppress the statement even if the severity would include it.
    pub hide_statement: bool,
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: u32,
}

impl LogEvent {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            timestamp: None,
            sql_state: SUCCESSFUL_COMPLETION.to_string(),
            message: Some(message.into()),
            detail: None,
            detail_log: None,
            hint: None,
            internal_query: None,
            internal_pos: 0,
            context: None,
            statement: None,
            cursor_pos: 0,
            hide_statement: false,
            function: None,
            file: None,
            line: 0,
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = sql_state.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>, cursor_pos: i32) -> Self {
        self.statement = Some(statement.into());
        self.cursor_pos = cursor_pos;
        self
    }

    pub fn with_location(
        mut self,
        function: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Self {
        self.function = Some(function.into());
        self.file = Some(file.into());
        self.line = line;
        self
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// The process and connection an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Operating-system process id; `None` before the process is set up.
    pub process_id: Option<i32>,
    pub session_start: DateTime<Utc>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub remote_host: Option<String>,
    pub remote_port: Option<String>,
    /// What the session is currently doing (`SELECT`, `idle`, ...).
    pub command_tag: Option<String>,
    pub backend_id: Option<i32>,
    pub local_xid: u32,
    /// Top-level transaction id, 0 when none is assigned.
    pub transaction_id: u32,
    pub application_name: Option<String>,
}

impl SessionContext {
    /// A context for a background process with no client connection.
    pub fn background(process_id: i32, session_start: DateTime<Utc>) -> Self {
        Self {
            process_id: Some(process_id),
            session_start,
            user: None,
            database: None,
            remote_host: None,
            remote_port: None,
            command_tag: None,
            backend_id: None,
            local_xid: 0,
            transaction_id: 0,
            application_name: None,
        }
    }

    /// `{start_time:x}.{pid:x}`, stable for the whole session.
    pub fn session_id(&self) -> String {
        format!(
            "{:x}.{:x}",
            self.session_start.timestamp(),
            self.process_id.unwrap_or(0)
        )
    }

    /// `host` or `host:port`.
    pub fn connection_from(&self) -> Option<String> {
        let host = self.remote_host.as_deref()?;
        match self.remote_port.as_deref() {
            Some(port) if !port.is_empty() => Some(format!("{host}:{port}")),
            _ => Some(host.to_string()),
        }
    }

    /// `{backend}/{local_xid}` when the process has a backend slot.
    pub fn virtual_transaction_id(&self) -> Option<String> {
        self.backend_id
            .map(|backend| format!("{backend}/{}", self.local_xid))
    }
}

// ---------------------------------------------------------------------------
// RecordFormatter
// ---------------------------------------------------------------------------

/// Turns events into records, numbering lines per process.
#[derive(Debug, Default)]
pub struct RecordFormatter {
    line_number: i64,
    last_pid: i32,
}

impl RecordFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the record for `event`. `now` is used when the event carries no
    /// timestamp of its own.
    pub fn format(
        &mut self,
        event: &LogEvent,
        session: &SessionContext,
        config: &SpoolConfig,
        now: DateTime<Utc>,
    ) -> LogRecord {
        let pid = session.process_id.unwrap_or(0);
        if pid != self.last_pid {
            self.line_number = 0;
            self.last_pid = pid;
        }
        self.line_number += 1;

        let print_statement = should_emit(event.severity, config.min_error_statement)
            && event.statement.is_some()
            && !event.hide_statement;

        let internal_query_pos = (event.internal_pos > 0 && event.internal_query.is_some())
            .then_some(i64::from(event.internal_pos));

        let query_pos = (print_statement && event.cursor_pos > 0)
            .then_some(i64::from(event.cursor_pos));

        LogRecord {
            log_time: event.timestamp.unwrap_or(now).trunc_subsecs(3),
            user_name: session.user.clone(),
            database_name: session.database.clone(),
            process_id: session.process_id.filter(|p| *p != 0).map(i64::from),
            connection_from: session.connection_from(),
            session_id: session.session_id(),
            session_line_num: self.line_number,
            command_tag: session.command_tag.clone(),
            session_start_time: session
                .session_start
                .with_nanosecond(0)
                .unwrap_or(session.session_start),
            virtual_transaction_id: session.virtual_transaction_id(),
            transaction_id: i64::from(session.transaction_id),
            error_severity: event.severity.tag(),
            sql_state_code: event.sql_state.clone(),
            message: event.message.clone(),
            detail: event.detail_log.clone().or_else(|| event.detail.clone()),
            hint: event.hint.clone(),
            internal_query: event.internal_query.clone(),
            internal_query_pos,
            context: event.context.clone(),
            query: if print_statement {
                event.statement.clone()
            } else {
                None
            },
            query_pos,
            location: if config.verbose_location {
                source_location(event)
            } else {
                None
            },
            application_name: session.application_name.clone(),
        }
    }

    /// Lines formatted so far for the current process.
    pub fn line_number(&self) -> i64 {
        self.line_number
    }
}

fn source_location(event: &LogEvent) -> Option<String> {
    let file = event.file.as_deref()?;
    Some(match event.function.as_deref() {
        Some(function) => format!("{function}, {file}:{}", event.line),
        None => format!("{file}:{}", event.line),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::SeverityTag;
    use chrono::TimeZone;

    fn session() -> SessionContext {
        SessionContext {
            process_id: Some(4711),
            session_start: Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
                + chrono::Duration::milliseconds(250),
            user: Some("alice".to_string()),
            database: Some("app".to_string()),
            remote_host: Some("10.0.0.7".to_string()),
            remote_port: Some("51234".to_string()),
            command_tag: Some("SELECT".to_string()),
            backend_id: Some(3),
            local_xid: 17,
            transaction_id: 0,
            application_name: Some("psql".to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 2).unwrap()
            + chrono::Duration::microseconds(417_999)
    }

    #[test]
    fn test_session_derived_fields() {
        let mut formatter = RecordFormatter::new();
        let event = LogEvent::new(Severity::Error, "boom").with_sql_state("XX000");
        let record = formatter.format(&event, &session(), &SpoolConfig::default(), now());

        let start = session().session_start.timestamp();
        assert_eq!(record.session_id, format!("{:x}.{:x}", start, 4711));
        assert_eq!(record.connection_from.as_deref(), Some("10.0.0.7:51234"));
        assert_eq!(record.virtual_transaction_id.as_deref(), Some("3/17"));
        assert_eq!(record.error_severity, SeverityTag::Error);
        assert_eq!(record.sql_state_code, "XX000");
        assert_eq!(record.log_time.timestamp_subsec_millis(), 417);
        assert_eq!(record.log_time.timestamp_subsec_nanos(), 417_000_000);
        assert_eq!(record.session_start_time.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_line_numbers_reset_on_pid_change() {
        let mut formatter = RecordFormatter::new();
        let config = SpoolConfig::default();
        let event = LogEvent::new(Severity::Warning, "w");

        let first = formatter.format(&event, &session(), &config, now());
        let second = formatter.format(&event, &session(), &config, now());
        assert_eq!(first.session_line_num, 1);
        assert_eq!(second.session_line_num, 2);

        let mut other = session();
        other.process_id = Some(4712);
        let third = formatter.format(&event, &other, &config, now());
        assert_eq!(third.session_line_num, 1);
    }

    #[test]
    fn test_statement_included_only_at_min_error_statement() {
        let mut formatter = RecordFormatter::new();
        let config = SpoolConfig::default();

        let warning = LogEvent::new(Severity::Warning, "w").with_statement("select 1", 8);
        let record = formatter.format(&warning, &session(), &config, now());
        assert_eq!(record.query, None);
        assert_eq!(record.query_pos, None);

        let error = LogEvent::new(Severity::Error, "e").with_statement("select 1", 8);
        let record = formatter.format(&error, &session(), &config, now());
        assert_eq!(record.query.as_deref(), Some("select 1"));
        assert_eq!(record.query_pos, Some(8));

        let mut hidden = error.clone();
        hidden.hide_statement = true;
        let record = formatter.format(&hidden, &session(), &config, now());
        assert_eq!(record.query, None);
    }

    #[test]
    fn test_detail_log_preferred() {
        let mut formatter = RecordFormatter::new();
        let mut event = LogEvent::new(Severity::Error, "e").with_detail("client detail");
        event.detail_log = Some("server detail".to_string());
        let record = formatter.format(&event, &session(), &SpoolConfig::default(), now());
        assert_eq!(record.detail.as_deref(), Some("server detail"));
    }

    #[test]
    fn test_internal_position_requires_query() {
        let mut formatter = RecordFormatter::new();
        let mut event = LogEvent::new(Severity::Error, "e");
        event.internal_pos = 5;
        let record = formatter.format(&event, &session(), &SpoolConfig::default(), now());
        assert_eq!(record.internal_query_pos, None);

        event.internal_query = Some("select x".to_string());
        let record = formatter.format(&event, &session(), &SpoolConfig::default(), now());
        assert_eq!(record.internal_query_pos, Some(5));
    }

    #[test]
    fn test_location_only_when_verbose() {
        let mut formatter = RecordFormatter::new();
        let event = LogEvent::new(Severity::Error, "e").with_location(
            "exec_simple_query",
            "postgres.c",
            1090,
        );

        let quiet = formatter.format(&event, &session(), &SpoolConfig::default(), now());
        assert_eq!(quiet.location, None);

        let config = SpoolConfig {
            verbose_location: true,
            ..SpoolConfig::default()
        };
        let verbose = formatter.format(&event, &session(), &config, now());
        assert_eq!(verbose.location.as_deref(), Some("exec_simple_query, postgres.c:1090"));
    }

    #[test]
    fn test_background_process_has_no_connection() {
        let mut formatter = RecordFormatter::new();
        let ctx = SessionContext::background(99, now());
        let event = LogEvent::new(Severity::Log, "checkpoint");
        let record = formatter.format(&event, &ctx, &SpoolConfig::default(), now());
        assert_eq!(record.connection_from, None);
        assert_eq!(record.virtual_transaction_id, None);
        assert_eq!(record.user_name, None);
        assert_eq!(record.process_id, Some(99));
    }

    #[test]
    fn test_host_without_port() {
        let mut ctx = session();
        ctx.remote_port = Some(String::new());
        assert_eq!(ctx.connection_from().as_deref(), Some("10.0.0.7"));
    }
}
