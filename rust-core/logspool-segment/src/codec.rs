// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Line codec
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One record is one comma-separated line, fields in `Column::ALL` order.
//
// ```text
// 2026-10-19 08:15:02.417 UTC,"alice","app",4711,"10.0.0.7:51234",
//   "6530e1a2.1267",3,"SELECT",2026-10-19 08:14:58 UTC,"3/17",0,ERROR,
//   "42P01","relation ""t"" does not exist",,,,,,"select * from t",15,,"psql"
// ```
//
// (wrapped here for width; on disk it is a single line ending in `\n`)
//
// - text is always quoted, a `"` inside text is doubled;
// - NULL is an empty unquoted field, the empty string is `""`;
// - integers are plain decimal, timestamps are UTC with a zone token;
// - severity is the bare uppercase tag.
//
// The encoder never writes a line break inside a record. A text value that
// contains one cannot be represented and is written as NULL instead.
// The decoder is more lenient than the encoder: it accepts bare text,
// numeric zone offsets and quoted fields spanning several physical lines,
// so it can read csvlog files produced by other writers.

use std::collections::VecDeque;
use std::io::{self, BufRead};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

use crate::error::DecodeError;
use crate::record::{Column, ColumnKind, LogRecord, COLUMN_COUNT};
use crate::severity::SeverityTag;

/// Zone token written after every timestamp.
pub const ZONE_TOKEN: &str = "UTC";

/// Format of the event timestamp (millisecond precision).
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format of the session start timestamp (second precision).
pub const SESSION_START_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a record as one newline-terminated line.
pub fn encode(record: &LogRecord) -> String {
    let mut line = String::with_capacity(256);
    encode_into(&mut line, record);
    line
}

/// Append the encoded line for `record` to `buf`.
pub fn encode_into(buf: &mut String, record: &LogRecord) {
    push_timestamp(buf, &record.log_time, LOG_TIME_FORMAT);
    buf.push(',');
    push_text(buf, Column::UserName, record.user_name.as_deref());
    buf.push(',');
    push_text(buf, Column::DatabaseName, record.database_name.as_deref());
    buf.push(',');
    push_integer(buf, record.process_id);
    buf.push(',');
    push_text(buf, Column::ConnectionFrom, record.connection_from.as_deref());
    buf.push(',');
    push_text(buf, Column::SessionId, Some(&record.session_id));
    buf.push(',');
    push_integer(buf, Some(record.session_line_num));
    buf.push(',');
    push_text(buf, Column::CommandTag, record.command_tag.as_deref());
    buf.push(',');
    push_timestamp(buf, &record.session_start_time, SESSION_START_FORMAT);
    buf.push(',');
    push_text(
        buf,
        Column::VirtualTransactionId,
        record.virtual_transaction_id.as_deref(),
    );
    buf.push(',');
    push_integer(buf, Some(record.transaction_id));
    buf.push(',');
    buf.push_str(record.error_severity.as_str());
    buf.push(',');
    push_text(buf, Column::SqlStateCode, Some(&record.sql_state_code));
    buf.push(',');
    push_text(buf, Column::Message, record.message.as_deref());
    buf.push(',');
    push_text(buf, Column::Detail, record.detail.as_deref());
    buf.push(',');
    push_text(buf, Column::Hint, record.hint.as_deref());
    buf.push(',');
    push_text(buf, Column::InternalQuery, record.internal_query.as_deref());
    buf.push(',');
    push_integer(buf, record.internal_query_pos);
    buf.push(',');
    push_text(buf, Column::Context, record.context.as_deref());
    buf.push(',');
    push_text(buf, Column::Query, record.query.as_deref());
    buf.push(',');
    push_integer(buf, record.query_pos);
    buf.push(',');
    push_text(buf, Column::Location, record.location.as_deref());
    buf.push(',');
    push_text(buf, Column::ApplicationName, record.application_name.as_deref());
    buf.push('\n');
}

/// Whether a text value can be written without breaking the line format.
pub fn is_representable(value: &str) -> bool {
    !value.contains(['\n', '\r'])
}

/// Append a quoted text literal. `None` appends nothing, so NULL and the
/// empty string stay distinguishable.
fn push_text(buf: &mut String, column: Column, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };

    if !is_representable(value) {
        debug!(column = %column, "Text value contains a line break, writing NULL");
        if !column.is_nullable() {
            buf.push_str("\"\"");
        }
        return;
    }

    buf.push('"');
    for c in value.chars() {
        if c == '"' {
            buf.push('"');
        }
        buf.push(c);
    }
    buf.push('"');
}

fn push_integer(buf: &mut String, value: Option<i64>) {
    if let Some(value) = value {
        buf.push_str(&value.to_string());
    }
}

fn push_timestamp(buf: &mut String, value: &DateTime<Utc>, format: &str) {
    buf.push_str(&value.format(format).to_string());
    buf.push(' ');
    buf.push_str(ZONE_TOKEN);
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Split one logical line into raw fields.
///
/// A quoted field yields `Some` (possibly empty), an empty bare field yields
/// `None`. A trailing `\n` or `\r\n` must already be stripped.
pub fn split_fields(line: &str) -> Result<Vec<Option<String>>, DecodeError> {
    let bytes = line.as_bytes();
    let len = bytes.len();
    let mut fields = Vec::with_capacity(COLUMN_COUNT);
    let mut i = 0usize;

    loop {
        if i < len && bytes[i] == b'"' {
            let start = i;
            let mut value = String::new();
            i += 1;
            loop {
                let Some(rel) = line[i..].find('"') else {
                    return Err(DecodeError::UnterminatedQuote { offset: start });
                };
                value.push_str(&line[i..i + rel]);
                i += rel + 1;
                if i < len && bytes[i] == b'"' {
                    value.push('"');
                    i += 1;
                } else {
                    break;
                }
            }
            fields.push(Some(value));

            if i == len {
                break;
            }
            if bytes[i] != b',' {
                return Err(DecodeError::TrailingGarbage { offset: i });
            }
            i += 1;
        } else {
            let end = line[i..].find(',').map(|rel| i + rel).unwrap_or(len);
            let raw = &line[i..end];
            fields.push(if raw.is_empty() {
                None
            } else {
                Some(raw.to_string())
            });

            if end == len {
                break;
            }
            i = end + 1;
        }
    }

    Ok(fields)
}

/// Decode one logical line (without its terminator) into a record.
pub fn decode(line: &str) -> Result<LogRecord, DecodeError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let fields = split_fields(line)?;
    if fields.len() != COLUMN_COUNT {
        return Err(DecodeError::FieldCount {
            expected: COLUMN_COUNT,
            found: fields.len(),
        });
    }

    let mut fields = fields.into_iter();
    let mut next = || fields.next().flatten();

    Ok(LogRecord {
        log_time: required(Column::LogTime, next()).and_then(|v| timestamp(Column::LogTime, &v))?,
        user_name: next(),
        database_name: next(),
        process_id: integer(Column::ProcessId, next())?,
        connection_from: next(),
        session_id: required(Column::SessionId, next())?,
        session_line_num: required(
            Column::SessionLineNum,
            integer(Column::SessionLineNum, next())?,
        )?,
        command_tag: next(),
        session_start_time: required(Column::SessionStartTime, next())
            .and_then(|v| timestamp(Column::SessionStartTime, &v))?,
        virtual_transaction_id: next(),
        transaction_id: required(Column::TransactionId, integer(Column::TransactionId, next())?)?,
        error_severity: required(Column::ErrorSeverity, next()).map(|v| SeverityTag::parse(&v))?,
        sql_state_code: required(Column::SqlStateCode, next())?,
        message: next(),
        detail: next(),
        hint: next(),
        internal_query: next(),
        internal_query_pos: integer(Column::InternalQueryPos, next())?,
        context: next(),
        query: next(),
        query_pos: integer(Column::QueryPos, next())?,
        location: next(),
        application_name: next(),
    })
}

fn required<T>(column: Column, value: Option<T>) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::NullInNotNull(column))
}

fn integer(column: Column, value: Option<String>) -> Result<Option<i64>, DecodeError> {
    debug_assert_eq!(column.kind(), ColumnKind::Integer);
    value
        .map(|v| {
            v.trim()
                .parse::<i64>()
                .map_err(|_| DecodeError::InvalidInteger { column, value: v })
        })
        .transpose()
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff] ZONE` into UTC.
fn timestamp(column: Column, value: &str) -> Result<DateTime<Utc>, DecodeError> {
    let invalid = || DecodeError::InvalidTimestamp {
        column,
        value: value.to_string(),
    };

    let (naive_part, zone) = value.trim().rsplit_once(' ').ok_or_else(invalid)?;
    let naive = NaiveDateTime::parse_from_str(naive_part, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| invalid())?;

    let offset = zone_offset(zone).ok_or_else(|| DecodeError::UnsupportedZone {
        column,
        zone: zone.to_string(),
    })?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Resolve a zone token: `UTC`, `GMT`, `UT`, `Z`, or a numeric offset in
/// the forms `+HH`, `+HHMM` and `+HH:MM`.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    match zone {
        "UTC" | "GMT" | "UT" | "Z" => return FixedOffset::east_opt(0),
        _ => {}
    }

    let (sign, digits) = match zone.as_bytes().first()? {
        b'+' => (1, &zone[1..]),
        b'-' => (-1, &zone[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// ---------------------------------------------------------------------------
// RecordReader
// ---------------------------------------------------------------------------

/// Frames logical records out of a byte stream.
///
/// A record normally ends at the first `\n`, but a quoted field may contain
/// line breaks written by other producers, so a line with an open quote
/// continues onto the next one. If the quote never closes before end of
/// data, or the caller rejects the joined record with [`Self::unjoin`], the
/// physical lines are framed again one at a time. Only a final line with no
/// `\n` is treated as a write still in progress and is not returned.
pub struct RecordReader<R> {
    inner: R,
    /// Physical lines handed back for framing, in stream order.
    pending: VecDeque<Vec<u8>>,
    /// Physical lines of the last record, when it spanned more than one.
    joined: Vec<Vec<u8>>,
    single_line_next: bool,
    records_read: u64,
    incomplete_tail: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            joined: Vec::new(),
            single_line_next: false,
            records_read: 0,
            incomplete_tail: false,
        }
    }

    /// Return the next complete logical record without its terminator, or
    /// `None` at end of data.
    pub fn next_record(&mut self) -> io::Result<Option<String>> {
        self.joined.clear();

        let Some(first) = self.read_line()? else {
            return Ok(None);
        };
        if first.last() != Some(&b'\n') {
            self.incomplete_tail = true;
            debug!(
                bytes = first.len(),
                "Incomplete record at end of segment, treating as end of data"
            );
            return Ok(None);
        }

        // An odd number of quote characters leaves a quoted field open;
        // doubled quotes inside a field always contribute an even count.
        let mut quotes = count_quotes(&first);
        let single_line = std::mem::take(&mut self.single_line_next);
        if single_line || quotes % 2 == 0 {
            return Ok(Some(self.finish(first)));
        }

        let mut lines = vec![first];
        loop {
            match self.read_line()? {
                Some(line) if line.last() == Some(&b'\n') => {
                    quotes += count_quotes(&line);
                    lines.push(line);
                    if quotes % 2 == 0 {
                        break;
                    }
                }
                tail => {
                    debug!(
                        lines = lines.len(),
                        "Quoted field never closes, framing lines one at a time"
                    );
                    self.requeue(lines.into_iter().chain(tail));
                    self.single_line_next = true;
                    return self.next_record();
                }
            }
        }

        let record = lines.concat();
        self.joined = lines;
        Ok(Some(self.finish(record)))
    }

    /// Take back the last record if it was joined from several physical
    /// lines. The first of them is returned on its own by the next call to
    /// [`Self::next_record`] and the rest are framed again after it.
    ///
    /// Returns `false`, and changes nothing, for a single-line record.
    pub fn unjoin(&mut self) -> bool {
        if self.joined.len() < 2 {
            return false;
        }
        let lines = std::mem::take(&mut self.joined);
        self.requeue(lines);
        self.single_line_next = true;
        self.records_read = self.records_read.saturating_sub(1);
        true
    }

    /// Number of complete records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Whether the stream ended in the middle of a record.
    pub fn saw_incomplete_tail(&self) -> bool {
        self.incomplete_tail
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.pending.pop_front() {
            return Ok(Some(line));
        }
        let mut line = Vec::with_capacity(512);
        if self.inner.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Put `lines` back in front of anything already pending.
    fn requeue<I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: DoubleEndedIterator,
    {
        for line in lines.into_iter().rev() {
            self.pending.push_front(line);
        }
    }

    fn finish(&mut self, mut record: Vec<u8>) -> String {
        record.pop();
        if record.last() == Some(&b'\r') {
            record.pop();
        }
        self.records_read += 1;
        String::from_utf8_lossy(&record).into_owned()
    }
}

fn count_quotes(line: &[u8]) -> usize {
    line.iter().filter(|b| **b == b'"').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn sample() -> LogRecord {
        LogRecord {
            log_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 15, 2).unwrap()
                + chrono::Duration::milliseconds(417),
            user_name: Some("alice".to_string()),
            database_name: Some("app".to_string()),
            process_id: Some(4711),
            connection_from: Some("10.0.0.7:51234".to_string()),
            session_id: "6530e1a2.1267".to_string(),
            session_line_num: 3,
            command_tag: Some("SELECT".to_string()),
            session_start_time: Utc.with_ymd_and_hms(2026, 10, 19, 8, 14, 58).unwrap(),
            virtual_transaction_id: Some("3/17".to_string()),
            transaction_id: 0,
            error_severity: SeverityTag::Error,
            sql_state_code: "42P01".to_string(),
            message: Some("relation \"t\" does not exist".to_string()),
            detail: None,
            hint: None,
            internal_query: None,
            internal_query_pos: None,
            context: None,
            query: Some("select * from t".to_string()),
            query_pos: Some(15),
            location: None,
            application_name: Some("psql".to_string()),
        }
    }

    #[test]
    fn test_encode_layout() {
        let line = encode(&sample());
        assert_eq!(
            line,
            "2026-10-19 08:15:02.417 UTC,\"alice\",\"app\",4711,\"10.0.0.7:51234\",\
             \"6530e1a2.1267\",3,\"SELECT\",2026-10-19 08:14:58 UTC,\"3/17\",0,ERROR,\
             \"42P01\",\"relation \"\"t\"\" does not exist\",,,,,,\
             \"select * from t\",15,,\"psql\"\n"
        );
    }

    #[test]
    fn test_roundtrip_sample() {
        let record = sample();
        assert_eq!(decode(&encode(&record)).unwrap(), record);
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let mut record = sample();
        record.message = Some("He said \"hi\"".to_string());
        let line = encode(&record);
        assert!(line.contains(",\"He said \"\"hi\"\"\","));
        assert_eq!(decode(&line).unwrap().message.as_deref(), Some("He said \"hi\""));
    }

    #[test]
    fn test_null_and_empty_string_differ() {
        let mut record = sample();
        record.hint = Some(String::new());
        record.detail = None;
        let line = encode(&record);
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.hint, Some(String::new()));
        assert_eq!(decoded.detail, None);
    }

    #[test]
    fn test_line_break_becomes_null() {
        let mut record = sample();
        record.query = Some("select 1\nfrom t".to_string());
        record.session_id = "bad\nid".to_string();
        let line = encode(&record);
        assert_eq!(line.matches('\n').count(), 1);
        let decoded = decode(&line).unwrap();
        assert_eq!(decoded.query, None);
        assert_eq!(decoded.session_id, "");
    }

    #[test]
    fn test_unknown_severity_placeholder() {
        let mut record = sample();
        record.error_severity = SeverityTag::Unknown;
        let line = encode(&record);
        assert!(line.contains(",???,"));
        assert_eq!(decode(&line).unwrap().error_severity, SeverityTag::Unknown);
    }

    #[test]
    fn test_decode_accepts_bare_text_and_offsets() {
        let line = "2026-10-19 10:15:02.417 +02:00,alice,app,4711,,6530e1a2.1267,3,,\
                    2026-10-19 08:14:58 GMT,3/17,0,LOG,00000,checkpoint starting,,,,,,,,,";
        let record = decode(line).unwrap();
        assert_eq!(record.log_time, sample().log_time);
        assert_eq!(record.user_name.as_deref(), Some("alice"));
        assert_eq!(record.session_id, "6530e1a2.1267");
        assert_eq!(record.error_severity, SeverityTag::Log);
        assert_eq!(record.message.as_deref(), Some("checkpoint starting"));
        assert_eq!(record.application_name, None);
    }

    #[test]
    fn test_decode_field_count_mismatch() {
        let err = decode("a,b,c").unwrap_err();
        assert_eq!(
            err,
            DecodeError::FieldCount {
                expected: COLUMN_COUNT,
                found: 3
            }
        );
    }

    #[test]
    fn test_decode_null_in_not_null() {
        let mut line = encode(&sample());
        line = line.replacen("\"6530e1a2.1267\"", "", 1);
        assert_eq!(
            decode(&line).unwrap_err(),
            DecodeError::NullInNotNull(Column::SessionId)
        );
    }

    #[test]
    fn test_decode_unsupported_zone() {
        let line = encode(&sample()).replacen("417 UTC", "417 CEST", 1);
        assert!(matches!(
            decode(&line).unwrap_err(),
            DecodeError::UnsupportedZone { column: Column::LogTime, .. }
        ));
    }

    #[test]
    fn test_split_fields_errors() {
        assert_eq!(
            split_fields("\"open,1").unwrap_err(),
            DecodeError::UnterminatedQuote { offset: 0 }
        );
        assert_eq!(
            split_fields("\"a\"b,1").unwrap_err(),
            DecodeError::TrailingGarbage { offset: 3 }
        );
    }

    #[test]
    fn test_split_fields_trailing_empty() {
        let fields = split_fields("\"a\",,").unwrap();
        assert_eq!(fields, vec![Some("a".to_string()), None, None]);
    }

    #[test]
    fn test_reader_stops_at_incomplete_tail() {
        let complete = encode(&sample());
        let mut data = complete.repeat(2);
        data.push_str(&complete[..complete.len() / 2]);

        let mut reader = RecordReader::new(Cursor::new(data.into_bytes()));
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
        assert!(reader.saw_incomplete_tail());
    }

    #[test]
    fn test_reader_joins_multiline_quoted_field() {
        let data = "a,\"line one\nline two\",b\nnext\n";
        let mut reader = RecordReader::new(Cursor::new(data.as_bytes()));
        assert_eq!(
            reader.next_record().unwrap().as_deref(),
            Some("a,\"line one\nline two\",b")
        );
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("next"));
        assert!(reader.next_record().unwrap().is_none());
        assert!(!reader.saw_incomplete_tail());
    }

    #[test]
    fn test_reader_unclosed_quote_frames_lines_singly() {
        let data = "ok\n\"never closed\nstill open\nlast\n";
        let mut reader = RecordReader::new(Cursor::new(data.as_bytes()));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("ok"));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("\"never closed"));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("still open"));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("last"));
        assert!(reader.next_record().unwrap().is_none());
        assert!(!reader.saw_incomplete_tail());
        assert_eq!(reader.records_read(), 4);
    }

    #[test]
    fn test_reader_unclosed_quote_keeps_partial_tail() {
        let data = "\"open\nnext\npart";
        let mut reader = RecordReader::new(Cursor::new(data.as_bytes()));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("\"open"));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("next"));
        assert!(reader.next_record().unwrap().is_none());
        assert!(reader.saw_incomplete_tail());
    }

    #[test]
    fn test_reader_unjoin_reframes_lines() {
        // The stray quote on the first line swallows the second line and
        // pairs with the quote on the third.
        let data = "bad,\"x\nfine\nb,\"y\nc\"\n";
        let mut reader = RecordReader::new(Cursor::new(data.as_bytes()));
        assert_eq!(
            reader.next_record().unwrap().as_deref(),
            Some("bad,\"x\nfine\nb,\"y")
        );
        assert!(reader.unjoin());
        assert!(!reader.unjoin());
        assert_eq!(reader.records_read(), 0);

        assert_eq!(reader.next_record().unwrap().as_deref(), Some("bad,\"x"));
        assert!(!reader.unjoin());
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("fine"));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("b,\"y\nc\""));
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_reader_strips_crlf() {
        let mut reader = RecordReader::new(Cursor::new(b"x,y\r\n".to_vec()));
        assert_eq!(reader.next_record().unwrap().as_deref(), Some("x,y"));
    }
}
