// SPDX-License-Identifier: PMPL-1.0-or-later
//
// logspool - Spool writer
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The `SpoolWriter` appends one encoded line per accepted event to the
// current segment file. It owns the open file, applies the severity filter,
// and rotates to a new segment when asked to.
//
// Rotation and reconfiguration are deferred: callers only raise a flag (or
// send a message through a `ReloadHandle`) and the writer acts on it at the
// start of its next append. The writer never returns an error to the event
// source. A failure to open or write disables spooling, is reported once to
// the `FailureReporter`, and stays in effect until the next reconfiguration.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{SpoolConfig, SyncMode};
use crate::error::SpoolFailure;
use crate::event::{LogEvent, RecordFormatter, SessionContext};
use crate::segment::segment_path;
use crate::severity::should_emit;
use crate::sink::{EventSink, FailureReporter, TracingReporter};

/// Permission bits for the spool directory.
pub const DIRECTORY_MODE: u32 = 0o700;

/// Permission bits for segment files. Owner read/write only.
pub const SEGMENT_FILE_MODE: u32 = 0o600;

// ---------------------------------------------------------------------------
// Outcomes and counters
// ---------------------------------------------------------------------------

/// What happened to an event handed to [`SpoolWriter::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A line was written to the current segment.
    Written,
    /// The event was below the configured severity.
    Filtered,
    /// Spooling is off (no directory, or disabled after a failure).
    Disabled,
}

/// Running counters kept by a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpoolStats {
    pub written: u64,
    pub filtered: u64,
    pub dropped: u64,
    /// Segment files opened, including the first.
    pub rotations: u64,
    pub failures: u64,
    pub bytes: u64,
}

// ---------------------------------------------------------------------------
// ReloadHandle
// ---------------------------------------------------------------------------

enum Reload {
    Config(SpoolConfig),
    Rotate,
}

/// Queues configuration changes and rotation requests for a writer.
///
/// Nothing is applied until the writer's next append.
#[derive(Clone)]
pub struct ReloadHandle {
    sender: Sender<Reload>,
}

impl ReloadHandle {
    /// Queue a new configuration. Returns `false` if the writer is gone.
    pub fn reload(&self, config: SpoolConfig) -> bool {
        self.sender.send(Reload::Config(config)).is_ok()
    }

    /// Queue a rotation. Returns `false` if the writer is gone.
    pub fn request_rotation(&self) -> bool {
        self.sender.send(Reload::Rotate).is_ok()
    }
}

impl std::fmt::Debug for ReloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadHandle").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SpoolWriter
// ---------------------------------------------------------------------------

struct ActiveSegment {
    path: PathBuf,
    file: File,
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

/// Appends encoded events to rotating segment files.
pub struct SpoolWriter {
    config: SpoolConfig,
    session: SessionContext,
    formatter: RecordFormatter,

    /// The open segment, if any.
    active: Option<ActiveSegment>,

    /// Set by `rotate_now`, reloads and directory changes.
    rotation_pending: bool,

    /// Cleared after an open or write failure.
    enabled: bool,

    reporter: Arc<dyn FailureReporter>,
    reload_tx: Sender<Reload>,
    reload_rx: Receiver<Reload>,
    clock: Clock,
    stats: SpoolStats,

    /// Reused encoding buffer.
    line: String,
}

impl SpoolWriter {
    /// Create a writer that reports failures through `tracing`.
    ///
    /// No file is opened until the first accepted event.
    pub fn new(config: SpoolConfig) -> Self {
        Self::with_reporter(config, Arc::new(TracingReporter))
    }

    pub fn with_reporter(config: SpoolConfig, reporter: Arc<dyn FailureReporter>) -> Self {
        let (reload_tx, reload_rx) = mpsc::channel();
        Self {
            config: config.normalized(),
            session: SessionContext::background(std::process::id() as i32, Utc::now()),
            formatter: RecordFormatter::new(),
            active: None,
            rotation_pending: false,
            enabled: true,
            reporter,
            reload_tx,
            reload_rx,
            clock: Box::new(Utc::now),
            stats: SpoolStats::default(),
            line: String::new(),
        }
    }

    /// Replace the clock used for segment names and untimestamped events.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Set the process/session the following events belong to.
    pub fn set_session(&mut self, session: SessionContext) {
        self.session = session;
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Offer one event to the spool.
    pub fn append(&mut self, event: &LogEvent) -> AppendOutcome {
        self.apply_reloads();

        if !self.enabled || !self.config.is_enabled() {
            self.close();
            self.stats.dropped += 1;
            return AppendOutcome::Disabled;
        }

        if !should_emit(event.severity, self.config.min_severity) {
            self.stats.filtered += 1;
            return AppendOutcome::Filtered;
        }

        if self.active.is_none() || self.rotation_pending {
            self.rotate();
            if self.active.is_none() {
                self.stats.dropped += 1;
                return AppendOutcome::Disabled;
            }
        }

        let now = (self.clock)();
        let record = self
            .formatter
            .format(event, &self.session, &self.config, now);
        self.line.clear();
        codec::encode_into(&mut self.line, &record);

        match self.write_line() {
            Ok(()) => {
                self.stats.written += 1;
                self.stats.bytes += self.line.len() as u64;
                AppendOutcome::Written
            }
            Err(failure) => {
                self.disable(failure);
                self.stats.dropped += 1;
                AppendOutcome::Disabled
            }
        }
    }

    /// Install a new configuration. A directory change schedules a
    /// rotation; a disabled writer is re-enabled and retries on the next
    /// append.
    pub fn reconfigure(&mut self, config: SpoolConfig) {
        let config = config.normalized();
        if config.directory != self.config.directory {
            debug!(
                old = %self.config.directory.display(),
                new = %config.directory.display(),
                "Spool directory changed"
            );
            self.rotation_pending = true;
        }
        if !self.enabled {
            self.enabled = true;
            self.rotation_pending = true;
        }
        self.config = config;
    }

    /// Ask for a fresh segment before the next line is written.
    pub fn rotate_now(&mut self) {
        self.rotation_pending = true;
    }

    /// Close the active segment, if any. The next accepted event opens a
    /// new one.
    pub fn close(&mut self) {
        if let Some(segment) = self.active.take() {
            info!(segment = %segment.path.display(), "Closed spool segment");
        }
    }

    /// Path of the segment currently being written.
    pub fn current_segment(&self) -> Option<&Path> {
        self.active.as_ref().map(|s| s.path.as_path())
    }

    /// Whether the writer will attempt to write the next accepted event.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.config.is_enabled()
    }

    pub fn config(&self) -> &SpoolConfig {
        &self.config
    }

    pub fn stats(&self) -> SpoolStats {
        self.stats
    }

    /// A handle other threads can use to queue reloads and rotations.
    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            sender: self.reload_tx.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn apply_reloads(&mut self) {
        while let Ok(message) = self.reload_rx.try_recv() {
            match message {
                Reload::Config(config) => self.reconfigure(config),
                Reload::Rotate => self.rotation_pending = true,
            }
        }
    }

    /// Close the current segment and open a new one named from the clock.
    fn rotate(&mut self) {
        let previous = self.active.take().map(|s| s.path);
        self.rotation_pending = false;
        self.enabled = true;

        match self.open_segment() {
            Ok(segment) => {
                match &previous {
                    Some(old) => info!(
                        old_segment = %old.display(),
                        new_segment = %segment.path.display(),
                        "Rotated spool segment"
                    ),
                    None => info!(segment = %segment.path.display(), "Opened spool segment"),
                }
                self.stats.rotations += 1;
                self.active = Some(segment);
            }
            Err(failure) => self.disable(failure),
        }
    }

    fn open_segment(&self) -> Result<ActiveSegment, SpoolFailure> {
        let dir = &self.config.directory;

        // Best effort: an existing directory or a racing creator is fine.
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DIRECTORY_MODE);
        }
        let _ = builder.create(dir);

        if !dir.is_dir() {
            return Err(SpoolFailure::Config {
                dir: dir.clone(),
                message: "not a directory or could not be created".to_string(),
            });
        }

        let path = segment_path(dir, &self.config.layout, (self.clock)());
        let mut options = OpenOptions::new();
        options.create(true).read(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(SEGMENT_FILE_MODE);
        }

        let mut file = options.open(&path).map_err(|e| SpoolFailure::Open {
            path: path.clone(),
            message: e.to_string(),
        })?;

        match terminate_torn_line(&mut file) {
            Ok(true) => {
                warn!(segment = %path.display(), "Terminated torn line in reopened segment");
            }
            Ok(false) => {}
            Err(e) => {
                return Err(SpoolFailure::Write {
                    path,
                    message: e.to_string(),
                });
            }
        }

        Ok(ActiveSegment { path, file })
    }

    fn write_line(&mut self) -> Result<(), SpoolFailure> {
        let Some(segment) = self.active.as_mut() else {
            return Ok(());
        };

        let result = segment
            .file
            .write_all(self.line.as_bytes())
            .and_then(|()| segment.file.flush())
            .and_then(|()| match self.config.sync_mode {
                SyncMode::Fsync => segment.file.sync_data(),
                SyncMode::Flush => Ok(()),
            });

        result.map_err(|e| SpoolFailure::Write {
            path: segment.path.clone(),
            message: e.to_string(),
        })
    }

    fn disable(&mut self, failure: SpoolFailure) {
        self.active = None;
        if self.enabled {
            self.enabled = false;
            self.stats.failures += 1;
            self.reporter.report(&failure);
        }
    }
}

/// Append `\n` to a non-empty segment that does not already end with one,
/// so a line torn by an earlier writer cannot merge with the next record.
fn terminate_torn_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }
    file.write_all(b"\n")?;
    Ok(true)
}

impl EventSink for SpoolWriter {
    fn emit(&mut self, event: &LogEvent) {
        self.append(event);
    }
}

impl Drop for SpoolWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SpoolWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolWriter")
            .field("config", &self.config)
            .field("current_segment", &self.current_segment())
            .field("enabled", &self.enabled)
            .field("rotation_pending", &self.rotation_pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
