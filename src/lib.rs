// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![deny(missing_docs)]

//! rollsink is a rotating file sink: it accepts a stream of already
//! formatted byte records and appends them to a file that rotates on a
//! time boundary, a size threshold, or both, while maintaining retention
//! and an optional stable `current.log` symlink.
//!
//! # Overview
//!
//! Build a sink with [`RollingFileSinkBuilder`], send it records from
//! whatever thread produces your log lines, and keep the returned
//! [`WorkerGuard`] alive for as long as you want writes to flush — dropping
//! it flushes and joins the background worker.
//!
//! # Examples
//!
//! ```
//! use rollsink::RollingFileSinkBuilder;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let base = dir.path().join("app").to_string_lossy().into_owned();
//!
//! let (sink, _guard, _events) = RollingFileSinkBuilder::new(base)
//!     .size("10m")
//!     .limit(5)
//!     .build()
//!     .unwrap();
//!
//! sink.write(b"hello\n".to_vec()).unwrap();
//! ```

mod clock;
mod engine;
mod name;
mod retention;
mod scan;
mod sink;
mod size;
mod symlink;
mod time_policy;
mod worker;

mod error;
pub use self::error::*;

pub use self::engine::RotationEvent;

use std::fmt;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::bounded;
use crossbeam_channel::unbounded;
use crossbeam_channel::SendTimeoutError;
use crossbeam_channel::Sender;

use self::clock::Clock;
use self::engine::Engine;
use self::engine::Options;
use self::worker::Message;

/// The base path source for a sink: a literal string, or a thunk invoked
/// exactly once at [`build`](RollingFileSinkBuilder::build) time.
///
/// Mirrors spec.md §6's `file: string or thunk→string` and §9's design note
/// that the thunk is "a boxed callable evaluated once at startup" — every
/// rotation afterward reuses the resolved base, it is never re-invoked.
enum FileSource {
    Literal(String),
    Thunk(Box<dyn FnOnce() -> String + Send>),
}

impl FileSource {
    fn resolve(self) -> String {
        match self {
            FileSource::Literal(s) => s,
            FileSource::Thunk(thunk) => thunk(),
        }
    }
}

impl Default for FileSource {
    fn default() -> Self {
        FileSource::Literal(String::new())
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            FileSource::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// Builds a [`RollingFileSink`], validating every option eagerly.
///
/// Mirrors `RollingFileWriterBuilder` in spirit: required fields up front,
/// everything else defaulted and overridable through chained setters,
/// validated once in [`build`](RollingFileSinkBuilder::build).
#[derive(Debug, Default)]
pub struct RollingFileSinkBuilder {
    file: FileSource,
    size: Option<String>,
    frequency: Option<String>,
    extension: Option<String>,
    symlink: bool,
    limit_count: Option<u32>,
    remove_other_log_files: bool,
    date_format: Option<String>,
    mkdir: bool,
    buffered_lines_limit: Option<usize>,
    shutdown_timeout: Option<Duration>,
}

impl RollingFileSinkBuilder {
    /// Creates a new builder for a sink rooted at `file` (a directory plus
    /// a stem). If the stem has a trailing `.suffix`, that suffix becomes
    /// the file extension unless [`extension`](Self::extension) overrides
    /// it; otherwise the extension defaults to `log`.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: FileSource::Literal(file.into()),
            ..Default::default()
        }
    }

    /// Creates a new builder whose base path is produced by `file`, a thunk
    /// invoked exactly once when [`build`](Self::build) runs — not on every
    /// rotation. Use this when the base path is only known once the process
    /// has started (e.g. it embeds the current pid or a resolved config
    /// directory).
    pub fn from_file_thunk(file: impl FnOnce() -> String + Send + 'static) -> Self {
        Self {
            file: FileSource::Thunk(Box::new(file)),
            ..Default::default()
        }
    }

    /// Sets the size threshold: `<n>[b|k|m|g]`, a bare number meaning MB.
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Sets the rotation frequency: `"daily"`, `"hourly"`, or a number of
    /// milliseconds.
    pub fn frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    /// Overrides the inferred file extension.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Maintains a `current.log` symlink next to the active file.
    pub fn symlink(mut self, symlink: bool) -> Self {
        self.symlink = symlink;
        self
    }

    /// Sets the number of rotated files retained in addition to the active
    /// one. `count` must be greater than zero; `build()` rejects `0`.
    pub fn limit(mut self, count: u32) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// When set, retention considers every file in the directory matching
    /// the naming pattern, not only files this process created.
    pub fn remove_other_log_files(mut self, remove_other: bool) -> Self {
        self.remove_other_log_files = remove_other;
        self
    }

    /// Sets the date-fns–compatible pattern used for the filename's date
    /// segment. Has no effect unless `frequency` is also set.
    pub fn date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = Some(date_format.into());
        self
    }

    /// Creates the parent directory of `file` if it does not exist.
    pub fn mkdir(mut self, mkdir: bool) -> Self {
        self.mkdir = mkdir;
        self
    }

    /// Bounds the number of buffered, not-yet-written records. `None`
    /// (the default) is unbounded.
    pub fn buffered_lines_limit(mut self, limit: Option<usize>) -> Self {
        self.buffered_lines_limit = limit;
        self
    }

    /// Sets how long [`WorkerGuard::drop`] waits for the worker to flush
    /// before giving up.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Validates every option and starts the sink's background worker.
    ///
    /// Returns the sink handle, a guard that flushes on drop, and a
    /// receiver for the engine's diagnostic [`RotationEvent`]s.
    pub fn build(
        self,
    ) -> Result<(
        RollingFileSink,
        WorkerGuard,
        crossbeam_channel::Receiver<RotationEvent>,
    )> {
        self.build_with_clock(Clock::DefaultClock)
    }

    fn build_with_clock(
        self,
        clock: Clock,
    ) -> Result<(
        RollingFileSink,
        WorkerGuard,
        crossbeam_channel::Receiver<RotationEvent>,
    )> {
        let options = Options {
            file: self.file.resolve(),
            size: self.size,
            frequency: self.frequency,
            extension_override: self.extension,
            symlink: self.symlink,
            limit_count: self.limit_count,
            remove_other_log_files: self.remove_other_log_files,
            date_format: self.date_format,
            mkdir: self.mkdir,
        };

        let (events_tx, events_rx) = unbounded();
        let (engine, next_deadline) = Engine::new(options, clock, events_tx)?;

        let (records_tx, records_rx) = match self.buffered_lines_limit {
            Some(cap) => bounded(cap),
            None => unbounded(),
        };
        let (shutdown_tx, shutdown_rx) = bounded(0);

        let handle = worker::make_thread(
            engine,
            next_deadline,
            records_rx,
            shutdown_rx,
            "rollsink-worker".to_string(),
        );

        let guard = WorkerGuard::new(handle, records_tx.clone(), shutdown_tx, self.shutdown_timeout);
        let sink = RollingFileSink { sender: records_tx };

        Ok((sink, guard, events_rx))
    }
}

/// A handle producers use to send records to the sink's background
/// worker. Cheap to clone; every clone shares the same worker thread.
#[derive(Clone, Debug)]
pub struct RollingFileSink {
    sender: Sender<Message>,
}

impl RollingFileSink {
    /// Sends one record to be appended. Returns as soon as the record is
    /// queued — it is written by the background worker, not inline.
    pub fn write(&self, record: Vec<u8>) -> Result<()> {
        self.sender.send(Message::Record(record)).map_err(|err| {
            Error::new(ErrorKind::IoFlush, "sink worker is no longer running").with_context(
                "cause",
                err.to_string(),
            )
        })
    }
}

/// Flushes and joins the sink's background worker on drop.
///
/// Writing to a [`RollingFileSink`] does not write synchronously — the
/// background worker writes (and rotates) at its own pace. Keep this guard
/// alive for as long as records should keep being flushed; drop it (or let
/// it go out of scope, e.g. at the end of `main`) to flush and join before
/// exiting.
#[derive(Debug)]
pub struct WorkerGuard {
    handle: Option<JoinHandle<()>>,
    sender: Sender<Message>,
    shutdown: Sender<()>,
    shutdown_timeout: Duration,
}

impl WorkerGuard {
    fn new(
        handle: JoinHandle<()>,
        sender: Sender<Message>,
        shutdown: Sender<()>,
        shutdown_timeout: Option<Duration>,
    ) -> Self {
        const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(1000);
        Self {
            handle: Some(handle),
            sender,
            shutdown,
            shutdown_timeout: shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
        }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let shutdown_timeout = self.shutdown_timeout;
        match self.sender.send_timeout(Message::Shutdown, shutdown_timeout) {
            Ok(()) => {
                let _ = self.shutdown.send_timeout((), shutdown_timeout);
            }
            Err(SendTimeoutError::Disconnected(_)) => (),
            Err(SendTimeoutError::Timeout(err)) => {
                eprintln!("rollsink: failed to send shutdown signal to worker: {err:?}");
            }
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    #[test]
    fn build_rejects_empty_file() {
        let err = RollingFileSinkBuilder::new("").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn build_rejects_zero_limit_count() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app").to_string_lossy().into_owned();

        let err = RollingFileSinkBuilder::new(base).limit(0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn file_thunk_is_invoked_once_and_reused_across_rotations() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app").to_string_lossy().into_owned();

        let (sink, guard, _events) = RollingFileSinkBuilder::from_file_thunk(move || base)
            .size("10b")
            .build()
            .unwrap();

        sink.write(b"0123456789x".to_vec()).unwrap();
        drop(guard);

        assert!(dir.path().join("app.1.log").exists());
        assert!(dir.path().join("app.2.log").exists());
    }

    #[test]
    fn writes_land_in_the_active_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app").to_string_lossy().into_owned();

        let (sink, guard, _events) = RollingFileSinkBuilder::new(base).build().unwrap();
        sink.write(b"hello\n".to_vec()).unwrap();
        drop(guard);

        let contents = std::fs::read_to_string(dir.path().join("app.1.log")).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn size_rotation_creates_successive_files() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("log").to_string_lossy().into_owned();

        let (sink, guard, _events) = RollingFileSinkBuilder::new(base)
            .size("20b")
            .build()
            .unwrap();

        for _ in 0..3 {
            sink.write(b"xxxxxxxxxxxxxxxxxxx\n".to_vec()).unwrap();
        }
        std::thread::sleep(StdDuration::from_millis(50));
        drop(guard);

        assert!(dir.path().join("log.1.log").exists());
        assert!(dir.path().join("log.2.log").exists());
    }
}
