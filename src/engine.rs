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

//! The rotation engine: owns `EngineState` and orchestrates every roll.
//!
//! Grounded on `rolling_file::rolling::{State, RollingFileWriter}`: the
//! construction sequence (sanitize → detect resumption point → build the
//! initial name → open, resuming in place if the file already exists), and
//! the size/time triggers, follow that module's shape. What's new relative
//! to the teacher: a `date_format`-driven filename segment, a symlink step,
//! a pluggable retention mode, and errors surfaced through an event channel
//! rather than `eprintln!` alone, because this crate is meant to be
//! embedded rather than always printing straight to stderr.

use std::collections::VecDeque;
use std::path::PathBuf;

use crossbeam_channel::Sender;

use crate::clock::Clock;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::name;
use crate::retention;
use crate::retention::LimitPolicy;
use crate::scan;
use crate::sink::FileSink;
use crate::size;
use crate::symlink;
use crate::time_policy;
use crate::time_policy::FrequencySpec;

/// Diagnostic events the engine reports about its own operation. Every
/// variant here corresponds to one of spec.md's sink events (`ready`,
/// `error`, `cleanup-complete`) or a rotation the engine itself performed;
/// `write`/`drain` have no meaning outside the engine's own synchronous
/// write path, so they are not surfaced here.
#[derive(Debug)]
pub enum RotationEvent {
    /// The sink is open and ready to accept writes.
    Ready,
    /// A rotation completed; the active file is now `path`.
    Rolled { path: PathBuf },
    /// Retention finished running after a rotation.
    CleanupComplete,
    /// Something failed in a way that does not abort the engine: a flush,
    /// a reopen, a retention delete, a symlink refresh.
    Error(Error),
    /// The engine has flushed and closed for the last time.
    Closed,
}

fn emit(events: &Sender<RotationEvent>, event: RotationEvent) {
    if let Err(err) = events.send(event) {
        eprintln!("rollsink: failed to report rotation event: {err}");
    }
}

/// Fully validated engine configuration, produced by
/// [`crate::RollingFileSinkBuilder::build`].
pub(crate) struct Options {
    pub file: String,
    pub size: Option<String>,
    pub frequency: Option<String>,
    pub extension_override: Option<String>,
    pub symlink: bool,
    pub limit_count: Option<u32>,
    pub remove_other_log_files: bool,
    pub date_format: Option<String>,
    pub mkdir: bool,
}

pub(crate) struct Engine {
    base: PathBuf,
    extension: String,
    date_format: Option<String>,
    frequency: Option<FrequencySpec>,
    max_bytes: Option<u64>,
    symlink: bool,
    limit: Option<LimitPolicy>,
    mkdir: bool,
    clock: Clock,
    events: Sender<RotationEvent>,

    number: u32,
    date: Option<String>,
    current_size: u64,
    created_file_names: VecDeque<PathBuf>,
    is_closing: bool,
    sink: FileSink,
}

impl Engine {
    /// Runs the construction sequence from spec.md §4.7 steps 1-8. Step 9
    /// (subscribe to `close`/schedule the first roll) and step 10
    /// (subscribe to `write`) are the caller's job — they happen once this
    /// returns, since timer scheduling lives in the worker loop.
    pub(crate) fn new(
        options: Options,
        clock: Clock,
        events: Sender<RotationEvent>,
    ) -> Result<(Engine, Option<i64>), Error> {
        let now_ms = clock.now_ms();

        let frequency = time_policy::parse_frequency(options.frequency.as_deref(), now_ms)?;
        let max_bytes = size::parse_size(options.size.as_deref())?;

        if let Some(count) = options.limit_count {
            if count == 0 {
                return Err(Error::new(
                    ErrorKind::ConfigInvalid,
                    "limit count must be greater than zero",
                ));
            }
        }

        if let Some(date_format) = &options.date_format {
            name::validate_date_format(date_format)?;
        }
        name::validate_file_name(&options.file)?;

        let (base, extension) =
            name::sanitize_file(&options.file, options.extension_override.as_deref())?;

        let date = match (&frequency, &options.date_format) {
            (Some(spec), Some(fmt)) => Some(time_policy::format_epoch_ms(spec.start, fmt)),
            _ => None,
        };

        let since_ms = frequency.as_ref().map(|f| f.start);
        let number = scan::detect_last_number(&base, &extension, since_ms);
        let file_name = name::build_file_name(&base, date.as_deref(), number, &extension);

        let current_size = FileSink::initial_size(&file_name);
        let sink = FileSink::open(&file_name, options.mkdir)?;

        if options.symlink {
            if let Err(err) = symlink::ensure_symlink(&file_name) {
                emit(
                    &events,
                    RotationEvent::Error(
                        Error::new(ErrorKind::ConfigInvalid, "failed to create symlink")
                            .with_context("path", file_name.display())
                            .set_source(err),
                    ),
                );
            }
        }

        let limit = options.limit_count.map(|count| LimitPolicy {
            count,
            remove_other: options.remove_other_log_files,
        });

        let mut created_file_names = VecDeque::new();
        if let Some(limit) = &limit {
            if !limit.remove_other {
                created_file_names.push_back(file_name.clone());
            }
        }

        emit(&events, RotationEvent::Ready);

        let next_deadline = frequency.as_ref().map(|f| f.next);

        let engine = Engine {
            base,
            extension,
            date_format: options.date_format,
            frequency,
            max_bytes,
            symlink: options.symlink,
            limit,
            mkdir: options.mkdir,
            clock,
            events,
            number,
            date,
            current_size,
            created_file_names,
            is_closing: false,
            sink,
        };

        Ok((engine, next_deadline))
    }

    fn current_file_name(&self) -> PathBuf {
        name::build_file_name(&self.base, self.date.as_deref(), self.number, &self.extension)
    }

    /// Handles one record from the producer: writes it, then applies the
    /// size trigger from spec.md §4.7. Write and rotation failures are
    /// reported through the event channel rather than returned, matching
    /// spec.md's rule that only construction-time errors abort.
    pub(crate) fn handle_write(&mut self, record: &[u8]) {
        if self.is_closing {
            return;
        }

        let n = match self.sink.write_record(record) {
            Ok(n) => n,
            Err(err) => {
                emit(
                    &self.events,
                    RotationEvent::Error(
                        Error::new(ErrorKind::IoFlush, "failed to write record")
                            .with_context("path", self.sink.path().display())
                            .set_source(err),
                    ),
                );
                return;
            }
        };

        let new_size = self.current_size + n as u64;
        match self.max_bytes {
            Some(max) if new_size >= max => {
                self.number += 1;
                self.current_size = 0;
                self.roll();
            }
            _ => self.current_size = new_size,
        }
    }

    /// Handles a scheduled rotation-timer deadline. Returns the next
    /// deadline to arm, or `None` if time-based rotation is disabled.
    pub(crate) fn handle_timer_fire(&mut self) -> Option<i64> {
        if self.is_closing {
            return None;
        }
        let frequency = self.frequency?;
        let now_ms = self.clock.now_ms();

        let new_date = self
            .date_format
            .as_deref()
            .map(|fmt| time_policy::format_epoch_ms(frequency.next, fmt));
        if new_date.is_some() && new_date != self.date {
            self.number = 0;
        }
        self.date = new_date;
        self.number += 1;
        self.current_size = 0;

        self.roll();

        let next = time_policy::FrequencySpec::get_next(frequency.kind, now_ms);
        self.frequency = Some(FrequencySpec {
            kind: frequency.kind,
            start: frequency.next,
            next,
        });
        Some(next)
    }

    /// The critical section from spec.md §4.7: flush, reopen, symlink,
    /// retention. Every step after flush still runs even if a previous one
    /// failed, except reopen, which is skipped (and the old file kept
    /// open) if flush itself failed.
    fn roll(&mut self) {
        if self.is_closing {
            return;
        }

        if let Err(err) = self.sink.flush() {
            emit(
                &self.events,
                RotationEvent::Error(
                    Error::new(ErrorKind::IoFlush, "failed to flush before rotation")
                        .with_context("path", self.sink.path().display())
                        .set_source(err),
                ),
            );
            return;
        }

        if self.is_closing {
            return;
        }

        let new_path = self.current_file_name();
        if let Err(err) = self.sink.reopen(new_path.clone(), self.mkdir) {
            emit(
                &self.events,
                RotationEvent::Error(
                    Error::new(ErrorKind::IoReopen, "failed to reopen after rotation")
                        .with_context("path", new_path.display())
                        .set_source(err),
                ),
            );
            return;
        }

        if self.symlink {
            if let Err(err) = symlink::ensure_symlink(&new_path) {
                emit(
                    &self.events,
                    RotationEvent::Error(
                        Error::new(ErrorKind::ConfigInvalid, "failed to refresh symlink")
                            .with_context("path", new_path.display())
                            .set_source(err),
                    ),
                );
            }
        }

        emit(
            &self.events,
            RotationEvent::Rolled {
                path: new_path.clone(),
            },
        );

        if let Some(limit) = self.limit {
            let result = if limit.remove_other {
                retention::remove_other_files(
                    &self.base,
                    self.date_format.as_deref(),
                    &self.extension,
                    limit.count,
                )
            } else {
                retention::remove_own_files(&mut self.created_file_names, new_path, limit.count)
            };

            match result {
                Ok(()) => emit(&self.events, RotationEvent::CleanupComplete),
                Err(err) => emit(&self.events, RotationEvent::Error(err)),
            }
        }
    }

    /// Flushes and marks the engine closed; further writes and timer fires
    /// are ignored.
    pub(crate) fn close(&mut self) {
        if self.is_closing {
            return;
        }
        self.is_closing = true;
        if let Err(err) = self.sink.flush() {
            emit(
                &self.events,
                RotationEvent::Error(
                    Error::new(ErrorKind::IoFlush, "failed to flush on close").set_source(err),
                ),
            );
        }
        emit(&self.events, RotationEvent::Closed);
    }

    #[cfg(test)]
    pub(crate) fn current_path_for_test(&self) -> PathBuf {
        self.sink.path().to_path_buf()
    }

    #[cfg(test)]
    pub(crate) fn set_now_ms_for_test(&mut self, now_ms: i64) {
        self.clock.set_now_ms(now_ms);
    }
}
