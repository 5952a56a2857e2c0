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

//! Maintains a stable `current.log` symlink next to the active file.
//!
//! The teacher crate has no symlink support; this is grounded on
//! `flexi_logger`'s `writers::file_log_writer::state::platform` module
//! (`create_symlink_if_possible` / the per-OS `*_create_symlink` helpers),
//! adapted to the relative, basename-only target spec.md requires so the
//! link keeps working if the log directory itself is moved.

use std::io;
use std::path::Path;
use std::path::PathBuf;

const SYMLINK_NAME: &str = "current.log";

/// Ensures `dirname(active_file)/current.log` points at `active_file`'s
/// basename. Idempotent: calling this twice in a row with the same
/// `active_file` performs no filesystem mutation on the second call.
pub fn ensure_symlink(active_file: &Path) -> io::Result<()> {
    let target = match active_file.file_name() {
        Some(name) => PathBuf::from(name),
        None => return Ok(()),
    };
    let link = match active_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(SYMLINK_NAME),
        _ => PathBuf::from(SYMLINK_NAME),
    };

    platform::create_symlink_if_possible(&link, &target)
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::path::Path;

    pub(super) fn create_symlink_if_possible(link: &Path, target: &Path) -> io::Result<()> {
        if let Ok(existing) = std::fs::read_link(link) {
            if existing == target {
                return Ok(());
            }
        }

        if std::fs::symlink_metadata(link).is_ok() {
            std::fs::remove_file(link)?;
        }

        std::os::unix::fs::symlink(target, link)
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;
    use std::path::Path;

    /// Symlink creation generally requires elevated privileges on Windows.
    /// Callers are expected to treat a symlink failure as a warning, never
    /// as a reason to abort rotation; returning `Ok(())` here documents
    /// that this crate does not attempt it on non-Unix targets.
    pub(super) fn create_symlink_if_possible(_link: &Path, _target: &Path) -> io::Result<()> {
        Ok(())
    }
}
