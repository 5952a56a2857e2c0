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

//! Bounds the number of rotated files kept on disk.
//!
//! Grounded on `State::delete_oldest_logs` in the teacher's
//! `rolling_file::rolling`, split into the two modes spec.md distinguishes:
//! files this process itself created (a FIFO, cheap, no directory read) and
//! every file in the directory that matches the naming pattern (a rescan
//! every rotation, needed to also catch files left by a previous process).

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::scan;

/// How many rotated files to keep, and whether to consider files this
/// process did not itself create.
#[derive(Debug, Clone, Copy)]
pub struct LimitPolicy {
    pub count: u32,
    pub remove_other: bool,
}

/// Deletes `path`, retrying on failure up to `max_attempts` times with
/// `delay` between attempts.
///
/// Grounded on spec.md §4.5's rationale: on Windows a file may briefly stay
/// locked by an antivirus scanner or by the handle the engine itself just
/// closed. `ENOENT` (already gone) is treated as success.
pub fn unlink_with_retry(path: &Path, max_attempts: u32, delay: Duration) -> Result<(), Error> {
    let mut attempts = 0;
    loop {
        match fs::remove_file(path) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(Error::new(ErrorKind::Unlink, "failed to delete log file")
                        .with_context("path", path.display())
                        .with_context("attempts", attempts)
                        .set_source(err));
                }
                thread::sleep(delay);
            }
        }
    }
}

/// Default unlink retry parameters, per spec.md §4.5's recommendation.
pub const DEFAULT_UNLINK_ATTEMPTS: u32 = 50;
pub const DEFAULT_UNLINK_DELAY: Duration = Duration::from_millis(100);

/// Mode A: `created` is a FIFO of files this process itself opened, in
/// creation order. `new_file` is appended, then the front is popped and
/// deleted while more than `count + 1` (active + retained) remain.
pub fn remove_own_files(
    created: &mut VecDeque<PathBuf>,
    new_file: PathBuf,
    count: u32,
) -> Result<(), Error> {
    created.push_back(new_file);
    let keep = count as usize + 1;
    while created.len() > keep {
        if let Some(oldest) = created.pop_front() {
            unlink_with_retry(&oldest, DEFAULT_UNLINK_ATTEMPTS, DEFAULT_UNLINK_DELAY)?;
        }
    }
    Ok(())
}

/// Mode B: rediscovers every file in `base`'s directory matching the naming
/// pattern, sorts oldest-first by `(file_time, file_number)`, and deletes
/// down to `count` remaining entries. Does not consult or update `created`.
pub fn remove_other_files(
    base: &Path,
    date_format: Option<&str>,
    extension: &str,
    count: u32,
) -> Result<(), Error> {
    let mut matches = scan::list_matching(base, date_format, extension);
    matches.sort_by_key(|(_, identified)| (identified.file_time, identified.file_number));

    let count = count as usize;
    if matches.len() <= count {
        return Ok(());
    }
    let to_delete = matches.len() - count;
    for (path, _) in matches.into_iter().take(to_delete) {
        unlink_with_retry(&path, DEFAULT_UNLINK_ATTEMPTS, DEFAULT_UNLINK_DELAY)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn own_files_mode_keeps_active_plus_count() {
        let dir = TempDir::new().unwrap();
        let mut created = VecDeque::new();
        for n in 1..=5u32 {
            let path = dir.path().join(format!("file.{n}"));
            File::create(&path).unwrap();
            remove_own_files(&mut created, path, 1).unwrap();
        }
        assert_eq!(created.len(), 2);
        assert!(dir.path().join("file.4").exists());
        assert!(dir.path().join("file.5").exists());
        assert!(!dir.path().join("file.1").exists());
    }

    #[test]
    fn other_files_mode_ignores_non_matching_and_deletes_oldest() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("notLogFile")).unwrap();
        File::create(dir.path().join("file.1.log")).unwrap();
        File::create(dir.path().join("file.2.log")).unwrap();
        File::create(dir.path().join("file.3.log")).unwrap();
        let base = dir.path().join("file");

        remove_other_files(&base, None, "log", 2).unwrap();

        assert!(dir.path().join("notLogFile").exists());
        assert!(!dir.path().join("file.1.log").exists());
        assert!(dir.path().join("file.2.log").exists());
        assert!(dir.path().join("file.3.log").exists());
    }

    #[test]
    fn unlink_with_retry_treats_missing_file_as_success() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone");
        assert!(unlink_with_retry(&path, 3, Duration::from_millis(1)).is_ok());
    }
}
