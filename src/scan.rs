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

//! Enumerates a directory for resumption and retention.
//!
//! Grounded on `State::list_sorted_logs` in the teacher's
//! `rolling_file::rolling`, split into two standalone queries instead of one
//! method tied to a single `State`: resumption only needs the maximum
//! sequence number, retention's `remove_other=true` mode needs every
//! matching file with its parsed `(date, number)`.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::name::identify_log_file;
use crate::name::IdentifiedFile;

/// Returns the birth time of `path` in epoch-ms, or `None` if the platform
/// does not report it.
fn birth_time_ms(metadata: &fs::Metadata) -> Option<i64> {
    metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}

/// Detects the highest existing sequence number for `base`, so a new
/// process can continue the series instead of restarting at 1.
///
/// Entries whose birth time is below `since_ms` (when set) are excluded —
/// this keeps resumption inside the current time-policy period instead of
/// colliding with a stale number from a previous one. If the platform
/// cannot report birth time, the entry is included rather than excluded,
/// since resumption must still work on such platforms.
///
/// Returns `1` if the directory is missing, unreadable, or has no matching
/// entries.
pub fn detect_last_number(base: &Path, extension: &str, since_ms: Option<i64>) -> u32 {
    let dir = base.parent().filter(|p| !p.as_os_str().is_empty());
    let stem = match base.file_name() {
        Some(s) => s.to_string_lossy().into_owned(),
        None => return 1,
    };

    let read_dir = match dir {
        Some(dir) => fs::read_dir(dir),
        None => fs::read_dir("."),
    };
    let Ok(read_dir) = read_dir else {
        return 1;
    };

    let prefix = format!("{stem}.");
    let mut max_number = 0u32;

    for entry in read_dir.filter_map(|e| e.ok()) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        if let Some(since_ms) = since_ms {
            if let Some(birth) = birth_time_ms(&metadata) {
                if birth < since_ms {
                    continue;
                }
            }
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };

        let rest = if extension.is_empty() {
            rest
        } else {
            let suffix = format!(".{}", extension.trim_start_matches('.'));
            match rest.strip_suffix(&suffix) {
                Some(rest) => rest,
                None => continue,
            }
        };

        let number_segment = rest.rsplit('.').next().unwrap_or(rest);
        if let Ok(number) = number_segment.parse::<u32>() {
            max_number = max_number.max(number);
        }
    }

    max_number.max(1)
}

/// Lists every file in `base`'s directory that matches the `(base,
/// date_format, extension)` pattern, along with its parsed `(date, number)`.
/// Used by retention's `remove_other=true` mode, which rediscovers its
/// candidate set from the filesystem on every rotation rather than
/// tracking files it created itself.
pub fn list_matching(
    base: &Path,
    date_format: Option<&str>,
    extension: &str,
) -> Vec<(PathBuf, IdentifiedFile)> {
    let dir = base.parent().filter(|p| !p.as_os_str().is_empty());
    let stem = match base.file_name() {
        Some(s) => s.to_string_lossy().into_owned(),
        None => return Vec::new(),
    };

    let read_dir = match dir {
        Some(dir) => fs::read_dir(dir),
        None => fs::read_dir("."),
    };
    let Ok(read_dir) = read_dir else {
        return Vec::new();
    };

    let mut matches = Vec::new();
    for entry in read_dir.filter_map(|e| e.ok()) {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(identified) = identify_log_file(name, &stem, date_format, extension) {
            matches.push((entry.path(), identified));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn detect_last_number_finds_max() {
        let dir = TempDir::new().unwrap();
        for n in [1, 5, 7, 10] {
            File::create(dir.path().join(format!("file.{n}"))).unwrap();
        }
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base, "", None), 10);
    }

    #[test]
    fn detect_last_number_ignores_entries_without_trailing_integer() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("file.log")).unwrap();
        File::create(dir.path().join("file.3")).unwrap();
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base, "", None), 3);
    }

    #[test]
    fn detect_last_number_defaults_to_one_on_empty_dir() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base, "", None), 1);
    }

    #[test]
    fn detect_last_number_defaults_to_one_on_missing_dir() {
        let base = PathBuf::from("/does/not/exist/file");
        assert_eq!(detect_last_number(&base, "", None), 1);
    }

    #[test]
    fn detect_last_number_excludes_entries_older_than_since_ms() {
        let dir = TempDir::new().unwrap();

        // An older file with the higher sequence number...
        File::create(dir.path().join("file.9")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let since_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;
        std::thread::sleep(std::time::Duration::from_millis(20));

        // ...and a newer file with the lower sequence number.
        File::create(dir.path().join("file.5")).unwrap();

        let base = dir.path().join("file");

        // Without a floor, the older file's higher number wins.
        assert_eq!(detect_last_number(&base, "", None), 9);
        // With since_ms set to just after file.9's birth time, it is
        // excluded from the scan and only file.5 remains.
        assert_eq!(detect_last_number(&base, "", Some(since_ms)), 5);
    }

    #[test]
    fn detect_last_number_respects_extension() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("file.9.log")).unwrap();
        File::create(dir.path().join("file.12.json")).unwrap();
        let base = dir.path().join("file");
        assert_eq!(detect_last_number(&base, "log", None), 9);
    }

    #[test]
    fn list_matching_skips_non_matching_files() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("file.1.log")).unwrap();
        File::create(dir.path().join("file.2.log")).unwrap();
        File::create(dir.path().join("notLogFile")).unwrap();
        let base = dir.path().join("file");
        let matches = list_matching(&base, None, "log");
        assert_eq!(matches.len(), 2);
    }
}
