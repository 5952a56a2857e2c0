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

//! Filename composition and parsing for rotated log files.
//!
//! Grounded on `RollingFileWriter::State`'s `current_filename`/`join_date`/
//! `list_sorted_logs` in the teacher crate, generalized to the composed
//! pattern `{base}[.{date}].{number}[.{ext}]` and to a standalone parser
//! (`identify_log_file`) that recovers `(date, number)` from a filename
//! instead of only sorting already-known files.

use std::path::Path;
use std::path::PathBuf;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;

/// Characters forbidden anywhere in a `dateFormat` pattern.
const FORBIDDEN_DATE_FORMAT_CHARS: &[char] =
    &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Characters forbidden in a filename, after stripping a leading Windows
/// drive letter.
const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', '\0'];

/// Builds the path for a rotated file: `{base}[.{date}].{number}[.{ext}]`.
///
/// `number` defaults to 1 if the caller passes 0; callers are expected to
/// pass `number >= 1`.
pub fn build_file_name(base: &Path, date: Option<&str>, number: u32, extension: &str) -> PathBuf {
    let number = number.max(1);
    let mut name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(date) = date {
        name.push('.');
        name.push_str(date);
    }
    name.push('.');
    name.push_str(&number.to_string());
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension.trim_start_matches('.'));
    }

    match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// The `(date, number)` pair recovered from a rotated filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifiedFile {
    /// Epoch-ms parsed from the date segment, or 0 if no `date_format` was
    /// configured.
    pub file_time: i64,
    /// The trailing sequence number.
    pub file_number: u32,
}

/// Parses a candidate filename produced by [`build_file_name`], recovering
/// its `(date, number)` pair. Returns `None` if `candidate_name` does not
/// match the expected pattern for this `(base, date_format, extension)`
/// combination.
pub fn identify_log_file(
    candidate_name: &str,
    base: &str,
    date_format: Option<&str>,
    extension: &str,
) -> Option<IdentifiedFile> {
    let rest = candidate_name.strip_prefix(base)?;
    let rest = rest.strip_prefix('.')?;

    let mut segments: Vec<&str> = rest.split('.').collect();

    if !extension.is_empty() {
        let ext = segments.pop()?;
        if ext != extension.trim_start_matches('.') {
            return None;
        }
    }

    let number_segment = segments.pop()?;
    let file_number: u32 = number_segment.parse().ok()?;

    let file_time = if let Some(fmt) = date_format {
        let date_segment = segments.pop()?;
        crate::time_policy::parse_formatted_date(fmt, date_segment)?
    } else {
        0
    };

    if !segments.is_empty() {
        // Leftover segments mean the candidate has more dots than this
        // pattern accounts for (e.g. a date_format containing a literal
        // dot, which this codec does not support — see SPEC_FULL.md).
        return None;
    }

    Some(IdentifiedFile {
        file_time,
        file_number,
    })
}

/// Splits a user-supplied path into `(base, extension)`.
///
/// - Rejects an empty path.
/// - If the last path segment has no stem (the path ends in a separator),
///   appends `app`.
/// - An explicit `extension_override` always wins. Otherwise, if the last
///   segment contains a `.`, the final suffix (length >= 2) is peeled off
///   and used as the extension. Otherwise the extension defaults to `log`.
pub fn sanitize_file(file: &str, extension_override: Option<&str>) -> Result<(PathBuf, String)> {
    if file.is_empty() {
        return Err(Error::new(ErrorKind::ConfigInvalid, "file must not be empty"));
    }

    let mut path = PathBuf::from(file);
    if file.ends_with('/') || file.ends_with(std::path::MAIN_SEPARATOR) {
        path.push("app");
        return Ok((path, extension_override.unwrap_or("log").to_string()));
    }

    let last = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(over) = extension_override {
        // An explicit extension always wins; the base keeps the full
        // last segment (a peeled suffix is not stripped from the base
        // unless it happens to also be the resolved extension).
        if let Some((stem, suffix)) = peel_suffix(&last) {
            if over == suffix {
                path.set_file_name(stem);
            }
        }
        return Ok((path, over.to_string()));
    }

    if let Some((stem, suffix)) = peel_suffix(&last) {
        if suffix.len() >= 2 {
            path.set_file_name(stem);
            return Ok((path, suffix));
        }
    }

    Ok((path, "log".to_string()))
}

fn peel_suffix(last_segment: &str) -> Option<(String, String)> {
    let dot = last_segment.rfind('.')?;
    if dot == 0 {
        return None;
    }
    let stem = last_segment[..dot].to_string();
    let suffix = last_segment[dot + 1..].to_string();
    if suffix.is_empty() {
        return None;
    }
    Some((stem, suffix))
}

/// Validates that `path` contains no characters forbidden in filenames on
/// the common platforms this crate targets, after stripping a leading
/// Windows drive letter (`C:`).
pub fn validate_file_name(path: &str) -> Result<()> {
    let remainder = strip_drive_letter(path);

    if let Some(c) = remainder.chars().find(|c| FORBIDDEN_FILENAME_CHARS.contains(c)) {
        return Err(Error::new(
            ErrorKind::ConfigInvalid,
            format!("file path contains forbidden character '{c}'"),
        )
        .with_context("path", path));
    }
    if remainder.contains(':') {
        return Err(Error::new(
            ErrorKind::ConfigInvalid,
            "file path contains a ':' outside of a drive letter",
        )
        .with_context("path", path));
    }

    Ok(())
}

fn strip_drive_letter(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    }
}

/// Validates that a `dateFormat` pattern contains none of the characters
/// that would be unsafe inside a filename segment.
pub fn validate_date_format(pattern: &str) -> Result<()> {
    if let Some(c) = pattern.chars().find(|c| FORBIDDEN_DATE_FORMAT_CHARS.contains(c)) {
        return Err(Error::new(
            ErrorKind::ConfigInvalid,
            format!("date format contains forbidden character '{c}'"),
        )
        .with_context("pattern", pattern));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_file_name_composes_all_segments() {
        let path = build_file_name(Path::new("logs/app"), Some("2024-08-10"), 3, "log");
        assert_eq!(path, PathBuf::from("logs/app.2024-08-10.3.log"));
    }

    #[test]
    fn build_file_name_without_date_or_extension() {
        let path = build_file_name(Path::new("logs/app"), None, 1, "");
        assert_eq!(path, PathBuf::from("logs/app.1"));
    }

    #[test]
    fn round_trips_through_identify_log_file() {
        let built = build_file_name(Path::new("app"), Some("2024-08-10"), 7, "log");
        let name = built.file_name().unwrap().to_str().unwrap();
        let identified = identify_log_file(name, "app", Some("yyyy-MM-dd"), "log").unwrap();
        assert_eq!(identified.file_number, 7);
        assert!(identified.file_time > 0);
    }

    #[test]
    fn identify_rejects_wrong_base() {
        assert!(identify_log_file("other.1.log", "app", None, "log").is_none());
    }

    #[test]
    fn identify_rejects_wrong_extension() {
        assert!(identify_log_file("app.1.json", "app", None, "log").is_none());
    }

    #[test]
    fn sanitize_peels_trailing_suffix() {
        let (base, ext) = sanitize_file("logs/app.log", None).unwrap();
        assert_eq!(base, PathBuf::from("logs/app"));
        assert_eq!(ext, "log");
    }

    #[test]
    fn sanitize_strips_only_last_suffix() {
        let (base, ext) = sanitize_file("logs/x.log.json", None).unwrap();
        assert_eq!(base, PathBuf::from("logs/x.log"));
        assert_eq!(ext, "json");
    }

    #[test]
    fn sanitize_defaults_to_log_with_no_suffix() {
        let (base, ext) = sanitize_file("logs/app", None).unwrap();
        assert_eq!(base, PathBuf::from("logs/app"));
        assert_eq!(ext, "log");
    }

    #[test]
    fn sanitize_appends_app_for_directory_like_path() {
        let (base, ext) = sanitize_file("logs/", None).unwrap();
        assert_eq!(base, PathBuf::from("logs/app"));
        assert_eq!(ext, "log");
    }

    #[test]
    fn sanitize_rejects_empty() {
        assert!(sanitize_file("", None).is_err());
    }

    #[test]
    fn sanitize_explicit_extension_overrides_peeled_one() {
        let (base, ext) = sanitize_file("logs/app.txt", Some("log")).unwrap();
        assert_eq!(base, PathBuf::from("logs/app"));
        assert_eq!(ext, "log");
    }

    #[test]
    fn validate_file_name_strips_drive_letter() {
        assert!(validate_file_name("C:\\logs\\app.log").is_ok());
        assert!(validate_file_name("C:logs:app.log").is_err());
    }

    #[test]
    fn validate_file_name_rejects_forbidden_chars() {
        assert!(validate_file_name("logs/app<1>.log").is_err());
    }

    #[test]
    fn validate_date_format_rejects_forbidden_chars() {
        assert!(validate_date_format("yyyy/MM/dd").is_err());
        assert!(validate_date_format("yyyy-MM-dd").is_ok());
    }
}
