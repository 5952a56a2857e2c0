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

//! Parses the `size` option into a byte threshold.
//!
//! Grounded on `muhammad-fiaz-logly`'s `backend::rotation::parse_size_limit`:
//! scan the leading digits, then parse the trailing unit case-insensitively.
//! The multiplier table differs from that sibling crate, which treats a bare
//! number as bytes — spec.md requires a bare number to mean megabytes.

use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Parses a size string: `^([\d.]+)(\w?)$`, a positive (optionally
/// fractional) magnitude followed by an optional `b`, `k`, `m`, or `g` unit
/// (case-insensitive). A bare number means megabytes.
///
/// Returns `Ok(None)` if `input` is `None` (size rotation disabled).
pub fn parse_size(input: Option<&str>) -> Result<Option<u64>> {
    let Some(input) = input else {
        return Ok(None);
    };
    let input = input.trim();
    let invalid = || {
        Error::new(
            ErrorKind::ConfigInvalid,
            "size must be a positive (optionally fractional) number, optionally suffixed with b, k, m, or g",
        )
        .with_context("size", input)
    };

    if input.is_empty() {
        return Ok(None);
    }

    let split_at = input
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(input.len());
    let (magnitude, unit) = input.split_at(split_at);

    if magnitude.is_empty() {
        return Err(invalid());
    }
    let magnitude: f64 = magnitude.parse().map_err(|_| invalid())?;
    if !magnitude.is_finite() || magnitude < 0.0 {
        return Err(invalid());
    }

    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" => MB,
        "b" => 1,
        "k" => KB,
        "m" => MB,
        "g" => GB,
        _ => return Err(invalid()),
    };

    let bytes = magnitude * multiplier as f64;
    if !bytes.is_finite() || bytes < 1.0 {
        return Err(invalid());
    }

    Ok(Some(bytes as u64))
}
