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

//! Parses a rotation frequency and computes calendar-correct boundaries.
//!
//! Grounded on the teacher's `append::rolling_file::Rotation`, but reworked
//! so `Daily`/`Hourly` boundaries are computed from a local [`jiff::Zoned`]
//! instead of rounding a bare [`jiff::Timestamp`]. Rounding a `Timestamp`
//! truncates in UTC and gets the wrong answer across a DST transition (a
//! 25-hour or 23-hour day no longer lands on local midnight); `Zoned`
//! arithmetic is calendar-aware and handles both transitions correctly,
//! which spec.md's DST invariant requires.

use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use jiff::Span;
use jiff::Timestamp;
use jiff::Zoned;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::error::Result;

/// The kind of rotation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Rotate at local midnight, every day.
    Daily,
    /// Rotate at the top of the hour, every hour.
    Hourly,
    /// Rotate every `millis` milliseconds, aligned to epoch.
    Every(u64),
}

/// A parsed rotation frequency: its kind, the start of the current period,
/// and the next boundary.
///
/// Invariant: `start <= now < next` at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencySpec {
    pub kind: Kind,
    pub start: i64,
    pub next: i64,
}

impl FrequencySpec {
    fn at(kind: Kind, now_ms: i64) -> Self {
        let (start, next) = match kind {
            Kind::Daily => {
                let now = zoned_from_ms(now_ms);
                let start = start_of_day(&now);
                let next = calendar_add(&start, Span::new().days(1));
                (start.timestamp().as_millisecond(), next.timestamp().as_millisecond())
            }
            Kind::Hourly => {
                let now = zoned_from_ms(now_ms);
                let start = start_of_hour(&now);
                let next = calendar_add(&start, Span::new().hours(1));
                (start.timestamp().as_millisecond(), next.timestamp().as_millisecond())
            }
            Kind::Every(millis) => {
                let millis = millis.max(1) as i64;
                let start = (now_ms.div_euclid(millis)) * millis;
                (start, start + millis)
            }
        };
        FrequencySpec { kind, start, next }
    }

    /// Recomputes the next boundary, as of `now_ms`, using the same
    /// calendar-aware rule as construction. Correct across DST transitions.
    pub fn get_next(kind: Kind, now_ms: i64) -> i64 {
        FrequencySpec::at(kind, now_ms).next
    }
}

fn zoned_from_ms(now_ms: i64) -> Zoned {
    Timestamp::from_millisecond(now_ms)
        .expect("epoch-ms timestamp in range")
        .to_zoned(TimeZone::system())
}

fn start_of_day(now: &Zoned) -> Zoned {
    now.date()
        .at(0, 0, 0, 0)
        .to_zoned(now.time_zone().clone())
        .expect("local midnight is unambiguous after disambiguation")
}

fn start_of_hour(now: &Zoned) -> Zoned {
    now.date()
        .at(now.hour(), 0, 0, 0)
        .to_zoned(now.time_zone().clone())
        .expect("local top-of-hour is unambiguous after disambiguation")
}

/// Adds a calendar span (days/hours) to a zoned time, handling DST
/// transitions the way a wall clock would: the wall-clock time of day is
/// preserved, even though the elapsed real time may be 23h or 25h.
fn calendar_add(zoned: &Zoned, span: Span) -> Zoned {
    zoned
        .checked_add(span)
        .expect("calendar addition within representable range")
}

/// Parses a frequency spec input: `"daily"`, `"hourly"`, or a bare integer
/// number of milliseconds. Returns `Ok(None)` if `input` is `None` (time
/// rotation disabled).
pub fn parse_frequency(input: Option<&str>, now_ms: i64) -> Result<Option<FrequencySpec>> {
    let Some(input) = input else {
        return Ok(None);
    };
    let kind = match input {
        "daily" => Kind::Daily,
        "hourly" => Kind::Hourly,
        other => {
            let millis: u64 = other.parse().map_err(|_| {
                Error::new(
                    ErrorKind::ConfigInvalid,
                    "frequency must be \"daily\", \"hourly\", or a number of milliseconds",
                )
                .with_context("frequency", other)
            })?;
            Kind::Every(millis)
        }
    };
    Ok(Some(FrequencySpec::at(kind, now_ms)))
}

/// Formats `epoch_ms` using a date-fns–compatible pattern (the same
/// pattern family spec.md's `NamePattern.date_format` names). Supported
/// tokens: `yyyy`, `yy`, `MM`, `dd`, `HH`, `mm`, `ss`, `SSS`, `S`; any other
/// character is copied through literally.
pub fn format_epoch_ms(epoch_ms: i64, pattern: &str) -> String {
    let zoned = zoned_from_ms(epoch_ms);
    let strftime_pattern = translate_pattern(pattern);
    zoned
        .strftime(&strftime_pattern)
        .to_string()
}

/// Parses a date segment previously produced by [`format_epoch_ms`] with
/// the same `pattern`, returning its epoch-ms, or `None` if it does not
/// match.
pub fn parse_formatted_date(pattern: &str, segment: &str) -> Option<i64> {
    let strftime_pattern = translate_pattern(pattern);
    let dt = DateTime::strptime(&strftime_pattern, segment).ok()?;
    let zoned = dt.to_zoned(TimeZone::system()).ok()?;
    Some(zoned.timestamp().as_millisecond())
}

/// Translates a date-fns–style token pattern into a jiff/strftime pattern.
fn translate_pattern(pattern: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("yyyy", "%Y"),
        ("SSS", "%3f"),
        ("HH", "%H"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("mm", "%M"),
        ("ss", "%S"),
        ("yy", "%y"),
        ("S", "%1f"),
    ];

    let mut out = String::with_capacity(pattern.len());
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    'outer: while i < chars.len() {
        let rest: String = chars[i..].iter().collect();
        for (token, replacement) in TOKENS {
            if rest.starts_with(token) {
                out.push_str(replacement);
                i += token.chars().count();
                continue 'outer;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(s: &str) -> i64 {
        s.parse::<Timestamp>().unwrap().as_millisecond()
    }

    #[test]
    fn parse_frequency_rejects_garbage() {
        assert!(parse_frequency(Some("weekly"), 0).is_err());
    }

    #[test]
    fn parse_frequency_none_disables() {
        assert!(parse_frequency(None, 0).unwrap().is_none());
    }

    #[test]
    fn every_millis_aligns_to_epoch() {
        let spec = parse_frequency(Some("100"), 250).unwrap().unwrap();
        assert_eq!(spec.start, 200);
        assert_eq!(spec.next, 300);
    }

    #[test]
    fn round_trip_format_and_parse() {
        let now = ms("2024-08-10T17:12:52Z");
        let formatted = format_epoch_ms(now, "yyyy-MM-dd");
        let parsed = parse_formatted_date("yyyy-MM-dd", &formatted).unwrap();
        // Within the same calendar day in whatever local timezone the
        // test runs under.
        assert_eq!(format_epoch_ms(parsed, "yyyy-MM-dd"), formatted);
    }

    #[test]
    fn translate_pattern_leaves_separators_alone() {
        assert_eq!(translate_pattern("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(translate_pattern("HH-mm-ss-S"), "%H-%M-%S-%1f");
    }

    // These two pin `calendar_add` against Europe/Berlin directly rather
    // than going through `zoned_from_ms`/`TimeZone::system()`, so the
    // result does not depend on the timezone the test happens to run in.

    #[test]
    fn dst_fall_back_25_hour_day_still_lands_on_local_midnight() {
        let berlin = TimeZone::get("Europe/Berlin").unwrap();
        let now = jiff::civil::date(2024, 10, 27)
            .at(0, 0, 0, 0)
            .to_zoned(berlin)
            .unwrap();

        let start = start_of_day(&now);
        let next = calendar_add(&start, Span::new().days(1));

        assert_eq!(next.date(), jiff::civil::date(2024, 10, 28));
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    }

    #[test]
    fn dst_spring_forward_23_hour_day_still_lands_on_local_midnight() {
        let berlin = TimeZone::get("Europe/Berlin").unwrap();
        let now = jiff::civil::date(2024, 3, 31)
            .at(1, 0, 0, 0)
            .to_zoned(berlin)
            .unwrap();

        let start = start_of_day(&now);
        let next = calendar_add(&start, Span::new().days(1));

        assert_eq!(next.date(), jiff::civil::date(2024, 4, 1));
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));
    }
}
