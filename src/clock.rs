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

//! A swappable clock, so tests can drive rotation without sleeping.
//!
//! Grounded on `append::rolling_file::clock::Clock`, adapted to hand out
//! epoch-ms (the unit every other module in this crate speaks) instead of a
//! `jiff::Timestamp`.

use jiff::Timestamp;

#[derive(Debug)]
pub enum Clock {
    DefaultClock,
    #[cfg(test)]
    ManualClock(ManualClock),
}

impl Clock {
    pub fn now_ms(&self) -> i64 {
        match self {
            Clock::DefaultClock => Timestamp::now().as_millisecond(),
            #[cfg(test)]
            Clock::ManualClock(clock) => clock.now_ms(),
        }
    }

    #[cfg(test)]
    pub fn set_now_ms(&mut self, new_time_ms: i64) {
        if let Clock::ManualClock(clock) = self {
            clock.set_now_ms(new_time_ms);
        }
    }
}

#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now_ms: i64,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(now_ms: i64) -> ManualClock {
        ManualClock { now_ms }
    }

    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn set_now_ms(&mut self, now_ms: i64) {
        self.now_ms = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_can_be_advanced() {
        let mut clock = Clock::ManualClock(ManualClock::new(1000));
        assert_eq!(clock.now_ms(), 1000);
        clock.set_now_ms(2000);
        assert_eq!(clock.now_ms(), 2000);
    }
}
