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

//! The engine's single-owner background thread.
//!
//! Grounded on `non_blocking::worker::Worker`, generalized with
//! `crossbeam_channel::Select` so the thread also wakes up for the
//! rotation timer (`FrequencySpec.next`), not only for records. The
//! teacher's worker only drains a channel and writes; this one additionally
//! drives `Engine::handle_timer_fire`, which is what turns spec.md's
//! "schedule_roll" into a proactive wakeup instead of a check performed on
//! the next write.

use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::Select;
use jiff::Timestamp;

use crate::engine::Engine;

#[derive(Debug)]
pub(crate) enum Message {
    Record(Vec<u8>),
    Shutdown,
}

/// Converts an epoch-ms deadline into a `std::time::Instant`, anchored
/// against the current wall clock. Recomputed on every loop iteration
/// since `Instant` carries no absolute epoch mapping of its own.
fn deadline_instant(target_ms: i64) -> Instant {
    let now_ms = Timestamp::now().as_millisecond();
    let delta_ms = target_ms.saturating_sub(now_ms);
    if delta_ms <= 0 {
        Instant::now()
    } else {
        Instant::now() + Duration::from_millis(delta_ms as u64)
    }
}

pub(crate) fn make_thread(
    mut engine: Engine,
    mut next_deadline: Option<i64>,
    records: Receiver<Message>,
    shutdown: Receiver<()>,
    name: String,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name)
        .spawn(move || {
            'outer: loop {
                let timer_chan = next_deadline.map(|ms| crossbeam_channel::at(deadline_instant(ms)));

                let mut sel = Select::new();
                let records_idx = sel.recv(&records);
                let timer_idx = timer_chan.as_ref().map(|chan| sel.recv(chan));

                let oper = sel.select();
                let idx = oper.index();

                if idx == records_idx {
                    match oper.recv(&records) {
                        Ok(Message::Record(record)) => engine.handle_write(&record),
                        Ok(Message::Shutdown) => {
                            engine.close();
                            let _ = shutdown.recv();
                            break 'outer;
                        }
                        Err(_) => {
                            engine.close();
                            break 'outer;
                        }
                    }
                } else if Some(idx) == timer_idx {
                    let _ = oper.recv(timer_chan.as_ref().expect("timer channel armed"));
                    next_deadline = engine.handle_timer_fire();
                } else {
                    unreachable!("Select only registers records and, optionally, the timer");
                }
            }
        })
        .expect("failed to spawn the rollsink worker thread")
}
