//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Pattern waits with idle-timeout semantics
//!
//! A wait runs in two phases. First it polls until the buffer holds anything
//! at all, giving up once `timeout` has passed without a single byte. Then it
//! polls the whole buffer for the requested patterns. Every poll that finds
//! the buffer length unchanged counts as idle; any growth resets the count.
//! The wait ends on a match or after `timeout / poll_interval` consecutive
//! idle polls.
//!
//! The timeout is measured from the last data received, not from the start of
//! the wait. A peer that keeps trickling unrelated output holds the wait open
//! for as long as it keeps talking.
//!
//! Both phases also end once the reader task has stopped, since the buffer can
//! no longer change.

use crate::ResponseBuffer;
use crate::SessionConfig;
use crate::reader::ReaderStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::trace;

/// Why a pattern wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// Pattern at this index was found
    Matched(usize),
    /// The buffer stayed unchanged for the whole timeout
    IdleTimeout,
    /// Nothing arrived before the timeout
    NoData,
    /// The reader stopped before any pattern appeared
    Closed,
}

pub(crate) struct WaitEngine<'a> {
    buffer: &'a ResponseBuffer,
    timeout: Duration,
    poll_interval: Duration,
    idle_limit: Option<u64>,
    reader: Option<Arc<ReaderStatus>>,
}

impl<'a> WaitEngine<'a> {
    pub(crate) fn new(
        buffer: &'a ResponseBuffer,
        config: &SessionConfig,
        reader: Option<Arc<ReaderStatus>>,
    ) -> Self {
        Self {
            buffer,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            idle_limit: config.idle_poll_limit(),
            reader,
        }
    }

    fn feed_alive(&self) -> bool {
        self.reader.as_ref().is_some_and(|status| status.is_alive())
    }

    /// Poll until the buffer is non-empty. Returns `false` if the timeout
    /// passed, or the reader stopped, with nothing received.
    pub(crate) async fn await_data(&self) -> bool {
        let deadline = (!self.timeout.is_zero()).then(|| Instant::now() + self.timeout);
        loop {
            if !self.buffer.is_empty() {
                return true;
            }
            if !self.feed_alive() {
                // The reader may have appended just before stopping.
                return !self.buffer.is_empty();
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Run both phases for `patterns`
    pub(crate) async fn wait_for(&self, patterns: &[&str]) -> WaitOutcome {
        if !self.await_data().await {
            return WaitOutcome::NoData;
        }

        let mut idle_polls = 0u64;
        let mut last_len = self.buffer.len();
        loop {
            let scan = self.buffer.scan(patterns);
            if let Some(index) = scan.matched {
                return WaitOutcome::Matched(index);
            }

            if scan.len == last_len {
                idle_polls += 1;
            } else {
                idle_polls = 0;
                last_len = scan.len;
            }
            trace!(len = scan.len, idle_polls, "Polled response buffer");

            if self.idle_limit.is_some_and(|limit| idle_polls >= limit) {
                return WaitOutcome::IdleTimeout;
            }
            if !self.feed_alive() {
                return match self.buffer.scan(patterns).matched {
                    Some(index) => WaitOutcome::Matched(index),
                    None => WaitOutcome::Closed,
                };
            }
            sleep(self.poll_interval).await;
        }
    }
}
