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

//! Shared accumulator for received data
//!
//! The reader task is the only writer and only ever appends. Consumers either
//! peek at the front of the buffer or drain all of it at once. Every operation
//! takes the lock exactly once, so a drain can never observe half of an
//! append and a [`Scan`] always reports the length of the content it
//! searched.

use bytes::{Bytes, BytesMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Result of searching the buffer for patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    /// Buffer length at the time of the search
    pub len: usize,
    /// Index of the first pattern (in argument order) that was found
    pub matched: Option<usize>,
}

/// Mutex-guarded byte buffer shared between a reader task and its consumers
#[derive(Debug, Clone, Default)]
pub struct ResponseBuffer {
    inner: Arc<Mutex<BytesMut>>,
}

impl ResponseBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received chunk
    pub fn append(&self, chunk: &[u8]) {
        self.lock().extend_from_slice(chunk);
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy up to `max` bytes from the front of the buffer without consuming
    /// them. Returns `None` when the buffer is empty.
    pub fn peek(&self, max: usize) -> Option<Bytes> {
        let buffer = self.lock();
        if buffer.is_empty() {
            return None;
        }
        let end = max.min(buffer.len());
        Some(Bytes::copy_from_slice(&buffer[..end]))
    }

    /// Take the entire content, leaving the buffer empty
    pub fn drain(&self) -> Bytes {
        self.lock().split().freeze()
    }

    /// Discard the entire content, returning how many bytes were dropped
    pub fn clear(&self) -> usize {
        let mut buffer = self.lock();
        let dropped = buffer.len();
        buffer.clear();
        dropped
    }

    /// Search the whole buffer for any of `patterns`.
    ///
    /// Matching is a literal, case-sensitive substring search. An empty
    /// pattern matches any buffer.
    pub fn scan(&self, patterns: &[&str]) -> Scan {
        let buffer = self.lock();
        let matched = patterns
            .iter()
            .position(|pattern| contains(&buffer, pattern.as_bytes()));
        Scan {
            len: buffer.len(),
            matched,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BytesMut> {
        // Appends and drains leave the buffer consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Literal substring test
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
