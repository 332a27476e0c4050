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

//! Background reader task
//!
//! One reader runs per connection. It pumps whatever the transport delivers
//! into the [`ResponseBuffer`] and does nothing else. It stops on end of
//! stream, on a local close, or on the first unexpected I/O error, which is
//! parked in the session's fault slot for the caller to collect.

use crate::ResponseBuffer;
use bytes::BytesMut;
use metrics::counter;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use teleprompt_transport::ByteSource;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span, trace, warn};

/// Slot holding the last unreported transport failure
pub(crate) type FaultSlot = Arc<Mutex<Option<io::Error>>>;

/// Park `error` in `slot`, replacing anything not yet collected
pub(crate) fn record_fault(slot: &FaultSlot, error: io::Error) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
}

/// Collect the parked failure, if any
pub(crate) fn take_fault(slot: &FaultSlot) -> Option<io::Error> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Flags shared between a reader task and its session
#[derive(Debug)]
pub(crate) struct ReaderStatus {
    alive: AtomicBool,
    closing: AtomicBool,
}

impl ReaderStatus {
    pub(crate) fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            closing: AtomicBool::new(false),
        }
    }

    /// Whether the task is still pumping
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

/// Handle to a running reader task
#[derive(Debug)]
pub(crate) struct ReaderLoop {
    handle: JoinHandle<()>,
    status: Arc<ReaderStatus>,
}

impl ReaderLoop {
    /// Start pumping `source` into `buffer`
    pub(crate) fn spawn(
        source: Box<dyn ByteSource>,
        buffer: ResponseBuffer,
        fault: FaultSlot,
        chunk_size: usize,
        peer: &str,
    ) -> Self {
        let status = Arc::new(ReaderStatus::new());
        let span = info_span!("reader", peer = %peer);
        let handle = tokio::spawn(
            pump(source, buffer, fault, Arc::clone(&status), chunk_size).instrument(span),
        );
        Self { handle, status }
    }

    pub(crate) fn status(&self) -> Arc<ReaderStatus> {
        Arc::clone(&self.status)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.status.is_alive()
    }

    /// Mark errors from here on as caused by a local close
    pub(crate) fn begin_close(&self) {
        self.status.closing.store(true, Ordering::Release);
    }

    /// Wait for the task to finish, aborting it after `grace`
    pub(crate) async fn join(mut self, grace: Duration) {
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(Err(e)) if e.is_panic() => warn!(error = %e, "Reader task failed"),
            Ok(_) => {}
            Err(_) => {
                warn!(?grace, "Reader did not stop in time, aborting");
                self.handle.abort();
                self.status.alive.store(false, Ordering::Release);
            }
        }
    }

    /// Stop the task without waiting
    pub(crate) fn abort(&self) {
        self.begin_close();
        self.handle.abort();
        self.status.alive.store(false, Ordering::Release);
    }
}

/// Clears `alive` however the task ends, panics included
struct AliveGuard(Arc<ReaderStatus>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.alive.store(false, Ordering::Release);
    }
}

async fn pump(
    mut source: Box<dyn ByteSource>,
    buffer: ResponseBuffer,
    fault: FaultSlot,
    status: Arc<ReaderStatus>,
    chunk_size: usize,
) {
    let _alive = AliveGuard(Arc::clone(&status));
    debug!("Reader started");
    let mut chunk = BytesMut::with_capacity(chunk_size);
    loop {
        chunk.clear();
        chunk.reserve(chunk_size);
        match source.read_chunk(&mut chunk).await {
            Ok(0) => {
                debug!("End of stream");
                break;
            }
            Ok(read) => {
                trace!(bytes = read, "Received chunk");
                counter!("teleprompt.bytes.received").increment(read as u64);
                buffer.append(&chunk);
            }
            Err(_) if status.is_closing() => {
                debug!("Transport closed locally");
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                trace!("Transport idle");
            }
            Err(e) => {
                error!(error = %e, "Transport failure");
                counter!("teleprompt.errors.transport").increment(1);
                record_fault(&fault, e);
                break;
            }
        }
    }
    debug!("Reader stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use teleprompt_transport::ClosableSource;
    use tokio::io::{AsyncWriteExt, duplex};
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    /// Replays a fixed sequence of read results, then reports end of stream
    struct Scripted(VecDeque<io::Result<&'static [u8]>>);

    #[async_trait]
    impl ByteSource for Scripted {
        async fn read_chunk(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(data)) => {
                    buf.extend_from_slice(data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    async fn wait_stopped(reader: &ReaderLoop) {
        for _ in 0..200 {
            if !reader.is_alive() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("reader did not stop");
    }

    #[tokio::test]
    async fn test_pumps_chunks_in_order_until_end_of_stream() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();
        let source = Scripted(vec![Ok(&b"Router"[..]), Ok(&b">"[..]), Ok(&b" "[..])].into());

        let reader = ReaderLoop::spawn(Box::new(source), buffer.clone(), fault.clone(), 64, "test");
        wait_stopped(&reader).await;

        assert_eq!(&buffer.drain()[..], b"Router> ");
        assert!(take_fault(&fault).is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unexpected_error_is_recorded() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();
        let source = Scripted(
            vec![
                Ok(&b"partial"[..]),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
                Ok(&b"never read"[..]),
            ]
            .into(),
        );

        let reader = ReaderLoop::spawn(Box::new(source), buffer.clone(), fault.clone(), 64, "test");
        wait_stopped(&reader).await;

        assert_eq!(&buffer.drain()[..], b"partial");
        let err = take_fault(&fault).expect("fault recorded");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(take_fault(&fault).is_none(), "fault is reported once");
        assert!(logs_contain("Transport failure"));
    }

    #[tokio::test]
    async fn test_idle_timeouts_are_not_faults() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();
        let source = Scripted(
            vec![
                Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
                Ok(&b"late"[..]),
            ]
            .into(),
        );

        let reader = ReaderLoop::spawn(Box::new(source), buffer.clone(), fault.clone(), 64, "test");
        wait_stopped(&reader).await;

        assert_eq!(&buffer.drain()[..], b"late");
        assert!(take_fault(&fault).is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_local_close_is_benign() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();
        let (local, mut remote) = duplex(64);
        let token = CancellationToken::new();
        let source = ClosableSource::new(local, token.clone());

        let reader = ReaderLoop::spawn(Box::new(source), buffer.clone(), fault.clone(), 64, "test");
        remote.write_all(b"banner").await.unwrap();
        while buffer.len() < 6 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(reader.is_alive());

        reader.begin_close();
        token.cancel();
        reader.join(Duration::from_secs(1)).await;

        assert!(take_fault(&fault).is_none());
        assert!(logs_contain("Transport closed locally"));
        assert!(!logs_contain("Transport failure"));
    }

    /// Source whose first read panics
    struct Exploding;

    #[async_trait]
    impl ByteSource for Exploding {
        async fn read_chunk(&mut self, _buf: &mut BytesMut) -> io::Result<usize> {
            panic!("source exploded");
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_panicking_source_stops_reader() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();

        let reader = ReaderLoop::spawn(Box::new(Exploding), buffer.clone(), fault.clone(), 64, "test");
        wait_stopped(&reader).await;
        assert!(!reader.is_alive());

        // A zero-timeout wait must not poll forever on the dead reader
        let config = crate::SessionConfig::new("test", 23).with_timeout(Duration::ZERO);
        let engine = crate::wait::WaitEngine::new(&buffer, &config, Some(reader.status()));
        let outcome = tokio::time::timeout(Duration::from_secs(5), engine.wait_for(&["#"])).await;
        assert_eq!(outcome.ok(), Some(crate::wait::WaitOutcome::NoData));

        reader.join(Duration::from_secs(1)).await;
        assert!(logs_contain("Reader task failed"));
        assert!(take_fault(&fault).is_none());
    }

    #[tokio::test]
    async fn test_abort_stops_blocked_reader() {
        let buffer = ResponseBuffer::new();
        let fault = FaultSlot::default();
        let (local, _remote) = duplex(64);
        let source = ClosableSource::new(local, CancellationToken::new());

        let reader = ReaderLoop::spawn(Box::new(source), buffer, fault.clone(), 64, "test");
        assert!(reader.is_alive());
        reader.abort();
        assert!(!reader.is_alive());
        reader.join(Duration::from_secs(1)).await;
        assert!(take_fault(&fault).is_none());
    }
}
