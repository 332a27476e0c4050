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

use async_trait::async_trait;
use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio_util::sync::CancellationToken;

/// Output half of a transport connection.
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Input half of a transport connection.
#[async_trait]
pub trait ByteSource: Send {
    /// Read whatever is currently available into `buf`, waiting until at
    /// least one byte arrives.
    ///
    /// Returns the number of bytes appended. `Ok(0)` marks the end of the
    /// stream.
    async fn read_chunk(&mut self, buf: &mut BytesMut) -> io::Result<usize>;
}

/// The error a pending read reports when its transport is closed locally.
#[must_use]
pub fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transport closed")
}

/// Adapts any [`AsyncRead`] into a [`ByteSource`] that can be closed from
/// the outside.
///
/// Cancelling the token handed to [`ClosableSource::new`] makes a pending
/// (and every later) read fail with [`closed_error`]. With an idle timeout
/// set, a read that sees no data in time fails with
/// [`io::ErrorKind::TimedOut`]; the source stays usable afterwards.
#[derive(Debug)]
pub struct ClosableSource<R> {
    inner: R,
    closed: CancellationToken,
    idle_timeout: Option<Duration>,
}

impl<R> ClosableSource<R> {
    /// Wrap `inner`, closing when `closed` is cancelled.
    pub fn new(inner: R, closed: CancellationToken) -> Self {
        Self {
            inner,
            closed,
            idle_timeout: None,
        }
    }

    /// Set the per-read idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Current per-read idle timeout.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Unwrap the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R> ByteSource for ClosableSource<R>
where
    R: AsyncRead + Send + Unpin,
{
    async fn read_chunk(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }
        let read = bounded(self.idle_timeout, self.inner.read_buf(buf));
        tokio::select! {
            biased;
            () = self.closed.cancelled() => Err(closed_error()),
            result = read => result,
        }
    }
}

async fn bounded<F>(limit: Option<Duration>, read: F) -> io::Result<usize>
where
    F: Future<Output = io::Result<usize>>,
{
    let Some(limit) = limit else {
        return read.await;
    };
    match tokio::time::timeout(limit, read).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no data received within {limit:?}"),
        )),
    }
}
