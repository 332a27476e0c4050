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

//! In-process transport backed by [`tokio::io::duplex`].
//!
//! Every successful connect creates a fresh duplex pipe. The local half stays
//! with the [`MemoryTransport`]; the remote half is delivered to the paired
//! [`MemoryListener`] as a [`RemoteEnd`], which plays the part of the remote
//! host. Dropping the listener makes further connects fail with
//! [`io::ErrorKind::ConnectionRefused`].

use crate::{ByteSink, ByteSource, ClosableSource, Transport, WindowSize};
use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Remote side of an in-process connection.
#[derive(Debug)]
pub struct RemoteEnd {
    /// Host name the local side connected to
    pub host: String,
    /// Port the local side connected to
    pub port: u16,
    /// Terminal attributes the local side advertised, if any
    pub terminal: Option<(String, WindowSize)>,
    /// The raw pipe
    pub stream: DuplexStream,
}

impl RemoteEnd {
    /// Write `text` to the local side and flush.
    pub async fn send(&mut self, text: &str) -> io::Result<()> {
        self.send_bytes(text.as_bytes()).await
    }

    /// Write raw bytes to the local side and flush.
    pub async fn send_bytes(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Wait for the next bytes written by the local side.
    ///
    /// Returns an empty string once the local side has closed.
    pub async fn receive(&mut self) -> io::Result<String> {
        let mut buf = BytesMut::with_capacity(1024);
        self.stream.read_buf(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Read until `needle` has been received, returning everything read.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] if the local side closes first.
    pub async fn receive_until(&mut self, needle: &str) -> io::Result<String> {
        let mut received = String::new();
        while !received.contains(needle) {
            let chunk = self.receive().await?;
            if chunk.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("closed before {needle:?} arrived"),
                ));
            }
            received.push_str(&chunk);
        }
        Ok(received)
    }
}

/// Accepts the remote ends of connections made by a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<RemoteEnd>,
}

impl MemoryListener {
    /// Wait for the next connection. Returns `None` once the transport is dropped.
    pub async fn accept(&mut self) -> Option<RemoteEnd> {
        self.incoming.recv().await
    }
}

/// In-process [`Transport`] for tests and demonstrations.
#[derive(Debug)]
pub struct MemoryTransport {
    capacity: usize,
    refusing: bool,
    idle_timeout: Option<Duration>,
    terminal: Option<(String, WindowSize)>,
    outgoing: mpsc::UnboundedSender<RemoteEnd>,
    peer: Option<String>,
    reader: Option<ReadHalf<DuplexStream>>,
    writer: Option<WriteHalf<DuplexStream>>,
    closed: CancellationToken,
}

impl MemoryTransport {
    /// Create a transport and its listener. `capacity` is the pipe buffer
    /// size in bytes for each direction.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, MemoryListener) {
        let (outgoing, incoming) = mpsc::unbounded_channel();
        let transport = Self {
            capacity,
            refusing: false,
            idle_timeout: None,
            terminal: None,
            outgoing,
            peer: None,
            reader: None,
            writer: None,
            closed: CancellationToken::new(),
        };
        (transport, MemoryListener { incoming })
    }

    /// Refuse (or accept again) subsequent connection attempts.
    pub fn set_refusing(&mut self, refusing: bool) {
        self.refusing = refusing;
    }

    /// Idle timeout currently applied to new input halves
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        if self.is_connected() {
            return Err(io::Error::other("transport already connected"));
        }
        if self.refusing {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("{host}:{port} refused the connection"),
            ));
        }

        let (local, remote) = tokio::io::duplex(self.capacity);
        let remote = RemoteEnd {
            host: host.to_string(),
            port,
            terminal: self.terminal.clone(),
            stream: remote,
        };
        self.outgoing.send(remote).map_err(|_| {
            io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("nothing is listening on {host}:{port}"),
            )
        })?;

        let (reader, writer) = tokio::io::split(local);
        self.peer = Some(format!("memory://{host}:{port}"));
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.closed = CancellationToken::new();
        debug!(host, port, "In-memory connection established");
        Ok(())
    }

    fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        self.idle_timeout = timeout;
    }

    fn configure_terminal(&mut self, terminal_type: &str, size: WindowSize) {
        self.terminal = Some((terminal_type.to_string(), size));
    }

    fn input_stream(&mut self) -> io::Result<Box<dyn ByteSource>> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no input stream"))?;
        Ok(Box::new(
            ClosableSource::new(reader, self.closed.clone()).with_idle_timeout(self.idle_timeout),
        ))
    }

    fn output_stream(&mut self) -> io::Result<ByteSink> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no output stream"))?;
        Ok(Box::new(writer))
    }

    fn is_connected(&self) -> bool {
        self.peer.is_some() && !self.closed.is_cancelled()
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        if self.peer.take().is_none() {
            return Ok(());
        }
        self.closed.cancel();
        self.reader = None;
        self.writer = None;
        debug!("In-memory connection closed");
        Ok(())
    }

    fn peer(&self) -> Option<String> {
        self.peer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryTransport;
    use crate::{ByteSource, Transport, WindowSize};
    use bytes::BytesMut;
    use std::io;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn connect_delivers_remote_end() {
        let (mut transport, mut listener) = MemoryTransport::new(1024);
        transport.configure_terminal("vt100", WindowSize::new(100, 30));
        transport.connect("router", 23).await.unwrap();

        let mut remote = listener.accept().await.unwrap();
        assert_eq!(remote.host, "router");
        assert_eq!(remote.port, 23);
        assert_eq!(
            remote.terminal,
            Some(("vt100".to_string(), WindowSize::new(100, 30)))
        );
        assert!(transport.is_connected());
        assert_eq!(transport.peer().as_deref(), Some("memory://router:23"));

        remote.send("banner").await.unwrap();
        let mut input = transport.input_stream().unwrap();
        let mut buf = BytesMut::with_capacity(64);
        input.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..], b"banner");

        let mut output = transport.output_stream().unwrap();
        output.write_all(b"show version\r\n").await.unwrap();
        output.flush().await.unwrap();
        assert_eq!(remote.receive().await.unwrap(), "show version\r\n");
    }

    #[tokio::test]
    async fn refused_connection() {
        let (mut transport, _listener) = MemoryTransport::new(1024);
        transport.set_refusing(true);

        let err = transport.connect("router", 23).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn dropped_listener_refuses() {
        let (mut transport, listener) = MemoryTransport::new(1024);
        drop(listener);

        let err = transport.connect("router", 23).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn disconnect_aborts_input_and_allows_reconnect() {
        let (mut transport, mut listener) = MemoryTransport::new(1024);
        transport.connect("router", 23).await.unwrap();
        let _remote = listener.accept().await.unwrap();
        let mut input = transport.input_stream().unwrap();

        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected());

        let mut buf = BytesMut::with_capacity(64);
        let err = input.read_chunk(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);

        transport.connect("router", 23).await.unwrap();
        assert!(transport.is_connected());
        assert!(listener.accept().await.is_some());
    }

    #[tokio::test]
    async fn streams_are_handed_out_once() {
        let (mut transport, _listener) = MemoryTransport::new(1024);
        transport.connect("router", 23).await.unwrap();

        assert!(transport.input_stream().is_ok());
        assert_eq!(
            transport.input_stream().err().map(|e| e.kind()),
            Some(io::ErrorKind::NotConnected)
        );
        assert!(transport.output_stream().is_ok());
        assert!(transport.output_stream().is_err());
    }
}
