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

use crate::{ByteSink, ByteSource, ClosableSource, Transport, WindowSize};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Plain TCP transport.
///
/// Data is passed through untouched; no Telnet option negotiation is
/// performed. Terminal attributes handed to
/// [`Transport::configure_terminal`] are kept and exposed through
/// [`TcpTransport::terminal`] for layers that negotiate on top.
#[derive(Debug)]
pub struct TcpTransport {
    connect_timeout: Duration,
    idle_timeout: Option<Duration>,
    terminal: Option<(String, WindowSize)>,
    peer: Option<SocketAddr>,
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    closed: CancellationToken,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    /// Create a disconnected transport with a 10 second connect timeout
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: None,
            terminal: None,
            peer: None,
            reader: None,
            writer: None,
            closed: CancellationToken::new(),
        }
    }

    /// Set the connection timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Remote address of the current connection
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Terminal type and window size recorded by `configure_terminal`
    pub fn terminal(&self) -> Option<(&str, WindowSize)> {
        self.terminal
            .as_ref()
            .map(|(terminal_type, size)| (terminal_type.as_str(), *size))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    #[instrument(skip(self))]
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        if self.is_connected() {
            return Err(io::Error::other("transport already connected"));
        }

        let stream = match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {host}:{port} timed out"),
                ));
            }
        };
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        info!(peer = %peer, "TCP connection established");

        self.peer = Some(peer);
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.closed = CancellationToken::new();
        Ok(())
    }

    fn set_idle_timeout(&mut self, timeout: Option<Duration>) {
        self.idle_timeout = timeout;
    }

    fn configure_terminal(&mut self, terminal_type: &str, size: WindowSize) {
        debug!(terminal_type, size = %size, "Terminal attributes recorded");
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
        let Some(peer) = self.peer.take() else {
            return Ok(());
        };
        self.closed.cancel();
        self.reader = None;
        if let Some(mut writer) = self.writer.take() {
            // Peer may already be gone.
            let _ = writer.shutdown().await;
        }
        info!(peer = %peer, "TCP connection closed");
        Ok(())
    }

    fn peer(&self) -> Option<String> {
        self.peer.map(|peer| peer.to_string())
    }
}
