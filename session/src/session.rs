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

//! Session lifecycle, waits and command writer

use crate::reader::{FaultSlot, ReaderLoop, ReaderStatus, take_fault};
use crate::wait::{WaitEngine, WaitOutcome};
use crate::{DeviceHooks, LoginError, ResponseBuffer, Result, SessionConfig, SessionError};
use bytes::Bytes;
use metrics::{counter, gauge};
use std::fmt;
use std::io;
use std::sync::Arc;
use teleprompt_transport::{ByteSink, Transport, WindowSize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, or the remote side has gone away
    Disconnected,
    /// Connected with a running reader
    Connected,
}

/// Everything that lives exactly as long as one connection
struct Link {
    reader: ReaderLoop,
    peer: String,
    /// Cancelled on release to interrupt pending writes
    closed: CancellationToken,
}

/// One logical connection to a remote host
///
/// Connecting starts a background reader that copies everything the host
/// sends into a shared response buffer. The caller then alternates
/// [`send_command`](Session::send_command) with
/// [`wait_for`](Session::wait_for) or
/// [`last_response`](Session::last_response), each of which drains the whole
/// buffer. A session can be reconnected after it has been disconnected.
///
/// All operations take `&self`, so a session can be shared behind an [`Arc`].
/// The transport lock is always taken before the link lock, and the link
/// lock before the writer lock. Writes hold only the writer lock while they
/// wait on the sink, so a stalled write never blocks `disconnect`.
pub struct Session {
    config: SessionConfig,
    hooks: Arc<dyn DeviceHooks>,
    transport: Mutex<Box<dyn Transport>>,
    link: Mutex<Option<Link>>,
    writer: Mutex<Option<ByteSink>>,
    buffer: ResponseBuffer,
    fault: FaultSlot,
}

impl Session {
    /// Create a disconnected session
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        hooks: Arc<dyn DeviceHooks>,
    ) -> Self {
        Self {
            config,
            hooks,
            transport: Mutex::new(transport),
            link: Mutex::new(None),
            writer: Mutex::new(None),
            buffer: ResponseBuffer::new(),
            fault: FaultSlot::default(),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to the configured host and start the reader.
    ///
    /// Anything left in the response buffer from a previous connection is
    /// discarded. On failure the transport is closed again and no reader is
    /// left running.
    #[instrument(skip(self), fields(address = %self.config.address()))]
    pub async fn connect(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        let mut link = self.link.lock().await;

        if let Some(stale) = link.take() {
            if stale.reader.is_alive() {
                *link = Some(stale);
                return Err(SessionError::AlreadyConnected);
            }
            debug!(peer = %stale.peer, "Releasing closed connection");
            if let Err(e) = self.release(&mut **transport, stale).await {
                debug!(error = %e, "Closing stale transport failed");
            }
        }

        let dropped = self.buffer.clear();
        if dropped > 0 {
            debug!(bytes = dropped, "Discarded unread data");
        }
        if let Some(fault) = take_fault(&self.fault) {
            debug!(error = %fault, "Discarded uncollected transport failure");
        }

        let address = self.config.address();
        transport.configure_terminal(&self.hooks.terminal_type(), self.hooks.window_size());
        let connected = timeout(
            self.config.connect_timeout,
            transport.connect(&self.config.host, self.config.port),
        )
        .await
        .unwrap_or_else(|_| {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection attempt timed out",
            ))
        });
        if let Err(source) = connected {
            warn!(error = %source, "Connection failed");
            Self::abandon(&mut **transport).await;
            return Err(SessionError::Connection { address, source });
        }

        transport.set_idle_timeout(self.config.transport_idle_timeout());
        let streams = match transport.input_stream() {
            Ok(source) => transport.output_stream().map(|sink| (source, sink)),
            Err(e) => Err(e),
        };
        let (source, sink) = match streams {
            Ok(streams) => streams,
            Err(source) => {
                warn!(error = %source, "Transport did not provide its streams");
                Self::abandon(&mut **transport).await;
                return Err(SessionError::Connection { address, source });
            }
        };

        let peer = transport.peer().unwrap_or(address);
        let reader = ReaderLoop::spawn(
            source,
            self.buffer.clone(),
            Arc::clone(&self.fault),
            self.config.read_buffer_size,
            &peer,
        );
        gauge!("teleprompt.sessions.active").increment(1.0);
        info!(%peer, "Connected");
        *self.writer.lock().await = Some(sink);
        *link = Some(Link {
            reader,
            peer,
            closed: CancellationToken::new(),
        });
        Ok(())
    }

    /// Close the connection. Does nothing when already disconnected.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        let Some(link) = self.link.lock().await.take() else {
            debug!("Already disconnected");
            return Ok(());
        };
        self.release(&mut **transport, link).await
    }

    async fn release(&self, transport: &mut dyn Transport, link: Link) -> Result<()> {
        let Link {
            reader,
            peer,
            closed,
        } = link;
        reader.begin_close();
        closed.cancel();
        drop(self.writer.lock().await.take());
        let closed = transport.disconnect().await;
        reader.join(self.config.disconnect_grace).await;
        gauge!("teleprompt.sessions.active").decrement(1.0);
        info!(%peer, "Disconnected");
        closed.map_err(SessionError::Transport)
    }

    async fn abandon(transport: &mut dyn Transport) {
        if let Err(e) = transport.disconnect().await {
            debug!(error = %e, "Closing half-open transport failed");
        }
    }

    /// Whether the transport is up and the reader is still receiving
    pub async fn is_connected(&self) -> bool {
        let transport = self.transport.lock().await;
        let link = self.link.lock().await;
        transport.is_connected() && link.as_ref().is_some_and(|link| link.reader.is_alive())
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        if self.is_connected().await {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Address of the connected peer
    pub async fn peer(&self) -> Option<String> {
        self.link.lock().await.as_ref().map(|link| link.peer.clone())
    }

    /// Copy up to `max` buffered bytes without consuming them or waiting.
    ///
    /// Returns `None` when nothing is buffered.
    pub fn read(&self, max: usize) -> Option<Bytes> {
        self.buffer.peek(max)
    }

    /// Wait until anything has been received, then drain the buffer.
    ///
    /// Returns an empty string if nothing arrives within the timeout.
    #[instrument(skip(self))]
    pub async fn last_response(&self) -> Result<String> {
        let status = self.reader_status().await?;
        let engine = WaitEngine::new(&self.buffer, &self.config, status);
        if !engine.await_data().await {
            debug!("No data before timeout");
        }
        self.collect().await
    }

    /// Wait for any of `patterns` to appear and drain the buffer.
    ///
    /// The returned text is everything received since the last drain, not
    /// just the match. The wait ends early on a match and otherwise once
    /// nothing new has arrived for the configured timeout.
    #[instrument(skip(self))]
    pub async fn wait_for(&self, patterns: &[&str]) -> Result<String> {
        let status = self.reader_status().await?;
        let engine = WaitEngine::new(&self.buffer, &self.config, status);
        match engine.wait_for(patterns).await {
            WaitOutcome::Matched(index) => {
                counter!("teleprompt.wait.matched").increment(1);
                debug!(pattern = %patterns[index], "Pattern matched");
            }
            WaitOutcome::IdleTimeout => {
                counter!("teleprompt.wait.idle_timeouts").increment(1);
                debug!("Idle timeout");
            }
            WaitOutcome::NoData => {
                counter!("teleprompt.wait.idle_timeouts").increment(1);
                debug!("No data before timeout");
            }
            WaitOutcome::Closed => debug!("Connection closed while waiting"),
        }
        self.collect().await
    }

    /// Wait for a single pattern
    pub async fn wait_for_pattern(&self, pattern: &str) -> Result<String> {
        self.wait_for(&[pattern]).await
    }

    /// Wait for `patterns` and split the response into lines.
    ///
    /// Failures are logged and produce an empty list.
    pub async fn multi_line_response(&self, patterns: &[&str]) -> Vec<String> {
        match self.wait_for(patterns).await {
            Ok(response) => response.lines().map(ToString::to_string).collect(),
            Err(e) => {
                warn!(error = %e, "Discarding failed response");
                Vec::new()
            }
        }
    }

    async fn reader_status(&self) -> Result<Option<Arc<ReaderStatus>>> {
        let status = self.link.lock().await.as_ref().map(|link| link.reader.status());
        if status.is_none() && self.buffer.is_empty() {
            return Err(SessionError::NotConnected);
        }
        Ok(status)
    }

    async fn collect(&self) -> Result<String> {
        let drained = self.buffer.drain();
        if drained.is_empty() {
            if let Some(fault) = take_fault(&self.fault) {
                if let Err(e) = self.disconnect().await {
                    debug!(error = %e, "Closing failed transport");
                }
                return Err(SessionError::Transport(fault));
            }
        }
        Ok(String::from_utf8_lossy(&drained).into_owned())
    }

    /// Collect a transport failure seen by the reader, if one is pending
    pub fn take_fault(&self) -> Option<io::Error> {
        take_fault(&self.fault)
    }

    /// Write `data` and flush it.
    ///
    /// A failed write closes the connection, and so does writing after the
    /// reader has stopped. A pending write is abandoned when the session is
    /// disconnected.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let closed = match self.link.lock().await.as_ref() {
            None => return Err(SessionError::NotConnected),
            Some(active) if active.reader.is_alive() => Some(active.closed.clone()),
            Some(active) => {
                debug!(peer = %active.peer, "Reader has stopped, closing connection");
                None
            }
        };
        let Some(closed) = closed else {
            return Err(self.close_stopped().await);
        };

        let written = tokio::select! {
            () = closed.cancelled() => {
                debug!("Write abandoned by disconnect");
                return Err(SessionError::NotConnected);
            }
            written = self.write_sink(data) => written,
        };

        match written {
            None => Err(SessionError::NotConnected),
            Some(Ok(())) => {
                trace!("Sent");
                counter!("teleprompt.bytes.sent").increment(data.len() as u64);
                Ok(())
            }
            Some(Err(e)) => {
                error!(error = %e, "Write failed");
                counter!("teleprompt.errors.transport").increment(1);
                if let Err(close) = self.disconnect().await {
                    debug!(error = %close, "Closing failed transport");
                }
                Err(SessionError::Transport(e))
            }
        }
    }

    async fn write_sink(&self, data: &[u8]) -> Option<io::Result<()>> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut()?;
        let written = async {
            sink.write_all(data).await?;
            sink.flush().await
        }
        .await;
        Some(written)
    }

    /// Tear down a connection whose reader has already stopped
    async fn close_stopped(&self) -> SessionError {
        if let Err(e) = self.disconnect().await {
            debug!(error = %e, "Closing stopped transport");
        }
        take_fault(&self.fault).map_or(SessionError::NotConnected, SessionError::Transport)
    }

    /// Send `command` followed by the configured line terminator
    pub async fn send_command(&self, command: &str) -> Result<()> {
        let mut line = String::with_capacity(command.len() + self.config.line_terminator.len());
        line.push_str(command);
        line.push_str(&self.config.line_terminator);
        self.write(line.as_bytes()).await
    }

    /// Run the device login hook
    pub async fn login(&self) -> std::result::Result<(), LoginError> {
        self.hooks.login(self).await
    }

    /// Connect and log in, closing the connection again if the login fails
    pub async fn connect_and_login(&self) -> Result<()> {
        self.connect().await?;
        if let Err(e) = self.login().await {
            warn!(error = %e, "Login failed");
            if let Err(close) = self.disconnect().await {
                debug!(error = %close, "Closing after failed login");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Terminal type supplied by the device hooks
    pub fn terminal_type(&self) -> String {
        self.hooks.terminal_type()
    }

    /// Window size supplied by the device hooks
    pub fn window_size(&self) -> WindowSize {
        self.hooks.window_size()
    }

    /// Forward a local echo change to the device hooks
    pub fn set_local_echo(&self, enabled: bool) {
        self.hooks.set_local_echo(enabled);
    }

    /// Forward an end-of-record notification to the device hooks
    pub fn notify_end_of_record(&self) {
        self.hooks.notify_end_of_record();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.closed.cancel();
            link.reader.abort();
            gauge!("teleprompt.sessions.active").decrement(1.0);
            debug!(peer = %link.peer, "Session dropped while connected");
        }
    }
}
