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

use crate::{ByteSink, ByteSource, WindowSize};
use async_trait::async_trait;
use std::io;
use std::time::Duration;

/// Connection lifecycle and byte streams for a single remote endpoint.
///
/// A transport is reusable: after [`Transport::disconnect`] it may be
/// connected again. Each successful [`Transport::connect`] makes exactly one
/// input half and one output half available; they are handed over (moved out)
/// by [`Transport::input_stream`] and [`Transport::output_stream`].
///
/// Any option negotiation the wire protocol requires happens inside the
/// transport. Callers only ever see application data.
#[async_trait]
pub trait Transport: Send {
    /// Open a connection to `host:port`.
    ///
    /// Fails if the transport is already connected.
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Set the socket-level idle timeout applied to reads on the input half.
    ///
    /// `None` disables the timeout. Takes effect for input halves handed out
    /// after the call.
    fn set_idle_timeout(&mut self, timeout: Option<Duration>);

    /// Record the terminal attributes to advertise to the remote host.
    ///
    /// Called before [`Transport::connect`]. Transports without terminal
    /// negotiation ignore it.
    fn configure_terminal(&mut self, _terminal_type: &str, _size: WindowSize) {}

    /// Take the input half of the current connection.
    ///
    /// A read pending on the returned source fails with
    /// [`io::ErrorKind::ConnectionAborted`] once the transport disconnects.
    fn input_stream(&mut self) -> io::Result<Box<dyn ByteSource>>;

    /// Take the output half of the current connection.
    fn output_stream(&mut self) -> io::Result<ByteSink>;

    /// Whether the transport currently holds an open connection.
    fn is_connected(&self) -> bool;

    /// Close the current connection. Closing a closed transport is a no-op.
    async fn disconnect(&mut self) -> io::Result<()>;

    /// Human readable description of the remote endpoint, if connected.
    fn peer(&self) -> Option<String> {
        None
    }
}
