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

//! # Teleprompt Transports
//!
//! Byte-stream transports consumed by a Teleprompt session. A transport owns
//! the connection lifecycle and hands out two independent halves:
//!
//! - an input half implementing [`ByteSource`], read by the session's reader task
//! - an output half, a boxed [`tokio::io::AsyncWrite`] ([`ByteSink`]), used by
//!   the session's command writer
//!
//! Closing a transport makes any read pending on its input half fail
//! immediately with [`std::io::ErrorKind::ConnectionAborted`], which is how a
//! session stops its reader task.
//!
//! ## Provided Transports
//!
//! - [`TcpTransport`] - plain TCP via Tokio
//! - [`MemoryTransport`] - in-process transport over [`tokio::io::duplex`],
//!   paired with a [`MemoryListener`] that plays the remote host
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use teleprompt_transport::{TcpTransport, Transport};
//! use bytes::BytesMut;
//! use std::time::Duration;
//!
//! # async fn example() -> std::io::Result<()> {
//! let mut transport = TcpTransport::new();
//! transport.connect("localhost", 23).await?;
//! transport.set_idle_timeout(Some(Duration::from_secs(30)));
//!
//! let mut input = transport.input_stream()?;
//! let mut buffer = BytesMut::with_capacity(4096);
//! let read = input.read_chunk(&mut buffer).await?;
//! println!("received {read} bytes");
//!
//! transport.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod memory;
mod source;
mod tcp;
mod terminal;
mod transport;

pub use self::memory::{MemoryListener, MemoryTransport, RemoteEnd};
pub use self::source::{ByteSink, ByteSource, ClosableSource, closed_error};
pub use self::tcp::TcpTransport;
pub use self::terminal::WindowSize;
pub use self::transport::Transport;
