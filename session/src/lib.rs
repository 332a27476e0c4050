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

//! # Teleprompt Session
//!
//! Expect-style Telnet sessions: connect to a host, send commands and wait
//! for the output you expect.
//!
//! ## Features
//!
//! - **Background Reader** - One task per connection copies everything the
//!   host sends into a shared response buffer
//! - **Idle-Timeout Waits** - Waits return on the first matching pattern, or
//!   once the host has been silent for the configured timeout
//! - **Pluggable Login** - Device hooks supply the login exchange and the
//!   terminal attributes; [`PromptLogin`] covers the common case
//! - **Reconnectable** - A session can connect again after a disconnect
//!
//! ## Quick Start
//!
//! ```no_run
//! use teleprompt_session::{PromptLogin, Session, SessionConfig, TcpTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("192.0.2.10", 23)
//!         .with_credentials("admin", "secret")
//!         .with_timeout(Duration::from_secs(5));
//!
//!     let session = Session::new(
//!         config,
//!         Box::new(TcpTransport::new()),
//!         Arc::new(PromptLogin::new().with_shell_prompts(["Router#"])),
//!     );
//!     session.connect_and_login().await?;
//!
//!     session.send_command("show version").await?;
//!     let output = session.wait_for(&["Router#"]).await?;
//!     println!("{output}");
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Timeouts
//!
//! The timeout is an idle timeout. It restarts whenever new data arrives, so
//! a host that keeps printing unrelated output keeps a wait open. A zero
//! timeout waits until a pattern appears or the connection closes.

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod buffer;
mod config;
mod error;
mod hooks;
mod prompt;
mod reader;
mod session;
mod wait;

pub use self::buffer::{ResponseBuffer, Scan};
pub use self::config::SessionConfig;
pub use self::error::{LoginError, Result, SessionError};
pub use self::hooks::{DeviceHooks, NoLogin};
pub use self::prompt::PromptLogin;
pub use self::session::{ConnectionState, Session};

// Re-export transport types
pub use teleprompt_transport::{
    ByteSink, ByteSource, MemoryListener, MemoryTransport, RemoteEnd, TcpTransport, Transport,
    WindowSize,
};
