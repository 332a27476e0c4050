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

//! Session configuration

use std::fmt;
use std::time::Duration;

/// Telnet session configuration
#[derive(Clone)]
pub struct SessionConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// Remote port
    pub port: u16,

    /// Username handed to the login hook
    pub username: String,

    /// Password handed to the login hook
    pub password: String,

    /// Inactivity timeout for waits. Zero never times out.
    pub timeout: Duration,

    /// Interval at which waits re-examine the response buffer
    pub poll_interval: Duration,

    /// Upper bound on establishing the transport connection
    pub connect_timeout: Duration,

    /// Appended to every command sent with `send_command`
    pub line_terminator: String,

    /// Capacity reserved for each read from the transport
    pub read_buffer_size: usize,

    /// How long `disconnect` waits for the reader task before aborting it
    pub disconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(5),
            connect_timeout: Duration::from_secs(10),
            line_terminator: "\r\n".to_string(),
            read_buffer_size: 8192,
            disconnect_grace: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration with the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the login credentials
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the inactivity timeout (zero disables it)
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval, clamped to at least one millisecond
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the connection timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the line terminator used by `send_command`
    #[must_use]
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Set the per-read buffer capacity
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the grace period granted to the reader task on disconnect
    #[must_use]
    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    /// Get the remote address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Number of consecutive unchanged polls that make up the inactivity
    /// timeout, or `None` when the timeout is disabled.
    pub fn idle_poll_limit(&self) -> Option<u64> {
        if self.timeout.is_zero() {
            return None;
        }
        let poll = self.poll_interval.as_nanos().max(1);
        let limit = (self.timeout.as_nanos() / poll).max(1);
        Some(u64::try_from(limit).unwrap_or(u64::MAX))
    }

    /// Idle timeout handed to the transport
    pub fn transport_idle_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("connect_timeout", &self.connect_timeout)
            .field("line_terminator", &self.line_terminator)
            .field("read_buffer_size", &self.read_buffer_size)
            .field("disconnect_grace", &self.disconnect_grace)
            .finish()
    }
}
