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

//! Error types for sessions and login hooks

use thiserror::Error;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Session error types
#[derive(Debug, Error)]
pub enum SessionError {
    /// Establishing the connection failed; nothing was left running
    #[error("Failed to connect to {address}: {source}")]
    Connection {
        /// The `host:port` that was dialed
        address: String,
        /// Underlying transport failure
        #[source]
        source: std::io::Error,
    },

    /// The established connection failed and has been closed
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// The login hook failed
    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    /// Operation requires a live connection
    #[error("Session is not connected")]
    NotConnected,

    /// `connect` was called on a live session
    #[error("Session is already connected")]
    AlreadyConnected,
}

impl SessionError {
    /// Check if the error concerns the connection's availability
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            SessionError::Connection { .. } | SessionError::NotConnected
        )
    }

    /// Check if the error ended an established connection
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}

/// Errors raised by a login hook
#[derive(Debug, Error)]
pub enum LoginError {
    /// The remote side refused the credentials
    #[error("Login rejected: {0}")]
    Rejected(String),

    /// An expected prompt never appeared
    #[error("Expected prompt not seen, received {0:?}")]
    PromptNotSeen(String),

    /// A session operation failed part way through the login exchange
    #[error("Session failure during login: {0}")]
    Session(#[source] Box<SessionError>),

    /// Any other login failure
    #[error("{0}")]
    Other(String),
}

impl From<SessionError> for LoginError {
    fn from(error: SessionError) -> Self {
        LoginError::Session(Box::new(error))
    }
}
