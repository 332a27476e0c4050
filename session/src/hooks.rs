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

//! Device hook traits

use crate::{LoginError, Session};
use async_trait::async_trait;
use teleprompt_transport::WindowSize;

/// Target-specific behaviour plugged into a [`Session`]
///
/// The session asks for the terminal attributes while connecting and hands
/// them to the transport. Everything else is invoked on demand. Only
/// [`login`](DeviceHooks::login) has no default.
///
/// # Example
///
/// ```no_run
/// use teleprompt_session::{DeviceHooks, LoginError, Session};
/// use async_trait::async_trait;
///
/// struct RouterHooks;
///
/// #[async_trait]
/// impl DeviceHooks for RouterHooks {
///     async fn login(&self, session: &Session) -> Result<(), LoginError> {
///         session.wait_for_pattern("Password:").await?;
///         session.send_command(&session.config().password).await?;
///         if session.wait_for(&["Router>"]).await?.contains("Router>") {
///             Ok(())
///         } else {
///             Err(LoginError::Rejected("no exec prompt".to_string()))
///         }
///     }
///
///     fn terminal_type(&self) -> String {
///         "VT220".to_string()
///     }
/// }
/// ```
#[async_trait]
pub trait DeviceHooks: Send + Sync + 'static {
    /// Run the login exchange on a freshly connected session
    async fn login(&self, session: &Session) -> Result<(), LoginError>;

    /// Terminal type advertised to the remote host
    fn terminal_type(&self) -> String {
        "VT100".to_string()
    }

    /// Window size advertised to the remote host
    fn window_size(&self) -> WindowSize {
        WindowSize::default()
    }

    /// Called when local echo should be switched on or off
    fn set_local_echo(&self, _enabled: bool) {}

    /// Called when the remote host signals end of record
    fn notify_end_of_record(&self) {}
}

/// Hooks for targets that need no authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLogin;

#[async_trait]
impl DeviceHooks for NoLogin {
    async fn login(&self, _session: &Session) -> Result<(), LoginError> {
        Ok(())
    }
}
