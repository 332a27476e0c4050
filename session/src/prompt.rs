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

//! Prompt-driven login for Unix-style hosts and network devices

use crate::{DeviceHooks, LoginError, Session};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use teleprompt_transport::WindowSize;
use tracing::{debug, instrument, warn};

/// [`DeviceHooks`] that answer the usual `login:` / `Password:` exchange
///
/// The username and password come from the session's configuration. After
/// the username is sent, a shell prompt is accepted straight away so hosts
/// that do not ask for a password also work. Any failure marker in a response
/// rejects the login, as does being asked for the username a second time.
#[derive(Debug)]
pub struct PromptLogin {
    login_prompts: Vec<String>,
    password_prompts: Vec<String>,
    shell_prompts: Vec<String>,
    failure_markers: Vec<String>,
    terminal_type: String,
    window_size: WindowSize,
    local_echo: AtomicBool,
    end_of_records: AtomicUsize,
}

impl Default for PromptLogin {
    fn default() -> Self {
        Self {
            login_prompts: strings(&["login:", "Login:", "Username:", "username:"]),
            password_prompts: strings(&["Password:", "password:"]),
            shell_prompts: strings(&["$", "#", ">"]),
            failure_markers: strings(&[
                "Login incorrect",
                "Authentication failed",
                "Access denied",
                "% Bad passwords",
            ]),
            terminal_type: "VT100".to_string(),
            window_size: WindowSize::default(),
            local_echo: AtomicBool::new(false),
            end_of_records: AtomicUsize::new(0),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn any_in(response: &str, candidates: &[String]) -> bool {
    candidates.iter().any(|candidate| response.contains(candidate.as_str()))
}

fn as_patterns<'a>(groups: &[&'a [String]]) -> Vec<&'a str> {
    groups
        .iter()
        .flat_map(|group| group.iter().map(String::as_str))
        .collect()
}

impl PromptLogin {
    /// Create hooks with the default prompts
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the prompts that ask for the username
    #[must_use]
    pub fn with_login_prompts<S: Into<String>>(
        mut self,
        prompts: impl IntoIterator<Item = S>,
    ) -> Self {
        self.login_prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the prompts that ask for the password
    #[must_use]
    pub fn with_password_prompts<S: Into<String>>(
        mut self,
        prompts: impl IntoIterator<Item = S>,
    ) -> Self {
        self.password_prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the prompts that signal a successful login
    #[must_use]
    pub fn with_shell_prompts<S: Into<String>>(
        mut self,
        prompts: impl IntoIterator<Item = S>,
    ) -> Self {
        self.shell_prompts = prompts.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the markers that signal rejected credentials
    #[must_use]
    pub fn with_failure_markers<S: Into<String>>(
        mut self,
        markers: impl IntoIterator<Item = S>,
    ) -> Self {
        self.failure_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the advertised terminal type
    #[must_use]
    pub fn with_terminal_type(mut self, terminal_type: impl Into<String>) -> Self {
        self.terminal_type = terminal_type.into();
        self
    }

    /// Set the advertised window size
    #[must_use]
    pub fn with_window_size(mut self, size: WindowSize) -> Self {
        self.window_size = size;
        self
    }

    /// Last local echo state requested through the hooks
    pub fn local_echo(&self) -> bool {
        self.local_echo.load(Ordering::Relaxed)
    }

    /// Number of end-of-record notifications received
    pub fn end_of_records(&self) -> usize {
        self.end_of_records.load(Ordering::Relaxed)
    }

    fn rejected_by(&self, response: &str) -> Option<LoginError> {
        self.failure_markers
            .iter()
            .find(|marker| response.contains(marker.as_str()))
            .map(|marker| LoginError::Rejected(marker.clone()))
    }
}

#[async_trait]
impl DeviceHooks for PromptLogin {
    #[instrument(skip_all, fields(user = %session.config().username))]
    async fn login(&self, session: &Session) -> Result<(), LoginError> {
        let response = session
            .wait_for(&as_patterns(&[self.login_prompts.as_slice()]))
            .await?;
        if !any_in(&response, &self.login_prompts) {
            return Err(LoginError::PromptNotSeen(response));
        }
        debug!("Sending username");
        session.send_command(&session.config().username).await?;

        let response = session
            .wait_for(&as_patterns(&[
                self.password_prompts.as_slice(),
                self.shell_prompts.as_slice(),
                self.failure_markers.as_slice(),
            ]))
            .await?;
        if let Some(error) = self.rejected_by(&response) {
            warn!(%error, "Login rejected after username");
            return Err(error);
        }
        if !any_in(&response, &self.password_prompts) {
            if any_in(&response, &self.shell_prompts) {
                debug!("Logged in without a password");
                return Ok(());
            }
            return Err(LoginError::PromptNotSeen(response));
        }
        debug!("Sending password");
        session.send_command(&session.config().password).await?;

        let response = session
            .wait_for(&as_patterns(&[
                self.shell_prompts.as_slice(),
                self.failure_markers.as_slice(),
            ]))
            .await?;
        if let Some(error) = self.rejected_by(&response) {
            warn!(%error, "Login rejected after password");
            return Err(error);
        }
        if any_in(&response, &self.shell_prompts) {
            debug!("Logged in");
            return Ok(());
        }
        if any_in(&response, &self.login_prompts) {
            warn!("Asked for the username again");
            return Err(LoginError::Rejected("login prompt repeated".to_string()));
        }
        Err(LoginError::PromptNotSeen(response))
    }

    fn terminal_type(&self) -> String {
        self.terminal_type.clone()
    }

    fn window_size(&self) -> WindowSize {
        self.window_size
    }

    fn set_local_echo(&self, enabled: bool) {
        self.local_echo.store(enabled, Ordering::Relaxed);
    }

    fn notify_end_of_record(&self) {
        self.end_of_records.fetch_add(1, Ordering::Relaxed);
    }
}
