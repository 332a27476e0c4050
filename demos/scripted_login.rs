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

//! Scripted login example
//!
//! Logs in, runs a couple of commands and prints their output. Without
//! arguments it talks to a simulated router running in the same process.
//!
//! ## Usage
//!
//! ```bash
//! # Simulated device
//! cargo run --example scripted_login
//!
//! # Real device
//! RUST_LOG=teleprompt_session=debug cargo run --example scripted_login -- 192.0.2.1 23 admin secret
//! ```

use std::sync::Arc;
use std::time::Duration;
use teleprompt_session::{
    MemoryTransport, PromptLogin, RemoteEnd, Session, SessionConfig, TcpTransport, Transport,
};
use tracing::{info, warn};

/// Simulated router answering `show` commands until `exit`
async fn simulated_router(mut remote: RemoteEnd) -> std::io::Result<()> {
    remote.send("\r\nUser Access Verification\r\n\r\nUsername: ").await?;
    remote.receive_until("\r\n").await?;
    remote.send("Password: ").await?;
    remote.receive_until("\r\n").await?;
    remote.send("\r\nRouter#").await?;

    loop {
        let command = remote.receive_until("\r\n").await?;
        match command.trim() {
            "exit" => return Ok(()),
            "show clock" => {
                remote
                    .send("\r\n*09:12:44.123 UTC Mon Oct 19 2026\r\nRouter#")
                    .await?;
            }
            "show version" => {
                remote
                    .send("\r\nIOS Software, Version 15.2(4)M\r\nRouter uptime is 3 weeks\r\nRouter#")
                    .await?;
            }
            other => {
                remote
                    .send(&format!("\r\n% Invalid input detected: {other}\r\nRouter#"))
                    .await?;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, transport) = match args.as_slice() {
        [host, port, user, pass] => {
            let config = SessionConfig::new(host.as_str(), port.parse()?)
                .with_credentials(user, pass);
            let transport: Box<dyn Transport> = Box::new(TcpTransport::new());
            (config, transport)
        }
        _ => {
            let (memory, mut listener) = MemoryTransport::new(8192);
            tokio::spawn(async move {
                if let Some(remote) = listener.accept().await {
                    if let Err(e) = simulated_router(remote).await {
                        warn!("Simulated router stopped: {e}");
                    }
                }
            });
            let config = SessionConfig::new("router.lab", 23).with_credentials("admin", "cisco");
            let transport: Box<dyn Transport> = Box::new(memory);
            (config, transport)
        }
    };
    let config = config.with_timeout(Duration::from_secs(3));

    let hooks = PromptLogin::new().with_shell_prompts(["#", ">"]);
    let session = Session::new(config, transport, Arc::new(hooks));

    session.connect_and_login().await?;
    info!("Logged in to {}", session.config().address());

    for command in ["show clock", "show version"] {
        session.send_command(command).await?;
        for line in session.multi_line_response(&["#", ">"]).await {
            println!("{line}");
        }
    }

    session.send_command("exit").await?;
    session.disconnect().await?;
    Ok(())
}
