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

//! Loopback tests for TcpTransport

use bytes::BytesMut;
use std::io;
use std::time::Duration;
use teleprompt_transport::{ByteSource, TcpTransport, Transport, WindowSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Bind a loopback listener and connect a transport to it
async fn connected_pair() -> (TcpTransport, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        socket
    });

    let mut transport = TcpTransport::new();
    transport
        .connect(&addr.ip().to_string(), addr.port())
        .await
        .unwrap();
    let server = server_task.await.unwrap();
    (transport, server)
}

#[tokio::test]
async fn test_connect_and_exchange() {
    let (mut transport, mut server) = connected_pair().await;
    assert!(transport.is_connected());
    assert!(transport.peer().is_some());

    let mut input = transport.input_stream().unwrap();
    let mut output = transport.output_stream().unwrap();

    server.write_all(b"login: ").await.unwrap();
    let mut buf = BytesMut::with_capacity(64);
    while buf.len() < 7 {
        assert!(input.read_chunk(&mut buf).await.unwrap() > 0);
    }
    assert_eq!(&buf[..], b"login: ");

    output.write_all(b"admin\r\n").await.unwrap();
    output.flush().await.unwrap();
    let mut received = [0u8; 7];
    server.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"admin\r\n");

    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_disconnect_aborts_pending_read() {
    let (mut transport, _server) = connected_pair().await;
    let mut input = transport.input_stream().unwrap();

    let reader = tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(64);
        input.read_chunk(&mut buf).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    transport.disconnect().await.unwrap();
    let err = reader.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_peer_close_reads_end_of_stream() {
    let (mut transport, server) = connected_pair().await;
    let mut input = transport.input_stream().unwrap();
    drop(server);

    let mut buf = BytesMut::with_capacity(64);
    assert_eq!(input.read_chunk(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn test_idle_timeout_applies_to_reads() {
    let (mut transport, _server) = connected_pair().await;
    transport.set_idle_timeout(Some(Duration::from_millis(50)));
    let mut input = transport.input_stream().unwrap();

    let mut buf = BytesMut::with_capacity(64);
    let err = input.read_chunk(&mut buf).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::TimedOut);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut transport = TcpTransport::new().with_connect_timeout(Duration::from_secs(2));
    assert!(transport.connect("127.0.0.1", port).await.is_err());
    assert!(!transport.is_connected());
    assert!(transport.input_stream().is_err());

    // Disconnecting a transport that never connected is a no-op
    transport.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accept_task = tokio::spawn(async move {
        let first = listener.accept().await.unwrap().0;
        let second = listener.accept().await.unwrap().0;
        (first, second)
    });

    let mut transport = TcpTransport::new();
    transport.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(
        transport.connect("127.0.0.1", addr.port()).await.is_err(),
        "second connect while connected must fail"
    );
    transport.disconnect().await.unwrap();
    transport.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(transport.is_connected());

    let _sockets = accept_task.await.unwrap();
    transport.disconnect().await.unwrap();
}

#[test]
fn test_terminal_attributes_recorded() {
    let mut transport = TcpTransport::new();
    assert!(transport.terminal().is_none());
    transport.configure_terminal("xterm", WindowSize::new(120, 40));
    assert_eq!(transport.terminal(), Some(("xterm", WindowSize::new(120, 40))));
}
