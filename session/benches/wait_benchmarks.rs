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

//! Benchmarks for the response buffer and pattern waits

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use teleprompt_session::{MemoryTransport, NoLogin, ResponseBuffer, Session, SessionConfig};

fn filled_buffer(size: usize) -> ResponseBuffer {
    let buffer = ResponseBuffer::new();
    let line = b"GigabitEthernet0/1     unassigned      YES unset  up                    up\r\n";
    while buffer.len() < size {
        buffer.append(line);
    }
    buffer
}

fn bench_scan_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_miss");

    for size in [1024, 16 * 1024, 256 * 1024] {
        let buffer = filled_buffer(size);
        group.throughput(Throughput::Bytes(buffer.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &buffer, |b, buffer| {
            b.iter(|| black_box(buffer.scan(black_box(&["Router#", "--More--", "% Invalid"]))));
        });
    }

    group.finish();
}

fn bench_scan_hit(c: &mut Criterion) {
    let buffer = filled_buffer(16 * 1024);
    buffer.append(b"Router#");

    c.bench_function("scan_hit_at_end", |b| {
        b.iter(|| black_box(buffer.scan(black_box(&["--More--", "Router#"]))));
    });
}

fn bench_append_drain(c: &mut Criterion) {
    let chunk = vec![b'x'; 1460];

    c.bench_function("append_drain_64_chunks", |b| {
        let buffer = ResponseBuffer::new();
        b.iter(|| {
            for _ in 0..64 {
                buffer.append(black_box(&chunk));
            }
            black_box(buffer.drain())
        });
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("command_round_trip", |b| {
        b.to_async(&runtime).iter(|| async {
            let (transport, mut listener) = MemoryTransport::new(8192);
            let config = SessionConfig::new("bench", 23)
                .with_timeout(Duration::from_secs(1))
                .with_poll_interval(Duration::from_millis(1));
            let session = Session::new(config, Box::new(transport), Arc::new(NoLogin));
            session.connect().await.unwrap();
            let mut remote = listener.accept().await.unwrap();

            session.send_command("show version").await.unwrap();
            remote.receive_until("\r\n").await.unwrap();
            remote.send("Version 15.2\r\nRouter#").await.unwrap();
            black_box(session.wait_for(&["Router#"]).await.unwrap());

            session.disconnect().await.unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_scan_miss,
    bench_scan_hit,
    bench_append_drain,
    bench_round_trip
);
criterion_main!(benches);
