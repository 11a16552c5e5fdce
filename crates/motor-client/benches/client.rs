//! Benchmarks for motor-client hot paths.
//!
//! URI parsing, pool checkout/checkin, and cursor batch iteration, all
//! against the in-memory mock mongod so numbers reflect facade overhead
//! rather than network latency.

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use motor_client::{ClientOptions, FindOptions, MotorClient, doc};
use motor_testing::MockMongod;
use motor_testing::fixtures::sample_docs;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Benchmark connection-string parsing - a hot path in application startup.
fn bench_uri_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("uri_parsing");

    let simple = "mongodb://localhost";
    group.throughput(Throughput::Bytes(simple.len() as u64));
    group.bench_function("simple", |b| {
        b.iter(|| {
            let options = ClientOptions::parse(black_box(simple));
            black_box(options)
        })
    });

    let with_port = "mongodb://db.example.com:30000";
    group.throughput(Throughput::Bytes(with_port.len() as u64));
    group.bench_function("with_port", |b| {
        b.iter(|| {
            let options = ClientOptions::parse(black_box(with_port));
            black_box(options)
        })
    });

    let full = "mongodb://db.example.com:30000/?maxPoolSize=20&connectTimeoutMS=2000\
                &socketTimeoutMS=500&waitQueueTimeoutMS=900";
    group.throughput(Throughput::Bytes(full.len() as u64));
    group.bench_function("all_options", |b| {
        b.iter(|| {
            let options = ClientOptions::parse(black_box(full));
            black_box(options)
        })
    });

    #[cfg(unix)]
    {
        let socket = "mongodb://%2Ftmp%2Fmongodb-27017.sock";
        group.throughput(Throughput::Bytes(socket.len() as u64));
        group.bench_function("unix_socket", |b| {
            b.iter(|| {
                let options = ClientOptions::parse(black_box(socket));
                black_box(options)
            })
        });
    }

    group.finish();
}

/// Benchmark one pooled round trip: checkout, blocking call, checkin.
fn bench_pooled_operation(c: &mut Criterion) {
    let rt = runtime();
    let server = MockMongod::builder()
        .with_collection("bench", "events", sample_docs(1))
        .build();
    let client = MotorClient::new(
        Arc::new(server.driver()),
        ClientOptions::new(server.address().clone()),
    )
    .expect("client");
    rt.block_on(client.open()).expect("open");
    let collection = client.database("bench").collection("events");

    let mut group = c.benchmark_group("pooled_operation");
    group.bench_function("find_one", |b| {
        b.to_async(&rt).iter(|| async {
            let found = collection.find_one(doc! { "_id": 0 }).await;
            black_box(found)
        })
    });
    group.bench_function("insert_one", |b| {
        b.to_async(&rt).iter(|| async {
            let inserted = collection.insert_one(doc! { "k": 1 }).await;
            black_box(inserted)
        })
    });
    group.finish();
}

/// Benchmark cursor iteration across server batches.
fn bench_cursor_iteration(c: &mut Criterion) {
    let rt = runtime();
    let server = MockMongod::builder()
        .with_collection("bench", "stream", sample_docs(200))
        .build();
    let client = MotorClient::new(
        Arc::new(server.driver()),
        ClientOptions::new(server.address().clone()),
    )
    .expect("client");
    rt.block_on(client.open()).expect("open");
    let collection = client.database("bench").collection("stream");

    let mut group = c.benchmark_group("cursor");
    group.throughput(Throughput::Elements(200));
    group.bench_function("walk_200_docs_batch_50", |b| {
        b.to_async(&rt).iter(|| async {
            let mut stream =
                collection.find_with_options(doc! {}, FindOptions::new().batch_size(50));
            let mut count = 0usize;
            while stream.fetch_next().await.expect("advance") {
                let _ = black_box(stream.next_object());
                count += 1;
            }
            black_box(count)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_uri_parsing,
    bench_pooled_operation,
    bench_cursor_iteration
);
criterion_main!(benches);
