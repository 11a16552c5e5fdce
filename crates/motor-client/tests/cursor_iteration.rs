//! Cursor streaming tests.
//!
//! Batch-by-batch iteration, terminal exhaustion, concurrent independent
//! cursors, and server-side cursor cleanup, against the in-memory mock
//! mongod:
//!
//! ```bash
//! cargo test -p motor-client --test cursor_iteration
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::TryStreamExt;

use motor_client::{ClientOptions, Error, FindOptions, MotorClient, doc};
use motor_testing::MockMongod;
use motor_testing::fixtures::{init_tracing, sample_docs};

/// Helper building a client wired to the given mock server.
fn client_for(server: &MockMongod) -> MotorClient {
    init_tracing();
    MotorClient::new(
        Arc::new(server.driver()),
        ClientOptions::new(server.address().clone()),
    )
    .expect("client construction should succeed")
}

/// Wait until the mock has recorded at least one cursor kill.
async fn await_cursor_kill(server: &MockMongod) -> Vec<i64> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let killed = server.killed_cursors();
        if !killed.is_empty() {
            return killed;
        }
        assert!(
            Instant::now() < deadline,
            "no cursor kill observed within 2s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Basic Iteration
// =============================================================================

#[tokio::test]
async fn test_cursor_walks_all_batches() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(25))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let mut stream =
        collection.find_with_options(doc! {}, FindOptions::new().batch_size(7));
    let mut seen = Vec::new();
    while stream.fetch_next().await.expect("advance") {
        seen.push(stream.next_object().expect("buffered document"));
    }

    assert_eq!(seen.len(), 25);
    assert_eq!(seen[0].get_i32("_id").ok(), Some(0));
    assert_eq!(seen[24].get_i32("_id").ok(), Some(24));
    assert_eq!(server.open_cursors(), 0, "exhaustion closes the server cursor");

    client.close();
}

#[tokio::test]
async fn test_first_fetch_connects_lazily() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(3))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    // Building the stream does no I/O at all.
    let mut stream = collection.find(doc! {});
    assert_eq!(server.connects(), 0);

    assert!(stream.fetch_next().await.expect("first advance"));
    assert!(server.connects() >= 1, "first advance connected the client");

    client.close();
}

#[tokio::test]
async fn test_first_advance_parks_while_the_handshake_runs_off_loop() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(3))
        .with_connect_delay(Duration::from_millis(50))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");
    let mut stream = collection.find(doc! {});

    {
        let mut advance = tokio_test::task::spawn(stream.fetch_next());
        tokio_test::assert_pending!(advance.poll(), "blocking work never resolves inline");
    }

    // Dropping that poll lost nothing: the in-flight fetch is resumed.
    assert!(stream.fetch_next().await.expect("first advance"));
    let doc = stream.next_object().expect("buffered document");
    assert_eq!(doc.get_i32("_id").ok(), Some(0));

    client.close();
}

#[tokio::test]
async fn test_exhausted_stream_is_terminal() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(2))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let mut stream = collection.find(doc! {});
    let mut count = 0;
    while stream.fetch_next().await.expect("advance") {
        let _ = stream.next_object();
        count += 1;
    }
    assert_eq!(count, 2);

    // `false` is final: the stream never restarts, however often asked.
    for _ in 0..3 {
        assert!(!stream.fetch_next().await.expect("terminal advance"));
        assert!(stream.next_object().is_none());
    }
    assert!(!stream.alive());

    client.close();
}

#[tokio::test]
async fn test_filtered_find_and_find_one() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(10))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let found = collection
        .find_one(doc! { "_id": 4 })
        .await
        .expect("find_one")
        .expect("document with _id 4 exists");
    assert_eq!(found.get_str("s").ok(), Some("4"));

    let missing = collection
        .find_one(doc! { "_id": 999 })
        .await
        .expect("find_one");
    assert!(missing.is_none());

    assert_eq!(collection.count(doc! {}).await.expect("count"), 10);
    assert_eq!(
        collection.count(doc! { "_id": 4 }).await.expect("filtered count"),
        1
    );

    client.close();
}

#[tokio::test]
async fn test_limit_caps_returned_documents() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(50))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let docs: Vec<_> = collection
        .find_with_options(doc! {}, FindOptions::new().limit(5).batch_size(2))
        .try_collect()
        .await
        .expect("collect");
    assert_eq!(docs.len(), 5);

    client.close();
}

// =============================================================================
// Stream Trait
// =============================================================================

#[tokio::test]
async fn test_stream_impl_yields_the_same_documents() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(12))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let via_stream: Vec<_> = collection
        .find_with_options(doc! {}, FindOptions::new().batch_size(5))
        .try_collect()
        .await
        .expect("collect via Stream impl");

    let mut via_fetch = Vec::new();
    let mut cursor =
        collection.find_with_options(doc! {}, FindOptions::new().batch_size(5));
    while cursor.fetch_next().await.expect("advance") {
        via_fetch.push(cursor.next_object().expect("buffered document"));
    }

    assert_eq!(via_stream, via_fetch);

    client.close();
}

// =============================================================================
// Concurrent Cursors
// =============================================================================

#[tokio::test]
async fn test_concurrent_cursors_each_observe_the_full_collection() {
    const CONCURRENCY: usize = 8;
    const COLLECTION_SIZE: usize = 50;

    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(COLLECTION_SIZE))
        .build();
    // Fewer pool slots than cursors: iteration multiplexes over the pool.
    let client = MotorClient::new(
        Arc::new(server.driver()),
        ClientOptions::new(server.address().clone()).max_pool_size(4),
    )
    .expect("client construction");

    let mut handles = Vec::new();
    for _ in 0..CONCURRENCY {
        let collection = client.database("motor_test").collection("events");
        handles.push(tokio::spawn(async move {
            let mut stream =
                collection.find_with_options(doc! {}, FindOptions::new().batch_size(6));
            let mut observed = 0usize;
            while stream.fetch_next().await.expect("advance") {
                let _ = stream.next_object().expect("buffered document");
                observed += 1;
            }
            observed
        }));
    }

    let mut total = 0usize;
    for handle in handles {
        total += handle.await.expect("iteration task panicked");
    }

    assert_eq!(total, CONCURRENCY * COLLECTION_SIZE);
    assert!(client.pool_status().total <= 4);
    assert_eq!(server.open_cursors(), 0);

    client.close();
}

// =============================================================================
// Cursor Cleanup
// =============================================================================

#[tokio::test]
async fn test_abandoned_stream_kills_the_server_cursor() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(20))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    {
        let mut stream =
            collection.find_with_options(doc! {}, FindOptions::new().batch_size(5));
        assert!(stream.fetch_next().await.expect("advance"));
        let _ = stream.next_object();
        assert_eq!(server.open_cursors(), 1);
        // Dropped here with 15 documents still server-side.
    }

    let killed = await_cursor_kill(&server).await;
    assert_eq!(killed.len(), 1);
    assert_eq!(server.open_cursors(), 0);

    client.close();
}

#[tokio::test]
async fn test_close_kills_the_cursor_deterministically() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(20))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let mut stream =
        collection.find_with_options(doc! {}, FindOptions::new().batch_size(5));
    assert!(stream.fetch_next().await.expect("advance"));
    assert_eq!(server.open_cursors(), 1);

    stream.close().await.expect("close");

    // No waiting: the kill has happened by the time close resolves.
    assert_eq!(server.killed_cursors().len(), 1);
    assert_eq!(server.open_cursors(), 0);
    assert!(!stream.alive());

    client.close();
}

#[tokio::test]
async fn test_dropping_an_exhausted_stream_kills_nothing() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(3))
        .build();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    {
        let mut stream = collection.find(doc! {});
        while stream.fetch_next().await.expect("advance") {
            let _ = stream.next_object();
        }
    }

    // Give any stray kill task a chance to run, then confirm none did.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.killed_cursors().is_empty());

    client.close();
}

// =============================================================================
// Error Paths
// =============================================================================

#[tokio::test]
async fn test_insert_many_rejects_an_empty_batch() {
    let server = MockMongod::new();
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let err = collection.insert_many(Vec::new()).await.expect_err("empty batch");
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(server.connects(), 0, "validation happens before any I/O");

    client.close();
}

#[tokio::test]
async fn test_cursor_error_finishes_the_stream() {
    let server = MockMongod::builder()
        .with_collection("motor_test", "events", sample_docs(5))
        .build();
    server.set_reachable(false);
    let client = client_for(&server);
    let collection = client.database("motor_test").collection("events");

    let mut stream = collection.find(doc! {});
    let err = stream.fetch_next().await.expect_err("unreachable server");
    assert!(err.is_connection_failure());

    // A failed stream reads as exhausted afterwards.
    assert!(!stream.alive());
    assert!(!stream.fetch_next().await.expect("terminal advance"));

    client.close();
}
