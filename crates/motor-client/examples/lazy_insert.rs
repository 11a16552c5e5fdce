//! Lazy connection example.
//!
//! This example demonstrates the lazy-connect behavior of the client:
//! operations issued before any connection exists transparently establish
//! one, and concurrent first operations share a single handshake.
//!
//! It runs against the in-memory mock mongod from `motor-testing`, so no
//! real server is required:
//!
//! ```bash
//! cargo run --example lazy_insert
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use motor_client::{ClientOptions, Error, MotorClient, doc};
use motor_testing::MockMongod;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    // A mock server standing in for mongod; handshakes take 50ms so the
    // single-flight behavior below is observable.
    let server = MockMongod::builder()
        .with_connect_delay(Duration::from_millis(50))
        .build();

    let options = ClientOptions::new(server.address().clone()).max_pool_size(5);
    let client = MotorClient::new(Arc::new(server.driver()), options)?;

    println!("Client built; handshakes so far: {}", server.connects());

    // Issue 10 inserts without ever calling open(). All of them queue on
    // one shared connection attempt.
    let collection = client.database("app").collection("events");
    let inserts = join_all((0..10).map(|i| {
        let collection = collection.clone();
        async move { collection.insert_one(doc! { "_id": i, "kind": "startup" }).await }
    }))
    .await;
    for result in inserts {
        result?;
    }

    println!(
        "10 inserts completed; documents stored: {}",
        server.documents("app", "events").len()
    );
    println!("Handshakes used for the initial burst: {}", server.connects());

    // open() afterwards is a no-op: the client is already connected.
    client.open().await?;
    println!("open() after the fact added no handshake: {}", server.connects());

    let count = collection.count(doc! { "kind": "startup" }).await?;
    println!("Counted {count} startup events");

    client.close();
    println!("Client closed; pool drained: {:?}", client.pool_status());

    Ok(())
}
