//! Cursor streaming example.
//!
//! This example walks a seeded collection batch by batch with
//! `fetch_next`/`next_object`, then again through the `Stream` trait, and
//! shows the deterministic `close()` path for abandoning a cursor early.
//!
//! It runs against the in-memory mock mongod from `motor-testing`, so no
//! real server is required:
//!
//! ```bash
//! cargo run --example cursor_walk
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use futures_util::TryStreamExt;

use motor_client::{ClientOptions, Error, FindOptions, MotorClient, doc};
use motor_testing::MockMongod;
use motor_testing::fixtures::sample_docs;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    // A mock server seeded with 100 documents.
    let server = MockMongod::builder()
        .with_collection("app", "readings", sample_docs(100))
        .build();

    let client = MotorClient::new(
        Arc::new(server.driver()),
        ClientOptions::new(server.address().clone()),
    )?;
    let collection = client.database("app").collection("readings");

    // Walk everything in batches of 25. Each empty buffer triggers a
    // get-more against the server-held cursor.
    println!("Walking {} with fetch_next()...", collection.full_name());
    let mut stream = collection.find_with_options(doc! {}, FindOptions::new().batch_size(25));
    let mut total = 0;
    while stream.fetch_next().await? {
        let doc = stream.next_object().expect("document follows a true fetch");
        if total % 25 == 0 {
            println!("  batch boundary at _id {:?}", doc.get("_id"));
        }
        total += 1;
    }
    println!("Walked {total} documents\n");

    // The same query through the Stream trait.
    let ids: Vec<i32> = collection
        .find_with_options(doc! {}, FindOptions::new().batch_size(25).limit(10))
        .try_collect::<Vec<_>>()
        .await?
        .iter()
        .filter_map(|doc| doc.get_i32("_id").ok())
        .collect();
    println!("First ids via the Stream impl: {ids:?}\n");

    // Abandoning a cursor early: close() kills the server-side cursor
    // before returning, instead of relying on drop order.
    let mut abandoned = collection.find_with_options(doc! {}, FindOptions::new().batch_size(10));
    abandoned.fetch_next().await?;
    println!("Open server-side cursors before close: {}", server.open_cursors());
    abandoned.close().await?;
    println!("Open server-side cursors after close:  {}", server.open_cursors());
    println!("Cursor ids the server was asked to kill: {:?}", server.killed_cursors());

    client.close();
    Ok(())
}
