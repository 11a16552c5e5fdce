//! Connection pooling over the blocking driver boundary.
//!
//! This example runs against the in-memory mock mongod from `motor-testing`,
//! so it needs no running server. It demonstrates checkout, automatic
//! return, connection reuse, and how a bounded pool behaves under
//! concurrent load.
//!
//! # Running
//!
//! ```bash
//! cargo run -p motor-driver-pool --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use motor_driver_pool::{Pool, PoolConfig, PoolError};
use motor_sync::doc;
use motor_testing::MockMongod;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let server = MockMongod::builder()
        .with_collection("demo", "events", vec![doc! { "_id": 1 }])
        .with_query_latency(Duration::from_millis(20))
        .build();

    println!("=== Connection Pool Example ===\n");

    let config = PoolConfig::new()
        .max_size(4)
        .connect_timeout(Duration::from_secs(5))
        .wait_queue_timeout(Duration::from_secs(10));

    println!("Pool configuration:");
    println!("  Max size: {}", config.max_size);
    println!("  Connect timeout: {:?}", config.connect_timeout);
    println!();

    let pool = Pool::new(Arc::new(server.driver()), server.address().clone(), config)?;

    // Example 1: checkout and automatic return
    println!("1. Basic checkout:");
    {
        let mut handle = pool.acquire().await?;
        println!("  Checked out connection #{}", handle.id());

        // The raw connection moves onto a blocking worker for driver calls.
        let mut conn = handle.take().expect("connection present");
        let (conn, count) = tokio::task::spawn_blocking(move || {
            let n = conn.run_command("demo", doc! { "ping": 1 }).map(|_| 1);
            (conn, n)
        })
        .await?;
        handle.restore(conn);
        println!("  Ping commands run: {}", count?);
        // Handle drops here; the connection returns to the idle set.
    }
    print_pool_status(&pool);

    // Example 2: idle connections are reused, not re-established
    println!("\n2. Connection reuse:");
    for _ in 0..3 {
        let handle = pool.acquire().await?;
        println!(
            "  Got connection #{} (checkout {})",
            handle.id(),
            handle.checkout_count()
        );
    }
    println!("  Handshakes performed: {}", server.connects());

    // Example 3: concurrent checkouts stay within capacity
    println!("\n3. Concurrent pool usage (10 parallel checkouts, capacity 4):");
    let start = Instant::now();
    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = pool.clone();
        handles.push(tokio::spawn(async move {
            let mut handle = pool_clone.acquire().await?;
            let mut conn = handle.take().expect("connection present");
            let (conn, result) = tokio::task::spawn_blocking(move || {
                let r = conn.run_command("demo", doc! { "ping": 1 });
                (conn, r)
            })
            .await
            .expect("worker completed");
            handle.restore(conn);
            result?;
            Ok::<_, PoolError>(i)
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            completed += 1;
        }
    }
    println!("  Completed {} checkouts in {:?}", completed, start.elapsed());
    println!("  Handshakes performed: {}", server.connects());
    print_pool_status(&pool);

    // Example 4: graceful shutdown
    println!("\n4. Graceful shutdown:");
    pool.close();
    print_pool_status(&pool);
    match pool.acquire().await {
        Err(PoolError::PoolClosed) => println!("  Acquire after close: PoolClosed"),
        other => println!("  Unexpected: {:?}", other.map(|c| c.id())),
    }

    Ok(())
}

fn print_pool_status(pool: &Pool) {
    let status = pool.status();
    println!(
        "  Status: {} in use, {} idle, {}/{} total",
        status.in_use, status.available, status.total, status.max
    );
}
