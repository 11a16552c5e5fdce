//! # motor-client
//!
//! Asynchronous connection-pooled MongoDB client facade over a synchronous
//! driver.
//!
//! This is the primary public API surface for the rust-motor-driver
//! project. It adapts a blocking MongoDB driver (anything implementing the
//! [`motor_sync::SyncDriver`] boundary) to async Rust: every operation
//! checks a connection out of a bounded pool and runs the blocking call on
//! a worker thread, so the async runtime's own threads are never stalled by
//! network latency.
//!
//! ## Features
//!
//! - **Lazy, single-flight connect**: the first operation establishes
//!   connectivity; concurrent first operations share one handshake
//! - **Bounded pooling**: concurrent operations multiplex over at most
//!   `maxPoolSize` physical connections
//! - **Streaming cursors**: [`CursorStream`] fetches batches on demand and
//!   kills abandoned server-side cursors
//! - **Typed failures**: every operation resolves its future with one
//!   [`Error`], never a panic; timeouts stay distinguishable from refusals
//! - **URI configuration**: `mongodb://` connection strings, including
//!   Unix-domain-socket paths and pool/timeout query options
//!
//! ## Connection lifecycle
//!
//! The client moves through an explicit state machine:
//!
//! ```text
//! Unconnected -> Connecting (first operation or open())
//! Connecting  -> Connected | Failed
//! Failed      -> Connecting (next operation retries)
//! any state   -> Closed (via close(); terminal)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use motor_client::{ClientOptions, MotorClient, doc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), motor_client::Error> {
//!     let options = ClientOptions::parse(
//!         "mongodb://localhost:27017/?maxPoolSize=20&socketTimeoutMS=5000",
//!     )?;
//!     let client = MotorClient::new(driver, options)?;
//!
//!     let collection = client.database("app").collection("events");
//!     collection.insert_one(doc! { "kind": "started" }).await?;
//!
//!     let mut cursor = collection.find(doc! { "kind": "started" });
//!     while cursor.fetch_next().await? {
//!         let event = cursor.next_object();
//!         println!("{event:?}");
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod database;
mod executor;

// Re-export commonly used types
pub use client::{CopyDatabaseOptions, MotorClient};
pub use collection::MotorCollection;
pub use config::ClientOptions;
pub use cursor::{CursorStream, FindOptions};
pub use database::{AsDatabaseName, MotorDatabase};
pub use motor_driver_pool::PoolStatus;
pub use motor_sync::{Bson, Document, Error, Namespace, Result, ServerAddress, doc};
