//! # motor-driver-pool
//!
//! Bounded connection pool over the synchronous MongoDB driver boundary.
//!
//! The wrapped driver's connections block the thread using them, so the
//! pool's job is twofold: cap how many physical connections exist, and keep
//! every blocking handshake off the async runtime's core threads.
//!
//! ## Features
//!
//! - Semaphore-gated capacity: a saturated pool suspends the acquiring
//!   task, never the runtime
//! - Lazy population: no connection exists until first acquire
//! - Drop-to-release handles with poisoning for failed transports
//! - Optional wait-queue timeout for fail-fast acquisition
//! - Per-connection checkout metadata for diagnostics
//!
//! ## Example
//!
//! ```rust,ignore
//! use motor_driver_pool::{Pool, PoolConfig};
//!
//! let config = PoolConfig::new()
//!     .max_size(20)
//!     .connect_timeout(Duration::from_secs(5));
//!
//! let pool = Pool::new(driver, address, config)?;
//! let mut conn = pool.acquire().await?;
//! // Use the connection on a blocking worker...
//! // Returned to the pool on drop
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use lifecycle::{ConnectionMetadata, ConnectionState};
pub use pool::{Pool, PoolStatus, PooledConnection};
