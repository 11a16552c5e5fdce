//! Dispatch of blocking driver calls off the runtime.
//!
//! Every operation follows the same path: check a connection out of the
//! pool on the runtime thread, move it onto a blocking worker for the
//! driver call, then settle the result (and the connection's fate) back on
//! the runtime thread. Pool bookkeeping is never touched from a worker.

use tokio::task;
use tracing::{trace, warn};

use motor_driver_pool::Pool;
use motor_sync::{Error, Result, SyncConnection};

/// Runs blocking driver calls on worker threads and resolves exactly one
/// result per operation back on the runtime.
#[derive(Clone)]
pub(crate) struct OperationExecutor {
    pool: Pool,
}

impl OperationExecutor {
    pub(crate) fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Check out a connection and run `op` with it on a blocking worker.
    ///
    /// The connection returns to the pool afterwards unless `op` reported
    /// a connection failure, in which case it is discarded rather than
    /// reused. A worker that dies mid-call surfaces as [`Error::Internal`]
    /// and costs the pool only bookkeeping.
    ///
    /// Dropping the returned future before its first poll dispatches
    /// nothing. Dropping it after dispatch lets the blocking call run to
    /// completion on the worker; only its result is discarded.
    pub(crate) async fn execute<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SyncConnection) -> Result<T> + Send + 'static,
    {
        let mut pooled = self.pool.acquire().await.map_err(Error::from)?;
        let Some(conn) = pooled.take() else {
            return Err(Error::Internal(
                "checked-out connection handle was empty".into(),
            ));
        };
        let conn_id = pooled.id();
        trace!(conn_id, "dispatching blocking operation");

        let outcome = task::spawn_blocking(move || {
            let mut conn = conn;
            let result = op(conn.as_mut());
            (conn, result)
        })
        .await;

        match outcome {
            Ok((conn, result)) => {
                pooled.restore(conn);
                if let Err(err) = &result {
                    if err.is_connection_failure() {
                        warn!(conn_id, error = %err, "discarding connection after transport failure");
                        pooled.poison();
                    }
                }
                result
            }
            Err(join) => {
                // The connection went down with the worker; dropping the
                // empty handle fixes the slot count.
                warn!(conn_id, error = %join, "blocking worker failed");
                Err(Error::Internal(format!("blocking worker failed: {join}")))
            }
        }
    }
}
