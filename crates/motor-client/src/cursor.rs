//! Server-side cursor streaming.

use std::collections::VecDeque;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::debug;

use motor_sync::{CursorBatch, Document, FindSpec, Namespace, Result};

use crate::client::MotorClient;

/// Options for [`MotorCollection::find`](crate::MotorCollection::find).
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct FindOptions {
    /// Documents per server batch. `None` lets the server choose.
    pub batch_size: Option<u32>,
    /// Hard cap on returned documents.
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Options with everything left to the server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-batch document count.
    #[must_use]
    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Cap the number of returned documents.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn spec(&self) -> FindSpec {
        FindSpec {
            batch_size: self.batch_size,
            limit: self.limit,
        }
    }
}

enum StreamState {
    /// No query issued yet. The first advance connects (lazily) and runs
    /// the initial find.
    Unstarted,
    /// Iterating: documents buffered client-side plus the server cursor
    /// they came from (`0` once the server is exhausted).
    Active {
        cursor_id: i64,
        buffer: VecDeque<Document>,
    },
    /// An initial query or get-more is in flight, tagged with the server
    /// cursor id it targets (`0` for the initial query, whose cursor does
    /// not exist yet).
    Fetching(i64, BoxFuture<'static, Result<CursorBatch>>),
    /// Exhausted or failed; `fetch_next` stays `false` forever.
    Done,
    /// Closed explicitly.
    Closed,
}

/// A lazy stream of documents from one query.
///
/// Created by [`MotorCollection::find`](crate::MotorCollection::find)
/// without touching the network; the first [`CursorStream::fetch_next`]
/// runs the query (connecting the client first if it never was) and later
/// ones fetch batches on demand. A stream that returns `false` is
/// exhausted for good; re-running the query means a new stream.
///
/// Also implements [`futures_core::Stream`], yielding
/// `Result<Document>` items.
///
/// Dropping a stream that still has a live server-side cursor spawns a
/// fire-and-forget kill for it. Callers that need the kill to happen
/// before some next step should call [`CursorStream::close`] instead of
/// relying on drop order.
pub struct CursorStream {
    client: MotorClient,
    ns: Namespace,
    filter: Document,
    spec: FindSpec,
    state: StreamState,
}

impl CursorStream {
    pub(crate) fn new(
        client: MotorClient,
        ns: Namespace,
        filter: Document,
        options: &FindOptions,
    ) -> Self {
        Self {
            client,
            ns,
            filter,
            spec: options.spec(),
            state: StreamState::Unstarted,
        }
    }

    /// Advance until a document is buffered, returning `true` when one is
    /// available for [`CursorStream::next_object`] and `false` once the
    /// stream is exhausted.
    pub async fn fetch_next(&mut self) -> Result<bool> {
        poll_fn(|cx| self.poll_advance(cx)).await
    }

    /// Pop the next buffered document.
    ///
    /// Returns `None` when nothing is buffered; pair each call with a
    /// preceding `fetch_next` that returned `true`.
    pub fn next_object(&mut self) -> Option<Document> {
        match &mut self.state {
            StreamState::Active { buffer, .. } => buffer.pop_front(),
            _ => None,
        }
    }

    /// Check whether more documents may still arrive.
    #[must_use]
    pub fn alive(&self) -> bool {
        !matches!(self.state, StreamState::Done | StreamState::Closed)
    }

    /// Close the stream, killing the server-side cursor if one is live.
    ///
    /// Deterministic counterpart to the kill-on-drop behavior; the kill
    /// has completed when this resolves. Closing an unstarted or already
    /// finished stream is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, StreamState::Closed);
        let cursor_id = match state {
            StreamState::Active { cursor_id, .. } => cursor_id,
            // An abandoned get-more still targets a known server cursor;
            // kill that. An abandoned initial query carries no id yet, and
            // a cursor it opens ages out server-side since its id was
            // never delivered.
            StreamState::Fetching(cursor_id, _) => cursor_id,
            _ => 0,
        };
        if cursor_id == 0 {
            return Ok(());
        }
        let ns = self.ns.clone();
        self.client
            .executor()
            .execute(move |conn| conn.kill_cursor(&ns, cursor_id))
            .await
    }

    fn poll_advance(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool>> {
        loop {
            match &mut self.state {
                StreamState::Done | StreamState::Closed => return Poll::Ready(Ok(false)),
                StreamState::Active { cursor_id, buffer } => {
                    if !buffer.is_empty() {
                        return Poll::Ready(Ok(true));
                    }
                    if *cursor_id == 0 {
                        self.state = StreamState::Done;
                        return Poll::Ready(Ok(false));
                    }
                    let id = *cursor_id;
                    let fut = self.get_more_future(id);
                    self.state = StreamState::Fetching(id, fut);
                }
                StreamState::Unstarted => {
                    let fut = self.initial_future();
                    self.state = StreamState::Fetching(0, fut);
                }
                StreamState::Fetching(_, fut) => match fut.poll_unpin(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Ok(batch)) => {
                        // Loop around: an empty batch from a live cursor
                        // just means another get-more.
                        self.state = StreamState::Active {
                            cursor_id: batch.id,
                            buffer: batch.docs.into(),
                        };
                    }
                    Poll::Ready(Err(err)) => {
                        self.state = StreamState::Done;
                        return Poll::Ready(Err(err));
                    }
                },
            }
        }
    }

    fn initial_future(&self) -> BoxFuture<'static, Result<CursorBatch>> {
        let client = self.client.clone();
        let ns = self.ns.clone();
        let filter = self.filter.clone();
        let spec = self.spec.clone();
        async move {
            client.ensure_connected().await?;
            client
                .executor()
                .execute(move |conn| conn.find(&ns, &filter, &spec))
                .await
        }
        .boxed()
    }

    fn get_more_future(&self, cursor_id: i64) -> BoxFuture<'static, Result<CursorBatch>> {
        let client = self.client.clone();
        let ns = self.ns.clone();
        let batch_size = self.spec.batch_size;
        async move {
            client.ensure_connected().await?;
            client
                .executor()
                .execute(move |conn| conn.get_more(&ns, cursor_id, batch_size))
                .await
        }
        .boxed()
    }
}

impl Stream for CursorStream {
    type Item = Result<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.poll_advance(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(true)) => {
                    if let Some(doc) = this.next_object() {
                        return Poll::Ready(Some(Ok(doc)));
                    }
                }
                Poll::Ready(Ok(false)) => return Poll::Ready(None),
                Poll::Ready(Err(err)) => return Poll::Ready(Some(Err(err))),
            }
        }
    }
}

impl Drop for CursorStream {
    fn drop(&mut self) {
        let (cursor_id, buffered) = match &self.state {
            StreamState::Active { cursor_id, buffer } => (*cursor_id, buffer.len()),
            StreamState::Fetching(cursor_id, _) => (*cursor_id, 0),
            _ => return,
        };
        if cursor_id == 0 {
            return;
        }
        debug!(
            cursor_id,
            buffered,
            "stream dropped with live cursor, requesting kill"
        );
        let client = self.client.clone();
        let ns = self.ns.clone();
        // Fire and forget: a failed kill is logged, never surfaced.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = client
                        .executor()
                        .execute(move |conn| conn.kill_cursor(&ns, cursor_id))
                        .await
                    {
                        debug!(cursor_id, error = %err, "cursor kill failed");
                    }
                });
            }
            Err(_) => debug!(cursor_id, "no runtime to kill abandoned cursor on"),
        }
    }
}
