//! Collection handles.

use std::fmt;

use motor_sync::{Document, Error, Namespace, Result, doc};

use crate::client::MotorClient;
use crate::cursor::{CursorStream, FindOptions};

/// Server error code for operations against a collection that does not
/// exist.
const NS_NOT_FOUND: i32 = 26;

/// Handle to one collection.
///
/// Obtained through [`crate::MotorDatabase::collection`]; cheap to clone
/// and inert until an operation runs.
#[derive(Clone)]
pub struct MotorCollection {
    client: MotorClient,
    ns: Namespace,
}

impl MotorCollection {
    pub(crate) fn new(
        client: MotorClient,
        db: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            ns: Namespace::new(db, name),
        }
    }

    /// Name of this collection.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.ns.coll
    }

    /// Fully qualified `db.coll` name.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.ns.to_string()
    }

    /// The namespace this handle addresses.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Insert one document.
    pub async fn insert_one(&self, doc: Document) -> Result<()> {
        self.insert_batch(vec![doc]).await
    }

    /// Insert a batch of documents.
    pub async fn insert_many(&self, docs: Vec<Document>) -> Result<()> {
        if docs.is_empty() {
            return Err(Error::InvalidArgument(
                "insert_many requires at least one document".into(),
            ));
        }
        self.insert_batch(docs).await
    }

    async fn insert_batch(&self, docs: Vec<Document>) -> Result<()> {
        self.client.ensure_connected().await?;
        let ns = self.ns.clone();
        self.client
            .executor()
            .execute(move |conn| conn.insert(&ns, docs))
            .await
    }

    /// Start a query for documents matching `filter`.
    ///
    /// No I/O happens here; the returned stream runs the query on its
    /// first advance, connecting the client first if nothing has yet.
    #[must_use]
    pub fn find(&self, filter: Document) -> CursorStream {
        self.find_with_options(filter, FindOptions::new())
    }

    /// [`MotorCollection::find`] with batch and limit control.
    #[must_use]
    pub fn find_with_options(&self, filter: Document, options: FindOptions) -> CursorStream {
        CursorStream::new(self.client.clone(), self.ns.clone(), filter, &options)
    }

    /// Fetch at most one document matching `filter`.
    pub async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let mut stream = self.find_with_options(filter, FindOptions::new().limit(1));
        if stream.fetch_next().await? {
            Ok(stream.next_object())
        } else {
            Ok(None)
        }
    }

    /// Count documents matching `filter`.
    pub async fn count(&self, filter: Document) -> Result<u64> {
        let command = doc! { "count": self.ns.coll.clone(), "query": filter };
        let reply = self.client.run_command_on(&self.ns.db, command).await?;
        let count = reply
            .get_i64("n")
            .ok()
            .or_else(|| reply.get_i32("n").ok().map(i64::from))
            .ok_or_else(|| Error::InvalidResponse("count reply missing 'n'".into()))?;
        u64::try_from(count)
            .map_err(|_| Error::InvalidResponse(format!("count reply carried negative n: {count}")))
    }

    /// Drop this collection.
    ///
    /// Dropping a collection that does not exist is not an error.
    pub async fn drop(&self) -> Result<()> {
        let command = doc! { "drop": self.ns.coll.clone() };
        match self.client.run_command_on(&self.ns.db, command).await {
            Ok(_) => Ok(()),
            Err(Error::Operation {
                code: Some(NS_NOT_FOUND),
                ..
            }) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for MotorCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorCollection")
            .field("namespace", &self.ns)
            .finish_non_exhaustive()
    }
}
