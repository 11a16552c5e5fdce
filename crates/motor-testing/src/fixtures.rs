//! Test fixture utilities.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

use motor_sync::{Document, doc};

/// Install a tracing subscriber for the test binary, once.
///
/// Respects `RUST_LOG`; output goes through the test writer so it only
/// shows for failing tests.
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Generate `count` sample documents: `{ "_id": i, "s": "<i in hex>" }`.
#[must_use]
pub fn sample_docs(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| doc! { "_id": i as i32, "s": format!("{i:x}") })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn sample_docs_are_stable() {
        let docs = sample_docs(3);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[2], doc! { "_id": 2, "s": "2" });
        assert_eq!(sample_docs(17)[16], doc! { "_id": 16, "s": "10" });
    }
}
