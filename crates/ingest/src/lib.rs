//! docstream ingest layer.
//!
//! This is where documents enter the pipeline. A notification names one or
//! more objects; we resolve which ones to process and read each as text.
//!
//! ## What we do here
//!
//! - **Parse notifications** - S3-style `Records` JSON into [`NotificationEvent`]
//! - **Resolve locations** - decode object keys, drop control characters from
//!   bucket names, honour [`RecordSelection`]
//! - **Fetch** - read the object through an [`ObjectStore`], rejecting
//!   content that is not UTF-8
//! - **Log everything** - structured `fetch_success` / `fetch_failure` events
//!
//! ## Example
//!
//! ```
//! use ingest::{fetch, InMemoryObjectStore, NotificationEvent, RecordSelection};
//!
//! let store = InMemoryObjectStore::new();
//! store.put_object("inbound", "item 1.xml", "<Item/>");
//!
//! let event = NotificationEvent::from_json(
//!     r#"{"Records":[{"s3":{"bucket":{"name":"inbound"},"object":{"key":"item+1.xml"}}}]}"#,
//! )?;
//! let location = &event.locations(RecordSelection::First)?[0];
//! let document = fetch(&store, location)?;
//! assert_eq!(document.text, "<Item/>");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::time::Instant;

use tracing::{info, warn, Level};

mod error;
mod event;
mod store;

pub use crate::error::{EventError, FetchError};
pub use crate::event::{
    decode_object_key, BucketEntity, NotificationEvent, NotificationRecord, ObjectEntity,
    ObjectLocation, RecordSelection, S3Entity,
};
pub use crate::store::{FsObjectStore, InMemoryObjectStore, ObjectStore};

/// Text of one fetched object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub location: ObjectLocation,
    pub text: String,
}

impl RawDocument {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Read the object at `location` as UTF-8 text.
pub fn fetch(store: &dyn ObjectStore, location: &ObjectLocation) -> Result<RawDocument, FetchError> {
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "ingest.fetch",
        bucket = %location.bucket,
        key = %location.key
    );
    let _guard = span.enter();

    match store.get_object(&location.bucket, &location.key) {
        Ok(text) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(bytes = text.len(), elapsed_micros, "fetch_success");
            Ok(RawDocument {
                location: location.clone(),
                text,
            })
        }
        Err(err) => {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %err, elapsed_micros, "fetch_failure");
            Err(err)
        }
    }
}
