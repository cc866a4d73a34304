//! # dog-blobstore: streaming blob storage
//!
//! `dog-blobstore` defines how blob data is handed to a store and how it comes
//! back out. Data always travels as a stream of byte chunks, so large blobs are
//! never buffered in full.
//!
//! ## Key Features
//!
//! - **BlobInput**: a data stream plus its size (when known) and content type
//! - **BlobStore**: store, inspect, retrieve (optionally conditional) and delete
//! - **Atomic writes**: a failed store never leaves a partial blob behind
//! - **Backends**: local filesystem and in-memory, selectable from config
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dog_blobstore::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = FileSystemBlobStore::open(FileSystemStoreConfig::new("/var/lib/blobs")).await?;
//! let path = BlobPath::new("reports/2019/03.txt")?;
//!
//! // Size known in advance, explicit content type
//! let input = BlobInput::from_bytes("Lorem ipsum", Some(ContentType::parse("text/plain")?));
//! store.store(&path, input, false).await?;
//!
//! let metadata = store.get_metadata(&path).await?;
//! let blob = store.retrieve(&metadata).await?;
//! let data = blob.bytes().await?;
//! # Ok(())
//! # }
//! ```

mod clock;
mod config;
mod content_type;
mod digest;
mod error;
pub mod filesystem;
pub mod input;
mod memory;
mod metadata;
mod path;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{build_stores, MemoryStoreConfig, StoreConfig};
pub use content_type::ContentType;
pub use digest::{DigestAlgorithm, Digester};
pub use error::{BlobError, BlobResult};
pub use filesystem::{FileSystemBlobStore, FileSystemStoreConfig};
pub use input::{BlobInput, ByteStream};
pub use memory::MemoryBlobStore;
pub use metadata::{Blob, BlobMetadata, StoreId};
pub use path::BlobPath;
pub use store::{BlobStore, RetrieveConditions};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Blob, BlobError, BlobInput, BlobMetadata, BlobPath, BlobResult, BlobStore, ByteStream,
        ContentType, FileSystemBlobStore, FileSystemStoreConfig, MemoryBlobStore,
        RetrieveConditions,
    };
}
