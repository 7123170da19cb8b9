//! Loft Store - storage collaborators for the Loft generation service
//!
//! Provides the blob store (durable, publicly readable assets with
//! canonical URLs), asset ingestion (inline base64 and remote fetch),
//! the per-user quota ledger, and the platform services bundle that
//! ties them together.

pub mod blob;
pub mod ingest;
pub mod ledger;
pub mod platform;

pub use blob::{BlobStore, FsBlobStore, StoredObject};
pub use ingest::{fetch_to_storage, store_base64_image, strip_data_uri, HttpFetcher, RemoteFetcher};
pub use ledger::{Account, QuotaInfo, QuotaLedger, ResourceKind};
pub use platform::Platform;
