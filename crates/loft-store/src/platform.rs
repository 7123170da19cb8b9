//! Shared platform services context
//!
//! Constructed once at startup and handed to the ledger consumers,
//! orchestrator, and project store instead of global mutable handles.

use crate::blob::BlobStore;
use crate::ingest::RemoteFetcher;
use crate::ledger::QuotaLedger;
use std::sync::Arc;

/// The storage and accounting collaborators shared across requests
pub struct Platform {
    pub blob: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn RemoteFetcher>,
    pub ledger: QuotaLedger,
}

impl Platform {
    pub fn new(
        blob: Arc<dyn BlobStore>,
        fetcher: Arc<dyn RemoteFetcher>,
        ledger: QuotaLedger,
    ) -> Self {
        Self {
            blob,
            fetcher,
            ledger,
        }
    }
}
