//! Asset ingestion: inline base64 payloads and remote fetches into blob storage
//!
//! Image payloads are stored as `image/png`; callers that need another
//! content type pass it through the blob store directly.

use crate::blob::{BlobStore, StoredObject};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use loft_core::{LoftError, Result};
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

const IMAGE_CONTENT_TYPE: &str = "image/png";

/// Fetches remote bytes on behalf of the ingestion layer.
///
/// Behind a trait so pipelines can run against a stub without the network.
pub trait RemoteFetcher: Send + Sync {
    /// GET `url` and return the response bytes. A non-2xx status is
    /// `LoftError::Upstream` carrying the status and body.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// ureq-backed fetcher with a global per-request timeout.
///
/// GETs are idempotent, so transient transport failures are retried with
/// exponential backoff. Status errors are returned as-is.
#[derive(Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        for attempt in 0..MAX_RETRIES {
            let agent = build_agent();
            let response = agent.get(url).call();

            match response {
                Ok(ok) => {
                    let status = ok.status();
                    let mut reader = ok.into_body().into_reader();
                    let mut bytes = Vec::new();
                    std::io::Read::read_to_end(&mut reader, &mut bytes).map_err(|e| {
                        LoftError::Upstream {
                            status: status.as_u16(),
                            body: format!("Failed to read response body: {}", e),
                        }
                    })?;

                    if !status.is_success() {
                        return Err(LoftError::Upstream {
                            status: status.as_u16(),
                            body: String::from_utf8_lossy(&bytes).into_owned(),
                        });
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(LoftError::Upstream {
                        status: 0,
                        body: format!("Fetch failed: {}", e),
                    });
                }
            }
        }

        Err(LoftError::Upstream {
            status: 0,
            body: "Fetch failed after retries".to_string(),
        })
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build();
    config.into()
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    matches!(
        e,
        ureq::Error::Timeout(_)
            | ureq::Error::Io(_)
            | ureq::Error::ConnectionFailed
            | ureq::Error::HostNotFound
    )
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}

/// Decode an inline base64 image (optionally wrapped in a data-URI prefix)
/// and store it at `path`, returning the stored object.
pub fn store_base64_image(
    blob: &dyn BlobStore,
    path: &str,
    data: &str,
) -> Result<StoredObject> {
    let encoded = strip_data_uri(data);
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| LoftError::Validation(format!("Invalid base64 image data: {}", e)))?;

    blob.put(path, &bytes, IMAGE_CONTENT_TYPE)
}

/// Download a remote image and persist it at `path`.
///
/// Provider result URLs are not assumed durable; this is how generated
/// images become owned, stable assets.
pub fn fetch_to_storage(
    blob: &dyn BlobStore,
    fetcher: &dyn RemoteFetcher,
    url: &str,
    path: &str,
) -> Result<StoredObject> {
    let bytes = fetcher.fetch(url)?;
    blob.put(path, &bytes, IMAGE_CONTENT_TYPE)
}

/// Strip a `data:image/...;base64,` prefix if present.
pub fn strip_data_uri(data: &str) -> &str {
    if !data.starts_with("data:") {
        return data;
    }
    match data.find(";base64,") {
        Some(idx) => &data[idx + ";base64,".len()..],
        None => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::FsBlobStore;
    use std::path::PathBuf;

    fn temp_store() -> (FsBlobStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("loft_ingest_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FsBlobStore::new(&dir, "loft-assets", "https://storage.example.com");
        (store, dir)
    }

    struct StubFetcher {
        bytes: Vec<u8>,
    }

    impl RemoteFetcher for StubFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(self.bytes.clone())
        }
    }

    #[test]
    fn test_store_base64_plain() {
        let (store, dir) = temp_store();

        let encoded = STANDARD.encode(b"fake png");
        let obj = store_base64_image(&store, "users/u1/renders/s1-original.png", &encoded).unwrap();

        assert_eq!(obj.content_type, "image/png");
        assert_eq!(
            store.get("users/u1/renders/s1-original.png").unwrap().unwrap(),
            b"fake png"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_base64_data_uri() {
        let (store, dir) = temp_store();

        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(b"wrapped"));
        store_base64_image(&store, "users/u1/renders/x.png", &encoded).unwrap();
        assert_eq!(
            store.get("users/u1/renders/x.png").unwrap().unwrap(),
            b"wrapped"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_store_base64_invalid_is_validation_error() {
        let (store, dir) = temp_store();

        let err = store_base64_image(&store, "users/u1/x.png", "not-base64!!!").unwrap_err();
        assert!(matches!(err, LoftError::Validation(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_fetch_to_storage() {
        let (store, dir) = temp_store();
        let fetcher = StubFetcher {
            bytes: b"downloaded".to_vec(),
        };

        let obj = fetch_to_storage(
            &store,
            &fetcher,
            "https://provider.example.com/out.png",
            "users/u1/renders/s1.png",
        )
        .unwrap();

        assert_eq!(
            obj.url,
            "https://storage.example.com/loft-assets/users/u1/renders/s1.png"
        );
        assert_eq!(
            store.get("users/u1/renders/s1.png").unwrap().unwrap(),
            b"downloaded"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("QUJD"), "QUJD");
        assert_eq!(strip_data_uri("data:text/plain,abc"), "data:text/plain,abc");
    }
}
