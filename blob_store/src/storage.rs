//! Streaming blob storage over `object_store` backends.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use object_store::{
    aws::AmazonS3Builder,
    azure::MicrosoftAzureBuilder,
    parse_url,
    path::Path,
    Attribute,
    Attributes,
    BackoffConfig,
    ObjectStore,
    ObjectStoreScheme,
    PutMultipartOptions,
    RetryConfig,
    WriteMultipart,
};
use sha2::{Digest, Sha256};
use tracing::info;
use url::Url;

use crate::{
    config::BlobStorageConfig,
    error::{BlobError, BlobResult},
};

/// Auxiliary fields attached to an uploaded blob.
///
/// `metadata` pairs become backend-specific user metadata on schemes that
/// support attributes; they are skipped on the local filesystem backend,
/// which rejects them.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: Vec<(String, String)>,
}

/// Result of a PUT operation.
#[derive(Debug, Clone)]
pub struct PutResult {
    /// Total bytes written.
    pub size_bytes: u64,

    /// SHA-256 of the data, computed while it streamed through.
    pub sha256_hash: String,
}

/// An open download: a chunk stream plus what the backend knows about it.
///
/// The stream owns the backend connection; dropping it on any exit path
/// (full relay, client disconnect, error) releases it exactly once.
pub struct GetBlob {
    pub stream: BoxStream<'static, BlobResult<Bytes>>,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
}

/// Core blob store operations.
///
/// The production implementation is [`ObjectStoreBlobStorage`]; tests swap
/// in stubs. Implementations must be safe for concurrent use from many
/// request tasks at once.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stream `data` into the blob stored under `key`, replacing any
    /// existing blob with that key.
    async fn put(
        &self,
        key: &str,
        data: BoxStream<'_, Result<Bytes>>,
        opts: PutOptions,
    ) -> BlobResult<PutResult>;

    /// Open the blob stored under `key` for streaming download.
    async fn get(&self, key: &str) -> BlobResult<GetBlob>;
}

/// Production [`BlobStore`] backed by any `object_store` implementation.
pub struct ObjectStoreBlobStorage {
    object_store: Arc<dyn ObjectStore>,
    path: Path,
    supports_attributes: bool,
}

impl ObjectStoreBlobStorage {
    /// Build the backend client from config and verify it is reachable.
    ///
    /// A failure here is a startup failure: the caller is expected to treat
    /// it as fatal rather than serve with an unusable backend.
    pub async fn new(config: BlobStorageConfig) -> BlobResult<Self> {
        let (object_store, path, scheme) = build_object_store(&config)?;
        let storage = Self {
            object_store: Arc::from(object_store),
            path,
            supports_attributes: scheme_supports_attributes(&scheme),
        };
        storage.verify_reachable().await?;
        info!(path = %config.path, "connected to blob storage");
        Ok(storage)
    }

    /// Issue a HEAD for a probe key. Not-found means the store answered,
    /// which is all the readiness gate needs; any other error propagates.
    async fn verify_reachable(&self) -> BlobResult<()> {
        let probe = self.path.child("_blobgate_probe");
        match self.object_store.head(&probe).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(err) => Err(BlobError::from(err)),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStorage {
    async fn put(
        &self,
        key: &str,
        data: BoxStream<'_, Result<Bytes>>,
        opts: PutOptions,
    ) -> BlobResult<PutResult> {
        let mut hasher = Sha256::new();
        let mut hashed_stream = data.map(|item| {
            item.map(|bytes| {
                hasher.update(&bytes);
                bytes
            })
        });

        let mut put_opts = PutMultipartOptions::default();
        if self.supports_attributes {
            let mut attributes = Attributes::new();
            if let Some(content_type) = &opts.content_type {
                attributes.insert(Attribute::ContentType, content_type.clone().into());
            }
            for (name, value) in &opts.metadata {
                attributes.insert(Attribute::Metadata(name.clone().into()), value.clone().into());
            }
            put_opts.attributes = attributes;
        }

        let path = self.path.child(key);
        let upload = self.object_store.put_multipart_opts(&path, put_opts).await?;
        let mut writer = WriteMultipart::new(upload);
        let mut size_bytes = 0u64;
        while let Some(chunk) = hashed_stream.next().await {
            let chunk = chunk.map_err(BlobError::from)?;
            writer.wait_for_capacity(1).await?;
            size_bytes += chunk.len() as u64;
            writer.write(&chunk);
        }
        writer.finish().await?;

        Ok(PutResult {
            size_bytes,
            sha256_hash: format!("{:x}", hasher.finalize()),
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetBlob> {
        let path = self.path.child(key);
        let result = self.object_store.get(&path).await?;
        let size_bytes = Some(result.meta.size);
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.to_string());
        // Mapped directly into the response body, no relay task: the
        // stream stays bounded by the backend chunk size.
        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(BlobError::from))
            .boxed();
        Ok(GetBlob {
            stream,
            content_type,
            size_bytes,
        })
    }
}

fn build_object_store(
    config: &BlobStorageConfig,
) -> BlobResult<(Box<dyn ObjectStore>, Path, ObjectStoreScheme)> {
    let url: Url = config.path.parse().map_err(|err: url::ParseError| BlobError::InvalidUri {
        uri: config.path.clone(),
        reason: err.to_string(),
    })?;
    let (scheme, path) = ObjectStoreScheme::parse(&url).map_err(|err| BlobError::InvalidUri {
        uri: config.path.clone(),
        reason: err.to_string(),
    })?;

    let object_store: Box<dyn ObjectStore> = match scheme {
        ObjectStoreScheme::AmazonS3 => {
            let mut builder = AmazonS3Builder::from_env()
                .with_url(config.path.as_str())
                .with_retry(transfer_retry_config());
            if let Some(region) = &config.region {
                builder = builder.with_region(region);
            }
            Box::new(builder.build()?)
        }
        ObjectStoreScheme::MicrosoftAzure => {
            let mut builder = MicrosoftAzureBuilder::from_env()
                .with_url(config.path.as_str())
                .with_retry(transfer_retry_config());
            if let Some(account) = &config.azure_storage_account {
                builder = builder.with_account(account);
            }
            Box::new(builder.build()?)
        }
        _ => {
            let (object_store, _) = parse_url(&url)?;
            object_store
        }
    };
    Ok((object_store, path, scheme))
}

/// Transport-level retry for transient backend errors. Handlers never retry;
/// this is the only retry layer.
fn transfer_retry_config() -> RetryConfig {
    RetryConfig {
        backoff: BackoffConfig {
            init_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(60),
            base: 2.0,
        },
        max_retries: 3,
        retry_timeout: Duration::from_secs(180),
    }
}

fn scheme_supports_attributes(scheme: &ObjectStoreScheme) -> bool {
    // LocalFileSystem rejects put attributes outright.
    matches!(
        scheme,
        ObjectStoreScheme::AmazonS3 |
            ObjectStoreScheme::MicrosoftAzure |
            ObjectStoreScheme::GoogleCloudStorage |
            ObjectStoreScheme::Memory
    )
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunked_stream(chunks: Vec<&'static [u8]>) -> BoxStream<'static, Result<Bytes>> {
        stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk)))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    async fn collect(mut stream: BoxStream<'static, BlobResult<Bytes>>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    async fn memory_storage() -> ObjectStoreBlobStorage {
        ObjectStoreBlobStorage::new(BlobStorageConfig {
            path: "memory:///".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn memory_round_trip_with_attributes() {
        let storage = memory_storage().await;
        let opts = PutOptions {
            content_type: Some("text/plain".to_string()),
            metadata: vec![
                ("original-name".to_string(), "a b.txt".to_string()),
                ("uploaded-by".to_string(), "curl/8.0".to_string()),
            ],
        };
        let put_result = storage
            .put("a_b.txt", chunked_stream(vec![b"hello ", b"world"]), opts)
            .await
            .unwrap();
        assert_eq!(put_result.size_bytes, 11);
        assert_eq!(
            put_result.sha256_hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );

        let blob = storage.get("a_b.txt").await.unwrap();
        assert_eq!(blob.content_type.as_deref(), Some("text/plain"));
        assert_eq!(blob.size_bytes, Some(11));
        assert_eq!(collect(blob.stream).await, b"hello world");
    }

    #[tokio::test]
    async fn put_overwrites_existing_key() {
        let storage = memory_storage().await;
        storage
            .put("report.csv", chunked_stream(vec![b"first"]), PutOptions::default())
            .await
            .unwrap();
        storage
            .put("report.csv", chunked_stream(vec![b"second"]), PutOptions::default())
            .await
            .unwrap();

        let blob = storage.get("report.csv").await.unwrap();
        assert_eq!(collect(blob.stream).await, b"second");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let storage = memory_storage().await;
        match storage.get("nope.txt").await {
            Err(BlobError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|_| "blob")),
        }
    }

    #[tokio::test]
    async fn local_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = ObjectStoreBlobStorage::new(BlobStorageConfig {
            path: format!("file://{}", temp_dir.path().join("blobs").to_str().unwrap()),
            ..Default::default()
        })
        .await
        .unwrap();

        // Local filesystem stores no attributes; bytes still round-trip.
        storage
            .put(
                "notes.txt",
                chunked_stream(vec![b"local ", b"bytes"]),
                PutOptions {
                    content_type: Some("text/plain".to_string()),
                    metadata: vec![],
                },
            )
            .await
            .unwrap();

        let blob = storage.get("notes.txt").await.unwrap();
        assert_eq!(blob.content_type, None);
        assert_eq!(blob.size_bytes, Some(11));
        assert_eq!(collect(blob.stream).await, b"local bytes");
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let result = ObjectStoreBlobStorage::new(BlobStorageConfig {
            path: "not a url".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(BlobError::InvalidUri { .. })));
    }
}
