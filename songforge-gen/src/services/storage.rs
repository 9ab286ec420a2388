//! Object storage adapter (S3-compatible, Cloudflare R2 in production)
//!
//! Artifact keys are opaque strings chosen by the generation backend; this
//! adapter only stores, checks, deletes, and issues retrieval URLs for them.
//! With a public base URL configured the retrieval URL is a deterministic
//! join; otherwise it is a time-bounded presigned GET.

use crate::config::StorageConfig;
use crate::error::GenResult;
use crate::ports::ArtifactStore;
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::time::Duration;

/// `ArtifactStore` adapter over an S3-compatible bucket
pub struct R2ArtifactStore {
    store: AmazonS3,
    public_base_url: Option<String>,
    url_expiry: Duration,
}

impl R2ArtifactStore {
    pub fn new(config: &StorageConfig) -> GenResult<Self> {
        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint_url.clone())
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket_name.clone())
            .with_access_key_id(config.access_key_id.clone())
            .with_secret_access_key(config.secret_access_key.clone())
            .with_virtual_hosted_style_request(false)
            .build()?;

        Ok(Self {
            store,
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|base| base.trim_end_matches('/').to_string()),
            url_expiry: Duration::from_secs(config.url_expiry_secs),
        })
    }
}

#[async_trait]
impl ArtifactStore for R2ArtifactStore {
    async fn presigned_url(&self, key: &str) -> GenResult<String> {
        // Stable public base configured: direct URL, no signing
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{base}/{key}"));
        }

        let url = self
            .store
            .signed_url(http::Method::GET, &ObjectPath::from(key), self.url_expiry)
            .await?;
        Ok(url.to_string())
    }

    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> GenResult<String> {
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&ObjectPath::from(key), PutPayload::from(bytes), options)
            .await?;

        tracing::debug!(key, "Artifact uploaded");
        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> GenResult<bool> {
        match self.store.head(&ObjectPath::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> GenResult<()> {
        self.store.delete(&ObjectPath::from(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_config(public_base_url: Option<&str>) -> StorageConfig {
        StorageConfig {
            endpoint_url: "https://acct.r2.cloudflarestorage.com".into(),
            region: "auto".into(),
            bucket_name: "songforge".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            public_base_url: public_base_url.map(String::from),
            url_expiry_secs: 3600,
        }
    }

    #[tokio::test]
    async fn test_public_base_short_circuits_signing() {
        let store = R2ArtifactStore::new(&store_config(Some("https://cdn.example.com"))).unwrap();
        let url = store.presigned_url("audio/1.wav").await.unwrap();
        assert_eq!(url, "https://cdn.example.com/audio/1.wav");
    }

    #[tokio::test]
    async fn test_public_base_trailing_slash_normalized() {
        let store = R2ArtifactStore::new(&store_config(Some("https://cdn.example.com/"))).unwrap();
        let url = store.presigned_url("audio/1.wav").await.unwrap();
        assert_eq!(url, "https://cdn.example.com/audio/1.wav");
    }

    #[tokio::test]
    async fn test_signed_url_is_time_bounded() {
        // No public base: the URL must be a presigned request against the
        // bucket endpoint, carrying an expiry.
        let store = R2ArtifactStore::new(&store_config(None)).unwrap();
        let url = store.presigned_url("audio/1.wav").await.unwrap();
        assert!(url.contains("audio/1.wav"));
        assert!(url.contains("X-Amz-Expires=3600"), "unexpected url: {url}");
    }
}
