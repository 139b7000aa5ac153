use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client as S3Client;
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};

use crate::core::config::Settings;

/// Fetches the raw bytes behind a submission's `pdf_url`.
#[async_trait]
pub(crate) trait DocumentSource: Send + Sync {
    async fn fetch(&self, location: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DocumentLocation<'a> {
    Url(&'a str),
    ObjectKey(&'a str),
}

impl<'a> DocumentLocation<'a> {
    pub(crate) fn parse(location: &'a str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::Url(location);
        }
        Self::ObjectKey(location.strip_prefix("s3://").map_or(location, |rest| {
            rest.split_once('/').map_or(rest, |(_, key)| key)
        }))
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    client: S3Client,
    name: String,
}

/// HTTP(S) URLs are downloaded directly; anything else is an object key in
/// the configured S3 bucket.
#[derive(Debug, Clone)]
pub(crate) struct DocumentStorage {
    http: HttpClient,
    bucket: Option<Bucket>,
}

impl DocumentStorage {
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build document HTTP client")?;

        let s3 = settings.s3();
        let bucket = if s3.is_configured() {
            let creds = Credentials::new(
                s3.access_key.clone(),
                s3.secret_key.clone(),
                None,
                None,
                "gradeflow-static",
            );
            let config = aws_config::defaults(BehaviorVersion::latest())
                .endpoint_url(s3.endpoint.clone())
                .region(aws_config::Region::new(s3.region.clone()))
                .credentials_provider(creds)
                .load()
                .await;
            Some(Bucket { client: S3Client::new(&config), name: s3.bucket.clone() })
        } else {
            tracing::info!("S3 storage not configured; only URL documents can be fetched");
            None
        };

        Ok(Self { http, bucket })
    }

    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to download document from {url}"))?
            .error_for_status()
            .with_context(|| format!("Document download from {url} was rejected"))?;
        let bytes = response.bytes().await.context("Failed to read document body")?;
        Ok(bytes.to_vec())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let Some(bucket) = &self.bucket else {
            bail!("document {key} is stored in S3 but S3 storage is not configured");
        };

        let object = bucket
            .client
            .get_object()
            .bucket(&bucket.name)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to fetch s3://{}/{key}", bucket.name))?;
        let body = object.body.collect().await.context("Failed to read S3 object body")?;
        Ok(body.into_bytes().to_vec())
    }
}

#[async_trait]
impl DocumentSource for DocumentStorage {
    async fn fetch(&self, location: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = match DocumentLocation::parse(location) {
            DocumentLocation::Url(url) => self.download(url).await?,
            DocumentLocation::ObjectKey(key) => self.get_object(key).await?,
        };

        tracing::debug!(
            location,
            size = bytes.len(),
            sha256 = %hex::encode(Sha256::digest(&bytes)),
            "Fetched submission document"
        );
        Ok(bytes)
    }
}
