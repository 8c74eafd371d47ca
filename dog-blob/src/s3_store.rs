use std::env;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::debug;

use crate::{
    BlobError, BlobResult, BlobStore, ObjectEntry, ProgressFn, PutObject, PutResult,
    StoreCapabilities,
};

/// S3-compatible backend settings
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl S3Config {
    /// Read credentials from `DOG_BLOB_S3_*` environment variables.
    /// `DOG_BLOB_S3_ENDPOINT_URL` is optional; when set, path-style addressing
    /// is used so MinIO/RustFS-style servers work out of the box.
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        let endpoint_url = env::var("DOG_BLOB_S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty());
        Ok(Self {
            bucket: get_env("DOG_BLOB_S3_BUCKET")?,
            region: get_env("DOG_BLOB_S3_REGION")?,
            force_path_style: endpoint_url.is_some(),
            endpoint_url,
            access_key_id: get_env("DOG_BLOB_S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("DOG_BLOB_S3_SECRET_ACCESS_KEY")?,
        })
    }
}

/// Status codes with a meaning of their own for a single object
fn status_error(status: Option<u16>, key: &str) -> Option<BlobError> {
    match status? {
        404 => Some(BlobError::not_found(key)),
        412 => Some(BlobError::already_exists(key)),
        _ => None,
    }
}

/// Object store backed by any S3-compatible service
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "dog-blob",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn map_sdk_error<E, R>(err: SdkError<E, R>) -> BlobError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug + Send + Sync + 'static,
    {
        match err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => BlobError::transport(err.to_string()),
            other => BlobError::backend(other),
        }
    }

    /// HTTP status of a failed call, when the service answered at all
    fn http_status<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
        err.raw_response().map(|response| response.status().as_u16())
    }

    fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
        DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()).unwrap_or_else(Utc::now)
    }

    /// `None` when the object was deleted after it was listed
    async fn describe(&self, key: String, last_modified: DateTime<Utc>) -> BlobResult<Option<ObjectEntry>> {
        let head = match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(head) => head,
            Err(err) => {
                return match status_error(Self::http_status(&err), &key) {
                    Some(BlobError::NotFound { .. }) => {
                        debug!("{} vanished before it could be described", key);
                        Ok(None)
                    }
                    _ => Err(Self::map_sdk_error(err)),
                };
            }
        };

        let name = head
            .metadata()
            .and_then(|metadata| metadata.get("filename"))
            .cloned()
            .unwrap_or_else(|| key.clone());

        Ok(Some(ObjectEntry {
            content_type: head.content_type().map(str::to_string),
            key,
            name,
            created_at: last_modified,
        }))
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn list(&self) -> BlobResult<Vec<ObjectEntry>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut listed = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(Self::map_sdk_error)?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let modified = object.last_modified().map(Self::to_chrono).unwrap_or_else(Utc::now);
                listed.push((key.to_string(), modified));
            }
        }

        let described = try_join_all(listed.into_iter().map(|(key, modified)| self.describe(key, modified))).await?;
        let entries: Vec<ObjectEntry> = described.into_iter().flatten().collect();

        debug!("listed {} objects from bucket {}", entries.len(), self.bucket);
        Ok(entries)
    }

    async fn put(&self, object: PutObject, _progress: Option<ProgressFn>) -> BlobResult<PutResult> {
        let size_bytes = object.bytes.len() as u64;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .if_none_match("*")
            .body(AwsByteStream::from(object.bytes));

        if let Some(ct) = &object.content_type {
            request = request.content_type(ct);
        }
        // user metadata travels as an HTTP header
        if let Some(filename) = object.filename.as_deref().filter(|name| name.is_ascii()) {
            request = request.metadata("filename", filename);
        }

        request.send().await.map_err(|err| {
            match status_error(Self::http_status(&err), &object.key) {
                Some(conflict @ BlobError::AlreadyExists { .. }) => conflict,
                _ => Self::map_sdk_error(err),
            }
        })?;

        Ok(PutResult {
            key: object.key,
            size_bytes,
            created_at: Utc::now(),
        })
    }

    async fn sign_get(&self, key: &str, expires_in_secs: u64) -> BlobResult<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(BlobError::backend)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(Self::map_sdk_error)?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_sdk_error)?;
        Ok(())
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::basic().with_signed_urls()
    }
}
