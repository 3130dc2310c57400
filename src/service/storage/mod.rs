mod errors;
#[cfg(test)]
mod tests;

pub use errors::StorageServiceError;

use autometrics::autometrics;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

#[derive(clap::Args, Debug)]
pub struct StorageServiceConfig {
    /// Directory where charts are written before upload, and served from.
    #[clap(long, env, required = true, help_heading = "Chart storage")]
    pub storage_dir: PathBuf,

    /// S3 bucket charts are uploaded to. Charts are only kept locally if no
    /// bucket is configured.
    #[clap(long, env, help_heading = "Chart storage")]
    pub s3_bucket: Option<String>,

    /// Region of the S3 bucket. Defaults to the region of the environment.
    #[clap(long, env, help_heading = "Chart storage")]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint, for S3 compatible stores.
    #[clap(long, env, help_heading = "Chart storage")]
    pub s3_endpoint: Option<Url>,

    /// Prefix under which charts are uploaded.
    #[clap(long, env, default_value = "imgs", help_heading = "Chart storage")]
    pub s3_prefix: String,
}

/// Uploads charts to an S3 bucket.
pub struct ChartUploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl ChartUploader {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    /// Creates a client from the environment's AWS configuration.
    ///
    /// The SDK's own retries are disabled, uploads are retried once by
    /// [`ChartUploader::upload`] instead.
    pub async fn from_config(config: &StorageServiceConfig, bucket: String) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.s3_region.clone() {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = config.s3_endpoint.as_ref() {
            s3_config = s3_config
                .endpoint_url(endpoint.as_str())
                .force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(s3_config.build());

        Self::new(client, bucket, config.s3_prefix.clone())
    }

    pub fn key(&self, name: &str) -> String {
        format!("{}/{name}", self.prefix.trim_end_matches('/'))
    }

    /// Uploads the chart image, retrying once before giving up.
    pub async fn upload(&self, name: &str, image: &[u8]) -> Result<String, StorageServiceError> {
        let key = self.key(name);

        if let Err(err) = self.put(&key, image).await {
            warn!(%err, key, "Chart upload failed, retrying");
            self.put(&key, image).await?;
        }

        Ok(key)
    }

    async fn put(&self, key: &str, image: &[u8]) -> Result<(), StorageServiceError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/png")
            .body(ByteStream::from(image.to_vec()))
            .send()
            .await
            .map_err(|err| StorageServiceError::Upload(DisplayErrorContext(&err).to_string()))?;

        Ok(())
    }
}

pub struct StorageService {
    storage_dir: PathBuf,
    uploader: Option<ChartUploader>,
}

impl StorageService {
    pub fn new(storage_dir: PathBuf, uploader: Option<ChartUploader>) -> Self {
        Self {
            storage_dir,
            uploader,
        }
    }

    pub async fn from_config(config: StorageServiceConfig) -> Self {
        let uploader = match config.s3_bucket.clone() {
            Some(bucket) => {
                info!(bucket, prefix = config.s3_prefix, "Uploading charts to S3");
                Some(ChartUploader::from_config(&config, bucket).await)
            }
            None => {
                info!("No S3 bucket configured, charts are only stored locally");
                None
            }
        };

        Self::new(config.storage_dir, uploader)
    }

    /// Returns the local path of the chart with the given name.
    ///
    /// Names come from alert fingerprints and request paths, so anything
    /// that could escape the storage directory is rejected.
    pub fn chart_path(&self, name: &str) -> Result<PathBuf, StorageServiceError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0']);

        if valid {
            Ok(self.storage_dir.join(name))
        } else {
            Err(StorageServiceError::InvalidName(name.to_owned()))
        }
    }

    /// Stores the image under `name`, then uploads it if a bucket is
    /// configured.
    ///
    /// The image is written to a scratch file unique to this call and renamed
    /// into place, so concurrent requests never see partial charts. Uploads
    /// send this call's image, never the shared file another call may have
    /// replaced in the meantime.
    #[autometrics]
    #[instrument(err, skip(self, image), fields(size = image.len()))]
    pub async fn store(&self, name: &str, image: Vec<u8>) -> Result<(), StorageServiceError> {
        let path = self.chart_path(name)?;
        let scratch_path = self
            .storage_dir
            .join(format!(".{name}.{}.tmp", Uuid::new_v4()));

        debug!(scratch_path = %scratch_path.display(), "Writing chart");

        if let Err(err) = write_and_rename(&scratch_path, &path, &image).await {
            let _ = tokio::fs::remove_file(&scratch_path).await;
            return Err(err.into());
        }

        if let Some(uploader) = self.uploader.as_ref() {
            let key = uploader.upload(name, &image).await?;
            info!(key, "Uploaded chart");
        }

        Ok(())
    }
}

async fn write_and_rename(scratch_path: &Path, path: &Path, image: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(scratch_path, image).await?;
    tokio::fs::rename(scratch_path, path).await
}
