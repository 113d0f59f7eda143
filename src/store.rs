// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{MetadataDirective, ObjectCannedAcl};
use bytes::Bytes;

use crate::error::StoreError;

/// Cache directive applied to every published object
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=300";

/// Content type for the published feed document
pub const FEED_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

/// Options applied when writing an object
#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: String,
    pub public_read: bool,
}

impl PutOptions {
    /// Options for a public audio blob, content type inferred from the extension
    pub fn audio(extension: &str) -> Self {
        Self {
            content_type: content_type_for_extension(extension).to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            public_read: true,
        }
    }

    /// Options for the public feed document
    pub fn feed() -> Self {
        Self {
            content_type: FEED_CONTENT_TYPE.to_string(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            public_read: true,
        }
    }
}

/// Map an audio file extension to its enclosure MIME type
pub fn content_type_for_extension(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "wav" => "audio/wav",
        _ => "audio/mpeg",
    }
}

/// Blob store abstraction for testability.
///
/// The store is a plain key/value namespace; there is no native atomic
/// rename. Copy is guaranteed not to interleave bytes of old and new
/// content from a reader's perspective, which is what the atomic-replace
/// protocol builds on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write an object in full
    async fn put_object(&self, key: &str, body: Bytes, opts: &PutOptions)
    -> Result<(), StoreError>;

    /// Copy an existing object onto another key
    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError>;

    /// Delete an object
    async fn delete_object(&self, key: &str) -> Result<(), StoreError>;

    /// Fetch an object in full. Returns `StoreError::NotFound` for a
    /// missing key.
    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Size in bytes of a stored object. Returns `StoreError::NotFound`
    /// for a missing key.
    async fn head_object(&self, key: &str) -> Result<u64, StoreError>;
}

/// Blob store implementation backed by an S3 bucket
#[derive(Clone)]
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
}

impl S3BlobStore {
    /// Create a store using ambient AWS credentials and region
    pub async fn from_env(bucket: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self {
            client: S3Client::new(&config),
            bucket: bucket.to_string(),
        }
    }

    /// Create a store from an existing client
    pub fn new(client: S3Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn request_error<E>(key: &str, err: E) -> StoreError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Request {
            key: key.to_string(),
            source: Box::new(err),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        opts: &PutOptions,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(&opts.content_type)
            .cache_control(&opts.cache_control);

        if opts.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| Self::request_error(key, e))?;
        Ok(())
    }

    async fn copy_object(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.client
            .copy_object()
            .copy_source(format!("{}/{}", self.bucket, src_key))
            .bucket(&self.bucket)
            .key(dst_key)
            .metadata_directive(MetadataDirective::Copy)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| Self::request_error(dst_key, e))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::request_error(key, e))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StoreError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if let SdkError::ServiceError(ref service) = err
                    && service.err().is_no_such_key()
                {
                    return Err(StoreError::NotFound {
                        key: key.to_string(),
                    });
                }
                return Err(Self::request_error(key, err));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Self::request_error(key, e))?;
        Ok(data.into_bytes())
    }

    async fn head_object(&self, key: &str) -> Result<u64, StoreError> {
        let output = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if let SdkError::ServiceError(ref service) = err
                    && service.err().is_not_found()
                {
                    return Err(StoreError::NotFound {
                        key: key.to_string(),
                    });
                }
                return Err(Self::request_error(key, err));
            }
        };

        let size = output.content_length().unwrap_or_default();
        Ok(size.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_defaults_to_mpeg() {
        assert_eq!(content_type_for_extension("mp3"), "audio/mpeg");
        assert_eq!(content_type_for_extension("MP3"), "audio/mpeg");
        assert_eq!(content_type_for_extension("unknown"), "audio/mpeg");
    }

    #[test]
    fn content_type_for_wav() {
        assert_eq!(content_type_for_extension("wav"), "audio/wav");
        assert_eq!(content_type_for_extension("WAV"), "audio/wav");
    }

    #[test]
    fn audio_put_options_are_public_and_cached() {
        let opts = PutOptions::audio("wav");
        assert_eq!(opts.content_type, "audio/wav");
        assert_eq!(opts.cache_control, DEFAULT_CACHE_CONTROL);
        assert!(opts.public_read);
    }

    #[test]
    fn feed_put_options_use_rss_content_type() {
        let opts = PutOptions::feed();
        assert_eq!(opts.content_type, FEED_CONTENT_TYPE);
        assert!(opts.public_read);
    }
}
