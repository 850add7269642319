// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Storage service for payment receipt uploads.
//!
//! Receipts are uploaded before the payment record is written; the record
//! only keeps the download URL.

use dashmap::DashMap;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use std::sync::Arc;

use crate::error::AppError;

/// Reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub bucket: String,
    pub path: String,
}

/// Blob storage service.
#[derive(Clone)]
pub struct BlobStorage {
    bucket: String,

    /// GCS client (None in mock mode)
    client: Option<Arc<Client>>,

    /// Objects kept in memory in mock mode
    objects: Arc<DashMap<String, Vec<u8>>>,
}

impl BlobStorage {
    /// Create a new storage service connected to GCS.
    pub async fn new(bucket: &str) -> Result<Self, AppError> {
        let config = ClientConfig::default().with_auth().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to create GCS auth config: {}", e))
        })?;

        tracing::info!(bucket, "Cloud Storage client initialized");

        Ok(Self {
            bucket: bucket.to_string(),
            client: Some(Arc::new(Client::new(config))),
            objects: Arc::new(DashMap::new()),
        })
    }

    /// Create an in-memory storage service for testing and local runs.
    pub fn new_mock() -> Self {
        Self {
            bucket: "mock-bucket".to_string(),
            client: None,
            objects: Arc::new(DashMap::new()),
        }
    }

    /// Upload `data` under `path`.
    pub async fn upload(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobRef, AppError> {
        let size = data.len();

        match &self.client {
            None => {
                self.objects.insert(path.to_string(), data);
            }
            Some(client) => {
                let mut media = Media::new(path.to_string());
                media.content_type = content_type.to_string().into();

                client
                    .upload_object(
                        &UploadObjectRequest {
                            bucket: self.bucket.clone(),
                            ..Default::default()
                        },
                        data,
                        &UploadType::Simple(media),
                    )
                    .await
                    .map_err(|e| AppError::Storage(format!("Upload failed: {}", e)))?;
            }
        }

        tracing::debug!(bucket = %self.bucket, path, size, "Object uploaded");

        Ok(BlobRef {
            bucket: self.bucket.clone(),
            path: path.to_string(),
        })
    }

    /// Retrievable URL for an uploaded object.
    pub fn download_url(&self, blob: &BlobRef) -> String {
        if self.client.is_none() {
            return format!("memory://{}/{}", blob.bucket, blob.path);
        }
        format!(
            "https://storage.googleapis.com/download/storage/v1/b/{}/o/{}?alt=media",
            blob.bucket,
            urlencoding::encode(&blob.path)
        )
    }

    /// Bytes of an object stored in mock mode.
    pub fn mock_object(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.get(path).map(|entry| entry.value().clone())
    }
}
