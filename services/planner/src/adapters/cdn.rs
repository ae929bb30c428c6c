//! services/planner/src/adapters/cdn.rs
//!
//! This module contains the adapter for the Cloudinary image CDN.
//! It implements the `ImageCdn` port from the `core` crate using unsigned
//! uploads, so no API secret ever lives on the client.

use async_trait::async_trait;
use bytes::Bytes;
use planner_core::{ImageCdn, PortError, PortResult, UploadOptions, UploadedImage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ImageCdn` port using the Cloudinary upload API.
#[derive(Clone)]
pub struct CloudinaryCdn {
    client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

impl CloudinaryCdn {
    /// Creates a new `CloudinaryCdn`.
    pub fn new(client: reqwest::Client, cloud_name: String, upload_preset: String) -> Self {
        Self {
            client,
            cloud_name,
            upload_preset,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        )
    }
}

//=========================================================================================
// `ImageCdn` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageCdn for CloudinaryCdn {
    async fn upload(&self, image: Bytes, options: &UploadOptions) -> PortResult<UploadedImage> {
        let file = Part::bytes(image.to_vec())
            .file_name(format!("{}.{}", options.public_id, options.format))
            .mime_str("image/jpeg")
            .map_err(|e| PortError::Remote(e.to_string()))?;

        let form = Form::new()
            .part("file", file)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", options.folder.clone())
            .text("public_id", options.public_id.clone())
            .text("format", options.format.clone())
            .text("quality", options.quality.clone());

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| PortError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortError::Remote(format!("Upload failed: {} - {}", status, body)));
        }

        let result: UploadResponse = response
            .json()
            .await
            .map_err(|e| PortError::Decode(e.to_string()))?;
        info!("Image uploaded to CDN: {}", result.secure_url);

        Ok(UploadedImage {
            secure_url: result.secure_url,
            public_id: result.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> PortResult<()> {
        // Deletion needs a signed request, which needs the API secret.
        warn!("Skipping CDN deletion of {}: signed deletion is not available", public_id);
        Ok(())
    }

    async fn exists(&self, url: &str) -> PortResult<bool> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| PortError::Remote(e.to_string()))?;
        Ok(response.status().is_success())
    }
}
