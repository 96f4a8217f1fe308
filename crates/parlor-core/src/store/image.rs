//! Uploaded image storage — write-once files named `<uuid><ext>`.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::ImageAsset;
use crate::utils;

/// URL prefix of the references handed back to callers.
pub const IMAGE_URL_PREFIX: &str = "/images/";

/// Stores raw image bytes. Assets are never deduplicated or deleted.
#[derive(Debug)]
pub struct ImageStore {
    images_dir: PathBuf,
}

impl ImageStore {
    /// Open a store rooted at `images_dir`, creating the directory if needed.
    pub fn new(images_dir: impl Into<PathBuf>) -> Result<Self> {
        let images_dir = images_dir.into();
        std::fs::create_dir_all(&images_dir).map_err(|e| Error::io(&images_dir, e))?;
        Ok(ImageStore { images_dir })
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Persist an uploaded image.
    ///
    /// The content type is checked before anything touches the disk.
    pub async fn store(
        &self,
        bytes: &[u8],
        content_type: &str,
        original_name: &str,
    ) -> Result<ImageAsset> {
        if !content_type.starts_with("image/") {
            return Err(Error::Validation(format!(
                "only image files allowed, got '{content_type}'"
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let file_name = format!("{}{}", id, utils::extension_with_dot(original_name));
        let path = self.images_dir.join(&file_name);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::io(&path, e))?;

        debug!(
            id = %id,
            name = original_name,
            bytes = bytes.len(),
            path = %path.display(),
            "Stored image"
        );

        Ok(ImageAsset {
            id,
            original_name: original_name.to_string(),
            url: format!("{IMAGE_URL_PREFIX}{file_name}"),
            path,
        })
    }

    /// Map a reference (`/images/<file>`) back to its file on disk.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let file_name = reference
            .strip_prefix(IMAGE_URL_PREFIX)
            .filter(|name| utils::is_safe_filename(name))
            .ok_or_else(|| Error::Validation(format!("not an image reference: '{reference}'")))?;
        Ok(self.images_dir.join(file_name))
    }

    /// Read the bytes behind a reference.
    pub async fn read(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.resolve(reference)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("image '{reference}'")))
            }
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    /// URL a provider can fetch: local references become base64 `data:` URIs,
    /// anything else is returned unchanged.
    pub async fn provider_url(&self, image_url: &str) -> Result<String> {
        if !image_url.starts_with(IMAGE_URL_PREFIX) {
            return Ok(image_url.to_string());
        }
        let bytes = self.read(image_url).await?;
        let mime = utils::image_content_type(image_url).unwrap_or("application/octet-stream");
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }
}
