//! # Local media storage
//!
//! Uploads live under a root directory, sharded by the SHA-256 of their key
//! (`ab/cd/abcd…`). Every upload is decoded once to prove it is an image,
//! and a 250px WebP thumbnail is written next to it.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{DomainError, MediaStorage, MediaUpload, Result, StoredMedia};
use image::{DynamicImage, ImageFormat, ImageReader};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::{join_url, THUMBNAIL_PREFIX};

pub const THUMBNAIL_SIZE: u32 = 250;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g. "./data/media")
    root: PathBuf,
    /// Public URL prefix (e.g. "/media")
    url_prefix: String,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>, max_bytes: usize) -> Self {
        Self { root: root.into(), url_prefix: url_prefix.into(), max_bytes }
    }

    fn sharded_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        let mut path = self.root.clone();
        path.push(&hash[0..2]);
        path.push(&hash[2..4]);
        path.push(&hash);
        path
    }

    fn thumbnail_path(original: &Path) -> PathBuf {
        let name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        original.with_file_name(format!("thumb_{name}.webp"))
    }
}

/// Decodes the upload and renders its thumbnail. CPU bound.
fn render_thumbnail(data: &[u8]) -> Result<Vec<u8>> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(DomainError::internal)?
        .decode()
        .map_err(|_| DomainError::validation("The attached file is not a supported image."))?;

    let thumb = DynamicImage::ImageRgba8(img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgba8());
    let mut out = Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, ImageFormat::WebP)
        .map_err(DomainError::internal)?;
    Ok(out.into_inner())
}

fn sniff_content_type(key: &str, data: &[u8]) -> mime::Mime {
    image::guess_format(data)
        .ok()
        .and_then(|f| f.to_mime_type().parse().ok())
        .unwrap_or_else(|| mime_guess::from_path(key).first_or_octet_stream())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DomainError::internal(format!("remove {}: {e}", path.display()))),
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStore {
    async fn put(&self, key: &str, upload: MediaUpload) -> Result<StoredMedia> {
        if upload.bytes.len() > self.max_bytes {
            return Err(DomainError::validation("The image is too large."));
        }

        let data = upload.bytes.clone();
        let thumb = tokio::task::spawn_blocking(move || render_thumbnail(&data))
            .await
            .map_err(DomainError::internal)??;

        let target = self.sharded_path(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(DomainError::internal)?;
        }
        fs::write(&target, &upload.bytes).await.map_err(DomainError::internal)?;
        fs::write(Self::thumbnail_path(&target), thumb)
            .await
            .map_err(DomainError::internal)?;

        debug!(key, path = %target.display(), "media stored");
        Ok(StoredMedia {
            key: key.to_string(),
            url: self.url(key),
            thumbnail_url: self.thumbnail_url(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let target = self.sharded_path(key);
        remove_if_present(&Self::thumbnail_path(&target)).await?;
        remove_if_present(&target).await
    }

    async fn read(&self, key: &str) -> Result<Option<(Bytes, mime::Mime)>> {
        let (path, thumbnail) = match key.strip_prefix(THUMBNAIL_PREFIX) {
            Some(original) => (Self::thumbnail_path(&self.sharded_path(original)), true),
            None => (self.sharded_path(key), false),
        };

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DomainError::internal(e)),
        };
        let content_type = if thumbnail {
            "image/webp".parse().unwrap_or(mime::IMAGE_STAR)
        } else {
            sniff_content_type(key, &data)
        };
        Ok(Some((Bytes::from(data), content_type)))
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.url_prefix, key)
    }

    fn thumbnail_url(&self, key: &str) -> String {
        join_url(&self.url_prefix, &format!("{THUMBNAIL_PREFIX}{key}"))
    }
}
