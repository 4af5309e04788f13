//! Media kept in a map. Thumbnails are the original bytes.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use domains::{MediaStorage, MediaUpload, Result, StoredMedia};

use crate::{join_url, THUMBNAIL_PREFIX};

pub struct MemoryMedia {
    objects: DashMap<String, (Bytes, mime::Mime)>,
    url_prefix: String,
}

impl MemoryMedia {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self { objects: DashMap::new(), url_prefix: url_prefix.into() }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl MediaStorage for MemoryMedia {
    async fn put(&self, key: &str, upload: MediaUpload) -> Result<StoredMedia> {
        self.objects
            .insert(key.to_string(), (upload.bytes, upload.content_type));
        Ok(StoredMedia {
            key: key.to_string(),
            url: self.url(key),
            thumbnail_url: self.thumbnail_url(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.remove(key);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<(Bytes, mime::Mime)>> {
        let key = key.strip_prefix(THUMBNAIL_PREFIX).unwrap_or(key);
        Ok(self.objects.get(key).map(|entry| entry.value().clone()))
    }

    fn url(&self, key: &str) -> String {
        join_url(&self.url_prefix, key)
    }

    fn thumbnail_url(&self, key: &str) -> String {
        join_url(&self.url_prefix, &format!("{THUMBNAIL_PREFIX}{key}"))
    }
}
