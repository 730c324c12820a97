use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppResult;

pub const PRODUCT_UPLOAD_DIR: &str = "products";
pub const ADVERTISEMENT_UPLOAD_DIR: &str = "advertisements";

/// Uploaded files on local disk, addressed by paths relative to `root` and
/// published under `url_prefix`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let trimmed = url_prefix.trim_end_matches('/');
        let url_prefix = if trimmed.starts_with('/') || trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        Self {
            root: root.into(),
            url_prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mount point for serving the media directory, e.g. `/media`.
    pub fn mount_path(&self) -> &str {
        &self.url_prefix
    }

    /// Writes `bytes` under `upload_to` with a fresh name and returns the
    /// relative path that gets persisted on the record.
    pub async fn save(&self, upload_to: &str, original_name: &str, bytes: &[u8]) -> AppResult<String> {
        let ext = sniff_image_type(bytes)
            .map(extension_for_mime)
            .or_else(|| extension_from_name(original_name))
            .unwrap_or_else(|| "bin".to_string());

        let dir = self.root.join(upload_to);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&filename), bytes).await?;

        Ok(format!("{}/{}", upload_to, filename))
    }

    pub async fn remove(&self, relative: &str) -> AppResult<()> {
        tokio::fs::remove_file(self.root.join(relative)).await?;
        Ok(())
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.url_prefix, relative.trim_start_matches('/'))
    }
}

/// Identifies JPEG, PNG, GIF and WebP payloads by their leading bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> String {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
    .to_string()
}

/// Extension of a client-supplied filename, restricted to plain alphanumerics.
fn extension_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}
