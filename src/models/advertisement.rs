use serde::{Deserialize, Serialize};

use crate::media::MediaStorage;

/// A generated marketplace listing together with the inputs it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Advertisement {
    pub id: i64,
    pub description: String,
    pub image_description: String,
    pub generated_content: String,
    pub image: Option<String>,
}

impl Advertisement {
    pub fn with_media_url(mut self, media: &MediaStorage) -> Self {
        self.image = self.image.map(|path| media.url(&path));
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewAdvertisement {
    pub description: String,
    pub image_description: String,
    pub generated_content: String,
    /// Path relative to the media root, already written to storage.
    pub image: Option<String>,
}
