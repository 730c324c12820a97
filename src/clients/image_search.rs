use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ensure_success, http_error, ClientError, ImageSearchParams, ImageSearchResult, ImageSearcher};
use crate::config::ExternalConfig;
use crate::media::sniff_image_type;

const SERVICE: &str = "image search";

/// Google Custom Search (`searchType=image`). Every hit is downloaded into
/// `images_path`.
pub struct GoogleImageSearch {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cx: Option<String>,
    images_path: PathBuf,
}

impl GoogleImageSearch {
    pub fn new(http: reqwest::Client, config: &ExternalConfig) -> Self {
        Self {
            http,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            api_key: config.google_api_key.clone(),
            cx: config.google_cx.clone(),
            images_path: config.images_path.clone(),
        }
    }

    async fn download(&self, url: &str) -> Result<PathBuf, ClientError> {
        let response = self.http.get(url).send().await.map_err(http_error(SERVICE))?;
        let bytes = ensure_success(SERVICE, response)
            .await?
            .bytes()
            .await
            .map_err(http_error(SERVICE))?;

        let ext = match sniff_image_type(&bytes) {
            Some("image/png") => "png",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            _ => "jpg",
        };

        tokio::fs::create_dir_all(&self.images_path).await?;
        let target = self.images_path.join(format!("{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&target, &bytes).await?;
        Ok(target)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    title: Option<String>,
}

#[async_trait]
impl ImageSearcher for GoogleImageSearch {
    async fn search(
        &self,
        query: &str,
        params: &ImageSearchParams,
    ) -> Result<Vec<ImageSearchResult>, ClientError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ClientError::NotConfigured("GOOGLE_API_KEY"))?;
        let cx = self.cx.as_deref().ok_or(ClientError::NotConfigured("GOOGLE_CX"))?;

        let num = params.num.to_string();
        let response = self
            .http
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[
                ("key", api_key),
                ("cx", cx),
                ("q", query),
                ("searchType", "image"),
                ("num", num.as_str()),
                ("imgSize", params.img_size.as_str()),
                ("imgColorType", params.img_color_type.as_str()),
            ])
            .send()
            .await
            .map_err(http_error(SERVICE))?;

        let parsed: SearchResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(http_error(SERVICE))?;

        let mut results = Vec::with_capacity(parsed.items.len());
        for item in parsed.items {
            // Download failures are per hit.
            let path = match self.download(&item.link).await {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(url = %item.link, error = %err, "Failed to download search result");
                    None
                }
            };
            results.push(ImageSearchResult {
                url: item.link,
                title: item.title,
                path,
            });
        }

        debug!(query, count = results.len(), "Image search complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[tokio::test]
    async fn searches_with_listing_parameters_and_downloads_hits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customsearch/v1"))
            .and(query_param("q", "red road bike"))
            .and(query_param("searchType", "image"))
            .and(query_param("num", "2"))
            .and(query_param("imgSize", "medium"))
            .and(query_param("imgColorType", "color"))
            .and(query_param("cx", "engine-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    { "link": format!("{}/img/1", server.uri()), "title": "one" },
                    { "link": format!("{}/img/missing", server.uri()) },
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = ExternalConfig::for_tests(&server.uri());
        let search = GoogleImageSearch::new(reqwest::Client::new(), &config);
        let results = search
            .search("red road bike", &ImageSearchParams::default())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        let saved = results[0].path.as_ref().expect("first hit downloaded");
        assert!(saved.starts_with(&config.images_path));
        assert_eq!(saved.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(results[1].path.is_none());

        let _ = std::fs::remove_dir_all(&config.images_path);
    }

    #[tokio::test]
    async fn missing_engine_id_is_a_configuration_error() {
        let mut config = ExternalConfig::for_tests("http://127.0.0.1:9");
        config.google_cx = None;
        let search = GoogleImageSearch::new(reqwest::Client::new(), &config);
        let err = search.search("q", &ImageSearchParams::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConfigured("GOOGLE_CX")));
    }
}
