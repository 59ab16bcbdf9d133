use crate::domain::ports::ImageSearch;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://pixabay.com/api/";

/// Pixabay image search.
#[derive(Debug, Clone)]
pub struct PixabayClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "webformatURL")]
    webformat_url: String,
}

impl PixabayClient {
    pub fn new(client: Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    async fn search(&self, subject: &str, location: &str, count: usize) -> Result<Vec<String>> {
        let query = format!("{} {}", subject, location);
        let per_page = count.to_string();

        tracing::debug!("Searching images for '{}' at {}", query, self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query.as_str()),
                ("image_type", "photo"),
                ("per_page", per_page.as_str()),
                ("safesearch", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::ProviderError {
                provider: "Pixabay".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .hits
            .into_iter()
            .take(count)
            .map(|hit| hit.webformat_url)
            .collect())
    }
}

#[async_trait]
impl ImageSearch for PixabayClient {
    async fn fetch_images(&self, subject: &str, location: &str, count: usize) -> Vec<String> {
        match self.search(subject, location, count).await {
            Ok(urls) => {
                tracing::debug!("Pixabay returned {} image(s) for {}", urls.len(), subject);
                urls
            }
            Err(e) => {
                tracing::error!("Error fetching images from Pixabay for {}: {}", subject, e);
                vec![String::new(); count]
            }
        }
    }
}
