use crate::domain::ports::Storage;
use crate::utils::error::Result;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};

/// Downloads image bytes and stores them as `{images_dir}/{key}_{n}.jpg`.
pub struct ImagePersister<S: Storage> {
    client: Client,
    storage: S,
    images_dir: String,
}

impl<S: Storage> ImagePersister<S> {
    pub fn new(client: Client, storage: S, images_dir: impl Into<String>) -> Self {
        Self {
            client,
            storage,
            images_dir: images_dir.into(),
        }
    }

    pub fn image_path(&self, key: &str, position: usize) -> String {
        // Path separators in a city name would otherwise escape the images directory.
        let stem = key.replace(['/', '\\'], "_");
        // `./city_images` is recorded as `city_images`.
        let dir: PathBuf = Path::new(&self.images_dir)
            .components()
            .filter(|component| *component != Component::CurDir)
            .collect();
        dir.join(format!("{}_{}.jpg", stem, position))
            .to_string_lossy()
            .into_owned()
    }

    /// One entry per input URL, in order: the saved path, or `""` when the URL
    /// was empty or the download failed. A failure never stops the batch.
    pub async fn persist_images(&self, urls: &[String], key: &str) -> Vec<String> {
        let mut saved_paths = Vec::with_capacity(urls.len());

        for (idx, url) in urls.iter().enumerate() {
            if url.is_empty() {
                saved_paths.push(String::new());
                continue;
            }

            let position = idx + 1;
            let path = self.image_path(key, position);
            match self.download(url, &path).await {
                Ok(bytes) => {
                    tracing::debug!("Saved image {} for {} ({} bytes) to {}", position, key, bytes, path);
                    saved_paths.push(path);
                }
                Err(e) => {
                    tracing::error!("Error saving image {} for {}: {}", position, key, e);
                    saved_paths.push(String::new());
                }
            }
        }

        saved_paths
    }

    async fn download(&self, url: &str, path: &str) -> Result<usize> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        self.storage.write_file(path, &bytes).await?;
        Ok(bytes.len())
    }
}
