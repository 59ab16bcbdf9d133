use crate::domain::model::Description;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Creates `path` and its parents; an existing directory is fine.
    fn create_dir(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_csv(&self) -> &str;
    fn output_csv(&self) -> &str;
    fn images_dir(&self) -> &str;
    fn max_records(&self) -> Option<usize>;
    fn dry_run(&self) -> bool;
}

/// Image search provider. Failures are absorbed: the result then holds `count` empty strings.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn fetch_images(&self, subject: &str, location: &str, count: usize) -> Vec<String>;
}

/// Text-generation provider. Failures are absorbed into [`Description::fallback`].
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    async fn fetch_description(&self, subject: &str, location: &str) -> Description;
}
