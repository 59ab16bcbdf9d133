pub mod clients;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, EnricherConfig};

pub use clients::{openai::OpenAiClient, pixabay::PixabayClient};
pub use core::{
    dataset::DatasetStore, enricher::Enricher, etl::EtlEngine, images::ImagePersister,
};
pub use utils::error::{EtlError, Result};
