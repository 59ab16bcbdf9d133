//! HTTP clients for the two enrichment providers.

pub mod openai;
pub mod pixabay;

use crate::utils::error::Result;
use reqwest::Client;
use std::time::Duration;

/// Shared by both providers and the image downloader. Without a timeout reqwest waits indefinitely.
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(concat!("city-enricher/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
