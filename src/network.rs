//! Thin HTTP layer over `reqwest`. Every failure, including a non-success
//! status, surfaces as [`WebDriverError::Connection`].

use crate::error::WebDriverError;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Network {
    client: reqwest::Client,
}

impl Network {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetches `url` and returns the body as text.
    pub async fn get(&self, url: &str) -> Result<String, WebDriverError> {
        debug!(url, "GET");
        let response = self.fetch(url).await?;
        response.text().await.map_err(|e| connection(url, e))
    }

    /// Downloads `url` into `dest_path`, creating parent directories.
    pub async fn download(&self, url: &str, dest_path: &Path) -> Result<(), WebDriverError> {
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| WebDriverError::io(parent, e))?;
        }

        debug!(url, dest = %dest_path.display(), "downloading");
        let response = self.fetch(url).await?;
        let content = response.bytes().await.map_err(|e| connection(url, e))?;

        let mut dest_file = File::create(dest_path)
            .await
            .map_err(|e| WebDriverError::io(dest_path, e))?;
        dest_file
            .write_all(&content)
            .await
            .map_err(|e| WebDriverError::io(dest_path, e))?;
        dest_file
            .flush()
            .await
            .map_err(|e| WebDriverError::io(dest_path, e))?;

        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response, WebDriverError> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| connection(url, e))
    }
}

fn connection(url: &str, source: reqwest::Error) -> WebDriverError {
    WebDriverError::Connection {
        url: url.to_string(),
        source,
    }
}
