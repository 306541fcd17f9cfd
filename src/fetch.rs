use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::FetchError;

/// Something that can hand over the raw manifest HTML.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// The live wiki page over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, user_agent: &str) -> Result<Self, FetchError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|source| FetchError::Http { url: url.clone(), source })?;
        Ok(HttpSource { client, url })
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        info!("Fetching launch manifest: {}", self.url);
        let http = |source: reqwest::Error| FetchError::Http { url: self.url.clone(), source };

        let response = self.client.get(&self.url).send().await.map_err(http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: self.url.clone(), status });
        }
        let body = response.text().await.map_err(http)?;
        info!(bytes = body.len(), "Fetched manifest");
        Ok(body)
    }
}

/// A saved copy of the page on disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::File { path: self.path.display().to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_source_reads_fixture() {
        let html = FileSource::new("tests/fixtures/manifest.html").fetch().await.unwrap();
        assert!(html.contains("wiki_upcoming_falcon_launches"));
    }

    #[tokio::test]
    async fn missing_file_is_fetch_error() {
        let err = FileSource::new("tests/fixtures/nope.html").fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::File { .. }));
    }
}
