/*!
 * Document fetching and page truncation.
 */

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use url::Url;

use crate::errors::RequestError;

/// Page delimiters; the trailing class keeps `\newpagestyle` and friends out
static PAGE_BREAK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:newpage|clearpage|pagebreak)(?:[^A-Za-z@]|$)")
        .expect("page break pattern is valid")
});

/// Where documents come from
#[async_trait]
pub trait DocumentSource: Send + Sync + Debug {
    /// Fetch the document at `location` as text
    async fn fetch(&self, location: &str) -> Result<String, RequestError>;
}

/// Fetches `http(s)://` URLs, `file://` URLs and plain paths
#[derive(Debug, Clone)]
pub struct UrlSource {
    client: Client,
}

impl Default for UrlSource {
    fn default() -> Self {
        Self::new(60)
    }
}

impl UrlSource {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<String, RequestError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RequestError::Fetch(e.to_string()))?;
        response.text().await.map_err(|e| RequestError::Fetch(e.to_string()))
    }
}

#[async_trait]
impl DocumentSource for UrlSource {
    async fn fetch(&self, location: &str) -> Result<String, RequestError> {
        let location = location.trim();
        let text = if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch_http(location).await?
        } else {
            let path = if location.starts_with("file://") {
                Url::parse(location)
                    .ok()
                    .and_then(|u| u.to_file_path().ok())
                    .ok_or_else(|| RequestError::Fetch(format!("Invalid file URL: {}", location)))?
            } else {
                location.into()
            };
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| RequestError::Fetch(format!("{}: {}", path.display(), e)))?
        };

        info!("Fetched {} bytes from {}", text.len(), location);
        Ok(text)
    }
}

/// The first `num_pages` pages of `text`
///
/// The delimiter that ends the last kept page is dropped. Text with fewer
/// pages is returned whole.
pub fn truncate_pages(text: &str, num_pages: usize) -> &str {
    if num_pages == 0 {
        return "";
    }
    match PAGE_BREAK_REGEX.find_iter(text).nth(num_pages - 1) {
        Some(m) => {
            debug!("Truncating document to {} page(s) at byte {}", num_pages, m.start());
            &text[..m.start()]
        }
        None => text,
    }
}
