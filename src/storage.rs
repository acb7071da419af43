/*!
 * Storage sink for translated documents.
 */

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use log::info;
use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::StorageError;

/// Somewhere a finished document can be published
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Store `bytes` and return the URL it can be read from
    async fn store(&self, bytes: &[u8]) -> Result<String, StorageError>;
}

/// Writes documents into a local directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    public_base_url: Option<String>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Object key: `translated_content_<unix-ts>_<hash8>.tex`
    pub fn object_key(bytes: &[u8], timestamp: i64) -> String {
        let digest = Sha256::digest(bytes);
        let hash: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
        format!("translated_content_{}_{}.tex", timestamp, hash)
    }

    fn public_url(&self, key: &str, path: &std::path::Path) -> Result<String, StorageError> {
        if let Some(base) = &self.public_base_url {
            return Ok(format!("{}/{}", base.trim_end_matches('/'), key));
        }
        let absolute = std::path::absolute(path)
            .map_err(|e| StorageError::InvalidLocation(format!("{}: {}", path.display(), e)))?;
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| StorageError::InvalidLocation(absolute.display().to_string()))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn store(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let key = Self::object_key(bytes, Utc::now().timestamp());
        let path = self.dir.join(&key);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Write {
                key: key.clone(),
                source,
            })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Write {
                key: key.clone(),
                source,
            })?;

        let url = self.public_url(&key, &path)?;
        info!("Stored {} bytes at {}", bytes.len(), url);
        Ok(url)
    }
}
