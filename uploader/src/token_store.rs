//! Per-user cache of OAuth tokens on disk.
//!
//! Each user gets one JSON file holding the last token response and when it was issued, so a
//! later run can tell whether the access token is still usable or has to be refreshed.

use eyre::Context;
use jiff::Timestamp;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: BasicTokenResponse,
    pub issued_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// User names end up in a file name, so anything but `[A-Za-z0-9._-]` is replaced.
    pub fn path_for(&self, user: &str) -> PathBuf {
        let name: String = user
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let name = if name.is_empty() || name.chars().all(|c| c == '.') {
            "default".to_string()
        } else {
            name
        };
        self.dir.join(format!("{name}.json"))
    }

    pub async fn load(&self, user: &str) -> eyre::Result<Option<StoredToken>> {
        let path = self.path_for(user);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let stored = serde_json::from_str(&json)
            .with_context(|| format!("parse cached token {}", path.display()))?;
        Ok(Some(stored))
    }

    /// Replaces the cached token of `user`.
    ///
    /// The file is written next to its final place and then renamed over it, so an interrupted
    /// save leaves the previous token in place.
    pub async fn save(&self, user: &str, stored: &StoredToken) -> eyre::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("create token directory {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(stored).context("serialize token")?;
        let path = self.path_for(user);
        let partial = path.with_extension("json.tmp");
        tokio::fs::write(&partial, json)
            .await
            .with_context(|| format!("write {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("move {} into place", partial.display()))?;
        tracing::debug!(path = %path.display(), "saved OAuth token");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn token_from_json(json: &str) -> BasicTokenResponse {
    serde_json::from_str(json).unwrap()
}
