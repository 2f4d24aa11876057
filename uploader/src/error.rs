//! Failure categories surfaced to the user.
//!
//! Most of the crate propagates [`eyre::Report`]s with context attached. The variants here mark
//! the points where the kind of failure decides what happens next: configuration and
//! authorization problems abort before any upload starts, a missing video aborts pre-flight, and
//! an upload failure is fatal only for the video itself.

use crate::progress::Asset;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum UploaderError {
    /// A mandatory parameter is missing, or a settings or client secret file is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file that has to exist does not.
    #[error("The file {} was not found.", .0.display())]
    FileNotFound(PathBuf),

    /// The OAuth flow did not yield a usable access token.
    #[error("authorization with YouTube failed")]
    Authorization(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// An upload was rejected by the API or broke down in transport.
    #[error("{asset} upload failed: {detail}")]
    Upload { asset: Asset, detail: String },
}

impl UploaderError {
    pub(crate) fn authorization(report: eyre::Report) -> Self {
        Self::Authorization(report.into())
    }
}
