//! Command-line flags and the settings file, merged into one [`UploadConfig`].

use crate::assets::AssetResolver;
use crate::error::UploaderError;
use crate::youtube_api::videos::PrivacyStatus;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = "youtube-upload.json";

const AFTER_HELP: &str = "\
A thumbnail is uploaded as well if an image named like the video with a .jpg extension sits \
next to it, e.g. talk.jpg for talk.mp4.

The settings file is JSON:
  {
    \"JsonClientSecretPath\": \"client_secret.json\",
    \"UserName\": \"me\",
    \"CaptionLanguage\": \"en\",
    \"TokenStorePath\": \"tokens\"
  }
Relative paths in it are relative to the settings file.";

/// Values accepted by `--privacyStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Privacy {
    Private,
    Public,
    Unlisted,
}

impl From<Privacy> for PrivacyStatus {
    fn from(privacy: Privacy) -> Self {
        match privacy {
            Privacy::Private => PrivacyStatus::Private,
            Privacy::Public => PrivacyStatus::Public,
            Privacy::Unlisted => PrivacyStatus::Unlisted,
        }
    }
}

/// Upload a video to YouTube, along with its captions and thumbnail.
#[derive(Debug, Clone, Parser)]
#[command(name = "youtube-upload", version, about, after_help = AFTER_HELP)]
pub struct Args {
    /// Video title; a literal \n starts a new line
    #[arg(long)]
    pub title: String,

    /// Video description; a literal \n starts a new line
    #[arg(long)]
    pub description: String,

    /// Comma-separated list of tags
    #[arg(long)]
    pub tags: String,

    /// Numeric YouTube video category, e.g. 22 for "People & Blogs"
    #[arg(long = "categoryId")]
    pub category_id: String,

    /// Who can see the video
    #[arg(long = "privacyStatus", value_enum)]
    pub privacy_status: Privacy,

    /// The video to upload
    #[arg(long = "videoFilePath")]
    pub video_file_path: PathBuf,

    /// Subtitle track to attach to the video
    #[arg(long = "captionFile")]
    pub caption_file: Option<PathBuf>,

    /// Settings file with the OAuth client secret location and user name
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    pub config: PathBuf,
}

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub json_client_secret_path: PathBuf,
    pub user_name: String,
    #[serde(default = "default_caption_language")]
    pub caption_language: String,
    #[serde(default = "default_token_store_path")]
    pub token_store_path: PathBuf,
}

fn default_caption_language() -> String {
    "en".to_string()
}

fn default_token_store_path() -> PathBuf {
    PathBuf::from("tokens")
}

impl Settings {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads the settings file and makes its relative paths relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, UploaderError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            UploaderError::Configuration(format!(
                "Settings file {} could not be read: {e}",
                path.display()
            ))
        })?;
        let mut settings = Self::from_json(&json).map_err(|e| {
            UploaderError::Configuration(format!("{}: {e:#}", path.display()))
        })?;

        let base = path.parent().unwrap_or(Path::new(""));
        settings.json_client_secret_path = base.join(&settings.json_client_secret_path);
        settings.token_store_path = base.join(&settings.token_store_path);
        Ok(settings)
    }
}

/// Everything one run needs to know, fixed before the first network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: PrivacyStatus,
    pub video_file: PathBuf,
    pub caption_file: Option<PathBuf>,
    pub client_secret_path: PathBuf,
    pub user_name: String,
    pub caption_language: String,
    pub token_store: PathBuf,
}

impl UploadConfig {
    /// Checks the video exists and then loads the settings file named by `args`.
    pub fn load(args: Args) -> Result<Self, UploaderError> {
        ensure_video_exists(&args.video_file_path)?;
        let settings = Settings::load(&args.config)?;
        Ok(Self::merge(args, settings))
    }

    /// Merges already loaded settings into `args`, checking first that the video exists.
    pub fn from_parts(args: Args, settings: Settings) -> Result<Self, UploaderError> {
        ensure_video_exists(&args.video_file_path)?;
        Ok(Self::merge(args, settings))
    }

    fn merge(args: Args, settings: Settings) -> Self {
        Self {
            title: unescape_newlines(&args.title),
            description: unescape_newlines(&args.description),
            tags: split_tags(&args.tags),
            category_id: args.category_id,
            privacy_status: args.privacy_status.into(),
            video_file: args.video_file_path,
            caption_file: args.caption_file,
            client_secret_path: settings.json_client_secret_path,
            user_name: settings.user_name,
            caption_language: settings.caption_language,
            token_store: settings.token_store_path,
        }
    }
}

fn ensure_video_exists(path: &Path) -> Result<(), UploaderError> {
    if AssetResolver::exists(path) {
        Ok(())
    } else {
        Err(UploaderError::FileNotFound(path.to_path_buf()))
    }
}

/// Shells make it awkward to pass newlines, so `\n` is accepted instead.
fn unescape_newlines(s: &str) -> String {
    s.replace("\\n", "\n")
}

fn split_tags(tags: &str) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !seen.iter().any(|s| s == tag) {
            seen.push(tag.to_string());
        }
    }
    seen
}
