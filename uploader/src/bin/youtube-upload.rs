use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_uploader::config::{Args, UploadConfig};
use youtube_uploader::error::UploaderError;
use youtube_uploader::oauth::{ClientSecrets, UPLOAD_SCOPES};
use youtube_uploader::orchestrator::{Stage, UploadOrchestrator};
use youtube_uploader::progress::{Asset, UploadProgressReporter};
use youtube_uploader::token_store::TokenStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout is for progress lines, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = Args::parse();

    println!("youtube-upload: Upload Video");
    println!("==============================");

    let config = UploadConfig::load(args)?;
    let secrets = ClientSecrets::load(&config.client_secret_path)?;
    let store = TokenStore::new(&config.token_store);

    let yt = youtube_uploader::authorize(secrets, UPLOAD_SCOPES, &config.user_name, &store).await?;

    let outcome = UploadOrchestrator::new(&config, &yt, UploadProgressReporter::stdout())
        .run()
        .await
        .context("upload video")?;

    // The client may have refreshed its token during a long upload.
    if let Err(e) = store.save(&config.user_name, &yt.stored_token().await).await {
        tracing::warn!("could not cache refreshed token: {:#}", e);
    }

    if outcome.stage == Stage::Failed {
        return Err(UploaderError::Upload {
            asset: Asset::Video,
            detail: outcome
                .video
                .error_detail
                .unwrap_or_else(|| "no video id in response".to_string()),
        }
        .into());
    }

    Ok(())
}
