// Command line front end for the moderation engine.
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Run one moderation request and report the verdict
//
// Exit codes: 0 = accepted, 1 = rejected, 2 = moderation failed.

use anyhow::Context;
use clap::{Parser, Subcommand};
use content_guard::core::moderation::{ListingScreening, ModerationConfig, ModerationService};
use content_guard::infra::http::ReqwestTransport;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "content_guard",
    version,
    about = "Screen text and images with a content analysis service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Moderate a piece of text
    Text { text: String },
    /// Moderate an image file from disk
    ImageFile { path: PathBuf },
    /// Download an image and moderate it
    ImageUrl { url: String },
    /// Screen a listing: image first, then title and description
    Listing {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {
            println!("ACCEPTED");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("REJECTED");
            ExitCode::from(1)
        }
        Err(e) => {
            tracing::error!("Moderation failed: {:#}", e);
            eprintln!("Moderation failed: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // One shared HTTP transport for the detector and image downloads.

    let config = ModerationConfig::from_env();
    tracing::debug!(?config, "Loaded moderation config");
    if !config.is_enabled() {
        tracing::warn!(
            "CONTENT_SAFETY_ENDPOINT or CONTENT_SAFETY_SUBSCRIPTION_KEY not set - all content passes"
        );
    }

    let transport = Arc::new(
        ReqwestTransport::new(config.timeout).context("Failed to create HTTP client")?,
    );
    let service = ModerationService::new(config, transport);
    tracing::debug!(thresholds = ?service.reject_thresholds(), "Using reject thresholds");

    let accepted = match cli.command {
        Command::Text { text } => service.moderate_text(&text).await?,
        Command::ImageFile { path } => {
            let bytes = load_image(&path)?;
            service.moderate_image_from_bytes(&bytes).await?
        }
        Command::ImageUrl { url } => service.moderate_image_from_url(&url).await?,
        Command::Listing {
            title,
            description,
            image,
        } => {
            let image = image.as_deref().map(load_image).transpose()?;
            let outcome = service
                .screen_listing(&title, &description, image.as_deref())
                .await?;
            if outcome != ListingScreening::Accepted {
                tracing::info!("{}", outcome);
            }
            outcome == ListingScreening::Accepted
        }
    };

    Ok(accepted)
}

fn load_image(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image file {}", path.display()))
}
