//! Uploads an operational template (OPT) file to EHRbase

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use openehr_mcp::{EhrbaseClient, EhrbaseConfig, EhrbaseOverrides};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openehr-upload-template")]
#[command(about = "Upload an operational template to EHRbase")]
#[command(version)]
struct Cli {
    /// EHRbase URL (defaults to EHRBASE_URL)
    #[arg(long)]
    ehrbase_url: Option<String>,

    /// Path to the .opt template file
    #[arg(long)]
    template: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    let config = EhrbaseConfig::resolve(EhrbaseOverrides {
        base_url: cli.ehrbase_url,
        ..EhrbaseOverrides::default()
    });
    info!("Using EHRbase URL: {}", config.base_url);

    if !cli.template.is_file() {
        bail!("Template file not found: {}", cli.template.display());
    }

    info!("Uploading template: {}", cli.template.display());
    EhrbaseClient::new(&config)
        .templates()
        .upload_template_file(&cli.template)
        .await
        .with_context(|| format!("Failed to upload template {}", cli.template.display()))?;

    info!("Template upload successful");
    Ok(())
}
