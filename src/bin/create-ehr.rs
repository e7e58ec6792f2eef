//! Creates an EHR for a (possibly random) subject and prints its ID

use anyhow::{Context, Result};
use clap::Parser;
use openehr_mcp::ehrbase::ehr::{created_ehr_id, subject_ehr_status};
use openehr_mcp::{EhrbaseClient, EhrbaseConfig, EhrbaseOverrides};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openehr-create-ehr")]
#[command(about = "Create a new EHR in the EHRbase server")]
#[command(version)]
struct Cli {
    /// EHRbase URL (defaults to EHRBASE_URL)
    #[arg(long)]
    ehrbase_url: Option<String>,

    /// Subject ID for the EHR (defaults to a random test subject)
    #[arg(long)]
    subject_id: Option<String>,

    /// Subject namespace
    #[arg(long, default_value = "EHR")]
    namespace: String,

    /// ID scheme
    #[arg(long, default_value = "http://hl7.org/fhir/Patient")]
    scheme: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    let config = EhrbaseConfig::resolve(EhrbaseOverrides {
        base_url: cli.ehrbase_url,
        ..EhrbaseOverrides::default()
    });
    let client = EhrbaseClient::new(&config);
    println!("Using EHRbase URL: {}", client.base_url());

    let subject_id = cli
        .subject_id
        .unwrap_or_else(|| format!("test_subject_{}", uuid::Uuid::new_v4()));
    println!("Subject ID: {subject_id}");
    println!("Namespace: {}", cli.namespace);

    let status = subject_ehr_status(&subject_id, &cli.namespace, &cli.scheme);
    let response = client
        .create_ehr(Some(status))
        .await
        .context("Error creating EHR")?;

    println!(
        "Create EHR response: {}",
        serde_json::to_string_pretty(&response)?
    );
    match created_ehr_id(&response) {
        Some(ehr_id) => {
            println!("Successfully created EHR with ID: {ehr_id}");
            println!("Use this EHR ID when creating compositions or querying the EHR.");
        }
        None => println!("EHR created, but the server did not report its ID"),
    }
    Ok(())
}
