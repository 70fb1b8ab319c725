//! # atrium-probe
//!
//! Loads the client configuration, builds a [`Store`] over HTTP and
//! performs one `get` for a model, printing what came back.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  args ──► ClientConfig::load_or_default ──► Store::from_config          │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                         store.model(<model>).get(Some(&filter))         │
//! │                                                   │                     │
//! │                      ┌────────────────────────────┴──────────┐          │
//! │                      ▼                                       ▼          │
//! │             print count + JSON, exit 0            log error, exit 1     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use atrium_client::{ClientConfig, ClientError, ClientResult, Store};
use atrium_core::Filter;

#[derive(Parser)]
#[command(name = "atrium-probe", about = "Fetch one model list through the Atrium store")]
struct Cli {
    /// Model to fetch, e.g. "booking".
    model: String,

    /// `where` clause as a JSON object, e.g. '{"status":"open"}'.
    #[arg(value_name = "WHERE_JSON")]
    where_json: Option<String>,

    /// Sort field, `-` prefix for descending.
    #[arg(long)]
    sort_by: Option<String>,

    /// Page size.
    #[arg(long)]
    limit: Option<u64>,

    /// Page number.
    #[arg(long)]
    page: Option<u64>,

    /// Config file (defaults to the platform config directory).
    #[arg(long, env = "ATRIUM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    info!(base_url = %config.base_url(), model = %cli.model, "Probing backend");

    let filter = build_filter(&cli)?;
    let store = Store::from_config(&config)?;

    match store.model(&cli.model).get(Some(&filter)).await {
        Ok(results) => {
            println!("{} {} record(s)", results.len(), cli.model);
            println!("{}", serde_json::to_string_pretty(&*results)?);
            Ok(())
        }
        Err(e) => {
            error!(model = %cli.model, error = %e, retryable = e.is_retryable(), "Fetch failed");
            Err(e.into())
        }
    }
}

/// Initializes the tracing subscriber.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Default: `info,atrium=debug`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atrium=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads the client config.
///
/// An explicit `--config` must exist and parse; without one the platform
/// default is used when present, otherwise built-in defaults.
fn load_config(cli: &Cli) -> ClientResult<ClientConfig> {
    match &cli.config {
        Some(path) if !path.exists() => Err(ClientError::ConfigLoadFailed(format!(
            "{} does not exist",
            path.display()
        ))),
        Some(path) => ClientConfig::load(Some(path.clone())),
        None => Ok(ClientConfig::load_or_default(None)),
    }
}

fn build_filter(cli: &Cli) -> Result<Filter, Box<dyn std::error::Error>> {
    let mut filter = Filter::new();

    if let Some(raw) = &cli.where_json {
        let clause: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|e| format!("WHERE_JSON must be a JSON object: {}", e))?;
        filter.where_clause = Some(clause);
    }
    if let Some(sort_by) = &cli.sort_by {
        filter = filter.sort_by(sort_by.as_str());
    }
    if let Some(limit) = cli.limit {
        filter = filter.limit(limit);
    }
    if let Some(page) = cli.page {
        filter = filter.page(page);
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_from_args() {
        let cli = Cli::parse_from([
            "atrium-probe",
            "booking",
            r#"{"status":"open"}"#,
            "--limit",
            "20",
        ]);
        let filter = build_filter(&cli).unwrap();

        assert_eq!(cli.model, "booking");
        assert_eq!(filter.limit, Some(20));
        assert_eq!(
            filter.where_clause.unwrap().get("status"),
            Some(&Value::from("open"))
        );
    }

    #[test]
    fn test_explicit_config_must_load() {
        let dir = std::env::temp_dir().join(format!("atrium-probe-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client.toml");
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://prod.example\"\ntimeout_secs = \"thirty\"\n",
        )
        .unwrap();
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::parse_from(["atrium-probe", "booking", "--config", path_arg.as_str()]);
        assert!(load_config(&cli).is_err());

        let missing = dir.join("missing.toml").to_string_lossy().into_owned();
        let cli = Cli::parse_from(["atrium-probe", "booking", "--config", missing.as_str()]);
        assert!(matches!(
            load_config(&cli),
            Err(ClientError::ConfigLoadFailed(_))
        ));

        std::fs::write(&path, "[api]\nbase_url = \"https://prod.example\"\n").unwrap();
        let cli = Cli::parse_from(["atrium-probe", "booking", "--config", path_arg.as_str()]);
        assert_eq!(load_config(&cli).unwrap().base_url(), "https://prod.example");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_where_must_be_an_object() {
        let cli = Cli::parse_from(["atrium-probe", "booking", "[1,2]"]);
        assert!(build_filter(&cli).is_err());
    }
}
