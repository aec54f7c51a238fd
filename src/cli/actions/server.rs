use crate::{registry, typecode::RangeRegistry};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub max_connections: u32,
    pub ranges: RangeRegistry,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the DSN is invalid, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let dsn = Url::parse(args.dsn.expose_secret()).context("Invalid database DSN")?;
    if !matches!(dsn.scheme(), "postgres" | "postgresql") {
        anyhow::bail!("Unsupported database DSN scheme: {}", dsn.scheme());
    }

    debug!(
        host = dsn.host_str().unwrap_or("localhost"),
        database = dsn.path().trim_start_matches('/'),
        max_connections = args.max_connections,
        "Connecting to database"
    );

    registry::new(registry::Config {
        port: args.port,
        dsn: args.dsn,
        max_connections: args.max_connections,
        ranges: args.ranges,
    })
    .await
}
