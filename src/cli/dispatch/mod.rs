//! Maps validated CLI arguments to the action to run.

use crate::cli::{
    actions::{server::Args, Action},
    commands::{ranges, ARG_DSN, ARG_MAX_CONNECTIONS, ARG_PORT},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the typecode ranges are inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let max_connections = matches
        .get_one::<u32>(ARG_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let ranges = ranges::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        max_connections,
        ranges,
    }))
}
