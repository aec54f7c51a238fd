use crate::typecode::{
    RangeRegistry, TypecodeRange, HYBRIS_RANGE, PROJECT_RANGE, SHARED_RANGE,
};
use anyhow::{Context, Result};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};

pub const ARG_SHARED_RANGE: &str = "shared-range";
pub const ARG_PROJECT_RANGE: &str = "project-range";
pub const ARG_HYBRIS_RANGE: &str = "hybris-range";

#[must_use]
pub fn validator_range() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<TypecodeRange, String> {
        value.parse::<TypecodeRange>().map_err(|err| err.to_string())
    })
}

/// Builds the range registry from the parsed arguments.
///
/// # Errors
/// Returns an error if the configured ranges overlap.
pub fn parse(matches: &ArgMatches) -> Result<RangeRegistry> {
    let range = |id: &str, default: TypecodeRange| {
        matches
            .get_one::<TypecodeRange>(id)
            .copied()
            .unwrap_or(default)
    };

    RangeRegistry::new(
        range(ARG_SHARED_RANGE, SHARED_RANGE),
        range(ARG_PROJECT_RANGE, PROJECT_RANGE),
        range(ARG_HYBRIS_RANGE, HYBRIS_RANGE),
    )
    .context("invalid typecode ranges")
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SHARED_RANGE)
                .long(ARG_SHARED_RANGE)
                .help("Inclusive typecode range of the Shared scope, START:END")
                .value_name("START:END")
                .env("TYPECODE_REGISTRY_SHARED_RANGE")
                .value_parser(validator_range()),
        )
        .arg(
            Arg::new(ARG_PROJECT_RANGE)
                .long(ARG_PROJECT_RANGE)
                .help("Inclusive typecode range of the Project scope, START:END")
                .value_name("START:END")
                .env("TYPECODE_REGISTRY_PROJECT_RANGE")
                .value_parser(validator_range()),
        )
        .arg(
            Arg::new(ARG_HYBRIS_RANGE)
                .long(ARG_HYBRIS_RANGE)
                .help("Inclusive typecode range reserved for the Hybris scope, START:END")
                .value_name("START:END")
                .env("TYPECODE_REGISTRY_HYBRIS_RANGE")
                .value_parser(validator_range()),
        )
}
