use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

const DESCRIPTION: &str = "\
Package plugins and publish them to the Khulnasoft extension blob store.

* If an extension ID is provided, only package that extension.
* Otherwise, if SHOULD_PUBLISH is set to true, package all plugins for
  which there is not already a package in the blob store.
* If SHOULD_PUBLISH is not set to true, then package any plugins that
  have been added or updated on this branch.";

const ENVIRONMENT: &str = "\
ENVIRONMENT VARIABLES
  S3_ACCESS_KEY          Access key for the blob store
  S3_SECRET_KEY          Secret key for the blob store
  S3_BUCKET              Name of the bucket where plugins are published
  S3_ENDPOINT            Blob store endpoint (default: https://nyc3.digitaloceanspaces.com)
  S3_REGION              Blob store region (default: nyc3)
  SHOULD_PUBLISH         Whether to publish packages to the blob store.
                         Set this to \"true\" to publish the packages.
  PACKAGER_BIN           Packager executable (default: ./khulnasoft-plugin)
  PACKAGER_TIMEOUT_SECS  Seconds before a packager run is killed (default: 600)
  REFERENCE_REVISION     Baseline for changed plugins (default: origin/main)
  RUST_LOG               Log filter (default: info)";

#[derive(Parser, Debug)]
#[command(name = "package-plugins")]
#[command(about = DESCRIPTION)]
#[command(after_help = ENVIRONMENT)]
pub struct Cli {
    /// Only package this extension
    #[arg(value_name = "extensionId")]
    pub extension_id: Option<String>,
}

/// What to do with a command line
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// Print usage and exit successfully
    Help(String),
    /// Print the message and exit with a failure
    Reject(String),
}

/// Interpret the full command line, program name included.
///
/// Arguments are scanned in order before clap sees them: `-h`/`--help`
/// wins as soon as it is reached, and any other argument starting with `-`
/// is an unknown flag, including `-`, `--` and `--version`. Only one
/// extension id is accepted.
pub fn parse_args<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let mut positionals = Vec::new();

    for arg in args.iter().skip(1) {
        let arg = arg.to_string_lossy();
        if arg == "-h" || arg == "--help" {
            return Invocation::Help(Cli::command().render_help().to_string());
        }
        if arg.starts_with('-') {
            return Invocation::Reject(format!("no such flag: {arg}"));
        }
        positionals.push(arg.into_owned());
    }

    if let Some(extra) = positionals.get(1) {
        return Invocation::Reject(format!(
            "unexpected argument: {extra} (only one extensionId may be given)"
        ));
    }

    match Cli::try_parse_from(args) {
        Ok(cli) => Invocation::Run(cli),
        Err(err) if err.kind() == ErrorKind::DisplayHelp => Invocation::Help(err.to_string()),
        Err(err) => Invocation::Reject(err.to_string()),
    }
}
