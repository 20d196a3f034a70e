use std::process::ExitCode;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use plugin_release_core::{
    ExternalPackager, GitCli, PublishConfig, Publisher, Result, RunOptions, RunSummary,
    S3BlobStore,
};

mod args;
use args::{parse_args, Cli, Invocation};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match parse_args(std::env::args_os()) {
        Invocation::Run(cli) => cli,
        Invocation::Help(usage) => {
            println!("{}", usage.trim_end());
            return ExitCode::SUCCESS;
        }
        Invocation::Reject(message) => {
            println!("{}", message.trim_end());
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let config = PublishConfig::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let store = S3BlobStore::new(&config.store);
    let git = GitCli::new(".");
    let packager = ExternalPackager::new(&config.packager_bin, ".", config.packager_timeout);

    let options = RunOptions {
        selected_id: cli.extension_id,
        should_publish: config.should_publish,
        reference_revision: config.reference_revision.clone(),
    };

    Publisher::new(".", &store, &git, &packager)
        .run(&options)
        .await
}

fn print_summary(summary: &RunSummary) {
    if summary.packaged.is_empty() {
        println!("{} Nothing to package", "[SKIP]".yellow());
        return;
    }

    for plugin in &summary.packaged {
        let status = if plugin.uploaded_keys.is_empty() {
            "[PACKAGED]".cyan()
        } else {
            "[PUBLISHED]".green()
        };
        println!("{} {} {} ({})", status, plugin.id, plugin.version, plugin.name);

        for key in &plugin.uploaded_keys {
            println!("    {}", key.dimmed());
        }
        for warning in &plugin.warnings {
            println!("    {} {}", "[WARN]".yellow().bold(), warning);
        }
    }

    println!();
    println!(
        "{} packaged, {} uploaded, {} warning(s)",
        summary.packaged.len(),
        summary.uploaded_count(),
        summary.warning_count()
    );
}
