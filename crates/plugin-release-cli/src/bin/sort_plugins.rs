//! Normalize `plugins.toml` and `.gitmodules` in the current directory

use std::path::Path;
use std::process::ExitCode;

use colored::Colorize;

use plugin_release_core::{sort_gitmodules_file, sort_plugins_file, GITMODULES_FILE, PLUGINS_FILE};

fn main() -> ExitCode {
    let result = sort_plugins_file(Path::new(PLUGINS_FILE))
        .and_then(|changed| {
            report(PLUGINS_FILE, changed);
            sort_gitmodules_file(Path::new(GITMODULES_FILE))
        })
        .map(|changed| report(GITMODULES_FILE, changed));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn report(file: &str, changed: bool) {
    if changed {
        println!("{} {}", "[SORTED]".green(), file);
    } else {
        println!("{} {}", "[OK]".green(), file);
    }
}
