//! Buildpack compile entrypoint.
//!
//! Installs a headless LibreOffice into `BUILD_DIR`, using `CACHE_DIR` for
//! downloads. Progress goes to stdout in the platform's build-log format;
//! any fatal error is printed with its cause chain and exits with status 1.

use clap::Parser;
use libreoffice_buildpack::cli::Cli;
use libreoffice_buildpack::error::Result;
use libreoffice_buildpack::output::{DryRunInfo, Reporter, error_chain};
use libreoffice_buildpack::pipeline::run_pipeline;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut reporter = Reporter::new(&mut stdout, cli.quiet);
    let run_result = run(&cli, &mut reporter);
    let exit_code = exit_code_for_run_result(run_result, &mut reporter);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, reporter: &mut Reporter<'_>) -> Result<()> {
    let config = cli.to_config()?;

    if cli.dry_run {
        reporter.report(
            DryRunInfo {
                config: &config,
                quiet: cli.quiet,
            }
            .display_text(),
        );
        return Ok(());
    }

    run_pipeline(&config, reporter)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, reporter: &mut Reporter<'_>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            reporter.error(error_chain(&err));
            1
        }
    }
}
