// pushgate CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;

const LOG_ENV: &str = "PUSHGATE_LOG";

#[derive(Parser)]
#[command(name = "pushgate", version, about = "Serialize concurrent pushes to a shared repository")]
struct Cli {
    #[command(flatten)]
    options: commands::GateOptions,

    #[command(subcommand)]
    command: commands::Command,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> std::process::ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            let code = if error.use_stderr() { ExitCode::Usage } else { ExitCode::Success };
            return code.into();
        }
    };

    match commands::run(cli.command, &cli.options) {
        Ok(code) => code,
        Err(error) => {
            output::print_anyhow_error(&error);
            ExitCode::from_error(&error).into()
        }
    }
}
