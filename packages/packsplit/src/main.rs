//! CLI entry point for packsplit.

use packsplit::cli::{self, Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(code) => std::process::exit(code),
    };

    // RUST_LOG wins; otherwise the verbosity flags pick the level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
