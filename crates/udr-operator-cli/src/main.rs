//! UDR operator CLI main entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use udr_operator_cli::{Cli, CommandExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let executor = CommandExecutor::new(&cli);
    let result = executor.execute(cli.command).await?;

    println!("{}", result.output);

    // Exit with appropriate code
    if result.success {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
