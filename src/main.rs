use anyhow::Result;
use clap::Parser;
use shopledger::cli::Cli;
use shopledger::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });
    cli.run().await
}
