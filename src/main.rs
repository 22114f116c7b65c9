use clap::Parser;
use semantic_call_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check => cli::check::run().await,
        Command::Lookup(args) => cli::lookup::run(args).await,
        Command::Store(args) => cli::store::run(args).await,
        Command::Purge => cli::purge::run().await,
    }
}
