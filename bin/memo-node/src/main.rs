mod cli;
mod commands;

use clap::Parser;
use cli::Command;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    let cli = cli::Cli::parse();
    match cli.command {
        command @ Command::Run { .. } => commands::run::execute(command).await,
        command @ Command::Construct { .. } => commands::construct::execute(command).await,
        command @ Command::Decode { .. } => commands::decode::execute(command).await,
    }
}
