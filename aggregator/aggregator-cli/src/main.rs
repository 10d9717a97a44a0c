#![forbid(unsafe_code)]

mod cmd;

use clap::Parser;
use cmd::{interim::Interim, sync::Sync};
use std::process::ExitCode;
use aggregator_common::{cli::log::Logging, utils::measure::MeasureTime};

#[derive(Debug, Parser)]
#[command(version, about = "CSAF Aggregator", author, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    logging: Logging,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    Sync(Sync),
    Interim(Interim),
}

impl Command {
    pub async fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Sync(cmd) => cmd.run().await,
            Self::Interim(cmd) => cmd.run().await,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        self.logging.init(&["aggregator_cli", "csaf_aggregator"]);

        // run

        log::debug!("Setup complete, start processing");

        let time = MeasureTime::new();
        self.command.run().await?;
        drop(time);

        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = Cli::parse().run().await {
        log::error!("Failed to execute: {err}");
        for (n, cause) in err.chain().enumerate().skip(1) {
            log::info!("  {n}: {cause}");
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
