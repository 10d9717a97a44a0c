pub mod interim;
pub mod sync;

use aggregator_common::cli::{client::ClientArguments, runner::RunnerArguments};
use csaf_aggregator::config::RunConfig;
use csaf_aggregator::process::{Processor, RunMode};
use std::path::PathBuf;

/// Arguments shared by all sync runs.
#[derive(clap::Args, Debug)]
pub struct RunArguments {
    /// Path to the aggregator configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    #[command(flatten)]
    pub client: ClientArguments,

    #[command(flatten)]
    pub runner: RunnerArguments,
}

impl RunArguments {
    pub async fn run(self, mode: RunMode) -> anyhow::Result<()> {
        let mut config = RunConfig::load(&self.config)?;
        if let Some(workers) = self.runner.workers {
            config.workers = workers;
        }

        let processor = Processor::new(config, self.client.into_options());
        let summary = processor.process(mode).await?;
        summary.log();

        Ok(())
    }
}
