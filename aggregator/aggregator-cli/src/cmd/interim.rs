use crate::cmd::RunArguments;
use csaf_aggregator::process::RunMode;

/// Run an interim sync: a lighter pass restricted to recently updated
/// documents, intended for frequent incremental checks.
#[derive(clap::Args, Debug)]
pub struct Interim {
    #[command(flatten)]
    run: RunArguments,
}

impl Interim {
    pub async fn run(self) -> anyhow::Result<()> {
        self.run.run(RunMode::Interim).await
    }
}
