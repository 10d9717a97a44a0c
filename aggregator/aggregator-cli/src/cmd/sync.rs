use crate::cmd::RunArguments;
use csaf_aggregator::process::RunMode;

/// Run a full sync: re-download and re-validate every provider's complete
/// document set.
#[derive(clap::Args, Debug)]
pub struct Sync {
    #[command(flatten)]
    run: RunArguments,
}

impl Sync {
    pub async fn run(self) -> anyhow::Result<()> {
        self.run.run(RunMode::Full).await
    }
}
