#[derive(Debug, clap::Parser)]
#[command(next_help_heading = "Runner")]
pub struct RunnerArguments {
    /// Number of parallel provider workers, overriding the configuration file.
    /// Too many parallel requests might make you violate request rates.
    #[arg(short, long)]
    pub workers: Option<usize>,
}
