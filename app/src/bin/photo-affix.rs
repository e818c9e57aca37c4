//! Headless front end: affix images given on the command line.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use photo_affix_lib::cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    photo_affix_lib::run(args).await
}
