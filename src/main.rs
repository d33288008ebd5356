use std::process::exit;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use colloquy::cli::{self, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli).await {
        eprintln!("ERROR: {}", e);
        exit(1);
    }
}
