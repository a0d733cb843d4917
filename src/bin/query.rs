use anyhow::Result;
use clap::Parser;
use review_loader::cli::query::{run, QueryArgs};

#[derive(Parser, Debug)]
#[command(
    name = "query",
    version,
    about = "Example searches over the product and review collections"
)]
struct Cli {
    #[command(flatten)]
    query: QueryArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    review_loader::logging::init_tracing("warn")?;
    review_loader::util::env::bootstrap_cli("query");

    run(cli.query).await
}
