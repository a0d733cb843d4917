use anyhow::Result;
use clap::Parser;
use review_loader::cli::import::{run, ImportArgs};
use review_loader::ingest::Reviews;

#[derive(Parser, Debug)]
#[command(name = "import_reviews", version, about = "Load an Amazon review dump")]
struct Cli {
    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    review_loader::logging::init_tracing("info")?;
    review_loader::util::env::bootstrap_cli("import_reviews");

    run::<Reviews>(cli.import).await?;
    Ok(())
}
