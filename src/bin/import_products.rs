use anyhow::Result;
use clap::Parser;
use review_loader::cli::import::{run, ImportArgs};
use review_loader::ingest::Products;

#[derive(Parser, Debug)]
#[command(name = "import_products", version, about = "Load an Amazon product metadata dump")]
struct Cli {
    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    review_loader::logging::init_tracing("info")?;
    review_loader::util::env::bootstrap_cli("import_products");

    run::<Products>(cli.import).await?;
    Ok(())
}
