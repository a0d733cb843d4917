use anyhow::Result;
use review_loader::cli::count::run;

#[tokio::main]
async fn main() -> Result<()> {
    review_loader::logging::init_tracing("warn")?;
    review_loader::util::env::bootstrap_cli("count");

    run().await
}
