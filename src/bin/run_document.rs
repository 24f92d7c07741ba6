//! Run the extraction workflow for one uploaded object and print the outcome as JSON.

use anyhow::{Context, Result, bail};
use clap::Parser;
use wordcollect::{
    config, logging,
    pipeline::{Orchestrator, Trigger},
};

#[derive(Parser)]
#[command(
    name = "run-document",
    about = "Run the extraction workflow for a single uploaded object"
)]
struct Cli {
    /// Bucket holding the object.
    #[arg(long)]
    bucket: String,
    /// Object key, e.g. raw/user123/list.txt.
    #[arg(long)]
    key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();
    logging::init_tracing(logging::Console::Stderr);

    let raw_prefix = &config::get_config().raw_prefix;
    let Some(trigger) = Trigger::accept(&cli.bucket, &cli.key, raw_prefix) else {
        bail!("key {} is outside the raw prefix {raw_prefix}", cli.key);
    };

    let orchestrator = Orchestrator::from_config()
        .await
        .context("failed to initialize workflow collaborators")?;

    match orchestrator.run(trigger).await {
        Ok(success) => {
            let rendered =
                serde_json::to_string_pretty(&success).context("failed to render outcome")?;
            println!("{rendered}");
            Ok(())
        }
        Err(failure) => {
            let rendered =
                serde_json::to_string_pretty(&failure).context("failed to render failure")?;
            println!("{rendered}");
            std::process::exit(1);
        }
    }
}
