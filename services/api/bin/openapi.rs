//! Writes the boundary's OpenAPI document to disk.

use clap::Parser;
use duologue_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

#[derive(Parser, Debug)]
#[command(version, about = "Export the Duologue OpenAPI document")]
struct Args {
    /// Where to write the JSON document.
    #[arg(short, long, default_value = "openapi.json")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&args.out, document)?;
    println!("Wrote {}", args.out.display());
    Ok(())
}
