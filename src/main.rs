mod database;
mod ingest;
mod sync;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::database::store::CatalogStore;
use crate::sync::Reconciler;
use crate::utils::natsort;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory of the media tree (falls back to MEDIA_ROOT)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Path of the SQLite catalog (falls back to DATABASE_URL, then data.db)
    #[arg(short, long)]
    db_path: Option<String>,

    /// Delete catalog entries whose directory no longer exists
    #[arg(long)]
    prune: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let settings = utils::config::resolve(args.root, args.db_path)?;

    info!("Catalog sync starting");
    info!("Root: {:?}", settings.root);
    info!("DB: {}", settings.db_path);

    let mut store = CatalogStore::open(&settings.db_path)?;
    let mut reconciler = Reconciler::new(&mut store, natsort::natural_cmp);
    reconciler.sync(&settings.root, args.prune)?;

    Ok(())
}
