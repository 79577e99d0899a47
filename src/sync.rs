//! The reconciliation pass: make the catalog mirror the directory tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::database::store::CatalogStore;
use crate::ingest::scanner::{self, ScanError, WorkEntry};
use crate::utils::natsort::NameCompare;

#[derive(Debug, Default, PartialEq)]
pub struct SyncReport {
    pub processed: usize,
    pub pruned: usize,
}

/// Drives one pass over the tree. The store handle and the name comparator
/// are both injected so nothing about the pass is ambient process state.
pub struct Reconciler<'a> {
    store: &'a mut CatalogStore,
    compare: NameCompare,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a mut CatalogStore, compare: NameCompare) -> Self {
        Self { store, compare }
    }

    /// Scan every immediate subdirectory of `root` and upsert it into the
    /// catalog; with `prune`, afterwards delete catalog entries whose
    /// directory was not seen this pass.
    ///
    /// Directory scans run on the rayon pool; results come back in the sorted
    /// input order, and all store writes happen here on the calling thread,
    /// one transaction per work. Only an unreadable root or a store write
    /// failure aborts the pass; anything below that logs and continues.
    pub fn sync(&mut self, root: &Path, prune: bool) -> Result<SyncReport> {
        let dirs = scanner::list_work_dirs(root, self.compare)?;

        let compare = self.compare;
        let scanned: Vec<(PathBuf, Result<WorkEntry, ScanError>)> = dirs
            .into_par_iter()
            .map(|dir| {
                let entry = scanner::scan_work(root, &dir, compare);
                (dir, entry)
            })
            .collect();

        let mut processed: HashSet<String> = HashSet::new();
        for (dir, result) in scanned {
            // The key counts as seen even when the scan failed, so a prune in
            // the same pass cannot drop a work over a transient read error.
            let key = scanner::work_key(root, &dir);
            processed.insert(key.clone());

            match result {
                Ok(entry) => {
                    let page_count = entry.pages.len();
                    self.store
                        .apply_work(&entry.work, &entry.pages)
                        .with_context(|| format!("Failed to write work {key} to the catalog"))?;
                    info!("Synced {} ({} pages)", key, page_count);
                }
                Err(e) => {
                    warn!("Skipped {}: {:#}", key, anyhow::Error::from(e));
                }
            }
        }

        let pruned = if prune {
            let removed = self.store.prune_except(&processed)?;
            if removed > 0 {
                info!("Pruned {} catalog entries.", removed);
            }
            removed
        } else {
            0
        };

        info!("Sync finished: {} works processed.", processed.len());
        Ok(SyncReport {
            processed: processed.len(),
            pruned,
        })
    }
}
