use std::collections::BTreeMap;
use std::panic;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::asset::fetch_asset;
use crate::catalog::Catalog;
use crate::config::HarvestConfig;
use crate::domain::{CatalogId, StoredFile};
use crate::error::HarvestError;
use crate::http::{Fetcher, HttpFetcher};
use crate::store::{ContentStore, StoreOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Descriptor,
    Asset,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored(StoredFile),
    AlreadyPresent,
    Skipped(Stage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tally {
    already_present: usize,
    skipped: BTreeMap<Stage, usize>,
    by_extension: BTreeMap<String, usize>,
}

impl Tally {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Stored(file) => {
                *self.by_extension.entry(file.extension).or_default() += 1;
            }
            ItemOutcome::AlreadyPresent => self.already_present += 1,
            ItemOutcome::Skipped(stage) => *self.skipped.entry(stage).or_default() += 1,
        }
    }

    fn merge(mut self, other: Tally) -> Self {
        self.already_present += other.already_present;
        for (stage, count) in other.skipped {
            *self.skipped.entry(stage).or_default() += count;
        }
        for (ext, count) in other.by_extension {
            *self.by_extension.entry(ext).or_default() += count;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub upper_bound: u32,
    pub downloaded: usize,
    pub already_present: usize,
    pub skipped: BTreeMap<Stage, usize>,
    pub by_extension: BTreeMap<String, usize>,
    pub directory: String,
    pub elapsed_ms: u128,
    pub finished_at: String,
}

impl HarvestSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

pub struct Harvester<F: Fetcher> {
    catalog: Catalog<F>,
    store: ContentStore,
    workers: usize,
}

impl Harvester<HttpFetcher> {
    pub fn from_config(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::new(config)?;
        let store = ContentStore::open(config.directory.clone())?;
        Ok(Self::new(
            Catalog::new(fetcher, &config.api_root),
            store,
            config.workers,
        ))
    }
}

impl<F: Fetcher> Harvester<F> {
    pub fn new(catalog: Catalog<F>, store: ContentStore, workers: usize) -> Self {
        Self {
            catalog,
            store,
            workers,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Resolves the catalog bound, then mirrors ids `1..=bound`.
    pub fn run(&self) -> Result<HarvestSummary, HarvestError> {
        let started = Instant::now();
        let bound = self.catalog.upper_bound()?;

        let tally = if self.workers <= 1 || bound <= 1 {
            self.run_sequential(bound)
        } else {
            self.run_pooled(bound)
        };

        let summary = HarvestSummary {
            upper_bound: bound,
            downloaded: self.store.downloaded(),
            already_present: tally.already_present,
            skipped: tally.skipped,
            by_extension: tally.by_extension,
            directory: self.store.root().to_string(),
            elapsed_ms: started.elapsed().as_millis(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        };
        info!(
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            skipped = summary.skipped_total(),
            "End of execution"
        );
        Ok(summary)
    }

    pub fn process(&self, id: CatalogId) -> ItemOutcome {
        let Some(descriptor) = self.catalog.resolve_descriptor(id) else {
            return ItemOutcome::Skipped(Stage::Descriptor);
        };
        let Some(payload) = fetch_asset(self.catalog.fetcher(), &descriptor) else {
            return ItemOutcome::Skipped(Stage::Asset);
        };
        match self.store.place(&payload, id) {
            StoreOutcome::Written(file) => ItemOutcome::Stored(file),
            StoreOutcome::AlreadyPresent(_) => ItemOutcome::AlreadyPresent,
            StoreOutcome::Failed(_) => ItemOutcome::Skipped(Stage::Store),
        }
    }

    fn run_sequential(&self, bound: u32) -> Tally {
        let mut tally = Tally::default();
        for id in CatalogId::range(bound) {
            tally.record(self.process(id));
        }
        tally
    }

    fn run_pooled(&self, bound: u32) -> Tally {
        let width = self.workers.min(bound as usize);
        let cursor = &AtomicU64::new(1);
        debug!(width, bound, "starting worker pool");

        thread::scope(|scope| {
            let handles = (0..width)
                .map(|_| {
                    scope.spawn(move || {
                        let mut tally = Tally::default();
                        loop {
                            let next = cursor.fetch_add(1, Ordering::Relaxed);
                            if next > u64::from(bound) {
                                break tally;
                            }
                            let Ok(id) = CatalogId::new(next as u32) else {
                                continue;
                            };
                            tally.record(self.process(id));
                        }
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .fold(Tally::default(), |acc, handle| match handle.join() {
                    Ok(tally) => acc.merge(tally),
                    Err(payload) => panic::resume_unwind(payload),
                })
        })
    }
}
