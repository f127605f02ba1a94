//! Reference-data refresh into the shared store.
//!
//! Each resource has at most one network read in flight; concurrent callers
//! await the same shared future. A read completed within the cooldown window
//! suppresses the next one. Every read is tagged with a generation so that a
//! slow, older result never replaces a newer one, and nothing started before
//! a logout lands in the store after it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::time::Instant;

use super::{client::DataClient, resources::ResourceKey, types::ApiError};
use crate::state::{normalize_records, Record};

type FetchResult = Result<Option<Arc<Vec<Record>>>, Arc<ApiError>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
pub(crate) struct FetchRegistry {
    in_flight: HashMap<ResourceKey, (u64, SharedFetch)>,
    last_fetched: HashMap<ResourceKey, Instant>,
    generation: u64,
    /// Generations at or below this were started before the last teardown.
    floor: u64,
}

enum Plan {
    Join(SharedFetch),
    Skip,
    Start(SharedFetch),
}

/// What happened to one resource during a bulk read.
#[derive(Debug, Clone)]
pub enum KeyOutcome {
    /// This call performed the read.
    Fetched { records: Arc<Vec<Record>> },
    /// Another caller's read was already in flight and this call awaited it.
    Joined { records: Arc<Vec<Record>> },
    /// The server answered with an empty or `null` body; the store is untouched.
    NoData,
    /// Last read completed within the cooldown window.
    Skipped,
    Failed { error: Arc<ApiError> },
}

impl KeyOutcome {
    fn from_result(result: FetchResult, joined: bool) -> Self {
        match result {
            Ok(Some(records)) if joined => KeyOutcome::Joined { records },
            Ok(Some(records)) => KeyOutcome::Fetched { records },
            Ok(None) => KeyOutcome::NoData,
            Err(error) => KeyOutcome::Failed { error },
        }
    }

    pub fn records(&self) -> Option<&Arc<Vec<Record>>> {
        match self {
            KeyOutcome::Fetched { records } | KeyOutcome::Joined { records } => Some(records),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BulkReadReport {
    pub outcomes: Vec<(ResourceKey, KeyOutcome)>,
}

impl BulkReadReport {
    pub fn get(&self, key: ResourceKey) -> Option<&KeyOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = (ResourceKey, &ApiError)> + '_ {
        self.outcomes.iter().filter_map(|(key, outcome)| match outcome {
            KeyOutcome::Failed { error } => Some((*key, error.as_ref())),
            _ => None,
        })
    }
}

impl DataClient {
    /// Refreshes the named resources, or every resource when `names` is
    /// `None`. Unknown names are ignored. Per-resource failures are logged
    /// and reported, never returned as an error.
    pub async fn bulk_read(&self, names: Option<&[&str]>) -> BulkReadReport {
        let keys: Vec<ResourceKey> = match names {
            None => ResourceKey::ALL.to_vec(),
            Some(names) => names
                .iter()
                .filter_map(|name| match name.parse() {
                    Ok(key) => Some(key),
                    Err(_) => {
                        tracing::debug!(name, "ignoring unknown resource key");
                        None
                    }
                })
                .collect(),
        };
        self.bulk_read_keys(&keys).await
    }

    pub async fn bulk_read_keys(&self, keys: &[ResourceKey]) -> BulkReadReport {
        let mut unique: Vec<ResourceKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if !unique.contains(key) {
                unique.push(*key);
            }
        }
        if unique.is_empty() {
            return BulkReadReport::default();
        }

        let outcomes = join_all(unique.into_iter().map(|key| self.read_key(key))).await;
        BulkReadReport { outcomes }
    }

    async fn read_key(&self, key: ResourceKey) -> (ResourceKey, KeyOutcome) {
        let outcome = match self.plan(key) {
            Plan::Skip => {
                tracing::debug!(%key, "read within cooldown; skipping");
                KeyOutcome::Skipped
            }
            Plan::Join(fetch) => {
                tracing::debug!(%key, "joining in-flight read");
                KeyOutcome::from_result(fetch.await, true)
            }
            Plan::Start(fetch) => KeyOutcome::from_result(fetch.await, false),
        };
        (key, outcome)
    }

    fn plan(&self, key: ResourceKey) -> Plan {
        let mut registry = self.registry();
        if let Some((_, fetch)) = registry.in_flight.get(&key) {
            return Plan::Join(fetch.clone());
        }
        if let Some(at) = registry.last_fetched.get(&key) {
            if at.elapsed() < self.fetch_cooldown() {
                return Plan::Skip;
            }
        }

        registry.generation += 1;
        let generation = registry.generation;
        let client = self.clone();
        let fetch = async move { client.fetch_into_store(key, generation).await }
            .boxed()
            .shared();
        registry
            .in_flight
            .insert(key, (generation, fetch.clone()));
        Plan::Start(fetch)
    }

    async fn fetch_into_store(self, key: ResourceKey, generation: u64) -> FetchResult {
        let result = match self.read(key.collection_path()).await {
            Ok(Value::Null) => {
                tracing::debug!(%key, "read returned no data");
                Ok(None)
            }
            Ok(value) => {
                let records = Arc::new(normalize_records(value));
                if self.store().replace(key, records.clone(), generation) {
                    tracing::debug!(%key, count = records.len(), "store updated");
                } else {
                    tracing::debug!(%key, generation, "discarding superseded read");
                }
                Ok(Some(records))
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "failed to refresh resource; keeping previous records");
                Err(Arc::new(err))
            }
        };
        self.settle(key, generation);
        result
    }

    fn settle(&self, key: ResourceKey, generation: u64) {
        let mut registry = self.registry();
        if matches!(registry.in_flight.get(&key), Some((g, _)) if *g == generation) {
            registry.in_flight.remove(&key);
        }
        if generation > registry.floor {
            registry.last_fetched.insert(key, Instant::now());
        }
    }

    /// Forgets in-flight reads and cooldown stamps. Returns the generation
    /// floor below which late results must be discarded.
    pub(crate) fn reset_fetch_state(&self) -> u64 {
        let mut registry = self.registry();
        registry.in_flight.clear();
        registry.last_fetched.clear();
        registry.floor = registry.generation;
        registry.floor
    }
}
