//! The execution environment injected into the transfer function.
//!
//! Everything `step` may consult beyond the abstract state itself lives
//! here: the configuration, the address of the analyzed contract, the
//! `JUMPDEST` locations of its code, and an optional source of concrete
//! on-chain storage with its cache. Holding
//! these in an explicit value (rather than process-wide singletons) lets
//! several analyses with different settings run side by side.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheStats, StripedCache};
use crate::config::Config;
use crate::error::Result;
use crate::set::BoundedWordSet;
use crate::word::Word256;

/// Concrete persistent storage, e.g. a node RPC client or a state snapshot.
pub trait StorageSource: Send + Sync {
    /// The value at `key` in the storage of the contract at `address`.
    fn load(&self, address: &Word256, key: &Word256) -> Result<Word256>;
}

/// Storage lookups memoized per `(address, key)`.
#[derive(Clone)]
pub struct CachedStorage {
    source: Arc<dyn StorageSource>,
    cache: Arc<StripedCache<(Word256, Word256), Word256>>,
}

impl CachedStorage {
    pub fn new(source: Arc<dyn StorageSource>, cache: Arc<StripedCache<(Word256, Word256), Word256>>) -> Self {
        Self { source, cache }
    }

    /// Looks up a slot, consulting the source on a cache miss.
    ///
    /// A failing source is logged and reported as `None`: the caller
    /// degrades the value to `Top`.
    pub fn load(&self, address: &Word256, key: &Word256) -> Option<Word256> {
        let result = self
            .cache
            .get_or_try_insert_with((address.clone(), key.clone()), |(a, k)| self.source.load(a, k));
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("storage lookup for slot {} failed: {}", key, e);
                None
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[derive(Clone, Default)]
pub struct Environment {
    config: Config,
    address: Option<Word256>,
    jumpdests: Option<Arc<BTreeSet<Word256>>>,
    storage: Option<CachedStorage>,
}

impl Environment {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Sets the address of the contract under analysis.
    pub fn with_address(mut self, address: Word256) -> Self {
        self.address = Some(address);
        self
    }

    /// Restricts jumps to the given `JUMPDEST` program counters.
    ///
    /// Without this, every destination is assumed valid.
    pub fn with_jumpdests<I: IntoIterator<Item = Word256>>(mut self, locations: I) -> Self {
        self.jumpdests = Some(Arc::new(locations.into_iter().collect()));
        self
    }

    /// Enables concrete storage lookups through `source`, memoized in `cache`.
    pub fn with_storage(mut self, source: Arc<dyn StorageSource>, cache: Arc<StripedCache<(Word256, Word256), Word256>>) -> Self {
        self.storage = Some(CachedStorage::new(source, cache));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn address(&self) -> Option<&Word256> {
        self.address.as_ref()
    }

    pub fn jumpdests(&self) -> Option<&BTreeSet<Word256>> {
        self.jumpdests.as_deref()
    }

    /// Whether some concretization of `destination` is a valid jump target.
    pub fn may_jump_to(&self, destination: &BoundedWordSet) -> bool {
        match (destination, &self.jumpdests) {
            (BoundedWordSet::Bottom, _) => false,
            (_, None) | (BoundedWordSet::Top, _) => true,
            (BoundedWordSet::Values(targets), Some(valid)) => targets.iter().any(|t| valid.contains(t)),
        }
    }

    pub fn storage(&self) -> Option<&CachedStorage> {
        self.storage.as_ref()
    }

    /// The concrete value of slot `key` of the analyzed contract, if obtainable.
    pub fn storage_value(&self, key: &Word256) -> Option<Word256> {
        let address = self.address.as_ref()?;
        self.storage.as_ref()?.load(address, key)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("config", &self.config)
            .field("address", &self.address)
            .field("jumpdests", &self.jumpdests.as_ref().map(|j| j.len()))
            .field("storage", &self.storage.is_some())
            .finish()
    }
}
