//! Per-scope aggregates over the stored chunks and the versioned snapshot that serves them.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::MemoryError;
use crate::payload::ChunkPayload;
use crate::scope::ScopeKey;
use crate::tokens::TokenEstimator;
use crate::vector_store::VectorStore;

const CHARS_PER_PAGE: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeStats {
    /// `None` for the whole collection.
    pub scope: Option<ScopeKey>,
    pub total_chunk_count: usize,
    pub total_chars: usize,
    pub total_tokens: usize,
    pub avg_chunk_chars: f64,
    pub avg_tokens_per_chunk: f64,
    pub estimated_pages: usize,
    /// Version of the snapshot this value belongs to.
    pub computed_at: u64,
}

/// Advisory top-k ranges for common request shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecommendedRanges {
    pub simple_query: usize,
    pub medium_section: usize,
    pub large_section: usize,
    pub full_document: usize,
}

impl ScopeStats {
    #[must_use]
    pub fn recommended_ranges(&self) -> RecommendedRanges {
        let total = self.total_chunk_count;
        RecommendedRanges {
            simple_query: (total / 10).max(10),
            medium_section: (total / 5).max(20),
            large_section: (total * 2 / 5).max(50),
            full_document: total.min(200),
        }
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    chunks: usize,
    chars: usize,
    tokens: usize,
}

impl Accumulator {
    fn add(&mut self, chars: usize, tokens: usize) {
        self.chunks += 1;
        self.chars += chars;
        self.tokens += tokens;
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(self, scope: Option<ScopeKey>, version: u64) -> ScopeStats {
        let (avg_chunk_chars, avg_tokens_per_chunk) = if self.chunks == 0 {
            (0.0, 0.0)
        } else {
            (
                self.chars as f64 / self.chunks as f64,
                self.tokens as f64 / self.chunks as f64,
            )
        };
        ScopeStats {
            scope,
            total_chunk_count: self.chunks,
            total_chars: self.chars,
            total_tokens: self.tokens,
            avg_chunk_chars,
            avg_tokens_per_chunk,
            estimated_pages: self.chars / CHARS_PER_PAGE,
            computed_at: version,
        }
    }
}

/// Immutable stats for one collection at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub version: u64,
    pub collection: Option<ScopeStats>,
    pub files: BTreeMap<String, ScopeStats>,
    pub domains: BTreeMap<String, ScopeStats>,
    /// Points skipped because their payload was malformed.
    pub skipped: usize,
}

impl StatsSnapshot {
    #[must_use]
    pub fn get(&self, scope: &ScopeKey) -> Option<&ScopeStats> {
        match scope {
            ScopeKey::File(name) => self.files.get(name),
            ScopeKey::Domain(name) => self.domains.get(name),
        }
    }

    /// File scopes then domain scopes, each in name order.
    #[must_use]
    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.files
            .keys()
            .map(|n| ScopeKey::File(n.clone()))
            .chain(self.domains.keys().map(|n| ScopeKey::Domain(n.clone())))
            .collect()
    }

    /// Write the snapshot for `collection` to `path`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path, collection: &str) -> Result<(), MemoryError> {
        let persisted = PersistedStats {
            collection: collection.to_owned(),
            snapshot: self.clone(),
        };
        let json = serde_json::to_vec_pretty(&persisted)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(path = %path.display(), version = self.version, "stats snapshot saved");
        Ok(())
    }

    /// Read a snapshot saved by [`StatsSnapshot::save`].
    ///
    /// Returns `None` when no file exists or the file belongs to another collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path, collection: &str) -> Result<Option<Self>, MemoryError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedStats = serde_json::from_slice(&bytes)?;
        if persisted.collection != collection {
            tracing::warn!(
                path = %path.display(),
                saved_for = %persisted.collection,
                collection,
                "stats snapshot belongs to another collection"
            );
            return Ok(None);
        }
        Ok(Some(persisted.snapshot))
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedStats {
    collection: String,
    snapshot: StatsSnapshot,
}

/// Scroll every stored payload of `collection` once and aggregate it per file, per domain
/// and for the whole collection.
///
/// # Errors
///
/// Returns an error if the store cannot be scrolled.
pub async fn compute_stats(
    store: &dyn VectorStore,
    collection: &str,
    estimator: &TokenEstimator,
    version: u64,
) -> Result<StatsSnapshot, MemoryError> {
    let points = store.scroll_payloads(collection).await?;

    let mut total = Accumulator::default();
    let mut files: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut domains: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut skipped = 0;

    for point in &points {
        let payload = match ChunkPayload::from_map(&point.payload) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(point_id = %point.id, field = e.field, "skipping chunk in stats: {e}");
                skipped += 1;
                continue;
            }
        };
        let chars = payload.text.chars().count();
        let tokens = estimator.estimate_with_hint(&payload.text, payload.token_count);

        total.add(chars, tokens);
        if let Some(name) = payload.file_name {
            files.entry(name).or_default().add(chars, tokens);
        }
        if let Some(name) = payload.domain {
            domains.entry(name).or_default().add(chars, tokens);
        }
    }

    let snapshot = StatsSnapshot {
        version,
        collection: (total.chunks > 0).then(|| total.finish(None, version)),
        files: files
            .into_iter()
            .map(|(name, acc)| {
                let stats = acc.finish(Some(ScopeKey::File(name.clone())), version);
                (name, stats)
            })
            .collect(),
        domains: domains
            .into_iter()
            .map(|(name, acc)| {
                let stats = acc.finish(Some(ScopeKey::Domain(name.clone())), version);
                (name, stats)
            })
            .collect(),
        skipped,
    };

    tracing::info!(
        collection,
        version,
        files = snapshot.files.len(),
        domains = snapshot.domains.len(),
        skipped,
        "scope stats computed"
    );
    Ok(snapshot)
}

/// Serves the current [`StatsSnapshot`]; a refresh swaps the whole snapshot at once.
pub struct ScopeStatsProvider {
    tx: watch::Sender<Arc<StatsSnapshot>>,
    /// Highest version handed out or installed so far.
    reserved: AtomicU64,
}

impl Default for ScopeStatsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeStatsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStatsProvider")
            .field("version", &self.version())
            .finish()
    }
}

impl ScopeStatsProvider {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(StatsSnapshot::default()));
        Self {
            tx,
            reserved: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<StatsSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }

    /// Stats for `scope`, or `None` when the scope matches no stored chunk.
    #[must_use]
    pub fn get_stats(&self, scope: &ScopeKey) -> Option<ScopeStats> {
        self.tx.borrow().get(scope).cloned()
    }

    #[must_use]
    pub fn collection_stats(&self) -> Option<ScopeStats> {
        self.tx.borrow().collection.clone()
    }

    #[must_use]
    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.tx.borrow().scopes()
    }

    /// Notified whenever a newer snapshot is installed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatsSnapshot>> {
        self.tx.subscribe()
    }

    /// Install `snapshot` if it is newer than the current one. Returns whether it was installed.
    pub fn install(&self, snapshot: StatsSnapshot) -> bool {
        let version = snapshot.version;
        let installed = self.tx.send_if_modified(|current| {
            if snapshot.version > current.version {
                *current = Arc::new(snapshot);
                true
            } else {
                false
            }
        });
        if installed {
            self.reserved.fetch_max(version, Ordering::SeqCst);
            tracing::debug!(version, "stats snapshot installed");
        } else {
            tracing::warn!(version, current = self.version(), "stale stats snapshot ignored");
        }
        installed
    }

    /// Recompute stats from the store and install them under a freshly reserved version.
    ///
    /// Of two overlapping refreshes the one started last wins. Returns the installed version,
    /// or `None` when a newer snapshot was installed while this one was being computed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be scrolled.
    pub async fn refresh(
        &self,
        store: &dyn VectorStore,
        collection: &str,
        estimator: &TokenEstimator,
    ) -> Result<Option<u64>, MemoryError> {
        let version = self.reserved.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = compute_stats(store, collection, estimator, version).await?;
        Ok(self.install(snapshot).then_some(version))
    }
}
