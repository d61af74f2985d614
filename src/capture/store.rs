//! Concurrent store for captured portal API responses.
//!
//! Response bodies arrive from independently spawned fetch units, so the
//! store is the single point where racing writers meet. Keys are URL
//! paths; the upsert rule prefers warning-free payloads but otherwise
//! keeps the first capture, so a clean early response is never clobbered
//! by a degraded duplicate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

/// One captured portal API response, decoded.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// URL path with origin and query string removed.
    pub path: String,
    /// Decoded JSON body. `None` when the body could not be fetched or
    /// was not valid JSON.
    pub body: Option<Value>,
    /// True when the payload carries a portal-side warning message.
    pub has_warning: bool,
    pub status_code: u16,
}

/// What an upsert did with the incoming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Path was new; response stored.
    Inserted,
    /// Stored response carried a warning and the incoming one did not;
    /// the incoming response replaced it.
    Upgraded,
    /// Stored response was as good or better; incoming one dropped.
    KeptExisting,
}

struct StoredEntry {
    response: CapturedResponse,
    /// Arrival order, preserved across quality upgrades so "first
    /// matching capture" stays deterministic.
    seq: u64,
}

/// Keyed store of captured responses, plus the activity clock used to
/// detect network quiet.
pub struct ResponseStore {
    entries: DashMap<String, StoredEntry>,
    next_seq: AtomicU64,
    last_activity: Mutex<Instant>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Record network activity. Called for every response event the page
    /// emits, captured or not, so quiet detection sees the whole page.
    pub fn touch(&self) {
        if let Ok(mut at) = self.last_activity.lock() {
            *at = Instant::now();
        }
    }

    /// Time since the last observed network activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Insert or quality-upgrade a captured response.
    pub fn upsert(&self, incoming: CapturedResponse) -> UpsertOutcome {
        use dashmap::mapref::entry::Entry;

        let path = incoming.path.clone();
        let outcome = match self.entries.entry(path.clone()) {
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(StoredEntry {
                    response: incoming,
                    seq,
                });
                UpsertOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                if slot.get().response.has_warning && !incoming.has_warning {
                    let seq = slot.get().seq;
                    slot.insert(StoredEntry {
                        response: incoming,
                        seq,
                    });
                    UpsertOutcome::Upgraded
                } else {
                    UpsertOutcome::KeptExisting
                }
            }
        };
        debug!(path = %path, outcome = ?outcome, "stored captured response");
        outcome
    }

    /// Whether any captured path contains one of the given keywords.
    pub fn matches_any(&self, keywords: &[String]) -> bool {
        self.entries
            .iter()
            .any(|entry| keywords.iter().any(|k| entry.key().contains(k.as_str())))
    }

    /// Wait until no network activity has been seen for `window`, or
    /// until `budget` elapses. Returns true when quiet was reached.
    pub async fn await_quiet(&self, budget: Duration, window: Duration) -> bool {
        let deadline = Instant::now() + budget;
        loop {
            if self.idle_for() >= window {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Point-in-time copy of the store in arrival order. Taken once per
    /// operation, after the capture drain barrier.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut entries: Vec<(u64, CapturedResponse)> = self
            .entries
            .iter()
            .map(|e| (e.value().seq, e.value().response.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        StoreSnapshot {
            responses: entries.into_iter().map(|(_, r)| r).collect(),
        }
    }
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the store handed to the normalizer.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    responses: Vec<CapturedResponse>,
}

impl StoreSnapshot {
    /// First captured response whose path contains any of the keywords.
    pub fn find(&self, keywords: &[&str]) -> Option<&CapturedResponse> {
        self.responses
            .iter()
            .find(|r| keywords.iter().any(|k| r.path.contains(k)))
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.responses.iter().map(|r| r.path.as_str())
    }

    pub fn from_responses(responses: Vec<CapturedResponse>) -> Self {
        Self { responses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn captured(path: &str, body: Value, has_warning: bool) -> CapturedResponse {
        CapturedResponse {
            path: path.to_string(),
            body: Some(body),
            has_warning,
            status_code: 200,
        }
    }

    // ── Upsert rule ──

    #[test]
    fn test_first_capture_wins_when_equal_quality() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/historico", json!({"v": 1}), false));
        let outcome = store.upsert(captured("/api/historico", json!({"v": 2}), false));
        assert_eq!(outcome, UpsertOutcome::KeptExisting);
        let snap = store.snapshot();
        let body = snap.find(&["historico"]).unwrap().body.clone().unwrap();
        assert_eq!(body["v"], json!(1));
    }

    #[test]
    fn test_clean_capture_replaces_warning_capture() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/historico", json!({"v": 1}), true));
        let outcome = store.upsert(captured("/api/historico", json!({"v": 2}), false));
        assert_eq!(outcome, UpsertOutcome::Upgraded);
        let snap = store.snapshot();
        let entry = snap.find(&["historico"]).unwrap();
        assert!(!entry.has_warning);
        assert_eq!(entry.body.clone().unwrap()["v"], json!(2));
    }

    #[test]
    fn test_warning_capture_never_replaces_clean() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/boletim", json!({"v": 1}), false));
        let outcome = store.upsert(captured("/api/boletim", json!({"v": 2}), true));
        assert_eq!(outcome, UpsertOutcome::KeptExisting);
        let snap = store.snapshot();
        assert_eq!(
            snap.find(&["boletim"]).unwrap().body.clone().unwrap()["v"],
            json!(1)
        );
    }

    #[test]
    fn test_warning_capture_kept_when_nothing_better() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/boletim", json!({"v": 1}), true));
        store.upsert(captured("/api/boletim", json!({"v": 2}), true));
        let snap = store.snapshot();
        let entry = snap.find(&["boletim"]).unwrap();
        assert!(entry.has_warning);
        assert_eq!(entry.body.clone().unwrap()["v"], json!(1));
    }

    // ── Snapshot ordering and lookup ──

    #[test]
    fn test_snapshot_preserves_arrival_order() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/aluno", json!({}), false));
        store.upsert(captured("/api/historico", json!({}), true));
        store.upsert(captured("/api/boletim", json!({}), false));
        // A quality upgrade must not move the entry to the back.
        store.upsert(captured("/api/historico", json!({}), false));
        let snap = store.snapshot();
        let ordered: Vec<String> = snap.paths().map(str::to_string).collect();
        assert_eq!(ordered, vec!["/api/aluno", "/api/historico", "/api/boletim"]);
    }

    #[test]
    fn test_find_misses_cleanly() {
        let store = ResponseStore::new();
        store.upsert(captured("/api/boletim", json!({}), false));
        let snap = store.snapshot();
        assert!(snap.find(&["historico"]).is_none());
        assert!(snap.find(&["boletim"]).is_some());
    }

    #[test]
    fn test_matches_any() {
        let store = ResponseStore::new();
        assert!(!store.matches_any(&["historico".to_string()]));
        store.upsert(captured("/api/v2/historico/aluno", json!({}), false));
        assert!(store.matches_any(&["historico".to_string()]));
        assert!(!store.matches_any(&["matriz".to_string()]));
    }

    // ── Activity clock ──

    #[tokio::test(start_paused = true)]
    async fn test_await_quiet_times_out_under_activity() {
        let store = std::sync::Arc::new(ResponseStore::new());
        let clone = store.clone();
        let noisy = tokio::spawn(async move {
            loop {
                clone.touch();
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });
        let quiet = store
            .await_quiet(Duration::from_secs(2), Duration::from_millis(500))
            .await;
        noisy.abort();
        assert!(!quiet);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_quiet_succeeds_when_idle() {
        let store = ResponseStore::new();
        store.touch();
        let quiet = store
            .await_quiet(Duration::from_secs(10), Duration::from_millis(500))
            .await;
        assert!(quiet);
    }
}
