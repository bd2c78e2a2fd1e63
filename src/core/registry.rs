//! Centralized request registry
//!
//! Tracks every request handed to the data layer, keyed by its generated id.
//! GET requests are additionally indexed by href so that equivalent requests
//! share one network call and one result.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, info};
use tokio::sync::watch;
use uuid::Uuid;

use super::{
    request::{RequestId, RequestState, RestRequest},
    traits::Transport,
};

struct RequestEntry {
    request: Arc<RestRequest>,
    state: watch::Sender<RequestState>,
    created: Instant,
}

impl RequestEntry {
    /// Whether a new submission for the same href may reuse this entry.
    fn is_reusable(&self, ttl: Duration) -> bool {
        match &*self.state.borrow() {
            RequestState::Pending => true,
            RequestState::Completed(_) => self.created.elapsed() < ttl,
            RequestState::Failed(_) => false,
        }
    }

    /// Settled and older than the TTL; lookups treat it as absent.
    fn is_expired(&self, ttl: Duration) -> bool {
        !self.state.borrow().is_pending() && self.created.elapsed() >= ttl
    }
}

/// Deduplicating cache of in-flight and completed backend calls
pub struct RequestRegistry {
    transport: Arc<dyn Transport>,
    entries: DashMap<RequestId, Arc<RequestEntry>>,
    hrefs: DashMap<String, RequestId>,
    ttl: Duration,
}

impl RequestRegistry {
    pub fn new(transport: Arc<dyn Transport>, ttl: Duration) -> Self {
        Self {
            transport,
            entries: DashMap::new(),
            hrefs: DashMap::new(),
            ttl,
        }
    }

    pub fn generate_request_id(&self) -> RequestId {
        Uuid::new_v4().to_string()
    }

    /// Register a request for execution and return the id whose state tracks it.
    ///
    /// A GET whose href already has a live entry is not dispatched again: the
    /// existing entry's id is returned instead. Must be called from within a
    /// tokio runtime.
    pub fn configure(&self, request: RestRequest) -> RequestId {
        let request = Arc::new(request);
        self.purge_expired();

        if !request.is_cacheable() {
            let entry = self.insert_entry(request.clone());
            self.dispatch(entry);
            return request.id.clone();
        }

        let entry = match self.hrefs.entry(request.href.clone()) {
            Entry::Occupied(mut occupied) => {
                let live = self
                    .entries
                    .get(occupied.get())
                    .map(|existing| existing.is_reusable(self.ttl))
                    .unwrap_or(false);
                if live {
                    debug!(
                        "Request for {} already configured as {}",
                        request.href,
                        occupied.get()
                    );
                    return occupied.get().clone();
                }
                let stale = occupied.insert(request.id.clone());
                self.entries.remove(&stale);
                debug!("Replacing expired request {} for {}", stale, request.href);
                self.insert_entry(request.clone())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(request.id.clone());
                self.insert_entry(request.clone())
            }
        };

        self.dispatch(entry);
        request.id.clone()
    }

    fn insert_entry(&self, request: Arc<RestRequest>) -> Arc<RequestEntry> {
        let (state, _) = watch::channel(RequestState::Pending);
        let entry = Arc::new(RequestEntry {
            request,
            state,
            created: Instant::now(),
        });
        self.entries
            .insert(entry.request.id.clone(), entry.clone());
        entry
    }

    fn dispatch(&self, entry: Arc<RequestEntry>) {
        let transport = self.transport.clone();
        debug!(
            "Dispatching {} {} ({})",
            entry.request.method, entry.request.href, entry.request.id
        );
        tokio::spawn(async move {
            let state = match transport.execute(&entry.request).await {
                Ok(response) => RequestState::from_response(response),
                Err(err) => RequestState::Failed(err),
            };
            if let RequestState::Failed(err) = &state {
                debug!("Request {} failed: {}", entry.request.id, err);
            }
            // The entry may have been evicted meanwhile; its subscribers still
            // get the outcome.
            entry.state.send_replace(state);
        });
    }

    /// Drop every settled entry older than the TTL, with its href index.
    pub fn purge_expired(&self) -> usize {
        let mut expired = Vec::new();
        self.entries.retain(|id, entry| {
            if entry.is_expired(self.ttl) {
                expired.push((id.clone(), entry.request.href.clone()));
                false
            } else {
                true
            }
        });
        for (id, href) in &expired {
            self.hrefs.remove_if(href, |_, indexed| indexed == id);
        }
        if !expired.is_empty() {
            debug!("Purged {} expired requests", expired.len());
        }
        expired.len()
    }

    /// Id indexed under `href`, unless that entry has expired.
    fn live_id(&self, href: &str) -> Option<RequestId> {
        let id = self.hrefs.get(href).map(|id| id.value().clone())?;
        let expired = self
            .entries
            .get(&id)
            .map(|entry| entry.is_expired(self.ttl))
            .unwrap_or(true);
        (!expired).then_some(id)
    }

    /// Get a request by id
    pub fn get_by_id(&self, id: &str) -> Option<Arc<RestRequest>> {
        self.entries.get(id).map(|entry| entry.request.clone())
    }

    /// Get the request currently indexed under `href`
    pub fn get_by_href(&self, href: &str) -> Option<Arc<RestRequest>> {
        let id = self.live_id(href)?;
        self.get_by_id(&id)
    }

    /// Whether `href` has an entry that a new submission would reuse.
    pub fn has_by_href(&self, href: &str) -> bool {
        let Some(id) = self.hrefs.get(href).map(|id| id.value().clone()) else {
            return false;
        };
        self.entries
            .get(&id)
            .map(|entry| entry.is_reusable(self.ttl))
            .unwrap_or(false)
    }

    pub fn state_by_id(&self, id: &str) -> Option<RequestState> {
        self.entries
            .get(id)
            .map(|entry| entry.state.borrow().clone())
    }

    pub fn state_by_href(&self, href: &str) -> Option<RequestState> {
        let id = self.live_id(href)?;
        self.state_by_id(&id)
    }

    /// Replay-latest view of a request's state.
    pub fn subscribe_by_id(&self, id: &str) -> Option<watch::Receiver<RequestState>> {
        self.entries.get(id).map(|entry| entry.state.subscribe())
    }

    pub fn subscribe_by_href(&self, href: &str) -> Option<watch::Receiver<RequestState>> {
        let id = self.live_id(href)?;
        self.subscribe_by_id(&id)
    }

    /// Wait until the request leaves the pending state.
    ///
    /// Returns `None` for unknown ids. A request whose call never completes
    /// keeps this future pending.
    pub async fn wait_for_id(&self, id: &str) -> Option<RequestState> {
        let mut rx = self.subscribe_by_id(id)?;
        // A dropped sender leaves its last state readable.
        let _ = rx.wait_for(|state| !state.is_pending()).await;
        let state = rx.borrow().clone();
        Some(state)
    }

    /// Evict every request whose href contains `pattern`.
    ///
    /// Calls already dispatched are left running; later submissions for the
    /// same hrefs go to the network again.
    pub fn remove_by_href_substring(&self, pattern: &str) -> usize {
        self.hrefs.retain(|href, _| !href.contains(pattern));
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.request.href.contains(pattern));
        let removed = before.saturating_sub(self.entries.len());
        info!("Removed {} cached requests matching {}", removed, pattern);
        removed
    }

    /// Evict the request indexed under exactly `href`.
    pub fn remove_by_href(&self, href: &str) -> bool {
        match self.hrefs.remove(href) {
            Some((_, id)) => {
                debug!("Removed cached request {} for {}", id, href);
                self.entries.remove(&id).is_some()
            }
            None => false,
        }
    }

    /// Evict a single request by id, along with its href index.
    pub fn remove_by_id(&self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some((id, entry)) => {
                self.hrefs.remove_if(&entry.request.href, |_, indexed| *indexed == id);
                debug!("Removed request {} for {}", id, entry.request.href);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get request counts for monitoring
    pub fn get_stats(&self) -> RegistryStats {
        let pending = self
            .entries
            .iter()
            .filter(|entry| entry.state.borrow().is_pending())
            .count();
        RegistryStats {
            request_count: self.entries.len(),
            indexed_href_count: self.hrefs.len(),
            pending_count: pending,
        }
    }
}

/// Statistics about registry contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub request_count: usize,
    pub indexed_href_count: usize,
    pub pending_count: usize,
}
