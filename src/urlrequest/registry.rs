use crate::urlrequest::request::Request;
use dashmap::DashMap;
use std::sync::Arc;

/// Live requests by identity.
///
/// Shared by a context and every request it created. Insert and remove are
/// idempotent, so the `end` and `destroy` paths may both clean up.
#[derive(Clone, Default)]
pub struct ActiveRegistry {
    entries: Arc<DashMap<u64, Request>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, request: Request) {
        self.entries.insert(request.id(), request);
    }

    pub(crate) fn remove(&self, id: u64) -> Option<Request> {
        self.entries.remove(&id).map(|(_, request)| request)
    }

    pub fn get(&self, id: u64) -> Option<Request> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities in ascending order.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Handles to every live request, ascending by identity.
    pub fn snapshot(&self) -> Vec<Request> {
        let mut requests: Vec<Request> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by_key(Request::id);
        requests
    }
}

impl std::fmt::Debug for ActiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
