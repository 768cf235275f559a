//! In-memory registry of live host and client connections.

use crate::types::ConnectionHandle;
use dashmap::DashMap;

/// Ground truth for "is a socket open right now".
///
/// The transport layer inserts a handle on connect and removes it on
/// disconnect. All mutation is insert/remove by key, so transport
/// callbacks may interleave freely with monitor cycles.
#[derive(Default)]
pub struct ConnectionRegistry {
    hosts: DashMap<String, ConnectionHandle>,
    clients: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_host(&self, handle: ConnectionHandle) {
        self.hosts.insert(handle.id.clone(), handle);
    }

    pub fn remove_host(&self, id: &str) -> Option<ConnectionHandle> {
        self.hosts.remove(id).map(|(_, handle)| handle)
    }

    pub fn insert_client(&self, handle: ConnectionHandle) {
        self.clients.insert(handle.id.clone(), handle);
    }

    pub fn remove_client(&self, id: &str) -> Option<ConnectionHandle> {
        self.clients.remove(id).map(|(_, handle)| handle)
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn contains_host(&self, id: &str) -> bool {
        self.hosts.contains_key(id)
    }

    pub fn host_ids(&self) -> Vec<String> {
        self.hosts.iter().map(|entry| entry.key().clone()).collect()
    }

    /// A live host connection holding the given API key under a different
    /// identifier, if one exists. A stale record whose API key is already
    /// represented this way has been superseded.
    pub fn host_superseding(&self, api_key_id: &str, other_than_id: &str) -> Option<String> {
        self.hosts
            .iter()
            .find(|entry| entry.api_key_id == api_key_id && entry.id != other_than_id)
            .map(|entry| entry.id.clone())
    }
}
