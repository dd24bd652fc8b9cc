//! In-memory client record store. One reader/writer lock guards the whole
//! collection; every operation completes within a single in-memory scan.

use crate::errors::{RegistryError, Result};
use crate::types::{Client, ClientFilter, ClientStats};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct StoreInner {
    /// Keyed by record id. Ids are assigned monotonically, so iteration in
    /// insertion order is also id order; that makes paging deterministic.
    clients: IndexMap<u64, Client>,
    last_id: u64,
}

/// Cloneable handle to the shared record collection.
#[derive(Clone)]
pub struct ClientStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for ClientStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientStore {
    pub fn new() -> Self {
        ClientStore {
            inner: Arc::new(RwLock::new(StoreInner {
                clients: IndexMap::new(),
                last_id: 0,
            })),
        }
    }

    /// Inserts a new record, assigning the next id and both timestamps.
    /// Fails when another record already holds the same clave.
    pub fn create(&self, mut client: Client) -> Result<Client> {
        let mut guard = self.inner.write();

        if guard.clients.values().any(|existing| existing.clave == client.clave) {
            return Err(RegistryError::DuplicateClave(client.clave));
        }

        guard.last_id += 1;
        client.id = guard.last_id;
        let now = Utc::now();
        client.created_at = now;
        client.updated_at = now;

        guard.clients.insert(client.id, client.clone());
        Ok(client)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Client> {
        self.inner
            .read()
            .clients
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    pub fn get_by_clave(&self, clave: &str) -> Result<Client> {
        self.inner
            .read()
            .clients
            .values()
            .find(|client| client.clave == clave)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    pub fn get_all(&self) -> Vec<Client> {
        self.inner.read().clients.values().cloned().collect()
    }

    /// Replaces the record with the given id, keeping its identity: the id,
    /// source row and creation timestamp survive, updated_at is refreshed.
    pub fn update(&self, id: u64, mut client: Client) -> Result<Client> {
        let mut guard = self.inner.write();

        let Some(existing) = guard.clients.get(&id) else {
            return Err(RegistryError::NotFound);
        };
        client.id = existing.id;
        client.row_number = existing.row_number;
        client.created_at = existing.created_at;

        if guard
            .clients
            .values()
            .any(|other| other.id != id && other.clave == client.clave)
        {
            return Err(RegistryError::DuplicateClave(client.clave));
        }

        client.updated_at = Utc::now();
        guard.clients.insert(id, client.clone());
        Ok(client)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let mut guard = self.inner.write();
        // shift_remove keeps the remaining records in insertion order.
        guard
            .clients
            .shift_remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::NotFound)
    }

    /// Drops every record and resets the id counter.
    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.clients.clear();
        guard.last_id = 0;
    }

    pub fn count(&self) -> usize {
        self.inner.read().clients.len()
    }

    /// Applies the filter predicates, then the 1-based page/limit window,
    /// clipped to the result length. An out-of-range page yields an empty
    /// page, never an error.
    pub fn query(&self, filter: &ClientFilter) -> Vec<Client> {
        let guard = self.inner.read();
        let matches: Vec<&Client> = guard
            .clients
            .values()
            .filter(|client| filter.matches(client))
            .collect();

        let window: &[&Client] = if filter.page > 0 && filter.limit > 0 {
            let start = (filter.page - 1) * filter.limit;
            if start >= matches.len() {
                &[]
            } else {
                let end = (start + filter.limit).min(matches.len());
                &matches[start..end]
            }
        } else {
            &matches
        };

        window.iter().map(|client| (*client).clone()).collect()
    }

    /// Inserts a batch wholesale, assigning ids from the counter. Unlike
    /// `create`, no clave uniqueness is enforced; duplicate claves within a
    /// batch are surfaced by validation instead.
    pub fn batch_create(&self, clients: Vec<Client>) -> Vec<Client> {
        let mut guard = self.inner.write();
        let now = Utc::now();

        let mut created = Vec::with_capacity(clients.len());
        for mut client in clients {
            guard.last_id += 1;
            client.id = guard.last_id;
            client.created_at = now;
            client.updated_at = now;
            guard.clients.insert(client.id, client.clone());
            created.push(client);
        }
        created
    }

    /// Rewrites records that still exist, refreshing updated_at. Records with
    /// unknown ids are skipped, not an error.
    pub fn batch_update(&self, clients: Vec<Client>) -> Vec<Client> {
        let mut guard = self.inner.write();
        let now = Utc::now();

        let mut updated = Vec::with_capacity(clients.len());
        for mut client in clients {
            if guard.clients.contains_key(&client.id) {
                client.updated_at = now;
                guard.clients.insert(client.id, client.clone());
                updated.push(client);
            }
        }
        updated
    }

    /// Swaps the whole collection for a freshly ingested batch. Ids are taken
    /// as-is; the counter continues from the highest id ever seen so no id is
    /// reused while the instance lives.
    pub fn replace_all(&self, clients: Vec<Client>) {
        let mut guard = self.inner.write();
        let max_id = clients.iter().map(|client| client.id).max().unwrap_or(0);
        guard.last_id = guard.last_id.max(max_id);
        guard.clients = clients.into_iter().map(|client| (client.id, client)).collect();
    }

    /// Groups records by non-empty clave and reports the keys held by more
    /// than one record, mapped to the holders' ids.
    pub fn duplicate_claves(&self) -> HashMap<String, Vec<u64>> {
        let guard = self.inner.read();

        let mut holders: HashMap<String, Vec<u64>> = HashMap::new();
        for client in guard.clients.values() {
            if !client.clave.is_empty() {
                holders.entry(client.clave.clone()).or_default().push(client.id);
            }
        }

        holders.retain(|_, ids| ids.len() > 1);
        holders
    }

    pub fn stats(&self) -> ClientStats {
        ClientStats::collect(self.inner.read().clients.values())
    }
}
