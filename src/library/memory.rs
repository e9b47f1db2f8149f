//! In-memory library store, for ephemeral sessions and tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::library::{LibraryBackend, StoredDocument};

/// Documents held in process memory, in insertion order per user
#[derive(Debug, Default)]
pub struct MemoryLibraryBackend {
    users: Mutex<HashMap<String, Vec<StoredDocument>>>,
    unavailable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    get_all_calls: AtomicUsize,
    set_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryLibraryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed documents for a user
    pub fn with_documents(user: &str, documents: Vec<StoredDocument>) -> Self {
        let backend = Self::new();
        lock(&backend.users).insert(user.to_string(), documents);
        backend
    }

    /// Make every call fail as if the store were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call, to exercise caller timeouts
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Documents currently held for a user
    pub fn documents(&self, user: &str) -> Vec<StoredDocument> {
        lock(&self.users).get(user).cloned().unwrap_or_default()
    }

    pub fn get_all_calls(&self) -> usize {
        self.get_all_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self) -> Result<()> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::PersistenceUnavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl LibraryBackend for MemoryLibraryBackend {
    async fn get_all(&self, user: &str) -> Result<Vec<StoredDocument>> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.documents(user))
    }

    async fn set(&self, user: &str, id: &str, data: &Value) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        let mut users = lock(&self.users);
        let documents = users.entry(user.to_string()).or_default();
        let document = StoredDocument {
            id: id.to_string(),
            data: data.clone(),
        };
        match documents.iter_mut().find(|d| d.id == id) {
            Some(existing) => *existing = document,
            None => documents.push(document),
        }
        Ok(())
    }

    async fn delete(&self, user: &str, id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;

        if let Some(documents) = lock(&self.users).get_mut(user) {
            documents.retain(|d| d.id != id);
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
