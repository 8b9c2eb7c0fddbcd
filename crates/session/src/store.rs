// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use parking_lot::Mutex;

use crate::credential::Credential;

/// Holder of the single current credential. No validation happens here.
///
/// Only the session controller writes through this trait.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    /// Replace the current credential as a whole.
    fn set(&self, credential: Credential);
    fn clear(&self);
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: Mutex<Option<Credential>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self { current: Mutex::new(Some(credential)) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Option<Credential> {
        self.current.lock().clone()
    }

    fn set(&self, credential: Credential) {
        *self.current.lock() = Some(credential);
    }

    fn clear(&self) {
        *self.current.lock() = None;
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
