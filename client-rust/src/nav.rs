//! Navigation seam.

use std::sync::{Mutex, PoisonError};

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ROOT_PATH: &str = "/";

/// Moves the client to another page.
pub trait Navigator: Send + Sync {
    fn push(&self, path: &str);
}

/// In-process history stack, used by headless shells and tests.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<String>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Navigator for MemoryHistory {
    fn push(&self, path: &str) {
        tracing::debug!(%path, "navigate");
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_owned());
    }
}
