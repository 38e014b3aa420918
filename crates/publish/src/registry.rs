//! In-process serialization of publishes by saved deployment name.
//!
//! Two concurrent publishes to the same saved name would race on the
//! same record file; the second one is rejected with a conflict instead.
//! The registry is per-process — callers that want the guarantee across
//! processes must route publishes through one agent process.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex};

use crate::PublishError;

/// Tracks which saved deployment names have a publish in flight.
#[derive(Debug, Default)]
pub struct ActiveDeployments {
    names: Mutex<HashSet<String>>,
}

/// Releases the name when the publish ends, however it ends.
#[derive(Debug)]
pub struct ActiveGuard {
    registry: Arc<ActiveDeployments>,
    name: String,
}

impl ActiveDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry shared by default publishers.
    pub fn shared() -> Arc<Self> {
        static SHARED: LazyLock<Arc<ActiveDeployments>> =
            LazyLock::new(|| Arc::new(ActiveDeployments::new()));
        Arc::clone(&SHARED)
    }

    /// Claims `name` for one publish. Fails fast when a publish of the
    /// same name is already running.
    pub fn begin(self: &Arc<Self>, name: &str) -> Result<ActiveGuard, PublishError> {
        let mut names = self.names.lock().unwrap();
        if !names.insert(name.to_string()) {
            return Err(PublishError::InProgress {
                name: name.to_string(),
            });
        }
        Ok(ActiveGuard {
            registry: Arc::clone(self),
            name: name.to_string(),
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.registry.names.lock().unwrap().remove(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_conflicts_until_released() {
        let registry = Arc::new(ActiveDeployments::new());
        let guard = registry.begin("prod").unwrap();
        assert!(matches!(
            registry.begin("prod").unwrap_err(),
            PublishError::InProgress { .. }
        ));

        // Different names don't conflict.
        let _other = registry.begin("staging").unwrap();

        drop(guard);
        registry.begin("prod").unwrap();
    }
}
