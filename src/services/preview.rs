use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use uuid::Uuid;

struct PreviewEntry {
    media_type: String,
    data: Bytes,
}

#[derive(Default)]
struct RegistryState {
    live: HashMap<String, PreviewEntry>,
    allocated: u64,
    released: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewStats {
    pub live: usize,
    pub allocated: u64,
    pub released: u64,
}

/// Process-local table of renderable image previews, addressed by `blob:` URLs.
///
/// Entries only leave the table through [`PreviewHandle::release`] (or the
/// handle being dropped), so `live` is always the number of handles that are
/// still outstanding.
#[derive(Default)]
pub struct PreviewRegistry {
    state: Mutex<RegistryState>,
}

impl PreviewRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn allocate(self: &Arc<Self>, media_type: &str, data: Bytes) -> PreviewHandle {
        let url = format!("blob:parlor/{}", Uuid::new_v4());
        let mut state = self.state();
        state.live.insert(
            url.clone(),
            PreviewEntry {
                media_type: media_type.to_string(),
                data,
            },
        );
        state.allocated += 1;
        tracing::debug!("Allocated preview {} ({} live)", url, state.live.len());

        PreviewHandle {
            url,
            registry: Arc::clone(self),
            released: false,
        }
    }

    fn revoke(&self, url: &str) -> bool {
        let mut state = self.state();
        if state.live.remove(url).is_some() {
            state.released += 1;
            tracing::debug!("Released preview {} ({} live)", url, state.live.len());
            true
        } else {
            false
        }
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.state().live.contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn stats(&self) -> PreviewStats {
        let state = self.state();
        PreviewStats {
            live: state.live.len(),
            allocated: state.allocated,
            released: state.released,
        }
    }

    /// Render a live preview as a `data:` URL. Released previews resolve to `None`.
    pub fn data_url(&self, url: &str) -> Option<String> {
        let state = self.state();
        let entry = state.live.get(url)?;
        Some(format!(
            "data:{};base64,{}",
            entry.media_type,
            STANDARD.encode(&entry.data)
        ))
    }
}

/// Exclusive owner of one preview resource. Releasing twice is a no-op, and
/// dropping an unreleased handle releases it.
pub struct PreviewHandle {
    url: String,
    registry: Arc<PreviewRegistry>,
    released: bool,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.registry.revoke(&self.url);
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}
