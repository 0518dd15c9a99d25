use crate::error::CalmError;
use fnv::FnvHashMap;
use std::fmt;

/// Host-assigned handle for a monitored visual source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A per-source resource that must be torn down explicitly (audio graph
/// nodes, capture surfaces).
pub trait Release {
    fn release(&mut self) -> Result<(), CalmError>;
}

/// Ownership map from source handle to its attached resource.
///
/// Every resource leaving the map is released exactly once: on `detach`, on
/// replacement, on `release_all`, or when the registry is dropped. Release
/// failures are logged and never stop the remaining teardown.
pub struct SourceRegistry<R: Release> {
    entries: FnvHashMap<SourceId, R>,
}

impl<R: Release> Default for SourceRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn release_logged<R: Release>(id: SourceId, mut resource: R) {
    if let Err(e) = resource.release() {
        log::warn!("[registry] release of {} failed: {}", id, e);
    }
}

impl<R: Release> SourceRegistry<R> {
    pub fn new() -> Self {
        Self {
            entries: FnvHashMap::default(),
        }
    }

    pub fn attach(&mut self, id: SourceId, resource: R) {
        if let Some(old) = self.entries.insert(id, resource) {
            log::debug!("[registry] replacing resource for {}", id);
            release_logged(id, old);
        }
    }

    /// Releases and removes the resource for `id`. Returns whether one existed.
    pub fn detach(&mut self, id: SourceId) -> bool {
        match self.entries.remove(&id) {
            Some(r) => {
                release_logged(id, r);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        for (id, r) in self.entries.drain() {
            release_logged(id, r);
        }
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: SourceId) -> Option<&R> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: SourceId) -> Option<&mut R> {
        self.entries.get_mut(&id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SourceId, &mut R)> {
        self.entries.iter_mut().map(|(id, r)| (*id, r))
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R: Release> Drop for SourceRegistry<R> {
    fn drop(&mut self) {
        self.release_all();
    }
}
