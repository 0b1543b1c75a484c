use crate::core::Fingerprint;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// Every name that resolved to one fingerprint during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    pub names: Vec<String>,
}

/// Fingerprints already audited in this run, with the names each was found
/// under. Append-only.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    entries: Mutex<HashMap<Fingerprint, Vec<String>>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `name` under `fingerprint` and reports whether this was the
    /// first sighting. Check and append happen under one lock, so exactly
    /// one caller per fingerprint gets `true`.
    pub fn claim(&self, fingerprint: Fingerprint, name: impl Into<String>) -> bool {
        let mut entries = self.entries.lock();
        let names = entries.entry(fingerprint).or_default();
        names.push(name.into());
        names.len() == 1
    }

    pub fn register(&self, fingerprint: Fingerprint, name: impl Into<String>) {
        self.entries
            .lock()
            .entry(fingerprint)
            .or_default()
            .push(name.into());
    }

    pub fn seen(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.lock().contains_key(fingerprint)
    }

    pub fn names(&self, fingerprint: &Fingerprint) -> Vec<String> {
        self.entries
            .lock()
            .get(fingerprint)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct fingerprints.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Fingerprints found under more than one name, sorted by fingerprint.
    pub fn duplicates(&self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(fingerprint, names)| DuplicateGroup {
                fingerprint: *fingerprint,
                names: names.clone(),
            })
            .collect();
        groups.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        groups
    }
}
