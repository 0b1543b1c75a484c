use crate::checkers::{ColourCountChecker, HighHueChecker, VsyncWithoutVblankChecker};
use crate::core::{AuditError, Checker, Result};
use std::sync::Arc;

/// Alias for the first registered checker.
pub const DEFAULT_CHECKER: &str = "default";

pub type CheckerFactory = Arc<dyn Fn() -> Box<dyn Checker> + Send + Sync>;

struct Entry {
    id: String,
    description: &'static str,
    factory: CheckerFactory,
}

/// Name-keyed table of checker factories, in registration order.
///
/// Lookups are case-insensitive; `default` resolves to the first entry.
pub struct CheckerRegistry {
    entries: Vec<Entry>,
}

pub fn normalise_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The bundled checkers. `COLUxxCount` is the default.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(|| Box::new(ColourCountChecker::new()));
        registry.register(|| Box::new(HighHueChecker::new()));
        registry.register(|| Box::new(VsyncWithoutVblankChecker::new()));
        registry
    }

    /// Registers a factory under the id of the checkers it builds. A later
    /// registration with the same id replaces the earlier one in place.
    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn() -> Box<dyn Checker> + Send + Sync + 'static,
    {
        let sample = factory();
        let entry = Entry {
            id: sample.id().to_string(),
            description: sample.description(),
            factory: Arc::new(factory),
        };

        let key = normalise_id(&entry.id);
        match self.entries.iter_mut().find(|e| normalise_id(&e.id) == key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Resolves a user-supplied id to the canonical one.
    pub fn resolve(&self, id: &str) -> Result<&str> {
        let key = normalise_id(id);
        let entry = if key == normalise_id(DEFAULT_CHECKER) {
            self.entries.first()
        } else {
            self.entries.iter().find(|e| normalise_id(&e.id) == key)
        };

        entry.map(|e| e.id.as_str()).ok_or_else(|| AuditError::UnknownChecker {
            id: id.to_string(),
            valid: self.list_ids(),
        })
    }

    pub fn factory(&self, id: &str) -> Result<CheckerFactory> {
        let canonical = self.resolve(id)?;
        self.entries
            .iter()
            .find(|e| e.id == canonical)
            .map(|e| Arc::clone(&e.factory))
            .ok_or_else(|| AuditError::UnknownChecker {
                id: id.to_string(),
                valid: self.list_ids(),
            })
    }

    pub fn create(&self, id: &str) -> Result<Box<dyn Checker>> {
        Ok((self.factory(id)?)())
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// `(id, description)` pairs in registration order.
    pub fn describe(&self) -> Vec<(String, &'static str)> {
        self.entries
            .iter()
            .map(|e| (e.id.clone(), e.description))
            .collect()
    }

    pub fn default_id(&self) -> Option<&str> {
        self.entries.first().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
