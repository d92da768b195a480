//! Reference cache: snapshot of lookup tables for one import session

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::core::backend::{fold_key, Backend, Query, Value, ID_COLUMN};

use super::rules::ReferenceDef;
use super::ImportError;

/// Natural key to id mapping for one lookup table
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    name: String,
    ids: HashMap<String, i64>,
    names: Vec<String>,
}

impl ReferenceSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder used when assembling sets by hand
    pub fn with(mut self, key: &str, id: i64) -> Self {
        self.insert(key, id);
        self
    }

    /// Add an entry; the first id seen for a key wins
    pub fn insert(&mut self, key: &str, id: i64) {
        let folded = fold_key(key);
        if folded.is_empty() || self.ids.contains_key(&folded) {
            return;
        }
        self.ids.insert(folded, id);
        self.names.push(key.trim().to_string());
    }

    /// Case-insensitive lookup by name or code
    pub fn find(&self, key: &str) -> Option<i64> {
        self.ids.get(&fold_key(key)).copied()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display names in load order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Read-only lookup tables, loaded once per session
#[derive(Debug, Clone, Default)]
pub struct ReferenceCache {
    sets: BTreeMap<String, ReferenceSet>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, set: ReferenceSet) -> Self {
        self.sets.insert(set.name.clone(), set);
        self
    }

    /// Load every table, active rows only, ordered by key.
    ///
    /// All-or-nothing: the first table that fails to load aborts the whole
    /// load, so an import never validates against a partial snapshot.
    pub fn load<B: Backend + ?Sized>(backend: &B, defs: &[ReferenceDef]) -> Result<Self, ImportError> {
        let mut cache = Self::new();
        for def in defs {
            let query = Query::table(def.table).active().order_by(def.key_column);
            let records = backend.select(&query).map_err(|source| {
                warn!(set = def.set, error = %source, "reference table failed to load");
                ImportError::ReferenceLoad {
                    set: def.set.to_string(),
                    source,
                }
            })?;

            let mut set = ReferenceSet::new(def.set);
            for record in &records {
                let key = record.get(def.key_column).and_then(Value::as_str);
                let id = record.get(ID_COLUMN).and_then(Value::as_i64);
                if let (Some(key), Some(id)) = (key, id) {
                    set.insert(key, id);
                }
            }
            debug!(set = def.set, entries = set.len(), "reference table loaded");
            cache.sets.insert(def.set.to_string(), set);
        }
        Ok(cache)
    }

    pub fn set(&self, name: &str) -> Option<&ReferenceSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Resolve a natural key inside one set
    pub fn find(&self, set: &str, key: &str) -> Option<i64> {
        self.sets.get(set).and_then(|s| s.find(key))
    }

    /// Names from `needed` that have no loaded set
    pub fn missing<'a>(&self, needed: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        needed
            .into_iter()
            .filter(|n| !self.contains(n))
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::{BackendError, MemoryBackend, Record};

    const LINHAS: ReferenceDef = ReferenceDef {
        set: "linhas",
        table: "linhas",
        key_column: "nome",
        label: "Linha",
    };

    const FLUIDOS: ReferenceDef = ReferenceDef {
        set: "fluidos",
        table: "fluidos",
        key_column: "nome",
        label: "Fluido",
    };

    fn named(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("nome".to_string(), Value::from(name));
        r
    }

    #[test]
    fn test_reference_set_case_insensitive() {
        let set = ReferenceSet::new("linhas")
            .with("Linha A", 1)
            .with("linha a", 2)
            .with("Linha B", 3);
        assert_eq!(set.find("LINHA A"), Some(1));
        assert_eq!(set.find(" linha b "), Some(3));
        assert_eq!(set.find("Linha C"), None);
        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), &["Linha A", "Linha B"]);
    }

    #[test]
    fn test_load_skips_inactive_and_orders() {
        let mut backend = MemoryBackend::new(&[LINHAS.table_def(), FLUIDOS.table_def()]);
        let ids = backend
            .insert("linhas", &[named("Linha B"), named("Linha A"), named("Linha Z")])
            .unwrap();
        backend.deactivate("linhas", ids[2]).unwrap();

        let cache = ReferenceCache::load(&backend, &[LINHAS, FLUIDOS]).unwrap();
        let linhas = cache.set("linhas").unwrap();
        assert_eq!(linhas.names(), &["Linha A", "Linha B"]);
        assert_eq!(cache.find("linhas", "linha z"), None);
        assert!(cache.set("fluidos").unwrap().is_empty());
    }

    #[test]
    fn test_load_fails_when_any_table_fails() {
        // fluidos table does not exist in this backend
        let backend = MemoryBackend::new(&[LINHAS.table_def()]);
        let err = ReferenceCache::load(&backend, &[LINHAS, FLUIDOS]).unwrap_err();
        match err {
            ImportError::ReferenceLoad { set, source } => {
                assert_eq!(set, "fluidos");
                assert!(matches!(source, BackendError::UnknownTable(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_sets() {
        let cache = ReferenceCache::new().with_set(ReferenceSet::new("linhas"));
        assert_eq!(cache.missing(["linhas", "areas"]), vec!["areas".to_string()]);
    }
}
