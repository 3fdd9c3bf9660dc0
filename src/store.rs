//! Named snippet storage.
//!
//! A snippet is a saved query plus the names it was declared to depend on.
//! Dependencies are never inferred from the SQL text: a snippet depends on
//! exactly what its author listed with `--with` when saving it. Forward
//! references are allowed, so nothing here checks that dependencies exist
//! or that they are acyclic. That happens in [`crate::resolver`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::compiler;
use crate::error::{SqlCellError, SqlCellResult};
use crate::resolver::{self, ResolvedSnippet};

/// A named, reusable query fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub name: String,
    pub body: String,
    pub dependencies: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

/// Anything the resolver can pull snippets from.
pub trait SnippetSource {
    fn snippet(&self, name: &str) -> Option<&Snippet>;
}

/// Plain, unsynchronized snippet map.
#[derive(Debug, Clone, Default)]
pub struct SnippetMap {
    snippets: HashMap<String, Snippet>,
}

impl SnippetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a snippet. Returns the previous one, if any.
    pub fn insert(
        &mut self,
        name: &str,
        body: &str,
        dependencies: &[String],
    ) -> SqlCellResult<Option<Snippet>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SqlCellError::InvalidSnippetName(
                "name cannot be empty".to_string(),
            ));
        }

        if name.contains('-') {
            tracing::warn!(
                snippet = name,
                "snippet names with hyphens are not valid bare CTE names; prefer underscores"
            );
        }

        // Keep declaration order, drop repeats.
        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }

        let snippet = Snippet {
            name: name.to_string(),
            body: body.to_string(),
            dependencies: deps,
            saved_at: Utc::now(),
        };

        Ok(self.snippets.insert(name.to_string(), snippet))
    }

    pub fn get(&self, name: &str) -> Option<&Snippet> {
        self.snippets.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Snippet> {
        self.snippets.remove(name)
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippets sorted by name.
    pub fn iter_sorted(&self) -> Vec<&Snippet> {
        let mut all: Vec<&Snippet> = self.snippets.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn clear(&mut self) {
        self.snippets.clear();
    }
}

impl SnippetSource for SnippetMap {
    fn snippet(&self, name: &str) -> Option<&Snippet> {
        self.snippets.get(name)
    }
}

/// Session-wide snippet store.
///
/// Registration takes the write lock. A whole resolution runs under a single
/// read lock, so a composed statement never mixes bodies from before and
/// after a concurrent re-save of the same name.
#[derive(Debug, Default)]
pub struct SnippetStore {
    inner: RwLock<SnippetMap>,
}

impl SnippetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, SnippetMap> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SnippetMap> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite a snippet.
    pub fn register(&self, name: &str, body: &str, dependencies: &[String]) -> SqlCellResult<()> {
        let previous = self.write().insert(name, body, dependencies)?;
        if previous.is_some() {
            tracing::info!(snippet = name, "overwrote saved snippet");
        } else {
            tracing::info!(snippet = name, deps = ?dependencies, "saved snippet");
        }
        Ok(())
    }

    /// Insert or overwrite several snippets under one write lock.
    ///
    /// Readers see either none or all of the batch. Stops at the first
    /// invalid name; entries before it stay registered.
    pub fn register_all<'e, I>(&self, entries: I) -> SqlCellResult<()>
    where
        I: IntoIterator<Item = (&'e str, &'e str, &'e [String])>,
    {
        let mut snippets = self.write();
        for (name, body, dependencies) in entries {
            snippets.insert(name, body, dependencies)?;
            tracing::info!(snippet = name, deps = ?dependencies, "saved snippet");
        }
        Ok(())
    }

    /// Get the raw body of a snippet.
    pub fn get(&self, name: &str) -> SqlCellResult<String> {
        self.read()
            .get(name)
            .map(|s| s.body.clone())
            .ok_or_else(|| SqlCellError::unknown_snippet(name, None))
    }

    /// Declared (non-transitive) dependencies of a snippet.
    pub fn dependencies_of(&self, name: &str) -> SqlCellResult<Vec<String>> {
        self.read()
            .get(name)
            .map(|s| s.dependencies.clone())
            .ok_or_else(|| SqlCellError::unknown_snippet(name, None))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().get(name).is_some()
    }

    /// Saved snippet names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.read()
            .iter_sorted()
            .into_iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Copies of all snippets, sorted by name.
    pub fn list(&self) -> Vec<Snippet> {
        self.read().iter_sorted().into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn remove(&self, name: &str) -> SqlCellResult<Snippet> {
        self.write()
            .remove(name)
            .ok_or_else(|| SqlCellError::unknown_snippet(name, None))
    }

    /// Drop every snippet. Used on session reset.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Resolve the dependency closure of `with` against one consistent view.
    pub fn resolve(&self, with: &[String]) -> SqlCellResult<Vec<ResolvedSnippet>> {
        let snippets = self.read();
        resolver::resolve(&*snippets, with)
    }

    /// Resolve `with` and render it in front of `query`.
    pub fn render(&self, query: &str, with: &[String]) -> SqlCellResult<String> {
        let ctes = self.resolve(with)?;
        Ok(compiler::compile(&ctes, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_get() {
        let store = SnippetStore::new();
        store.register("a", "SELECT 1", &[]).unwrap();
        assert_eq!(store.get("a").unwrap(), "SELECT 1");
        assert!(store.dependencies_of("a").unwrap().is_empty());
    }

    #[test]
    fn test_get_unknown() {
        let store = SnippetStore::new();
        let err = store.get("ghost").unwrap_err();
        assert!(matches!(err, SqlCellError::UnknownSnippet { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn test_overwrite_replaces_body_and_deps() {
        let store = SnippetStore::new();
        store.register("b", "SELECT * FROM a", &deps(&["a"])).unwrap();
        store.register("b", "SELECT 2", &[]).unwrap();
        assert_eq!(store.get("b").unwrap(), "SELECT 2");
        assert!(store.dependencies_of("b").unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_forward_reference_allowed() {
        let store = SnippetStore::new();
        store.register("b", "SELECT * FROM a", &deps(&["a"])).unwrap();
        assert!(!store.contains("a"));
        assert_eq!(store.dependencies_of("b").unwrap(), deps(&["a"]));
    }

    #[test]
    fn test_dependencies_keep_order_and_drop_repeats() {
        let store = SnippetStore::new();
        store
            .register("c", "SELECT 1", &deps(&["b", "a", "b"]))
            .unwrap();
        assert_eq!(store.dependencies_of("c").unwrap(), deps(&["b", "a"]));
    }

    #[test]
    fn test_empty_name_rejected() {
        let store = SnippetStore::new();
        assert!(matches!(
            store.register("  ", "SELECT 1", &[]),
            Err(SqlCellError::InvalidSnippetName(_))
        ));
    }

    #[test]
    fn test_register_all() {
        let store = SnippetStore::new();
        let a_deps = deps(&["a"]);
        store
            .register_all([("a", "SELECT 1", &[][..]), ("b", "SELECT * FROM a", &a_deps[..])])
            .unwrap();
        assert_eq!(store.names(), deps(&["a", "b"]));
        assert_eq!(store.dependencies_of("b").unwrap(), a_deps);
    }

    #[test]
    fn test_register_all_stops_at_invalid_name() {
        let store = SnippetStore::new();
        let err = store
            .register_all([("a", "SELECT 1", &[][..]), ("", "SELECT 2", &[][..])])
            .unwrap_err();
        assert!(matches!(err, SqlCellError::InvalidSnippetName(_)));
        assert!(store.contains("a"));
    }

    #[test]
    fn test_names_sorted_and_clear() {
        let store = SnippetStore::new();
        store.register("zeta", "SELECT 1", &[]).unwrap();
        store.register("alpha", "SELECT 2", &[]).unwrap();
        assert_eq!(store.names(), deps(&["alpha", "zeta"]));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_render_through_store() {
        let store = SnippetStore::new();
        store.register("a", "SELECT 1", &[]).unwrap();
        store.register("b", "SELECT * FROM a", &deps(&["a"])).unwrap();
        assert_eq!(
            store.render("SELECT * FROM b", &deps(&["b"])).unwrap(),
            "WITH a AS (SELECT 1), b AS (SELECT * FROM a) SELECT * FROM b"
        );
    }
}
