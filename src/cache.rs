//! In-memory classification cache.
//!
//! One [`ProjectCacheState`] holds everything derived from a single project
//! root: the declaration registry, the alias table and memoized answers.
//! [`ClassificationCache`] discovers the root for each query hint and
//! rebuilds the state whenever that root changes. Re-initialization is
//! always a full rebuild, never a partial update.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::alias::{AliasKind, AliasTable};
use crate::config::AnalyzerConfig;
use crate::registry::DeclarationRegistry;
use crate::resolve::{PathResolver, Resolution};
use crate::scan::{ScanReport, find_project_root, scan_project};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationSource {
    Registry,
    Fallback,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub is_async: bool,
    pub source: ClassificationSource,
    pub return_type: Option<String>,
}

impl Classification {
    fn none() -> Self {
        Self {
            is_async: false,
            source: ClassificationSource::None,
            return_type: None,
        }
    }

    fn fallback() -> Self {
        Self {
            is_async: false,
            source: ClassificationSource::Fallback,
            return_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasLookup {
    pub is_alias: bool,
    pub original_path: Option<String>,
    pub kind: Option<AliasKind>,
    pub is_module: bool,
}

#[derive(Debug, Default)]
pub struct ProjectCacheState {
    root: Option<PathBuf>,
    initialized: bool,
    registry: DeclarationRegistry,
    aliases: AliasTable,
    memo: HashMap<String, Classification>,
    report: ScanReport,
}

impl ProjectCacheState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything and rebuilds from `root`. A missing root leaves the
    /// state empty, so every query falls through to `none` or `fallback`.
    pub fn initialize(&mut self, root: Option<&Path>, config: &AnalyzerConfig) {
        self.invalidate();
        self.root = root.map(Path::to_path_buf);
        if let Some(root) = root {
            self.report = scan_project(root, config, &mut self.registry, &mut self.aliases);
        } else {
            tracing::debug!("no project root; classification limited to fallback");
        }
        self.initialized = true;
    }

    pub fn invalidate(&mut self) {
        self.root = None;
        self.initialized = false;
        self.registry.clear();
        self.aliases.clear();
        self.memo.clear();
        self.report = ScanReport::default();
    }

    pub fn resolve(&self, name: &str, config: &AnalyzerConfig) -> Resolution {
        PathResolver::new(config, &self.aliases).resolve(name)
    }

    pub fn classify(&mut self, name: &str, config: &AnalyzerConfig) -> Classification {
        if let Some(hit) = self.memo.get(name) {
            return hit.clone();
        }

        let resolved = self.resolve(name, config).resolved_path;
        let result = if let Some(hit) = self.memo.get(&resolved) {
            hit.clone()
        } else if !config.is_runtime_path(&resolved) {
            Classification::none()
        } else if let Some(descriptor) = self.registry.get(&resolved) {
            Classification {
                is_async: descriptor.is_async,
                source: ClassificationSource::Registry,
                return_type: descriptor.return_type.clone(),
            }
        } else {
            Classification::fallback()
        };

        if resolved != name {
            self.memo.insert(name.to_string(), result.clone());
        }
        self.memo.insert(resolved, result.clone());
        result
    }

    pub fn alias_lookup(&self, name: &str) -> AliasLookup {
        match self.aliases.get(name) {
            Some(alias) => AliasLookup {
                is_alias: true,
                original_path: Some(alias.original_path.clone()),
                kind: Some(alias.kind),
                is_module: alias.is_module,
            },
            None => AliasLookup {
                is_alias: false,
                original_path: None,
                kind: None,
                is_module: false,
            },
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn registry(&self) -> &DeclarationRegistry {
        &self.registry
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub project_root: Option<String>,
    pub initialized: bool,
    pub methods: usize,
    pub async_methods: usize,
    pub named_types: usize,
    pub aliases: usize,
    pub module_aliases: usize,
    pub memoized: usize,
    pub declaration_files: usize,
    pub source_files: usize,
    pub skipped_files: usize,
    pub fingerprint: String,
}

/// Query surface over a lazily built [`ProjectCacheState`].
///
/// Not shareable across threads without external locking; give each worker
/// its own instance or guard one with a `Mutex`.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    config: AnalyzerConfig,
    state: ProjectCacheState,
    roots: HashMap<PathBuf, Option<PathBuf>>,
}

impl ClassificationCache {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            state: ProjectCacheState::new(),
            roots: HashMap::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn state(&self) -> &ProjectCacheState {
        &self.state
    }

    pub fn classify(&mut self, name: &str, hint: &Path) -> Classification {
        self.prepare(hint);
        self.state.classify(name, &self.config)
    }

    pub fn resolve(&mut self, name: &str, hint: &Path) -> Resolution {
        self.prepare(hint);
        self.state.resolve(name, &self.config)
    }

    pub fn is_alias(&mut self, name: &str, hint: &Path) -> AliasLookup {
        self.prepare(hint);
        self.state.alias_lookup(name)
    }

    pub fn invalidate(&mut self) {
        self.state.invalidate();
        self.roots.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = &self.state;
        CacheStats {
            project_root: state.root().map(|p| p.to_string_lossy().to_string()),
            initialized: state.is_initialized(),
            methods: state.registry.method_count(),
            async_methods: state.registry.async_method_count(),
            named_types: state.registry.named_type_count(),
            aliases: state.aliases.len(),
            module_aliases: state.aliases.module_count(),
            memoized: state.memo_len(),
            declaration_files: state.report.declaration_files,
            source_files: state.report.source_files,
            skipped_files: state.report.skipped_files,
            fingerprint: state.report.fingerprint.clone(),
        }
    }

    /// Builds the state for the root discovered from `hint` unless it is
    /// already current.
    pub fn prepare(&mut self, hint: &Path) {
        let root = self.discover_root(hint);
        if self.state.is_initialized() && self.state.root() == root.as_deref() {
            return;
        }
        tracing::debug!(
            root = ?root,
            previous = ?self.state.root(),
            "initializing project cache state"
        );
        self.state.initialize(root.as_deref(), &self.config);
    }

    fn discover_root(&mut self, hint: &Path) -> Option<PathBuf> {
        let hint = match std::path::absolute(hint) {
            Ok(hint) => hint,
            Err(err) => {
                tracing::debug!(hint = %hint.display(), error = %err, "unusable root hint");
                return None;
            }
        };
        let dir = if hint.is_file() {
            hint.parent().unwrap_or(hint.as_path())
        } else {
            hint.as_path()
        };
        if let Some(root) = self.roots.get(dir) {
            return root.clone();
        }
        let root = find_project_root(dir, &self.config.manifest_marker);
        self.roots.insert(dir.to_path_buf(), root.clone());
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir(prefix: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "{prefix}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project(prefix: &str) -> PathBuf {
        let base = temp_dir(prefix);
        write(&base.join("package.json"), r#"{ "name": "app" }"#);
        write(
            &base.join("types/rt.d.ts"),
            r#"
declare namespace rt {
    function fetch(url: string): Promise<Response>;
    namespace db {
        function query(sql: string): Promise<Row[]>;
        function escape(value: string): string;
    }
}
declare namespace rt.core.path {
    function join(...parts: string[]): string;
}
"#,
        );
        write(
            &base.join("src/app.js"),
            r#"
const db = rt.db;
const utils = { fetch: rt.fetch };
const { query } = rt.db;
"#,
        );
        base
    }

    #[test]
    fn registry_entries_classify_by_return_type() {
        let base = project("async-classifier-cache-registry");
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        let fetch = cache.classify("rt.fetch", &base);
        assert_eq!((fetch.is_async, fetch.source), (true, ClassificationSource::Registry));
        assert_eq!(fetch.return_type.as_deref(), Some("Promise<Response>"));

        let join = cache.classify("rt.core.path.join", &base);
        assert_eq!((join.is_async, join.source), (false, ClassificationSource::Registry));
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn unknown_runtime_path_falls_back_and_foreign_names_are_none() {
        let base = project("async-classifier-cache-fallback");
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        assert_eq!(
            cache.classify("rt.unknownThirdPartyMethod", &base),
            Classification::fallback()
        );
        assert_eq!(cache.classify("console.log", &base), Classification::none());
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn module_alias_classifies_like_canonical_path() {
        let base = project("async-classifier-cache-module");
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        assert_eq!(
            cache.classify("db.query", &base),
            cache.classify("rt.db.query", &base)
        );
        assert_eq!(
            cache.resolve("db.query", &base),
            Resolution {
                resolved_path: "rt.db.query".into(),
                was_alias: true,
                is_module: true,
            }
        );
        let query = cache.classify("query", &base);
        assert_eq!(
            (query.is_async, query.source),
            (true, ClassificationSource::Registry)
        );
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn object_property_alias_is_not_a_module_alias() {
        let base = project("async-classifier-cache-object");
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        assert_eq!(
            cache.classify("utils.fetch", &base),
            cache.classify("rt.fetch", &base)
        );
        let resolution = cache.resolve("utils.fetch", &base);
        assert!(resolution.was_alias);
        assert!(!resolution.is_module);

        let lookup = cache.is_alias("utils.fetch", &base);
        assert_eq!(lookup.kind, Some(AliasKind::AssignObjectProperty));
        assert!(!cache.is_alias("utils", &base).is_alias);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn shorthand_property_classifies_through_local_alias() {
        let base = project("async-classifier-cache-shorthand");
        write(
            &base.join("src/helpers.js"),
            "const fetch = rt.fetch;\nexport const net = { fetch };\n",
        );
        fs::write(base.join("src/broken.js"), b"\xff\xfe").unwrap();
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        assert_eq!(cache.classify("net.fetch", &base), cache.classify("rt.fetch", &base));
        assert!(!cache.resolve("net.fetch", &base).is_module);
        assert_eq!(cache.stats().skipped_files, 1);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn memoizes_under_original_and_resolved_names() {
        let base = project("async-classifier-cache-memo");
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        cache.classify("db.query", &base);
        assert_eq!(cache.stats().memoized, 2);
        cache.classify("rt.db.query", &base);
        assert_eq!(cache.stats().memoized, 2);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn missing_root_short_circuits_to_fallback_or_none() {
        let base = temp_dir("async-classifier-cache-noroot");
        fs::create_dir_all(&base).unwrap();
        let config = AnalyzerConfig {
            manifest_marker: "async-classifier-missing-marker.json".into(),
            ..AnalyzerConfig::default()
        };
        let mut cache = ClassificationCache::new(config);

        assert_eq!(cache.classify("rt.fetch", &base), Classification::fallback());
        assert_eq!(cache.classify("fetch", &base), Classification::none());
        let stats = cache.stats();
        assert!(stats.initialized);
        assert_eq!(stats.project_root, None);
        assert_eq!(stats.methods, 0);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn reinitializing_same_root_is_idempotent() {
        let base = project("async-classifier-cache-idempotent");
        let config = AnalyzerConfig::default();

        let mut state = ProjectCacheState::new();
        state.initialize(Some(&base), &config);
        let first_methods: Vec<_> = state
            .registry()
            .methods()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let first_aliases: Vec<_> = state
            .aliases()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let first_fingerprint = state.report().fingerprint.clone();

        state.initialize(Some(&base), &config);
        let second_methods: Vec<_> = state
            .registry()
            .methods()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let second_aliases: Vec<_> = state
            .aliases()
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        assert_eq!(first_methods, second_methods);
        assert_eq!(first_aliases, second_aliases);
        assert_eq!(first_fingerprint, state.report().fingerprint);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn switching_roots_rebuilds_and_invalidate_clears() {
        let first = project("async-classifier-cache-first");
        let second = temp_dir("async-classifier-cache-second");
        write(&second.join("package.json"), "{}");
        write(
            &second.join("rt.d.ts"),
            "declare namespace rt { function fetch(url: string): string; }",
        );
        let mut cache = ClassificationCache::new(AnalyzerConfig::default());

        assert!(cache.classify("rt.fetch", &first.join("src/app.js")).is_async);
        assert!(!cache.classify("rt.fetch", &second).is_async);
        assert_eq!(cache.stats().project_root, Some(second.to_string_lossy().to_string()));
        assert_eq!(cache.stats().aliases, 0);

        cache.invalidate();
        let stats = cache.stats();
        assert!(!stats.initialized);
        assert_eq!(stats.methods, 0);
        assert_eq!(stats.memoized, 0);
        let _ = fs::remove_dir_all(first);
        let _ = fs::remove_dir_all(second);
    }
}
