//! Project traversal in two ordered passes: declaration documents feed the
//! registry, then source artifacts feed the alias table.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::alias::{AliasExtractor, AliasTable, SourceLanguage, is_declaration_file_name};
use crate::config::AnalyzerConfig;
use crate::declaration::{DeclarationFile, parse_declarations, reference_paths};
use crate::registry::DeclarationRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub declaration_files: usize,
    pub source_files: usize,
    pub skipped_files: usize,
    pub fingerprint: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PackageManifest {
    types: Option<String>,
    typings: Option<String>,
    dependencies: BTreeMap<String, serde_json::Value>,
    dev_dependencies: BTreeMap<String, serde_json::Value>,
    peer_dependencies: BTreeMap<String, serde_json::Value>,
    optional_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    fn type_entry(&self) -> Option<&str> {
        self.types.as_deref().or(self.typings.as_deref())
    }

    fn dependency_names(&self) -> BTreeSet<&str> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.peer_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .map(String::as_str)
            .collect()
    }
}

/// Nearest ancestor of `start` (inclusive) that contains the manifest marker.
/// Relative starts are anchored at the current directory first.
pub fn find_project_root(start: &Path, marker: &str) -> Option<PathBuf> {
    let start = std::path::absolute(start).ok()?;
    let dir = if start.is_file() { start.parent()? } else { start.as_path() };
    dir.ancestors()
        .find(|candidate| candidate.join(marker).is_file())
        .map(Path::to_path_buf)
}

/// Runs both passes over `root` into the given registry and alias table.
pub fn scan_project(
    root: &Path,
    config: &AnalyzerConfig,
    registry: &mut DeclarationRegistry,
    aliases: &mut AliasTable,
) -> ScanReport {
    let start = Instant::now();
    let mut report = ScanReport::default();
    let mut hasher = Sha256::new();

    let declaration_paths = collect_declaration_files(root, config);
    let parsed: Vec<(PathBuf, Result<(String, DeclarationFile)>)> = declaration_paths
        .into_par_iter()
        .map(|path| {
            let parsed = read_artifact(&path).map(|text| {
                (hash_content(&text), parse_declarations(&text, config))
            });
            (path, parsed)
        })
        .collect();

    for (path, parsed) in parsed {
        match parsed {
            Ok((content_hash, file)) => {
                update_fingerprint(&mut hasher, root, &path, &content_hash);
                registry.apply(file);
                report.declaration_files += 1;
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping declaration document");
                report.skipped_files += 1;
            }
        }
    }

    for candidate in registry.finalize(config) {
        aliases.record(candidate, registry, config);
    }

    let source_paths = collect_source_files(root, config);
    let extracted: Vec<_> = source_paths
        .into_par_iter()
        .map_init(AliasExtractor::new, |extractor, (path, language)| {
            let extracted = read_artifact(&path).and_then(|text| {
                let candidates = extractor.extract(&text, language)?;
                Ok((hash_content(&text), candidates))
            });
            (path, extracted)
        })
        .collect();

    for (path, extracted) in extracted {
        match extracted {
            Ok((content_hash, candidates)) => {
                update_fingerprint(&mut hasher, root, &path, &content_hash);
                for candidate in candidates {
                    aliases.record(candidate, registry, config);
                }
                report.source_files += 1;
            }
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "skipping source artifact");
                report.skipped_files += 1;
            }
        }
    }

    report.fingerprint = hex::encode(hasher.finalize());
    tracing::info!(
        root = %root.display(),
        declaration_files = report.declaration_files,
        source_files = report.source_files,
        methods = registry.method_count(),
        aliases = aliases.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "project scanned"
    );
    report
}

/// Declaration documents inside the project tree plus the type entry points
/// of installed dependencies, sorted and deduplicated.
pub fn collect_declaration_files(root: &Path, config: &AnalyzerConfig) -> Vec<PathBuf> {
    let mut files: BTreeSet<PathBuf> = walk_files(root, config)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(OsStr::to_str)
                .is_some_and(is_declaration_file_name)
        })
        .collect();
    files.extend(dependency_declaration_files(root, config));
    files.into_iter().collect()
}

pub fn collect_source_files(root: &Path, config: &AnalyzerConfig) -> Vec<(PathBuf, SourceLanguage)> {
    walk_files(root, config)
        .into_iter()
        .filter_map(|path| SourceLanguage::from_path(&path).map(|lang| (path, lang)))
        .collect()
}

/// Entry documents of every dependency named in the root manifest, followed
/// through `/// <reference path>` directives.
pub fn dependency_declaration_files(root: &Path, config: &AnalyzerConfig) -> Vec<PathBuf> {
    let manifest = match PackageManifest::read(&root.join(&config.manifest_marker)) {
        Ok(manifest) => manifest,
        Err(err) => {
            tracing::debug!(root = %root.display(), error = %err, "no dependency manifest");
            return Vec::new();
        }
    };

    let modules_dir = root.join("node_modules");
    let mut queue: VecDeque<(PathBuf, usize)> = manifest
        .dependency_names()
        .into_iter()
        .filter_map(|name| dependency_entry(&modules_dir.join(name)))
        .map(|entry| (entry, 0))
        .collect();

    let mut seen = BTreeSet::new();
    while let Some((path, depth)) = queue.pop_front() {
        if !seen.insert(path.clone()) || depth >= config.max_depth {
            continue;
        }
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        let Some(dir) = path.parent() else {
            continue;
        };
        for reference in reference_paths(&text) {
            let target = dir.join(reference);
            if target.is_file() {
                queue.push_back((target, depth + 1));
            }
        }
    }
    seen.into_iter().collect()
}

fn dependency_entry(package_dir: &Path) -> Option<PathBuf> {
    let manifest = PackageManifest::read(&package_dir.join("package.json")).ok();
    if let Some(entry) = manifest.as_ref().and_then(PackageManifest::type_entry) {
        let candidate = package_dir.join(entry);
        if candidate.is_file() {
            return Some(candidate);
        }
        if candidate.is_dir() && candidate.join("index.d.ts").is_file() {
            return Some(candidate.join("index.d.ts"));
        }
        let with_suffix = package_dir.join(format!("{entry}.d.ts"));
        if with_suffix.is_file() {
            return Some(with_suffix);
        }
    }

    let conventional = package_dir.join("index.d.ts");
    conventional.is_file().then_some(conventional)
}

/// Every file under `root`, depth-bounded, with skip-listed directories
/// pruned. Unreadable entries are skipped.
fn walk_files(root: &Path, config: &AnalyzerConfig) -> Vec<PathBuf> {
    let filter_config = config.clone();
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .max_depth(Some(config.max_depth))
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            entry.depth() == 0
                || !is_dir
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| filter_config.is_skipped_dir(name))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "skipping unreadable entry"),
        }
    }
    files
}

fn read_artifact(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))
}

fn update_fingerprint(hasher: &mut Sha256, root: &Path, path: &Path, content_hash: &str) {
    let relative = path.strip_prefix(root).unwrap_or(path);
    hasher.update(relative.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(content_hash.as_bytes());
    hasher.update(b"\n");
}

pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
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

    #[test]
    fn find_project_root_walks_up_to_marker() {
        let base = temp_dir("async-classifier-root");
        write(&base.join("package.json"), "{}");
        let file = base.join("src/lib/app.js");
        write(&file, "");

        assert_eq!(find_project_root(&file, "package.json"), Some(base.clone()));
        assert_eq!(
            find_project_root(&base.join("src"), "package.json"),
            Some(base.clone())
        );
        assert_eq!(find_project_root(&file, "no-such-marker.toml"), None);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn walk_prunes_skip_list_and_respects_depth() {
        let base = temp_dir("async-classifier-walk");
        write(&base.join("types/rt.d.ts"), "");
        write(&base.join("node_modules/pkg/index.d.ts"), "");
        write(&base.join("dist/out.js"), "");
        write(&base.join("src/app.js"), "");
        write(&base.join("a/b/c/deep.js"), "");

        let config = AnalyzerConfig {
            max_depth: 3,
            ..AnalyzerConfig::default()
        };
        let declarations = collect_declaration_files(&base, &config);
        assert_eq!(declarations, vec![base.join("types/rt.d.ts")]);

        let sources: Vec<PathBuf> = collect_source_files(&base, &config)
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert_eq!(sources, vec![base.join("src/app.js")]);
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn dependency_entry_points_follow_manifest_and_references() {
        let base = temp_dir("async-classifier-deps");
        write(
            &base.join("package.json"),
            r#"{ "dependencies": { "rt-types": "^1.0.0" }, "devDependencies": { "plain": "*" } }"#,
        );
        write(
            &base.join("node_modules/rt-types/package.json"),
            r#"{ "name": "rt-types", "types": "lib/main.d.ts" }"#,
        );
        write(
            &base.join("node_modules/rt-types/lib/main.d.ts"),
            "/// <reference path=\"./db.d.ts\" />\n",
        );
        write(&base.join("node_modules/rt-types/lib/db.d.ts"), "");
        write(&base.join("node_modules/plain/index.d.ts"), "");
        write(&base.join("node_modules/unlisted/index.d.ts"), "");

        let files = dependency_declaration_files(&base, &AnalyzerConfig::default());
        assert_eq!(
            files,
            vec![
                base.join("node_modules/plain/index.d.ts"),
                base.join("node_modules/rt-types/lib/db.d.ts"),
                base.join("node_modules/rt-types/lib/main.d.ts"),
            ]
        );
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn unreadable_artifacts_are_skipped_and_scan_continues() {
        let base = temp_dir("async-classifier-unreadable");
        write(&base.join("package.json"), "{}");
        write(
            &base.join("types/rt.d.ts"),
            "declare namespace rt { function fetch(url: string): Promise<Response>; }",
        );
        write(&base.join("src/app.js"), "const f = rt.fetch;\n");
        fs::write(base.join("types/broken.d.ts"), b"\xff\xfe").unwrap();
        fs::write(base.join("src/broken.js"), b"\xff\xfe").unwrap();

        let config = AnalyzerConfig::default();
        let mut registry = DeclarationRegistry::new();
        let mut aliases = AliasTable::new();
        let report = scan_project(&base, &config, &mut registry, &mut aliases);

        assert_eq!(report.skipped_files, 2);
        assert_eq!(report.declaration_files, 1);
        assert_eq!(report.source_files, 1);
        assert!(registry.get("rt.fetch").unwrap().is_async);
        assert_eq!(aliases.get("f").unwrap().original_path, "rt.fetch");
        let _ = fs::remove_dir_all(base);
    }

    #[test]
    fn scan_project_runs_declarations_before_sources() {
        let base = temp_dir("async-classifier-scan");
        write(&base.join("package.json"), "{}");
        // Source sorts before the declaration document on purpose.
        write(&base.join("a.js"), "const db = rt.db;\n");
        write(
            &base.join("z.d.ts"),
            "declare namespace rt.db { function query(sql: string): Promise<Row[]>; }",
        );

        let config = AnalyzerConfig::default();
        let mut registry = DeclarationRegistry::new();
        let mut aliases = AliasTable::new();
        let report = scan_project(&base, &config, &mut registry, &mut aliases);

        assert_eq!(report.declaration_files, 1);
        assert_eq!(report.source_files, 1);
        assert_eq!(report.fingerprint.len(), 64);
        assert!(aliases.get("db").unwrap().is_module);
        let _ = fs::remove_dir_all(base);
    }
}
