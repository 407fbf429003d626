//! Alias extraction from JavaScript/TypeScript sources and the alias table.
//!
//! Extraction is purely syntactic and runs per file; recording an alias
//! consults the declaration registry and the aliases recorded so far, so it
//! must happen after every declaration document has been applied.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tree_sitter::{Language, Node, Parser};

use crate::config::AnalyzerConfig;
use crate::registry::DeclarationRegistry;
use crate::resolve::PathResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AliasKind {
    BindSimple,
    BindRenamed,
    BindNested,
    AssignSimple,
    AssignModule,
    AssignExport,
    AssignObjectProperty,
    GlobalTypeof,
    GlobalBinding,
}

impl AliasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasKind::BindSimple => "bind-simple",
            AliasKind::BindRenamed => "bind-renamed",
            AliasKind::BindNested => "bind-nested",
            AliasKind::AssignSimple => "assign-simple",
            AliasKind::AssignModule => "assign-module",
            AliasKind::AssignExport => "assign-export",
            AliasKind::AssignObjectProperty => "assign-object-property",
            AliasKind::GlobalTypeof => "global-typeof",
            AliasKind::GlobalBinding => "global-binding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasDescriptor {
    pub original_path: String,
    pub kind: AliasKind,
    pub is_module: bool,
}

/// An alias production as written; `target` may itself go through aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCandidate {
    pub name: String,
    pub target: String,
    pub kind: AliasKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, AliasDescriptor>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AliasDescriptor> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AliasDescriptor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn module_count(&self) -> usize {
        self.entries.values().filter(|a| a.is_module).count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolves the candidate's target to a canonical path and records it.
    /// Returns false when the target is not a runtime path or the name is
    /// itself rooted at a runtime symbol.
    pub fn record(
        &mut self,
        candidate: AliasCandidate,
        registry: &DeclarationRegistry,
        config: &AnalyzerConfig,
    ) -> bool {
        if config.is_runtime_path(&candidate.name) {
            return false;
        }

        let original_path = PathResolver::new(config, self)
            .resolve(&candidate.target)
            .resolved_path;
        if !config.is_runtime_path(&original_path) {
            tracing::trace!(
                name = %candidate.name,
                target = %candidate.target,
                "alias target is not a runtime path"
            );
            return false;
        }

        let has_descendants = registry.has_descendants(&original_path);
        let (kind, is_module) = match candidate.kind {
            AliasKind::AssignObjectProperty => (AliasKind::AssignObjectProperty, false),
            AliasKind::AssignSimple | AliasKind::AssignModule if has_descendants => {
                (AliasKind::AssignModule, true)
            }
            AliasKind::AssignSimple | AliasKind::AssignModule => (AliasKind::AssignSimple, false),
            other => (other, has_descendants),
        };

        self.entries.insert(
            candidate.name,
            AliasDescriptor {
                original_path,
                kind,
                is_module,
            },
        );
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLanguage {
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceLanguage {
    /// Source artifacts by extension. Declaration documents are not sources.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        if is_declaration_file_name(file_name) {
            return None;
        }
        match path.extension()?.to_str()? {
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::JavaScript),
            "ts" | "mts" | "cts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            _ => None,
        }
    }

    fn grammar(self) -> Language {
        match self {
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

pub fn is_declaration_file_name(file_name: &str) -> bool {
    [".d.ts", ".d.mts", ".d.cts"]
        .iter()
        .any(|suffix| file_name.ends_with(suffix))
}

pub struct AliasExtractor {
    parser: Parser,
    language: Option<SourceLanguage>,
}

impl Default for AliasExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasExtractor {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            language: None,
        }
    }

    /// Every alias production in `source`, in document order.
    pub fn extract(&mut self, source: &str, language: SourceLanguage) -> Result<Vec<AliasCandidate>> {
        if self.language != Some(language) {
            self.parser
                .set_language(&language.grammar())
                .map_err(|e| anyhow::anyhow!("Failed to load {language:?} grammar: {e}"))?;
            self.language = Some(language);
        }

        let tree = self
            .parser
            .parse(source, None)
            .context("tree-sitter produced no syntax tree")?;
        let bytes = source.as_bytes();

        let mut candidates = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "variable_declarator" => visit_declarator(&node, bytes, &mut candidates),
                "assignment_expression" => visit_assignment(&node, bytes, &mut candidates),
                _ => {}
            }

            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        Ok(candidates)
    }
}

fn visit_declarator(node: &Node, source: &[u8], out: &mut Vec<AliasCandidate>) {
    let (Some(name), Some(value)) = (
        node.child_by_field_name("name"),
        node.child_by_field_name("value"),
    ) else {
        return;
    };
    let value = unwrap_expression(value);

    match name.kind() {
        "identifier" => {
            let name = node_text(&name, source);
            let kind = if is_exported_declarator(node) {
                AliasKind::AssignExport
            } else {
                AliasKind::AssignSimple
            };
            bind_value(name, &value, kind, source, out);
        }
        "object_pattern" => {
            if let Some(base) = member_path(&value, source) {
                collect_pattern(&name, &base, false, source, out);
            }
        }
        _ => {}
    }
}

fn visit_assignment(node: &Node, source: &[u8], out: &mut Vec<AliasCandidate>) {
    let (Some(left), Some(right)) = (
        node.child_by_field_name("left"),
        node.child_by_field_name("right"),
    ) else {
        return;
    };
    let right = unwrap_expression(right);

    match left.kind() {
        "identifier" => {
            let name = node_text(&left, source);
            bind_value(name, &right, AliasKind::AssignSimple, source, out);
        }
        "member_expression" => {
            let Some(path) = member_path(&left, source) else {
                return;
            };
            let exported = path
                .strip_prefix("module.exports.")
                .or_else(|| path.strip_prefix("exports."))
                .filter(|rest| !rest.contains('.'));
            if let (Some(name), Some(target)) = (exported, member_path(&right, source)) {
                out.push(AliasCandidate {
                    name: name.to_string(),
                    target,
                    kind: AliasKind::AssignExport,
                });
            }
        }
        "object_pattern" => {
            if let Some(base) = member_path(&right, source) {
                collect_pattern(&left, &base, false, source, out);
            }
        }
        _ => {}
    }
}

fn bind_value(
    name: &str,
    value: &Node,
    kind: AliasKind,
    source: &[u8],
    out: &mut Vec<AliasCandidate>,
) {
    if name.is_empty() {
        return;
    }
    if value.kind() == "object" {
        collect_object_properties(name, value, source, out);
        return;
    }
    if let Some(target) = member_path(value, source) {
        out.push(AliasCandidate {
            name: name.to_string(),
            target,
            kind,
        });
    }
}

fn collect_object_properties(
    object_name: &str,
    object: &Node,
    source: &[u8],
    out: &mut Vec<AliasCandidate>,
) {
    let mut cursor = object.walk();
    for pair in object.named_children(&mut cursor) {
        if pair.kind() == "shorthand_property_identifier" {
            // `{ fetch }` points at whatever `fetch` is bound to.
            let name = node_text(&pair, source);
            if !name.is_empty() {
                out.push(AliasCandidate {
                    name: format!("{object_name}.{name}"),
                    target: name.to_string(),
                    kind: AliasKind::AssignObjectProperty,
                });
            }
            continue;
        }
        if pair.kind() != "pair" {
            continue;
        }
        let (Some(key), Some(value)) = (
            pair.child_by_field_name("key").and_then(|k| property_key(&k, source)),
            pair.child_by_field_name("value"),
        ) else {
            continue;
        };
        if let Some(target) = member_path(&unwrap_expression(value), source) {
            out.push(AliasCandidate {
                name: format!("{object_name}.{key}"),
                target,
                kind: AliasKind::AssignObjectProperty,
            });
        }
    }
}

fn collect_pattern(
    pattern: &Node,
    base: &str,
    nested: bool,
    source: &[u8],
    out: &mut Vec<AliasCandidate>,
) {
    let simple_kind = if nested {
        AliasKind::BindNested
    } else {
        AliasKind::BindSimple
    };

    let mut cursor = pattern.walk();
    for child in pattern.named_children(&mut cursor) {
        match child.kind() {
            "shorthand_property_identifier_pattern" => {
                let name = node_text(&child, source);
                push_binding(name, format!("{base}.{name}"), simple_kind, out);
            }
            "object_assignment_pattern" => {
                let Some(left) = child.child_by_field_name("left") else {
                    continue;
                };
                if left.kind() == "shorthand_property_identifier_pattern" {
                    let name = node_text(&left, source);
                    push_binding(name, format!("{base}.{name}"), simple_kind, out);
                }
            }
            "pair_pattern" => {
                let (Some(key), Some(value)) = (
                    child
                        .child_by_field_name("key")
                        .and_then(|k| property_key(&k, source)),
                    child.child_by_field_name("value"),
                ) else {
                    continue;
                };
                let value = if value.kind() == "assignment_pattern" {
                    match value.child_by_field_name("left") {
                        Some(left) => left,
                        None => continue,
                    }
                } else {
                    value
                };
                let target = format!("{base}.{key}");

                match value.kind() {
                    "identifier" => {
                        let name = node_text(&value, source);
                        let kind = if nested {
                            AliasKind::BindNested
                        } else if name == key {
                            AliasKind::BindSimple
                        } else {
                            AliasKind::BindRenamed
                        };
                        push_binding(name, target, kind, out);
                    }
                    "object_pattern" => collect_pattern(&value, &target, true, source, out),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn push_binding(name: &str, target: String, kind: AliasKind, out: &mut Vec<AliasCandidate>) {
    if name.is_empty() {
        return;
    }
    out.push(AliasCandidate {
        name: name.to_string(),
        target,
        kind,
    });
}

/// Dotted path of an identifier or a chain of plain member accesses.
fn member_path(node: &Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()).filter(|s| !s.is_empty()),
        "member_expression" => {
            let object = node.child_by_field_name("object")?;
            let property = node.child_by_field_name("property")?;
            if property.kind() != "property_identifier" {
                return None;
            }
            let base = member_path(&unwrap_expression(object), source)?;
            Some(format!("{base}.{}", node_text(&property, source)))
        }
        _ => None,
    }
}

/// Looks through parentheses and type-only wrappers around an expression.
fn unwrap_expression(node: Node) -> Node {
    let mut node = node;
    while matches!(
        node.kind(),
        "parenthesized_expression" | "non_null_expression" | "as_expression" | "satisfies_expression"
    ) {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

fn property_key(node: &Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "property_identifier" | "identifier" | "number" => Some(node_text(node, source).to_string()),
        "string" => Some(crate::lexer::strip_quotes(node_text(node, source)).to_string()),
        _ => None,
    }
}

fn is_exported_declarator(node: &Node) -> bool {
    node.parent()
        .and_then(|declaration| declaration.parent())
        .is_some_and(|parent| parent.kind() == "export_statement")
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MethodDescriptor;

    fn extract(source: &str, language: SourceLanguage) -> Vec<AliasCandidate> {
        AliasExtractor::new().extract(source, language).unwrap()
    }

    fn candidate(name: &str, target: &str, kind: AliasKind) -> AliasCandidate {
        AliasCandidate {
            name: name.to_string(),
            target: target.to_string(),
            kind,
        }
    }

    fn registry_with(paths: &[(&str, bool)]) -> DeclarationRegistry {
        let mut registry = DeclarationRegistry::new();
        for (path, is_async) in paths {
            registry.insert_method(path, MethodDescriptor::new(*is_async, None));
        }
        registry
    }

    #[test]
    fn extracts_binding_productions() {
        let source = r#"
const { fetch, log: write } = rt;
const { query = null } = rt.db;
let { db: { exec, close: shut }, ...rest } = rt;
"#;
        assert_eq!(
            extract(source, SourceLanguage::JavaScript),
            vec![
                candidate("fetch", "rt.fetch", AliasKind::BindSimple),
                candidate("write", "rt.log", AliasKind::BindRenamed),
                candidate("query", "rt.db.query", AliasKind::BindSimple),
                candidate("exec", "rt.db.exec", AliasKind::BindNested),
                candidate("shut", "rt.db.close", AliasKind::BindNested),
            ]
        );
    }

    #[test]
    fn extracts_assignment_productions() {
        let source = r#"
const f = rt.fetch;
var db = (rt.db);
export const q = rt.db.query;
later = rt.timer.sleep;
exports.exec = rt.db.exec;
module.exports.close = rt.db.close;
const unrelated = compute();
"#;
        assert_eq!(
            extract(source, SourceLanguage::JavaScript),
            vec![
                candidate("f", "rt.fetch", AliasKind::AssignSimple),
                candidate("db", "rt.db", AliasKind::AssignSimple),
                candidate("q", "rt.db.query", AliasKind::AssignExport),
                candidate("later", "rt.timer.sleep", AliasKind::AssignSimple),
                candidate("exec", "rt.db.exec", AliasKind::AssignExport),
                candidate("close", "rt.db.close", AliasKind::AssignExport),
            ]
        );
    }

    #[test]
    fn extracts_object_property_productions() {
        let source = r#"
const utils = { fetch: rt.fetch, "query": rt.db.query, count: 3, helper() {} };
"#;
        assert_eq!(
            extract(source, SourceLanguage::JavaScript),
            vec![
                candidate("utils.fetch", "rt.fetch", AliasKind::AssignObjectProperty),
                candidate("utils.query", "rt.db.query", AliasKind::AssignObjectProperty),
            ]
        );
    }

    #[test]
    fn shorthand_properties_target_the_local_binding() {
        let source = "const fetch = rt.fetch;\nconst utils = { fetch, q: rt.db.query };\n";
        assert_eq!(
            extract(source, SourceLanguage::JavaScript),
            vec![
                candidate("fetch", "rt.fetch", AliasKind::AssignSimple),
                candidate("utils.fetch", "fetch", AliasKind::AssignObjectProperty),
                candidate("utils.q", "rt.db.query", AliasKind::AssignObjectProperty),
            ]
        );
    }

    #[test]
    fn shorthand_property_resolves_through_existing_alias() {
        let config = AnalyzerConfig::default();
        let registry = registry_with(&[("rt.fetch", true)]);
        let mut table = AliasTable::new();
        let source = "const fetch = rt.fetch;\nconst utils = { fetch, local };\n";
        for c in extract(source, SourceLanguage::JavaScript) {
            table.record(c, &registry, &config);
        }

        let utils_fetch = table.get("utils.fetch").unwrap();
        assert_eq!(utils_fetch.original_path, "rt.fetch");
        assert_eq!(utils_fetch.kind, AliasKind::AssignObjectProperty);
        assert!(!utils_fetch.is_module);
        assert!(table.get("utils.local").is_none());
    }

    #[test]
    fn typescript_sources_see_through_type_assertions() {
        let source = r#"
function setup(): void {
    const db = rt.db as Db;
    const { fetch }: Api = rt;
}
"#;
        assert_eq!(
            extract(source, SourceLanguage::TypeScript),
            vec![
                candidate("db", "rt.db", AliasKind::AssignSimple),
                candidate("fetch", "rt.fetch", AliasKind::BindSimple),
            ]
        );
    }

    #[test]
    fn source_language_excludes_declaration_documents() {
        assert_eq!(
            SourceLanguage::from_path(Path::new("src/app.ts")),
            Some(SourceLanguage::TypeScript)
        );
        assert_eq!(
            SourceLanguage::from_path(Path::new("src/app.mjs")),
            Some(SourceLanguage::JavaScript)
        );
        assert_eq!(SourceLanguage::from_path(Path::new("types/rt.d.ts")), None);
        assert_eq!(SourceLanguage::from_path(Path::new("README.md")), None);
    }

    #[test]
    fn record_marks_module_aliases_from_registry() {
        let config = AnalyzerConfig::default();
        let registry = registry_with(&[("rt.db.query", true), ("rt.fetch", true)]);
        let mut table = AliasTable::new();

        assert!(table.record(candidate("db", "rt.db", AliasKind::AssignSimple), &registry, &config));
        assert!(table.record(candidate("f", "rt.fetch", AliasKind::AssignSimple), &registry, &config));
        assert!(table.record(candidate("x", "rt.db", AliasKind::AssignExport), &registry, &config));

        let db = table.get("db").unwrap();
        assert_eq!(db.kind, AliasKind::AssignModule);
        assert!(db.is_module);
        let f = table.get("f").unwrap();
        assert_eq!(f.kind, AliasKind::AssignSimple);
        assert!(!f.is_module);
        let x = table.get("x").unwrap();
        assert_eq!(x.kind, AliasKind::AssignExport);
        assert!(x.is_module);
    }

    #[test]
    fn object_property_alias_is_never_a_module() {
        let config = AnalyzerConfig::default();
        let registry = registry_with(&[("rt.db.query", true)]);
        let mut table = AliasTable::new();
        table.record(
            candidate("utils.db", "rt.db", AliasKind::AssignObjectProperty),
            &registry,
            &config,
        );
        assert!(!table.get("utils.db").unwrap().is_module);
    }

    #[test]
    fn record_resolves_targets_through_existing_aliases() {
        let config = AnalyzerConfig::default();
        let registry = registry_with(&[("rt.db.query", true)]);
        let mut table = AliasTable::new();
        table.record(candidate("db", "rt.db", AliasKind::AssignSimple), &registry, &config);
        table.record(candidate("q", "db.query", AliasKind::AssignSimple), &registry, &config);
        table.record(candidate("run", "q", AliasKind::AssignSimple), &registry, &config);

        assert_eq!(table.get("q").unwrap().original_path, "rt.db.query");
        assert_eq!(table.get("run").unwrap().original_path, "rt.db.query");
    }

    #[test]
    fn record_rejects_unrooted_targets_and_rooted_names() {
        let config = AnalyzerConfig::default();
        let registry = DeclarationRegistry::new();
        let mut table = AliasTable::new();
        assert!(!table.record(candidate("x", "window.fetch", AliasKind::AssignSimple), &registry, &config));
        assert!(!table.record(candidate("rt", "RtAlt", AliasKind::AssignSimple), &registry, &config));
        assert!(table.is_empty());
    }
}
