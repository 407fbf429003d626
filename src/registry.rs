//! Declaration registry: canonical runtime paths to method signatures, plus
//! the named types those signatures are assembled from.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::alias::{AliasCandidate, AliasKind};
use crate::config::AnalyzerConfig;
use crate::declaration::{DeclarationFile, GlobalBinding, TypeBinding};

/// Synthetic scope for wrapper-returning functions bound in the global block.
pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub is_async: bool,
    pub return_type: Option<String>,
}

impl MethodDescriptor {
    pub fn new(is_async: bool, return_type: Option<String>) -> Self {
        Self {
            is_async,
            return_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TypeMember {
    Method(MethodDescriptor),
    /// Member typed by another named type; expanded on lookup.
    Reference(String),
    /// Inline object type literal.
    Object(Vec<(String, TypeMember)>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamedTypeDescriptor {
    pub extends: Vec<String>,
    pub members: Vec<(String, TypeMember)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationRegistry {
    methods: BTreeMap<String, MethodDescriptor>,
    scopes: BTreeSet<String>,
    named_types: BTreeMap<String, NamedTypeDescriptor>,
    /// Simple name of a namespaced type to the first qualified name seen.
    simple_names: BTreeMap<String, String>,
    pending_bindings: Vec<TypeBinding>,
    pending_globals: Vec<GlobalBinding>,
}

impl DeclarationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&MethodDescriptor> {
        self.methods.get(path)
    }

    /// Whether any registered path starts with `path.`.
    pub fn has_descendants(&self, path: &str) -> bool {
        self.scopes.contains(path)
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodDescriptor)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn named_type(&self, name: &str) -> Option<&NamedTypeDescriptor> {
        if let Some(descriptor) = self.named_types.get(name) {
            return Some(descriptor);
        }
        let simple = name.rsplit('.').next().unwrap_or(name);
        self.named_types.get(simple).or_else(|| {
            self.simple_names
                .get(simple)
                .and_then(|qualified| self.named_types.get(qualified))
        })
    }

    pub fn named_type_names(&self) -> impl Iterator<Item = &str> {
        self.named_types.keys().map(String::as_str)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn async_method_count(&self) -> usize {
        self.methods.values().filter(|m| m.is_async).count()
    }

    pub fn named_type_count(&self) -> usize {
        self.named_types.len()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Records a leaf signature. An asynchronous entry is never replaced by a
    /// synchronous one, and a synchronous entry never replaces anything. A
    /// path that already has descendants stays a scope.
    pub fn insert_method(&mut self, path: &str, descriptor: MethodDescriptor) -> bool {
        if self.scopes.contains(path) {
            tracing::trace!(path, "signature ignored: path is a scope");
            return false;
        }

        match self.methods.get(path) {
            Some(existing) if existing.is_async || !descriptor.is_async => {
                tracing::trace!(path, "duplicate signature ignored");
                return false;
            }
            _ => {}
        }

        let mut prefix = path;
        while let Some((parent, _)) = prefix.rsplit_once('.') {
            if self.methods.remove(parent).is_some() {
                tracing::trace!(path = parent, "signature dropped: path became a scope");
            }
            if !self.scopes.insert(parent.to_string()) {
                break;
            }
            prefix = parent;
        }

        self.methods.insert(path.to_string(), descriptor);
        true
    }

    /// Registers a named type. Repeated declarations of the same name merge,
    /// the way interface declarations do.
    pub fn insert_named_type(&mut self, name: &str, descriptor: NamedTypeDescriptor) {
        let entry = self.named_types.entry(name.to_string()).or_default();
        entry.extends.extend(descriptor.extends);
        entry.members.extend(descriptor.members);

        if let Some((_, simple)) = name.rsplit_once('.') {
            self.simple_names
                .entry(simple.to_string())
                .or_insert_with(|| name.to_string());
        }
    }

    pub fn apply(&mut self, file: DeclarationFile) {
        for (name, descriptor) in file.named_types {
            self.insert_named_type(&name, descriptor);
        }
        for (path, descriptor) in file.methods {
            self.insert_method(&path, descriptor);
        }
        self.pending_bindings.extend(file.type_bindings);
        self.pending_globals.extend(file.globals);
    }

    /// Resolves every deferred type binding and turns global bindings into
    /// alias candidates. Must run after all declaration documents of a
    /// project have been applied.
    pub fn finalize(&mut self, config: &AnalyzerConfig) -> Vec<AliasCandidate> {
        let bindings = std::mem::take(&mut self.pending_bindings);
        for binding in &bindings {
            let mut visiting = Vec::new();
            self.expand_named_type(&binding.path, &binding.type_name, &mut visiting);
        }

        let globals = std::mem::take(&mut self.pending_globals);
        let mut candidates = Vec::new();
        for global in globals {
            match global {
                GlobalBinding::TypeOf { name, target } => candidates.push(AliasCandidate {
                    name,
                    target,
                    kind: AliasKind::GlobalTypeof,
                }),
                GlobalBinding::AsyncFunction { name, descriptor } => {
                    self.insert_method(&format!("{GLOBAL_SCOPE}.{name}"), descriptor);
                    if let Some(target) = self.guess_root_path(&name, config) {
                        candidates.push(AliasCandidate {
                            name,
                            target,
                            kind: AliasKind::GlobalBinding,
                        });
                    }
                }
            }
        }
        candidates
    }

    fn guess_root_path(&self, name: &str, config: &AnalyzerConfig) -> Option<String> {
        config
            .runtime_roots
            .iter()
            .map(|root| format!("{root}.{name}"))
            .find(|path| self.methods.contains_key(path) || self.scopes.contains(path))
    }

    /// Registers the member tree of `type_name` under `prefix`. `visiting`
    /// holds the named types on the current expansion chain; a type that
    /// refers back into the chain is left unexpanded.
    pub fn expand_named_type(&mut self, prefix: &str, type_name: &str, visiting: &mut Vec<String>) {
        let Some(descriptor) = self.named_type(type_name).cloned() else {
            tracing::trace!(prefix, type_name, "unknown named type");
            return;
        };
        if visiting.iter().any(|v| v == type_name) {
            tracing::trace!(prefix, type_name, "cyclic named type reference");
            return;
        }

        visiting.push(type_name.to_string());
        for base in &descriptor.extends {
            self.expand_named_type(prefix, base, visiting);
        }
        self.expand_members(prefix, &descriptor.members, visiting);
        visiting.pop();
    }

    fn expand_members(
        &mut self,
        prefix: &str,
        members: &[(String, TypeMember)],
        visiting: &mut Vec<String>,
    ) {
        for (name, member) in members {
            let path = format!("{prefix}.{name}");
            match member {
                TypeMember::Method(descriptor) => {
                    self.insert_method(&path, descriptor.clone());
                }
                TypeMember::Reference(type_name) => {
                    self.expand_named_type(&path, type_name, visiting);
                }
                TypeMember::Object(inner) => self.expand_members(&path, inner, visiting),
            }
        }
    }
}
