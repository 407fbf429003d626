//! Declaration document parser.
//!
//! A small recursive-descent scanner over the subset of `.d.ts` syntax that
//! describes a runtime API: scope blocks, callable signatures, named types
//! and the global block. Anything it does not recognize is skipped up to the
//! next statement boundary, so malformed input degrades to fewer entries
//! rather than an error.

use crate::config::AnalyzerConfig;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::registry::{MethodDescriptor, NamedTypeDescriptor, TypeMember};

/// A canonical path whose members come from a named type that may not have
/// been seen yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeBinding {
    pub path: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlobalBinding {
    /// `function name(..): Wrapper<T>` bound in the global block.
    AsyncFunction {
        name: String,
        descriptor: MethodDescriptor,
    },
    /// `const name: typeof <path>` bound in the global block.
    TypeOf { name: String, target: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationFile {
    pub methods: Vec<(String, MethodDescriptor)>,
    pub named_types: Vec<(String, NamedTypeDescriptor)>,
    pub type_bindings: Vec<TypeBinding>,
    pub globals: Vec<GlobalBinding>,
}

impl DeclarationFile {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
            && self.named_types.is_empty()
            && self.type_bindings.is_empty()
            && self.globals.is_empty()
    }
}

pub fn parse_declarations(src: &str, config: &AnalyzerConfig) -> DeclarationFile {
    parse_declarations_in_scope(src, "", config)
}

/// Parses `src` as if it were the body of the scope named `prefix`.
pub fn parse_declarations_in_scope(
    src: &str,
    prefix: &str,
    config: &AnalyzerConfig,
) -> DeclarationFile {
    let scope = if prefix.is_empty() {
        Scope::TopLevel
    } else {
        Scope::Namespace(prefix.to_string())
    };

    let mut parser = DeclParser::new(src, config);
    loop {
        parser.parse_items(&scope);
        // Stray closing brace at the outermost level.
        if parser.bump().is_none() {
            break;
        }
    }
    parser.out
}

/// Targets of `/// <reference path="..." />` directives.
pub fn reference_paths(src: &str) -> Vec<String> {
    src.lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with("///") && line.contains("<reference"))
        .filter_map(|line| {
            let rest = &line[line.find("path=")? + "path=".len()..];
            let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
            let value = &rest[1..];
            let end = value.find(quote)?;
            Some(value[..end].to_string())
        })
        .collect()
}

const STATEMENT_KEYWORDS: &[&str] = &[
    "declare",
    "export",
    "namespace",
    "module",
    "interface",
    "type",
    "function",
    "const",
    "let",
    "var",
    "class",
    "import",
    "enum",
    "global",
    "abstract",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "readonly",
    "static",
    "public",
    "private",
    "protected",
    "abstract",
    "declare",
    "override",
    "async",
    "accessor",
];

const NON_EXPANDABLE_TYPES: &[&str] = &[
    "string",
    "number",
    "boolean",
    "bigint",
    "symbol",
    "any",
    "unknown",
    "never",
    "void",
    "undefined",
    "null",
    "object",
    "this",
    "true",
    "false",
    "Function",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Symbol",
    "Array",
    "ReadonlyArray",
    "Record",
    "Partial",
    "Readonly",
    "Pick",
    "Omit",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "Date",
    "Error",
    "RegExp",
    "Uint8Array",
    "ArrayBuffer",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    TopLevel,
    Global,
    Namespace(String),
}

impl Scope {
    fn child(&self, name: &str) -> String {
        match self {
            Scope::Namespace(prefix) if !prefix.is_empty() => format!("{prefix}.{name}"),
            _ => name.to_string(),
        }
    }

    fn binds_globals(&self, exported: bool) -> bool {
        match self {
            Scope::Global => true,
            Scope::TopLevel => !exported,
            Scope::Namespace(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeExpr {
    Reference { name: String, has_args: bool },
    Function(MethodDescriptor),
    Object(Vec<(String, TypeMember)>),
    TypeOf(String),
    Other,
}

struct ParsedMember {
    name: String,
    member: TypeMember,
    is_static: bool,
}

struct DeclParser<'a> {
    src: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    config: &'a AnalyzerConfig,
    out: DeclarationFile,
}

impl<'a> DeclParser<'a> {
    fn new(src: &'a str, config: &'a AnalyzerConfig) -> Self {
        Self {
            src,
            tokens: tokenize(src),
            pos: 0,
            config,
            out: DeclarationFile::default(),
        }
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'a>> {
        self.tokens.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn at_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn at_ident(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(word))
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, word: &str) -> bool {
        if self.at_ident(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Option<&'a str> {
        let tok = self.peek().filter(|t| t.kind == TokenKind::Ident)?;
        self.pos += 1;
        Some(tok.text)
    }

    // ---- statements ----

    fn parse_items(&mut self, scope: &Scope) {
        while let Some(tok) = self.peek() {
            if tok.is_punct("}") {
                return;
            }
            let before = self.pos;
            self.parse_item(scope);
            if self.pos == before {
                self.pos += 1;
            }
        }
    }

    fn parse_block(&mut self, scope: &Scope) {
        if !self.eat_punct("{") {
            self.skip_statement();
            return;
        }
        self.parse_items(scope);
        self.eat_punct("}");
    }

    fn parse_item(&mut self, scope: &Scope) {
        let mut exported = false;
        loop {
            if self.eat_ident("declare") || self.eat_ident("abstract") {
                continue;
            }
            if self.eat_ident("export") {
                exported = true;
                continue;
            }
            if exported && self.eat_ident("default") {
                continue;
            }
            break;
        }

        let Some(tok) = self.peek().filter(|t| t.kind == TokenKind::Ident) else {
            self.skip_statement();
            return;
        };
        let next = self.peek_at(1);

        match tok.text {
            "namespace" | "module" if next.is_some_and(|n| n.kind != TokenKind::Punct) => {
                self.parse_namespace(scope)
            }
            "global" if next.is_some_and(|n| n.is_punct("{")) => {
                self.pos += 1;
                self.parse_block(&Scope::Global);
            }
            "function" => self.parse_function(scope, exported),
            "const" | "let" | "var" => self.parse_variables(scope, exported),
            "interface" => self.parse_interface(scope),
            "type" if next.is_some_and(|n| n.kind == TokenKind::Ident) => {
                self.parse_type_alias(scope)
            }
            "class" => self.parse_class(scope),
            _ => self.skip_statement(),
        }
    }

    fn parse_namespace(&mut self, scope: &Scope) {
        self.pos += 1;
        let Some(name_tok) = self.bump() else {
            return;
        };

        let inner = if name_tok.kind == TokenKind::Str {
            // Ambient module: members are module exports, not rooted paths.
            Scope::Namespace(String::new())
        } else {
            let mut name = name_tok.text.to_string();
            while self.at_punct(".") && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident)
            {
                self.pos += 1;
                if let Some(segment) = self.expect_ident() {
                    name.push('.');
                    name.push_str(segment);
                }
            }
            Scope::Namespace(scope.child(&name))
        };

        if self.at_punct("{") {
            self.parse_block(&inner);
        } else {
            self.skip_statement();
        }
    }

    fn parse_function(&mut self, scope: &Scope, exported: bool) {
        self.pos += 1;
        let Some(name) = self.expect_ident() else {
            self.skip_statement();
            return;
        };
        self.skip_generics();
        if !self.at_punct("(") {
            self.skip_statement();
            return;
        }
        self.skip_balanced();
        let descriptor = self.parse_return_annotation();
        if self.at_punct("{") {
            self.skip_balanced();
        } else {
            self.eat_punct(";");
        }

        match scope {
            Scope::Namespace(_) => self.push_method(scope.child(name), descriptor),
            _ if scope.binds_globals(exported) && descriptor.is_async => {
                self.out.globals.push(GlobalBinding::AsyncFunction {
                    name: name.to_string(),
                    descriptor,
                });
            }
            _ => {}
        }
    }

    fn parse_variables(&mut self, scope: &Scope, exported: bool) {
        self.pos += 1;
        if self.at_ident("enum") {
            self.skip_statement();
            return;
        }

        loop {
            let Some(name) = self.expect_ident() else {
                self.skip_statement();
                return;
            };
            self.eat_punct("!");
            self.eat_punct("?");
            if self.eat_punct(":") {
                let (ty, _) = self.parse_type_with_text();
                self.record_binding(scope, exported, name, ty);
            }
            if self.at_punct("=") {
                self.skip_to_separator();
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.eat_punct(";");
    }

    fn record_binding(&mut self, scope: &Scope, exported: bool, name: &str, ty: TypeExpr) {
        match scope {
            Scope::Namespace(_) => self.bind_typed_path(scope.child(name), ty),
            _ if scope.binds_globals(exported) => {
                if self.config.is_runtime_root(name) {
                    self.bind_typed_path(name.to_string(), ty);
                    return;
                }
                match ty {
                    TypeExpr::Function(descriptor) if descriptor.is_async => {
                        self.out.globals.push(GlobalBinding::AsyncFunction {
                            name: name.to_string(),
                            descriptor,
                        });
                    }
                    TypeExpr::TypeOf(target) => {
                        self.out.globals.push(GlobalBinding::TypeOf {
                            name: name.to_string(),
                            target,
                        });
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn bind_typed_path(&mut self, path: String, ty: TypeExpr) {
        if !self.config.is_runtime_path(&path) {
            return;
        }
        match ty {
            TypeExpr::Function(descriptor) => self.push_method(path, descriptor),
            TypeExpr::Reference { name, .. } if self.is_expandable(&name) => {
                self.out.type_bindings.push(TypeBinding {
                    path,
                    type_name: name,
                });
            }
            TypeExpr::Object(members) => self.push_members(&path, members),
            _ => {}
        }
    }

    fn push_members(&mut self, prefix: &str, members: Vec<(String, TypeMember)>) {
        for (name, member) in members {
            self.push_member(format!("{prefix}.{name}"), member);
        }
    }

    fn push_member(&mut self, path: String, member: TypeMember) {
        match member {
            TypeMember::Method(descriptor) => self.push_method(path, descriptor),
            TypeMember::Reference(type_name) => {
                if self.config.is_runtime_path(&path) {
                    self.out.type_bindings.push(TypeBinding { path, type_name });
                }
            }
            TypeMember::Object(inner) => self.push_members(&path, inner),
        }
    }

    fn push_method(&mut self, path: String, descriptor: MethodDescriptor) {
        if path.contains('.') && self.config.is_runtime_path(&path) {
            self.out.methods.push((path, descriptor));
        }
    }

    fn parse_interface(&mut self, scope: &Scope) {
        self.pos += 1;
        let Some(name) = self.expect_ident() else {
            self.skip_statement();
            return;
        };
        self.skip_generics();

        let mut extends = Vec::new();
        if self.eat_ident("extends") {
            loop {
                if let (TypeExpr::Reference { name, .. }, _) = self.parse_type_with_text() {
                    extends.push(name);
                }
                if !self.eat_punct(",") {
                    break;
                }
            }
        }

        if !self.at_punct("{") {
            self.skip_statement();
            return;
        }
        let members = self
            .parse_object_members()
            .into_iter()
            .map(|m| (m.name, m.member))
            .collect();
        self.register_named_type(scope, name, NamedTypeDescriptor { extends, members });
    }

    fn parse_type_alias(&mut self, scope: &Scope) {
        self.pos += 1;
        let Some(name) = self.expect_ident() else {
            self.skip_statement();
            return;
        };
        self.skip_generics();
        if !self.eat_punct("=") {
            self.skip_statement();
            return;
        }

        let (ty, _) = self.parse_type_with_text();
        self.eat_punct(";");
        match ty {
            TypeExpr::Object(members) => self.register_named_type(
                scope,
                name,
                NamedTypeDescriptor {
                    extends: Vec::new(),
                    members,
                },
            ),
            TypeExpr::Reference { name: target, .. } if self.is_expandable(&target) => self
                .register_named_type(
                    scope,
                    name,
                    NamedTypeDescriptor {
                        extends: vec![target],
                        members: Vec::new(),
                    },
                ),
            _ => {}
        }
    }

    fn parse_class(&mut self, scope: &Scope) {
        self.pos += 1;
        let Some(name) = self.expect_ident() else {
            self.skip_statement();
            return;
        };
        self.skip_generics();

        let mut extends = Vec::new();
        if self.eat_ident("extends")
            && let (TypeExpr::Reference { name, .. }, _) = self.parse_type_with_text()
        {
            extends.push(name);
        }
        if self.eat_ident("implements") {
            loop {
                self.parse_type_with_text();
                if !self.eat_punct(",") {
                    break;
                }
            }
        }

        if !self.at_punct("{") {
            self.skip_statement();
            return;
        }

        let class_path = scope.child(name);
        let mut instance = Vec::new();
        for member in self.parse_object_members() {
            if member.is_static {
                self.push_member(format!("{class_path}.{}", member.name), member.member);
            } else {
                instance.push((member.name, member.member));
            }
        }
        self.register_named_type(
            scope,
            name,
            NamedTypeDescriptor {
                extends,
                members: instance,
            },
        );
    }

    fn register_named_type(&mut self, scope: &Scope, name: &str, descriptor: NamedTypeDescriptor) {
        self.out.named_types.push((scope.child(name), descriptor));
    }

    // ---- members ----

    fn parse_object_members(&mut self) -> Vec<ParsedMember> {
        let mut members = Vec::new();
        if !self.eat_punct("{") {
            return members;
        }

        while let Some(tok) = self.peek() {
            if tok.is_punct("}") {
                self.pos += 1;
                break;
            }
            let before = self.pos;
            if let Some(member) = self.parse_member() {
                members.push(member);
            }
            while self.eat_punct(";") || self.eat_punct(",") {}
            if self.pos == before {
                self.pos += 1;
            }
        }
        members
    }

    fn parse_member(&mut self) -> Option<ParsedMember> {
        let mut is_static = false;
        while let Some(tok) = self.peek() {
            let modifies_next = self
                .peek_at(1)
                .is_some_and(|n| n.is_member_name() || n.is_punct("[") || n.is_punct("#"));
            if tok.kind == TokenKind::Ident && MEMBER_MODIFIERS.contains(&tok.text) && modifies_next
            {
                is_static |= tok.text == "static";
                self.pos += 1;
            } else {
                break;
            }
        }

        let tok = self.peek()?;

        let is_accessor = (tok.is_ident("get") || tok.is_ident("set"))
            && self.peek_at(1).is_some_and(|n| n.is_member_name())
            && self.peek_at(2).is_some_and(|n| n.is_punct("("));
        if is_accessor {
            self.pos += 1;
            let name = self.bump()?.name_text().to_string();
            self.skip_balanced();
            let ty = if self.eat_punct(":") {
                Some(self.parse_type_with_text().0)
            } else {
                None
            };
            self.skip_body();
            if tok.is_ident("set") {
                return None;
            }
            return self.member_from_property(name, ty?, is_static);
        }

        let is_signature = tok.is_punct("[")
            || tok.is_punct("(")
            || tok.is_punct("<")
            || (tok.is_ident("new")
                && self
                    .peek_at(1)
                    .is_some_and(|n| n.is_punct("(") || n.is_punct("<")));
        if is_signature || !tok.is_member_name() {
            self.skip_to_separator();
            return None;
        }

        self.pos += 1;
        let name = tok.name_text().to_string();
        self.eat_punct("?");
        self.eat_punct("!");

        if self.at_punct("<") || self.at_punct("(") {
            self.skip_generics();
            if !self.at_punct("(") {
                self.skip_to_separator();
                return None;
            }
            self.skip_balanced();
            let descriptor = self.parse_return_annotation();
            self.skip_body();
            if name == "constructor" {
                return None;
            }
            return Some(ParsedMember {
                name,
                member: TypeMember::Method(descriptor),
                is_static,
            });
        }

        if self.eat_punct(":") {
            let (ty, _) = self.parse_type_with_text();
            if self.at_punct("=") {
                self.skip_to_separator();
            }
            return self.member_from_property(name, ty, is_static);
        }

        self.skip_to_separator();
        None
    }

    fn member_from_property(
        &self,
        name: String,
        ty: TypeExpr,
        is_static: bool,
    ) -> Option<ParsedMember> {
        let member = match ty {
            TypeExpr::Function(descriptor) => TypeMember::Method(descriptor),
            TypeExpr::Reference { name: target, .. } if self.is_expandable(&target) => {
                TypeMember::Reference(target)
            }
            TypeExpr::Object(members) => TypeMember::Object(members),
            _ => return None,
        };
        Some(ParsedMember {
            name,
            member,
            is_static,
        })
    }

    fn is_expandable(&self, type_name: &str) -> bool {
        !NON_EXPANDABLE_TYPES.contains(&type_name) && !self.config.is_async_wrapper(type_name)
    }

    // ---- types ----

    fn parse_return_annotation(&mut self) -> MethodDescriptor {
        if !self.eat_punct(":") {
            return MethodDescriptor::new(false, None);
        }
        let (ty, text) = self.parse_type_with_text();
        self.describe_return(&ty, text)
    }

    fn describe_return(&self, ty: &TypeExpr, text: String) -> MethodDescriptor {
        let is_async = matches!(
            ty,
            TypeExpr::Reference { name, has_args: true } if self.config.is_async_wrapper(name)
        );
        let return_type = (!text.is_empty()).then_some(text);
        MethodDescriptor::new(is_async, return_type)
    }

    fn parse_type_with_text(&mut self) -> (TypeExpr, String) {
        let start = self.pos;
        let ty = self.parse_type();
        let text = match (self.tokens.get(start), self.pos.checked_sub(1)) {
            (Some(first), Some(last)) if self.pos > start => {
                normalize_whitespace(&self.src[first.start..self.tokens[last].end])
            }
            _ => String::new(),
        };
        (ty, text)
    }

    fn parse_type(&mut self) -> TypeExpr {
        let _ = self.eat_punct("|") || self.eat_punct("&");
        let first = self.parse_postfix_type();

        let mut combined = false;
        while self.eat_punct("|") || self.eat_punct("&") {
            self.parse_postfix_type();
            combined = true;
        }

        if self.eat_ident("extends") {
            self.parse_type();
            if self.eat_punct("?") {
                self.parse_type();
                if self.eat_punct(":") {
                    self.parse_type();
                }
            }
            return TypeExpr::Other;
        }
        if self.eat_ident("is") {
            self.parse_type();
            return TypeExpr::Other;
        }

        if combined { TypeExpr::Other } else { first }
    }

    fn parse_postfix_type(&mut self) -> TypeExpr {
        let mut ty = self.parse_primary_type();
        while self.peek().is_some_and(|t| t.is_punct("[") && !t.line_start) {
            self.skip_balanced();
            ty = TypeExpr::Other;
        }
        ty
    }

    fn parse_primary_type(&mut self) -> TypeExpr {
        let Some(tok) = self.peek() else {
            return TypeExpr::Other;
        };

        match tok.kind {
            TokenKind::Str | TokenKind::Number => {
                self.pos += 1;
                TypeExpr::Other
            }
            TokenKind::Punct => match tok.text {
                "{" => TypeExpr::Object(
                    self.parse_object_members()
                        .into_iter()
                        .map(|m| (m.name, m.member))
                        .collect(),
                ),
                "(" if self.paren_starts_function() => {
                    self.skip_balanced();
                    self.parse_arrow_return()
                }
                "(" => {
                    self.pos += 1;
                    let inner = self.parse_type();
                    self.eat_punct(")");
                    inner
                }
                "<" => {
                    self.skip_generics();
                    if self.at_punct("(") {
                        self.skip_balanced();
                        self.parse_arrow_return()
                    } else {
                        TypeExpr::Other
                    }
                }
                "[" => {
                    self.skip_balanced();
                    TypeExpr::Other
                }
                "-" => {
                    self.pos += 1;
                    if self.peek().is_some_and(|t| t.kind == TokenKind::Number) {
                        self.pos += 1;
                    }
                    TypeExpr::Other
                }
                _ => TypeExpr::Other,
            },
            TokenKind::Ident => match tok.text {
                "typeof" => {
                    self.pos += 1;
                    let path = self.parse_qualified_name();
                    self.skip_generics();
                    if path.is_empty() {
                        TypeExpr::Other
                    } else {
                        TypeExpr::TypeOf(path)
                    }
                }
                "keyof" | "readonly" | "unique" | "infer" => {
                    self.pos += 1;
                    self.parse_postfix_type();
                    TypeExpr::Other
                }
                "new" | "abstract" => {
                    self.pos += 1;
                    self.eat_ident("new");
                    self.skip_generics();
                    if self.at_punct("(") {
                        self.skip_balanced();
                        if self.eat_punct("=>") {
                            self.parse_type();
                        }
                    }
                    TypeExpr::Other
                }
                "asserts" if self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident) => {
                    self.pos += 2;
                    if self.eat_ident("is") {
                        self.parse_type();
                    }
                    TypeExpr::Other
                }
                _ => {
                    let name = self.parse_qualified_name();
                    let has_args = self.at_punct("<");
                    self.skip_generics();
                    TypeExpr::Reference { name, has_args }
                }
            },
        }
    }

    fn parse_arrow_return(&mut self) -> TypeExpr {
        if !self.eat_punct("=>") {
            return TypeExpr::Other;
        }
        let (ty, text) = self.parse_type_with_text();
        TypeExpr::Function(self.describe_return(&ty, text))
    }

    fn parse_qualified_name(&mut self) -> String {
        let mut name = String::new();
        let Some(first) = self.expect_ident() else {
            return name;
        };
        name.push_str(first);
        while self.at_punct(".") && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident) {
            self.pos += 1;
            if let Some(segment) = self.expect_ident() {
                name.push('.');
                name.push_str(segment);
            }
        }
        name
    }

    fn paren_starts_function(&self) -> bool {
        let mut depth = 0usize;
        for (offset, tok) in self.tokens[self.pos..].iter().enumerate() {
            if tok.kind != TokenKind::Punct {
                continue;
            }
            match tok.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self
                            .tokens
                            .get(self.pos + offset + 1)
                            .is_some_and(|t| t.is_punct("=>"));
                    }
                }
                _ => {}
            }
        }
        false
    }

    // ---- skipping ----

    fn skip_generics(&mut self) {
        if !self.at_punct("<") {
            return;
        }
        let mut depth = 0usize;
        while let Some(tok) = self.bump() {
            if tok.is_punct("<") {
                depth += 1;
            } else if tok.is_punct(">") {
                depth -= 1;
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn skip_balanced(&mut self) {
        if !(self.at_punct("(") || self.at_punct("[") || self.at_punct("{")) {
            return;
        }
        let mut depth = 0usize;
        while let Some(tok) = self.bump() {
            if tok.kind != TokenKind::Punct {
                continue;
            }
            match tok.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_body(&mut self) {
        if self.at_punct("{") {
            self.skip_balanced();
        }
    }

    fn skip_statement(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0
                && self.pos > start
                && tok.line_start
                && tok.kind == TokenKind::Ident
                && STATEMENT_KEYWORDS.contains(&tok.text)
            {
                return;
            }
            if tok.kind == TokenKind::Punct {
                match tok.text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" => depth = depth.saturating_sub(1),
                    "}" if depth == 0 => return,
                    "}" => {
                        depth -= 1;
                        if depth == 0 {
                            self.pos += 1;
                            self.eat_punct(";");
                            return;
                        }
                    }
                    ";" if depth == 0 => {
                        self.pos += 1;
                        return;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }

    /// Skips to the next `;`, `,` or `}` at the current nesting level, or to
    /// the start of the next line.
    fn skip_to_separator(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0 {
                if tok.is_punct(";") || tok.is_punct(",") || tok.is_punct("}") {
                    return;
                }
                if self.pos > start && tok.line_start {
                    return;
                }
            }
            if tok.kind == TokenKind::Punct {
                match tok.text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.pos += 1;
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
